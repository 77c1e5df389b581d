//! Watch a Nexus job to completion
//!
//! Reads configuration from `.env.qnx` and `NEXUS_*` variables and the
//! access token from `NEXUS_TOKEN` or `~/.qnx/auth/access_token`.

use std::time::{Duration, Instant};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use qnx_client::NexusClient;
use qnx_core::{JobHandle, JobKind, SortKey, StatusKind, Table};
use qnx_demos::{print_header, print_result, print_section, print_status};

#[derive(Parser, Debug)]
#[command(name = "demo-wait")]
#[command(about = "Wait for a Nexus job and list recent jobs")]
struct Args {
    /// Job id to watch
    job_id: String,

    /// Give up after this many seconds (0 waits indefinitely)
    #[arg(long, default_value_t = 300)]
    timeout: u64,

    /// Also stop at RUNNING
    #[arg(long)]
    until_running: bool,

    /// Number of recent jobs to list afterwards
    #[arg(long, default_value_t = 10)]
    list: u32,

    /// Verbose output (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let client = NexusClient::from_env()?;
    print_header("Nexus Job Watcher");
    print_result("API", client.base_url());
    print_result("Job", &args.job_id);

    let mut options = client.config().wait_options();
    options = if args.timeout == 0 {
        options.without_timeout()
    } else {
        options.with_timeout(Duration::from_secs(args.timeout))
    };
    if args.until_running {
        options = options.with_targets([StatusKind::Running]);
    }

    print_section("Waiting");
    let start = Instant::now();
    let handle = JobHandle::new(args.job_id.as_str(), JobKind::Execute);
    let status = client.watcher().wait_for(&handle, &options).await?;
    print_status(&status);
    print_result("Elapsed", format!("{:.2?}", start.elapsed()));

    if args.list > 0 {
        print_section("Recent jobs");
        let query = client
            .job_query()
            .sort(SortKey::CreatedDesc)
            .page_size(args.list);
        let mut jobs = client.jobs(query);
        let mut recent = Vec::new();
        while recent.len() < args.list as usize {
            match jobs.next_item().await? {
                Some(job) => recent.push(job),
                None => break,
            }
        }
        println!("{}", Table::from_items(&recent));
        print_result("Total", jobs.count().await?);
    }

    Ok(())
}
