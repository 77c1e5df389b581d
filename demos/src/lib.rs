//! Console helpers shared by the demo binaries.

use console::style;
use qnx_core::{JobStatus, StatusKind};

/// Print a demo header.
pub fn print_header(title: &str) {
    println!();
    println!("{}", style("═".repeat(60)).cyan());
    println!("{}", style(format!("  {title}")).cyan().bold());
    println!("{}", style("═".repeat(60)).cyan());
    println!();
}

/// Print a demo section.
pub fn print_section(title: &str) {
    println!();
    println!("{}", style(format!("▶ {title}")).green().bold());
    println!("{}", style("─".repeat(40)).dim());
}

/// Print a result line.
pub fn print_result(label: &str, value: impl std::fmt::Display) {
    println!("  {} {}", style(format!("{label}:")).dim(), value);
}

/// Print a final job status, coloured by outcome.
pub fn print_status(status: &JobStatus) {
    let kind = match status.kind {
        StatusKind::Completed => style(status.kind.as_str()).green().bold(),
        StatusKind::Errored
        | StatusKind::Cancelled
        | StatusKind::Depleted
        | StatusKind::Terminated => style(status.kind.as_str()).red().bold(),
        _ => style(status.kind.as_str()).yellow(),
    };
    println!("  {} {kind}", style("status:").dim());
    if !status.message.is_empty() {
        print_result("message", &status.message);
    }
    if let Some(detail) = &status.error_detail {
        print_result("error", detail);
    }
    if let Some(cost) = status.cost {
        print_result("cost", format!("{cost:.2}"));
    }
}
