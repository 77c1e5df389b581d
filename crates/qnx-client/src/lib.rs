//! Nexus transport for `qnx-core`.
//!
//! Provides [`NexusClient`], which implements the core's transport traits
//! over the Nexus REST API (reqwest) and its websocket status stream
//! (tokio-tungstenite).
//!
//! # Example
//!
//! ```ignore
//! use qnx_client::NexusClient;
//! use qnx_core::{JobHandle, JobKind};
//!
//! let client = NexusClient::from_env()?;
//! let status = client.wait_for(&JobHandle::new(job_id, JobKind::Execute)).await?;
//! println!("{status}");
//!
//! let mut jobs = client.jobs(client.job_query().name_like("bell"));
//! println!("{}", jobs.table().await?);
//! ```

pub mod api;
pub mod auth;
pub mod channel;
pub mod config;
pub mod error;
pub mod listing;
pub mod models;

pub use api::{JOBS_PATH, NexusClient, PROJECTS_PATH};
pub use auth::{
    ChainTokenProvider, EnvTokenProvider, FileTokenProvider, StaticTokenProvider, TokenProvider,
};
pub use channel::{WebSocketChannel, WebSocketSubscription};
pub use config::NexusConfig;
pub use error::{ClientError, ClientResult};
pub use listing::{Listing, ListingResource};
pub use models::{RetryRequest, RetryStrategy};
