//! Nexus REST API client.
//!
//! Implements the parts of the Nexus API (`/api/jobs/v1beta`,
//! `/api/projects/v1beta`) needed to watch jobs and walk listings.

use std::sync::Arc;

use async_trait::async_trait;
use qnx_core::{
    JobHandle, JobId, JobRef, JobStatus, JobWatcher, NexusResult, ProjectRef, Query, ResultIter,
    StatusSource,
};
use reqwest::{Client, StatusCode};
use reqwest::header::COOKIE;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::auth::{AUTH_COOKIE, ChainTokenProvider, TokenProvider};
use crate::channel::WebSocketChannel;
use crate::config::NexusConfig;
use crate::error::{ClientError, ClientResult};
use crate::listing::Listing;
use crate::models::{Document, JobResource, ProjectResource, RetryRequest};

/// Job collection path.
pub const JOBS_PATH: &str = "api/jobs/v1beta";
/// Project collection path.
pub const PROJECTS_PATH: &str = "api/projects/v1beta";

/// Nexus REST API client.
///
/// Cheap to clone: clones share the connection pool and token provider.
#[derive(Clone)]
pub struct NexusClient {
    http: Client,
    /// API root without trailing slash.
    base_url: String,
    /// Websocket root without trailing slash.
    ws_url: String,
    tokens: Arc<dyn TokenProvider>,
    config: NexusConfig,
}

impl std::fmt::Debug for NexusClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NexusClient")
            .field("base_url", &self.base_url)
            .field("ws_url", &self.ws_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl NexusClient {
    /// Create a client for `config`, authenticating with `tokens`.
    pub fn new(config: NexusConfig, tokens: Arc<dyn TokenProvider>) -> ClientResult<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(!config.httpx_verify)
            .build()
            .map_err(ClientError::Http)?;

        Ok(Self {
            http,
            base_url: config.url(),
            ws_url: config.websockets_url(),
            tokens,
            config,
        })
    }

    /// Client configured from `.env.qnx` and `NEXUS_*` variables, with
    /// the token taken from `NEXUS_TOKEN` or the stored token file.
    pub fn from_env() -> ClientResult<Self> {
        let config = NexusConfig::load()?;
        Self::new(config, Arc::new(ChainTokenProvider::standard()))
    }

    /// Override the HTTP root (useful for testing).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the websocket root (useful for testing).
    pub fn with_websockets_url(mut self, ws_url: impl Into<String>) -> Self {
        self.ws_url = ws_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn config(&self) -> &NexusConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn websockets_url(&self) -> &str {
        &self.ws_url
    }

    /// `Cookie` header value carrying the access token.
    pub(crate) async fn auth_cookie(&self) -> ClientResult<String> {
        let token = self.tokens.get_token().await?;
        Ok(format!("{AUTH_COOKIE}={token}"))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET `path` with query parameters and decode the JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> ClientResult<T> {
        let cookie = self.auth_cookie().await?;
        let resp = self
            .http
            .get(self.url(path))
            .header(COOKIE, cookie)
            .query(params)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// POST a JSON body and accept any success status.
    /// POST an RPC request. Only `202 Accepted` counts as success.
    async fn post_expect_accepted(&self, path: &str, body: &impl Serialize) -> ClientResult<()> {
        let cookie = self.auth_cookie().await?;
        let resp = self
            .http
            .post(self.url(path))
            .header(COOKIE, cookie)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::ACCEPTED {
            Ok(())
        } else if status.is_success() {
            Err(ClientError::UnexpectedResponse(format!(
                "expected 202 Accepted, got {status}"
            )))
        } else {
            let message = resp.text().await.unwrap_or_default();
            Err(ClientError::from_status(status, message))
        }
    }

    /// Handle HTTP response: deserialize JSON or return an error.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> ClientResult<T> {
        let status = response.status();

        if status.is_success() {
            let bytes = response.bytes().await?;
            Ok(serde_json::from_slice(&bytes)?)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(ClientError::from_status(status, message))
        }
    }

    // -----------------------------------------------------------------------
    // Public API methods
    // -----------------------------------------------------------------------

    /// Current status of a job.
    #[instrument(skip(self, job_id), fields(job_id = %job_id))]
    pub async fn job_status(&self, job_id: &JobId) -> ClientResult<JobStatus> {
        debug!("Fetching job status");
        self.get_json(&format!("{JOBS_PATH}/{job_id}/attributes/status"), &[])
            .await
    }

    /// Fetch a single job.
    #[instrument(skip(self, job_id), fields(job_id = %job_id))]
    pub async fn get_job(&self, job_id: &JobId) -> ClientResult<JobRef> {
        debug!("Fetching job");
        let doc: Document<JobResource> = self.get_json(&format!("{JOBS_PATH}/{job_id}"), &[]).await?;
        JobRef::try_from(doc.data)
    }

    /// Fetch a single project.
    #[instrument(skip(self))]
    pub async fn get_project(&self, project_id: Uuid) -> ClientResult<ProjectRef> {
        debug!("Fetching project");
        let doc: Document<ProjectResource> = self
            .get_json(&format!("{PROJECTS_PATH}/{project_id}"), &[])
            .await?;
        ProjectRef::try_from(doc.data)
    }

    /// Ask the platform to cancel a job. Returns once the request is
    /// accepted; watch the job to see it reach `CANCELLED`.
    #[instrument(skip(self, job_id), fields(job_id = %job_id))]
    pub async fn cancel_job(&self, job_id: &JobId) -> ClientResult<()> {
        debug!("Cancelling job");
        self.post_expect_accepted(
            &format!("{JOBS_PATH}/{job_id}/rpc/cancel"),
            &serde_json::json!({}),
        )
        .await
    }

    /// Ask the platform to retry a job's failed items.
    #[instrument(skip(self, job_id, request), fields(job_id = %job_id))]
    pub async fn retry_job(&self, job_id: &JobId, request: &RetryRequest) -> ClientResult<()> {
        debug!(strategy = ?request.remote_retry_strategy, "Retrying job");
        self.post_expect_accepted(&format!("{JOBS_PATH}/{job_id}/rpc/retry"), request)
            .await
    }

    /// Unfiltered job query using the configured page size.
    pub fn job_query(&self) -> Query {
        Query::new("Job", JOBS_PATH).page_size(self.config.page_size)
    }

    /// Unfiltered project query using the configured page size.
    pub fn project_query(&self) -> Query {
        Query::new("Project", PROJECTS_PATH).page_size(self.config.page_size)
    }

    /// Lazy iterator over the jobs matching `query`.
    pub fn jobs(&self, query: Query) -> ResultIter<Listing<JobRef>> {
        ResultIter::new(Arc::new(Listing::new(self.clone())), query)
            .with_retry_policy(self.config.retry_policy())
    }

    /// Lazy iterator over the projects matching `query`.
    pub fn projects(&self, query: Query) -> ResultIter<Listing<ProjectRef>> {
        ResultIter::new(Arc::new(Listing::new(self.clone())), query)
            .with_retry_policy(self.config.retry_policy())
    }

    /// Watcher that listens on the websocket channel and polls this client.
    pub fn watcher(&self) -> JobWatcher {
        JobWatcher::new(Arc::new(self.clone()))
            .with_channel(Arc::new(WebSocketChannel::new(self.clone())))
            .with_retry_policy(self.config.retry_policy())
    }

    /// Wait for `handle` to reach a terminal status using the configured
    /// poll interval and deadline.
    pub async fn wait_for(&self, handle: &JobHandle) -> NexusResult<JobStatus> {
        self.watcher()
            .wait_for(handle, &self.config.wait_options())
            .await
    }
}

#[async_trait]
impl StatusSource for NexusClient {
    async fn fetch_status(&self, job_id: &JobId) -> NexusResult<JobStatus> {
        Ok(self.job_status(job_id).await?)
    }
}
