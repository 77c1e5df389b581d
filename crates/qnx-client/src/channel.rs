//! Websocket status channel.
//!
//! The server pushes one JSON status object per text frame on
//! `{ws}/api/jobs/v1beta/{id}/attributes/status/ws`.

use async_trait::async_trait;
use futures::StreamExt;
use qnx_core::{JobId, JobStatus, NexusError, NexusResult, StatusChannel, StatusSubscription};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, instrument, warn};

use crate::api::{JOBS_PATH, NexusClient};
use crate::error::ClientError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// [`StatusChannel`] over the Nexus websocket API.
#[derive(Debug, Clone)]
pub struct WebSocketChannel {
    client: NexusClient,
}

impl WebSocketChannel {
    pub fn new(client: NexusClient) -> Self {
        Self { client }
    }

    /// Status stream URL for a job.
    pub fn status_url(&self, job_id: &JobId) -> String {
        format!(
            "{}/{JOBS_PATH}/{job_id}/attributes/status/ws",
            self.client.websockets_url()
        )
    }
}

#[async_trait]
impl StatusChannel for WebSocketChannel {
    #[instrument(skip(self, job_id), fields(job_id = %job_id))]
    async fn subscribe(&self, job_id: &JobId) -> NexusResult<Box<dyn StatusSubscription>> {
        let url = self.status_url(job_id);
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| NexusError::Configuration(format!("invalid websocket URL {url}: {e}")))?;

        let cookie = self.client.auth_cookie().await?;
        let cookie = HeaderValue::from_str(&cookie)
            .map_err(|_| NexusError::Auth("access token is not a valid header value".into()))?;
        request.headers_mut().insert(COOKIE, cookie);

        debug!(%url, "Opening status channel");
        let (stream, _) = connect_async(request).await.map_err(ClientError::from)?;

        Ok(Box::new(WebSocketSubscription {
            stream: Some(stream),
            job_id: job_id.clone(),
        }))
    }
}

/// An open status stream for one job.
pub struct WebSocketSubscription {
    /// `None` once closed.
    stream: Option<WsStream>,
    job_id: JobId,
}

impl std::fmt::Debug for WebSocketSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketSubscription")
            .field("job_id", &self.job_id)
            .field("open", &self.stream.is_some())
            .finish()
    }
}

#[async_trait]
impl StatusSubscription for WebSocketSubscription {
    async fn next_status(&mut self) -> Option<NexusResult<JobStatus>> {
        let stream = self.stream.as_mut()?;
        loop {
            let msg = match stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    self.stream = None;
                    return Some(Err(ClientError::from(e).into()));
                }
                None => {
                    self.stream = None;
                    return None;
                }
            };

            let parsed = match msg {
                Message::Text(text) => serde_json::from_str::<JobStatus>(text.as_str()),
                Message::Binary(data) => serde_json::from_slice::<JobStatus>(&data),
                Message::Close(frame) => {
                    debug!(job_id = %self.job_id, ?frame, "Status channel closed by server");
                    self.stream = None;
                    return None;
                }
                // Ping, pong and raw frames.
                _ => continue,
            };

            return Some(parsed.map_err(|e| {
                warn!(job_id = %self.job_id, error = %e, "Malformed status frame");
                NexusError::MalformedPayload(format!("status frame: {e}"))
            }));
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            };
            if let Err(e) = stream.close(Some(frame)).await {
                debug!(job_id = %self.job_id, error = %e, "Error closing status channel");
            }
        }
    }
}
