//! Error types for the core crate.

use thiserror::Error;

use crate::job::{JobId, JobStatus};

/// Errors surfaced by the watcher and the query layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NexusError {
    /// A failure expected to succeed on retry (timeout, connection reset, 5xx).
    ///
    /// Retry loops consume this variant; callers only see it when they talk
    /// to a transport directly.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// A transient failure persisted past the retry bound.
    #[error("Giving up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    /// The platform rejected the credentials (401/403).
    #[error("Unauthorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// No credential is available to authenticate with.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The requested resource does not exist (404).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A response could not be decoded.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Any other non-retryable API error.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The wait deadline elapsed before a target status was observed.
    #[error("Timeout waiting for job {job_id} (last status: {last_status})")]
    Timeout {
        job_id: JobId,
        last_status: Box<JobStatus>,
    },

    /// A unique-match query found nothing.
    #[error("No resource matched the filter")]
    ZeroMatches,

    /// A unique-match query found more than one resource.
    #[error("More than one resource matched the filter ({0} matches)")]
    NoUniqueMatch(u64),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Coarse classification of a [`NexusError`] for caller decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Still transient; only seen from raw transport calls.
    Transient,
    /// Retries were exhausted on a transient failure.
    TransientExhausted,
    /// Non-retryable failure.
    Fatal,
    /// The wait deadline elapsed.
    Timeout,
}

impl NexusError {
    /// Whether a retry loop should try again.
    pub fn is_transient(&self) -> bool {
        matches!(self, NexusError::Transient(_))
    }

    /// Whether the failure is an authentication problem.
    pub fn is_auth(&self) -> bool {
        matches!(self, NexusError::Unauthorized { .. } | NexusError::Auth(_))
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            NexusError::Transient(_) => ErrorCategory::Transient,
            NexusError::RetriesExhausted { .. } => ErrorCategory::TransientExhausted,
            NexusError::Timeout { .. } => ErrorCategory::Timeout,
            _ => ErrorCategory::Fatal,
        }
    }

    /// The last status carried by a [`NexusError::Timeout`].
    pub fn last_status(&self) -> Option<&JobStatus> {
        match self {
            NexusError::Timeout { last_status, .. } => Some(last_status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for NexusError {
    fn from(e: serde_json::Error) -> Self {
        NexusError::MalformedPayload(e.to_string())
    }
}

/// Result type for core operations.
pub type NexusResult<T> = Result<T, NexusError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::StatusKind;

    #[test]
    fn test_categories() {
        assert_eq!(
            NexusError::Transient("reset".into()).category(),
            ErrorCategory::Transient
        );
        assert_eq!(
            NexusError::RetriesExhausted {
                attempts: 4,
                last: "503".into()
            }
            .category(),
            ErrorCategory::TransientExhausted
        );
        assert_eq!(
            NexusError::NotFound("job-1".into()).category(),
            ErrorCategory::Fatal
        );
        assert_eq!(
            NexusError::Unauthorized {
                status: 401,
                message: String::new()
            }
            .category(),
            ErrorCategory::Fatal
        );
    }

    #[test]
    fn test_timeout_carries_last_status() {
        let err = NexusError::Timeout {
            job_id: JobId::new("job-9"),
            last_status: Box::new(JobStatus::new(StatusKind::Running)),
        };
        assert_eq!(err.category(), ErrorCategory::Timeout);
        assert_eq!(err.last_status().map(|s| s.kind), Some(StatusKind::Running));
        let msg = err.to_string();
        assert!(msg.contains("job-9"));
        assert!(msg.contains("RUNNING"));
    }

    #[test]
    fn test_json_error_is_malformed() {
        let json_err = serde_json::from_str::<JobStatus>("{").unwrap_err();
        let err: NexusError = json_err.into();
        assert!(matches!(err, NexusError::MalformedPayload(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NexusError>();
    }
}
