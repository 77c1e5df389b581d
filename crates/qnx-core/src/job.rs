//! Job identity and status types.
//!
//! The platform's job state machine:
//!
//! ```text
//!   SUBMITTED ──→ QUEUED ──→ RUNNING ──→ COMPLETED
//!       │           │           │
//!       │           │           ├──→ ERROR
//!       │           │           ├──→ DEPLETED / TERMINATED
//!       │           │           └──→ RETRYING ──→ QUEUED
//!       │           │
//!       └───────────┴──→ CANCELLING ──→ CANCELLED
//! ```
//!
//! **Invariants:**
//! - Terminal kinds (`Completed`, `Errored`, `Cancelled`, `Depleted`,
//!   `Terminated`) are permanent.
//! - A [`JobHandle`] is immutable; watching a job never changes the handle.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a remote job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create a new job ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What kind of work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobKind {
    /// Circuit compilation.
    Compile,
    /// Circuit execution on a backend.
    Execute,
    /// Any job type this client does not know about.
    Other,
}

impl JobKind {
    /// Wire name used by the platform.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Compile => "compile",
            JobKind::Execute => "execute",
            JobKind::Other => "other",
        }
    }
}

impl From<String> for JobKind {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "compile" => JobKind::Compile,
            "execute" => JobKind::Execute,
            _ => JobKind::Other,
        }
    }
}

impl From<JobKind> for String {
    fn from(kind: JobKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminant of a [`JobStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatusKind {
    #[serde(rename = "SUBMITTED")]
    Submitted,
    #[serde(rename = "QUEUED")]
    Queued,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "ERROR", alias = "ERRORED")]
    Errored,
    #[serde(rename = "CANCELLED")]
    Cancelled,
    #[serde(rename = "CANCELLING")]
    Cancelling,
    #[serde(rename = "DEPLETED")]
    Depleted,
    #[serde(rename = "TERMINATED")]
    Terminated,
    #[serde(rename = "RETRYING")]
    Retrying,
}

impl StatusKind {
    /// Every status kind, in declaration order.
    pub const ALL: [StatusKind; 10] = [
        StatusKind::Submitted,
        StatusKind::Queued,
        StatusKind::Running,
        StatusKind::Completed,
        StatusKind::Errored,
        StatusKind::Cancelled,
        StatusKind::Cancelling,
        StatusKind::Depleted,
        StatusKind::Terminated,
        StatusKind::Retrying,
    ];

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StatusKind::Completed
                | StatusKind::Errored
                | StatusKind::Cancelled
                | StatusKind::Depleted
                | StatusKind::Terminated
        )
    }

    /// The set of terminal kinds, the default wait target.
    pub fn terminal_set() -> BTreeSet<StatusKind> {
        Self::ALL.into_iter().filter(|k| k.is_terminal()).collect()
    }

    /// Wire name used by the platform (`"ERROR"` for [`StatusKind::Errored`]).
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Submitted => "SUBMITTED",
            StatusKind::Queued => "QUEUED",
            StatusKind::Running => "RUNNING",
            StatusKind::Completed => "COMPLETED",
            StatusKind::Errored => "ERROR",
            StatusKind::Cancelled => "CANCELLED",
            StatusKind::Cancelling => "CANCELLING",
            StatusKind::Depleted => "DEPLETED",
            StatusKind::Terminated => "TERMINATED",
            StatusKind::Retrying => "RETRYING",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a job as reported by the platform.
///
/// `status` and `message` are required on the wire; everything else is
/// optional and left `None` when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    /// Current state.
    #[serde(rename = "status")]
    pub kind: StatusKind,
    /// Human-readable description of the state.
    pub message: String,
    /// Detailed error information, usually only set for `ERROR`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_time: Option<DateTime<Utc>>,

    /// Position in the backend queue, while queued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<u32>,
    /// Cost charged for the job so far, truncated to two decimal places.
    #[serde(
        default,
        deserialize_with = "deserialize_cost",
        skip_serializing_if = "Option::is_none"
    )]
    pub cost: Option<f64>,
}

fn deserialize_cost<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw.map(truncate_to_2dp))
}

fn truncate_to_2dp(value: f64) -> f64 {
    (value * 100.0).trunc() / 100.0
}

impl JobStatus {
    /// Create a status with only a kind and an empty message.
    pub fn new(kind: StatusKind) -> Self {
        Self {
            kind,
            message: String::new(),
            error_detail: None,
            completed_time: None,
            queued_time: None,
            submitted_time: None,
            running_time: None,
            cancelled_time: None,
            error_time: None,
            queue_position: None,
            cost: None,
        }
    }

    /// Set the message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Set the error detail.
    pub fn with_error_detail(mut self, detail: impl Into<String>) -> Self {
        self.error_detail = Some(detail.into());
        self
    }

    /// Parse a status from a JSON value.
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }

    /// Check if the job is still making progress toward a terminal state.
    pub fn is_pending(&self) -> bool {
        !self.is_terminal()
    }

    /// Check if the job completed successfully.
    pub fn is_success(&self) -> bool {
        self.kind == StatusKind::Completed
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

/// Caller-owned reference to a remote job.
///
/// Fields are private so a handle cannot change while a watcher borrows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    id: JobId,
    kind: JobKind,
    last_status: StatusKind,
}

impl JobHandle {
    /// Create a handle for a freshly submitted job.
    pub fn new(id: impl Into<JobId>, kind: JobKind) -> Self {
        Self {
            id: id.into(),
            kind,
            last_status: StatusKind::Submitted,
        }
    }

    /// Create a handle that remembers the last status seen by the caller.
    pub fn with_last_status(mut self, status: StatusKind) -> Self {
        self.last_status = status;
        self
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Status known when the handle was created.
    pub fn last_status(&self) -> StatusKind {
        self.last_status
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} job {}", self.kind, self.id)
    }
}
