//! Lightweight references to remote resources returned by listings.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::job::{JobHandle, JobId, JobKind, StatusKind};
use crate::query::Properties;
use crate::table::Tabular;

/// Creation and modification times of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

fn format_time(t: Option<&DateTime<Utc>>) -> String {
    t.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Reference to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub archived: bool,
    /// Last change to anything inside the project.
    #[serde(default)]
    pub contents_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timestamps: Option<Timestamps>,
}

impl ProjectRef {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            properties: Properties::new(),
            archived: false,
            contents_modified: None,
            timestamps: None,
        }
    }
}

impl fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "project {} ({})", self.name, self.id)
    }
}

impl Tabular for ProjectRef {
    fn columns() -> Vec<&'static str> {
        vec!["name", "description", "created", "modified", "archived", "id"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.description.clone().unwrap_or_default(),
            format_time(self.timestamps.as_ref().map(|t| &t.created)),
            format_time(self.timestamps.as_ref().map(|t| &t.modified)),
            self.archived.to_string(),
            self.id.to_string(),
        ]
    }
}

/// Reference to a job as seen in a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRef {
    pub id: JobId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub kind: JobKind,
    pub status: StatusKind,
    #[serde(default)]
    pub status_message: String,
    pub project: Option<Uuid>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub timestamps: Option<Timestamps>,
}

impl JobRef {
    pub fn new(id: impl Into<JobId>, name: impl Into<String>, kind: JobKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            kind,
            status: StatusKind::Submitted,
            status_message: String::new(),
            project: None,
            properties: Properties::new(),
            timestamps: None,
        }
    }

    pub fn with_status(mut self, status: StatusKind) -> Self {
        self.status = status;
        self
    }

    /// A watchable handle carrying the listed status.
    pub fn handle(&self) -> JobHandle {
        JobHandle::new(self.id.clone(), self.kind).with_last_status(self.status)
    }
}

impl fmt::Display for JobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} job {} ({})", self.kind, self.name, self.id)
    }
}

impl Tabular for JobRef {
    fn columns() -> Vec<&'static str> {
        vec!["name", "type", "status", "created", "modified", "project", "id"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.kind.to_string(),
            self.status.to_string(),
            format_time(self.timestamps.as_ref().map(|t| &t.created)),
            format_time(self.timestamps.as_ref().map(|t| &t.modified)),
            self.project.map(|p| p.to_string()).unwrap_or_default(),
            self.id.to_string(),
        ]
    }
}
