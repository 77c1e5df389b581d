//! JSON:API wire types for the Nexus REST API.

use chrono::{DateTime, Utc};
use qnx_core::{JobId, JobKind, JobRef, JobStatus, ProjectRef, Properties, Timestamps};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};

/// Top-level JSON:API document.
#[derive(Debug, Deserialize)]
pub struct Document<T> {
    pub data: T,
    #[serde(default)]
    pub included: Vec<serde_json::Value>,
    #[serde(default)]
    pub links: Option<Links>,
}

/// Pagination links. Only `next` is consulted.
#[derive(Debug, Default, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub next: Option<serde_json::Value>,
}

impl<T> Document<Vec<T>> {
    /// Whether the server reported this as the final page.
    pub fn is_last_page(&self) -> bool {
        self.data.is_empty()
            || self
                .links
                .as_ref()
                .is_some_and(|l| l.next.as_ref().is_none_or(|n| n.is_null()))
    }
}

/// A JSON:API resource object.
#[derive(Debug, Deserialize)]
pub struct Resource<A, R = NoRelationships> {
    pub id: String,
    pub attributes: A,
    #[serde(default)]
    pub relationships: R,
}

#[derive(Debug, Default, Deserialize)]
pub struct NoRelationships {}

/// Response of the `meta/count` endpoints.
#[derive(Debug, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub data: Option<RelationshipData>,
}

#[derive(Debug, Deserialize)]
pub struct RelationshipData {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct WireTimestamps {
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl From<WireTimestamps> for Timestamps {
    fn from(t: WireTimestamps) -> Self {
        Timestamps {
            created: t.created,
            modified: t.modified,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JobAttributes {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: Properties,
    pub job_type: JobKind,
    pub status: JobStatus,
    #[serde(default)]
    pub timestamps: Option<WireTimestamps>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JobRelationships {
    #[serde(default)]
    pub project: Option<Relationship>,
}

pub type JobResource = Resource<JobAttributes, JobRelationships>;

impl TryFrom<JobResource> for JobRef {
    type Error = ClientError;

    fn try_from(resource: JobResource) -> ClientResult<Self> {
        let project = resource
            .relationships
            .project
            .and_then(|r| r.data)
            .map(|d| parse_uuid(&d.id))
            .transpose()?;
        let attrs = resource.attributes;

        Ok(JobRef {
            id: JobId::new(resource.id),
            name: attrs.name.unwrap_or_default(),
            description: attrs.description,
            kind: attrs.job_type,
            status: attrs.status.kind,
            status_message: attrs.status.message,
            project,
            properties: attrs.properties,
            timestamps: attrs.timestamps.map(Into::into),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ProjectAttributes {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub contents_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timestamps: Option<WireTimestamps>,
}

pub type ProjectResource = Resource<ProjectAttributes>;

impl TryFrom<ProjectResource> for ProjectRef {
    type Error = ClientError;

    fn try_from(resource: ProjectResource) -> ClientResult<Self> {
        let attrs = resource.attributes;
        Ok(ProjectRef {
            id: parse_uuid(&resource.id)?,
            name: attrs.name.unwrap_or_default(),
            description: attrs.description,
            properties: attrs.properties,
            archived: attrs.archived,
            contents_modified: attrs.contents_modified,
            timestamps: attrs.timestamps.map(Into::into),
        })
    }
}

fn parse_uuid(id: &str) -> ClientResult<Uuid> {
    Uuid::parse_str(id).map_err(|e| ClientError::UnexpectedResponse(format!("bad id {id:?}: {e}")))
}

/// How the platform should resubmit a retried job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetryStrategy {
    /// Resume where possible, never resubmit.
    #[default]
    Default,
    /// Resubmit if resuming is impossible.
    AllowResubmit,
    /// Always resubmit to the backend.
    ForceResubmit,
    /// Restart the job from scratch.
    FullRestart,
}

/// Body of `POST /api/jobs/v1beta/{id}/rpc/retry`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetryRequest {
    pub remote_retry_strategy: RetryStrategy,
    /// Status kinds whose items are retried; the platform defaults to
    /// errored items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_status: Option<Vec<qnx_core::StatusKind>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_group: Option<String>,
}

impl RetryRequest {
    pub fn new(strategy: RetryStrategy) -> Self {
        Self {
            remote_retry_strategy: strategy,
            ..Self::default()
        }
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = qnx_core::StatusKind>) -> Self {
        self.retry_status = Some(statuses.into_iter().collect());
        self
    }

    pub fn with_user_group(mut self, group: impl Into<String>) -> Self {
        self.user_group = Some(group.into());
        self
    }
}
