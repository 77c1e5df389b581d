//! Listing queries and pagination primitives.
//!
//! A [`Query`] is an immutable description of a remote listing: resource
//! path, filters, sort order and page size. It serializes to the platform's
//! JSON:API-style query parameters (`filter[...]`, `sort`, `page[...]`).

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::job::{JobKind, StatusKind};
use crate::scope::Scope;

/// Page size used when a query does not set one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// A user-defined property value attached to a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl PropertyValue {
    /// Render as a `filter[properties]` entry: `(key,value)`, strings quoted.
    pub fn filter_entry(&self, key: &str) -> String {
        match self {
            PropertyValue::Str(s) => format!("({key},\"{s}\")"),
            PropertyValue::Bool(b) => format!("({key},{b})"),
            PropertyValue::Int(i) => format!("({key},{i})"),
            PropertyValue::Float(f) => format!("({key},{f:?})"),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(b) => write!(f, "{b}"),
            PropertyValue::Int(i) => write!(f, "{i}"),
            PropertyValue::Float(x) => write!(f, "{x}"),
            PropertyValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Int(i64::from(v))
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Str(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Str(v)
    }
}

/// Ordered property map. Ordering keeps serialized filters stable.
pub type Properties = BTreeMap<String, PropertyValue>;

/// Sort order for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortKey {
    CreatedAsc,
    CreatedDesc,
    ModifiedAsc,
    ModifiedDesc,
    NameAsc,
    NameDesc,
}

impl SortKey {
    /// Value of the `sort` query parameter.
    pub fn as_param(&self) -> &'static str {
        match self {
            SortKey::CreatedAsc => "timestamps.created",
            SortKey::CreatedDesc => "-timestamps.created",
            SortKey::ModifiedAsc => "timestamps.modified",
            SortKey::ModifiedDesc => "-timestamps.modified",
            SortKey::NameAsc => "name",
            SortKey::NameDesc => "-name",
        }
    }
}

/// Access scope used when listing resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeFilter {
    User,
    OrgAdmin,
    GlobalAdmin,
    Highest,
}

impl ScopeFilter {
    pub fn as_param(&self) -> &'static str {
        match self {
            ScopeFilter::User => "user",
            ScopeFilter::OrgAdmin => "org_admin",
            ScopeFilter::GlobalAdmin => "global_admin",
            ScopeFilter::Highest => "highest",
        }
    }
}

/// Position in a paginated remote collection.
///
/// Cursors are monotonic: re-issuing a cursor returns the same page unless
/// the collection changed in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageCursor {
    /// Zero-based page number.
    pub number: u32,
    /// Items per page.
    pub size: u32,
}

impl PageCursor {
    /// Cursor at the first page.
    pub fn first(size: u32) -> Self {
        Self { number: 0, size }
    }

    /// Cursor at the following page.
    pub fn next(&self) -> Self {
        Self {
            number: self.number + 1,
            size: self.size,
        }
    }

    pub fn to_params(&self) -> Vec<(String, String)> {
        vec![
            ("page[number]".to_string(), self.number.to_string()),
            ("page[size]".to_string(), self.size.to_string()),
        ]
    }
}

/// One fetched page: an owned item buffer and where to continue.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `None` once the collection is exhausted.
    pub next: Option<PageCursor>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next: Option<PageCursor>) -> Self {
        Self { items, next }
    }

    /// A final page.
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }

    pub fn empty() -> Self {
        Self::last(Vec::new())
    }
}

/// Server-computed aggregate over a full query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Resource name, e.g. `"Job"`.
    pub resource: String,
    pub total_count: u64,
    /// Per-status breakdown; empty for resources without a status.
    #[serde(default)]
    pub status_counts: BTreeMap<StatusKind, u64>,
}

impl Summary {
    pub fn new(resource: impl Into<String>, total_count: u64) -> Self {
        Self {
            resource: resource.into(),
            total_count,
            status_counts: BTreeMap::new(),
        }
    }

    /// A job summary with every status kind present and zero.
    pub fn zeroed_jobs(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            total_count: 0,
            status_counts: StatusKind::ALL.into_iter().map(|k| (k, 0)).collect(),
        }
    }

    /// Whether every count is zero.
    pub fn is_empty(&self) -> bool {
        self.total_count == 0 && self.status_counts.values().all(|&n| n == 0)
    }
}

/// Description of a remote listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Human-readable resource name used in summaries.
    pub resource: String,
    /// Listing path relative to the API root, e.g. `api/jobs/v1beta`.
    pub path: String,
    pub name_like: Option<String>,
    pub creator_email: Vec<String>,
    pub project: Option<Uuid>,
    pub properties: Properties,
    pub job_status: Vec<StatusKind>,
    pub job_kind: Vec<JobKind>,
    pub created_before: Option<DateTime<Utc>>,
    pub created_after: Option<DateTime<Utc>>,
    pub modified_before: Option<DateTime<Utc>>,
    pub modified_after: Option<DateTime<Utc>>,
    pub archived: Option<bool>,
    pub scope: Option<ScopeFilter>,
    pub sort: Vec<SortKey>,
    pub page_size: u32,
}

impl Query {
    /// Create an unfiltered query over `path`.
    pub fn new(resource: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            path: path.into(),
            name_like: None,
            creator_email: Vec::new(),
            project: None,
            properties: Properties::new(),
            job_status: Vec::new(),
            job_kind: Vec::new(),
            created_before: None,
            created_after: None,
            modified_before: None,
            modified_after: None,
            archived: None,
            scope: None,
            sort: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn name_like(mut self, name: impl Into<String>) -> Self {
        self.name_like = Some(name.into());
        self
    }

    pub fn creator_email(mut self, email: impl Into<String>) -> Self {
        self.creator_email.push(email.into());
        self
    }

    pub fn project(mut self, project: Uuid) -> Self {
        self.project = Some(project);
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn job_status(mut self, status: StatusKind) -> Self {
        self.job_status.push(status);
        self
    }

    pub fn job_kind(mut self, kind: JobKind) -> Self {
        self.job_kind.push(kind);
        self
    }

    pub fn created_before(mut self, t: DateTime<Utc>) -> Self {
        self.created_before = Some(t);
        self
    }

    pub fn created_after(mut self, t: DateTime<Utc>) -> Self {
        self.created_after = Some(t);
        self
    }

    pub fn modified_before(mut self, t: DateTime<Utc>) -> Self {
        self.modified_before = Some(t);
        self
    }

    pub fn modified_after(mut self, t: DateTime<Utc>) -> Self {
        self.modified_after = Some(t);
        self
    }

    pub fn archived(mut self, archived: bool) -> Self {
        self.archived = Some(archived);
        self
    }

    pub fn scope(mut self, scope: ScopeFilter) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn sort(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    /// Set the page size. Zero is clamped to one.
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = size.max(1);
        self
    }

    /// Inject defaults from an explicit scope.
    ///
    /// The scope's project applies only when the query has none; scope
    /// properties are merged under the query's own (query wins on conflict).
    pub fn in_scope(mut self, scope: &Scope) -> Self {
        if self.project.is_none() {
            self.project = scope.project().map(|p| p.id);
        }
        for (key, value) in scope.properties() {
            self.properties
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        self
    }

    /// Copy of this query restricted to a single status kind.
    pub fn with_only_status(&self, status: StatusKind) -> Self {
        let mut q = self.clone();
        q.job_status = vec![status];
        q
    }

    /// Cursor at the first page of this query.
    pub fn first_page(&self) -> PageCursor {
        PageCursor::first(self.page_size)
    }

    /// Filter and sort parameters, without pagination.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();

        if let Some(ref name) = self.name_like {
            params.push(("filter[name]".to_string(), name.clone()));
        }
        for email in &self.creator_email {
            params.push(("filter[creator][email]".to_string(), email.clone()));
        }
        if let Some(project) = self.project {
            params.push(("filter[project][id]".to_string(), project.to_string()));
        }
        for (key, value) in &self.properties {
            params.push(("filter[properties]".to_string(), value.filter_entry(key)));
        }
        for status in &self.job_status {
            params.push(("filter[status][status]".to_string(), status.as_str().to_string()));
        }
        for kind in &self.job_kind {
            params.push(("filter[job_type]".to_string(), kind.as_str().to_string()));
        }

        let timestamps = [
            ("filter[timestamps][created][before]", self.created_before),
            ("filter[timestamps][created][after]", self.created_after),
            ("filter[timestamps][modified][before]", self.modified_before),
            ("filter[timestamps][modified][after]", self.modified_after),
        ];
        for (key, value) in timestamps {
            if let Some(t) = value {
                params.push((key.to_string(), t.to_rfc3339_opts(SecondsFormat::Secs, true)));
            }
        }

        if let Some(archived) = self.archived {
            params.push(("filter[archived]".to_string(), archived.to_string()));
        }
        if let Some(scope) = self.scope {
            params.push(("scope".to_string(), scope.as_param().to_string()));
        }
        for key in &self.sort {
            params.push(("sort".to_string(), key.as_param().to_string()));
        }

        params
    }

    /// Filter parameters plus the pagination parameters of `cursor`.
    pub fn page_params(&self, cursor: &PageCursor) -> Vec<(String, String)> {
        let mut params = self.to_params();
        params.extend(cursor.to_params());
        params
    }
}
