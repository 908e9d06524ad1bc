//! Abstract contract presented by the two remote job services, plus the
//! wire records their HTTP payloads decode into.

use crate::error::SourceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cwc_core::{ExecutionJob, ExecutionStatus, FunctionJob, JobFilters, JobStatus};
use serde::Deserialize;
use serde_json::Value;

/// The parent job service: lists function jobs, serves their logs, and
/// accepts stop requests.
#[async_trait]
pub trait GatewayService: Send + Sync {
    async fn list_jobs(
        &self,
        filters: &JobFilters,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<FunctionJob>, SourceError>;

    async fn job_logs(&self, job_id: &str) -> Result<String, SourceError>;

    async fn stop_job(&self, job_id: &str) -> Result<(), SourceError>;
}

/// The child job service: resolves the execution jobs a function job
/// spawned, serves their logs, and accepts cancellations.
#[async_trait]
pub trait RuntimeService: Send + Sync {
    async fn execution_jobs(&self, parent_id: &str) -> Result<Vec<ExecutionJob>, SourceError>;

    async fn job_logs(&self, job_id: &str) -> Result<String, SourceError>;

    async fn cancel_job(&self, job_id: &str) -> Result<(), SourceError>;
}

/// Provider field as the gateway serializes it: either a bare name or an
/// object carrying one.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProviderRecord {
    Named { name: String },
    Plain(String),
    /// Anything else the gateway sends; carries no usable name.
    Other(Value),
}

impl ProviderRecord {
    fn name(&self) -> &str {
        match self {
            ProviderRecord::Named { name } => name,
            ProviderRecord::Plain(name) => name,
            ProviderRecord::Other(_) => "",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgramRecord {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub provider: Option<ProviderRecord>,
}

/// One row of the gateway's job listing.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionJobRecord {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub sub_status: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub program: Option<ProgramRecord>,
    #[serde(default)]
    pub provider: Option<ProviderRecord>,
    #[serde(default, flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl FunctionJobRecord {
    /// Provider-qualified display name, preferring the program's own
    /// provider over the top-level one.
    pub fn display_function_name(&self) -> Option<String> {
        let program = self.program.as_ref();
        let title = program.and_then(|p| p.title.as_deref())?;
        let provider = program
            .and_then(|p| p.provider.as_ref())
            .or(self.provider.as_ref())
            .map(ProviderRecord::name);
        Some(match provider {
            Some(provider) if !provider.is_empty() => format!("{provider}/{title}"),
            _ => title.to_string(),
        })
    }

    pub fn into_job(self) -> FunctionJob {
        let mut job = FunctionJob::new(self.id.clone());
        job.function_name = self.display_function_name();
        job.status = self
            .status
            .as_deref()
            .map(JobStatus::fold)
            .unwrap_or(JobStatus::Unknown);
        job.sub_status = self.sub_status.filter(|value| !value.trim().is_empty());
        job.created_at = self.created.as_deref().and_then(parse_created);
        job
    }
}

/// One row of the runtime service's execution listing for a parent job.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionJobRecord {
    pub id: String,
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ExecutionJobRecord {
    pub fn into_job(self, parent_id: &str, fetched_at: DateTime<Utc>) -> ExecutionJob {
        let mut job = ExecutionJob::new(self.id, parent_id);
        job.backend_name = self.backend.filter(|value| !value.trim().is_empty());
        job.status = self
            .status
            .as_deref()
            .map(ExecutionStatus::fold)
            .unwrap_or(ExecutionStatus::Unknown);
        job.last_fetched_at = Some(fetched_at);
        job
    }
}

/// Gateways disagree on fractional seconds and `Z` vs offset suffixes;
/// an unparseable timestamp degrades to `None` rather than dropping the row.
pub fn parse_created(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Fan-out listings are re-joined by id, keeping the first appearance.
pub fn dedup_by_id(rows: Vec<FunctionJob>) -> Vec<FunctionJob> {
    let mut seen = std::collections::HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.id.clone()))
        .collect()
}
