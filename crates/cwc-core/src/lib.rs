use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod config;
pub mod timefmt;

pub use config::{JobFilters, WatchConfig};

/// Lifecycle of a function job as reported by the compute gateway.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Unknown,
    Queued,
    Initializing,
    Running,
    Done,
    Error,
    Canceled,
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Unknown => "UNKNOWN",
            JobStatus::Queued => "QUEUED",
            JobStatus::Initializing => "INITIALIZING",
            JobStatus::Running => "RUNNING",
            JobStatus::Done => "DONE",
            JobStatus::Error => "ERROR",
            JobStatus::Canceled => "CANCELED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error | JobStatus::Canceled)
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Unknown => 0,
            JobStatus::Queued => 1,
            JobStatus::Initializing => 2,
            JobStatus::Running => 3,
            JobStatus::Done | JobStatus::Error | JobStatus::Canceled => 4,
        }
    }

    /// Forward-only merge: a listing update never moves a job backwards,
    /// and never out of a terminal state.
    pub fn advance(self, next: JobStatus) -> JobStatus {
        if next.rank() < self.rank() {
            self
        } else {
            next
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_uppercase();
        match normalized.as_str() {
            "" | "UNKNOWN" => Ok(JobStatus::Unknown),
            "QUEUED" => Ok(JobStatus::Queued),
            "INITIALIZING" | "PENDING" => Ok(JobStatus::Initializing),
            "RUNNING" => Ok(JobStatus::Running),
            "DONE" | "SUCCEEDED" => Ok(JobStatus::Done),
            "ERROR" | "FAILED" => Ok(JobStatus::Error),
            "CANCELED" | "CANCELLED" | "STOPPED" => Ok(JobStatus::Canceled),
            other => Err(format!("Unknown job status: {other}")),
        }
    }
}

impl JobStatus {
    /// Fold a provider status string, mapping anything unrecognized to
    /// `Unknown` instead of failing the whole row.
    pub fn fold(input: &str) -> JobStatus {
        input.parse().unwrap_or(JobStatus::Unknown)
    }
}

/// Lifecycle of an execution job on a runtime backend. `Unknown` means the
/// first status fetch has not landed yet; it is distinct from the job not
/// existing at all.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Unknown,
    Queued,
    Initializing,
    Running,
    Done,
    Error,
    Canceled,
}

impl Default for ExecutionStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Unknown => "UNKNOWN",
            ExecutionStatus::Queued => "QUEUED",
            ExecutionStatus::Initializing => "INITIALIZING",
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Done => "DONE",
            ExecutionStatus::Error => "ERROR",
            ExecutionStatus::Canceled => "CANCELED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Done | ExecutionStatus::Error | ExecutionStatus::Canceled
        )
    }

    fn rank(&self) -> u8 {
        match self {
            ExecutionStatus::Unknown => 0,
            ExecutionStatus::Queued => 1,
            ExecutionStatus::Initializing => 2,
            ExecutionStatus::Running => 3,
            ExecutionStatus::Done | ExecutionStatus::Error | ExecutionStatus::Canceled => 4,
        }
    }

    pub fn advance(self, next: ExecutionStatus) -> ExecutionStatus {
        if next.rank() < self.rank() {
            self
        } else {
            next
        }
    }

    pub fn fold(input: &str) -> ExecutionStatus {
        input.parse().unwrap_or(ExecutionStatus::Unknown)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_uppercase();
        match normalized.as_str() {
            "" | "UNKNOWN" => Ok(ExecutionStatus::Unknown),
            "QUEUED" => Ok(ExecutionStatus::Queued),
            "INITIALIZING" | "PENDING" => Ok(ExecutionStatus::Initializing),
            "RUNNING" => Ok(ExecutionStatus::Running),
            "DONE" | "SUCCEEDED" => Ok(ExecutionStatus::Done),
            "ERROR" | "FAILED" => Ok(ExecutionStatus::Error),
            "CANCELED" | "CANCELLED" | "STOPPED" => Ok(ExecutionStatus::Canceled),
            other => Err(format!("Unknown execution status: {other}")),
        }
    }
}

/// How much of a parent's child set has been resolved from the runtime
/// service. `Complete` is assigned only once the parent itself is terminal
/// and every reported child is terminal; from then on the resolver never
/// fetches that parent again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolveState {
    NotFetched,
    Partial,
    Complete,
}

impl Default for ResolveState {
    fn default() -> Self {
        Self::NotFetched
    }
}

impl ResolveState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveState::NotFetched => "not_fetched",
            ResolveState::Partial => "partial",
            ResolveState::Complete => "complete",
        }
    }
}

/// An execution job spawned by a function job on a runtime backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionJob {
    pub id: String,
    pub parent_id: String,
    /// `None` until the first successful status fetch reports a backend.
    pub backend_name: Option<String>,
    pub status: ExecutionStatus,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl ExecutionJob {
    pub fn new(id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.into(),
            backend_name: None,
            status: ExecutionStatus::Unknown,
            last_fetched_at: None,
        }
    }
}

/// A function job submitted to the compute gateway, together with its
/// resolved execution jobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionJob {
    pub id: String,
    pub function_name: Option<String>,
    pub status: JobStatus,
    /// Gateway-side refinement of `RUNNING` (e.g. a setup phase name).
    pub sub_status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    /// Discovery order; append-or-update only.
    pub children: Vec<ExecutionJob>,
    pub children_resolved: ResolveState,
    pub last_children_fetch: Option<DateTime<Utc>>,
    /// Last transient child-fetch failure, for the stale indicator.
    pub children_error: Option<String>,
}

impl FunctionJob {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            function_name: None,
            status: JobStatus::Unknown,
            sub_status: None,
            created_at: None,
            children: Vec::new(),
            children_resolved: ResolveState::NotFetched,
            last_children_fetch: None,
            children_error: None,
        }
    }

    /// The one gate both pollers consult: a fully terminal parent receives
    /// no further child fetches, ever.
    pub fn is_fully_terminal(&self) -> bool {
        self.status.is_terminal()
            && self.children_resolved == ResolveState::Complete
            && self.children.iter().all(|child| child.status.is_terminal())
    }

    /// Display status merging the gateway sub-status, e.g. "RUNNING / mapping".
    pub fn display_status(&self) -> String {
        match self.sub_status.as_deref() {
            Some(detail) if !detail.trim().is_empty() => {
                format!("{} / {}", self.status, detail.trim())
            }
            _ => self.status.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().expect("valid test timestamp")
    }

    #[test]
    fn status_folds_provider_aliases() {
        assert_eq!(JobStatus::fold("Succeeded"), JobStatus::Done);
        assert_eq!(JobStatus::fold("FAILED"), JobStatus::Error);
        assert_eq!(JobStatus::fold("cancelled"), JobStatus::Canceled);
        assert_eq!(JobStatus::fold("STOPPED"), JobStatus::Canceled);
        assert_eq!(JobStatus::fold("PENDING"), JobStatus::Initializing);
        assert_eq!(JobStatus::fold("something-new"), JobStatus::Unknown);
        assert_eq!(ExecutionStatus::fold(""), ExecutionStatus::Unknown);
    }

    #[test]
    fn status_advance_is_forward_only() {
        assert_eq!(JobStatus::Queued.advance(JobStatus::Running), JobStatus::Running);
        assert_eq!(JobStatus::Running.advance(JobStatus::Queued), JobStatus::Running);
        assert_eq!(JobStatus::Done.advance(JobStatus::Running), JobStatus::Done);
        assert_eq!(JobStatus::Unknown.advance(JobStatus::Queued), JobStatus::Queued);
        // A terminal state can be corrected to another terminal state.
        assert_eq!(JobStatus::Error.advance(JobStatus::Canceled), JobStatus::Canceled);
        assert_eq!(
            ExecutionStatus::Running.advance(ExecutionStatus::Unknown),
            ExecutionStatus::Running
        );
    }

    #[test]
    fn fully_terminal_requires_status_children_and_resolution() {
        let mut job = FunctionJob::new("job-1");
        job.status = JobStatus::Done;
        job.children_resolved = ResolveState::Complete;
        assert!(job.is_fully_terminal());

        let mut child = ExecutionJob::new("exec-1", "job-1");
        child.status = ExecutionStatus::Running;
        job.children.push(child);
        assert!(!job.is_fully_terminal());

        job.children[0].status = ExecutionStatus::Done;
        assert!(job.is_fully_terminal());

        job.children_resolved = ResolveState::Partial;
        assert!(!job.is_fully_terminal());

        job.children_resolved = ResolveState::Complete;
        job.status = JobStatus::Running;
        assert!(!job.is_fully_terminal());
    }

    #[test]
    fn display_status_merges_sub_status() {
        let mut job = FunctionJob::new("job-1");
        job.status = JobStatus::Running;
        assert_eq!(job.display_status(), "RUNNING");
        job.sub_status = Some("mapping".to_string());
        assert_eq!(job.display_status(), "RUNNING / mapping");
        job.sub_status = Some("  ".to_string());
        assert_eq!(job.display_status(), "RUNNING");
    }

    #[test]
    fn created_at_round_trips_through_serde() {
        let mut job = FunctionJob::new("job-1");
        job.created_at = Some(ts(42));
        job.status = JobStatus::Queued;
        let encoded = serde_json::to_string(&job).expect("encode");
        let decoded: FunctionJob = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, job);
    }
}
