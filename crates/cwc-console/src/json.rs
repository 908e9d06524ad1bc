//! Structured output mode: one NDJSON snapshot dump per interval, no
//! interactive key handling.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use cwc_engine::{EngineSignal, JobCache, Snapshot};
use cwc_core::WatchConfig;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Serialize)]
pub struct WatchPayload {
    pub refreshed_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_error: Option<String>,
    pub rows: Vec<RowPayload>,
}

#[derive(Debug, Serialize)]
pub struct RowPayload {
    pub job_id: String,
    pub function: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_status: Option<String>,
    pub created: Option<DateTime<Utc>>,
    /// Explicit resolution marker instead of a visual placeholder:
    /// `not_fetched`, `partial`, or `complete`.
    pub children_resolved: &'static str,
    pub execution_jobs: Vec<ExecutionPayload>,
}

#[derive(Debug, Serialize)]
pub struct ExecutionPayload {
    pub execution_job_id: String,
    /// `null` while the first status fetch is pending.
    pub status: Option<String>,
    pub backend: Option<String>,
}

/// Pure snapshot-to-payload projection; the emission loop only prints.
pub fn payload_from(snapshot: &Snapshot, limit: u32) -> WatchPayload {
    let rows = snapshot
        .jobs
        .iter()
        .take(limit.max(1) as usize)
        .map(|job| RowPayload {
            job_id: job.id.clone(),
            function: job.function_name.clone(),
            status: job.status.to_string(),
            sub_status: job.sub_status.clone(),
            created: job.created_at,
            children_resolved: job.children_resolved.as_str(),
            execution_jobs: job
                .children
                .iter()
                .map(|child| ExecutionPayload {
                    execution_job_id: child.id.clone(),
                    status: if child.status == cwc_core::ExecutionStatus::Unknown {
                        None
                    } else {
                        Some(child.status.to_string())
                    },
                    backend: child.backend_name.clone(),
                })
                .collect(),
        })
        .collect();
    WatchPayload {
        refreshed_at: snapshot.taken_at.to_rfc3339(),
        listing_error: snapshot.listing_error.clone(),
        rows,
    }
}

pub async fn run_json_watch(
    cache: Arc<JobCache>,
    config: &WatchConfig,
    mut signals: mpsc::Receiver<EngineSignal>,
) -> Result<()> {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let payload = payload_from(&cache.snapshot(), config.limit);
                println!("{}", serde_json::to_string(&payload)?);
            }
            signal = signals.recv() => {
                match signal {
                    Some(EngineSignal::Fatal(message)) => bail!(message),
                    None => bail!("engine stopped unexpectedly"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use cwc_core::{ExecutionJob, ExecutionStatus, FunctionJob, JobStatus, ResolveState};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().expect("valid test timestamp")
    }

    fn snapshot(jobs: Vec<FunctionJob>) -> Snapshot {
        Snapshot {
            jobs,
            taken_at: ts(0),
            last_refresh_at: Some(ts(0)),
            listing_error: None,
        }
    }

    #[test]
    fn limit_one_emits_exactly_one_row_with_children() {
        let mut resolved = FunctionJob::new("job-1");
        resolved.status = JobStatus::Done;
        resolved.created_at = Some(ts(20));
        resolved.children_resolved = ResolveState::Complete;
        let mut child = ExecutionJob::new("exec-1", "job-1");
        child.status = ExecutionStatus::Done;
        child.backend_name = Some("backend-1".to_string());
        resolved.children.push(child);

        let mut other = FunctionJob::new("job-2");
        other.created_at = Some(ts(10));

        let payload = payload_from(&snapshot(vec![resolved, other]), 1);
        assert_eq!(payload.rows.len(), 1);
        let row = &payload.rows[0];
        assert_eq!(row.job_id, "job-1");
        assert_eq!(row.children_resolved, "complete");
        assert_eq!(row.execution_jobs.len(), 1);
        assert_eq!(row.execution_jobs[0].status.as_deref(), Some("DONE"));
        assert_eq!(row.execution_jobs[0].backend.as_deref(), Some("backend-1"));
    }

    #[test]
    fn unresolved_fields_are_marked_not_spun() {
        let mut pending = FunctionJob::new("job-1");
        pending.status = JobStatus::Running;
        let mut child = ExecutionJob::new("exec-1", "job-1");
        child.status = ExecutionStatus::Unknown;
        pending.children.push(child);
        pending.children_resolved = ResolveState::Partial;

        let payload = payload_from(&snapshot(vec![pending]), 10);
        let row = &payload.rows[0];
        assert_eq!(row.children_resolved, "partial");
        assert_eq!(row.execution_jobs[0].status, None);
        assert_eq!(row.execution_jobs[0].backend, None);

        let encoded = serde_json::to_string(&payload).expect("encode");
        // Placeholders are a rendering concern; the structured dump never
        // carries spinner text.
        assert!(!encoded.contains('\u{2819}'));
        assert!(encoded.contains("\"status\":null"));
    }

    #[test]
    fn listing_error_is_surfaced_in_the_payload() {
        let mut snap = snapshot(Vec::new());
        snap.listing_error = Some("gateway timed out".to_string());
        let payload = payload_from(&snap, 5);
        assert_eq!(payload.listing_error.as_deref(), Some("gateway timed out"));
        assert!(payload.rows.is_empty());
    }
}
