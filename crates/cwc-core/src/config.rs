use crate::{FunctionJob, JobStatus};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Listing filters forwarded to the gateway and re-applied client-side for
/// the fields the gateway cannot filter on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilters {
    pub job_id: Option<String>,
    pub function_name: Option<String>,
    pub statuses: Vec<JobStatus>,
    pub created_after: Option<DateTime<Utc>>,
}

impl JobFilters {
    /// Client-side check; the gateway already filtered on status and
    /// `created_after`, but job id and function name are narrowed here.
    pub fn matches(&self, job: &FunctionJob) -> bool {
        if let Some(wanted) = self.job_id.as_deref() {
            if job.id != wanted {
                return false;
            }
        }
        if let Some(wanted) = self.function_name.as_deref() {
            if job.function_name.as_deref() != Some(wanted) {
                return false;
            }
        }
        true
    }
}

/// Immutable watch configuration, fixed at startup. No hot reloading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    pub filters: JobFilters,
    pub limit: u32,
    pub offset: u32,
    pub interval: Duration,
    pub json_mode: bool,
    pub no_color: bool,
}

impl WatchConfig {
    /// The poll interval never drops below one second; the remote services
    /// are rate-limited.
    pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

    pub fn new(filters: JobFilters, limit: u32, offset: u32, interval: Duration) -> Self {
        Self {
            filters,
            limit: limit.max(1),
            offset,
            interval: interval.max(Self::MIN_INTERVAL),
            json_mode: false,
            no_color: false,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self::new(JobFilters::default(), 50, 0, Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_narrow_by_id_and_function() {
        let mut job = FunctionJob::new("job-1");
        job.function_name = Some("provider/estimator".to_string());

        let all = JobFilters::default();
        assert!(all.matches(&job));

        let by_id = JobFilters {
            job_id: Some("job-1".to_string()),
            ..Default::default()
        };
        assert!(by_id.matches(&job));

        let wrong_id = JobFilters {
            job_id: Some("job-2".to_string()),
            ..Default::default()
        };
        assert!(!wrong_id.matches(&job));

        let by_function = JobFilters {
            function_name: Some("provider/estimator".to_string()),
            ..Default::default()
        };
        assert!(by_function.matches(&job));

        let wrong_function = JobFilters {
            function_name: Some("provider/sampler".to_string()),
            ..Default::default()
        };
        assert!(!wrong_function.matches(&job));
    }

    #[test]
    fn config_clamps_interval_and_limit() {
        let config = WatchConfig::new(JobFilters::default(), 0, 0, Duration::from_millis(50));
        assert_eq!(config.interval, WatchConfig::MIN_INTERVAL);
        assert_eq!(config.limit, 1);
    }
}
