//! `reqwest`-backed implementations of the two service traits.

use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::interface::{
    dedup_by_id, ExecutionJobRecord, FunctionJobRecord, GatewayService, RuntimeService,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cwc_core::{ExecutionJob, FunctionJob, JobFilters, JobStatus};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Default, Deserialize)]
struct JobListPage {
    #[serde(default)]
    results: Vec<FunctionJobRecord>,
}

#[derive(Debug, Default, Deserialize)]
struct ExecutionListPage {
    #[serde(default)]
    executions: Vec<ExecutionJobRecord>,
}

#[derive(Debug, Default, Deserialize)]
struct LogsPayload {
    #[serde(default)]
    logs: String,
}

fn build_http_client() -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|err| SourceError::Config(format!("http client: {err}")))
}

/// Client for the compute gateway (parent job service).
pub struct HttpGateway {
    client: reqwest::Client,
    base: String,
    token: String,
}

impl HttpGateway {
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_http_client()?,
            base: config.gateway_host.trim_end_matches('/').to_string(),
            token: config.gateway_token.clone(),
        })
    }

    async fn list_page(
        &self,
        status: Option<JobStatus>,
        created_after: Option<DateTime<Utc>>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<FunctionJobRecord>, SourceError> {
        let url = format!("{}/api/v1/jobs", self.base);
        let mut request = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("limit", limit.to_string()), ("offset", offset.to_string())]);
        if let Some(created_after) = created_after {
            request = request.query(&[("created_after", created_after.to_rfc3339())]);
        }
        if let Some(status) = status {
            request = request.query(&[("status", status.to_string())]);
        }

        let response = request
            .send()
            .await
            .map_err(|err| SourceError::Transient(format!("list jobs: {err}")))?;
        let code = response.status();
        if !code.is_success() {
            return Err(SourceError::from_status(code.as_u16(), "list jobs"));
        }
        let page: JobListPage = response
            .json()
            .await
            .map_err(|err| SourceError::Transient(format!("decode job listing: {err}")))?;
        debug!(event = "gateway_list_page", rows = page.results.len(), ?status);
        Ok(page.results)
    }
}

#[async_trait]
impl GatewayService for HttpGateway {
    async fn list_jobs(
        &self,
        filters: &JobFilters,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<FunctionJob>, SourceError> {
        let rows = if filters.statuses.is_empty() {
            self.list_page(None, filters.created_after, limit, offset).await?
        } else {
            // The gateway filters on one status per request; fan out and
            // re-join by id.
            let mut all = Vec::new();
            for status in &filters.statuses {
                all.extend(
                    self.list_page(Some(*status), filters.created_after, limit, offset)
                        .await?,
                );
            }
            all
        };
        Ok(dedup_by_id(
            rows.into_iter().map(FunctionJobRecord::into_job).collect(),
        ))
    }

    async fn job_logs(&self, job_id: &str) -> Result<String, SourceError> {
        let url = format!("{}/api/v1/jobs/{job_id}/logs", self.base);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|err| SourceError::Transient(format!("fetch logs: {err}")))?;
        let code = response.status();
        if !code.is_success() {
            return Err(SourceError::from_status(code.as_u16(), &format!("logs for {job_id}")));
        }
        let payload: LogsPayload = response
            .json()
            .await
            .map_err(|err| SourceError::Transient(format!("decode logs: {err}")))?;
        Ok(payload.logs)
    }

    async fn stop_job(&self, job_id: &str) -> Result<(), SourceError> {
        let url = format!("{}/api/v1/jobs/{job_id}/stop", self.base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|err| SourceError::Transient(format!("stop job: {err}")))?;
        let code = response.status();
        if !code.is_success() {
            return Err(SourceError::from_cancel_status(code.as_u16(), &format!("stop {job_id}")));
        }
        Ok(())
    }
}

/// Client for the runtime service (child job service).
pub struct HttpRuntime {
    client: reqwest::Client,
    base: String,
    token: String,
    instance: String,
    channel: String,
}

impl HttpRuntime {
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_http_client()?,
            base: config.runtime_url.trim_end_matches('/').to_string(),
            token: config.runtime_token.clone(),
            instance: config.runtime_instance.clone(),
            channel: config.runtime_channel.clone(),
        })
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Service-Instance", &self.instance)
            .header("Service-Channel", &self.channel)
    }
}

#[async_trait]
impl RuntimeService for HttpRuntime {
    async fn execution_jobs(&self, parent_id: &str) -> Result<Vec<ExecutionJob>, SourceError> {
        let url = format!("{}/api/v1/executions", self.base);
        let response = self
            .request(reqwest::Method::GET, url)
            .query(&[("parent", parent_id)])
            .send()
            .await
            .map_err(|err| SourceError::Transient(format!("list executions: {err}")))?;
        let code = response.status();
        if !code.is_success() {
            return Err(SourceError::from_status(
                code.as_u16(),
                &format!("executions of {parent_id}"),
            ));
        }
        let page: ExecutionListPage = response
            .json()
            .await
            .map_err(|err| SourceError::Transient(format!("decode execution listing: {err}")))?;
        let fetched_at = Utc::now();
        debug!(event = "runtime_list_executions", parent = parent_id, rows = page.executions.len());
        Ok(page
            .executions
            .into_iter()
            .map(|record| record.into_job(parent_id, fetched_at))
            .collect())
    }

    async fn job_logs(&self, job_id: &str) -> Result<String, SourceError> {
        let url = format!("{}/api/v1/executions/{job_id}/logs", self.base);
        let response = self
            .request(reqwest::Method::GET, url)
            .send()
            .await
            .map_err(|err| SourceError::Transient(format!("fetch logs: {err}")))?;
        let code = response.status();
        if !code.is_success() {
            return Err(SourceError::from_status(code.as_u16(), &format!("logs for {job_id}")));
        }
        let payload: LogsPayload = response
            .json()
            .await
            .map_err(|err| SourceError::Transient(format!("decode logs: {err}")))?;
        Ok(payload.logs)
    }

    async fn cancel_job(&self, job_id: &str) -> Result<(), SourceError> {
        let url = format!("{}/api/v1/executions/{job_id}/cancel", self.base);
        let response = self
            .request(reqwest::Method::POST, url)
            .send()
            .await
            .map_err(|err| SourceError::Transient(format!("cancel job: {err}")))?;
        let code = response.status();
        if !code.is_success() {
            return Err(SourceError::from_cancel_status(
                code.as_u16(),
                &format!("cancel {job_id}"),
            ));
        }
        Ok(())
    }
}
