use reqwest::Method;
use tokio_util::sync::CancellationToken;
use watch_core::{JobId, JobStatus, ResultPayload};
use watch_logging::watch_info;

use crate::client::ApiClient;
use crate::retry::RetryPolicy;
use crate::types::{DeleteAck, JobList, SubmittedJob};
use crate::{ApiError, ClassifyRequest, HealthStatus, WatchSettings};

/// The two calls a watch session makes against the service.
#[async_trait::async_trait]
pub trait JobApi: Send + Sync {
    /// `GET /jobs/{job_id}` under the status retry policy.
    async fn job_status(
        &self,
        job_id: &JobId,
        cancel: &CancellationToken,
    ) -> Result<JobStatus, ApiError>;

    /// `GET /results/{job_id}` under the result retry policy.
    async fn job_result(
        &self,
        job_id: &JobId,
        cancel: &CancellationToken,
    ) -> Result<ResultPayload, ApiError>;
}

/// [`JobApi`] over HTTP, plus the calls used outside a watch session.
#[derive(Debug, Clone)]
pub struct HttpJobApi {
    client: ApiClient,
    status_retry: RetryPolicy,
    result_retry: RetryPolicy,
}

impl HttpJobApi {
    pub fn new(client: ApiClient, settings: &WatchSettings) -> Self {
        Self {
            client,
            status_retry: settings.status_retry,
            result_retry: settings.result_retry,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub async fn submit_job(&self, request: &ClassifyRequest) -> Result<JobId, ApiError> {
        let submitted: SubmittedJob = self
            .client
            .request(
                Method::POST,
                &["classify"],
                Some(request),
                &self.client.default_retry(),
                &CancellationToken::new(),
            )
            .await?;
        watch_info!("Submitted classification job {}", submitted.job_id);
        Ok(submitted.job_id)
    }

    pub async fn list_jobs(&self) -> Result<Vec<JobStatus>, ApiError> {
        let list: JobList = self.get(&["jobs"], &self.client.default_retry()).await?;
        Ok(list.jobs)
    }

    pub async fn delete_job(&self, job_id: &JobId) -> Result<String, ApiError> {
        let ack: DeleteAck = self
            .client
            .request(
                Method::DELETE,
                &["jobs", job_id.as_str()],
                None::<&()>,
                &self.client.default_retry(),
                &CancellationToken::new(),
            )
            .await?;
        watch_info!("Deleted job {job_id}");
        Ok(ack.message)
    }

    /// Single attempt; used as a reachability check.
    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.get(&["health"], &RetryPolicy::None).await
    }

    async fn get<R: serde::de::DeserializeOwned>(
        &self,
        segments: &[&str],
        policy: &RetryPolicy,
    ) -> Result<R, ApiError> {
        self.client
            .request(
                Method::GET,
                segments,
                None::<&()>,
                policy,
                &CancellationToken::new(),
            )
            .await
    }
}

#[async_trait::async_trait]
impl JobApi for HttpJobApi {
    async fn job_status(
        &self,
        job_id: &JobId,
        cancel: &CancellationToken,
    ) -> Result<JobStatus, ApiError> {
        self.client
            .request(
                Method::GET,
                &["jobs", job_id.as_str()],
                None::<&()>,
                &self.status_retry,
                cancel,
            )
            .await
    }

    async fn job_result(
        &self,
        job_id: &JobId,
        cancel: &CancellationToken,
    ) -> Result<ResultPayload, ApiError> {
        self.client
            .request(
                Method::GET,
                &["results", job_id.as_str()],
                None::<&()>,
                &self.result_retry,
                cancel,
            )
            .await
    }
}
