use std::time::Duration;

use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use watch_logging::watch_trace;

use crate::retry::{with_retry, RetryPolicy};
use crate::ApiError;

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Per-attempt timeout; long because the service can be slow to answer.
    pub request_timeout: Duration,
    /// Policy for calls that do not bring their own.
    pub retry: RetryPolicy,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5 * 60),
            retry: RetryPolicy::client_default(),
        }
    }
}

/// JSON client for the job-management API with retry on transient failures.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    default_retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(settings: &ApiSettings) -> Result<Self, ApiError> {
        let base = Url::parse(&settings.base_url)
            .map_err(|err| ApiError::InvalidUrl(format!("{}: {err}", settings.base_url)))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(settings.base_url.clone()));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::Network(err.to_string()))?;

        Ok(Self {
            http,
            base,
            default_retry: settings.retry,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn default_retry(&self) -> RetryPolicy {
        self.default_retry
    }

    /// Builds `{base}/{segments...}`; each segment is percent-encoded as-is.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        {
            let mut parts = url
                .path_segments_mut()
                .map_err(|()| ApiError::InvalidUrl(self.base.to_string()))?;
            parts.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    /// Issues a request, retrying transient failures according to `policy`.
    pub async fn request<B, R>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        let label = format!("{method} {}", url.path());
        with_retry(policy, cancel, &label, || {
            self.send_once(method.clone(), url.clone(), body)
        })
        .await
    }

    async fn send_once<B, R>(&self, method: Method, url: Url, body: Option<&B>) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        watch_trace!("{method} {url}");
        let mut builder = self.http.request(method, url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            return Err(ApiError::NotReady);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::http_status(status.as_u16(), &body));
        }

        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode(err.to_string()))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout;
    }
    if err.is_decode() {
        return ApiError::Decode(err.to_string());
    }
    ApiError::Network(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_client(base: &str) -> ApiClient {
        ApiClient::new(&ApiSettings {
            base_url: base.to_string(),
            ..ApiSettings::default()
        })
        .unwrap()
    }

    #[test]
    fn endpoint_appends_segments_to_base_path() {
        let client = make_client("http://example.test/api/");
        let url = client.endpoint(&["jobs", "abc"]).unwrap();
        assert_eq!(url.as_str(), "http://example.test/api/jobs/abc");

        let client = make_client("http://example.test");
        let url = client.endpoint(&["results", "abc"]).unwrap();
        assert_eq!(url.as_str(), "http://example.test/results/abc");
    }

    #[test]
    fn endpoint_encodes_opaque_ids() {
        let client = make_client("http://example.test");
        let url = client.endpoint(&["jobs", "a/b c"]).unwrap();
        assert_eq!(url.as_str(), "http://example.test/jobs/a%2Fb%20c");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = ApiClient::new(&ApiSettings {
            base_url: "not a url".to_string(),
            ..ApiSettings::default()
        })
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidUrl(_)));
    }

    #[test]
    fn default_settings_use_long_timeout() {
        let settings = ApiSettings::default();
        assert_eq!(settings.request_timeout, Duration::from_secs(300));
        assert_eq!(settings.retry, RetryPolicy::client_default());
    }
}
