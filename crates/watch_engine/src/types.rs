use std::fmt;

use serde::{Deserialize, Serialize};
use watch_core::{JobId, JobStatus};

/// Longest response body excerpt kept in an error.
const BODY_EXCERPT_LEN: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("http status {status}: {detail}")]
    HttpStatus { status: u16, detail: String },
    /// `202 Accepted`: the service has nothing to return yet.
    #[error("result not ready yet")]
    NotReady,
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("cancelled")]
    Cancelled,
}

impl ApiError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout | ApiError::NotReady => true,
            ApiError::HttpStatus { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            ApiError::InvalidUrl(_) | ApiError::Decode(_) | ApiError::Cancelled => false,
        }
    }

    pub(crate) fn http_status(status: u16, body: &str) -> Self {
        ApiError::HttpStatus {
            status,
            detail: error_detail(body),
        }
    }
}

/// Prefers the service's `{"detail": ...}` message, else a body excerpt.
fn error_detail(body: &str) -> String {
    #[derive(Deserialize)]
    struct Detail {
        detail: String,
    }

    if let Ok(parsed) = serde_json::from_str::<Detail>(body) {
        return parsed.detail;
    }
    let trimmed = body.trim();
    match trimmed.char_indices().nth(BODY_EXCERPT_LEN) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

/// Body of `POST /classify`.
#[derive(Clone, Serialize)]
pub struct ClassifyRequest {
    pub token: String,
    pub min_stars: u32,
    pub exclude_forks: bool,
    pub include_archived: bool,
}

impl ClassifyRequest {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            min_stars: 0,
            exclude_forks: true,
            include_archived: false,
        }
    }
}

impl fmt::Debug for ClassifyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifyRequest")
            .field("token", &"<redacted>")
            .field("min_stars", &self.min_stars)
            .field("exclude_forks", &self.exclude_forks)
            .field("include_archived", &self.include_archived)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SubmittedJob {
    pub job_id: JobId,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct JobList {
    pub jobs: Vec<JobStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DeleteAck {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ApiError::Timeout.is_transient());
        assert!(ApiError::Network("reset".into()).is_transient());
        assert!(ApiError::NotReady.is_transient());
        assert!(ApiError::http_status(503, "").is_transient());
        assert!(ApiError::http_status(429, "").is_transient());
        assert!(!ApiError::http_status(404, "").is_transient());
        assert!(!ApiError::Decode("eof".into()).is_transient());
        assert!(!ApiError::Cancelled.is_transient());
    }

    #[test]
    fn http_status_prefers_service_detail() {
        let err = ApiError::http_status(404, r#"{"detail":"Job not found"}"#);
        assert_eq!(err.to_string(), "http status 404: Job not found");
    }

    #[test]
    fn http_status_truncates_long_bodies() {
        let body = "x".repeat(500);
        match ApiError::http_status(500, &body) {
            ApiError::HttpStatus { detail, .. } => {
                assert_eq!(detail.len(), BODY_EXCERPT_LEN + 3);
                assert!(detail.ends_with("..."));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn classify_request_debug_hides_token() {
        let request = ClassifyRequest::new("ghp_secret");
        assert!(!format!("{request:?}").contains("ghp_secret"));
    }
}
