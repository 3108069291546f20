use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque job token handed out by the classification service.
///
/// Looks like a UUID in practice but is never parsed as one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// One status snapshot as returned by `GET /jobs/{job_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: JobId,
    pub status: JobState,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp::option")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_repos: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub progress: Option<String>,
}

pub(crate) const DEFAULT_FAILURE_MESSAGE: &str = "classification failed";

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Message to show for a failed job; the service does not always attach one.
    pub fn failure_message(&self) -> String {
        self.error
            .as_deref()
            .map(str::trim)
            .filter(|msg| !msg.is_empty())
            .unwrap_or(DEFAULT_FAILURE_MESSAGE)
            .to_string()
    }
}

/// Final payload of `GET /results/{job_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    #[serde(default)]
    pub job_id: Option<JobId>,
    pub repos: Vec<ClassifiedRepo>,
    pub stats: ResultStats,
    #[serde(default, with = "timestamp::option")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedRepo {
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Aggregate statistics. Fields not modelled here stay in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultStats {
    pub total_repos: u32,
    #[serde(default)]
    pub total_stars: u64,
    #[serde(default)]
    pub avg_stars: f64,
    #[serde(default)]
    pub categories: BTreeMap<String, u32>,
    #[serde(default)]
    pub languages: BTreeMap<String, u32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ResultStats {
    /// Categories ordered by descending count, ties broken by name.
    pub fn categories_by_count(&self) -> Vec<(&str, u32)> {
        let mut ranked: Vec<_> = self
            .categories
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }
}

/// Wire timestamps: RFC 3339, or naive ISO-8601 which is read as UTC.
pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp `{raw}`")))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => super::serialize(dt, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(raw) => parse(&raw)
                    .map(Some)
                    .ok_or_else(|| de::Error::custom(format!("invalid timestamp `{raw}`"))),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn naive_timestamps_are_read_as_utc() {
        let parsed = timestamp::parse("2024-03-01T10:15:30.250000").unwrap();
        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 30).unwrap()
                + chrono::Duration::milliseconds(250)
        );
    }

    #[test]
    fn offset_timestamps_are_normalized() {
        let parsed = timestamp::parse("2024-03-01T12:00:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn status_snapshot_decodes_service_payload() {
        let raw = r#"{
            "job_id": "6f1c0c1e-0000-4000-8000-000000000001",
            "status": "failed",
            "created_at": "2024-03-01T10:00:00.000001",
            "completed_at": null,
            "total_repos": null,
            "error": "  "
        }"#;
        let status: JobStatus = serde_json::from_str(raw).unwrap();
        assert_eq!(status.status, JobState::Failed);
        assert!(status.is_terminal());
        assert_eq!(status.failure_message(), DEFAULT_FAILURE_MESSAGE);
        assert_eq!(status.job_id.as_str(), "6f1c0c1e-0000-4000-8000-000000000001");
    }

    #[test]
    fn unknown_status_is_rejected() {
        let raw = r#"{"job_id":"a","status":"queued","created_at":"2024-03-01T10:00:00"}"#;
        assert!(serde_json::from_str::<JobStatus>(raw).is_err());
    }

    #[test]
    fn stats_keep_unmodelled_fields() {
        let raw = r#"{
            "total_repos": 3,
            "total_stars": 30,
            "avg_stars": 10.0,
            "categories": {"Testing": 1, "Databases": 2},
            "languages": {"Rust": 3},
            "unique_owners": 2
        }"#;
        let stats: ResultStats = serde_json::from_str(raw).unwrap();
        assert_eq!(
            stats.categories_by_count(),
            vec![("Databases", 2), ("Testing", 1)]
        );
        assert_eq!(stats.extra.get("unique_owners"), Some(&serde_json::json!(2)));
    }
}
