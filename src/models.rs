//! Wire types exchanged with the training API.
//!
//! Every type here mirrors a JSON document the backend produces or accepts.
//! The client never derives scores or proficiency itself; those fields only
//! ever arrive inside an [`AttemptResponse`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Id = i64;

/// A training task, e.g. "Palm needle driver".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Id,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Pass/fail thresholds for one proficiency tier of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStandard {
    pub id: Id,
    pub level: String,
    pub target_time_seconds: u32,
    pub max_minor_errors: u32,
    pub max_major_errors: u32,
    pub consecutive_required: u32,
    #[serde(default)]
    pub objective_criteria: Option<serde_json::Value>,
}

impl TaskStandard {
    /// One-line summary used in pickers and tables.
    pub fn summary(&self) -> String {
        format!(
            "Target {}s • Minor ≤ {} • Major ≤ {}",
            self.target_time_seconds, self.max_minor_errors, self.max_major_errors
        )
    }

    pub fn aim(&self) -> String {
        format!(
            "Aim to stay under {}s with no more than {} minor and {} major errors.",
            self.target_time_seconds, self.max_minor_errors, self.max_major_errors
        )
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Minor,
    Major,
    Critical,
}

/// A self-reported mistake from the fixed error vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorType {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptErrorIn {
    pub error_type_id: Id,
}

/// Request body for `POST /attempts/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptCreate {
    pub task_id: Id,
    pub standard_id: Id,
    #[serde(with = "timestamp")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub ended_at: DateTime<Utc>,
    pub errors: Vec<AttemptErrorIn>,
}

/// A scored attempt as computed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptResponse {
    pub id: Id,
    pub task_id: Id,
    pub standard_id: Id,
    #[serde(with = "timestamp")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub ended_at: DateTime<Utc>,
    pub time_seconds: i64,
    pub score: i64,
    pub proficiency: bool,
    #[serde(default)]
    pub errors: Vec<ErrorType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Id,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTaskSummary {
    pub task_id: Id,
    pub task_name: String,
    #[serde(default)]
    pub best_time_seconds: Option<i64>,
    #[serde(default)]
    pub best_score: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub proficient_tasks: u32,
    pub total_tasks: u32,
    #[serde(default)]
    pub task_details: Vec<UserTaskSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: Id,
    pub user_email: String,
    pub task_id: Id,
    pub task_name: String,
    pub score: i64,
    pub time_seconds: i64,
}

/// ISO-8601 timestamps: millisecond precision with a `Z` suffix on the way
/// out, RFC 3339 or naive UTC on the way in.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}")))
    }
}
