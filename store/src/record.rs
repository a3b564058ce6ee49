//! Task record: the canonical, serialized state of one submitted unit of work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `max_retries` from the spec's constants table. A task that fails transiently
/// more than this many times is finalized as `failed` with reason
/// `"exhausted retries"`.
pub const MAX_RETRIES: u32 = 5;

/// Rolling TTL applied to every write of a task record.
pub const TASK_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Short,
    Long,
}

impl JobType {
    /// Priority-queue score: lowest-score-first consumption makes `short`
    /// jobs drain ahead of `long` ones (shortest-job-first).
    pub fn priority_score(&self) -> f64 {
        match self {
            JobType::Short => 1.0,
            JobType::Long => 2.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Short => "short",
            JobType::Long => "long",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "short" => Some(JobType::Short),
            "long" => Some(JobType::Long),
            _ => None,
        }
    }
}

/// A task's lifecycle state. `Queued` -> `Running` -> (`Retrying` -> `Queued`
/// via retry | `Success` | `Failed`). `Success` and `Failed` are terminal.
///
/// `Retrying` is additive: it distinguishes "waiting out a backoff" from
/// "currently executing" without reusing `Running` for both, per the open
/// question in spec §9. External consumers that only distinguish terminal
/// vs non-terminal status are unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Queued,
    Running,
    Retrying,
    Success,
    Failed,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Success | Status::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub job_type: JobType,
    pub payload: String,
    pub status: Status,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub result: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub error: String,
}

impl TaskRecord {
    pub fn new(id: String, job_type: JobType, payload: String) -> Self {
        Self {
            id,
            job_type,
            payload,
            status: Status::Queued,
            submitted_at: Utc::now(),
            started_at: None,
            completed_at: None,
            retry_count: 0,
            result: String::new(),
            error: String::new(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let mut t = TaskRecord::new("abc".into(), JobType::Short, "payload".into());
        t.status = Status::Success;
        t.completed_at = Some(Utc::now());
        t.result = "Task completed successfully".into();

        let json = t.to_json().unwrap();
        let back = TaskRecord::from_json(&json).unwrap();

        assert_eq!(back.id, t.id);
        assert_eq!(back.status, t.status);
        assert_eq!(back.result, t.result);
        assert_eq!(back.completed_at.unwrap().timestamp(), t.completed_at.unwrap().timestamp());
    }

    #[test]
    fn omitted_optional_fields_round_trip_as_none() {
        let t = TaskRecord::new("abc".into(), JobType::Long, "p".into());
        let json = t.to_json().unwrap();
        assert!(!json.contains("started_at"));
        assert!(!json.contains("completed_at"));
        let back = TaskRecord::from_json(&json).unwrap();
        assert!(back.started_at.is_none());
        assert!(back.completed_at.is_none());
    }

    #[test]
    fn priority_scores_match_shortest_job_first() {
        assert_eq!(JobType::Short.priority_score(), 1.0);
        assert_eq!(JobType::Long.priority_score(), 2.0);
        assert!(JobType::Short.priority_score() < JobType::Long.priority_score());
    }
}
