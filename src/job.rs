use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable 64-bit job identifier, never reused.
pub type JobId = i64;

/// Cross-load lifecycle of a job. The discriminants are the integer codes
/// the status sink expects on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrossLoadStatus {
    NotStarted,
    MovedForProcessing,
    Completed,
    Failed,
}

impl CrossLoadStatus {
    pub fn code(self) -> i32 {
        match self {
            CrossLoadStatus::NotStarted => 0,
            CrossLoadStatus::MovedForProcessing => 1,
            CrossLoadStatus::Completed => 2,
            CrossLoadStatus::Failed => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(CrossLoadStatus::NotStarted),
            1 => Some(CrossLoadStatus::MovedForProcessing),
            2 => Some(CrossLoadStatus::Completed),
            3 => Some(CrossLoadStatus::Failed),
            _ => None,
        }
    }
}

/// A job record as read from the job store. The timestamp is the last status
/// change; jobs that have never been updated carry `None`.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job_id: JobId,
    pub cross_load_status: CrossLoadStatus,
    pub last_updated_utc: Option<DateTime<Utc>>,
}

/// One inbound completion/failure notification. Consumed exactly once:
/// either decoded from a queue message or synthesized by the sweeper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionNotification {
    pub job_id: JobId,
    /// Correlating id in the external system; informational only.
    #[serde(default = "default_external_job_id")]
    pub external_job_id: String,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub storage_container: Option<String>,
    #[serde(default)]
    pub report_file_1: Option<String>,
    #[serde(default)]
    pub report_file_2: Option<String>,
}

fn default_external_job_id() -> String {
    "NA".to_string()
}

impl CompletionNotification {
    /// An absent or empty error message signals success.
    pub fn is_success(&self) -> bool {
        self.error_message.as_deref().map_or(true, str::is_empty)
    }
}
