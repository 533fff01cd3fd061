use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum BuildStatus {
    Pending,
    Building,
    Repairing,
    Success,
    Failed,
}

/// One logical build per version. `attempt_number` increments in place
/// across the repair loop; the row is never duplicated per attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Build {
    pub id: Uuid,
    pub project_id: Uuid,
    pub version_id: Uuid,
    pub status: BuildStatus,
    pub attempt_number: i32,
    pub build_logs: String,
    pub lint_output: String,
    pub build_output: String,
    pub error_message: Option<String>,
    pub preview_url: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Build {
    pub fn new_pending(project_id: Uuid, version_id: Uuid) -> Self {
        Build {
            id: Uuid::new_v4(),
            project_id,
            version_id,
            status: BuildStatus::Pending,
            attempt_number: 0,
            build_logs: String::new(),
            lint_output: String::new(),
            build_output: String::new(),
            error_message: None,
            preview_url: None,
            completed_at: None,
        }
    }
}
