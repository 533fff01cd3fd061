use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::spec::ProjectSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum ProjectStatus {
    Draft,
    Building,
    Ready,
    Failed,
    Published,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub initial_prompt: String,
    pub current_spec: ProjectSpec,
    pub status: ProjectStatus,
    pub preview_url: Option<String>,
    pub published_url: Option<String>,
    pub watermark_enabled: bool,
}

impl Project {
    pub fn directory(&self, projects_dir: &std::path::Path) -> std::path::PathBuf {
        projects_dir.join(self.id.to_string())
    }
}
