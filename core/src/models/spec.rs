use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structured description of a project's state at a version. A tagged
/// record rather than an arbitrary map, per the design note on dynamic
/// config objects: pages/components/theme are named fields, and the
/// authoring metadata overlaid on each prompt iteration is explicit.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProjectSpec {
    pub pages: Vec<String>,
    pub components: Vec<String>,
    pub theme: Theme,
    pub last_update: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub primary_color: String,
    pub secondary_color: String,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            primary_color: "#0ea5e9".to_string(),
            secondary_color: "#1e293b".to_string(),
        }
    }
}

impl ProjectSpec {
    /// Placeholder for future AI-driven spec synthesis: overlays
    /// authoring metadata onto a copy of the current spec without
    /// otherwise interpreting the message.
    pub fn with_update(&self, message: &str, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.last_update = Some(message.to_string());
        next.updated_at = Some(now);
        next
    }

    pub fn initial(project_name: &str) -> Self {
        ProjectSpec {
            pages: vec!["/".to_string()],
            components: vec!["Hero".to_string()],
            theme: Theme::default(),
            last_update: Some(format!("created project {project_name}")),
            updated_at: None,
        }
    }
}
