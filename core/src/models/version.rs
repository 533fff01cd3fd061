use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::spec::ProjectSpec;

/// Disjoint categorization of the files touched by one iteration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CodeDiff {
    pub modified: BTreeMap<String, String>,
    pub added: Vec<String>,
    pub deleted: Vec<String>,
}

impl CodeDiff {
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.added.is_empty() && self.deleted.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.modified.len() + self.added.len() + self.deleted.len()
    }
}

/// An append-only, strictly-numbered record of a project's state after
/// one accepted edit. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    pub id: Uuid,
    pub project_id: Uuid,
    pub version_number: i32,
    pub spec_snapshot: ProjectSpec,
    pub code_diff: Option<CodeDiff>,
    pub created_by: Uuid,
}
