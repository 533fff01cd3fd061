//! Diff Engine (C3)
//!
//! Validates edit scope, translates the prompt grammar into file
//! changes, computes unified diffs, and applies them under a
//! save-originals/apply-all/verify/restore-on-failure transaction.

mod apply;
mod grammar;
mod scope;
mod unified;

pub use apply::{apply_and_verify, LintVerifier, LocalVerifier, NoopVerifier};
pub use grammar::generate_changes_from_prompt;
pub use scope::{is_editable_path, MAX_FILES_PER_CHANGE, MAX_LINES_PER_FILE};
pub use unified::unified_diff;

use std::collections::BTreeMap;

/// In-memory view of a project's in-scope files: path -> content.
pub type FileSnapshot = BTreeMap<String, String>;
