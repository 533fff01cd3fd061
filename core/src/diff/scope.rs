//! Edit scope validation: which paths this orchestrator is willing to
//! touch at all, independent of whether a particular prompt matches.

use std::collections::BTreeMap;
use std::path::{Component, Path};

use crate::error::{OrchestratorError, Result};

pub const MAX_FILES_PER_CHANGE: usize = 10;
pub const MAX_LINES_PER_FILE: usize = 1000;

const ALLOWED_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "css", "json", "md", "txt"];
const FORBIDDEN_SEGMENTS: &[&str] = &["node_modules", ".next", ".git", "dist", "build"];

/// A path is editable iff it stays within the project root (no `..`
/// escape), its extension is in the allow-list, and no path segment
/// names a forbidden directory.
pub fn is_editable_path(path: &str) -> bool {
    let p = Path::new(path);

    if p.components().any(|c| matches!(c, Component::ParentDir | Component::RootDir)) {
        return false;
    }

    let ext_ok = p
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| ALLOWED_EXTENSIONS.contains(&e))
        .unwrap_or(false);
    if !ext_ok {
        return false;
    }

    !p.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| FORBIDDEN_SEGMENTS.contains(&s))
            .unwrap_or(false)
    })
}

/// Guards against oversized changes: no more than `MAX_FILES_PER_CHANGE`
/// files touched, and no single file's new content over
/// `MAX_LINES_PER_FILE` lines.
pub fn enforce_change_limits(changes: &BTreeMap<String, String>) -> Result<()> {
    if changes.len() > MAX_FILES_PER_CHANGE {
        return Err(OrchestratorError::ChangeTooLarge(format!(
            "too many files to change ({} > {MAX_FILES_PER_CHANGE})",
            changes.len()
        )));
    }
    for (path, content) in changes {
        let line_count = content.lines().count();
        if line_count > MAX_LINES_PER_FILE {
            return Err(OrchestratorError::ChangeTooLarge(format!(
                "{path} exceeds maximum line count ({line_count} > {MAX_LINES_PER_FILE})"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_allowed_extensions_within_scope() {
        assert!(is_editable_path("components/sections/Hero.tsx"));
        assert!(is_editable_path("app/page.tsx"));
        assert!(is_editable_path("package.json"));
        assert!(is_editable_path("README.md"));
    }

    #[test]
    fn rejects_disallowed_extensions() {
        assert!(!is_editable_path("scripts/deploy.sh"));
        assert!(!is_editable_path("Cargo.lock"));
    }

    #[test]
    fn rejects_path_traversal() {
        assert!(!is_editable_path("../etc/passwd.txt"));
        assert!(!is_editable_path("/etc/passwd.json"));
    }

    #[test]
    fn rejects_forbidden_directories() {
        assert!(!is_editable_path("node_modules/pkg/index.js"));
        assert!(!is_editable_path(".next/cache/foo.json"));
        assert!(!is_editable_path(".git/config.txt"));
        assert!(!is_editable_path("dist/bundle.js"));
    }

    #[test]
    fn rejects_too_many_files() {
        let changes: BTreeMap<String, String> = (0..=MAX_FILES_PER_CHANGE)
            .map(|i| (format!("file{i}.tsx"), "content".to_string()))
            .collect();
        let err = enforce_change_limits(&changes).unwrap_err();
        assert!(matches!(err, OrchestratorError::ChangeTooLarge(_)));
    }

    #[test]
    fn rejects_a_file_over_the_line_cap() {
        let mut changes = BTreeMap::new();
        let oversized = "line\n".repeat(MAX_LINES_PER_FILE + 1);
        changes.insert("big.tsx".to_string(), oversized);
        let err = enforce_change_limits(&changes).unwrap_err();
        assert!(matches!(err, OrchestratorError::ChangeTooLarge(_)));
    }

    #[test]
    fn accepts_changes_within_both_caps() {
        let mut changes = BTreeMap::new();
        changes.insert("small.tsx".to_string(), "line\n".repeat(10));
        enforce_change_limits(&changes).unwrap();
    }
}
