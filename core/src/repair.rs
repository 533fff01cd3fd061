//! Repair Analyzer (C5)
//!
//! Classifies a build failure from its concatenated logs into one of a
//! fixed set of kinds, and generates a bounded minimal patch for the
//! kinds worth retrying automatically. Every patched path must re-pass
//! the editable-file predicate before write; callers that skip that
//! check risk writing outside the project's edit scope.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::diff::{is_editable_path, FileSnapshot};

pub const MAX_FILES_PER_REPAIR: usize = 3;
pub const MAX_LINES_PER_REPAIR: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    MissingDependency,
    SyntaxError,
    TypeError,
    LintError,
    ImportError,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct FailureAnalysis {
    pub kind: FailureKind,
    pub confidence: f32,
    pub fixable: bool,
}

static MISSING_MODULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Cannot find module '([^']+)'").unwrap());
static SYNTAX_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:SyntaxError|Unexpected token).*\((\d+):(\d+)\)").unwrap());
static TYPE_ERROR: Lazy<Regex> = Lazy::new(|| Regex::new(r"TypeError|Type error|TS\d+").unwrap());
static LINT_DIAGNOSTIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)(?:ESLint|eslint).*?(\d+):(\d+)\s+error\s+(.+)").unwrap()
});
static LINT_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)eslint").unwrap());
static IMPORT_ERROR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)import.*error|error.*import").unwrap());

/// Classifies the concatenated build/lint/tool logs into one failure kind.
pub fn analyze_failure(logs: &str) -> FailureAnalysis {
    if MISSING_MODULE.is_match(logs) {
        return FailureAnalysis {
            kind: FailureKind::MissingDependency,
            confidence: 0.8,
            fixable: true,
        };
    }
    if SYNTAX_ERROR.is_match(logs) {
        return FailureAnalysis {
            kind: FailureKind::SyntaxError,
            confidence: 0.75,
            fixable: true,
        };
    }
    if TYPE_ERROR.is_match(logs) {
        return FailureAnalysis {
            kind: FailureKind::TypeError,
            confidence: 0.55,
            fixable: false,
        };
    }
    if LINT_DIAGNOSTIC.is_match(logs) || LINT_TOKEN.is_match(logs) {
        return FailureAnalysis {
            kind: FailureKind::LintError,
            confidence: 0.85,
            fixable: true,
        };
    }
    if IMPORT_ERROR.is_match(logs) {
        return FailureAnalysis {
            kind: FailureKind::ImportError,
            confidence: 0.6,
            fixable: false,
        };
    }
    FailureAnalysis {
        kind: FailureKind::Unknown,
        confidence: 0.0,
        fixable: false,
    }
}

/// Generates a minimal patch (path -> new content) for a fixable failure
/// kind, bounded to `MAX_FILES_PER_REPAIR` files and `MAX_LINES_PER_REPAIR`
/// changed lines in total. Returns `None` if no safe patch could be
/// produced, or if either cap would be exceeded.
pub fn generate_repair_patch(
    analysis: &FailureAnalysis,
    logs: &str,
    snapshot: &FileSnapshot,
) -> Option<BTreeMap<String, String>> {
    match analysis.kind {
        FailureKind::MissingDependency => repair_missing_dependency(logs, snapshot),
        FailureKind::SyntaxError => repair_syntax_error(logs, snapshot),
        FailureKind::LintError => repair_lint_error(logs, snapshot),
        _ => None,
    }
}

fn repair_missing_dependency(logs: &str, snapshot: &FileSnapshot) -> Option<BTreeMap<String, String>> {
    let module = MISSING_MODULE.captures(logs)?.get(1)?.as_str();
    let last_segment = module.rsplit('/').next().unwrap_or(module);
    let base = last_segment.split('@').next().unwrap_or(last_segment);
    let path = "package.json";
    if !is_editable_path(path) {
        return None;
    }
    let content = snapshot.get(path)?;
    let mut value: serde_json::Value = serde_json::from_str(content).ok()?;
    let deps = value
        .as_object_mut()?
        .entry("dependencies")
        .or_insert_with(|| serde_json::json!({}));
    let deps_obj = deps.as_object_mut()?;
    if deps_obj.contains_key(base) {
        return None;
    }
    deps_obj.insert(base.to_string(), serde_json::Value::String("^latest".to_string()));
    let new_content = serde_json::to_string_pretty(&value).ok()? + "\n";

    let mut patch = BTreeMap::new();
    patch.insert(path.to_string(), new_content);
    Some(patch)
}

fn repair_syntax_error(logs: &str, snapshot: &FileSnapshot) -> Option<BTreeMap<String, String>> {
    let caps = SYNTAX_ERROR.captures(logs)?;
    let line_no: usize = caps.get(1)?.as_str().parse().ok()?;

    let path = find_referenced_file(logs, snapshot)?;
    let content = snapshot.get(&path)?;
    let mut lines: Vec<String> = content.lines().map(|l| l.to_string()).collect();
    let idx = line_no.checked_sub(1)?;
    let original_line = lines.get(idx)?.clone();

    let mut fixed = original_line.trim_end().to_string();
    if !fixed.ends_with(';') && !fixed.ends_with('{') && !fixed.ends_with('}') {
        fixed.push(';');
    } else if fixed.matches('"').count() % 2 == 1 {
        fixed.push('"');
    } else if fixed.matches('\'').count() % 2 == 1 {
        fixed.push('\'');
    } else {
        return None;
    }

    if fixed == original_line {
        return None;
    }
    lines[idx] = fixed;
    let new_content = lines.join("\n") + "\n";

    if changed_line_count(content, &new_content) > MAX_LINES_PER_REPAIR {
        return None;
    }

    let mut patch = BTreeMap::new();
    patch.insert(path, new_content);
    Some(patch)
}

fn repair_lint_error(logs: &str, snapshot: &FileSnapshot) -> Option<BTreeMap<String, String>> {
    let path = find_referenced_file(logs, snapshot)?;
    let content = snapshot.get(&path)?;
    let mut lines: Vec<String> = content.lines().map(|l| l.to_string()).collect();

    let touched_files = 1usize;
    let mut touched_lines = 0usize;
    let mut any_change = false;

    for caps in LINT_DIAGNOSTIC.captures_iter(logs).take(3) {
        if touched_files > MAX_FILES_PER_REPAIR {
            return None;
        }
        let line_no: usize = caps[1].parse().ok()?;
        let message = &caps[3];
        let idx = line_no.checked_sub(1)?;
        let line = lines.get(idx)?.clone();

        if message.contains("assigned a value but never used") {
            lines[idx] = format!("// {line}");
            touched_lines += 1;
            any_change = true;
        } else if message.contains("missing return type") && !line.contains(':') {
            lines[idx] = format!("{line}: unknown");
            touched_lines += 1;
            any_change = true;
        }

        if touched_lines > MAX_LINES_PER_REPAIR {
            return None;
        }
    }

    if !any_change {
        return None;
    }

    let new_content = lines.join("\n") + "\n";
    let mut patch = BTreeMap::new();
    patch.insert(path, new_content);
    Some(patch)
}

fn find_referenced_file(logs: &str, snapshot: &FileSnapshot) -> Option<String> {
    snapshot
        .keys()
        .find(|path| logs.contains(path.as_str()))
        .cloned()
        .or_else(|| snapshot.keys().next().cloned())
}

fn changed_line_count(old: &str, new: &str) -> usize {
    old.lines()
        .zip(new.lines())
        .filter(|(a, b)| a != b)
        .count()
        + old.lines().count().abs_diff(new.lines().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_missing_dependency() {
        let analysis = analyze_failure("Error: Cannot find module 'lodash'\n  at require");
        assert_eq!(analysis.kind, FailureKind::MissingDependency);
        assert!(analysis.fixable);
    }

    #[test]
    fn classifies_lint_error() {
        let analysis = analyze_failure("ESLint: src/app.tsx\n  12:5 error Missing semicolon");
        assert_eq!(analysis.kind, FailureKind::LintError);
    }

    #[test]
    fn type_error_takes_precedence_over_lint_mentions() {
        let analysis = analyze_failure("TS2322: Type error\neslint also ran and passed");
        assert_eq!(analysis.kind, FailureKind::TypeError);
        assert!(!analysis.fixable);
    }

    #[test]
    fn classifies_unknown_when_nothing_matches() {
        let analysis = analyze_failure("build succeeded with warnings");
        assert_eq!(analysis.kind, FailureKind::Unknown);
        assert!(!analysis.fixable);
    }

    #[test]
    fn missing_dependency_patch_adds_package_json_entry() {
        let mut snapshot = FileSnapshot::new();
        snapshot.insert("package.json".to_string(), "{\"dependencies\": {}}".to_string());
        let analysis = analyze_failure("Cannot find module 'lodash'");
        let patch = generate_repair_patch(&analysis, "Cannot find module 'lodash'", &snapshot).unwrap();
        let value: serde_json::Value = serde_json::from_str(&patch["package.json"]).unwrap();
        assert_eq!(value["dependencies"]["lodash"], "^latest");
    }

    #[test]
    fn missing_dependency_patch_uses_last_scoped_segment_without_version() {
        let mut snapshot = FileSnapshot::new();
        snapshot.insert("package.json".to_string(), "{\"dependencies\": {}}".to_string());
        let logs = "Error: Cannot find module '@foo/bar@2.0.0'";
        let analysis = analyze_failure(logs);
        let patch = generate_repair_patch(&analysis, logs, &snapshot).unwrap();
        let value: serde_json::Value = serde_json::from_str(&patch["package.json"]).unwrap();
        assert_eq!(value["dependencies"]["bar"], "^latest");
        assert!(value["dependencies"].get("@foo/bar@2.0.0").is_none());
    }

    #[test]
    fn syntax_error_patch_appends_semicolon() {
        let mut snapshot = FileSnapshot::new();
        snapshot.insert(
            "app/page.tsx".to_string(),
            "const a = 1\nconst b = 2;\n".to_string(),
        );
        let logs = "SyntaxError: Unexpected token (1:11) in app/page.tsx";
        let analysis = analyze_failure(logs);
        let patch = generate_repair_patch(&analysis, logs, &snapshot).unwrap();
        assert_eq!(patch["app/page.tsx"], "const a = 1;\nconst b = 2;\n");
    }
}
