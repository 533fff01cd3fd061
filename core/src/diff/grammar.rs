//! Prompt grammar (C3): a small, deliberately non-semantic pattern
//! matcher. The orchestrator does not guess at intent outside these
//! two shapes; authoring intent beyond them is persisted for future
//! AI substitution but never acted on here.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{OrchestratorError, Result};

use super::scope::{enforce_change_limits, is_editable_path};
use super::FileSnapshot;

static CHANGE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)^change\s+(\S+)\s+(\S+)\s+to\s+(.+)$"#).unwrap());

static UPDATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)^update\s+"([^"]+)"\s+to\s+"([^"]+)"$"#).unwrap());

/// Title substitution patterns, tried in order against a component file.
static TITLE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?s)(<h1[^>]*>)(.*?)(</h1>)").unwrap(),
        Regex::new(r#"(?m)("title"\s*:\s*")([^"]*)(")"#).unwrap(),
        Regex::new(r"(?m)(title\s*:\s*')([^']*)(')").unwrap(),
    ]
});

/// Returns the map of modified files (`path -> new content`) produced by
/// the prompt, or a grammar/scope error. Never touches the filesystem.
pub fn generate_changes_from_prompt(
    message: &str,
    snapshot: &FileSnapshot,
) -> Result<BTreeMap<String, String>> {
    let trimmed = message.trim();

    let changes = if let Some(caps) = CHANGE_PATTERN.captures(trimmed) {
        let component = &caps[1];
        let field = caps[2].to_lowercase();
        let value = caps[3].trim();
        change_component_field(component, &field, value, snapshot)?
    } else if let Some(caps) = UPDATE_PATTERN.captures(trimmed) {
        let old = &caps[1];
        let new = &caps[2];
        update_literal(old, new, snapshot)?
    } else {
        return Err(OrchestratorError::UnsupportedPrompt(message.to_string()));
    };

    enforce_change_limits(&changes)?;
    Ok(changes)
}

fn find_component_file<'a>(component: &str, snapshot: &'a FileSnapshot) -> Option<&'a str> {
    let lower = component.to_lowercase();
    let capitalized = capitalize(component);

    let candidates = [
        format!("components/sections/{lower}.tsx"),
        format!("components/sections/{capitalized}.tsx"),
        format!("app/{lower}/page.tsx"),
        format!("components/{lower}.tsx"),
        format!("components/{capitalized}.tsx"),
    ];

    for candidate in &candidates {
        if let Some((path, _)) = snapshot.get_key_value(candidate.as_str()) {
            return Some(path.as_str());
        }
    }

    let target_name = format!("{lower}.tsx");
    snapshot
        .keys()
        .find(|path| {
            path.rsplit('/')
                .next()
                .map(|f| f.to_lowercase() == target_name)
                .unwrap_or(false)
        })
        .map(|s| s.as_str())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn change_component_field(
    component: &str,
    field: &str,
    value: &str,
    snapshot: &FileSnapshot,
) -> Result<BTreeMap<String, String>> {
    let path = find_component_file(component, snapshot)
        .ok_or_else(|| OrchestratorError::PatternNotFound(format!("component {component}")))?;

    if field != "title" {
        return Err(OrchestratorError::PatternNotFound(format!("field {field}")));
    }

    if !is_editable_path(path) {
        return Err(OrchestratorError::InvalidPath(path.to_string()));
    }

    let content = &snapshot[path];
    for pattern in TITLE_PATTERNS.iter() {
        if pattern.is_match(content) {
            let replaced = pattern.replace(content, |caps: &regex::Captures| {
                format!("{}{}{}", &caps[1], value, &caps[3])
            });
            let mut out = BTreeMap::new();
            out.insert(path.to_string(), replaced.into_owned());
            return Ok(out);
        }
    }

    Err(OrchestratorError::PatternNotFound(format!(
        "no title pattern matched in {path}"
    )))
}

fn update_literal(
    old: &str,
    new: &str,
    snapshot: &FileSnapshot,
) -> Result<BTreeMap<String, String>> {
    for (path, content) in snapshot.iter() {
        if !path.ends_with(".tsx") || !is_editable_path(path) {
            continue;
        }
        if content.contains(old) {
            let mut out = BTreeMap::new();
            out.insert(path.clone(), content.replacen(old, new, 1));
            return Ok(out);
        }
    }
    Err(OrchestratorError::PatternNotFound(format!("literal {old:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(path: &str, content: &str) -> FileSnapshot {
        let mut s = FileSnapshot::new();
        s.insert(path.to_string(), content.to_string());
        s
    }

    #[test]
    fn change_title_rewrites_h1() {
        let snapshot = snapshot_with(
            "components/sections/Hero.tsx",
            "export default function Hero() { return <h1>Old</h1>; }",
        );
        let changes = generate_changes_from_prompt("change hero title to Welcome", &snapshot)
            .unwrap();
        let updated = &changes["components/sections/Hero.tsx"];
        assert!(updated.contains("<h1>Welcome</h1>"));
    }

    #[test]
    fn update_literal_rewrites_first_match() {
        let snapshot = snapshot_with("app/page.tsx", "const x = 'Old'; const y = 'Old';");
        let changes = generate_changes_from_prompt(r#"update "Old" to "New""#, &snapshot).unwrap();
        assert_eq!(
            changes["app/page.tsx"],
            "const x = 'New'; const y = 'Old';"
        );
    }

    #[test]
    fn unsupported_prompt_is_rejected() {
        let snapshot = FileSnapshot::new();
        let err = generate_changes_from_prompt("please make it prettier", &snapshot).unwrap_err();
        assert!(matches!(err, OrchestratorError::UnsupportedPrompt(_)));
    }

    #[test]
    fn missing_component_file_is_pattern_not_found() {
        let snapshot = FileSnapshot::new();
        let err = generate_changes_from_prompt("change hero title to Welcome", &snapshot)
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::PatternNotFound(_)));
    }
}
