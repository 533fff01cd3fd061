use orchestrator_core::diff::{generate_changes_from_prompt, FileSnapshot};
use orchestrator_core::OrchestratorError;

fn hero_snapshot() -> FileSnapshot {
    let mut snapshot = FileSnapshot::new();
    snapshot.insert(
        "components/sections/Hero.tsx".to_string(),
        "export default function Hero() { return <h1>Old</h1>; }\n".to_string(),
    );
    snapshot
}

#[test]
fn change_title_grammar_matches_h1_pattern() {
    let snapshot = hero_snapshot();
    let changes = generate_changes_from_prompt("change hero title to Welcome", &snapshot).unwrap();
    assert_eq!(changes.len(), 1);
    assert!(changes["components/sections/Hero.tsx"].contains("<h1>Welcome</h1>"));
}

#[test]
fn change_title_grammar_is_case_insensitive() {
    let snapshot = hero_snapshot();
    let changes =
        generate_changes_from_prompt("CHANGE Hero Title TO Welcome", &snapshot).unwrap();
    assert!(changes["components/sections/Hero.tsx"].contains("<h1>Welcome</h1>"));
}

#[test]
fn update_quoted_literal_grammar_rewrites_first_tsx_match() {
    let mut snapshot = FileSnapshot::new();
    snapshot.insert(
        "app/page.tsx".to_string(),
        "export const tagline = 'Ship faster';\n".to_string(),
    );
    let changes = generate_changes_from_prompt(
        r#"update "Ship faster" to "Ship smarter""#,
        &snapshot,
    )
    .unwrap();
    assert!(changes["app/page.tsx"].contains("Ship smarter"));
}

#[test]
fn unrecognized_field_is_pattern_not_found() {
    let snapshot = hero_snapshot();
    let err = generate_changes_from_prompt("change hero subtitle to Welcome", &snapshot)
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::PatternNotFound(_)));
}

#[test]
fn free_text_prompt_is_unsupported() {
    let snapshot = FileSnapshot::new();
    let err = generate_changes_from_prompt("can you make the whole site nicer", &snapshot)
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::UnsupportedPrompt(_)));
}

#[test]
fn missing_literal_in_any_tsx_file_is_pattern_not_found() {
    let mut snapshot = FileSnapshot::new();
    snapshot.insert("app/page.tsx".to_string(), "export const x = 1;\n".to_string());
    let err = generate_changes_from_prompt(r#"update "nonexistent" to "replacement""#, &snapshot)
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::PatternNotFound(_)));
}
