use orchestrator_core::diff::FileSnapshot;
use orchestrator_core::repair::{analyze_failure, generate_repair_patch, FailureKind};

#[test]
fn missing_dependency_classification_and_patch() {
    let logs = "Module not found: Error: Cannot find module 'axios'\n  at Object.<anonymous>";
    let analysis = analyze_failure(logs);
    assert_eq!(analysis.kind, FailureKind::MissingDependency);
    assert!(analysis.fixable);

    let mut snapshot = FileSnapshot::new();
    snapshot.insert("package.json".to_string(), "{\"dependencies\": {\"react\": \"^18\"}}".to_string());

    let patch = generate_repair_patch(&analysis, logs, &snapshot).unwrap();
    let value: serde_json::Value = serde_json::from_str(&patch["package.json"]).unwrap();
    assert_eq!(value["dependencies"]["axios"], "^latest");
    assert_eq!(value["dependencies"]["react"], "^18");
}

#[test]
fn type_errors_are_classified_but_not_fixable() {
    let logs = "TS2322: Type 'string' is not assignable to type 'number'.";
    let analysis = analyze_failure(logs);
    assert_eq!(analysis.kind, FailureKind::TypeError);
    assert!(!analysis.fixable);

    let snapshot = FileSnapshot::new();
    assert!(generate_repair_patch(&analysis, logs, &snapshot).is_none());
}

#[test]
fn lint_error_comments_out_unused_variable() {
    let mut snapshot = FileSnapshot::new();
    snapshot.insert(
        "app/page.tsx".to_string(),
        "const unused = 42;\nexport default function Page() { return null; }\n".to_string(),
    );
    let logs = "app/page.tsx\neslint: 1:7 error 'unused' is assigned a value but never used";
    let analysis = analyze_failure(logs);
    assert_eq!(analysis.kind, FailureKind::LintError);

    let patch = generate_repair_patch(&analysis, logs, &snapshot).unwrap();
    assert!(patch["app/page.tsx"].starts_with("// const unused = 42;"));
}

#[test]
fn already_exists_dependency_yields_no_patch() {
    let logs = "Error: Cannot find module 'react'";
    let analysis = analyze_failure(logs);
    let mut snapshot = FileSnapshot::new();
    snapshot.insert("package.json".to_string(), "{\"dependencies\": {\"react\": \"^18\"}}".to_string());
    assert!(generate_repair_patch(&analysis, logs, &snapshot).is_none());
}

#[test]
fn unknown_failure_has_zero_confidence_and_no_patch() {
    let logs = "random noise that matches nothing";
    let analysis = analyze_failure(logs);
    assert_eq!(analysis.kind, FailureKind::Unknown);
    assert_eq!(analysis.confidence, 0.0);
    assert!(generate_repair_patch(&analysis, logs, &FileSnapshot::new()).is_none());
}
