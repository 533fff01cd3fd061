use orchestrator_core::diff::is_editable_path;
use proptest::prelude::*;

#[test]
fn forbidden_directories_are_never_editable() {
    for dir in ["node_modules", ".next", ".git", "dist", "build"] {
        let path = format!("{dir}/nested/file.tsx");
        assert!(!is_editable_path(&path), "{path} should not be editable");
    }
}

#[test]
fn disallowed_extensions_are_never_editable() {
    for ext in ["rs", "sh", "lock", "png", "env"] {
        let path = format!("src/main.{ext}");
        assert!(!is_editable_path(&path), "{path} should not be editable");
    }
}

proptest! {
    #[test]
    fn any_path_escaping_the_root_is_rejected(
        segments in proptest::collection::vec("[a-z]{1,8}", 0..5),
        name in "[a-z]{1,8}",
    ) {
        let mut path = String::from("../");
        for seg in &segments {
            path.push_str(seg);
            path.push('/');
        }
        path.push_str(&name);
        path.push_str(".tsx");
        prop_assert!(!is_editable_path(&path));
    }

    #[test]
    fn allowed_extension_outside_forbidden_dirs_is_editable(
        segments in proptest::collection::vec(
            "[a-zA-Z][a-zA-Z0-9]{0,8}".prop_filter("not a forbidden dir", |s| {
                !["node_modules", ".next", ".git", "dist", "build"].contains(&s.as_str())
            }),
            0..4,
        ),
        name in "[a-zA-Z][a-zA-Z0-9]{1,8}",
        ext in prop_oneof![
            Just("ts"), Just("tsx"), Just("js"), Just("jsx"),
            Just("css"), Just("json"), Just("md"), Just("txt"),
        ],
    ) {
        let mut path = String::new();
        for seg in &segments {
            path.push_str(seg);
            path.push('/');
        }
        path.push_str(&name);
        path.push('.');
        path.push_str(ext);
        prop_assert!(is_editable_path(&path));
    }
}
