use ctx_fs::NormalizedPath;
use rstest::rstest;

#[rstest]
#[case("foo/bar/baz", "foo/bar/baz")]
#[case("foo\\bar\\baz", "foo/bar/baz")]
#[case("foo/bar\\baz", "foo/bar/baz")]
#[case("foo//bar/./baz/", "foo/bar/baz")]
#[case("/project/docs/../AI_CONTEXT.md", "/project/AI_CONTEXT.md")]
fn test_normalization(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(NormalizedPath::new(input).as_str(), expected);
}

#[test]
fn test_join_paths() {
    let base = NormalizedPath::new("foo/bar");
    assert_eq!(base.join("baz").as_str(), "foo/bar/baz");
    assert_eq!(base.join("../qux").as_str(), "foo/qux");
}

#[test]
fn test_join_onto_empty_path() {
    let base = NormalizedPath::new("");
    assert_eq!(base.join("CLAUDE.md").as_str(), "CLAUDE.md");
}

#[test]
fn test_to_native_returns_pathbuf() {
    let path = NormalizedPath::new("foo/bar");
    assert!(path.to_native().to_string_lossy().contains("bar"));
}

#[test]
fn test_unc_prefix_survives_cleaning() {
    let path = NormalizedPath::new("\\\\server\\share\\..\\notes.md");
    assert_eq!(path.as_str(), "//server/notes.md");
    assert!(path.is_absolute());
}

#[test]
fn test_parent_and_file_name() {
    let path = NormalizedPath::new("foo/bar/baz.txt");
    assert_eq!(path.parent().unwrap().as_str(), "foo/bar");
    assert_eq!(path.file_name(), Some("baz.txt"));
    assert_eq!(path.extension(), Some("txt"));
}

#[test]
fn test_dotfile_has_no_extension() {
    assert_eq!(NormalizedPath::new(".cursorrules").extension(), None);
}

#[test]
fn test_exists_false_for_nonexistent() {
    let path = NormalizedPath::new("/nonexistent/path/that/does/not/exist");
    assert!(!path.exists());
}

#[test]
fn test_equivalent_spellings_share_identity_key() {
    let a = NormalizedPath::new("/repo/./.github//copilot-instructions.md");
    let b = NormalizedPath::new("/repo/.github/copilot-instructions.md");
    assert_eq!(a.identity_key(), b.identity_key());
}

#[cfg(any(windows, target_os = "macos"))]
#[test]
fn test_identity_key_folds_case_on_case_insensitive_platforms() {
    let a = NormalizedPath::new("/repo/Claude.md");
    let b = NormalizedPath::new("/repo/CLAUDE.md");
    assert_eq!(a.identity_key(), b.identity_key());
}
