use super::*;

fn store() -> FileStore {
    FileStore::new(PathCase::Sensitive)
}

#[test]
fn test_update_inserts_missing_file_at_version_zero() {
    let mut files = store();
    assert!(files.update_file(Path::new("/src/a.ts"), "let a = 1;", true));
    let file = files.get_file(Path::new("/src/a.ts")).unwrap();
    assert_eq!(file.version(), 0);
    assert_eq!(file.text(), "let a = 1;");
    assert_eq!(files.project_version(), 1);
}

#[test]
fn test_checked_update_with_same_text_is_noop() {
    let mut files = store();
    files.update_file(Path::new("/src/a.ts"), "let a = 1;", true);
    let generation = files.generation();

    assert!(!files.update_file(Path::new("/src/a.ts"), "let a = 1;", true));
    assert!(!files.update_file(Path::new("/src/a.ts"), "let a = 1;", true));
    assert_eq!(files.get_file(Path::new("/src/a.ts")).unwrap().version(), 0);
    assert_eq!(files.generation(), generation);
}

#[test]
fn test_unchecked_update_always_bumps() {
    let mut files = store();
    files.update_file(Path::new("/src/a.ts"), "x", false);
    assert!(files.update_file(Path::new("/src/a.ts"), "x", false));
    assert_eq!(files.get_file(Path::new("/src/a.ts")).unwrap().version(), 1);
}

#[test]
fn test_content_change_bumps_version_not_project_version() {
    let mut files = store();
    files.update_file(Path::new("/src/a.ts"), "x", true);
    let project_version = files.project_version();

    assert!(files.update_file(Path::new("/src/a.ts"), "y", true));
    assert_eq!(files.get_file(Path::new("/src/a.ts")).unwrap().version(), 1);
    assert_eq!(files.project_version(), project_version);
}

#[test]
fn test_lookup_normalizes_path() {
    let mut files = store();
    files.add_file(Path::new("/src/lib/../a.ts"), "x");
    assert!(files.has_file(Path::new("/src/./a.ts")));
    assert_eq!(
        files.get_file(Path::new("/src/a.ts")).unwrap().path(),
        Path::new("/src/a.ts")
    );
}

#[test]
fn test_remove_bumps_project_version() {
    let mut files = store();
    files.add_file(Path::new("/src/a.ts"), "x");
    let before = files.project_version();
    assert!(files.remove_file(Path::new("/src/a.ts")).is_some());
    assert!(files.remove_file(Path::new("/src/a.ts")).is_none());
    assert_eq!(files.project_version(), before + 1);
    assert!(files.is_empty());
}

#[test]
fn test_rename_preserves_version() {
    let mut files = store();
    files.update_file(Path::new("/src/a.ts"), "x", true);
    files.update_file(Path::new("/src/a.ts"), "y", true);

    assert!(files.rename_file(Path::new("/src/a.ts"), Path::new("/src/b.ts")));
    assert!(!files.has_file(Path::new("/src/a.ts")));
    let renamed = files.get_file(Path::new("/src/b.ts")).unwrap();
    assert_eq!(renamed.version(), 1);
    assert_eq!(renamed.text(), "y");
}

#[test]
fn test_case_insensitive_respelling_renames_in_place() {
    let mut files = FileStore::new(PathCase::Insensitive);
    files.update_file(Path::new("/src/Index.ts"), "x", true);
    let project_version = files.project_version();

    assert!(!files.update_file(Path::new("/src/index.ts"), "x", true));
    assert_eq!(files.len(), 1);
    let file = files.get_file(Path::new("/SRC/INDEX.TS")).unwrap();
    assert_eq!(file.path(), Path::new("/src/index.ts"));
    assert_eq!(file.version(), 0);
    assert_eq!(files.project_version(), project_version + 1);
}
