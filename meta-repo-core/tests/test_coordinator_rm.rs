//! Tests for `coordinator::rm` (`spec.md` §4.E.4).

use metarepo::coordinator::{rm_paths, RmOptions};
use metarepo::status::{get_repo_status, StatusOptions};
use metarepo::testing::{commit_file, commit_submodule_pointer, init_submodule_repo, register_submodule, TestRepo};

#[test]
fn rm_removes_a_clean_tracked_file() {
    let mut meta = TestRepo::new().unwrap();
    commit_file(&meta.repo, 0, "a.txt", "a", "add a").unwrap();

    let status = get_repo_status(&meta.repo, &StatusOptions::default()).unwrap();
    let result = rm_paths(
        &mut meta.repo,
        &status,
        &[std::path::Path::new("a.txt")],
        &RmOptions::default(),
    )
    .unwrap();

    assert_eq!(result.removed_paths, vec![std::path::PathBuf::from("a.txt")]);
    assert!(!meta.path().join("a.txt").exists());
    let index = meta.repo.get_index().unwrap();
    assert!(index.get_by_path(std::path::Path::new("a.txt")).is_none());
}

#[test]
fn rm_refuses_a_dirty_file_without_force() {
    let mut meta = TestRepo::new().unwrap();
    commit_file(&meta.repo, 0, "a.txt", "a", "add a").unwrap();
    std::fs::write(meta.path().join("a.txt"), "dirty").unwrap();

    let status = get_repo_status(&meta.repo, &StatusOptions::default()).unwrap();
    let err = rm_paths(
        &mut meta.repo,
        &status,
        &[std::path::Path::new("a.txt")],
        &RmOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, metarepo::coordinator::Error::UserError(_)));
    assert!(meta.path().join("a.txt").exists());
}

#[test]
fn rm_requires_recursive_for_a_directory_with_multiple_entries() {
    let mut meta = TestRepo::new().unwrap();
    commit_file(&meta.repo, 0, "dir/a.txt", "a", "add a").unwrap();
    commit_file(&meta.repo, 1, "dir/b.txt", "b", "add b").unwrap();

    let status = get_repo_status(&meta.repo, &StatusOptions::default()).unwrap();
    let err = rm_paths(
        &mut meta.repo,
        &status,
        &[std::path::Path::new("dir")],
        &RmOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, metarepo::coordinator::Error::UserError(_)));

    let result = rm_paths(
        &mut meta.repo,
        &status,
        &[std::path::Path::new("dir")],
        &RmOptions {
            recursive: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(result.removed_paths.len(), 2);
}

#[test]
fn rm_removes_a_clean_submodule_and_its_gitmodules_entry() {
    let mut meta = TestRepo::new().unwrap();
    commit_file(&meta.repo, 0, "README.md", "hello", "initial").unwrap();

    let sub_dir = meta.path().join("s");
    let sub_repo = init_submodule_repo(&sub_dir).unwrap();
    commit_file(&sub_repo, 1, "f", "committed", "sub initial").unwrap();
    register_submodule(&meta.repo, "s", "s", "file:///nowhere").unwrap();
    let head = sub_repo.get_head_commit().unwrap().unwrap().get_oid();
    commit_submodule_pointer(&meta.repo, 2, "s", head, "add s").unwrap();

    let status = get_repo_status(&meta.repo, &StatusOptions::default()).unwrap();
    let result = rm_paths(
        &mut meta.repo,
        &status,
        &[std::path::Path::new("s")],
        &RmOptions::default(),
    )
    .unwrap();

    assert_eq!(result.removed_submodules, vec!["s".to_owned()]);
    assert!(!sub_dir.exists());
    let gitmodules = std::fs::read_to_string(meta.path().join(".gitmodules")).unwrap_or_default();
    assert!(!gitmodules.contains("\"s\""));
}

#[test]
fn rm_cached_leaves_the_working_copy_file_in_place() {
    let mut meta = TestRepo::new().unwrap();
    commit_file(&meta.repo, 0, "a.txt", "a", "add a").unwrap();

    let status = get_repo_status(&meta.repo, &StatusOptions::default()).unwrap();
    rm_paths(
        &mut meta.repo,
        &status,
        &[std::path::Path::new("a.txt")],
        &RmOptions {
            cached: true,
            ..Default::default()
        },
    )
    .unwrap();

    assert!(meta.path().join("a.txt").exists());
    let index = meta.repo.get_index().unwrap();
    assert!(index.get_by_path(std::path::Path::new("a.txt")).is_none());
}

/// A workdir-only modification (index still equals HEAD) must not block
/// `--cached`, since `--cached` only ever touches the index.
#[test]
fn rm_cached_succeeds_on_a_workdir_modified_but_index_clean_file() {
    let mut meta = TestRepo::new().unwrap();
    commit_file(&meta.repo, 0, "a.txt", "a", "add a").unwrap();
    std::fs::write(meta.path().join("a.txt"), "dirty").unwrap();

    let status = get_repo_status(&meta.repo, &StatusOptions::default()).unwrap();
    assert!(status.workdir.contains_key("a.txt"));

    let result = rm_paths(
        &mut meta.repo,
        &status,
        &[std::path::Path::new("a.txt")],
        &RmOptions {
            cached: true,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(result.removed_paths, vec![std::path::PathBuf::from("a.txt")]);
    assert_eq!(std::fs::read_to_string(meta.path().join("a.txt")).unwrap(), "dirty");
    let index = meta.repo.get_index().unwrap();
    assert!(index.get_by_path(std::path::Path::new("a.txt")).is_none());
}

#[test]
fn rm_dry_run_changes_nothing() {
    let mut meta = TestRepo::new().unwrap();
    commit_file(&meta.repo, 0, "a.txt", "a", "add a").unwrap();

    let status = get_repo_status(&meta.repo, &StatusOptions::default()).unwrap();
    let result = rm_paths(
        &mut meta.repo,
        &status,
        &[std::path::Path::new("a.txt")],
        &RmOptions {
            dry_run: true,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(result.removed_paths, vec![std::path::PathBuf::from("a.txt")]);
    assert!(meta.path().join("a.txt").exists());
    let index = meta.repo.get_index().unwrap();
    assert!(index.get_by_path(std::path::Path::new("a.txt")).is_some());
}
