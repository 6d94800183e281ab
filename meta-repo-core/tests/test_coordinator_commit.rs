//! Tests for `coordinator::commit`.

use metarepo::coordinator::commit;
use metarepo::status::{get_repo_status, StatusOptions};
use metarepo::testing::{commit_file, commit_submodule_pointer, init_submodule_repo, register_submodule, TestRepo};

#[test]
fn commit_with_no_changes_returns_none() {
    let mut meta = TestRepo::new().unwrap();
    commit_file(&meta.repo, 0, "README.md", "hello", "initial").unwrap();
    let status = get_repo_status(&meta.repo, &StatusOptions::default()).unwrap();
    let result = commit(&mut meta.repo, true, &status, "nothing to commit").unwrap();
    assert!(result.is_none());
}

#[test]
fn commit_all_stages_workdir_changes_in_meta_repo() {
    let mut meta = TestRepo::new().unwrap();
    commit_file(&meta.repo, 0, "README.md", "hello", "initial").unwrap();
    std::fs::write(meta.path().join("README.md"), "hello, world").unwrap();

    let status = get_repo_status(&meta.repo, &StatusOptions::default()).unwrap();
    let result = commit(&mut meta.repo, true, &status, "update readme").unwrap().unwrap();
    assert!(result.submodule_commits.is_empty());

    let head = meta.repo.get_head_commit().unwrap().unwrap();
    assert_eq!(head.get_oid(), result.meta_commit);
    assert_eq!(head.get_summary().to_string(), "update readme");
}

#[test]
fn commit_all_advances_moved_submodule_pointer() {
    let mut meta = TestRepo::new().unwrap();
    let sub_dir = meta.path().join("vendor/lib");
    let sub_repo = init_submodule_repo(&sub_dir).unwrap();
    let first = commit_file(&sub_repo, 0, "lib.rs", "fn lib() {}", "lib initial").unwrap();
    register_submodule(&meta.repo, "vendor/lib", "vendor/lib", "file:///nowhere").unwrap();
    commit_submodule_pointer(&meta.repo, 1, "vendor/lib", first, "add vendor/lib").unwrap();

    let second = commit_file(&sub_repo, 2, "lib.rs", "fn lib() { 1 }", "lib change").unwrap();

    let status = get_repo_status(&meta.repo, &StatusOptions::default()).unwrap();
    let result = commit(&mut meta.repo, true, &status, "bump vendor/lib").unwrap().unwrap();
    assert_eq!(result.submodule_commits["vendor/lib"], second);

    let meta_index = meta.repo.get_index().unwrap();
    let entry = meta_index.get_by_path(std::path::Path::new("vendor/lib")).unwrap();
    assert_eq!(entry.oid, metarepo::git::MaybeZeroOid::NonZero(second));
}
