//! Tests for the status aggregator, including recursive submodule status.

use metarepo::ast::{CommitRelation, SubmoduleState};
use metarepo::status::{get_repo_status, StatusOptions};
use metarepo::testing::{commit_file, commit_submodule_pointer, init_submodule_repo, register_submodule, TestRepo};

#[test]
fn clean_repo_has_empty_staged_and_workdir() {
    let meta = TestRepo::new().unwrap();
    commit_file(&meta.repo, 0, "README.md", "hello", "initial").unwrap();

    let status = get_repo_status(&meta.repo, &StatusOptions::default()).unwrap();
    assert!(status.staged.is_empty());
    assert!(status.workdir.is_empty());
    assert!(status.head.is_some());
    assert!(status.current_branch_name.is_some());
}

#[test]
fn untracked_file_is_reported_in_workdir() {
    let meta = TestRepo::new().unwrap();
    commit_file(&meta.repo, 0, "README.md", "hello", "initial").unwrap();
    std::fs::write(meta.path().join("scratch.txt"), "wip").unwrap();

    let status = get_repo_status(&meta.repo, &StatusOptions::default()).unwrap();
    assert!(status.workdir.contains_key("scratch.txt"));
}

#[test]
fn clean_open_submodule_reports_same_relation_on_both_sides() {
    let meta = TestRepo::new().unwrap();
    let sub_dir = meta.path().join("vendor/lib");
    let sub_repo = init_submodule_repo(&sub_dir).unwrap();
    let sub_commit = commit_file(&sub_repo, 0, "lib.rs", "fn lib() {}", "lib initial").unwrap();

    register_submodule(&meta.repo, "vendor/lib", "vendor/lib", "file:///nowhere").unwrap();
    commit_submodule_pointer(&meta.repo, 1, "vendor/lib", sub_commit, "add vendor/lib").unwrap();

    let status = get_repo_status(&meta.repo, &StatusOptions::default()).unwrap();
    let sub = status.submodules.get("vendor/lib").expect("submodule should be reported");
    assert_eq!(sub.state(), SubmoduleState::Open);
    assert_eq!(sub.index_sha_relation, CommitRelation::Same);
    assert_eq!(sub.workdir_sha_relation, CommitRelation::Same);
    assert!(sub.status.is_some());
}

#[test]
fn submodule_ahead_of_index_is_reported_as_ahead() {
    let meta = TestRepo::new().unwrap();
    let sub_dir = meta.path().join("vendor/lib");
    let sub_repo = init_submodule_repo(&sub_dir).unwrap();
    let first = commit_file(&sub_repo, 0, "lib.rs", "fn lib() {}", "lib initial").unwrap();

    register_submodule(&meta.repo, "vendor/lib", "vendor/lib", "file:///nowhere").unwrap();
    commit_submodule_pointer(&meta.repo, 1, "vendor/lib", first, "add vendor/lib").unwrap();

    commit_file(&sub_repo, 2, "lib.rs", "fn lib() { 1 }", "lib change").unwrap();

    let status = get_repo_status(&meta.repo, &StatusOptions::default()).unwrap();
    let sub = &status.submodules["vendor/lib"];
    assert_eq!(sub.workdir_sha_relation, CommitRelation::Ahead);
}

#[test]
fn repo_status_is_deterministic_across_runs() {
    let meta = TestRepo::new().unwrap();
    commit_file(&meta.repo, 0, "README.md", "hello", "initial").unwrap();
    let first = get_repo_status(&meta.repo, &StatusOptions::default()).unwrap();
    let second = get_repo_status(&meta.repo, &StatusOptions::default()).unwrap();
    assert_eq!(first, second);
}
