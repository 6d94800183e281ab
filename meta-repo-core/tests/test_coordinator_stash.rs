//! Tests for `coordinator::stash`: the meta-repo-plus-submodule stash
//! encoding and its reflog-backed stack (`spec.md` §4.E.2-3). The meta-stash
//! commit captures the state of *submodules*, not ordinary tracked files in
//! the meta repo itself -- `save` leaves a plain workdir edit to a file like
//! `README.md` untouched, the same way `git stash` on a submodule-free repo
//! would have nothing to do with files outside its own index.

use metarepo::coordinator::stash;
use metarepo::status::{get_repo_status, StatusOptions};
use metarepo::testing::{commit_file, commit_submodule_pointer, init_submodule_repo, register_submodule, TestRepo};

fn fixture_with_dirty_submodule() -> (TestRepo, std::path::PathBuf) {
    let meta = TestRepo::new().unwrap();
    commit_file(&meta.repo, 0, "README.md", "hello", "initial").unwrap();

    let sub_dir = meta.path().join("s");
    let sub_repo = init_submodule_repo(&sub_dir).unwrap();
    commit_file(&sub_repo, 1, "f", "committed", "sub initial").unwrap();
    register_submodule(&meta.repo, "s", "s", "file:///nowhere").unwrap();
    let head = sub_repo.get_head_commit().unwrap().unwrap().get_oid();
    commit_submodule_pointer(&meta.repo, 2, "s", head, "add s").unwrap();

    std::fs::write(sub_dir.join("f"), "x").unwrap();
    (meta, sub_dir)
}

#[test]
fn save_with_nothing_dirty_returns_none() {
    let mut meta = TestRepo::new().unwrap();
    commit_file(&meta.repo, 0, "README.md", "hello", "initial").unwrap();
    let status = get_repo_status(&meta.repo, &StatusOptions::default()).unwrap();
    let result = stash::save(&mut meta.repo, &status, None).unwrap();
    assert!(result.is_none());
}

/// Scenario 3 from `spec.md` §8: stash a dirty submodule workdir, then pop
/// it back.
#[test]
fn save_then_pop_round_trips_a_dirty_submodule_workdir() {
    let (mut meta, sub_dir) = fixture_with_dirty_submodule();

    let status = get_repo_status(&meta.repo, &StatusOptions::default()).unwrap();
    let result = stash::save(&mut meta.repo, &status, None).unwrap().unwrap();
    assert_eq!(result.submodule_stashes.len(), 1);
    let sub_stash_sha = result.submodule_stashes["s"];

    // `save` leaves the submodule workdir clean afterward (pre-stash HEAD
    // checked out detached).
    let sub_repo = metarepo::git::Repo::open(&sub_dir).unwrap();
    assert_eq!(std::fs::read_to_string(sub_dir.join("f")).unwrap(), "committed");
    let sub_stash_ref = metarepo::git::ReferenceName::from(format!("refs/sub-stash/{sub_stash_sha}"));
    assert!(sub_repo.find_reference(&sub_stash_ref).unwrap().is_some());

    let entries = stash::list(&meta.repo).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].new_oid, Some(result.meta_stash));

    stash::pop(&mut meta.repo, 0, false).unwrap();
    assert!(stash::list(&meta.repo).unwrap().is_empty());
    assert_eq!(std::fs::read_to_string(sub_dir.join("f")).unwrap(), "x");
    assert!(sub_repo.find_reference(&sub_stash_ref).unwrap().is_none());
}

#[test]
fn apply_without_dropping_keeps_the_stash_entry() {
    let (mut meta, sub_dir) = fixture_with_dirty_submodule();
    let status = get_repo_status(&meta.repo, &StatusOptions::default()).unwrap();
    stash::save(&mut meta.repo, &status, Some("wip on s")).unwrap().unwrap();

    stash::apply(&mut meta.repo, 0, false).unwrap();
    assert_eq!(std::fs::read_to_string(sub_dir.join("f")).unwrap(), "x");
    assert_eq!(stash::list(&meta.repo).unwrap().len(), 1);
}

/// A submodule's own `HEAD` moves ahead of what the meta index has pinned,
/// with no uncommitted workdir changes. `save` records that drift in a
/// four-parent sub-stash commit; if the submodule's checkout is then reset
/// back to the older, pinned commit before `apply` runs, `apply` must
/// replay the recorded tip back in rather than leaving the reset in place
/// (`spec.md` §4.E.3 point 4, §8's `apply(save(repo))` invariant).
#[test]
fn save_then_apply_restores_a_submodule_whose_head_moved_ahead_of_the_index() {
    let mut meta = TestRepo::new().unwrap();
    commit_file(&meta.repo, 0, "README.md", "hello", "initial").unwrap();

    let sub_dir = meta.path().join("s");
    let sub_repo = init_submodule_repo(&sub_dir).unwrap();
    commit_file(&sub_repo, 1, "f", "committed", "sub initial").unwrap();
    register_submodule(&meta.repo, "s", "s", "file:///nowhere").unwrap();
    let first = sub_repo.get_head_commit().unwrap().unwrap().get_oid();
    commit_submodule_pointer(&meta.repo, 2, "s", first, "add s").unwrap();

    // The submodule's own HEAD advances locally; the meta index still pins
    // `first`.
    commit_file(&sub_repo, 3, "f", "advanced", "advance s locally").unwrap();

    let status = get_repo_status(&meta.repo, &StatusOptions::default()).unwrap();
    let sub_status = &status.submodules["s"];
    assert_eq!(sub_status.workdir_sha_relation, metarepo::ast::CommitRelation::Ahead);

    let result = stash::save(&mut meta.repo, &status, None).unwrap().unwrap();
    assert_eq!(result.submodule_stashes.len(), 1);

    // Something resets the submodule's checkout back to the older, pinned
    // commit in between `save` and `apply`.
    sub_repo.set_head_detached(first).unwrap();
    sub_repo.checkout_head_force().unwrap();
    assert_eq!(std::fs::read_to_string(sub_dir.join("f")).unwrap(), "committed");

    stash::apply(&mut meta.repo, 0, false).unwrap();

    assert_eq!(std::fs::read_to_string(sub_dir.join("f")).unwrap(), "advanced");
    assert_ne!(sub_repo.get_head_commit().unwrap().unwrap().get_oid(), first);
}

/// The same drift as above, but the submodule's `HEAD` keeps moving forward
/// (a teammate's pull) between `save` and `apply` instead of being reset
/// backward: the recorded tip must be rebased onto the new `HEAD`, not onto
/// the stale commit it was taken from.
#[test]
fn save_then_apply_rebases_a_moved_submodule_pointer_onto_a_head_that_advanced_further() {
    let mut meta = TestRepo::new().unwrap();
    commit_file(&meta.repo, 0, "README.md", "hello", "initial").unwrap();

    let sub_dir = meta.path().join("s");
    let sub_repo = init_submodule_repo(&sub_dir).unwrap();
    commit_file(&sub_repo, 1, "f", "committed", "sub initial").unwrap();
    register_submodule(&meta.repo, "s", "s", "file:///nowhere").unwrap();
    let first = sub_repo.get_head_commit().unwrap().unwrap().get_oid();
    commit_submodule_pointer(&meta.repo, 2, "s", first, "add s").unwrap();

    commit_file(&sub_repo, 3, "f", "advanced", "advance s locally").unwrap();

    let status = get_repo_status(&meta.repo, &StatusOptions::default()).unwrap();
    stash::save(&mut meta.repo, &status, None).unwrap().unwrap();

    // A teammate's work lands on top of the already-stashed tip, in a
    // different file, before `apply` runs.
    commit_file(&sub_repo, 4, "other", "from teammate", "teammate commit").unwrap();

    stash::apply(&mut meta.repo, 0, false).unwrap();

    assert_eq!(std::fs::read_to_string(sub_dir.join("f")).unwrap(), "advanced");
    assert_eq!(std::fs::read_to_string(sub_dir.join("other")).unwrap(), "from teammate");
}

/// A closed submodule (registered and pinned, but never checked out locally)
/// has no working tree to build a synthetic stash commit in, so `save`
/// records its recorded index sha directly in the meta-stash tree. `apply`
/// must restore the meta index's gitlink entry to that sha without trying
/// to open a repository that was never there (`spec.md` §4.E.2).
#[test]
fn save_then_apply_restores_a_closed_submodules_pointer() {
    let mut meta = TestRepo::new().unwrap();
    commit_file(&meta.repo, 0, "README.md", "hello", "initial").unwrap();

    register_submodule(&meta.repo, "s", "s", "file:///nowhere").unwrap();
    let recorded = commit_file(&meta.repo, 1, "other.txt", "x", "other commit").unwrap();
    commit_submodule_pointer(&meta.repo, 2, "s", recorded, "add s").unwrap();
    commit_file(&meta.repo, 3, "other.txt", "y", "drift").unwrap();

    // Nothing was ever checked out at `s/`; only the index disagrees with
    // what's recorded in HEAD.
    let drifted = commit_file(&meta.repo, 4, "other.txt", "z", "drift again").unwrap();
    let mut index = meta.repo.get_index().unwrap();
    index
        .add_entry(std::path::Path::new("s"), drifted, metarepo::git::FileMode::Commit)
        .unwrap();
    index.write().unwrap();
    assert!(!meta.path().join("s").exists());

    let status = get_repo_status(
        &meta.repo,
        &StatusOptions {
            include_closed_submodules: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(status.submodules["s"].state(), metarepo::ast::SubmoduleState::Closed);

    stash::save(&mut meta.repo, &status, None).unwrap().unwrap();

    // Something else touches the index before `apply` runs.
    let mut index = meta.repo.get_index().unwrap();
    index.remove(std::path::Path::new("s")).unwrap();
    index.write().unwrap();

    stash::apply(&mut meta.repo, 0, false).unwrap();

    let meta_index = meta.repo.get_index().unwrap();
    let entry = meta_index.get_by_path(std::path::Path::new("s")).unwrap();
    assert_eq!(entry.oid, metarepo::git::MaybeZeroOid::NonZero(drifted));
}

#[test]
fn drop_stash_removes_the_only_entry_and_deletes_the_ref() {
    let (mut meta, _sub_dir) = fixture_with_dirty_submodule();
    let status = get_repo_status(&meta.repo, &StatusOptions::default()).unwrap();
    stash::save(&mut meta.repo, &status, None).unwrap().unwrap();

    stash::drop_stash(&meta.repo, 0).unwrap();
    assert!(stash::list(&meta.repo).unwrap().is_empty());
    let refname = metarepo::git::ReferenceName::from("refs/meta-stash");
    assert!(meta.repo.find_reference(&refname).unwrap().is_none());
}
