//! Tests for the shorthand codec: parsing, resolution, and writing to disk.

use metarepo::assert::{assert_equal_asts, map_commits_and_urls};
use metarepo::ast::{CommitId, Content, RepoAST};
use metarepo::codec::{parse, write_multi_rast, write_rast};

#[test]
fn simple_seed_parses_with_defaults() {
    let asts = parse("S").unwrap();
    let ast = &asts[""];
    assert_eq!(ast.head.as_ref().unwrap().as_str(), "1");
    assert_eq!(ast.current_branch_name.as_deref(), Some("master"));
    assert!(!ast.bare);
    assert_eq!(ast.commits.len(), 1);
}

#[test]
fn bare_seed_has_no_head_or_workdir() {
    let asts = parse("B").unwrap();
    let ast = &asts[""];
    assert!(ast.bare);
    assert!(ast.head.is_none());
    assert!(ast.current_branch_name.is_none());
}

#[test]
fn new_commit_override_extends_history() {
    let asts = parse("S:C2-1 foo=bar;Bmaster=2;H=2").unwrap();
    let ast = &asts[""];
    assert_eq!(ast.commits.len(), 2);
    let commit = &ast.commits[&CommitId::from("2")];
    assert_eq!(commit.parents, vec!["1".into()]);
    assert_eq!(commit.changes.get("foo"), Some(&Some(Content::Blob("bar".to_owned()))));
    assert_eq!(ast.head.as_ref().unwrap().as_str(), "2");
}

#[test]
fn current_branch_override_moves_head_to_match() {
    let asts = parse("S:C2-1 foo=bar;Bmaster=2").unwrap();
    let ast = &asts[""];
    // `Bmaster=2` alone doesn't move `*`/`HEAD`; it just redefines the branch.
    assert_eq!(ast.head.as_ref().unwrap().as_str(), "1");
    assert_eq!(ast.branches["master"].commit.as_str(), "2");
}

#[test]
fn head_and_current_branch_overrides_conflict() {
    let err = parse("S:H=1;*=master").unwrap_err();
    assert!(matches!(err, metarepo::codec::Error::HeadAndCurrentBranchConflict));
}

#[test]
fn clone_of_seeds_from_prior_repo_in_same_string() {
    let asts = parse("a=S|b=Ca").unwrap();
    assert_eq!(asts["a"].commits, asts["b"].commits);
}

#[test]
fn unknown_clone_source_is_an_error() {
    let err = parse("b=Cnonexistent").unwrap_err();
    assert!(matches!(err, metarepo::codec::Error::UnknownCloneSource(name) if name == "nonexistent"));
}

#[test]
fn remote_override_adds_tracking_branches() {
    let asts = parse("S:C2-1;Rorigin=/some/path master=2").unwrap();
    let ast = &asts[""];
    let remote = &ast.remotes["origin"];
    assert_eq!(remote.url, "/some/path");
    assert_eq!(remote.branches["master"].as_str(), "2");
}

#[test]
fn submodule_change_parses_url_and_sha() {
    let asts = parse("S:C2-1 sub=Sfile:///repo:deadbeef;Bmaster=2;H=2").unwrap();
    let ast = &asts[""];
    let commit = &ast.commits[&CommitId::from("2")];
    match commit.changes.get("sub").unwrap().as_ref().unwrap() {
        Content::Submodule { url, sha } => {
            assert_eq!(url, "file:///repo");
            assert_eq!(sha.as_str(), "deadbeef");
        }
        other => panic!("expected a submodule change, got {other:?}"),
    }
}

/// A caller that substitutes every logical `CommitId` in a resolved AST for
/// the real OID `write_rast` assigned it (simulating what a live-repo reader
/// would hand back) gets the original logical AST back out of
/// `map_commits_and_urls`.
#[test]
fn map_commits_and_urls_reverses_a_forward_substitution() {
    let asts = parse("S:C2-1 foo=bar;Bmaster=2;H=2").unwrap();
    let expected = &asts[""];

    let dir = tempfile::tempdir().unwrap();
    let commit_ids = write_rast(expected, "main", dir.path()).unwrap();

    let forward = |id: &metarepo::ast::CommitId| commit_ids.get("main", id).unwrap().to_string().into();
    let real_shaped = RepoAST {
        commits: expected
            .commits
            .iter()
            .map(|(id, commit)| {
                (
                    forward(id),
                    metarepo::ast::Commit {
                        parents: commit.parents.iter().map(forward).collect(),
                        changes: commit.changes.clone(),
                        message: commit.message.clone(),
                    },
                )
            })
            .collect(),
        branches: expected
            .branches
            .iter()
            .map(|(name, branch)| {
                (
                    name.clone(),
                    metarepo::ast::Branch {
                        commit: forward(&branch.commit),
                        tracking: branch.tracking.clone(),
                    },
                )
            })
            .collect(),
        head: expected.head.as_ref().map(forward),
        ..expected.clone()
    };

    let mapped = map_commits_and_urls(&real_shaped, "main", &commit_ids, &Default::default());
    assert_equal_asts(&mapped, expected);
}

#[test]
fn write_multi_rast_orders_submodule_dependency_before_dependent() {
    let asts = parse("lib=S|app=S:C2-1 vendor=Slib:1;Bmaster=2;H=2").unwrap();
    let dir = tempfile::tempdir().unwrap();
    let (commit_ids, url_map) = write_multi_rast(&asts, dir.path()).unwrap();
    assert!(commit_ids.get("lib", &CommitId::from("1")).is_some());
    assert!(commit_ids.get("app", &CommitId::from("1")).is_some());
    assert!(url_map.0.contains_key("lib"));
}

#[test]
fn duplicate_repo_names_are_rejected() {
    let err = parse("a=S|a=S").unwrap_err();
    assert!(matches!(err, metarepo::codec::Error::DuplicateRepoName(name) if name == "a"));
}
