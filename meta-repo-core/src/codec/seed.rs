//! Construction of the two seed repositories (`S`, `B`) and the
//! `C<url>` clone-of base, per `spec.md` §4.B "Seed repositories".

use std::collections::BTreeMap;

use super::{Error, Result};
use crate::ast::{Branch, Commit, CommitId, Content, Remote, RepoAST};

/// The id of the single commit every seed repository starts with.
pub fn seed_commit_id() -> CommitId {
    CommitId::from("1")
}

/// The commit every seed repository starts with: `README.md="hello world"`.
pub fn seed_commit() -> Commit {
    let mut changes = BTreeMap::new();
    changes.insert(
        "README.md".to_owned(),
        Some(Content::Blob("hello world".to_owned())),
    );
    Commit {
        parents: Vec::new(),
        changes,
        message: Some("initial commit".to_owned()),
    }
}

/// Build the `S` (seed-simple) base: a working-copy repo with `HEAD` and
/// `master` both pointing at commit `1`.
pub fn seed_simple() -> RepoAST {
    let id = seed_commit_id();
    let mut commits = BTreeMap::new();
    commits.insert(id.clone(), seed_commit());
    let mut branches = BTreeMap::new();
    branches.insert(
        "master".to_owned(),
        Branch {
            commit: id.clone(),
            tracking: None,
        },
    );
    RepoAST {
        commits,
        branches,
        head: Some(id),
        current_branch_name: Some("master".to_owned()),
        bare: false,
        ..RepoAST::new()
    }
}

/// Build the `B` (seed-bare) base: identical history to `S`, but bare (no
/// `HEAD`, no working copy).
pub fn seed_bare() -> RepoAST {
    RepoAST {
        head: None,
        bare: true,
        ..seed_simple()
    }
}

/// Build the `C<source_name>` (clone-of) base from an already-resolved
/// source repo: remote-tracking branches under `origin` for every branch the
/// source has, a local branch (and checkout) matching the source's current
/// branch, and an empty index/workdir.
pub fn clone_of(source_name: &str, source: &RepoAST) -> Result<RepoAST> {
    let origin_branches: BTreeMap<String, CommitId> = source
        .branches
        .iter()
        .map(|(name, branch)| (name.clone(), branch.commit.clone()))
        .collect();

    let mut remotes = BTreeMap::new();
    remotes.insert(
        "origin".to_owned(),
        Remote {
            url: source_name.to_owned(),
            branches: origin_branches,
        },
    );

    let mut branches = BTreeMap::new();
    let mut head = None;
    if let Some(current) = &source.current_branch_name {
        let source_branch = source.branches.get(current).ok_or_else(|| {
            Error::UnknownBranch {
                repo: source_name.to_owned(),
                name: current.clone(),
            }
        })?;
        branches.insert(
            current.clone(),
            Branch {
                commit: source_branch.commit.clone(),
                tracking: Some(format!("origin/{current}")),
            },
        );
        head = Some(source_branch.commit.clone());
    }

    Ok(RepoAST {
        commits: BTreeMap::new(),
        branches,
        remotes,
        head,
        current_branch_name: source.current_branch_name.clone(),
        bare: false,
        ..RepoAST::new()
    })
}
