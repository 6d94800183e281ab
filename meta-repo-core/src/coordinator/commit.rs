//! `commit`: stage and commit the meta repository together with whichever
//! submodules have changes of their own (`spec.md` §4.E.1).

use std::collections::BTreeMap;
use std::path::Path;

use rayon::prelude::*;
use tracing::instrument;

use super::error::{Error, Result};
use crate::ast::{FileStatus, RepoStatus};
use crate::git::{FileMode, NonZeroOid, Repo};

/// What `commit` actually did, when it did anything.
#[derive(Debug)]
pub struct CommitResult {
    /// The new commit made in the meta repository.
    pub meta_commit: NonZeroOid,
    /// The new commit made in each submodule that had something to commit.
    pub submodule_commits: BTreeMap<String, NonZeroOid>,
}

fn is_index_deep_clean(status: &RepoStatus) -> bool {
    status.staged.is_empty()
        && status.submodules.values().all(|sub| {
            sub.index_sha_relation == crate::ast::CommitRelation::Same
                && sub.status.as_deref().map_or(true, is_index_deep_clean)
        })
}

fn is_workdir_deep_clean(status: &RepoStatus) -> bool {
    status.workdir.is_empty()
        && status.submodules.values().all(|sub| {
            sub.workdir_sha_relation == crate::ast::CommitRelation::Same
                && sub.status.as_deref().map_or(true, is_workdir_deep_clean)
        })
}

/// Commit `repo`'s current state, recursing into submodules that have
/// changes of their own. Returns `None` if there was nothing to commit (the
/// index is clean, and either `all` is false or the working tree is clean
/// too).
#[instrument(skip(repo, status))]
pub fn commit(
    repo: &mut Repo,
    all: bool,
    status: &RepoStatus,
    message: &str,
) -> Result<Option<CommitResult>> {
    if is_index_deep_clean(status) && (!all || is_workdir_deep_clean(status)) {
        return Ok(None);
    }

    let working_copy_path = repo
        .get_working_copy_path()
        .ok_or_else(|| Error::UserError("cannot commit in a bare repository".to_owned()))?;

    let sub_work: Vec<(String, std::path::PathBuf)> = status
        .submodules
        .iter()
        .filter(|(_, sub)| sub.status.is_some())
        .map(|(name, _)| (name.clone(), working_copy_path.join(name)))
        .collect();

    // `git2::Repository` is not `Sync`; each parallel task opens its own
    // handle rather than sharing `repo` across threads (see
    // `crate::status::compute_submodule_statuses`).
    let results: Vec<Result<(String, Option<NonZeroOid>)>> = sub_work
        .par_iter()
        .map(|(name, path)| {
            let sub_status = status
                .submodules
                .get(name)
                .and_then(|sub| sub.status.as_deref())
                .expect("filtered to submodules with a recorded status above");
            let mut sub_repo = Repo::open(path)?;
            let committed = commit_repo(&mut sub_repo, all, sub_status, message, false)?;
            Ok((name.clone(), committed))
        })
        .collect();

    let mut submodule_commits = BTreeMap::new();
    let mut needs_staging = Vec::new();
    for result in results {
        let (name, committed) = result?;
        let sub = &status.submodules[&name];
        let pointer_moved = sub.index_sha_relation != crate::ast::CommitRelation::Same;
        if let Some(oid) = committed {
            submodule_commits.insert(name.clone(), oid);
            needs_staging.push((name, oid));
        } else if pointer_moved {
            // The submodule had nothing of its own to commit, but its
            // recorded `HEAD` already differs from what the meta index has
            // staged (e.g. it was advanced by a previous `git submodule
            // update` outside this commit); stage the pointer as-is.
            if let Some(observed) = &sub.workdir {
                let oid: NonZeroOid = observed
                    .sha
                    .as_str()
                    .parse()
                    .map_err(|_| Error::UserError(format!("submodule '{name}' has an unparsable sha")))?;
                needs_staging.push((name, oid));
            }
        }
    }

    if !needs_staging.is_empty() {
        let mut index = repo.get_index()?;
        for (name, oid) in &needs_staging {
            index.add_entry(Path::new(name), *oid, FileMode::Commit)?;
        }
        index.write()?;
    }

    let meta_commit = commit_repo(repo, all, status, message, true)?
        .ok_or_else(|| Error::Internal(eyre::eyre!("forced meta commit produced nothing")))?;

    Ok(Some(CommitResult {
        meta_commit,
        submodule_commits,
    }))
}

/// Stage (if `all`) and commit `repo`'s current index on top of `HEAD`.
/// Returns `None` if there was nothing staged and `force` is false.
fn commit_repo(
    repo: &mut Repo,
    all: bool,
    status: &RepoStatus,
    message: &str,
    force: bool,
) -> Result<Option<NonZeroOid>> {
    if all {
        let working_copy_path = repo
            .get_working_copy_path()
            .ok_or_else(|| Error::UserError("cannot commit in a bare repository".to_owned()))?;
        let mut index = repo.get_index()?;
        for (path, file_status) in &status.workdir {
            match file_status {
                FileStatus::Removed => {
                    index.remove(Path::new(path))?;
                }
                _ => {
                    if working_copy_path.join(path).exists() {
                        index.add_by_path(Path::new(path))?;
                    }
                }
            }
        }
        index.write()?;
    }

    let has_staged_entries = !status.staged.is_empty()
        || (all && !status.workdir.is_empty())
        || !status.submodules.is_empty() && status.submodules.values().any(|sub| {
            sub.index_sha_relation != crate::ast::CommitRelation::Same
        });

    if !has_staged_entries && !force {
        return Ok(None);
    }

    let head_commit = repo.get_head_commit()?;
    let mut index = repo.get_index()?;
    let tree_oid = index.write_tree(repo)?;
    let tree = repo
        .find_tree(tree_oid)?
        .ok_or_else(|| Error::Internal(eyre::eyre!("just-written tree not found")))?;

    if let Some(head) = &head_commit {
        if head.get_tree_id() == tree_oid && !force {
            return Ok(None);
        }
    }

    let signature = repo.get_default_signature()?;
    let parents: Vec<&crate::git::Commit> = head_commit.iter().collect();
    let oid = repo.create_commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
    Ok(Some(oid))
}
