//! `stash`: save and restore meta-repo-plus-submodule working state
//! (`spec.md` §4.E.2-3).
//!
//! The meta-level stash is an ordinary commit kept alive by the reflog of
//! `refs/meta-stash` (see [`crate::git::reflog`]): pushing a stash appends a
//! reflog entry, popping one drops it. Each submodule that needed its own
//! stash gets a commit referenced by `refs/sub-stash/<sha>` inside that
//! submodule's own repository.
//!
//! Some submodule stash commits carry up to **four** parents instead of the
//! usual two. This encoding is this coordinator's own invention -- it is
//! **not interoperable with plain `git stash`**, and only [`apply`]/[`pop`]
//! in this module know how to unwind it. See `DESIGN.md` for the decisions
//! made in the absence of the original implementation this spec was drawn
//! from.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::instrument;

use super::error::{Error, Result};
use crate::ast::{CommitRelation, RepoStatus, Submodule, SubmoduleState};
use crate::git::{Commit, FileMode, NonZeroOid, ReferenceName, Repo, Tree};

const META_STASH_REF: &str = "refs/meta-stash";

/// The sentinel submodule sha recorded in a stash tree for a submodule that
/// was deleted (closed, no index entry) at stash time. Not a real object;
/// `apply` recognizes it by value.
fn deleted_submodule_sentinel() -> NonZeroOid {
    "de1e7ed0de1e7ed0de1e7ed0de1e7ed0de1e7ed0"
        .parse()
        .expect("sentinel sha is well-formed")
}

/// What `save` did, if anything.
#[derive(Debug)]
pub struct SaveResult {
    /// The new commit recorded under `refs/meta-stash`.
    pub meta_stash: NonZeroOid,
    /// Per-submodule stash commits, by submodule name.
    pub submodule_stashes: BTreeMap<String, NonZeroOid>,
}

fn short_sha(oid: NonZeroOid) -> String {
    oid.to_string().chars().take(7).collect()
}

fn default_stash_message(repo: &Repo, head_commit: &crate::git::Commit) -> String {
    let branch_name = repo
        .get_head_branch_name()
        .ok()
        .flatten()
        .map(|name| name.branch_name().to_owned())
        .unwrap_or_else(|| "HEAD (detached)".to_owned());
    format!(
        "WIP on {branch_name}: {} {}",
        short_sha(head_commit.get_oid()),
        head_commit.get_summary()
    )
}

/// The outcome of stashing a single submodule.
struct SubOutcome {
    /// What to record for this submodule's path in the meta-stash tree.
    /// `None` means "leave the path untouched" (the submodule was clean).
    tree_entry: Option<NonZeroOid>,
    /// The submodule's own stash commit, if one was created.
    stash_commit: Option<NonZeroOid>,
    /// The submodule's `HEAD` before stashing, so it can be restored
    /// (detached) afterward.
    pre_stash_head: Option<NonZeroOid>,
}

impl SubOutcome {
    fn skip() -> Self {
        SubOutcome {
            tree_entry: None,
            stash_commit: None,
            pre_stash_head: None,
        }
    }

    fn pointer_only(oid: Option<NonZeroOid>) -> Self {
        SubOutcome {
            tree_entry: oid,
            stash_commit: None,
            pre_stash_head: None,
        }
    }
}

/// Save the current state of `meta` and any dirty open/pointer-shifted
/// submodules as a stash, returning `None` if there was nothing to stash.
#[instrument(skip(meta, status))]
pub fn save(meta: &mut Repo, status: &RepoStatus, message: Option<&str>) -> Result<Option<SaveResult>> {
    let head_commit = match meta.get_head_commit()? {
        Some(commit) => commit,
        None => return Ok(None),
    };
    let head_oid = head_commit.get_oid();

    let message = message
        .map(str::to_owned)
        .unwrap_or_else(|| default_stash_message(meta, &head_commit));

    let working_copy_path = meta
        .get_working_copy_path()
        .ok_or_else(|| Error::UserError("cannot stash in a bare repository".to_owned()))?;

    let gitmodules_staged = status.staged.contains_key(".gitmodules");
    let index_parent = if gitmodules_staged {
        let mut index = meta.get_index()?;
        let tree_oid = index.write_tree(meta)?;
        let tree = meta
            .find_tree(tree_oid)?
            .ok_or_else(|| Error::Internal(eyre::eyre!("just-written index tree not found")))?;
        let signature = meta.get_default_signature()?;
        Some(meta.create_commit(
            None,
            &signature,
            &signature,
            "index on stash",
            &tree,
            &[&head_commit],
        )?)
    } else {
        None
    };

    let sub_work: Vec<(String, PathBuf)> = status
        .submodules
        .keys()
        .map(|name| (name.clone(), working_copy_path.join(name)))
        .collect();

    // `git2::Repository` is not `Sync`: each parallel task opens its own
    // handle rather than sharing `meta` across threads.
    let results: Vec<Result<(String, SubOutcome)>> = sub_work
        .par_iter()
        .map(|(name, path)| {
            let sub = &status.submodules[name];
            save_one_submodule(path, sub, &message).map(|outcome| (name.clone(), outcome))
        })
        .collect();

    let mut tree_entries = std::collections::HashMap::new();
    let mut submodule_stashes = BTreeMap::new();
    for result in results {
        let (name, outcome) = result?;
        if let Some(oid) = outcome.tree_entry {
            tree_entries.insert(PathBuf::from(&name), Some((oid, FileMode::Commit)));
        }
        if let Some(stash_oid) = outcome.stash_commit {
            submodule_stashes.insert(name.clone(), stash_oid);
            let sub_repo = Repo::open(&working_copy_path.join(&name))?;
            let refname = ReferenceName::from(format!("refs/sub-stash/{stash_oid}"));
            sub_repo.create_reference(&refname, stash_oid, true, "coordinator: stash save")?;
            if let Some(pre_stash_head) = outcome.pre_stash_head {
                sub_repo.set_head_detached(pre_stash_head)?;
                sub_repo.checkout_head_force()?;
            }
        }
    }

    let head_tree = head_commit.get_tree()?;
    let stash_tree_oid = if tree_entries.is_empty() {
        head_tree.get_oid()
    } else {
        crate::git::hydrate_tree(meta, Some(&head_tree), tree_entries)?
    };
    let stash_tree = meta
        .find_tree(stash_tree_oid)?
        .ok_or_else(|| Error::Internal(eyre::eyre!("just-written stash tree not found")))?;

    let index_parent_commit = index_parent.map(|oid| meta.find_commit_or_fail(oid)).transpose()?;
    let mut parents: Vec<&crate::git::Commit> = vec![&head_commit];
    if let Some(commit) = &index_parent_commit {
        parents.push(commit);
    }

    let signature = meta.get_default_signature()?;
    let meta_stash_oid =
        meta.create_commit(None, &signature, &signature, &message, &stash_tree, &parents)?;

    // `refs/meta-stash`'s reflog IS the stash list (most-recent first); the
    // `log_message` passed to `create_reference` appends the entry for us.
    let refname = ReferenceName::from(META_STASH_REF);
    meta.create_reference(&refname, meta_stash_oid, true, &message)?;

    let _ = head_oid;
    Ok(Some(SaveResult {
        meta_stash: meta_stash_oid,
        submodule_stashes,
    }))
}

fn save_one_submodule(sub_path: &Path, sub: &Submodule, message: &str) -> Result<SubOutcome> {
    match sub.state() {
        SubmoduleState::New => Ok(SubOutcome::skip()),
        SubmoduleState::Deleted => Ok(SubOutcome::pointer_only(Some(deleted_submodule_sentinel()))),
        SubmoduleState::Closed => {
            if sub.index_sha_relation == CommitRelation::Same {
                Ok(SubOutcome::skip())
            } else {
                // There is no local object database to write a synthetic
                // stash commit into for a submodule that isn't checked out;
                // the pinned index sha already durably records all of its
                // local state, so the meta-stash tree captures that sha
                // directly instead of fabricating a child-side commit.
                let index = sub.index.as_ref().ok_or_else(|| {
                    Error::Internal(eyre::eyre!("closed submodule has no index observation"))
                })?;
                let oid: NonZeroOid = index
                    .sha
                    .as_str()
                    .parse()
                    .map_err(|_| Error::Internal(eyre::eyre!("unparsable submodule index sha")))?;
                Ok(SubOutcome::pointer_only(Some(oid)))
            }
        }
        SubmoduleState::Open => {
            let sub_status = sub
                .status
                .as_deref()
                .ok_or_else(|| Error::Internal(eyre::eyre!("open submodule has no status")))?;
            let child_dirty = !sub_status.staged.is_empty() || !sub_status.workdir.is_empty();
            let pointer_clean = sub.index_sha_relation == CommitRelation::Same
                && sub.workdir_sha_relation == CommitRelation::Same;
            if !child_dirty && pointer_clean {
                return Ok(SubOutcome::skip());
            }

            let mut sub_repo = Repo::open(sub_path)?;
            let pre_stash_head = sub_repo
                .get_head_commit()?
                .ok_or_else(|| Error::UserError("submodule has no HEAD to stash".to_owned()))?
                .get_oid();

            let meta_index_commit: Option<NonZeroOid> = sub
                .index
                .as_ref()
                .map(|index| index.sha.as_str().parse())
                .transpose()
                .map_err(|_| Error::Internal(eyre::eyre!("unparsable submodule index sha")))?;
            let third_parent = if sub.workdir_sha_relation == CommitRelation::Ahead {
                Some(pre_stash_head)
            } else {
                None
            };

            let (tree_oid, parent_oids) = if child_dirty {
                let signature = sub_repo.get_default_signature()?;
                let stash_oid = sub_repo.stash_save(&signature, message, false)?;
                let stash_commit = sub_repo.find_commit_or_fail(stash_oid)?;
                let tree_oid = stash_commit.get_tree_id();
                let stash_parents = stash_commit.get_parent_oids();
                sub_repo.stash_drop(0)?;

                if pointer_clean {
                    (tree_oid, stash_parents)
                } else {
                    let mut parents = vec![stash_parents[0]];
                    if let Some(index_commit) = stash_parents.get(1) {
                        parents.push(*index_commit);
                    }
                    // Parents 3 and 4 are always both present once the
                    // pointer itself is dirty, so `apply` can tell this
                    // apart from the 3-parent shape it would otherwise be
                    // ambiguous with; an unused slot just duplicates the
                    // ahead-chain tip (itself `third_parent.unwrap_or`
                    // `parents[0]` when not ahead).
                    let third = third_parent.unwrap_or(parents[0]);
                    parents.push(third);
                    parents.push(meta_index_commit.unwrap_or(third));
                    (tree_oid, parents)
                }
            } else {
                // Only the pointer (head/index) differs; the child's own
                // working tree is clean, so build the four-parent commit by
                // hand from its current HEAD tree.
                let mut index = sub_repo.get_index()?;
                let index_tree_oid = index.write_tree(&sub_repo)?;
                let head_commit = sub_repo.find_commit_or_fail(pre_stash_head)?;
                let index_tree = sub_repo
                    .find_tree(index_tree_oid)?
                    .ok_or_else(|| Error::Internal(eyre::eyre!("just-written index tree not found")))?;
                let signature = sub_repo.get_default_signature()?;
                let index_commit_oid = sub_repo.create_commit(
                    None,
                    &signature,
                    &signature,
                    "index on stash",
                    &index_tree,
                    &[&head_commit],
                )?;

                let mut parents = vec![pre_stash_head, index_commit_oid];
                let third = third_parent.unwrap_or(pre_stash_head);
                parents.push(third);
                parents.push(meta_index_commit.unwrap_or(third));
                (head_commit.get_tree_id(), parents)
            };

            let tree = sub_repo
                .find_tree(tree_oid)?
                .ok_or_else(|| Error::Internal(eyre::eyre!("stash tree not found")))?;
            let parent_commits = parent_oids
                .iter()
                .map(|oid| sub_repo.find_commit_or_fail(*oid))
                .collect::<crate::git::RepoResult<Vec<_>>>()?;
            let parent_refs: Vec<&crate::git::Commit> = parent_commits.iter().collect();
            let signature = sub_repo.get_default_signature()?;
            let stash_commit_oid = sub_repo.create_commit(
                None,
                &signature,
                &signature,
                message,
                &tree,
                &parent_refs,
            )?;

            Ok(SubOutcome {
                tree_entry: Some(stash_commit_oid),
                stash_commit: Some(stash_commit_oid),
                pre_stash_head: Some(pre_stash_head),
            })
        }
    }
}

/// What `apply` did.
#[derive(Debug)]
pub struct ApplyResult {
    /// The submodule stash commit applied for each affected submodule.
    pub submodule_stashes: BTreeMap<String, NonZeroOid>,
}

fn submodule_entries(tree: &Tree) -> BTreeMap<String, NonZeroOid> {
    tree.list_entries()
        .into_iter()
        .filter(|(_, _, mode)| *mode == FileMode::Commit)
        .map(|(name, oid, _)| (name, oid))
        .collect()
}

/// Replay the recorded tip `parent2` of a four-parent sub-stash commit onto
/// `sub_repo`'s current `HEAD`, then reapply the stash's own uncommitted
/// changes on top, via a chain of non-interactive cherry-picks. Returns the
/// oid of the new tip, or an error message (surfaced by the caller as
/// [`Error::StateConflict`]) naming the first step that conflicted.
///
/// `HEAD` is read fresh here rather than reused from save time, since the
/// child may have moved on (new commits pulled, or reset back) between
/// `save` and `apply`:
/// - `HEAD` already *is* `parent2`, or a descendant of it: the recorded tip
///   is already present, nothing to replay.
/// - `HEAD` is an ancestor of `parent2`: a plain fast-forward onto it.
/// - otherwise the two have diverged: rebase the commits unique to
///   `parent2` (since their merge base) onto `HEAD` one at a time.
fn replay_onto_head(
    sub_repo: &Repo,
    stash_commit: &Commit,
    parents: &[NonZeroOid],
) -> std::result::Result<NonZeroOid, String> {
    let parent2 = parents[2];
    let current_head_oid = sub_repo
        .get_head_commit()
        .map_err(|err| err.to_string())?
        .ok_or_else(|| "submodule has no HEAD to replay onto".to_owned())?
        .get_oid();

    let relation = sub_repo
        .get_commit_relation(current_head_oid, parent2)
        .map_err(|err| err.to_string())?;

    let tip = match relation {
        crate::git::CommitRelation::Same | crate::git::CommitRelation::Behind => sub_repo
            .find_commit_or_fail(current_head_oid)
            .map_err(|err| err.to_string())?,
        crate::git::CommitRelation::Ahead => {
            sub_repo.find_commit_or_fail(parent2).map_err(|err| err.to_string())?
        }
        crate::git::CommitRelation::Diverged => {
            let merge_base = sub_repo
                .find_merge_base(current_head_oid, parent2)
                .map_err(|err| err.to_string())?
                .ok_or_else(|| "submodule history has no common ancestor to replay onto".to_owned())?;
            let chain = sub_repo
                .get_commits_between(parent2, &[merge_base])
                .map_err(|err| err.to_string())?;
            let mut tip = sub_repo
                .find_commit_or_fail(current_head_oid)
                .map_err(|err| err.to_string())?;
            for oid in chain.into_iter().rev() {
                let commit = sub_repo.find_commit_or_fail(oid).map_err(|err| err.to_string())?;
                let replayed = sub_repo
                    .cherry_pick_onto(&commit, &tip)
                    .map_err(|err| err.to_string())?
                    .ok_or_else(|| format!("commit {oid} conflicts while replaying onto the current HEAD"))?;
                tip = sub_repo.find_commit_or_fail(replayed).map_err(|err| err.to_string())?;
            }
            tip
        }
    };

    sub_repo
        .cherry_pick_onto(stash_commit, &tip)
        .map_err(|err| err.to_string())?
        .ok_or_else(|| "stashed working copy changes conflict with the replayed commits".to_owned())
}

/// Apply the stash at `index` (0 = most recent) without removing it.
#[instrument(skip(meta))]
pub fn apply(meta: &mut Repo, stash_index: usize, reinstate_index: bool) -> Result<ApplyResult> {
    let entries = crate::git::read_reflog(meta, META_STASH_REF)?;
    let entry = entries
        .get(stash_index)
        .ok_or_else(|| Error::UserError(format!("no stash entry at index {stash_index}")))?;
    let stash_oid = entry
        .new_oid
        .ok_or_else(|| Error::Internal(eyre::eyre!("stash reflog entry has no oid")))?;
    let stash_commit = meta.find_commit_or_fail(stash_oid)?;
    let parent_oids = stash_commit.get_parent_oids();
    let parent_oid = *parent_oids
        .first()
        .ok_or_else(|| Error::Internal(eyre::eyre!("meta-stash commit has no parent")))?;
    let index_parent_oid = parent_oids.get(1).copied();

    let parent_tree = meta.find_commit_or_fail(parent_oid)?.get_tree()?;
    let index_tree = index_parent_oid
        .map(|oid| meta.find_commit_or_fail(oid).and_then(|c| c.get_tree()))
        .transpose()?;
    let stash_tree = stash_commit.get_tree()?;

    let working_copy_path = meta
        .get_working_copy_path()
        .ok_or_else(|| Error::UserError("cannot apply a stash in a bare repository".to_owned()))?;

    let parent_subs = submodule_entries(&parent_tree);
    let index_subs = match &index_tree {
        Some(tree) => submodule_entries(tree),
        None => parent_subs.clone(),
    };
    let stash_subs = submodule_entries(&stash_tree);

    for name in parent_subs.keys() {
        if !stash_subs.contains_key(name) {
            let _ = std::fs::remove_dir_all(working_copy_path.join(name));
        }
    }
    {
        let mut index = meta.get_index()?;
        for name in parent_subs.keys() {
            if !index_subs.contains_key(name) {
                let _ = index.remove(Path::new(name));
            }
        }
        index.write()?;
    }

    if let Some((oid, _)) = stash_tree.get_path(Path::new(".gitmodules"))? {
        let contents = meta.read_blob(oid)?;
        std::fs::write(working_copy_path.join(".gitmodules"), &contents)
            .map_err(|err| Error::Internal(err.into()))?;
        let mut index = meta.get_index()?;
        index.add_by_path(Path::new(".gitmodules"))?;
        index.write()?;
    }

    let mut submodule_stashes = BTreeMap::new();
    let mut failures = Vec::new();

    for (name, stash_sub_oid) in &stash_subs {
        if parent_subs.get(name) == Some(stash_sub_oid) {
            continue;
        }

        // The deleted-submodule sentinel never denotes a real commit;
        // restoring it means the index (and any leftover checkout) should
        // have no entry for this path, not that some repository needs
        // opening.
        if *stash_sub_oid == deleted_submodule_sentinel() {
            let mut index = meta.get_index()?;
            let _ = index.remove(Path::new(name));
            index.write()?;
            let _ = std::fs::remove_dir_all(working_copy_path.join(name));
            continue;
        }

        let sub_path = working_copy_path.join(name);
        let mut sub_repo = match Repo::open(&sub_path) {
            Ok(repo) => repo,
            Err(_) => {
                // No local checkout to open: this is a closed submodule, and
                // its tree entry is the literal recorded sha rather than a
                // synthetic stash commit (see `save_one_submodule`'s Closed
                // arm). There is no working tree to stash-apply into;
                // restoring it just means pointing the meta index's gitlink
                // entry at the recorded sha again.
                let mut index = meta.get_index()?;
                index.add_entry(Path::new(name), *stash_sub_oid, FileMode::Commit)?;
                index.write()?;
                continue;
            }
        };
        let stash_sub_commit = match sub_repo.find_commit(*stash_sub_oid)? {
            Some(commit) => commit,
            None => {
                failures.push(format!(
                    "submodule '{name}': stash commit {stash_sub_oid} not found locally"
                ));
                continue;
            }
        };

        let stash_sub_parents = stash_sub_commit.get_parent_oids();

        let apply_oid = if stash_sub_parents.len() > 2 {
            match replay_onto_head(&sub_repo, &stash_sub_commit, &stash_sub_parents) {
                Ok(replayed) => {
                    sub_repo.set_head_detached(replayed)?;
                    sub_repo.checkout_head_force()?;
                    if reinstate_index {
                        let replayed_commit = sub_repo.find_commit_or_fail(replayed)?;
                        let replayed_tree = replayed_commit.get_tree()?;
                        let mut index = sub_repo.get_index()?;
                        index.update_from_tree(&replayed_tree)?;
                    }
                    None
                }
                Err(message) => {
                    failures.push(format!("submodule '{name}': {message}"));
                    continue;
                }
            }
        } else {
            Some(*stash_sub_oid)
        };

        if let Some(apply_oid) = apply_oid {
            let refname = ReferenceName::from("refs/stash");
            sub_repo.create_reference(&refname, apply_oid, true, "coordinator: stash apply")?;
            if reinstate_index {
                sub_repo.stash_pop(0, true)?;
            } else {
                sub_repo.stash_apply(0, false)?;
            }
        }

        submodule_stashes.insert(name.clone(), *stash_sub_oid);

        if let Some(fourth) = stash_sub_parents.get(3) {
            let mut index = meta.get_index()?;
            index.add_entry(Path::new(name), *fourth, FileMode::Commit)?;
            index.write()?;
        }
    }

    if !failures.is_empty() {
        return Err(Error::StateConflict(failures.join("; ")));
    }

    Ok(ApplyResult { submodule_stashes })
}

/// Drop the stash entry at `index`. If it was the top of the stack and more
/// remain, `refs/meta-stash` advances to the new top; if none remain, the
/// ref is deleted.
#[instrument(skip(meta))]
pub fn drop_stash(meta: &Repo, index: usize) -> Result<()> {
    crate::git::drop_reflog_entry(meta, META_STASH_REF, index)?;
    let remaining = crate::git::reflog_len(meta, META_STASH_REF)?;
    let refname = ReferenceName::from(META_STASH_REF);
    if remaining == 0 {
        meta.delete_reference(&refname)?;
    } else if index == 0 {
        let entries = crate::git::read_reflog(meta, META_STASH_REF)?;
        if let Some(new_top) = entries.first().and_then(|e| e.new_oid) {
            meta.create_reference(&refname, new_top, true, "coordinator: stash drop")?;
        }
    }
    Ok(())
}

/// `apply` followed by `drop_stash`, plus removal of each submodule's
/// `refs/sub-stash/<sha>`.
#[instrument(skip(meta))]
pub fn pop(meta: &mut Repo, stash_index: usize, reinstate_index: bool) -> Result<ApplyResult> {
    let result = apply(meta, stash_index, reinstate_index)?;
    drop_stash(meta, stash_index)?;

    let working_copy_path = meta
        .get_working_copy_path()
        .ok_or_else(|| Error::UserError("cannot pop a stash in a bare repository".to_owned()))?;
    for (name, stash_oid) in &result.submodule_stashes {
        if let Ok(sub_repo) = Repo::open(&working_copy_path.join(name)) {
            let refname = ReferenceName::from(format!("refs/sub-stash/{stash_oid}"));
            let _ = sub_repo.delete_reference(&refname);
        }
    }
    Ok(result)
}

/// List stash entries, most-recent first.
pub fn list(meta: &Repo) -> Result<Vec<crate::git::ReflogEntry>> {
    Ok(crate::git::read_reflog(meta, META_STASH_REF)?)
}
