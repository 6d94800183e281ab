//! `shadow_commit`: build (without updating any ref) a commit that captures
//! the meta repository's current index *and* every open submodule's current
//! working tree, recursively (`spec.md` §4.E.5).
//!
//! This is used by status/diff tooling that wants to compare "everything as
//! it sits right now" against some other commit, without performing a real
//! commit. Submodule subtrees are built the same way [`super::commit`] stages
//! a moved submodule pointer, except the index mutation never touches disk:
//! each open submodule gets its own in-memory index, written as a tree, but
//! that index is never [`crate::git::Index::write`]-ten back to
//! `$GIT_DIR/index`, so the real working copy is left untouched.

use std::collections::HashMap;
use std::path::Path;

use tracing::instrument;

use super::error::{Error, Result};
use crate::ast::{RepoStatus, SubmoduleState};
use crate::git::{hydrate_tree, FileMode, NonZeroOid, Repo};

/// Build a shadow commit for `repo`, returning its OID. Returns the tip
/// commit's OID unchanged (no new object written) if the shadow tree is
/// identical to `HEAD`'s tree.
#[instrument(skip(repo, status))]
pub fn shadow_commit(repo: &Repo, status: &RepoStatus, use_epoch_timestamp: bool) -> Result<NonZeroOid> {
    let head_commit = repo
        .get_head_commit()?
        .ok_or_else(|| Error::UserError("cannot build a shadow commit with no HEAD".to_owned()))?;

    let working_copy_path = repo
        .get_working_copy_path()
        .ok_or_else(|| Error::UserError("cannot build a shadow commit in a bare repository".to_owned()))?;

    let mut entries = HashMap::new();
    for (name, sub) in &status.submodules {
        if sub.state() != SubmoduleState::Open {
            continue;
        }
        let sub_status = sub
            .status
            .as_deref()
            .ok_or_else(|| Error::Internal(eyre::eyre!("open submodule '{name}' has no status")))?;
        let sub_repo = Repo::open(&working_copy_path.join(name))?;
        let sub_shadow = write_shadow_subtree(&sub_repo, sub_status)?;
        entries.insert(Path::new(name).to_owned(), Some((sub_shadow, FileMode::Commit)));
    }

    let head_tree = head_commit.get_tree()?;
    let shadow_tree_oid = if entries.is_empty() {
        head_tree.get_oid()
    } else {
        hydrate_tree(repo, Some(&head_tree), entries)?
    };

    if shadow_tree_oid == head_tree.get_oid() {
        return Ok(head_commit.get_oid());
    }

    let shadow_tree = repo
        .find_tree(shadow_tree_oid)?
        .ok_or_else(|| Error::Internal(eyre::eyre!("just-written shadow tree not found")))?;
    let signature = shadow_signature(repo, &head_commit, use_epoch_timestamp)?;
    let oid = repo.create_commit(
        None,
        &signature,
        &signature,
        "shadow commit",
        &shadow_tree,
        &[&head_commit],
    )?;
    Ok(oid)
}

/// Build (without writing to disk) the tree that captures `sub_repo`'s
/// current on-disk working copy, recursing into any open submodules of its
/// own.
fn write_shadow_subtree(sub_repo: &Repo, sub_status: &RepoStatus) -> Result<NonZeroOid> {
    let head_commit = sub_repo
        .get_head_commit()?
        .ok_or_else(|| Error::Internal(eyre::eyre!("open submodule has no HEAD")))?;
    let working_copy_path = sub_repo
        .get_working_copy_path()
        .ok_or_else(|| Error::Internal(eyre::eyre!("open submodule has no working copy")))?;

    // An in-memory-only index: read from disk, mutated to reflect the
    // current workdir, but never persisted back via `Index::write`.
    let mut index = sub_repo.get_index()?;
    for (path, file_status) in &sub_status.workdir {
        match file_status {
            crate::ast::FileStatus::Removed => {
                let _ = index.remove(Path::new(path));
            }
            _ => {
                if working_copy_path.join(path).exists() {
                    index.add_by_path(Path::new(path))?;
                }
            }
        }
    }

    let mut entries = HashMap::new();
    for (name, sub) in &sub_status.submodules {
        if sub.state() != SubmoduleState::Open {
            continue;
        }
        let nested_status = sub
            .status
            .as_deref()
            .ok_or_else(|| Error::Internal(eyre::eyre!("open submodule '{name}' has no status")))?;
        let nested_repo = Repo::open(&working_copy_path.join(name))?;
        let nested_shadow = write_shadow_subtree(&nested_repo, nested_status)?;
        entries.insert(Path::new(name).to_owned(), Some((nested_shadow, FileMode::Commit)));
    }

    let base_tree_oid = index.write_tree(sub_repo)?;
    if entries.is_empty() {
        return Ok(base_tree_oid);
    }
    let base_tree = sub_repo
        .find_tree(base_tree_oid)?
        .ok_or_else(|| Error::Internal(eyre::eyre!("just-written index tree not found")))?;
    let _ = head_commit;
    Ok(hydrate_tree(sub_repo, Some(&base_tree), entries)?)
}

/// The signature to use for a shadow commit: the real default signature,
/// except when `use_epoch_timestamp` asks for a deterministic timestamp one
/// second after `HEAD`'s own -- so that repeated shadow commits of an
/// unchanged tree are byte-identical and comparisons that only care about
/// "did anything change" can diff trees instead of walking history.
fn shadow_signature(repo: &Repo, head_commit: &crate::git::Commit, use_epoch_timestamp: bool) -> Result<git2::Signature<'static>> {
    let base = repo.get_default_signature()?;
    if !use_epoch_timestamp {
        return Ok(base);
    }
    let time = head_commit.get_committer().get_time();
    let git_time = git2::Time::new(time.seconds + 1, time.offset_minutes);
    let name = base.name().unwrap_or_default().to_owned();
    let email = base.email().unwrap_or_default().to_owned();
    git2::Signature::new(&name, &email, &git_time)
        .map_err(|err| Error::Internal(err.into()))
}
