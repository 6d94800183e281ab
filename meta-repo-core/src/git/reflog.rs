//! Reference-log access.
//!
//! The stash machinery in [`crate::coordinator::stash`] is built entirely out
//! of ordinary Git reflog entries: `refs/meta-stash` is just a ref whose
//! reflog is the stash list, the same way `git`'s own `refs/stash` works.

use thiserror::Error;
use tracing::instrument;

use super::{NonZeroOid, Repo};

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not read reflog for '{name}': {source}")]
    ReadReflog { source: git2::Error, name: String },

    #[error("could not append reflog entry for '{name}': {source}")]
    AppendReflog { source: git2::Error, name: String },

    #[error("could not write reflog for '{name}': {source}")]
    WriteReflog { source: git2::Error, name: String },

    #[error("could not drop reflog entry {index} for '{name}': {source}")]
    DropReflogEntry {
        source: git2::Error,
        name: String,
        index: usize,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// One entry in a reference's reflog.
#[derive(Clone, Debug)]
pub struct ReflogEntry {
    /// The OID the reference pointed to before this entry.
    pub old_oid: Option<NonZeroOid>,
    /// The OID the reference was updated to at this entry.
    pub new_oid: Option<NonZeroOid>,
    /// The message attached to the update (e.g. `WIP on branch: ...`).
    pub message: Option<String>,
}

/// Read the full reflog for `name`, most-recent entry first (matching
/// `git reflog`'s own ordering, and `refs/meta-stash`'s role as a stack).
#[instrument(skip(repo))]
pub fn read_reflog(repo: &Repo, name: &str) -> Result<Vec<ReflogEntry>> {
    let reflog = repo
        .inner
        .reflog(name)
        .map_err(|source| Error::ReadReflog {
            source,
            name: name.to_owned(),
        })?;
    let entries = reflog
        .iter()
        .map(|entry| ReflogEntry {
            old_oid: NonZeroOid::try_from(entry.id_old()).ok(),
            new_oid: NonZeroOid::try_from(entry.id_new()).ok(),
            message: entry.message().map(|s| s.to_owned()),
        })
        .collect();
    Ok(entries)
}

/// Append a new entry to `name`'s reflog, recording the transition from
/// `old_oid` to `new_oid`.
#[instrument(skip(repo))]
pub fn append_reflog(
    repo: &Repo,
    name: &str,
    new_oid: NonZeroOid,
    committer: &git2::Signature,
    message: &str,
) -> Result<()> {
    let mut reflog = repo
        .inner
        .reflog(name)
        .map_err(|source| Error::ReadReflog {
            source,
            name: name.to_owned(),
        })?;
    reflog
        .append(new_oid.into(), committer, Some(message))
        .map_err(|source| Error::AppendReflog {
            source,
            name: name.to_owned(),
        })?;
    reflog.write().map_err(|source| Error::WriteReflog {
        source,
        name: name.to_owned(),
    })?;
    Ok(())
}

/// Drop the `index`-th entry (0 = most recent) from `name`'s reflog.
#[instrument(skip(repo))]
pub fn drop_reflog_entry(repo: &Repo, name: &str, index: usize) -> Result<()> {
    let mut reflog = repo
        .inner
        .reflog(name)
        .map_err(|source| Error::ReadReflog {
            source,
            name: name.to_owned(),
        })?;
    reflog
        .remove(index, false)
        .map_err(|source| Error::DropReflogEntry {
            source,
            name: name.to_owned(),
            index,
        })?;
    reflog.write().map_err(|source| Error::WriteReflog {
        source,
        name: name.to_owned(),
    })?;
    Ok(())
}

/// Number of entries currently in `name`'s reflog.
pub fn reflog_len(repo: &Repo, name: &str) -> Result<usize> {
    Ok(read_reflog(repo, name)?.len())
}
