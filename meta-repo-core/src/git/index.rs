use std::path::{Path, PathBuf};

use tracing::instrument;

use super::oid::make_non_zero_oid;
use super::repo::{Error, Result};
use super::status::FileMode;
use super::{MaybeZeroOid, NonZeroOid, Tree};

/// An entry in the Git index.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndexEntry {
    /// The path of the entry, relative to the repository root.
    pub path: PathBuf,
    /// The object ID of the entry's blob (or submodule commit).
    pub oid: MaybeZeroOid,
    /// The file mode of the entry.
    pub file_mode: FileMode,
}

/// The Git index (staging area).
pub struct Index {
    pub(super) inner: git2::Index,
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Index len={}>", self.inner.len())
    }
}

impl Index {
    /// Whether there are unresolved merge conflicts in the index.
    pub fn has_conflicts(&self) -> bool {
        self.inner.has_conflicts()
    }

    /// List all (stage 0) entries currently in the index.
    #[instrument(skip(self))]
    pub fn entries(&self) -> Vec<IndexEntry> {
        self.inner
            .iter()
            .filter_map(|entry| {
                // Only stage 0 (normal) entries; higher stages denote conflicts.
                let stage = (entry.flags_extended >> 12) & 0x3;
                if stage != 0 {
                    return None;
                }
                Some(IndexEntry {
                    path: PathBuf::from(String::from_utf8_lossy(&entry.path).into_owned()),
                    oid: MaybeZeroOid::from(entry.id),
                    file_mode: FileMode::from(entry.mode as i32),
                })
            })
            .collect()
    }

    /// Get the (stage 0) entry for the given path, if present.
    #[instrument(skip(self))]
    pub fn get_by_path(&self, path: &Path) -> Option<IndexEntry> {
        self.inner.get_path(path, 0).map(|entry| IndexEntry {
            path: path.to_owned(),
            oid: MaybeZeroOid::from(entry.id),
            file_mode: FileMode::from(entry.mode as i32),
        })
    }

    /// Stage the current on-disk contents of `path` (relative to the
    /// repository's working copy root).
    #[instrument(skip(self))]
    pub fn add_by_path(&mut self, path: &Path) -> Result<()> {
        self.inner.add_path(path).map_err(Error::UpdateIndex)
    }

    /// Stage a specific blob at `path` with the given file mode, without
    /// touching the working copy (used when rehydrating stash state).
    #[instrument(skip(self))]
    pub fn add_entry(&mut self, path: &Path, oid: NonZeroOid, file_mode: FileMode) -> Result<()> {
        let entry = git2::IndexEntry {
            ctime: git2::IndexTime::new(0, 0),
            mtime: git2::IndexTime::new(0, 0),
            dev: 0,
            ino: 0,
            mode: i32::from(file_mode) as u32,
            uid: 0,
            gid: 0,
            file_size: 0,
            id: oid.into(),
            flags: 0,
            flags_extended: 0,
            path: path.to_string_lossy().into_owned().into_bytes(),
        };
        self.inner.add(&entry).map_err(Error::UpdateIndex)
    }

    /// Remove the entry for `path` from the index.
    #[instrument(skip(self))]
    pub fn remove(&mut self, path: &Path) -> Result<()> {
        self.inner.remove_path(path).map_err(Error::UpdateIndex)
    }

    /// Persist the in-memory index to disk.
    #[instrument(skip(self))]
    pub fn write(&mut self) -> Result<()> {
        self.inner.write().map_err(Error::UpdateIndex)
    }

    /// Reset the index to match `tree`, then persist it.
    #[instrument(skip(self, tree))]
    pub fn update_from_tree(&mut self, tree: &Tree) -> Result<()> {
        self.inner.read_tree(&tree.inner).map_err(Error::UpdateIndex)?;
        self.write()
    }

    /// Write the current index contents out as a tree object, returning its
    /// OID.
    #[instrument(skip(self))]
    pub fn write_tree(&mut self, repo: &super::Repo) -> Result<NonZeroOid> {
        let oid = self
            .inner
            .write_tree_to(&repo.inner)
            .map_err(Error::WriteIndexToTree)?;
        Ok(make_non_zero_oid(oid))
    }
}
