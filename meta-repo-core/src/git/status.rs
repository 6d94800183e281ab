use std::path::PathBuf;

use bitflags::bitflags;
use tracing::instrument;

use super::Repo;

/// A Git file-mode, as stored in a tree or index entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FileMode {
    /// No entry / unreadable.
    Unreadable,
    /// A directory entry (subtree).
    Tree,
    /// A regular, non-executable file.
    Blob,
    /// A regular, executable file.
    BlobExecutable,
    /// A symbolic link.
    Link,
    /// A submodule (gitlink) entry.
    Commit,
}

impl From<i32> for FileMode {
    fn from(file_mode: i32) -> Self {
        if file_mode == i32::from(git2::FileMode::Blob) {
            FileMode::Blob
        } else if file_mode == i32::from(git2::FileMode::BlobExecutable) {
            FileMode::BlobExecutable
        } else if file_mode == i32::from(git2::FileMode::Commit) {
            FileMode::Commit
        } else if file_mode == i32::from(git2::FileMode::Link) {
            FileMode::Link
        } else if file_mode == i32::from(git2::FileMode::Tree) {
            FileMode::Tree
        } else {
            FileMode::Unreadable
        }
    }
}

impl From<FileMode> for i32 {
    fn from(file_mode: FileMode) -> Self {
        match file_mode {
            FileMode::Blob => git2::FileMode::Blob.into(),
            FileMode::BlobExecutable => git2::FileMode::BlobExecutable.into(),
            FileMode::Commit => git2::FileMode::Commit.into(),
            FileMode::Link => git2::FileMode::Link.into(),
            FileMode::Tree => git2::FileMode::Tree.into(),
            FileMode::Unreadable => git2::FileMode::Unreadable.into(),
        }
    }
}

bitflags! {
    /// Per-path status bits, mirroring `git status --porcelain=2`'s XY codes
    /// but exposed as an orthogonal set rather than a two-character code, per
    /// the plumbing adapter's `statusBits` contract.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct StatusBits: u32 {
        /// New in the index relative to `HEAD`.
        const INDEX_NEW = 1 << 0;
        /// Deleted from the index relative to `HEAD`.
        const INDEX_DEL = 1 << 1;
        /// Modified in the index relative to `HEAD`.
        const INDEX_MOD = 1 << 2;
        /// Renamed in the index relative to `HEAD`.
        const INDEX_RENAMED = 1 << 3;
        /// Type changed in the index relative to `HEAD`.
        const INDEX_TYPECHANGE = 1 << 4;
        /// New in the working copy relative to the index.
        const WT_NEW = 1 << 5;
        /// Deleted in the working copy relative to the index.
        const WT_DEL = 1 << 6;
        /// Modified in the working copy relative to the index.
        const WT_MOD = 1 << 7;
        /// Type changed in the working copy relative to the index.
        const WT_TYPECHANGE = 1 << 8;
        /// Conflicted (unmerged) in the index.
        const CONFLICTED = 1 << 9;
    }
}

impl From<git2::Status> for StatusBits {
    fn from(status: git2::Status) -> Self {
        let mut bits = StatusBits::empty();
        if status.is_index_new() {
            bits |= StatusBits::INDEX_NEW;
        }
        if status.is_index_deleted() {
            bits |= StatusBits::INDEX_DEL;
        }
        if status.is_index_modified() {
            bits |= StatusBits::INDEX_MOD;
        }
        if status.is_index_renamed() {
            bits |= StatusBits::INDEX_RENAMED;
        }
        if status.is_index_typechange() {
            bits |= StatusBits::INDEX_TYPECHANGE;
        }
        if status.is_wt_new() {
            bits |= StatusBits::WT_NEW;
        }
        if status.is_wt_deleted() {
            bits |= StatusBits::WT_DEL;
        }
        if status.is_wt_modified() {
            bits |= StatusBits::WT_MOD;
        }
        if status.is_wt_typechange() {
            bits |= StatusBits::WT_TYPECHANGE;
        }
        if status.is_conflicted() {
            bits |= StatusBits::CONFLICTED;
        }
        bits
    }
}

/// A single path's status bits, as returned by [`status_bits`].
#[derive(Clone, Debug)]
pub struct PathStatus {
    /// The path, relative to the repository root.
    pub path: PathBuf,
    /// The status bits for that path.
    pub bits: StatusBits,
}

/// Options for [`status_bits`].
#[derive(Clone, Debug, Default)]
pub struct StatusOptions {
    /// Include untracked files.
    pub include_untracked: bool,
    /// Recurse into untracked directories rather than reporting just the
    /// directory itself.
    pub recurse_untracked_dirs: bool,
    /// Restrict the scan to these paths (empty means "everything").
    pub paths: Vec<PathBuf>,
}

/// Compute per-path status bits for the working copy and index, relative to
/// `HEAD`, optionally restricted to a set of paths. This is the plumbing
/// adapter's `statusBits` capability (§4.C).
#[instrument(skip(repo))]
pub fn status_bits(repo: &Repo, options: &StatusOptions) -> eyre::Result<Vec<PathStatus>> {
    let mut status_options = git2::StatusOptions::new();
    status_options
        .include_untracked(options.include_untracked)
        .recurse_untracked_dirs(options.recurse_untracked_dirs)
        .include_ignored(false)
        .renames_head_to_index(true);
    for path in &options.paths {
        status_options.pathspec(path);
    }

    let statuses = repo.inner.statuses(Some(&mut status_options))?;
    let result = statuses
        .iter()
        .filter_map(|entry| {
            let path = entry.path()?;
            Some(PathStatus {
                path: PathBuf::from(path),
                bits: StatusBits::from(entry.status()),
            })
        })
        .collect();
    Ok(result)
}
