use tracing::instrument;

use super::repo::{Error, Result};
use super::{Index, Repo, Tree};

/// A diff between two trees, or a tree and the index/working copy.
pub struct Diff<'repo> {
    pub(super) inner: git2::Diff<'repo>,
}

impl Diff<'_> {
    /// Whether this diff contains any changed paths at all.
    pub fn is_empty(&self) -> bool {
        self.inner.deltas().next().is_none()
    }

    /// The paths touched by this diff, relative to the repository root.
    pub fn changed_paths(&self) -> Vec<std::path::PathBuf> {
        self.inner
            .deltas()
            .filter_map(|delta| delta.new_file().path().or_else(|| delta.old_file().path()))
            .map(|p| p.to_owned())
            .collect()
    }
}

/// Diff the index against the working copy.
#[instrument(skip(repo, index))]
pub fn diff_index_to_workdir<'repo>(repo: &'repo Repo, index: &mut Index) -> Result<Diff<'repo>> {
    let diff = repo
        .inner
        .diff_index_to_workdir(Some(&mut index.inner), None)
        .map_err(Error::Git)?;
    Ok(Diff { inner: diff })
}

/// Diff a tree against the index.
#[instrument(skip(repo, tree, index))]
pub fn diff_tree_to_index<'repo>(
    repo: &'repo Repo,
    tree: &Tree,
    index: &mut Index,
) -> Result<Diff<'repo>> {
    let diff = repo
        .inner
        .diff_tree_to_index(Some(&tree.inner), Some(&mut index.inner), None)
        .map_err(Error::Git)?;
    Ok(Diff { inner: diff })
}

/// Diff a tree against the working copy directly.
#[instrument(skip(repo, tree))]
pub fn diff_tree_to_workdir<'repo>(repo: &'repo Repo, tree: &Tree) -> Result<Diff<'repo>> {
    let diff = repo
        .inner
        .diff_tree_to_workdir(Some(&tree.inner), None)
        .map_err(Error::Git)?;
    Ok(Diff { inner: diff })
}
