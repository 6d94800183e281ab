use bstr::BString;
use tracing::instrument;

use super::oid::make_non_zero_oid;
use super::repo::{Error, Result, Signature};
use super::{NonZeroOid, Tree};

/// Represents a commit object in the Git object database.
#[derive(Clone)]
pub struct Commit<'repo> {
    pub(super) inner: git2::Commit<'repo>,
}

impl std::fmt::Debug for Commit<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Commit {}>", self.get_oid())
    }
}

impl<'repo> Commit<'repo> {
    /// Get the object ID of the commit.
    #[instrument]
    pub fn get_oid(&self) -> NonZeroOid {
        make_non_zero_oid(self.inner.id())
    }

    /// Get the object IDs of the parents of this commit, in order.
    #[instrument]
    pub fn get_parent_oids(&self) -> Vec<NonZeroOid> {
        self.inner.parent_ids().map(make_non_zero_oid).collect()
    }

    /// Get the number of parents of this commit.
    #[instrument]
    pub fn get_parent_count(&self) -> usize {
        self.inner.parent_count()
    }

    /// Get the parent commits of this commit, in order.
    #[instrument]
    pub fn get_parents(&self) -> Vec<Commit<'repo>> {
        self.inner
            .parents()
            .map(|commit| Commit { inner: commit })
            .collect()
    }

    /// Get the tree that this commit points to.
    #[instrument]
    pub fn get_tree(&self) -> Result<Tree<'repo>> {
        let tree = self.inner.tree().map_err(Error::Git)?;
        Ok(Tree { inner: tree })
    }

    /// Get the OID of the tree that this commit points to.
    #[instrument]
    pub fn get_tree_id(&self) -> NonZeroOid {
        make_non_zero_oid(self.inner.tree_id())
    }

    /// Get the summary (first line) of the commit message.
    #[instrument]
    pub fn get_summary(&self) -> BString {
        self.inner
            .summary_bytes()
            .map(BString::from)
            .unwrap_or_default()
    }

    /// Get the full commit message, not including any whitespace trimming.
    #[instrument]
    pub fn get_message_raw(&self) -> BString {
        BString::from(self.inner.message_raw_bytes())
    }

    /// Get the author of this commit.
    #[instrument]
    pub fn get_author(&self) -> Signature<'_> {
        Signature {
            inner: self.inner.author(),
        }
    }

    /// Get the committer of this commit.
    #[instrument]
    pub fn get_committer(&self) -> Signature<'_> {
        Signature {
            inner: self.inner.committer(),
        }
    }
}
