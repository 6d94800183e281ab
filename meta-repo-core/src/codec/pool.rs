//! The global commit-id arena used while resolving a multi-repo shorthand
//! string: every commit introduced by any repo's base or overrides is
//! merged into one id-keyed pool (`spec.md` §4.B point 1), so that the same
//! id can be shared by reference across repos as long as every definition
//! agrees structurally.

use std::collections::BTreeMap;

use super::{Error, Result};
use crate::ast::{Commit, CommitId};

/// An id-keyed arena of commit definitions, enforcing the
/// structural-equality-on-collision rule from `spec.md` §4.B.
#[derive(Clone, Debug, Default)]
pub struct CommitPool {
    commits: BTreeMap<CommitId, Commit>,
}

impl CommitPool {
    /// Construct an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or re-insert) `commit` under `id`. If `id` is already
    /// present, the new definition must be structurally identical to the
    /// existing one.
    pub fn insert(&mut self, id: CommitId, commit: Commit) -> Result<()> {
        match self.commits.get(&id) {
            Some(existing) if existing == &commit => Ok(()),
            Some(_) => Err(Error::ConflictingCommitDefinition { id: id.0 }),
            None => {
                self.commits.insert(id, commit);
                Ok(())
            }
        }
    }

    /// Look up a commit's definition by id.
    pub fn get(&self, id: &CommitId) -> Option<&Commit> {
        self.commits.get(id)
    }

    /// Copy `id` and every commit transitively reachable from it (via
    /// `parents`) into `dest`, leaving `dest` untouched for ids already
    /// present there.
    pub fn copy_reachable_into(&self, id: &CommitId, dest: &mut BTreeMap<CommitId, Commit>) {
        if dest.contains_key(id) {
            return;
        }
        let Some(commit) = self.commits.get(id) else {
            return;
        };
        dest.insert(id.clone(), commit.clone());
        for parent in commit.parents.clone() {
            self.copy_reachable_into(&parent, dest);
        }
    }
}
