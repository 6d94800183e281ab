//! The coordinator's error taxonomy (`spec.md` §7): every failure a
//! coordination operation can produce is one of three kinds, distinguished at
//! the type level rather than left as prose so that callers can pattern-match
//! on how recoverable a failure is.

use thiserror::Error;

/// A coordination-level failure.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum Error {
    /// Recoverable and actionable: the caller gave bad input, or repository
    /// state doesn't meet a precondition the operation documents (an unclean
    /// path where cleanliness was required, an out-of-range stash index, a
    /// pathspec that matched nothing, conflicting flags).
    #[error("{0}")]
    UserError(String),

    /// A mid-operation conflict was hit after some work already happened;
    /// partial progress is left in place rather than rolled back, and the
    /// message says what to do next (an apply whose per-submodule stash
    /// needs a conflict resolved by hand).
    #[error("{0}")]
    StateConflict(String),

    /// Anything else: a corrupt object, an I/O failure, a bug in this crate.
    #[error(transparent)]
    Internal(#[from] eyre::Error),

    #[error(transparent)]
    Git(#[from] crate::git::RepoError),

    #[error(transparent)]
    Tree(#[from] crate::git::TreeError),

    #[error(transparent)]
    Reflog(#[from] crate::git::ReflogError),

    #[error(transparent)]
    Status(#[from] crate::status::Error),
}

/// The result type used throughout `crate::coordinator`.
pub type Result<T> = std::result::Result<T, Error>;
