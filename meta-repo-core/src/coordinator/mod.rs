//! The coordinator: the operations that act across the meta repository and
//! its submodules together (`spec.md` §4.E). Everything here is built out of
//! [`crate::git`] plumbing and [`crate::status`]'s aggregated
//! [`crate::ast::RepoStatus`], never `git2` directly.

mod commit;
mod error;
mod rm;
mod shadow;
mod stash;

pub use commit::{commit, CommitResult};
pub use error::{Error, Result};
pub use rm::{rm_paths, RmOptions, RmResult};
pub use shadow::shadow_commit;
pub use stash::{apply, drop_stash, list, pop, save, ApplyResult, SaveResult};
