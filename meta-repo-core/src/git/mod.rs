//! Tools for interfacing with a single Git repository.
//!
//! Everything above this module (the shorthand codec, the status
//! aggregator, the coordinator) is built entirely out of the plumbing
//! adapters exposed here; nothing outside `git/` talks to `git2` directly.

mod config;
mod diff;
mod editor;
mod index;
mod object;
mod oid;
mod reference;
mod reflog;
mod repo;
mod status;
mod tree;

pub use config::{Config, ConfigRead, ConfigValue};
pub use diff::{diff_index_to_workdir, diff_tree_to_index, diff_tree_to_workdir, Diff};
pub use editor::{
    resolve_editor_command, EditorInvoker, Error as EditorError, FakeEditorInvoker,
    ProcessEditorInvoker,
};
pub use index::{Index, IndexEntry};
pub use object::Commit;
pub use oid::{MaybeZeroOid, MaybeZeroOidParseError, NonZeroOid, OidParseError};
pub use reference::{
    Branch, BranchType, Reference, ReferenceName, ReferenceNameError, ReferenceTarget,
};
pub use reflog::{
    append_reflog, drop_reflog_entry, read_reflog, reflog_len, Error as ReflogError, ReflogEntry,
};
pub use repo::{
    CommitRelation, Error as RepoError, Repo, Result as RepoResult, Signature, StashEntry, Time,
};
pub use status::{status_bits, FileMode, PathStatus, StatusBits, StatusOptions};
pub use tree::{
    dehydrate_tree, get_changed_paths_between_trees, hydrate_tree, make_empty_tree,
    Error as TreeError, Tree,
};
