//! The shorthand codec: parses the compact textual grammar described in
//! `spec.md` §4.B into a map of [`crate::ast::RepoAST`] values, and
//! materializes such a map into real on-disk repositories (and back).
//!
//! ```text
//! shorthand  = base [':' override (';' override)*]
//! base       = 'S' | 'B' | 'C' url
//! override   = 'H=' [commit]
//!            | 'B' name '=' [commit]
//!            | '*=' [name]
//!            | 'C' id '-' parent [' ' change(',' change)*]
//!            | 'R' name '=' [url] [' ' rbranch(',' rbranch)*]
//! change     = path '=' data
//! rbranch    = name '=' [commit]
//! ```
//!
//! Multi-repo: `name '=' shorthand ('|' name '=' shorthand)*`.

mod lexer;
mod parser;
mod pool;
mod seed;
mod writer;

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::instrument;

use crate::ast::RepoAST;

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum Error {
    #[error("empty shorthand string")]
    Empty,

    #[error("unrecognized base '{0}'")]
    UnknownBase(String),

    #[error("unrecognized override '{0}'")]
    UnknownOverride(String),

    #[error("malformed override '{override_text}': {reason}")]
    MalformedOverride { override_text: String, reason: String },

    #[error("'*' (current branch) and 'H' (head) overrides are mutually exclusive")]
    HeadAndCurrentBranchConflict,

    #[error("duplicate override for branch '{0}'")]
    DuplicateBranchOverride(String),

    #[error("duplicate override for commit '{0}'")]
    DuplicateCommitOverride(String),

    #[error("commit '{id}' was defined twice with different contents")]
    ConflictingCommitDefinition { id: String },

    #[error("repo '{0}' is not defined (or not yet defined) for clone-of")]
    UnknownCloneSource(String),

    #[error("multi-repo entry '{0}' is missing a '=' separator")]
    MissingRepoNameSeparator(String),

    #[error("duplicate repo name '{0}' in multi-repo shorthand")]
    DuplicateRepoName(String),

    #[error("branch '{name}' referenced in repo '{repo}' is not defined")]
    UnknownBranch { repo: String, name: String },

    #[error(transparent)]
    Git(#[from] crate::git::RepoError),

    #[error(transparent)]
    Tree(#[from] crate::git::TreeError),

    #[error(transparent)]
    Other(#[from] eyre::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

pub use parser::{parse_multi_repo_shorthand, parse_repo_shorthand, ParsedRepo};
pub use pool::CommitPool;
pub use writer::{write_multi_rast, write_rast, CommitIdMap, UrlMap};

/// Parse a (possibly multi-repo) shorthand string directly into a map of
/// resolved [`RepoAST`] values, performing the full pool-merge and
/// reachability-closure resolution described in `spec.md` §4.B points 1-4.
#[instrument]
pub fn parse(input: &str) -> Result<BTreeMap<String, RepoAST>> {
    parser::resolve(input)
}
