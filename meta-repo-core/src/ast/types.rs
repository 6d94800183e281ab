//! Value types for the Repo-AST model.
//!
//! Every type here is constructed from a `*Options` record with defaulted
//! fields and is immutable afterward; "mutation" means calling `copy` with a
//! `*Overrides` record naming the fields to replace. Equality is always
//! structural (`#[derive(PartialEq, Eq)]`), since the assertion engine
//! (`crate::assert`) and the property tests in `tests/` compare whole
//! sub-trees with `==`.

use std::collections::BTreeMap;

/// A logical commit identifier, as used in the shorthand grammar (`"1"`,
/// `"2"`, `"a"`, ...) and in a backend-assigned form once written to disk.
/// Distinct from [`crate::git::NonZeroOid`]: a `CommitId` only has meaning
/// relative to a single parsed or in-memory [`RepoAST`].
#[derive(Clone, Debug, Default, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct CommitId(pub String);

impl CommitId {
    /// Borrow the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CommitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CommitId {
    fn from(s: &str) -> Self {
        CommitId(s.to_owned())
    }
}

impl From<String> for CommitId {
    fn from(s: String) -> Self {
        CommitId(s)
    }
}

/// The content recorded for a path in a commit's change set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Content {
    /// A literal blob, stored as a UTF-8 string (shorthand fixtures never
    /// need binary content).
    Blob(String),
    /// A submodule pointer: a URL (which may itself be a logical repo name
    /// resolved by the codec) and the pinned commit.
    Submodule {
        /// The submodule's URL (or logical repo name, pre-resolution).
        url: String,
        /// The pinned commit id inside the submodule.
        sha: CommitId,
    },
}

/// A single path's change within a commit, relative to its parent(s). `None`
/// means the path is removed relative to the parent.
pub type Change = Option<Content>;

/// An immutable commit: an ordered list of parents, a path -> change map,
/// and an optional message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Commit {
    /// Parent commit ids, in order. Empty for a root commit.
    pub parents: Vec<CommitId>,
    /// Changes relative to the (first) parent's tree; for a root commit,
    /// relative to the empty tree.
    pub changes: BTreeMap<String, Change>,
    /// The commit message, if any.
    pub message: Option<String>,
}

/// Options used to construct a [`Commit`].
#[derive(Clone, Debug, Default)]
pub struct CommitOptions {
    /// See [`Commit::parents`].
    pub parents: Vec<CommitId>,
    /// See [`Commit::changes`].
    pub changes: BTreeMap<String, Change>,
    /// See [`Commit::message`].
    pub message: Option<String>,
}

/// Overrides for [`Commit::copy`]; `None` means "leave unchanged".
#[derive(Clone, Debug, Default)]
pub struct CommitOverrides {
    /// See [`Commit::parents`].
    pub parents: Option<Vec<CommitId>>,
    /// See [`Commit::changes`].
    pub changes: Option<BTreeMap<String, Change>>,
    /// See [`Commit::message`].
    pub message: Option<Option<String>>,
}

impl Commit {
    /// Construct a new commit from `options`.
    pub fn new(options: CommitOptions) -> Self {
        Commit {
            parents: options.parents,
            changes: options.changes,
            message: options.message,
        }
    }

    /// Return a new commit with the named fields replaced.
    pub fn copy(&self, overrides: CommitOverrides) -> Self {
        Commit {
            parents: overrides.parents.unwrap_or_else(|| self.parents.clone()),
            changes: overrides.changes.unwrap_or_else(|| self.changes.clone()),
            message: overrides.message.unwrap_or_else(|| self.message.clone()),
        }
    }
}

/// A name -> (commit, optional tracking branch) binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Branch {
    /// The commit this branch points at.
    pub commit: CommitId,
    /// The name of the upstream ("tracking") branch, if any. Only
    /// meaningful for local branches.
    pub tracking: Option<String>,
}

/// A remote: a URL plus a mapping from branch name to commit id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Remote {
    /// The remote's URL (or, pre-resolution, a logical repo name).
    pub url: String,
    /// Remote-tracking branches, by name.
    pub branches: BTreeMap<String, CommitId>,
}

/// How a submodule in a parent's index relates to that parent's `HEAD` and
/// (if open) its own working tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitRelation {
    /// The two sides are the same commit.
    Same,
    /// The left side is an ancestor of the right side.
    Ahead,
    /// The right side is an ancestor of the left side.
    Behind,
    /// Neither side is an ancestor of the other.
    Unrelated,
    /// One or both commits could not be resolved.
    Unknown,
}

/// One of the (up to) three observations that make up a submodule's status:
/// what `HEAD` records, what the index stages, and what the open working
/// tree's own `HEAD` currently is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmoduleObservation {
    /// The submodule's URL as recorded by this observation.
    pub url: String,
    /// The pinned commit as recorded by this observation.
    pub sha: CommitId,
}

/// The derived lifecycle tag for a submodule, computed from which of its
/// three observations are present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmoduleState {
    /// No recorded commit: the submodule was just added in the index.
    New,
    /// No index entry: the submodule was removed.
    Deleted,
    /// Recorded and staged, but not checked out locally.
    Closed,
    /// Checked out locally; a recursive [`RepoStatus`] is available.
    Open,
}

/// A submodule's status, composed from its commit/index/workdir
/// observations plus (if open) a recursive status for its own working tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submodule {
    /// What `HEAD` of the parent records, if anything.
    pub commit: Option<SubmoduleObservation>,
    /// What is staged in the parent's index, if anything.
    pub index: Option<SubmoduleObservation>,
    /// What the open working tree's own `HEAD` is, if the submodule is open.
    pub workdir: Option<SubmoduleObservation>,
    /// The relation between the commit-recorded sha and the index sha.
    pub index_sha_relation: CommitRelation,
    /// The relation between the index sha and the open working tree's
    /// `HEAD`.
    pub workdir_sha_relation: CommitRelation,
    /// If open, the submodule's own recursive status.
    pub status: Option<Box<RepoStatus>>,
}

impl Submodule {
    /// The derived lifecycle tag, computed from which observations are
    /// present: see `spec.md` §3 for the exact rule.
    pub fn state(&self) -> SubmoduleState {
        match (&self.commit, &self.index, &self.status) {
            (None, _, _) => SubmoduleState::New,
            (Some(_), None, _) => SubmoduleState::Deleted,
            (Some(_), Some(_), None) => SubmoduleState::Closed,
            (Some(_), Some(_), Some(_)) => SubmoduleState::Open,
        }
    }
}

/// A path's coarse change classification, as reported by the status
/// aggregator. Distinct from [`crate::git::StatusBits`], which is the raw
/// per-side bitfield the aggregator derives this from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileStatus {
    /// Newly added.
    Added,
    /// Content modified.
    Modified,
    /// Removed.
    Removed,
    /// Renamed (from some other path).
    Renamed,
    /// File type changed (e.g. regular file to symlink).
    TypeChanged,
    /// Unresolved merge conflict.
    Conflicted,
}

/// The kind of sequencer operation currently in progress, if any.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequencerKind {
    /// An in-progress cherry-pick.
    CherryPick,
    /// An in-progress merge.
    Merge,
    /// An in-progress rebase.
    Rebase,
}

/// Serialized state of an in-progress cherry-pick, merge, or rebase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequencerState {
    /// Which operation is in progress.
    pub kind: SequencerKind,
    /// The commit `HEAD` pointed at before the operation began.
    pub original_head: CommitId,
    /// The commit being merged, cherry-picked, or rebased onto.
    pub target: CommitId,
}

/// A (possibly in-progress) rebase's state: the original and onto commits,
/// plus whichever commits remain to be replayed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Rebase {
    /// The commit `HEAD` pointed at before the rebase began.
    pub original_head: CommitId,
    /// The commit being rebased onto.
    pub onto: CommitId,
}

/// The full status of a repository's meta contents plus submodules, as
/// derived from live storage by `crate::status::get_repo_status`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RepoStatus {
    /// The current `HEAD` commit, or `None` for an empty repository.
    pub head: Option<CommitId>,
    /// The current branch name, or `None` if detached (or empty).
    pub current_branch_name: Option<String>,
    /// Whether this repository has no working tree.
    pub bare: bool,
    /// Staged (index-vs-`HEAD`) path statuses, excluding submodule paths.
    pub staged: BTreeMap<String, FileStatus>,
    /// Working-tree (workdir-vs-index) path statuses, excluding submodule
    /// paths.
    pub workdir: BTreeMap<String, FileStatus>,
    /// Submodule statuses, by name.
    pub submodules: BTreeMap<String, Submodule>,
    /// An in-progress rebase, if any.
    pub rebase: Option<Rebase>,
    /// An in-progress cherry-pick/merge/rebase sequencer state, if any.
    pub sequencer: Option<SequencerState>,
}

/// The full, ground-truth, purely-functional value representation of a
/// repository: every commit, every ref, every remote, plus index/workdir
/// changes and any open submodules (recursively, as nested `RepoAST`s).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RepoAST {
    /// Every commit in the repository, by id.
    pub commits: BTreeMap<CommitId, Commit>,
    /// Branches, by name.
    pub branches: BTreeMap<String, Branch>,
    /// Non-branch refs (e.g. `refs/meta-stash`), by fully-qualified name.
    pub refs: BTreeMap<String, CommitId>,
    /// Remotes, by name (conventionally `"origin"`).
    pub remotes: BTreeMap<String, Remote>,
    /// Notes: ref name -> commit id -> note message.
    pub notes: BTreeMap<String, BTreeMap<CommitId, String>>,
    /// The current `HEAD` commit, or `None` for an empty/unborn repository.
    pub head: Option<CommitId>,
    /// The current branch name, or `None` if detached.
    pub current_branch_name: Option<String>,
    /// Whether this repository has no working tree.
    pub bare: bool,
    /// Index changes relative to `HEAD`'s tree.
    pub index: BTreeMap<String, Change>,
    /// Working-tree changes relative to the index.
    pub workdir: BTreeMap<String, Change>,
    /// Open submodules, by name, each with its own recursive `RepoAST`.
    pub open_submodules: BTreeMap<String, RepoAST>,
    /// An in-progress rebase, if any.
    pub rebase: Option<Rebase>,
}

/// Options used to construct a [`RepoAST`]; every field defaults to empty.
pub type RepoASTOptions = RepoAST;

/// Overrides for [`RepoAST::copy`]; `None` means "leave unchanged". Unlike
/// [`CommitOverrides`], map-valued fields here are replaced wholesale rather
/// than merged -- callers that want to merge should read the current value
/// first.
#[derive(Clone, Debug, Default)]
pub struct RepoASTOverrides {
    #[allow(missing_docs)]
    pub commits: Option<BTreeMap<CommitId, Commit>>,
    #[allow(missing_docs)]
    pub branches: Option<BTreeMap<String, Branch>>,
    #[allow(missing_docs)]
    pub refs: Option<BTreeMap<String, CommitId>>,
    #[allow(missing_docs)]
    pub remotes: Option<BTreeMap<String, Remote>>,
    #[allow(missing_docs)]
    pub notes: Option<BTreeMap<String, BTreeMap<CommitId, String>>>,
    #[allow(missing_docs)]
    pub head: Option<Option<CommitId>>,
    #[allow(missing_docs)]
    pub current_branch_name: Option<Option<String>>,
    #[allow(missing_docs)]
    pub bare: Option<bool>,
    #[allow(missing_docs)]
    pub index: Option<BTreeMap<String, Change>>,
    #[allow(missing_docs)]
    pub workdir: Option<BTreeMap<String, Change>>,
    #[allow(missing_docs)]
    pub open_submodules: Option<BTreeMap<String, RepoAST>>,
    #[allow(missing_docs)]
    pub rebase: Option<Option<Rebase>>,
}

impl RepoAST {
    /// Construct a new, empty `RepoAST`. Prefer building one up via
    /// [`RepoAST::copy`] from this base, the same way the codec's seed
    /// repositories (`S`/`B`/`C<url>`) are each a `copy` of an empty AST.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a new value with the named fields replaced.
    pub fn copy(&self, overrides: RepoASTOverrides) -> Self {
        RepoAST {
            commits: overrides.commits.unwrap_or_else(|| self.commits.clone()),
            branches: overrides.branches.unwrap_or_else(|| self.branches.clone()),
            refs: overrides.refs.unwrap_or_else(|| self.refs.clone()),
            remotes: overrides.remotes.unwrap_or_else(|| self.remotes.clone()),
            notes: overrides.notes.unwrap_or_else(|| self.notes.clone()),
            head: overrides.head.unwrap_or_else(|| self.head.clone()),
            current_branch_name: overrides
                .current_branch_name
                .unwrap_or_else(|| self.current_branch_name.clone()),
            bare: overrides.bare.unwrap_or(self.bare),
            index: overrides.index.unwrap_or_else(|| self.index.clone()),
            workdir: overrides.workdir.unwrap_or_else(|| self.workdir.clone()),
            open_submodules: overrides
                .open_submodules
                .unwrap_or_else(|| self.open_submodules.clone()),
            rebase: overrides.rebase.unwrap_or_else(|| self.rebase.clone()),
        }
    }

    /// Validate the invariants listed in `spec.md` §3, returning the first
    /// violation found (if any) as a human-readable message. Used by the
    /// codec writer and the assertion engine as a cheap sanity check before
    /// doing real work against a malformed value.
    pub fn check_invariants(&self) -> Result<(), String> {
        if let Some(name) = &self.current_branch_name {
            let branch = self
                .branches
                .get(name)
                .ok_or_else(|| format!("current branch '{name}' is not a present branch"))?;
            if !self.bare && self.head.as_ref() != Some(&branch.commit) {
                return Err(format!(
                    "current branch '{name}' points at {}, but HEAD is {:?}",
                    branch.commit, self.head
                ));
            }
        }
        for (name, branch) in &self.branches {
            if !self.commits.contains_key(&branch.commit) {
                return Err(format!(
                    "branch '{name}' targets missing commit {}",
                    branch.commit
                ));
            }
        }
        for (name, commit_id) in &self.refs {
            if !self.commits.contains_key(commit_id) {
                return Err(format!("ref '{name}' targets missing commit {commit_id}"));
            }
        }
        for (id, commit) in &self.commits {
            for parent in &commit.parents {
                if !self.commits.contains_key(parent) {
                    return Err(format!(
                        "commit {id} references missing parent {parent}"
                    ));
                }
            }
        }
        for (name, submodule) in &self.open_submodules {
            if let Err(err) = submodule.check_invariants() {
                return Err(format!("submodule '{name}': {err}"));
            }
        }
        if self.bare && (!self.index.is_empty() || !self.workdir.is_empty()) {
            return Err("bare repo has a non-empty index or workdir".to_owned());
        }
        Ok(())
    }
}
