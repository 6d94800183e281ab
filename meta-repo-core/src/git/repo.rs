//! Operations on a single Git repository. This module exists so that every
//! call into `git2` has an associated, typed error, and so that all direct
//! `git2` usage for a single repository is auditable from one place.
//!
//! A mono-repo coordination session holds one [`Repo`] per submodule plus
//! one for the top-level (meta) repository; everything above this module
//! (the status aggregator, the coordinator) is built entirely out of the
//! primitives exposed here.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{instrument, warn};

use super::config::Config;
use super::index::Index;
use super::object::Commit;
use super::oid::{make_non_zero_oid, MaybeZeroOid, NonZeroOid};
use super::reference::{Branch, BranchType, Reference, ReferenceName, ReferenceNameError};
use super::tree::Tree;

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not open repository at {path}: {source}")]
    OpenRepo { source: git2::Error, path: PathBuf },

    #[error("could not read index: {0}")]
    ReadIndex(#[source] git2::Error),

    #[error("could not update index: {0}")]
    UpdateIndex(#[source] git2::Error),

    #[error("could not write index as tree: {0}")]
    WriteIndexToTree(#[source] git2::Error),

    #[error("generic Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("could not decode reference name: {0}")]
    DecodeReferenceName(#[source] ReferenceNameError),

    #[error("could not resolve reference: {0}")]
    ResolveReference(#[source] git2::Error),

    #[error("could not read branch: {0}")]
    ReadBranch(#[source] git2::Error),

    #[error("could not find upstream branch for '{name}': {source}")]
    FindUpstreamBranch { source: git2::Error, name: String },

    #[error("could not find commit {oid}: {source}")]
    FindCommit { source: git2::Error, oid: NonZeroOid },

    #[error("could not find tree {oid}: {source}")]
    FindTree { source: git2::Error, oid: NonZeroOid },

    #[error("could not create commit: {0}")]
    CreateCommit(#[source] git2::Error),

    #[error("could not create branch '{name}': {source}")]
    CreateBranch { source: git2::Error, name: String },

    #[error("could not find branch '{name}': {source}")]
    FindBranch { source: git2::Error, name: String },

    #[error("could not create reference '{name}': {source}")]
    CreateReference { source: git2::Error, name: String },

    #[error("could not find reference '{name}': {source}")]
    FindReference { source: git2::Error, name: String },

    #[error("could not read HEAD: {0}")]
    ReadHead(#[source] git2::Error),

    #[error("could not open configuration: {0}")]
    ReadConfig(#[source] git2::Error),

    #[error("could not determine working copy path for repository")]
    NoWorkingCopy,

    #[error("could not compute merge base between {lhs} and {rhs}: {source}")]
    MergeBase {
        source: git2::Error,
        lhs: NonZeroOid,
        rhs: NonZeroOid,
    },

    #[error("could not walk commit graph: {0}")]
    Revwalk(#[source] git2::Error),

    #[error("could not save stash: {0}")]
    StashSave(#[source] git2::Error),

    #[error("could not apply stash entry {index}: {source}")]
    StashApply { source: git2::Error, index: usize },

    #[error("could not drop stash entry {index}: {source}")]
    StashDrop { source: git2::Error, index: usize },

    #[error("could not enumerate stash entries: {0}")]
    StashForeach(#[source] git2::Error),

    #[error("could not find submodule '{name}': {source}")]
    FindSubmodule { source: git2::Error, name: String },

    #[error("could not open submodule repository for '{name}': {source}")]
    OpenSubmoduleRepo { source: git2::Error, name: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// A timestamp plus UTC offset, as recorded on a commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Time {
    /// Seconds since the Unix epoch.
    pub seconds: i64,
    /// Offset from UTC, in minutes.
    pub offset_minutes: i32,
}

impl From<git2::Time> for Time {
    fn from(time: git2::Time) -> Self {
        Time {
            seconds: time.seconds(),
            offset_minutes: time.offset_minutes(),
        }
    }
}

/// A commit author or committer identity.
pub struct Signature<'repo> {
    pub(super) inner: git2::Signature<'repo>,
}

impl Signature<'_> {
    /// The signer's display name.
    pub fn get_name(&self) -> String {
        self.inner.name().unwrap_or_default().to_owned()
    }

    /// The signer's email address.
    pub fn get_email(&self) -> String {
        self.inner.email().unwrap_or_default().to_owned()
    }

    /// The time this signature was recorded at.
    pub fn get_time(&self) -> Time {
        Time::from(self.inner.when())
    }
}

/// How two commits relate to each other in the commit graph. This is
/// deliberately a simple pairwise relation (reachability), not a revset
/// query -- the status aggregator only ever needs to know, for a given
/// submodule, whether its recorded commit is ahead of, behind, or diverged
/// from its current `HEAD`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitRelation {
    /// The two commits are the same commit.
    Same,
    /// `lhs` is a strict ancestor of `rhs`.
    Ahead,
    /// `rhs` is a strict ancestor of `lhs`.
    Behind,
    /// Neither is an ancestor of the other.
    Diverged,
}

/// A single entry recorded in the stash.
#[derive(Clone, Debug)]
pub struct StashEntry {
    /// The position of the entry in the stash stack (0 = most recent).
    pub index: usize,
    /// The message associated with the stash.
    pub message: String,
    /// The OID of the stash commit.
    pub oid: NonZeroOid,
}

/// A handle on an open Git repository (either the top-level meta repository
/// or one of its submodules).
pub struct Repo {
    pub(super) inner: git2::Repository,
}

impl std::fmt::Debug for Repo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Repo path={:?}>", self.inner.path())
    }
}

impl Repo {
    /// Open the repository containing `path` (searching upward through
    /// parent directories, the same way `git` itself resolves a repository
    /// from the current working directory).
    #[instrument]
    pub fn from_dir(path: &Path) -> Result<Self> {
        let inner = git2::Repository::discover(path).map_err(|source| Error::OpenRepo {
            source,
            path: path.to_owned(),
        })?;
        Ok(Repo { inner })
    }

    /// Open the repository at exactly `path`, with no upward search.
    #[instrument]
    pub fn open(path: &Path) -> Result<Self> {
        let inner = git2::Repository::open(path).map_err(|source| Error::OpenRepo {
            source,
            path: path.to_owned(),
        })?;
        Ok(Repo { inner })
    }

    /// Initialize a new repository at `path`.
    #[instrument]
    pub fn init(path: &Path) -> Result<Self> {
        let inner = git2::Repository::init(path).map_err(|source| Error::OpenRepo {
            source,
            path: path.to_owned(),
        })?;
        Ok(Repo { inner })
    }

    /// Initialize a new bare repository at `path`.
    #[instrument]
    pub fn init_bare(path: &Path) -> Result<Self> {
        let inner = git2::Repository::init_bare(path).map_err(|source| Error::OpenRepo {
            source,
            path: path.to_owned(),
        })?;
        Ok(Repo { inner })
    }

    /// The repository's `.git` directory.
    pub fn get_git_dir(&self) -> PathBuf {
        self.inner.path().to_owned()
    }

    /// The repository's working copy root, if it has one (bare repositories
    /// do not).
    pub fn get_working_copy_path(&self) -> Option<PathBuf> {
        self.inner.workdir().map(Path::to_owned)
    }

    /// Open the repository's index.
    #[instrument(skip(self))]
    pub fn get_index(&self) -> Result<Index> {
        let inner = self.inner.index().map_err(Error::ReadIndex)?;
        Ok(Index { inner })
    }

    /// Open the repository's configuration, read-only.
    #[instrument(skip(self))]
    pub fn get_readonly_config(&self) -> Result<Config> {
        let inner = self.inner.config().map_err(Error::ReadConfig)?;
        Ok(Config::from(inner))
    }

    /// The default author/committer signature for new commits made against
    /// this repository, resolved from `user.name`/`user.email` (falling back
    /// to `committer.*` and the OS user/host) the same way `git commit`
    /// itself resolves authorship. Distinct from
    /// [`crate::testing::make_dummy_signature`], which fixture-construction
    /// code uses instead so that test repos are reproducible.
    #[instrument(skip(self))]
    pub fn get_default_signature(&self) -> Result<git2::Signature<'static>> {
        self.inner.signature().map_err(Error::Git)
    }

    /// Read the full contents of the blob at `oid`.
    #[instrument(skip(self))]
    pub fn read_blob(&self, oid: NonZeroOid) -> Result<Vec<u8>> {
        self.inner
            .find_blob(oid.into())
            .map(|blob| blob.content().to_vec())
            .map_err(Error::Git)
    }

    /// Resolve `HEAD` to the commit it points at, if any (an unborn branch
    /// has no commit).
    #[instrument(skip(self))]
    pub fn get_head_commit(&self) -> Result<Option<Commit<'_>>> {
        let head = match self.inner.head() {
            Ok(head) => head,
            Err(err) if err.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(err) => return Err(Error::ReadHead(err)),
        };
        match head.peel_to_commit() {
            Ok(commit) => Ok(Some(Commit { inner: commit })),
            Err(err) => Err(Error::ReadHead(err)),
        }
    }

    /// Get the name of the branch `HEAD` currently points at, if it's not
    /// detached.
    #[instrument(skip(self))]
    pub fn get_head_branch_name(&self) -> Result<Option<ReferenceName>> {
        let head = match self.inner.head() {
            Ok(head) => head,
            Err(err) if err.code() == git2::ErrorCode::UnbornBranch => {
                return match self.inner.find_reference("HEAD") {
                    Ok(reference) => {
                        let reference = Reference { inner: reference };
                        match reference.get_target() {
                            super::ReferenceTarget::Symbolic { reference_name } => {
                                Ok(Some(reference_name))
                            }
                            super::ReferenceTarget::Direct { .. } => Ok(None),
                        }
                    }
                    Err(err) => Err(Error::ReadHead(err)),
                };
            }
            Err(err) => return Err(Error::ReadHead(err)),
        };
        if !head.is_branch() {
            return Ok(None);
        }
        ReferenceName::from_bytes(head.name_bytes().to_vec())
            .map(Some)
            .map_err(Error::DecodeReferenceName)
    }

    /// Write `data` into the object database as a blob, returning its OID.
    #[instrument(skip(self, data))]
    pub fn create_blob(&self, data: &[u8]) -> Result<NonZeroOid> {
        let oid = self.inner.blob(data).map_err(Error::Git)?;
        Ok(make_non_zero_oid(oid))
    }

    /// Set `HEAD` to point directly at `oid` (detached).
    #[instrument(skip(self))]
    pub fn set_head_detached(&self, oid: NonZeroOid) -> Result<()> {
        self.inner.set_head_detached(oid.into()).map_err(Error::Git)
    }

    /// Set `HEAD` to point symbolically at `refname` (e.g.
    /// `refs/heads/master`).
    #[instrument(skip(self))]
    pub fn set_head(&self, refname: &ReferenceName) -> Result<()> {
        self.inner.set_head(refname.as_str()).map_err(Error::Git)
    }

    /// Check out `HEAD` into the working copy, overwriting local files.
    #[instrument(skip(self))]
    pub fn checkout_head_force(&self) -> Result<()> {
        let mut opts = git2::build::CheckoutBuilder::new();
        opts.force();
        self.inner
            .checkout_head(Some(&mut opts))
            .map_err(Error::Git)
    }

    /// Create (or update) a remote named `name` pointing at `url`. Does not
    /// contact the network; this repository never performs real fetches,
    /// only local object-database bookkeeping (`spec.md` explicitly
    /// excludes network transport).
    #[instrument(skip(self))]
    pub fn create_remote(&self, name: &str, url: &str) -> Result<()> {
        match self.inner.find_remote(name) {
            Ok(_) => Ok(()),
            Err(_) => self.inner.remote(name, url).map(|_| ()).map_err(Error::Git),
        }
    }

    /// Look up a commit by OID.
    #[instrument(skip(self))]
    pub fn find_commit(&self, oid: NonZeroOid) -> Result<Option<Commit<'_>>> {
        match self.inner.find_commit(oid.into()) {
            Ok(commit) => Ok(Some(Commit { inner: commit })),
            Err(err) if err.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(err) => Err(Error::FindCommit { source: err, oid }),
        }
    }

    /// Look up a commit by OID, returning an error if it doesn't exist.
    #[instrument(skip(self))]
    pub fn find_commit_or_fail(&self, oid: NonZeroOid) -> Result<Commit<'_>> {
        self.inner
            .find_commit(oid.into())
            .map(|inner| Commit { inner })
            .map_err(|source| Error::FindCommit { source, oid })
    }

    /// Look up a tree by OID.
    #[instrument(skip(self))]
    pub fn find_tree(&self, oid: NonZeroOid) -> Result<Option<Tree<'_>>> {
        match self.inner.find_tree(oid.into()) {
            Ok(inner) => Ok(Some(Tree { inner })),
            Err(err) if err.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(err) => Err(Error::FindTree { source: err, oid }),
        }
    }

    /// Create a new commit, returning its OID. `parents` must already be
    /// present in the object database.
    #[instrument(skip(self, author, committer))]
    #[allow(clippy::too_many_arguments)]
    pub fn create_commit(
        &self,
        update_ref: Option<&str>,
        author: &git2::Signature,
        committer: &git2::Signature,
        message: &str,
        tree: &Tree,
        parents: &[&Commit],
    ) -> Result<NonZeroOid> {
        let parent_commits = parents.iter().map(|commit| &commit.inner).collect::<Vec<_>>();
        let oid = self
            .inner
            .commit(
                update_ref,
                author,
                committer,
                message,
                &tree.inner,
                &parent_commits,
            )
            .map_err(Error::CreateCommit)?;
        Ok(make_non_zero_oid(oid))
    }

    /// Look up a reference by fully-qualified name.
    #[instrument(skip(self))]
    pub fn find_reference(&self, name: &ReferenceName) -> Result<Option<Reference<'_>>> {
        match self.inner.find_reference(name.as_str()) {
            Ok(inner) => Ok(Some(Reference { inner })),
            Err(err) if err.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(err) => Err(Error::FindReference {
                source: err,
                name: name.as_str().to_owned(),
            }),
        }
    }

    /// Create (or forcibly update) a direct reference to `oid`.
    #[instrument(skip(self))]
    pub fn create_reference(
        &self,
        name: &ReferenceName,
        oid: NonZeroOid,
        force: bool,
        log_message: &str,
    ) -> Result<Reference<'_>> {
        let inner = self
            .inner
            .reference(name.as_str(), oid.into(), force, log_message)
            .map_err(|source| Error::CreateReference {
                source,
                name: name.as_str().to_owned(),
            })?;
        Ok(Reference { inner })
    }

    /// Delete a reference by name, if it exists.
    #[instrument(skip(self))]
    pub fn delete_reference(&self, name: &ReferenceName) -> Result<()> {
        match self.inner.find_reference(name.as_str()) {
            Ok(mut reference) => reference.delete().map_err(|source| Error::FindReference {
                source,
                name: name.as_str().to_owned(),
            }),
            Err(err) if err.code() == git2::ErrorCode::NotFound => Ok(()),
            Err(err) => Err(Error::FindReference {
                source: err,
                name: name.as_str().to_owned(),
            }),
        }
    }

    /// Look up a local or remote-tracking branch by short name.
    #[instrument(skip(self))]
    pub fn find_branch(&self, name: &str, branch_type: BranchType) -> Result<Option<Branch<'_>>> {
        match self.inner.find_branch(name, branch_type.into()) {
            Ok(inner) => Ok(Some(Branch { inner })),
            Err(err) if err.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(err) => Err(Error::FindBranch {
                source: err,
                name: name.to_owned(),
            }),
        }
    }

    /// Create a local branch named `name` pointing at `commit`.
    #[instrument(skip(self, commit))]
    pub fn create_branch(&self, name: &str, commit: &Commit, force: bool) -> Result<Branch<'_>> {
        let inner = self
            .inner
            .branch(name, &commit.inner, force)
            .map_err(|source| Error::CreateBranch {
                source,
                name: name.to_owned(),
            })?;
        Ok(Branch { inner })
    }

    /// Determine how `lhs` relates to `rhs` in the commit graph.
    #[instrument(skip(self))]
    pub fn get_commit_relation(&self, lhs: NonZeroOid, rhs: NonZeroOid) -> Result<CommitRelation> {
        if lhs == rhs {
            return Ok(CommitRelation::Same);
        }
        if self
            .inner
            .graph_descendant_of(rhs.into(), lhs.into())
            .map_err(|source| Error::MergeBase { source, lhs, rhs })?
        {
            return Ok(CommitRelation::Ahead);
        }
        if self
            .inner
            .graph_descendant_of(lhs.into(), rhs.into())
            .map_err(|source| Error::MergeBase { source, lhs, rhs })?
        {
            return Ok(CommitRelation::Behind);
        }
        Ok(CommitRelation::Diverged)
    }

    /// Find the merge base of two commits, if one exists.
    #[instrument(skip(self))]
    pub fn find_merge_base(
        &self,
        lhs: NonZeroOid,
        rhs: NonZeroOid,
    ) -> Result<Option<NonZeroOid>> {
        match self.inner.merge_base(lhs.into(), rhs.into()) {
            Ok(oid) => Ok(Some(make_non_zero_oid(oid))),
            Err(err) if err.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(err) => Err(Error::MergeBase { source: err, lhs, rhs }),
        }
    }

    /// List every commit reachable from `head` but not from any of
    /// `exclude`, in reverse-topological order.
    #[instrument(skip(self))]
    pub fn get_commits_between(
        &self,
        head: NonZeroOid,
        exclude: &[NonZeroOid],
    ) -> Result<Vec<NonZeroOid>> {
        let mut revwalk = self.inner.revwalk().map_err(Error::Revwalk)?;
        revwalk.push(head.into()).map_err(Error::Revwalk)?;
        for oid in exclude {
            revwalk.hide((*oid).into()).map_err(Error::Revwalk)?;
        }
        revwalk
            .map(|oid| oid.map(make_non_zero_oid).map_err(Error::Revwalk))
            .collect()
    }

    /// Cherry-pick `commit` onto `onto`, committing the result with
    /// `commit`'s own message and authorship and a single parent, `onto`.
    /// Returns `Ok(None)` if the cherry-pick produced conflicts rather than
    /// creating a commit.
    ///
    /// `commit` may itself have more than one parent (as the synthetic
    /// sub-stash commits in [`crate::coordinator::stash`] do); libgit2
    /// requires picking a `mainline` parent to diff against in that case, so
    /// this always diffs against `commit`'s first parent.
    #[instrument(skip(self, commit, onto))]
    pub fn cherry_pick_onto(&self, commit: &Commit, onto: &Commit) -> Result<Option<NonZeroOid>> {
        let mainline = if commit.inner.parent_count() > 1 { 1 } else { 0 };
        let mut index = self.inner.cherrypick_commit(&commit.inner, &onto.inner, mainline, None)?;
        if index.has_conflicts() {
            return Ok(None);
        }
        let tree_oid = index.write_tree_to(&self.inner)?;
        let tree = self.inner.find_tree(tree_oid)?;
        let author = commit.inner.author();
        let committer = commit.inner.committer();
        let message = commit.inner.message().unwrap_or_default();
        let oid = self.inner.commit(None, &author, &committer, message, &tree, &[&onto.inner])?;
        Ok(Some(make_non_zero_oid(oid)))
    }

    /// Save the current index/working copy state as a stash commit. This
    /// uses `git2`'s native stash support directly, rather than shelling out,
    /// since stash is fully supported by `git2` and there's no need to fall
    /// back to a subprocess the way interactive-rebase-adjacent operations
    /// would.
    #[instrument(skip(self, stasher))]
    pub fn stash_save(
        &mut self,
        stasher: &git2::Signature,
        message: &str,
        keep_index: bool,
    ) -> Result<NonZeroOid> {
        let flags = if keep_index {
            git2::StashFlags::KEEP_INDEX
        } else {
            git2::StashFlags::DEFAULT
        };
        let oid = self
            .inner
            .stash_save2(stasher, Some(message), Some(flags))
            .map_err(Error::StashSave)?;
        Ok(make_non_zero_oid(oid))
    }

    /// Apply (without dropping) the stash entry at `index` (0 = most
    /// recent). `reinstate_index` mirrors the backend's
    /// `APPLY_REINSTATE_INDEX` flag: when set, entries that were staged at
    /// stash time come back staged rather than merely present in the
    /// working copy.
    #[instrument(skip(self))]
    pub fn stash_apply(&mut self, index: usize, reinstate_index: bool) -> Result<()> {
        let mut opts = git2::StashApplyOptions::new();
        if reinstate_index {
            opts.reinstate_index();
        }
        self.inner
            .stash_apply(index, Some(&mut opts))
            .map_err(|source| Error::StashApply { source, index })
    }

    /// Drop the stash entry at `index` (0 = most recent).
    #[instrument(skip(self))]
    pub fn stash_drop(&mut self, index: usize) -> Result<()> {
        self.inner
            .stash_drop(index)
            .map_err(|source| Error::StashDrop { source, index })
    }

    /// Apply and then drop the stash entry at `index`. See
    /// [`Repo::stash_apply`] for `reinstate_index`.
    #[instrument(skip(self))]
    pub fn stash_pop(&mut self, index: usize, reinstate_index: bool) -> Result<()> {
        let mut opts = git2::StashApplyOptions::new();
        if reinstate_index {
            opts.reinstate_index();
        }
        self.inner
            .stash_pop(index, Some(&mut opts))
            .map_err(|source| Error::StashApply { source, index })
    }

    /// List all entries currently in the stash, most-recent first.
    #[instrument(skip(self))]
    pub fn stash_list(&mut self) -> Result<Vec<StashEntry>> {
        let mut entries = Vec::new();
        self.inner
            .stash_foreach(|index, message, oid| {
                match make_non_zero_oid_checked(*oid) {
                    Some(oid) => entries.push(StashEntry {
                        index,
                        message: message.to_owned(),
                        oid,
                    }),
                    None => warn!(index, "stash entry had zero oid"),
                }
                true
            })
            .map_err(Error::StashForeach)?;
        Ok(entries)
    }

    /// Look up a submodule by its path (relative to this repository's
    /// working copy), and open its repository if it's initialized.
    #[instrument(skip(self))]
    pub fn open_submodule_repo(&self, name: &str) -> Result<Option<Repo>> {
        let submodule = match self.inner.find_submodule(name) {
            Ok(submodule) => submodule,
            Err(err) if err.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(err) => {
                return Err(Error::FindSubmodule {
                    source: err,
                    name: name.to_owned(),
                })
            }
        };
        match submodule.open() {
            Ok(inner) => Ok(Some(Repo { inner })),
            Err(err) if err.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(err) => Err(Error::OpenSubmoduleRepo {
                source: err,
                name: name.to_owned(),
            }),
        }
    }

    /// The path (relative to this repository's working copy) of every
    /// submodule recorded in `.gitmodules`, regardless of whether it's
    /// currently initialized (open).
    #[instrument(skip(self))]
    pub fn get_submodule_paths(&self) -> Result<Vec<PathBuf>> {
        let paths = self
            .inner
            .submodules()
            .map_err(Error::Git)?
            .iter()
            .map(|submodule| submodule.path().to_owned())
            .collect();
        Ok(paths)
    }

    /// The OID currently recorded in the index for submodule `path` (i.e.
    /// the "pinned" commit, distinct from whatever `HEAD` the submodule's
    /// own repository happens to be checked out to).
    #[instrument(skip(self))]
    pub fn get_submodule_index_oid(&self, name: &str) -> Result<Option<NonZeroOid>> {
        let submodule = match self.inner.find_submodule(name) {
            Ok(submodule) => submodule,
            Err(err) if err.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(err) => {
                return Err(Error::FindSubmodule {
                    source: err,
                    name: name.to_owned(),
                })
            }
        };
        Ok(submodule.index_id().and_then(|oid| NonZeroOid::try_from(oid).ok()))
    }

    /// The OID recorded for submodule `name` in `HEAD`'s tree, if any.
    #[instrument(skip(self))]
    pub fn get_submodule_head_oid(&self, name: &str) -> Result<Option<NonZeroOid>> {
        let submodule = match self.inner.find_submodule(name) {
            Ok(submodule) => submodule,
            Err(err) if err.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(err) => {
                return Err(Error::FindSubmodule {
                    source: err,
                    name: name.to_owned(),
                })
            }
        };
        Ok(submodule.head_id().and_then(|oid| NonZeroOid::try_from(oid).ok()))
    }

    /// The URL configured for submodule `name` in `.gitmodules`, if any.
    #[instrument(skip(self))]
    pub fn get_submodule_url(&self, name: &str) -> Result<Option<String>> {
        let submodule = match self.inner.find_submodule(name) {
            Ok(submodule) => submodule,
            Err(err) if err.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(err) => {
                return Err(Error::FindSubmodule {
                    source: err,
                    name: name.to_owned(),
                })
            }
        };
        Ok(submodule.url().map(str::to_owned))
    }
}

fn make_non_zero_oid_checked(oid: git2::Oid) -> Option<NonZeroOid> {
    NonZeroOid::try_from(oid).ok()
}
