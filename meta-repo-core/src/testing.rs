//! Testing utilities.
//!
//! This is inside `src` rather than `tests` since the shorthand codec's own
//! unit tests and the fixture builder below depend on each other. Unlike the
//! upstream tool this crate started from, there's no CLI front-end to
//! exercise, so fixtures are built directly against `git2` rather than by
//! shelling out to a `git` binary.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::instrument;

use crate::git::{Commit, FileMode, NonZeroOid, Repo};

/// A fixed identity used for every commit created by test fixtures, so that
/// assertions can be made against deterministic authorship without stubbing
/// out the clock.
pub const DUMMY_NAME: &str = "Testy McTestface";

/// See [`DUMMY_NAME`].
pub const DUMMY_EMAIL: &str = "test@example.com";

/// Construct a deterministic signature for fixture commits. `time` is a
/// small monotonic counter (0, 1, 2, ...), not a real timestamp, so that
/// fixture repositories are reproducible across test runs.
pub fn make_dummy_signature(time: i64) -> eyre::Result<git2::Signature<'static>> {
    let time = git2::Time::new(time, 0);
    let signature = git2::Signature::new(DUMMY_NAME, DUMMY_EMAIL, &time)?;
    Ok(signature)
}

/// A temporary directory holding a freshly-initialized repository, along
/// with the repository handle itself. Dropping this removes the directory.
pub struct TestRepo {
    /// The temporary directory backing the repository. Kept alive so that
    /// the directory isn't deleted out from under `repo`.
    pub temp_dir: TempDir,

    /// The repository itself.
    pub repo: Repo,
}

impl TestRepo {
    /// Initialize a fresh, empty repository in a new temporary directory.
    #[instrument]
    pub fn new() -> eyre::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let repo = Repo::init(temp_dir.path())?;
        Ok(TestRepo { temp_dir, repo })
    }

    /// The working copy path of the repository.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }
}

/// Write `contents` to `relative_path` inside `repo`'s working copy, stage
/// it, and commit, returning the new commit's OID. `time` should be a
/// monotonically increasing counter across the calls used to build a single
/// fixture (see [`make_dummy_signature`]).
#[instrument(skip(repo, contents))]
pub fn commit_file(
    repo: &Repo,
    time: i64,
    relative_path: &str,
    contents: &str,
    message: &str,
) -> eyre::Result<NonZeroOid> {
    let working_copy_path = repo
        .get_working_copy_path()
        .ok_or_else(|| eyre::eyre!("repository has no working copy"))?;
    let full_path = working_copy_path.join(relative_path);
    if let Some(parent) = full_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&full_path, contents)?;

    let mut index = repo.get_index()?;
    index.add_by_path(Path::new(relative_path))?;
    index.write()?;
    let tree_oid = index.write_tree(repo)?;
    let tree = repo
        .find_tree(tree_oid)?
        .ok_or_else(|| eyre::eyre!("just-written tree not found"))?;

    let signature = make_dummy_signature(time)?;
    let parents = match repo.get_head_commit()? {
        Some(parent) => vec![parent],
        None => vec![],
    };
    let parent_refs: Vec<&Commit> = parents.iter().collect();
    let commit_oid = repo.create_commit(
        Some("HEAD"),
        &signature,
        &signature,
        message,
        &tree,
        &parent_refs,
    )?;
    Ok(commit_oid)
}

/// Pin submodule `name` (already present as an initialized sub-repository at
/// `working_copy_path/name`) at `oid` in `repo`'s index, and commit the
/// change. This does not update `.gitmodules`; callers that need a
/// newly-registered submodule should write that file themselves first.
#[instrument(skip(repo))]
pub fn commit_submodule_pointer(
    repo: &Repo,
    time: i64,
    name: &str,
    oid: NonZeroOid,
    message: &str,
) -> eyre::Result<NonZeroOid> {
    let mut index = repo.get_index()?;
    index.add_entry(Path::new(name), oid, FileMode::Commit)?;
    index.write()?;
    let tree_oid = index.write_tree(repo)?;
    let tree = repo
        .find_tree(tree_oid)?
        .ok_or_else(|| eyre::eyre!("just-written tree not found"))?;

    let signature = make_dummy_signature(time)?;
    let parents = match repo.get_head_commit()? {
        Some(parent) => vec![parent],
        None => vec![],
    };
    let parent_refs: Vec<&Commit> = parents.iter().collect();
    repo.create_commit(Some("HEAD"), &signature, &signature, message, &tree, &parent_refs)
        .map_err(eyre::Error::from)
}

/// Initialize `path` as a standalone repository suitable for use as a
/// submodule's own on-disk repository (as opposed to being registered as a
/// submodule of some other repository, which is the codec writer's job).
#[instrument]
pub fn init_submodule_repo(path: &Path) -> eyre::Result<Repo> {
    std::fs::create_dir_all(path)?;
    let repo = Repo::init(path)?;
    Ok(repo)
}

/// Append a `[submodule "name"]` stanza to `.gitmodules` in `repo`'s working
/// copy, creating the file if needed, then stage it.
#[instrument(skip(repo))]
pub fn register_submodule(repo: &Repo, name: &str, path: &str, url: &str) -> eyre::Result<()> {
    let working_copy_path = repo
        .get_working_copy_path()
        .ok_or_else(|| eyre::eyre!("repository has no working copy"))?;
    let gitmodules_path = working_copy_path.join(".gitmodules");
    let mut contents = std::fs::read_to_string(&gitmodules_path).unwrap_or_default();
    contents.push_str(&format!(
        "[submodule \"{name}\"]\n\tpath = {path}\n\turl = {url}\n"
    ));
    std::fs::write(&gitmodules_path, contents)?;

    let mut index = repo.get_index()?;
    index.add_by_path(Path::new(".gitmodules"))?;
    index.write()?;
    Ok(())
}

/// Resolve a path inside a [`TestRepo`]'s working copy.
pub fn child_path(base: &Path, relative: &str) -> PathBuf {
    base.join(relative)
}
