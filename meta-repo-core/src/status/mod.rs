//! The status aggregator: derives a [`RepoStatus`] from live on-disk
//! storage, recursing into open submodules in parallel (`spec.md` §4.D).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use thiserror::Error;
use tracing::instrument;

use crate::ast::{
    CommitRelation, FileStatus, Rebase, RepoStatus, SequencerKind, SequencerState, Submodule,
    SubmoduleObservation,
};
use crate::git::{self, NonZeroOid, Repo, StatusBits};

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Git(#[from] git::RepoError),

    #[error(transparent)]
    Other(#[from] eyre::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// How untracked files should be reported, mirroring `git status`'s
/// `--untracked-files` modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum UntrackedFilesOption {
    /// Don't report untracked files at all.
    No,
    /// Report only the topmost untracked directory, not its contents.
    Normal,
    /// Recurse into untracked directories and report every file.
    #[default]
    All,
}

/// Options controlling [`get_repo_status`].
#[derive(Clone, Debug, Default)]
pub struct StatusOptions {
    /// How to report untracked files.
    pub untracked_files_option: UntrackedFilesOption,
    /// Restrict the scan to these paths (empty means "everything").
    pub paths: Vec<PathBuf>,
    /// Include changes to `.gitmodules` and other meta-repo bookkeeping
    /// files in `staged`/`workdir`, rather than folding them silently into
    /// the `submodules` map.
    pub show_meta_changes: bool,
    /// Recurse into (and report the status of) submodules that are recorded
    /// in the index but not currently checked out (`SubmoduleState::Closed`).
    pub include_closed_submodules: bool,
}

/// Compute the full status of `repo`: meta-level staged/workdir changes,
/// every submodule's lifecycle state and (if open) recursive status, and any
/// in-progress rebase or sequencer operation.
#[instrument(skip(repo, options))]
pub fn get_repo_status(repo: &Repo, options: &StatusOptions) -> Result<RepoStatus> {
    let head_commit = repo.get_head_commit().map_err(Error::from)?;
    let head = head_commit.as_ref().map(|commit| commit.get_oid().to_string().into());
    let current_branch_name = repo
        .get_head_branch_name()
        .map_err(Error::from)?
        .map(|name| name.branch_name().to_owned());
    let bare = repo.get_working_copy_path().is_none();

    let (staged, workdir) = if bare {
        (BTreeMap::new(), BTreeMap::new())
    } else {
        compute_meta_changes(repo, options)?
    };

    let submodules = if bare {
        BTreeMap::new()
    } else {
        compute_submodule_statuses(repo, options)?
    };

    let rebase = read_rebase_state(repo)?;
    let sequencer = rebase
        .clone()
        .map(|rebase| SequencerState {
            kind: SequencerKind::Rebase,
            original_head: rebase.original_head.clone(),
            target: rebase.onto.clone(),
        })
        .or(read_cherry_pick_or_merge_state(repo)?);

    Ok(RepoStatus {
        head,
        current_branch_name,
        bare,
        staged,
        workdir,
        submodules,
        rebase,
        sequencer,
    })
}

fn is_under_submodule(path: &Path, submodule_paths: &[PathBuf]) -> bool {
    submodule_paths.iter().any(|sub| path.starts_with(sub))
}

fn classify_index_bits(bits: StatusBits) -> Option<FileStatus> {
    if bits.contains(StatusBits::CONFLICTED) {
        Some(FileStatus::Conflicted)
    } else if bits.contains(StatusBits::INDEX_RENAMED) {
        Some(FileStatus::Renamed)
    } else if bits.contains(StatusBits::INDEX_TYPECHANGE) {
        Some(FileStatus::TypeChanged)
    } else if bits.contains(StatusBits::INDEX_NEW) {
        Some(FileStatus::Added)
    } else if bits.contains(StatusBits::INDEX_DEL) {
        Some(FileStatus::Removed)
    } else if bits.contains(StatusBits::INDEX_MOD) {
        Some(FileStatus::Modified)
    } else {
        None
    }
}

fn classify_workdir_bits(bits: StatusBits) -> Option<FileStatus> {
    if bits.contains(StatusBits::CONFLICTED) {
        Some(FileStatus::Conflicted)
    } else if bits.contains(StatusBits::WT_TYPECHANGE) {
        Some(FileStatus::TypeChanged)
    } else if bits.contains(StatusBits::WT_NEW) {
        Some(FileStatus::Added)
    } else if bits.contains(StatusBits::WT_DEL) {
        Some(FileStatus::Removed)
    } else if bits.contains(StatusBits::WT_MOD) {
        Some(FileStatus::Modified)
    } else {
        None
    }
}

fn compute_meta_changes(
    repo: &Repo,
    options: &StatusOptions,
) -> Result<(BTreeMap<String, FileStatus>, BTreeMap<String, FileStatus>)> {
    let submodule_paths = repo.get_submodule_paths().map_err(Error::from)?;

    let git_options = git::StatusOptions {
        include_untracked: !matches!(options.untracked_files_option, UntrackedFilesOption::No),
        recurse_untracked_dirs: matches!(options.untracked_files_option, UntrackedFilesOption::All),
        paths: options.paths.clone(),
    };

    let entries = git::status_bits(repo, &git_options).map_err(Error::Other)?;
    let mut staged = BTreeMap::new();
    let mut workdir = BTreeMap::new();
    for entry in entries {
        if is_under_submodule(&entry.path, &submodule_paths) {
            continue;
        }
        let is_meta_file = entry.path == Path::new(".gitmodules");
        if is_meta_file && !options.show_meta_changes {
            continue;
        }
        let path_str = entry.path.to_string_lossy().into_owned();
        if let Some(status) = classify_index_bits(entry.bits) {
            staged.insert(path_str.clone(), status);
        }
        if let Some(status) = classify_workdir_bits(entry.bits) {
            workdir.insert(path_str, status);
        }
    }
    Ok((staged, workdir))
}

fn compute_submodule_statuses(
    repo: &Repo,
    options: &StatusOptions,
) -> Result<BTreeMap<String, Submodule>> {
    let paths = repo.get_submodule_paths().map_err(Error::from)?;
    let names: Vec<String> = paths
        .iter()
        .map(|path| path.to_string_lossy().into_owned())
        .collect();
    let working_copy_path = repo
        .get_working_copy_path()
        .ok_or_else(|| Error::Other(eyre::eyre!("bare repo unexpectedly has submodules")))?;

    // `git2::Repository` is not `Sync`, so each parallel task opens its own
    // handle onto the same on-disk repository rather than sharing `repo`
    // across threads.
    let results: Vec<Result<(String, Submodule)>> = names
        .par_iter()
        .map(|name| {
            let repo = Repo::open(&working_copy_path).map_err(Error::from)?;
            compute_one_submodule_status(&repo, name, options).map(|sub| (name.clone(), sub))
        })
        .collect();

    let mut submodules = BTreeMap::new();
    for result in results {
        let (name, submodule) = result?;
        if !options.include_closed_submodules
            && submodule.state() == crate::ast::SubmoduleState::Closed
        {
            continue;
        }
        submodules.insert(name, submodule);
    }
    Ok(submodules)
}

fn compute_one_submodule_status(
    repo: &Repo,
    name: &str,
    options: &StatusOptions,
) -> Result<Submodule> {
    let url = repo.get_submodule_url(name).map_err(Error::from)?.unwrap_or_default();

    let commit_oid = repo.get_submodule_head_oid(name).map_err(Error::from)?;
    let index_oid = repo.get_submodule_index_oid(name).map_err(Error::from)?;
    let open_repo = repo.open_submodule_repo(name).map_err(Error::from)?;
    let workdir_oid = match &open_repo {
        Some(sub_repo) => sub_repo
            .get_head_commit()
            .map_err(Error::from)?
            .map(|commit| commit.get_oid()),
        None => None,
    };

    let commit = commit_oid.map(|oid| SubmoduleObservation {
        url: url.clone(),
        sha: oid.to_string().into(),
    });
    let index = index_oid.map(|oid| SubmoduleObservation {
        url: url.clone(),
        sha: oid.to_string().into(),
    });
    let workdir = workdir_oid.map(|oid| SubmoduleObservation {
        url: url.clone(),
        sha: oid.to_string().into(),
    });

    let index_sha_relation = relate(repo, commit_oid, index_oid);
    let workdir_sha_relation = relate(repo, index_oid, workdir_oid);

    let status = match &open_repo {
        Some(sub_repo) => Some(Box::new(get_repo_status(sub_repo, options)?)),
        None => None,
    };

    Ok(Submodule {
        commit,
        index,
        workdir,
        index_sha_relation,
        workdir_sha_relation,
        status,
    })
}

fn relate(repo: &Repo, lhs: Option<NonZeroOid>, rhs: Option<NonZeroOid>) -> CommitRelation {
    match (lhs, rhs) {
        (Some(lhs), Some(rhs)) => match repo.get_commit_relation(lhs, rhs) {
            Ok(git::CommitRelation::Same) => CommitRelation::Same,
            Ok(git::CommitRelation::Ahead) => CommitRelation::Ahead,
            Ok(git::CommitRelation::Behind) => CommitRelation::Behind,
            Ok(git::CommitRelation::Diverged) => CommitRelation::Unrelated,
            Err(_) => CommitRelation::Unknown,
        },
        _ => CommitRelation::Unknown,
    }
}

fn read_oid_file(path: &Path) -> Option<NonZeroOid> {
    let contents = std::fs::read_to_string(path).ok()?;
    contents.trim().parse().ok()
}

fn read_rebase_state(repo: &Repo) -> Result<Option<Rebase>> {
    let git_dir = repo.get_git_dir();
    for dir_name in ["rebase-merge", "rebase-apply"] {
        let dir = git_dir.join(dir_name);
        if !dir.is_dir() {
            continue;
        }
        let original_head = read_oid_file(&dir.join("orig-head"));
        let onto = read_oid_file(&dir.join("onto"));
        if let (Some(original_head), Some(onto)) = (original_head, onto) {
            return Ok(Some(Rebase {
                original_head: original_head.to_string().into(),
                onto: onto.to_string().into(),
            }));
        }
    }
    Ok(None)
}

fn read_cherry_pick_or_merge_state(repo: &Repo) -> Result<Option<SequencerState>> {
    let git_dir = repo.get_git_dir();
    let head_oid = repo
        .get_head_commit()
        .map_err(Error::from)?
        .map(|commit| commit.get_oid());
    let Some(head_oid) = head_oid else {
        return Ok(None);
    };

    if let Some(target) = read_oid_file(&git_dir.join("CHERRY_PICK_HEAD")) {
        return Ok(Some(SequencerState {
            kind: SequencerKind::CherryPick,
            original_head: head_oid.to_string().into(),
            target: target.to_string().into(),
        }));
    }
    if let Some(target) = read_oid_file(&git_dir.join("MERGE_HEAD")) {
        return Ok(Some(SequencerState {
            kind: SequencerKind::Merge,
            original_head: head_oid.to_string().into(),
            target: target.to_string().into(),
        }));
    }
    Ok(None)
}
