//! `rm`: remove tracked paths and/or whole submodules from the meta
//! repository (`spec.md` §4.E.4).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::instrument;

use super::error::{Error, Result};
use crate::ast::{RepoStatus, SubmoduleState};
use crate::git::Repo;

/// Options controlling [`rm_paths`].
#[derive(Clone, Debug, Default)]
pub struct RmOptions {
    /// Remove directories (and submodules) recursively.
    pub recursive: bool,
    /// Only remove paths from the index; leave the working copy alone.
    pub cached: bool,
    /// Skip the cleanliness check.
    pub force: bool,
    /// Report what would happen without changing anything.
    pub dry_run: bool,
}

/// What `rm` removed.
#[derive(Debug, Default)]
pub struct RmResult {
    /// Paths removed from the meta repository's index.
    pub removed_paths: Vec<PathBuf>,
    /// Submodule names removed (including their `.gitmodules` entry).
    pub removed_submodules: Vec<String>,
}

/// Remove `paths` from `repo`. Each path is resolved as either a submodule
/// name or a literal path recorded in the index; resolving a directory
/// prefix that contains multiple entries requires `recursive`.
#[instrument(skip(repo, status))]
pub fn rm_paths(repo: &mut Repo, status: &RepoStatus, paths: &[&Path], options: &RmOptions) -> Result<RmResult> {
    if paths.is_empty() {
        return Err(Error::UserError("rm requires at least one path".to_owned()));
    }

    let working_copy_path = repo
        .get_working_copy_path()
        .ok_or_else(|| Error::UserError("cannot rm in a bare repository".to_owned()))?;

    let index = repo.get_index()?;
    let index_paths: BTreeSet<PathBuf> = index.entries().into_iter().map(|entry| entry.path).collect();

    let mut resolved_submodules = BTreeSet::new();
    let mut resolved_paths = BTreeSet::new();

    for requested in paths {
        if let Some(sub) = status.submodules.get(&requested.to_string_lossy().into_owned()) {
            if !options.force {
                check_submodule_clean(&requested.to_string_lossy(), sub)?;
            }
            resolved_submodules.insert(requested.to_string_lossy().into_owned());
            continue;
        }

        let prefix_matches: Vec<&PathBuf> = index_paths
            .iter()
            .filter(|path| *path == requested || path.starts_with(requested))
            .collect();

        if prefix_matches.is_empty() {
            return Err(Error::UserError(format!(
                "pathspec '{}' did not match any tracked paths",
                requested.display()
            )));
        }

        if prefix_matches.len() > 1 && !options.recursive {
            return Err(Error::UserError(format!(
                "not removing '{}' recursively without -r",
                requested.display()
            )));
        }

        for path in prefix_matches {
            resolved_paths.insert(path.clone());
        }
    }

    if !options.force {
        for path in &resolved_paths {
            if options.cached {
                check_path_clean_cached(path, status, &working_copy_path)?;
            } else {
                check_path_clean(path, status)?;
            }
        }
    }

    if options.dry_run {
        return Ok(RmResult {
            removed_paths: resolved_paths.into_iter().collect(),
            removed_submodules: resolved_submodules.into_iter().collect(),
        });
    }

    let mut index = repo.get_index()?;
    for path in &resolved_paths {
        index.remove(path)?;
        if !options.cached {
            let _ = std::fs::remove_file(working_copy_path.join(path));
        }
    }
    for name in &resolved_submodules {
        index.remove(Path::new(name))?;
        if !options.cached {
            let _ = std::fs::remove_dir_all(working_copy_path.join(name));
        }
    }
    index.write()?;

    if !resolved_submodules.is_empty() {
        rewrite_gitmodules_excluding(repo, &working_copy_path, &resolved_submodules)?;
    }

    for path in resolved_paths.iter().chain(resolved_submodules.iter().map(Path::new)) {
        prune_empty_parents(&working_copy_path, path);
    }

    Ok(RmResult {
        removed_paths: resolved_paths.into_iter().collect(),
        removed_submodules: resolved_submodules.into_iter().collect(),
    })
}

fn check_path_clean(path: &Path, status: &RepoStatus) -> Result<()> {
    let path_str = path.to_string_lossy();
    if status.staged.contains_key(path_str.as_ref()) {
        return Err(Error::UserError(format!(
            "'{}' has staged changes; commit, stash, or pass --force",
            path.display()
        )));
    }
    if status.workdir.contains_key(path_str.as_ref()) {
        return Err(Error::UserError(format!(
            "'{}' has uncommitted local modifications; commit, stash, or pass --force",
            path.display()
        )));
    }
    Ok(())
}

/// `--cached` cleanliness: the index entry must equal HEAD, or be missing
/// from the working copy entirely. Workdir modifications are irrelevant
/// here since `--cached` never touches the working copy.
fn check_path_clean_cached(path: &Path, status: &RepoStatus, working_copy_path: &Path) -> Result<()> {
    if !working_copy_path.join(path).exists() {
        return Ok(());
    }
    let path_str = path.to_string_lossy();
    if status.staged.contains_key(path_str.as_ref()) {
        return Err(Error::UserError(format!(
            "'{}' has staged changes that differ from HEAD; commit, stash, or pass --force",
            path.display()
        )));
    }
    Ok(())
}

fn check_submodule_clean(name: &str, sub: &crate::ast::Submodule) -> Result<()> {
    match sub.state() {
        SubmoduleState::New | SubmoduleState::Deleted => Ok(()),
        SubmoduleState::Closed => {
            if sub.index_sha_relation == crate::ast::CommitRelation::Same {
                Ok(())
            } else {
                Err(Error::UserError(format!(
                    "submodule '{name}' has an index sha that differs from its recorded commit; commit, stash, or pass --force"
                )))
            }
        }
        SubmoduleState::Open => {
            let sub_status = sub.status.as_deref().ok_or_else(|| {
                Error::Internal(eyre::eyre!("open submodule '{name}' has no status"))
            })?;
            if !sub_status.staged.is_empty() || !sub_status.workdir.is_empty() {
                return Err(Error::UserError(format!(
                    "submodule '{name}' has uncommitted changes; commit, stash, or pass --force"
                )));
            }
            if sub.index_sha_relation != crate::ast::CommitRelation::Same
                || sub.workdir_sha_relation != crate::ast::CommitRelation::Same
            {
                return Err(Error::UserError(format!(
                    "submodule '{name}' is not at the commit recorded in the index; commit, stash, or pass --force"
                )));
            }
            Ok(())
        }
    }
}

/// Rewrite `.gitmodules`, dropping the `submodule "<name>"` section for every
/// name in `excluded`, and stage the result.
fn rewrite_gitmodules_excluding(repo: &mut Repo, working_copy_path: &Path, excluded: &BTreeSet<String>) -> Result<()> {
    let gitmodules_path = working_copy_path.join(".gitmodules");
    let contents = std::fs::read_to_string(&gitmodules_path).unwrap_or_default();
    let remaining = strip_submodule_sections(&contents, excluded);
    if remaining.trim().is_empty() {
        let _ = std::fs::remove_file(&gitmodules_path);
        let mut index = repo.get_index()?;
        let _ = index.remove(Path::new(".gitmodules"));
        index.write()?;
    } else {
        std::fs::write(&gitmodules_path, remaining).map_err(|err| Error::Internal(err.into()))?;
        let mut index = repo.get_index()?;
        index.add_by_path(Path::new(".gitmodules"))?;
        index.write()?;
    }
    Ok(())
}

/// Remove each `[submodule "<name>"]` section (and its body, up to the next
/// section header) for every name in `excluded`.
fn strip_submodule_sections(contents: &str, excluded: &BTreeSet<String>) -> String {
    let mut out = String::new();
    let mut skipping = false;
    for line in contents.lines() {
        let trimmed = line.trim();
        if let Some(header) = trimmed.strip_prefix("[submodule \"") {
            if let Some(name) = header.strip_suffix("\"]") {
                skipping = excluded.contains(name);
                if skipping {
                    continue;
                }
            } else {
                skipping = false;
            }
        } else if trimmed.starts_with('[') {
            skipping = false;
        }
        if skipping {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Remove `path`'s parent directories, walking upward from its immediate
/// parent, as long as each one is empty.
fn prune_empty_parents(working_copy_path: &Path, path: &Path) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir.as_os_str().is_empty() {
            break;
        }
        let full = working_copy_path.join(dir);
        match std::fs::read_dir(&full) {
            Ok(mut entries) if entries.next().is_none() => {
                let _ = std::fs::remove_dir(&full);
                current = dir.parent();
            }
            _ => break,
        }
    }
}
