//! Assigns meaning to the pieces `lexer` splits out: parses a single repo's
//! base and overrides into a [`ParsedRepo`], then `resolve` performs the
//! full multi-repo resolution described in `spec.md` §4.B points 1-4.

use std::collections::BTreeMap;

use tracing::instrument;

use super::lexer::{split_list, split_multi_repo, split_shorthand};
use super::pool::CommitPool;
use super::seed::{self, seed_commit_id};
use super::{Error, Result};
use crate::ast::{Branch, Change, Commit, CommitId, Content, Remote, RepoAST};

/// The base a repo's shorthand starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Base {
    /// `S`: the simple (non-bare) seed repository.
    SeedSimple,
    /// `B`: the bare seed repository.
    SeedBare,
    /// `C<name>`: a clone of the repo named `name`.
    CloneOf(String),
}

/// One parsed override, in the order it appeared in the shorthand text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Override {
    /// `H=[commit]`.
    Head(Option<CommitId>),
    /// `*=[name]`.
    CurrentBranch(Option<String>),
    /// `B<name>=[commit]`.
    Branch { name: String, commit: Option<CommitId> },
    /// `C<id>-<parent> [change(,change)*]`.
    NewCommit {
        id: CommitId,
        parent: Option<CommitId>,
        changes: BTreeMap<String, Change>,
    },
    /// `R<name>=[url] [rbranch(,rbranch)*]`.
    Remote {
        name: String,
        url: Option<String>,
        branches: BTreeMap<String, Option<CommitId>>,
    },
}

/// A single repo's shorthand, parsed but not yet resolved against the
/// global pool or other repos.
#[derive(Debug, Clone)]
pub struct ParsedRepo {
    /// The base the repo starts from.
    pub base: Base,
    /// Overrides, in textual order.
    pub overrides: Vec<Override>,
}

fn parse_change(text: &str) -> Result<(String, Change)> {
    let (path, data) = text.split_once('=').ok_or_else(|| Error::MalformedOverride {
        override_text: text.to_owned(),
        reason: "change is missing '='".to_owned(),
    })?;
    if path.is_empty() {
        return Err(Error::MalformedOverride {
            override_text: text.to_owned(),
            reason: "change path is empty".to_owned(),
        });
    }
    if data.is_empty() {
        return Ok((path.to_owned(), None));
    }
    if let Some(rest) = data.strip_prefix('S') {
        let (url, sha) = rest.rsplit_once(':').ok_or_else(|| Error::MalformedOverride {
            override_text: text.to_owned(),
            reason: "submodule change must be 'Surl:sha'".to_owned(),
        })?;
        Ok((
            path.to_owned(),
            Some(Content::Submodule {
                url: url.to_owned(),
                sha: CommitId::from(sha),
            }),
        ))
    } else {
        Ok((path.to_owned(), Some(Content::Blob(data.to_owned()))))
    }
}

fn parse_rbranch(text: &str) -> Result<(String, Option<CommitId>)> {
    let (name, commit) = text.split_once('=').ok_or_else(|| Error::MalformedOverride {
        override_text: text.to_owned(),
        reason: "rbranch is missing '='".to_owned(),
    })?;
    if name.is_empty() {
        return Err(Error::MalformedOverride {
            override_text: text.to_owned(),
            reason: "rbranch name is empty".to_owned(),
        });
    }
    let commit = if commit.is_empty() {
        None
    } else {
        Some(CommitId::from(commit))
    };
    Ok((name.to_owned(), commit))
}

fn parse_override(text: &str) -> Result<Override> {
    let mut chars = text.chars();
    match chars.next() {
        Some('H') if text.starts_with("H=") => {
            let commit = &text[2..];
            let commit = if commit.is_empty() {
                None
            } else {
                Some(CommitId::from(commit))
            };
            Ok(Override::Head(commit))
        }
        Some('*') if text.starts_with("*=") => {
            let name = &text[2..];
            let name = if name.is_empty() { None } else { Some(name.to_owned()) };
            Ok(Override::CurrentBranch(name))
        }
        Some('C') if text.contains('-') => {
            let rest = &text[1..];
            let (head, changes_part) = match rest.split_once(' ') {
                Some((head, changes)) => (head, Some(changes)),
                None => (rest, None),
            };
            let (id, parent) = head.split_once('-').ok_or_else(|| Error::MalformedOverride {
                override_text: text.to_owned(),
                reason: "new-commit override must be 'C<id>-<parent>'".to_owned(),
            })?;
            if id.is_empty() {
                return Err(Error::MalformedOverride {
                    override_text: text.to_owned(),
                    reason: "new-commit id is empty".to_owned(),
                });
            }
            let parent = if parent.is_empty() {
                None
            } else {
                Some(CommitId::from(parent))
            };
            let mut changes = BTreeMap::new();
            if let Some(changes_part) = changes_part {
                for change_text in split_list(changes_part) {
                    let (path, change) = parse_change(change_text)?;
                    changes.insert(path, change);
                }
            }
            Ok(Override::NewCommit {
                id: CommitId::from(id),
                parent,
                changes,
            })
        }
        Some('B') => {
            let rest = &text[1..];
            let (name, commit) = rest.split_once('=').ok_or_else(|| Error::MalformedOverride {
                override_text: text.to_owned(),
                reason: "branch override must be 'B<name>=<commit>'".to_owned(),
            })?;
            if name.is_empty() {
                return Err(Error::MalformedOverride {
                    override_text: text.to_owned(),
                    reason: "branch name is empty".to_owned(),
                });
            }
            let commit = if commit.is_empty() {
                None
            } else {
                Some(CommitId::from(commit))
            };
            Ok(Override::Branch {
                name: name.to_owned(),
                commit,
            })
        }
        Some('R') => {
            let rest = &text[1..];
            let (name, payload) = rest.split_once('=').ok_or_else(|| Error::MalformedOverride {
                override_text: text.to_owned(),
                reason: "remote override must be 'R<name>=<url>'".to_owned(),
            })?;
            if name.is_empty() {
                return Err(Error::MalformedOverride {
                    override_text: text.to_owned(),
                    reason: "remote name is empty".to_owned(),
                });
            }
            let (url_part, rbranches_part) = match payload.split_once(' ') {
                Some((url, rbranches)) => (url, Some(rbranches)),
                None => (payload, None),
            };
            let url = if url_part.is_empty() {
                None
            } else {
                Some(url_part.to_owned())
            };
            let mut branches = BTreeMap::new();
            if let Some(rbranches_part) = rbranches_part {
                for rbranch_text in split_list(rbranches_part) {
                    let (name, commit) = parse_rbranch(rbranch_text)?;
                    branches.insert(name, commit);
                }
            }
            Ok(Override::Remote {
                name: name.to_owned(),
                url,
                branches,
            })
        }
        _ => Err(Error::UnknownOverride(text.to_owned())),
    }
}

fn parse_base(text: &str) -> Result<Base> {
    match text {
        "S" => Ok(Base::SeedSimple),
        "B" => Ok(Base::SeedBare),
        _ if text.starts_with('C') => Ok(Base::CloneOf(text[1..].to_owned())),
        _ => Err(Error::UnknownBase(text.to_owned())),
    }
}

/// Parse a single repo's shorthand string (no `name=` prefix, no `|`).
#[instrument]
pub fn parse_repo_shorthand(input: &str) -> Result<ParsedRepo> {
    let split = split_shorthand(input)?;
    let base = parse_base(split.base)?;
    let overrides = split.overrides.iter().map(|text| parse_override(text)).collect::<Result<Vec<_>>>()?;
    validate_overrides(&overrides)?;
    Ok(ParsedRepo { base, overrides })
}

fn validate_overrides(overrides: &[Override]) -> Result<()> {
    let mut has_head = false;
    let mut has_current_branch = false;
    let mut seen_branches = std::collections::HashSet::new();
    let mut seen_commits = std::collections::HashSet::new();
    for o in overrides {
        match o {
            Override::Head(_) => has_head = true,
            Override::CurrentBranch(_) => has_current_branch = true,
            Override::Branch { name, .. } => {
                if !seen_branches.insert(name.clone()) {
                    return Err(Error::DuplicateBranchOverride(name.clone()));
                }
            }
            Override::NewCommit { id, .. } => {
                if !seen_commits.insert(id.clone()) {
                    return Err(Error::DuplicateCommitOverride(id.0.clone()));
                }
            }
            Override::Remote { .. } => {}
        }
    }
    if has_head && has_current_branch {
        return Err(Error::HeadAndCurrentBranchConflict);
    }
    Ok(())
}

/// Parse a (possibly multi-repo) shorthand string into its constituent
/// per-repo [`ParsedRepo`] values, in the order they appear in the text. A
/// single-repo shorthand parses to a one-entry map keyed `""`.
#[instrument]
pub fn parse_multi_repo_shorthand(input: &str) -> Result<Vec<(String, ParsedRepo)>> {
    let entries = split_multi_repo(input)?;
    let mut seen = std::collections::HashSet::new();
    let mut result = Vec::with_capacity(entries.len());
    for entry in entries {
        if !seen.insert(entry.name.to_owned()) {
            return Err(Error::DuplicateRepoName(entry.name.to_owned()));
        }
        result.push((entry.name.to_owned(), parse_repo_shorthand(entry.shorthand)?));
    }
    Ok(result)
}

/// Build the global commit pool (`spec.md` §4.B point 1) from every repo's
/// base and overrides.
fn build_pool(repos: &[(String, ParsedRepo)]) -> Result<CommitPool> {
    let mut pool = CommitPool::new();
    for (_, parsed) in repos {
        if matches!(parsed.base, Base::SeedSimple | Base::SeedBare) {
            pool.insert(seed_commit_id(), seed::seed_commit())?;
        }
        for o in &parsed.overrides {
            if let Override::NewCommit { id, parent, changes } = o {
                let commit = Commit {
                    parents: parent.iter().cloned().collect(),
                    changes: changes.clone(),
                    message: None,
                };
                pool.insert(id.clone(), commit)?;
            }
        }
    }
    Ok(pool)
}

/// Collect every commit id directly referenced by `ast`'s branches, `head`,
/// refs, and remote branches (but not yet its own `commits` map).
fn referenced_commit_ids(ast: &RepoAST) -> Vec<CommitId> {
    let mut ids: Vec<CommitId> = ast.branches.values().map(|b| b.commit.clone()).collect();
    ids.extend(ast.head.clone());
    ids.extend(ast.refs.values().cloned());
    for remote in ast.remotes.values() {
        ids.extend(remote.branches.values().cloned());
    }
    ids
}

/// Apply `parsed`'s overrides to `base`, then pull in every commit
/// transitively reachable from the result's branches/head/refs/remotes out
/// of the global `pool` (`spec.md` §4.B points 3-4).
fn resolve_repo(repo_name: &str, base: RepoAST, parsed: &ParsedRepo, pool: &CommitPool) -> Result<RepoAST> {
    let mut ast = base;

    for o in &parsed.overrides {
        match o {
            Override::Head(commit) => ast.head = commit.clone(),
            Override::CurrentBranch(name) => {
                // Setting the current branch also checks it out, moving
                // `HEAD` to match -- mirroring what `git checkout <branch>`
                // does, and required by the "currentBranchName implies head"
                // invariant (`spec.md` §3).
                match name {
                    Some(name) => {
                        let branch = ast.branches.get(name).ok_or_else(|| Error::UnknownBranch {
                            repo: repo_name.to_owned(),
                            name: name.clone(),
                        })?;
                        ast.head = Some(branch.commit.clone());
                    }
                    None => {}
                }
                ast.current_branch_name = name.clone();
            }
            Override::Branch { name, commit } => match commit {
                Some(commit) => {
                    ast.branches.insert(
                        name.clone(),
                        Branch {
                            commit: commit.clone(),
                            tracking: ast.branches.get(name).and_then(|b| b.tracking.clone()),
                        },
                    );
                }
                None => {
                    ast.branches.remove(name);
                }
            },
            Override::NewCommit { id, .. } => {
                if let Some(commit) = pool.get(id) {
                    ast.commits.insert(id.clone(), commit.clone());
                }
            }
            Override::Remote { name, url, branches } => {
                let entry = ast.remotes.entry(name.clone()).or_insert_with(|| Remote {
                    url: String::new(),
                    branches: BTreeMap::new(),
                });
                if let Some(url) = url {
                    entry.url = url.clone();
                }
                for (branch_name, commit) in branches {
                    match commit {
                        Some(commit) => {
                            entry.branches.insert(branch_name.clone(), commit.clone());
                        }
                        None => {
                            entry.branches.remove(branch_name);
                        }
                    }
                }
            }
        }
    }

    for id in referenced_commit_ids(&ast) {
        pool.copy_reachable_into(&id, &mut ast.commits);
    }

    ast.check_invariants().map_err(|reason| Error::MalformedOverride {
        override_text: repo_name.to_owned(),
        reason,
    })?;

    Ok(ast)
}

/// Fully resolve a (possibly multi-repo) shorthand string into a map of
/// repo name -> resolved [`RepoAST`], per `spec.md` §4.B points 1-4.
#[instrument]
pub fn resolve(input: &str) -> Result<BTreeMap<String, RepoAST>> {
    let repos = parse_multi_repo_shorthand(input)?;
    let pool = build_pool(&repos)?;

    let mut resolved: BTreeMap<String, RepoAST> = BTreeMap::new();
    for (name, parsed) in &repos {
        let base = match &parsed.base {
            Base::SeedSimple => seed::seed_simple(),
            Base::SeedBare => seed::seed_bare(),
            Base::CloneOf(source_name) => {
                let source = resolved
                    .get(source_name)
                    .ok_or_else(|| Error::UnknownCloneSource(source_name.clone()))?;
                seed::clone_of(source_name, source)?
            }
        };
        let ast = resolve_repo(name, base, parsed, &pool)?;
        resolved.insert(name.clone(), ast);
    }
    Ok(resolved)
}
