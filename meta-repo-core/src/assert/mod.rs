//! The assertion engine: structural comparison of [`RepoAST`] values
//! (`spec.md` §4.F), used by tests to check that a repository (real or
//! resolved-from-shorthand) has exactly the shape expected.
//!
//! Diffing happens on values, not live repositories: callers that have
//! materialized an AST onto disk with [`crate::codec::write_multi_rast`] and
//! want to compare it back against the shorthand they started from first
//! translate its real OIDs/paths back to logical ids via
//! [`map_commits_and_urls`].

use std::collections::BTreeSet;

use crate::ast::{Branch, CommitId, RepoAST};
use crate::codec::{CommitIdMap, UrlMap};

/// Compare `actual` against `expected`, returning one human-readable line per
/// discrepancy found. An empty result means the two are equivalent.
///
/// A commit's expected message may be the wildcard `"*"`, meaning "don't
/// care" -- most fixtures don't assert on exact commit message text, only on
/// the shape of the graph and its changes.
pub fn diff_asts(actual: &RepoAST, expected: &RepoAST) -> Vec<String> {
    let mut diffs = Vec::new();

    diff_commits(actual, expected, &mut diffs);
    diff_map(&actual.branches, &expected.branches, "branch", &mut diffs, |name, a, e| {
        diff_branch(name, a, e)
    });
    diff_map(&actual.refs, &expected.refs, "ref", &mut diffs, |name, a, e| {
        if a != e {
            vec![format!("ref '{name}': expected {e}, got {a}")]
        } else {
            Vec::new()
        }
    });
    diff_map(&actual.remotes, &expected.remotes, "remote", &mut diffs, |name, a, e| {
        let mut sub_diffs = Vec::new();
        if a.url != e.url {
            sub_diffs.push(format!("remote '{name}': expected url {:?}, got {:?}", e.url, a.url));
        }
        diff_map(&a.branches, &e.branches, &format!("remote '{name}' branch"), &mut sub_diffs, |n, a, e| {
            if a != e {
                vec![format!("remote '{name}' branch '{n}': expected {e}, got {a}")]
            } else {
                Vec::new()
            }
        });
        sub_diffs
    });
    diff_map(&actual.notes, &expected.notes, "notes ref", &mut diffs, |name, a, e| {
        let mut sub_diffs = Vec::new();
        diff_map(a, e, &format!("note on '{name}' for commit"), &mut sub_diffs, |id, a, e| {
            if a != e {
                vec![format!("note on '{name}' for commit {id}: expected {e:?}, got {a:?}")]
            } else {
                Vec::new()
            }
        });
        sub_diffs
    });

    if actual.head != expected.head {
        diffs.push(format!("HEAD: expected {:?}, got {:?}", expected.head, actual.head));
    }
    if actual.current_branch_name != expected.current_branch_name {
        diffs.push(format!(
            "current branch: expected {:?}, got {:?}",
            expected.current_branch_name, actual.current_branch_name
        ));
    }
    if actual.bare != expected.bare {
        diffs.push(format!("bare: expected {}, got {}", expected.bare, actual.bare));
    }
    if actual.index != expected.index {
        diffs.push(format!("index: expected {:?}, got {:?}", expected.index, actual.index));
    }
    if actual.workdir != expected.workdir {
        diffs.push(format!("workdir: expected {:?}, got {:?}", expected.workdir, actual.workdir));
    }
    if actual.rebase != expected.rebase {
        diffs.push(format!("rebase: expected {:?}, got {:?}", expected.rebase, actual.rebase));
    }

    diff_map(&actual.open_submodules, &expected.open_submodules, "submodule", &mut diffs, |name, a, e| {
        diff_asts(a, e)
            .into_iter()
            .map(|line| format!("submodule '{name}': {line}"))
            .collect()
    });

    diffs
}

fn diff_commits(actual: &RepoAST, expected: &RepoAST, diffs: &mut Vec<String>) {
    let actual_ids: BTreeSet<&CommitId> = actual.commits.keys().collect();
    let expected_ids: BTreeSet<&CommitId> = expected.commits.keys().collect();

    for id in expected_ids.difference(&actual_ids) {
        diffs.push(format!("commit {id}: expected, but missing"));
    }
    for id in actual_ids.difference(&expected_ids) {
        diffs.push(format!("commit {id}: present, but not expected"));
    }
    for id in actual_ids.intersection(&expected_ids) {
        let a = &actual.commits[*id];
        let e = &expected.commits[*id];
        if a.parents != e.parents {
            diffs.push(format!("commit {id}: expected parents {:?}, got {:?}", e.parents, a.parents));
        }
        if a.changes != e.changes {
            diffs.push(format!("commit {id}: expected changes {:?}, got {:?}", e.changes, a.changes));
        }
        let message_matches = e.message.as_deref() == Some("*") || a.message == e.message;
        if !message_matches {
            diffs.push(format!("commit {id}: expected message {:?}, got {:?}", e.message, a.message));
        }
    }
}

fn diff_branch(name: &str, actual: &Branch, expected: &Branch) -> Vec<String> {
    let mut diffs = Vec::new();
    if actual.commit != expected.commit {
        diffs.push(format!(
            "branch '{name}': expected to point at {}, got {}",
            expected.commit, actual.commit
        ));
    }
    if actual.tracking != expected.tracking {
        diffs.push(format!(
            "branch '{name}': expected tracking {:?}, got {:?}",
            expected.tracking, actual.tracking
        ));
    }
    diffs
}

/// Diff two name-keyed maps, reporting missing/unexpected keys plus whatever
/// `diff_value` reports for keys present on both sides.
fn diff_map<K: Ord + std::fmt::Display, V>(
    actual: &std::collections::BTreeMap<K, V>,
    expected: &std::collections::BTreeMap<K, V>,
    label: &str,
    diffs: &mut Vec<String>,
    diff_value: impl Fn(&K, &V, &V) -> Vec<String>,
) {
    let actual_keys: BTreeSet<&K> = actual.keys().collect();
    let expected_keys: BTreeSet<&K> = expected.keys().collect();

    for key in expected_keys.difference(&actual_keys) {
        diffs.push(format!("{label} '{key}': expected, but missing"));
    }
    for key in actual_keys.difference(&expected_keys) {
        diffs.push(format!("{label} '{key}': present, but not expected"));
    }
    for key in actual_keys.intersection(&expected_keys) {
        diffs.extend(diff_value(key, &actual[*key], &expected[*key]));
    }
}

/// Assert that `actual` matches `expected`, panicking with every discrepancy
/// listed if not. Intended for test code, where a panic is the desired
/// failure mode.
pub fn assert_equal_asts(actual: &RepoAST, expected: &RepoAST) {
    let diffs = diff_asts(actual, expected);
    assert!(diffs.is_empty(), "RepoAST mismatch:\n{}", diffs.join("\n"));
}

/// Assert that every repo in `actual` matches its counterpart in `expected`,
/// and that neither map has repos the other lacks.
pub fn assert_equal_repo_maps(
    actual: &std::collections::BTreeMap<String, RepoAST>,
    expected: &std::collections::BTreeMap<String, RepoAST>,
) {
    let mut diffs = Vec::new();
    diff_map(actual, expected, "repo", &mut diffs, |name, a, e| {
        diff_asts(a, e).into_iter().map(|line| format!("repo '{name}': {line}")).collect()
    });
    assert!(diffs.is_empty(), "repo map mismatch:\n{}", diffs.join("\n"));
}

/// Translate `ast` (whose `CommitId`s and submodule/remote URLs are real
/// backend OIDs and on-disk paths, as assigned when `repo_name` was written)
/// back into logical shorthand form, by reversing `commit_map`/`url_map`.
/// Recurses into `open_submodules`, looking each one up under its own name.
///
/// A commit id or url with no reverse entry is left unchanged: this happens
/// for content this writer never produced (e.g. a commit made directly by a
/// coordinator operation under test, which is exactly the kind of "new"
/// state callers are trying to observe, not translate away).
pub fn map_commits_and_urls(
    ast: &RepoAST,
    repo_name: &str,
    commit_map: &CommitIdMap,
    url_map: &UrlMap,
) -> RepoAST {
    let reverse_commits = reverse_commit_map(commit_map, repo_name);
    let reverse_urls = reverse_url_map(url_map);
    map_ast(ast, &reverse_commits, &reverse_urls, commit_map, url_map)
}

fn reverse_commit_map(
    commit_map: &CommitIdMap,
    repo_name: &str,
) -> std::collections::HashMap<String, CommitId> {
    commit_map
        .0
        .iter()
        .filter(|((name, _), _)| name == repo_name)
        .map(|((_, id), oid)| (oid.to_string(), id.clone()))
        .collect()
}

fn reverse_url_map(url_map: &UrlMap) -> std::collections::HashMap<String, String> {
    url_map
        .0
        .iter()
        .map(|(name, path)| (path.to_string_lossy().into_owned(), name.clone()))
        .collect()
}

fn map_commit_id(id: &CommitId, reverse_commits: &std::collections::HashMap<String, CommitId>) -> CommitId {
    reverse_commits.get(id.as_str()).cloned().unwrap_or_else(|| id.clone())
}

fn map_url(url: &str, reverse_urls: &std::collections::HashMap<String, String>) -> String {
    reverse_urls.get(url).cloned().unwrap_or_else(|| url.to_owned())
}

fn map_ast(
    ast: &RepoAST,
    reverse_commits: &std::collections::HashMap<String, CommitId>,
    reverse_urls: &std::collections::HashMap<String, String>,
    commit_map: &CommitIdMap,
    url_map: &UrlMap,
) -> RepoAST {
    use crate::ast::{Change, Content, Remote};

    let map_change = |change: &Change| -> Change {
        change.as_ref().map(|content| match content {
            Content::Blob(data) => Content::Blob(data.clone()),
            Content::Submodule { url, sha } => Content::Submodule {
                url: map_url(url, reverse_urls),
                sha: map_commit_id(sha, reverse_commits),
            },
        })
    };

    let commits = ast
        .commits
        .iter()
        .map(|(id, commit)| {
            let mapped_id = map_commit_id(id, reverse_commits);
            let mapped_commit = crate::ast::Commit {
                parents: commit.parents.iter().map(|p| map_commit_id(p, reverse_commits)).collect(),
                changes: commit
                    .changes
                    .iter()
                    .map(|(path, change)| (path.clone(), map_change(change)))
                    .collect(),
                message: commit.message.clone(),
            };
            (mapped_id, mapped_commit)
        })
        .collect();

    let branches = ast
        .branches
        .iter()
        .map(|(name, branch)| {
            (
                name.clone(),
                Branch {
                    commit: map_commit_id(&branch.commit, reverse_commits),
                    tracking: branch.tracking.clone(),
                },
            )
        })
        .collect();

    let refs = ast
        .refs
        .iter()
        .map(|(name, id)| (name.clone(), map_commit_id(id, reverse_commits)))
        .collect();

    let remotes = ast
        .remotes
        .iter()
        .map(|(name, remote)| {
            (
                name.clone(),
                Remote {
                    url: map_url(&remote.url, reverse_urls),
                    branches: remote
                        .branches
                        .iter()
                        .map(|(branch_name, id)| (branch_name.clone(), map_commit_id(id, reverse_commits)))
                        .collect(),
                },
            )
        })
        .collect();

    let notes = ast
        .notes
        .iter()
        .map(|(name, by_commit)| {
            (
                name.clone(),
                by_commit
                    .iter()
                    .map(|(id, message)| (map_commit_id(id, reverse_commits), message.clone()))
                    .collect(),
            )
        })
        .collect();

    let index = ast.index.iter().map(|(path, change)| (path.clone(), map_change(change))).collect();
    let workdir = ast.workdir.iter().map(|(path, change)| (path.clone(), map_change(change))).collect();

    // Each open submodule's commits were registered under its own name, so
    // translate it with a fresh reverse-lookup rather than the parent's.
    let open_submodules = ast
        .open_submodules
        .iter()
        .map(|(name, sub_ast)| (name.clone(), map_commits_and_urls(sub_ast, name, commit_map, url_map)))
        .collect();

    RepoAST {
        commits,
        branches,
        refs,
        remotes,
        notes,
        head: ast.head.as_ref().map(|id| map_commit_id(id, reverse_commits)),
        current_branch_name: ast.current_branch_name.clone(),
        bare: ast.bare,
        index,
        workdir,
        open_submodules,
        rebase: ast.rebase.clone(),
    }
}
