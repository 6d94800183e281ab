//! The inverse of the parser: materializes a [`RepoAST`] (or a whole
//! multi-repo map of them) into real on-disk repositories, and returns the
//! id/url remaps needed to compare a re-read `RepoAST` back against the
//! original (`spec.md` §4.B "Writer").

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};

use tracing::instrument;

use super::{Error, Result};
use crate::ast::{Change, CommitId, Content, RepoAST};
use crate::git::{BranchType, FileMode, NonZeroOid, ReferenceName, Repo};
use crate::testing::make_dummy_signature;

/// Maps `(repo name, logical commit id)` to the backend OID assigned when it
/// was written. Keyed per-repo, not just by id: the same logical id (e.g.
/// the seed commit `"1"`) is written independently into each repo's own
/// object database and gets a different OID in each.
#[derive(Clone, Debug, Default)]
pub struct CommitIdMap(pub BTreeMap<(String, CommitId), NonZeroOid>);

impl CommitIdMap {
    /// Look up the OID assigned to `id` within `repo_name`.
    pub fn get(&self, repo_name: &str, id: &CommitId) -> Option<NonZeroOid> {
        self.0.get(&(repo_name.to_owned(), id.clone())).copied()
    }
}

/// Maps a logical repo name (as used as a remote or submodule "url" before
/// writing) to the path it was actually written to on disk.
#[derive(Clone, Debug, Default)]
pub struct UrlMap(pub BTreeMap<String, PathBuf>);

/// Order `asts` so that every repo referenced as a submodule's `url` (by
/// name) is written before the repo containing that submodule reference.
/// Repos with no such dependency keep their relative (alphabetical, since
/// `asts` is a `BTreeMap`) order.
fn topological_repo_order(asts: &BTreeMap<String, RepoAST>) -> Vec<String> {
    let mut in_degree: HashMap<&str, usize> = asts.keys().map(|k| (k.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for (name, ast) in asts {
        let mut deps = BTreeSet::new();
        for commit in ast.commits.values() {
            for change in commit.changes.values().flatten() {
                if let Content::Submodule { url, .. } = change {
                    if asts.contains_key(url) && url != name {
                        deps.insert(url.as_str());
                    }
                }
            }
        }
        for remote in ast.remotes.values() {
            if asts.contains_key(&remote.url) && &remote.url != name {
                deps.insert(remote.url.as_str());
            }
        }
        *in_degree.get_mut(name.as_str()).unwrap() += deps.len();
        for dep in deps {
            dependents.entry(dep).or_default().push(name.as_str());
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut order = Vec::with_capacity(asts.len());
    let mut remaining = in_degree.clone();
    while let Some(name) = queue.pop_front() {
        order.push(name.to_owned());
        for dependent in dependents.get(name).cloned().unwrap_or_default() {
            let degree = remaining.get_mut(dependent).unwrap();
            *degree -= 1;
            if *degree == 0 {
                queue.push_back(dependent);
            }
        }
    }
    // Any cycle (a submodule loop) falls back to alphabetical order rather
    // than failing outright; such a fixture can't be written with correct
    // submodule pointers on the first pass, but every other repo still is.
    for name in asts.keys() {
        if !order.contains(name) {
            order.push(name.clone());
        }
    }
    order
}

fn write_commit(
    repo: &Repo,
    repo_name: &str,
    id: &CommitId,
    ast: &RepoAST,
    commit_ids: &mut CommitIdMap,
    time_counter: &mut i64,
) -> Result<NonZeroOid> {
    if let Some(oid) = commit_ids.get(repo_name, id) {
        return Ok(oid);
    }
    let commit = ast
        .commits
        .get(id)
        .ok_or_else(|| Error::Other(eyre::eyre!("commit '{id}' is not defined in repo '{repo_name}'")))?;

    let mut parent_oids = Vec::with_capacity(commit.parents.len());
    for parent_id in &commit.parents {
        parent_oids.push(write_commit(repo, repo_name, parent_id, ast, commit_ids, time_counter)?);
    }

    let base_tree = match parent_oids.first() {
        Some(oid) => {
            let parent_commit = repo.find_commit_or_fail(*oid)?;
            Some(parent_commit.get_tree()?)
        }
        None => None,
    };

    let mut entries = HashMap::new();
    for (path, change) in &commit.changes {
        entries.insert(PathBuf::from(path), resolve_change(repo, repo_name, change, commit_ids)?);
    }
    let tree_oid = crate::git::hydrate_tree(repo, base_tree.as_ref(), entries)?;
    let tree = repo
        .find_tree(tree_oid)?
        .ok_or_else(|| Error::Other(eyre::eyre!("just-written tree not found")))?;

    *time_counter += 1;
    let signature = make_dummy_signature(*time_counter)?;
    let parent_commits = parent_oids
        .iter()
        .map(|oid| repo.find_commit_or_fail(*oid))
        .collect::<crate::git::RepoResult<Vec<_>>>()?;
    let parent_refs: Vec<&crate::git::Commit> = parent_commits.iter().collect();

    let message = commit.message.as_deref().unwrap_or("");
    let oid = repo.create_commit(None, &signature, &signature, message, &tree, &parent_refs)?;
    commit_ids.0.insert((repo_name.to_owned(), id.clone()), oid);
    Ok(oid)
}

fn resolve_change(
    repo: &Repo,
    repo_name: &str,
    change: &Change,
    commit_ids: &CommitIdMap,
) -> Result<Option<(NonZeroOid, FileMode)>> {
    match change {
        None => Ok(None),
        Some(Content::Blob(data)) => {
            let oid = repo.create_blob(data.as_bytes())?;
            Ok(Some((oid, FileMode::Blob)))
        }
        Some(Content::Submodule { url, sha }) => {
            let oid = commit_ids.get(url, sha).ok_or_else(|| {
                Error::Other(eyre::eyre!(
                    "submodule pointer in repo '{repo_name}' references unwritten commit {sha} in '{url}'"
                ))
            })?;
            Ok(Some((oid, FileMode::Commit)))
        }
    }
}

/// Materialize `ast` into a fresh repository at `target_path`, returning the
/// OID assigned to each of its commits. `repo_name` is used purely as the
/// key in the returned [`CommitIdMap`] (callers writing a single repo may
/// pass any stable name, e.g. `""`).
#[instrument(skip(ast))]
pub fn write_rast(ast: &RepoAST, repo_name: &str, target_path: &Path) -> Result<CommitIdMap> {
    let mut commit_ids = CommitIdMap::default();
    write_rast_into(ast, repo_name, target_path, &mut commit_ids, &BTreeMap::new())?;
    Ok(commit_ids)
}

fn write_rast_into(
    ast: &RepoAST,
    repo_name: &str,
    target_path: &Path,
    commit_ids: &mut CommitIdMap,
    url_map: &BTreeMap<String, PathBuf>,
) -> Result<()> {
    std::fs::create_dir_all(target_path).map_err(|err| Error::Other(err.into()))?;
    let repo = if ast.bare {
        Repo::init_bare(target_path).map_err(Error::Git)?
    } else {
        Repo::init(target_path).map_err(Error::Git)?
    };

    let mut time_counter = 0i64;
    for id in ast.commits.keys() {
        write_commit(&repo, repo_name, id, ast, commit_ids, &mut time_counter)?;
    }

    for (name, remote) in &ast.remotes {
        let url = url_map
            .get(&remote.url)
            .map(|path| path.to_string_lossy().into_owned())
            .unwrap_or_else(|| remote.url.clone());
        repo.create_remote(name, &url).map_err(Error::Git)?;
        for (branch_name, commit_id) in &remote.branches {
            if let Some(oid) = commit_ids.get(&remote.url, commit_id) {
                let refname = ReferenceName::from(format!("refs/remotes/{name}/{branch_name}"));
                repo.create_reference(&refname, oid, true, "codec: write remote-tracking ref")
                    .map_err(Error::Git)?;
            }
        }
    }

    for (name, branch) in &ast.branches {
        let oid = commit_ids
            .get(repo_name, &branch.commit)
            .ok_or_else(|| Error::Other(eyre::eyre!("branch '{name}' targets unwritten commit")))?;
        let commit = repo.find_commit_or_fail(oid)?;
        repo.create_branch(name, &commit, true).map_err(Error::Git)?;
        if let Some(tracking) = &branch.tracking {
            if let Some(mut local) = repo.find_branch(name, BranchType::Local).map_err(Error::Git)? {
                local.set_upstream(Some(tracking)).map_err(Error::Git)?;
            }
        }
    }

    for (name, commit_id) in &ast.refs {
        if let Some(oid) = commit_ids.get(repo_name, commit_id) {
            let refname = ReferenceName::from(name.clone());
            repo.create_reference(&refname, oid, true, "codec: write ref")
                .map_err(Error::Git)?;
        }
    }

    match (&ast.current_branch_name, &ast.head) {
        (Some(branch_name), _) => {
            let refname = ReferenceName::from(format!("refs/heads/{branch_name}"));
            repo.set_head(&refname).map_err(Error::Git)?;
            if !ast.bare {
                repo.checkout_head_force().map_err(Error::Git)?;
            }
        }
        (None, Some(head_id)) => {
            let oid = commit_ids
                .get(repo_name, head_id)
                .ok_or_else(|| Error::Other(eyre::eyre!("HEAD targets unwritten commit")))?;
            repo.set_head_detached(oid).map_err(Error::Git)?;
            if !ast.bare {
                repo.checkout_head_force().map_err(Error::Git)?;
            }
        }
        (None, None) => {}
    }

    if !ast.bare {
        apply_index_and_workdir(&repo, ast, repo_name, commit_ids)?;
        for (name, sub_ast) in &ast.open_submodules {
            let sub_path = target_path.join(name);
            let mut sub_commit_ids = CommitIdMap::default();
            write_rast_into(sub_ast, name, &sub_path, &mut sub_commit_ids, url_map)?;
            commit_ids.0.extend(sub_commit_ids.0);
            register_submodule(&repo, name, &sub_path)?;
        }
    }

    Ok(())
}

fn apply_index_and_workdir(
    repo: &Repo,
    ast: &RepoAST,
    repo_name: &str,
    commit_ids: &CommitIdMap,
) -> Result<()> {
    let mut index = repo.get_index().map_err(Error::Git)?;
    if let Some(head_id) = &ast.head {
        if let Some(oid) = commit_ids.get(repo_name, head_id) {
            let tree = repo.find_commit_or_fail(oid)?.get_tree()?;
            index.update_from_tree(&tree).map_err(Error::Git)?;
        }
    }

    for (path, change) in &ast.index {
        apply_index_change(repo, &mut index, path, change, commit_ids)?;
    }
    index.write().map_err(Error::Git)?;

    let working_copy = repo
        .get_working_copy_path()
        .ok_or_else(|| Error::Other(eyre::eyre!("repo unexpectedly has no working copy")))?;
    for (path, change) in &ast.workdir {
        apply_workdir_change(&working_copy, &mut index, path, change)?;
    }
    index.write().map_err(Error::Git)?;
    Ok(())
}

fn apply_index_change(
    repo: &Repo,
    index: &mut crate::git::Index,
    path: &str,
    change: &Change,
    commit_ids: &CommitIdMap,
) -> Result<()> {
    match change {
        None => {
            index.remove(Path::new(path)).map_err(Error::Git)?;
        }
        Some(Content::Blob(data)) => {
            let oid = repo.create_blob(data.as_bytes())?;
            index.add_entry(Path::new(path), oid, FileMode::Blob).map_err(Error::Git)?;
        }
        Some(Content::Submodule { url, sha }) => {
            let oid = commit_ids.get(url, sha).ok_or_else(|| {
                Error::Other(eyre::eyre!("index submodule pointer references unwritten commit"))
            })?;
            index.add_entry(Path::new(path), oid, FileMode::Commit).map_err(Error::Git)?;
        }
    }
    Ok(())
}

fn apply_workdir_change(
    working_copy: &Path,
    index: &mut crate::git::Index,
    path: &str,
    change: &Change,
) -> Result<()> {
    let full_path = working_copy.join(path);
    match change {
        None => {
            let _ = std::fs::remove_file(&full_path);
        }
        Some(Content::Blob(data)) => {
            if let Some(parent) = full_path.parent() {
                std::fs::create_dir_all(parent).map_err(|err| Error::Other(err.into()))?;
            }
            std::fs::write(&full_path, data).map_err(|err| Error::Other(err.into()))?;
            let _ = index;
        }
        Some(Content::Submodule { .. }) => {
            // A submodule pointer is never an unstaged workdir-only change:
            // the working tree is whatever the submodule's own repository
            // has checked out, not a blob this writer controls directly.
        }
    }
    Ok(())
}

fn register_submodule(repo: &Repo, name: &str, sub_path: &Path) -> Result<()> {
    let working_copy = repo
        .get_working_copy_path()
        .ok_or_else(|| Error::Other(eyre::eyre!("repo unexpectedly has no working copy")))?;
    let gitmodules_path = working_copy.join(".gitmodules");
    let mut contents = std::fs::read_to_string(&gitmodules_path).unwrap_or_default();
    let relative = sub_path
        .strip_prefix(&working_copy)
        .unwrap_or(sub_path)
        .to_string_lossy()
        .into_owned();
    contents.push_str(&format!(
        "[submodule \"{name}\"]\n\tpath = {relative}\n\turl = {relative}\n"
    ));
    std::fs::write(&gitmodules_path, contents).map_err(|err| Error::Other(err.into()))?;

    let mut index = repo.get_index().map_err(Error::Git)?;
    index.add_by_path(Path::new(".gitmodules")).map_err(Error::Git)?;
    index.write().map_err(Error::Git)?;
    Ok(())
}

/// Materialize every repo in `asts` into `target_root/<name>`, resolving
/// remote/submodule URLs to each other's on-disk paths and returning both
/// the combined commit-id map and the url map.
#[instrument(skip(asts))]
pub fn write_multi_rast(
    asts: &BTreeMap<String, RepoAST>,
    target_root: &Path,
) -> Result<(CommitIdMap, UrlMap)> {
    let order = topological_repo_order(asts);
    let mut url_map = BTreeMap::new();
    for name in &order {
        url_map.insert(name.clone(), target_root.join(name));
    }

    let mut commit_ids = CommitIdMap::default();
    for name in &order {
        let ast = &asts[name];
        write_rast_into(ast, name, &url_map[name], &mut commit_ids, &url_map)?;
    }
    Ok((commit_ids, UrlMap(url_map)))
}
