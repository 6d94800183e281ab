use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use bstr::ByteVec;
use itertools::Itertools;
use thiserror::Error;
use tracing::{instrument, warn};

use super::oid::make_non_zero_oid;
use super::status::FileMode;
use super::{NonZeroOid, Repo};

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not decode tree entry name: {0}")]
    DecodeTreeEntryName(#[source] bstr::FromUtf8Error),

    #[error("tree entry was said to be a tree, but it could not be looked up: {oid}")]
    NotATree { oid: NonZeroOid },

    #[error("could not parse OID: {0}")]
    ParseOid(#[source] eyre::Error),

    #[error(transparent)]
    FindTree(Box<super::repo::Error>),

    #[error("could not find just-hydrated tree: {0}")]
    FindHydratedTree(NonZeroOid),

    #[error("could not read tree from path {path}: {source}")]
    ReadTreeEntry { source: git2::Error, path: PathBuf },

    #[error("could not construct tree builder: {0}")]
    CreateTreeBuilder(#[source] git2::Error),

    #[error("could not insert object {oid} with mode {file_mode:?} into tree builder: {source}")]
    InsertTreeBuilderEntry {
        source: git2::Error,
        oid: NonZeroOid,
        file_mode: FileMode,
    },

    #[error("could not read object at path {path} from tree builder: {source}")]
    ReadTreeBuilderEntry { source: git2::Error, path: PathBuf },

    #[error("could not delete object at path {path} from tree builder: {source}")]
    DeleteTreeBuilderEntry { source: git2::Error, path: PathBuf },

    #[error("could not build tree: {0}")]
    BuildTree(#[source] git2::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A tree object. Contains a mapping from name to OID (and file mode).
pub struct Tree<'repo> {
    pub(super) inner: git2::Tree<'repo>,
}

impl std::fmt::Debug for Tree<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Tree {}>", self.get_oid())
    }
}

impl Tree<'_> {
    /// Get the object ID for this tree.
    pub fn get_oid(&self) -> NonZeroOid {
        make_non_zero_oid(self.inner.id())
    }

    /// Whether this tree is empty (no entries).
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Get the tree entry for the given path, which may contain slashes.
    pub fn get_path(&self, path: &Path) -> Result<Option<(NonZeroOid, FileMode)>> {
        match self.inner.get_path(path) {
            Ok(entry) => Ok(Some((
                make_non_zero_oid(entry.id()),
                FileMode::from(entry.filemode()),
            ))),
            Err(err) if err.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(err) => Err(Error::ReadTreeEntry {
                source: err,
                path: path.to_owned(),
            }),
        }
    }

    /// The top-level list of entry names in this tree, for testing.
    pub fn get_entry_names_for_testing(&self) -> Vec<String> {
        self.inner
            .iter()
            .map(|entry| entry.name().unwrap_or_default().to_string())
            .collect_vec()
    }

    /// List every top-level entry in this tree as `(name, oid, file mode)`.
    /// Used by the coordinator to enumerate submodule (`FileMode::Commit`)
    /// entries across arbitrary historical trees, not just the live index.
    pub fn list_entries(&self) -> Vec<(String, NonZeroOid, FileMode)> {
        self.inner
            .iter()
            .map(|entry| {
                (
                    entry.name().unwrap_or_default().to_owned(),
                    make_non_zero_oid(entry.id()),
                    FileMode::from(entry.filemode()),
                )
            })
            .collect_vec()
    }
}

/// This function is a hot code path; it's faster than `git2`'s own recursive
/// tree-diff because it short-circuits on unchanged subtrees by OID equality.
fn get_changed_paths_between_trees_internal(
    repo: &Repo,
    acc: &mut Vec<Vec<PathBuf>>,
    current_path: &[PathBuf],
    lhs: Option<&git2::Tree>,
    rhs: Option<&git2::Tree>,
) -> Result<()> {
    let lhs_entries = lhs.map(|tree| tree.iter().collect_vec()).unwrap_or_default();
    let lhs_entries: HashMap<&[u8], &git2::TreeEntry> =
        lhs_entries.iter().map(|entry| (entry.name_bytes(), entry)).collect();

    let rhs_entries = rhs.map(|tree| tree.iter().collect_vec()).unwrap_or_default();
    let rhs_entries: HashMap<&[u8], &git2::TreeEntry> =
        rhs_entries.iter().map(|entry| (entry.name_bytes(), entry)).collect();

    let all_entry_names: HashSet<&[u8]> =
        lhs_entries.keys().chain(rhs_entries.keys()).cloned().collect();

    for entry_name in all_entry_names {
        let lhs_entry = lhs_entries.get(entry_name).copied();
        let rhs_entry = rhs_entries.get(entry_name).copied();

        enum Classified {
            Absent,
            NotATree(git2::Oid, i32),
            Tree(git2::Oid, i32),
        }
        fn classify(entry: Option<&git2::TreeEntry>) -> Classified {
            match entry {
                None => Classified::Absent,
                Some(entry) => match entry.kind() {
                    Some(git2::ObjectType::Tree) => Classified::Tree(entry.id(), entry.filemode_raw()),
                    _ => Classified::NotATree(entry.id(), entry.filemode_raw()),
                },
            }
        }

        let get_tree = |oid: git2::Oid| -> Result<Tree> {
            let oid = NonZeroOid::try_from(oid).map_err(|_| Error::ParseOid(eyre::eyre!("zero oid")))?;
            repo.find_tree(oid)
                .map_err(Box::new)
                .map_err(Error::FindTree)?
                .ok_or(Error::NotATree { oid })
        };

        let full_entry_path = || -> Result<Vec<PathBuf>> {
            let mut path = current_path.to_vec();
            let name = entry_name.to_vec().into_path_buf().map_err(Error::DecodeTreeEntryName)?;
            path.push(name);
            Ok(path)
        };

        match (classify(lhs_entry), classify(rhs_entry)) {
            (Classified::Absent, Classified::Absent) => {}
            (Classified::NotATree(l_oid, l_mode), Classified::NotATree(r_oid, r_mode)) => {
                if l_oid != r_oid || l_mode != r_mode {
                    acc.push(full_entry_path()?);
                }
            }
            (Classified::Absent, Classified::NotATree(..)) | (Classified::NotATree(..), Classified::Absent) => {
                acc.push(full_entry_path()?);
            }
            (Classified::Absent, Classified::Tree(tree_oid, _)) | (Classified::Tree(tree_oid, _), Classified::Absent) => {
                let path = full_entry_path()?;
                let tree = get_tree(tree_oid)?;
                get_changed_paths_between_trees_internal(repo, acc, &path, Some(&tree.inner), None)?;
            }
            (Classified::NotATree(_, _), Classified::Tree(tree_oid, _)) | (Classified::Tree(tree_oid, _), Classified::NotATree(_, _)) => {
                let path = full_entry_path()?;
                let tree = get_tree(tree_oid)?;
                get_changed_paths_between_trees_internal(repo, acc, &path, Some(&tree.inner), None)?;
                acc.push(path);
            }
            (Classified::Tree(l_oid, l_mode), Classified::Tree(r_oid, r_mode)) => match (l_oid == r_oid, l_mode == r_mode) {
                (true, true) => {}
                (true, false) => acc.push(full_entry_path()?),
                (false, is_mode_same) => {
                    let l_tree = get_tree(l_oid)?;
                    let r_tree = get_tree(r_oid)?;
                    let path = full_entry_path()?;
                    get_changed_paths_between_trees_internal(repo, acc, &path, Some(&l_tree.inner), Some(&r_tree.inner))?;
                    if !is_mode_same {
                        acc.push(path);
                    }
                }
            },
        }
    }
    Ok(())
}

/// Get the set of paths which differ between two trees.
#[instrument]
pub fn get_changed_paths_between_trees(
    repo: &Repo,
    lhs: Option<&Tree>,
    rhs: Option<&Tree>,
) -> Result<HashSet<PathBuf>> {
    let mut acc = Vec::new();
    get_changed_paths_between_trees_internal(
        repo,
        &mut acc,
        &Vec::new(),
        lhs.map(|tree| &tree.inner),
        rhs.map(|tree| &tree.inner),
    )?;
    Ok(acc.into_iter().map(PathBuf::from_iter).collect())
}

/// Layer `entries` on top of `tree` (or the empty tree, if `None`), returning
/// the OID of the resulting tree. A `None` value for an entry removes it
/// (and its parent directory, if that becomes empty). Intermediate
/// directories are created as needed. Paths may contain slashes.
///
/// This is the plumbing adapter's `writeTree(repo, baseTree, changes)`
/// operation (§4.C): a submodule pointer change is just an entry whose
/// file mode is [`FileMode::Commit`].
#[instrument]
pub fn hydrate_tree(
    repo: &Repo,
    tree: Option<&Tree>,
    entries: HashMap<PathBuf, Option<(NonZeroOid, FileMode)>>,
) -> Result<NonZeroOid> {
    let (file_entries, dir_entries) = {
        let mut file_entries: HashMap<PathBuf, Option<(NonZeroOid, FileMode)>> = HashMap::new();
        let mut dir_entries: HashMap<PathBuf, HashMap<PathBuf, Option<(NonZeroOid, FileMode)>>> =
            HashMap::new();
        for (path, value) in entries {
            match path.components().collect_vec().as_slice() {
                [] => warn!(?value, "empty path when hydrating tree"),
                [file_name] => {
                    file_entries.insert(file_name.into(), value);
                }
                components => {
                    let first: PathBuf = [components[0]].iter().collect();
                    let rest: PathBuf = components[1..].iter().collect();
                    dir_entries.entry(first).or_default().insert(rest, value);
                }
            }
        }
        (file_entries, dir_entries)
    };

    let tree = tree.map(|tree| &tree.inner);
    let mut builder = repo.inner.treebuilder(tree).map_err(Error::CreateTreeBuilder)?;
    for (file_name, file_value) in file_entries {
        match file_value {
            Some((oid, file_mode)) => {
                builder
                    .insert(&file_name, oid.into(), file_mode.into())
                    .map_err(|err| Error::InsertTreeBuilderEntry { source: err, oid, file_mode })?;
            }
            None => remove_entry_if_exists(&mut builder, &file_name)?,
        }
    }

    for (dir_name, dir_value) in dir_entries {
        let existing_dir_entry: Option<Tree> = match builder
            .get(&dir_name)
            .map_err(|err| Error::ReadTreeBuilderEntry { source: err, path: dir_name.to_owned() })?
        {
            Some(existing) if !existing.id().is_zero() && existing.kind() == Some(git2::ObjectType::Tree) => repo
                .find_tree(make_non_zero_oid(existing.id()))
                .map_err(Box::new)
                .map_err(Error::FindTree)?,
            _ => None,
        };
        let new_entry_oid = hydrate_tree(repo, existing_dir_entry.as_ref(), dir_value)?;
        let new_entry_tree = repo
            .find_tree(new_entry_oid)
            .map_err(Box::new)
            .map_err(Error::FindTree)?
            .ok_or(Error::FindHydratedTree(new_entry_oid))?;
        if new_entry_tree.is_empty() {
            remove_entry_if_exists(&mut builder, &dir_name)?;
        } else {
            builder
                .insert(&dir_name, new_entry_oid.into(), git2::FileMode::Tree.into())
                .map_err(|err| Error::InsertTreeBuilderEntry {
                    source: err,
                    oid: new_entry_oid,
                    file_mode: FileMode::Tree,
                })?;
        }
    }

    let tree_oid = builder.write().map_err(Error::BuildTree)?;
    Ok(make_non_zero_oid(tree_oid))
}

/// Build (and return) the empty tree for `repo`.
pub fn make_empty_tree<'repo>(repo: &'repo Repo) -> Result<Tree<'repo>> {
    let tree_oid = hydrate_tree(repo, None, Default::default())?;
    repo.find_tree(tree_oid)
        .map_err(Box::new)
        .map_err(Error::FindTree)?
        .ok_or(Error::FindHydratedTree(tree_oid))
}

fn remove_entry_if_exists(builder: &mut git2::TreeBuilder, name: &Path) -> Result<()> {
    if builder
        .get(name)
        .map_err(|err| Error::ReadTreeBuilderEntry { source: err, path: name.to_owned() })?
        .is_some()
    {
        builder
            .remove(name)
            .map_err(|err| Error::DeleteTreeBuilderEntry { source: err, path: name.to_owned() })?;
    }
    Ok(())
}

/// Keep only `paths` from `tree`, dropping everything else. Paths not
/// present in `tree` are silently ignored.
#[instrument]
pub fn dehydrate_tree(repo: &Repo, tree: &Tree, paths: &[&Path]) -> Result<NonZeroOid> {
    let entries: HashMap<PathBuf, Option<(NonZeroOid, FileMode)>> = paths
        .iter()
        .map(|path| -> Result<(PathBuf, _)> {
            let key = path.to_path_buf();
            match tree.inner.get_path(path) {
                Ok(entry) => Ok((key, Some((make_non_zero_oid(entry.id()), FileMode::from(entry.filemode()))))),
                Err(err) if err.code() == git2::ErrorCode::NotFound => Ok((key, None)),
                Err(err) => Err(Error::ReadTreeEntry { source: err, path: key }),
            }
        })
        .try_collect()?;
    hydrate_tree(repo, None, entries)
}
