use std::string::FromUtf8Error;

use thiserror::Error;
use tracing::instrument;

use super::oid::make_non_zero_oid;
use super::repo::{Error, Result};
use super::{Commit, MaybeZeroOid, NonZeroOid};

#[derive(Debug, Error)]
pub enum ReferenceNameError {
    #[error("reference name was not valid UTF-8: {0}")]
    InvalidUtf8(FromUtf8Error),
}

/// The name of a reference, like `refs/heads/master`.
#[derive(Clone, Debug, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct ReferenceName(String);

impl ReferenceName {
    /// Create a reference name from the provided bytestring. Non-UTF-8
    /// reference names are not supported.
    pub fn from_bytes(bytes: Vec<u8>) -> std::result::Result<ReferenceName, ReferenceNameError> {
        let name = String::from_utf8(bytes).map_err(ReferenceNameError::InvalidUtf8)?;
        Ok(Self(name))
    }

    /// View this reference name as a string. (Zero-cost.)
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Strip the `refs/heads/` prefix, if present.
    pub fn branch_name(&self) -> &str {
        self.0.strip_prefix("refs/heads/").unwrap_or(&self.0)
    }

    /// Strip the `refs/remotes/<remote>/` prefix, if present, returning the
    /// remote name and the branch name.
    pub fn remote_branch_name(&self) -> Option<(&str, &str)> {
        let rest = self.0.strip_prefix("refs/remotes/")?;
        rest.split_once('/')
    }
}

impl From<&str> for ReferenceName {
    fn from(s: &str) -> Self {
        ReferenceName(s.to_owned())
    }
}

impl From<String> for ReferenceName {
    fn from(s: String) -> Self {
        ReferenceName(s)
    }
}

impl AsRef<str> for ReferenceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReferenceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The target of a reference.
#[derive(Debug, PartialEq, Eq)]
pub enum ReferenceTarget {
    /// The reference points directly at an object.
    Direct {
        /// The OID of the pointed-to object.
        oid: MaybeZeroOid,
    },
    /// The reference points at another reference by name.
    Symbolic {
        /// The name of the pointed-to reference.
        reference_name: ReferenceName,
    },
}

/// Represents a reference inside the repository (a branch, a remote-tracking
/// branch, `HEAD`, or a plain ref).
pub struct Reference<'repo> {
    pub(super) inner: git2::Reference<'repo>,
}

impl std::fmt::Debug for Reference<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Reference name={:?}>", self.inner.name())
    }
}

impl<'repo> Reference<'repo> {
    /// Get the fully-qualified name of this reference.
    #[instrument]
    pub fn get_name(&self) -> Result<ReferenceName> {
        ReferenceName::from_bytes(self.inner.name_bytes().to_vec())
            .map_err(Error::DecodeReferenceName)
    }

    /// Get the target of this reference.
    #[instrument]
    pub fn get_target(&self) -> ReferenceTarget {
        match self.inner.symbolic_target_bytes() {
            Some(target) => ReferenceTarget::Symbolic {
                reference_name: ReferenceName::from_bytes(target.to_vec())
                    .unwrap_or_else(|_| ReferenceName::from(String::new())),
            },
            None => ReferenceTarget::Direct {
                oid: self.inner.target().map(MaybeZeroOid::from).unwrap_or(MaybeZeroOid::Zero),
            },
        }
    }

    /// Peel this reference to the commit it (transitively) points at, if any.
    #[instrument]
    pub fn peel_to_commit(&self) -> Result<Option<Commit<'repo>>> {
        let object = match self.inner.peel(git2::ObjectType::Commit) {
            Ok(object) => object,
            Err(err) if err.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(err) => return Err(Error::ResolveReference(err)),
        };
        match object.into_commit() {
            Ok(commit) => Ok(Some(Commit { inner: commit })),
            Err(_) => Ok(None),
        }
    }
}

/// Whether a branch is local or remote-tracking.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BranchType {
    /// A local branch (`refs/heads/<name>`).
    Local,
    /// A remote-tracking branch (`refs/remotes/<remote>/<name>`).
    Remote,
}

impl From<BranchType> for git2::BranchType {
    fn from(value: BranchType) -> Self {
        match value {
            BranchType::Local => git2::BranchType::Local,
            BranchType::Remote => git2::BranchType::Remote,
        }
    }
}

/// A named branch.
pub struct Branch<'repo> {
    pub(super) inner: git2::Branch<'repo>,
}

impl std::fmt::Debug for Branch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Branch name={:?}>", self.inner.name())
    }
}

impl<'repo> Branch<'repo> {
    /// Get the short name of the branch (without `refs/heads/`).
    #[instrument]
    pub fn get_name(&self) -> Result<String> {
        let name = self.inner.name().map_err(Error::ReadBranch)?;
        Ok(name.unwrap_or_default().to_owned())
    }

    /// Get the OID this branch currently points to.
    #[instrument]
    pub fn get_oid(&self) -> Option<NonZeroOid> {
        self.inner.get().target().map(make_non_zero_oid)
    }

    /// Get the upstream ("tracking") branch name, if one is configured.
    #[instrument]
    pub fn get_upstream_branch_name(&self) -> Result<Option<String>> {
        match self.inner.upstream() {
            Ok(upstream) => Ok(upstream.name().map_err(Error::ReadBranch)?.map(str::to_owned)),
            Err(err) if err.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(err) => Err(Error::FindUpstreamBranch {
                source: err,
                name: self.get_name().unwrap_or_default(),
            }),
        }
    }

    /// Set (or clear, with `None`) the upstream ("tracking") branch, given
    /// its short name relative to its remote (e.g. `origin/master`).
    #[instrument]
    pub fn set_upstream(&mut self, upstream_name: Option<&str>) -> Result<()> {
        self.inner.set_upstream(upstream_name).map_err(|source| {
            Error::FindUpstreamBranch {
                source,
                name: self.get_name().unwrap_or_default(),
            }
        })
    }
}
