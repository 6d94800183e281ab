//! Newtype wrappers around `git2::Oid`.
//!
//! Git has a convention that the all-zeros OID represents the absence of an
//! object (used for e.g. the "old" side of a new file in a diff, or a branch
//! that doesn't exist yet). Representing that with the `Option` type rather
//! than smuggling it through `git2::Oid` directly makes the "is this real"
//! question visible at every call site.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// An OID which is guaranteed not to be the all-zeros OID.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NonZeroOid {
    pub(crate) inner: git2::Oid,
}

impl NonZeroOid {
    /// View the underlying bytes of this OID.
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }
}

impl fmt::Debug for NonZeroOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NonZeroOid({})", self.inner)
    }
}

impl fmt::Display for NonZeroOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

#[derive(Debug, Error)]
pub enum OidParseError {
    #[error("could not parse OID: {0}")]
    Git(#[from] git2::Error),
    #[error("OID was unexpectedly the zero OID")]
    Zero,
}

impl FromStr for NonZeroOid {
    type Err = OidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let oid = git2::Oid::from_str(s)?;
        NonZeroOid::try_from(oid).map_err(|_| OidParseError::Zero)
    }
}

impl TryFrom<git2::Oid> for NonZeroOid {
    type Error = ();

    fn try_from(oid: git2::Oid) -> Result<Self, Self::Error> {
        if oid.is_zero() {
            Err(())
        } else {
            Ok(NonZeroOid { inner: oid })
        }
    }
}

impl From<NonZeroOid> for git2::Oid {
    fn from(oid: NonZeroOid) -> Self {
        oid.inner
    }
}

/// Convert a `git2::Oid` into a `NonZeroOid`, panicking if it's the zero OID.
/// Used at call sites where the zero OID is known to be impossible (e.g. the
/// OID of a just-created object).
pub fn make_non_zero_oid(oid: git2::Oid) -> NonZeroOid {
    NonZeroOid::try_from(oid).expect("object ID was unexpectedly the zero OID")
}

/// An OID which may be the all-zeros OID, meaning "no object".
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum MaybeZeroOid {
    /// The all-zeros OID.
    Zero,
    /// A non-zero OID.
    NonZero(NonZeroOid),
}

impl fmt::Debug for MaybeZeroOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for MaybeZeroOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaybeZeroOid::Zero => write!(f, "{}", git2::Oid::zero()),
            MaybeZeroOid::NonZero(oid) => write!(f, "{oid}"),
        }
    }
}

impl From<git2::Oid> for MaybeZeroOid {
    fn from(oid: git2::Oid) -> Self {
        match NonZeroOid::try_from(oid) {
            Ok(oid) => MaybeZeroOid::NonZero(oid),
            Err(()) => MaybeZeroOid::Zero,
        }
    }
}

impl From<NonZeroOid> for MaybeZeroOid {
    fn from(oid: NonZeroOid) -> Self {
        MaybeZeroOid::NonZero(oid)
    }
}

impl From<MaybeZeroOid> for git2::Oid {
    fn from(oid: MaybeZeroOid) -> Self {
        match oid {
            MaybeZeroOid::Zero => git2::Oid::zero(),
            MaybeZeroOid::NonZero(oid) => oid.inner,
        }
    }
}

#[derive(Debug, Error)]
pub enum MaybeZeroOidParseError {
    #[error("could not parse OID: {0}")]
    Git(#[from] git2::Error),
}

impl FromStr for MaybeZeroOid {
    type Err = MaybeZeroOidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let oid = git2::Oid::from_str(s)?;
        Ok(MaybeZeroOid::from(oid))
    }
}

impl TryFrom<MaybeZeroOid> for NonZeroOid {
    type Error = ();

    fn try_from(oid: MaybeZeroOid) -> Result<Self, Self::Error> {
        match oid {
            MaybeZeroOid::Zero => Err(()),
            MaybeZeroOid::NonZero(oid) => Ok(oid),
        }
    }
}
