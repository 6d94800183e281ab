//! Splits shorthand text into its structural pieces, without interpreting
//! any of them. `parser` assigns meaning to what's produced here.

use super::{Error, Result};

/// One `name=shorthand` entry from a multi-repo string.
#[derive(Debug, PartialEq, Eq)]
pub struct RepoEntry<'a> {
    /// The repo's name within this multi-repo shorthand.
    pub name: &'a str,
    /// That repo's own (single-repo) shorthand.
    pub shorthand: &'a str,
}

/// Split a multi-repo shorthand string on top-level `|`, then each entry on
/// its first `=`, into a `name` / `shorthand` pair. A plain single-repo
/// shorthand (no `name=` prefix, no `|`) is returned as a single entry named
/// `""`.
pub fn split_multi_repo(input: &str) -> Result<Vec<RepoEntry<'_>>> {
    if input.is_empty() {
        return Err(Error::Empty);
    }
    input
        .split('|')
        .map(|entry| match entry.split_once('=') {
            Some((name, shorthand)) => Ok(RepoEntry { name, shorthand }),
            None => Err(Error::MissingRepoNameSeparator(entry.to_owned())),
        })
        .collect()
}

/// A single repo's shorthand, split into its base and its raw override
/// strings (still unparsed).
#[derive(Debug, PartialEq, Eq)]
pub struct SplitShorthand<'a> {
    /// The base specifier: `S`, `B`, or `C<url>`.
    pub base: &'a str,
    /// Each `;`-separated override, in textual order.
    pub overrides: Vec<&'a str>,
}

/// Split `base[:override(;override)*]` into its base and override pieces.
pub fn split_shorthand(input: &str) -> Result<SplitShorthand<'_>> {
    if input.is_empty() {
        return Err(Error::Empty);
    }
    match input.split_once(':') {
        None => Ok(SplitShorthand {
            base: input,
            overrides: Vec::new(),
        }),
        Some((base, rest)) => Ok(SplitShorthand {
            base,
            overrides: rest.split(';').filter(|s| !s.is_empty()).collect(),
        }),
    }
}

/// Split a `,`-separated list (used for the change list in a new-commit
/// override, and the rbranch list in a remote override).
pub fn split_list(input: &str) -> Vec<&str> {
    if input.is_empty() {
        Vec::new()
    } else {
        input.split(',').collect()
    }
}
