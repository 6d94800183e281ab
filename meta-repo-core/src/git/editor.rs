//! The editor-invocation capability.
//!
//! The core never decides *when* to invoke an editor (that's a front-end
//! concern), but it does own the single "write initial contents to a file,
//! spawn the editor, read the contents back" call so that front-ends and
//! tests can share one implementation, and so that tests can substitute a
//! fake editor.

use std::fs;
use std::path::Path;
use std::process::Command;

use thiserror::Error;
use tracing::instrument;

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not determine an editor command (set `meta.editor`, `core.editor`, or $EDITOR)")]
    NoEditorConfigured,

    #[error("could not write editor contents to {path}: {source}")]
    WriteContents {
        source: std::io::Error,
        path: std::path::PathBuf,
    },

    #[error("could not spawn editor `{command}`: {source}")]
    SpawnEditor {
        source: std::io::Error,
        command: String,
    },

    #[error("editor `{command}` exited with failure")]
    EditorFailed { command: String },

    #[error("could not read back editor contents from {path}: {source}")]
    ReadContents {
        source: std::io::Error,
        path: std::path::PathBuf,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Resolve the editor command to use: `meta.editor`, falling back to
/// `core.editor`, falling back to `$EDITOR`.
pub fn resolve_editor_command(
    meta_editor: Option<&str>,
    core_editor: Option<&str>,
    env_editor: Option<&str>,
) -> Option<String> {
    meta_editor
        .or(core_editor)
        .or(env_editor)
        .map(|s| s.to_owned())
}

/// A capability to invoke the user's editor. Implementors can substitute a
/// no-op or scripted editor for tests.
pub trait EditorInvoker {
    /// Write `initial_contents` to `path`, spawn the editor on `path`, and
    /// return what was read back.
    fn edit(&self, path: &Path, initial_contents: &str) -> Result<String>;
}

/// An `EditorInvoker` that spawns a real subprocess.
#[derive(Debug, Clone)]
pub struct ProcessEditorInvoker {
    /// The shell command to run, with `path` appended as the final argument.
    pub command: String,
}

impl EditorInvoker for ProcessEditorInvoker {
    #[instrument(skip(self))]
    fn edit(&self, path: &Path, initial_contents: &str) -> Result<String> {
        fs::write(path, initial_contents).map_err(|source| Error::WriteContents {
            source,
            path: path.to_owned(),
        })?;

        let mut parts = self.command.split_whitespace();
        let program = parts.next().ok_or(Error::NoEditorConfigured)?;
        let status = Command::new(program)
            .args(parts)
            .arg(path)
            .status()
            .map_err(|source| Error::SpawnEditor {
                source,
                command: self.command.clone(),
            })?;
        if !status.success() {
            return Err(Error::EditorFailed {
                command: self.command.clone(),
            });
        }

        fs::read_to_string(path).map_err(|source| Error::ReadContents {
            source,
            path: path.to_owned(),
        })
    }
}

/// A fake `EditorInvoker` for tests: returns fixed contents without touching
/// the filesystem further than writing the initial contents.
#[derive(Debug, Clone)]
pub struct FakeEditorInvoker {
    /// The contents to return, as though the user had edited the file.
    pub result: String,
}

impl EditorInvoker for FakeEditorInvoker {
    fn edit(&self, path: &Path, initial_contents: &str) -> Result<String> {
        fs::write(path, initial_contents).map_err(|source| Error::WriteContents {
            source,
            path: path.to_owned(),
        })?;
        Ok(self.result.clone())
    }
}
