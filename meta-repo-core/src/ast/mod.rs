//! The Repo-AST value model: a purely-functional, deterministic
//! representation of a repository (commits as a DAG, branches, remotes,
//! index, workdir, open submodules, sequencer state).

mod types;

pub use types::{
    Branch, Change, Commit, CommitId, CommitOptions, CommitOverrides, CommitRelation, Content,
    FileStatus, Rebase, RepoAST, RepoASTOverrides, Remote, RepoStatus, SequencerKind,
    SequencerState, Submodule, SubmoduleObservation, SubmoduleState,
};
