use std::path::PathBuf;

use thiserror::Error;

/// Failure conditions callers need to tell apart, each with the context a
/// caller would act on (the path, the branch, the conflicting files).
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("working tree at {path} is dirty")]
    DirtyWorktree { path: PathBuf },

    #[error("branch {branch} is checked out in another working directory at {path}")]
    WorktreeConflict { branch: String, path: PathBuf },

    #[error("a rebase is already in progress at {path}")]
    RebaseInProgress { path: PathBuf },

    #[error("index lock present at {path}")]
    IndexLocked { path: PathBuf },

    #[error("conflict raised while rebasing {branch}: {conflicts:?}")]
    Conflict {
        branch: String,
        conflicts: Vec<String>,
    },

    #[error("push of {branch} to {remote} was rejected (non-fast-forward)")]
    NonFastForward { branch: String, remote: String },

    #[error("network error while contacting {remote}: {source}")]
    Network {
        remote: String,
        #[source]
        source: eyre::Error,
    },

    #[error("adapter operation {operation} timed out")]
    Timeout { operation: String },

    #[error("could not resolve ref {reference}")]
    UnresolvableRef { reference: String },

    #[error("git2 error: {0}")]
    Git2(#[from] git2::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type VcsResult<T> = Result<T, VcsError>;
