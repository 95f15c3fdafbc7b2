use thiserror::Error;

use engine_vcs::error::VcsError;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("failed to create auxiliary working directory: {0}")]
    WorktreeCreationFailed(#[source] std::io::Error),

    #[error("sibling worktree for branch {branch} is dirty, refusing automatic detachment")]
    WorktreeDirty { branch: String },

    #[error("no active execution context recorded for {0}")]
    NotFound(String),

    #[error(transparent)]
    Vcs(#[from] VcsError),
}

pub type ContextResult<T> = Result<T, ContextError>;
