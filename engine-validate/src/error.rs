use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("branch {0} is protected as trunk and cannot be rebased")]
    TrunkProtected(String),

    #[error("working directory at {path} is not clean")]
    DirtyWorkingTree { path: String },

    #[error("a rebase is already in progress at {path}")]
    RebaseInProgress { path: String },

    #[error("branch {branch} is checked out in a dirty sibling worktree at {path}")]
    WorktreeConflictDirty { branch: String, path: String },

    #[error("branch {branch}'s recorded base {old_base_sha} is not an ancestor of its head {head_sha}; this is not a pure stack")]
    AncestryMismatch {
        branch: String,
        old_base_sha: String,
        head_sha: String,
    },
}

pub type ValidationResult<T> = Result<T, ValidationError>;
