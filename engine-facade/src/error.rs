use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use engine_context::ContextError;
use engine_exec::ExecError;
use engine_machine::TransitionError;
use engine_reconcile::ReconcileError;
use engine_session::SessionError;
use engine_txlog::TxLogError;
use engine_validate::ValidationError;
use engine_vcs::VcsError;

/// The closed error-code vocabulary the host serializes over its transport,
/// kept round-trippable through `Display`/`FromStr` so it survives the
/// boundary unscathed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RebaseErrorCode {
    WorktreeCreationFailed,
    RebaseInProgress,
    GitAdapterUnsupported,
    ValidationFailed,
    SessionExists,
    BranchNotFound,
    ContextAcquisitionFailed,
    DirtyWorktree,
    Timeout,
    IndexLocked,
    Generic,
}

impl fmt::Display for RebaseErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::WorktreeCreationFailed => "WORKTREE_CREATION_FAILED",
            Self::RebaseInProgress => "REBASE_IN_PROGRESS",
            Self::GitAdapterUnsupported => "GIT_ADAPTER_UNSUPPORTED",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::SessionExists => "SESSION_EXISTS",
            Self::BranchNotFound => "BRANCH_NOT_FOUND",
            Self::ContextAcquisitionFailed => "CONTEXT_ACQUISITION_FAILED",
            Self::DirtyWorktree => "DIRTY_WORKTREE",
            Self::Timeout => "TIMEOUT",
            Self::IndexLocked => "INDEX_LOCKED",
            Self::Generic => "GENERIC",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unrecognised rebase error code: {0}")]
pub struct UnknownRebaseErrorCode(pub String);

impl FromStr for RebaseErrorCode {
    type Err = UnknownRebaseErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "WORKTREE_CREATION_FAILED" => Self::WorktreeCreationFailed,
            "REBASE_IN_PROGRESS" => Self::RebaseInProgress,
            "GIT_ADAPTER_UNSUPPORTED" => Self::GitAdapterUnsupported,
            "VALIDATION_FAILED" => Self::ValidationFailed,
            "SESSION_EXISTS" => Self::SessionExists,
            "BRANCH_NOT_FOUND" => Self::BranchNotFound,
            "CONTEXT_ACQUISITION_FAILED" => Self::ContextAcquisitionFailed,
            "DIRTY_WORKTREE" => Self::DirtyWorktree,
            "TIMEOUT" => Self::Timeout,
            "INDEX_LOCKED" => Self::IndexLocked,
            "GENERIC" => Self::Generic,
            other => return Err(UnknownRebaseErrorCode(other.to_string())),
        })
    }
}

#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct RebaseError {
    pub code: RebaseErrorCode,
    pub message: String,
}

impl RebaseError {
    pub fn new(code: RebaseErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

pub type RebaseResult<T> = Result<T, RebaseError>;

impl From<ValidationError> for RebaseError {
    fn from(err: ValidationError) -> Self {
        let code = match &err {
            ValidationError::TrunkProtected(_) => RebaseErrorCode::ValidationFailed,
            ValidationError::DirtyWorkingTree { .. } => RebaseErrorCode::DirtyWorktree,
            ValidationError::RebaseInProgress { .. } => RebaseErrorCode::RebaseInProgress,
            ValidationError::WorktreeConflictDirty { .. } => RebaseErrorCode::DirtyWorktree,
            ValidationError::AncestryMismatch { .. } => RebaseErrorCode::ValidationFailed,
        };
        Self::new(code, err.to_string())
    }
}

impl From<ContextError> for RebaseError {
    fn from(err: ContextError) -> Self {
        let code = match &err {
            ContextError::WorktreeCreationFailed(_) => RebaseErrorCode::WorktreeCreationFailed,
            ContextError::WorktreeDirty { .. } => RebaseErrorCode::DirtyWorktree,
            ContextError::NotFound(_) => RebaseErrorCode::ContextAcquisitionFailed,
            ContextError::Vcs(_) => RebaseErrorCode::Generic,
        };
        Self::new(code, err.to_string())
    }
}

impl From<VcsError> for RebaseError {
    fn from(err: VcsError) -> Self {
        let code = match &err {
            VcsError::Timeout { .. } => RebaseErrorCode::Timeout,
            VcsError::IndexLocked { .. } => RebaseErrorCode::IndexLocked,
            VcsError::UnresolvableRef { .. } => RebaseErrorCode::BranchNotFound,
            VcsError::DirtyWorktree { .. } => RebaseErrorCode::DirtyWorktree,
            VcsError::RebaseInProgress { .. } => RebaseErrorCode::RebaseInProgress,
            _ => RebaseErrorCode::Generic,
        };
        Self::new(code, err.to_string())
    }
}

impl From<SessionError> for RebaseError {
    fn from(err: SessionError) -> Self {
        Self::new(RebaseErrorCode::Generic, err.to_string())
    }
}

impl From<TxLogError> for RebaseError {
    fn from(err: TxLogError) -> Self {
        Self::new(RebaseErrorCode::Generic, err.to_string())
    }
}

impl From<TransitionError> for RebaseError {
    fn from(err: TransitionError) -> Self {
        Self::new(RebaseErrorCode::Generic, err.to_string())
    }
}

impl From<ReconcileError> for RebaseError {
    fn from(err: ReconcileError) -> Self {
        Self::new(RebaseErrorCode::Generic, err.to_string())
    }
}

impl From<ExecError> for RebaseError {
    fn from(err: ExecError) -> Self {
        let code = match &err {
            ExecError::Vcs(VcsError::Timeout { .. }) => RebaseErrorCode::Timeout,
            ExecError::Vcs(VcsError::IndexLocked { .. }) => RebaseErrorCode::IndexLocked,
            ExecError::Vcs(VcsError::UnresolvableRef { .. }) => RebaseErrorCode::BranchNotFound,
            ExecError::Vcs(_) => RebaseErrorCode::Generic,
            ExecError::Context(ContextError::WorktreeCreationFailed(_)) => {
                RebaseErrorCode::WorktreeCreationFailed
            }
            ExecError::Context(ContextError::WorktreeDirty { .. }) => RebaseErrorCode::DirtyWorktree,
            ExecError::Context(_) => RebaseErrorCode::ContextAcquisitionFailed,
            ExecError::Validation(ValidationError::DirtyWorkingTree { .. })
            | ExecError::Validation(ValidationError::WorktreeConflictDirty { .. }) => {
                RebaseErrorCode::DirtyWorktree
            }
            ExecError::Validation(ValidationError::RebaseInProgress { .. }) => {
                RebaseErrorCode::RebaseInProgress
            }
            ExecError::Validation(_) => RebaseErrorCode::ValidationFailed,
            ExecError::Transition(_)
            | ExecError::Session(_)
            | ExecError::TxLog(_)
            | ExecError::NoSession
            | ExecError::NoContext
            | ExecError::NothingToResume => RebaseErrorCode::Generic,
        };
        Self::new(code, err.to_string())
    }
}
