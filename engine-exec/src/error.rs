use thiserror::Error;

use engine_context::ContextError;
use engine_machine::TransitionError;
use engine_session::SessionError;
use engine_txlog::TxLogError;
use engine_validate::ValidationError;
use engine_vcs::VcsError;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    TxLog(#[from] TxLogError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("no session recorded for this repository")]
    NoSession,

    #[error("no execution context recorded for this repository")]
    NoContext,

    #[error("no queued job to resume")]
    NothingToResume,
}

pub type ExecResult<T> = Result<T, ExecError>;
