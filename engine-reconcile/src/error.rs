use thiserror::Error;

use engine_machine::TransitionError;
use engine_session::SessionError;
use engine_vcs::VcsError;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
