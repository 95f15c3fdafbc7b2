use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a session already exists for {0}")]
    AlreadyExists(String),

    #[error("no session exists for {0}")]
    NotFound(String),

    #[error("job {job_id} not found in session for {key}")]
    JobNotFound { key: String, job_id: String },

    #[error("session store database error")]
    Db(#[from] rusqlite::Error),

    #[error("session payload was not valid JSON")]
    Serde(#[from] serde_json::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;
