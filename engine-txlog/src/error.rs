use thiserror::Error;

#[derive(Debug, Error)]
pub enum TxLogError {
    #[error("failed to write transaction log")]
    Io(#[from] std::io::Error),

    #[error("failed to persist transaction log")]
    Persist(#[from] tempfile::PersistError),

    #[error("failed to serialize intent")]
    Serde(#[from] serde_json::Error),
}

pub type TxResult<T> = Result<T, TxLogError>;
