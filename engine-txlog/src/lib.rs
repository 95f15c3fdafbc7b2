//! The transaction log: a single atomically-replaced JSON file per
//! repository recording the intent to perform an operation before it
//! begins.

pub mod error;
pub mod log;
pub mod types;

pub use error::{TxLogError, TxResult};
pub use log::{RecoveryAction, TransactionLog, DEFAULT_INTENT_TTL_MS};
pub use types::{Intent, IntentStatus, IntentType};
