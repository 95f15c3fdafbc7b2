//! The session store: a write-through cache over an embedded sqlite durable
//! tier, holding one [`StoredSession`] per repository.

pub mod error;
pub mod store;
pub mod types;

pub use error::{SessionError, SessionResult};
pub use store::{normalize_key, SessionStore};
pub use types::StoredSession;
