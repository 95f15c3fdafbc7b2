//! Execution-context allocation: auxiliary working directories a rebase job
//! runs in, and automatic sibling-worktree detachment so a branch needed by
//! the plan can be claimed.

pub mod error;
pub mod pool;
pub mod service;
pub mod types;

pub use error::{ContextError, ContextResult};
pub use service::ContextService;
pub use types::{now_ms, DetachedWorktree, ExecutionContext};
