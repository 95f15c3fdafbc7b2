use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// The working directory a mutating operation runs in, and whether the
/// caller owns cleaning it up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub execution_path: PathBuf,
    pub is_temporary: bool,
    pub requires_cleanup: bool,
    pub created_at_ms: i64,
    pub operation: String,
    pub repo_path: PathBuf,
}

/// Records that a plan forcibly detached `branch` in `worktree_path` so the
/// branch could be claimed by the rebase. Used to restore the branch to that
/// worktree once the plan finishes, successfully or not.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachedWorktree {
    pub worktree_path: PathBuf,
    pub branch: String,
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
