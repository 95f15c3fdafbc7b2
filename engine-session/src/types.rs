use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use engine_context::DetachedWorktree;
use engine_machine::{RebaseIntent, RebaseState};

/// The persisted shape of a live or paused rebase plan. Created when the
/// planner confirms an intent, updated by the state machine on every
/// transition, deleted on completion, cancellation, or reconciliation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub intent: RebaseIntent,
    pub state: RebaseState,
    /// The branch the user was on when the plan was installed; restored once
    /// execution finishes.
    pub original_branch: String,
    /// Sibling worktrees this plan detached to free branches it needs.
    pub auto_detached_worktrees: Vec<DetachedWorktree>,
    /// The working directory a paused conflict lives in, recorded while the
    /// session is paused so the conflict can be found and continued after a
    /// process restart.
    pub execution_path: Option<PathBuf>,
    /// Monotonic counter incremented on every update; the only authoritative
    /// ordering readers may rely on.
    pub version: u64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl StoredSession {
    pub fn new(
        intent: RebaseIntent,
        state: RebaseState,
        original_branch: String,
        now_ms: i64,
    ) -> Self {
        Self {
            intent,
            state,
            original_branch,
            auto_detached_worktrees: Vec::new(),
            execution_path: None,
            version: 0,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }
}
