//! Data exchanged across the VCS adapter boundary.
//!
//! These mirror what a repository-model builder would hand the planner: thin,
//! serializable snapshots rather than live handles into a particular VCS
//! library.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A 40-character hex object id. Kept as a newtype (rather than a bare
/// `String`) so that "empty sha" and "unresolved ref" can't be silently
/// confused with a real object id at the type level.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sha(pub String);

impl Sha {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Sha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Sha {
    fn from(value: String) -> Self {
        Sha(value)
    }
}

impl From<&str> for Sha {
    fn from(value: &str) -> Self {
        Sha(value.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: Sha,
    pub message: String,
    pub time_ms: i64,
    pub parent_sha: Option<Sha>,
    pub children_sha: Vec<Sha>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub ref_name: String,
    pub head_sha: Sha,
    pub is_trunk: bool,
    pub is_remote: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingTreeStatus {
    pub staged: Vec<String>,
    pub modified: Vec<String>,
    pub created: Vec<String>,
    pub deleted: Vec<String>,
    pub renamed: Vec<String>,
    pub not_added: Vec<String>,
    pub conflicted: Vec<String>,
    pub current_branch: Option<String>,
    pub current_commit_sha: Option<Sha>,
    pub tracking: Option<String>,
    pub detached: bool,
    pub is_rebasing: bool,
}

impl WorkingTreeStatus {
    /// All paths that would make the working directory "dirty" for the
    /// purposes of the cleanliness validator.
    pub fn all_changed_files(&self) -> Vec<&str> {
        self.staged
            .iter()
            .chain(self.modified.iter())
            .chain(self.created.iter())
            .chain(self.deleted.iter())
            .chain(self.renamed.iter())
            .chain(self.not_added.iter())
            .chain(self.conflicted.iter())
            .map(String::as_str)
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.all_changed_files().is_empty() && !self.is_rebasing
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worktree {
    pub path: String,
    pub head_sha: Sha,
    pub branch: Option<String>,
    pub is_main: bool,
    pub is_stale: bool,
    pub is_dirty: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Remote {
    pub name: String,
    pub url: String,
}

/// Checkout semantics: `force` discards local changes, `detach` moves HEAD
/// off any branch, `create` makes the branch first.
#[derive(Clone, Copy, Debug, Default)]
pub struct CheckoutOptions {
    pub force: bool,
    pub detach: bool,
    pub create: bool,
}

#[derive(Clone, Copy, Debug)]
pub enum ResetMode {
    Soft,
    Mixed,
    Hard,
}

/// Outcome of a `rebase`/`rebase_continue`/`rebase_skip` call: either a
/// clean completion or the set of conflicted paths the tool stopped on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RebaseOutcome {
    pub success: bool,
    pub conflicts: Vec<String>,
    pub current_commit: Option<Sha>,
}

impl RebaseOutcome {
    pub fn ok(current_commit: Sha) -> Self {
        Self {
            success: true,
            conflicts: Vec::new(),
            current_commit: Some(current_commit),
        }
    }

    pub fn conflicted(conflicts: Vec<String>, current_commit: Option<Sha>) -> Self {
        Self {
            success: false,
            conflicts,
            current_commit,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RebaseStateInfo {
    pub branch: String,
    pub onto: Sha,
    pub original_head: Sha,
    pub current_step: usize,
    pub total_steps: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchApplyOutcome {
    pub success: bool,
    pub conflicts: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushForce {
    None,
    Force,
    /// Force-with-lease: the push succeeds only if the remote tip is
    /// `expect`, so a branch someone else moved concurrently is never
    /// overwritten.
    ForceWithLease { expect: Sha },
}

/// Default adapter-call timeout for operations that may hang waiting on an
/// external process (e.g. `rebase --continue` blocked on an editor).
pub const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(20);
