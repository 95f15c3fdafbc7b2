//! The narrow capability set the planner and executor are allowed to call.
//!
//! Every implementation provides every method; optional capabilities are
//! represented with explicit `supports_*` predicates rather than absent
//! methods, so callers probe with a boolean instead of reflection.

use std::collections::HashMap;
use std::path::Path;

use crate::error::VcsResult;
use crate::types::{
    Branch, CheckoutOptions, Commit, PatchApplyOutcome, PushForce, RebaseOutcome,
    RebaseStateInfo, Remote, ResetMode, Sha, WorkingTreeStatus, Worktree,
};

/// The abstract capability set the engine drives the version-control tool
/// through. Any implementation fulfilling this trait — a native library
/// binding, a subprocess wrapper, or an in-memory fake for tests — may be
/// swapped in.
pub trait VcsAdapter: Send + Sync {
    fn list_branches(&self, repo_path: &Path, remote_only: bool) -> VcsResult<Vec<Branch>>;

    fn list_remotes(&self, repo_path: &Path) -> VcsResult<Vec<Remote>>;

    /// Ordered with the main working directory first.
    fn list_worktrees(&self, repo_path: &Path, skip_dirty: bool) -> VcsResult<Vec<Worktree>>;

    fn log(
        &self,
        repo_path: &Path,
        reference: &str,
        depth: Option<usize>,
        max: Option<usize>,
    ) -> VcsResult<Vec<Commit>>;

    /// Returns an empty `Sha` rather than erroring when the ref can't be
    /// resolved.
    fn resolve_ref(&self, repo_path: &Path, reference: &str) -> VcsResult<Sha>;

    fn resolve_refs(&self, repo_path: &Path, refs: &[String]) -> VcsResult<HashMap<String, Sha>> {
        let mut out = HashMap::with_capacity(refs.len());
        for reference in refs {
            out.insert(reference.clone(), self.resolve_ref(repo_path, reference)?);
        }
        Ok(out)
    }

    fn current_branch(&self, repo_path: &Path) -> VcsResult<Option<String>>;

    fn working_tree_status(&self, repo_path: &Path) -> VcsResult<WorkingTreeStatus>;

    fn checkout(
        &self,
        repo_path: &Path,
        reference: &str,
        options: CheckoutOptions,
    ) -> VcsResult<()>;

    fn branch_create(&self, repo_path: &Path, name: &str, target: &Sha) -> VcsResult<()>;

    fn branch_delete(&self, repo_path: &Path, name: &str) -> VcsResult<()>;

    fn branch_rename(&self, repo_path: &Path, old_name: &str, new_name: &str) -> VcsResult<()>;

    fn reset(&self, repo_path: &Path, mode: ResetMode, reference: &str) -> VcsResult<()>;

    fn rebase(
        &self,
        repo_path: &Path,
        onto: &Sha,
        from: &Sha,
        to: &str,
    ) -> VcsResult<RebaseOutcome>;

    fn rebase_continue(&self, repo_path: &Path) -> VcsResult<RebaseOutcome>;

    fn rebase_abort(&self, repo_path: &Path) -> VcsResult<()>;

    fn rebase_skip(&self, repo_path: &Path) -> VcsResult<RebaseOutcome>;

    fn get_rebase_state(&self, repo_path: &Path) -> VcsResult<Option<RebaseStateInfo>>;

    fn merge_base(&self, repo_path: &Path, one: &str, two: &str) -> VcsResult<Option<Sha>>;

    fn is_ancestor(&self, repo_path: &Path, ancestor: &str, descendant: &str) -> VcsResult<bool>;

    fn format_patch(&self, repo_path: &Path, range: &str) -> VcsResult<Vec<u8>>;

    fn apply_patch(&self, repo_path: &Path, patch: &[u8]) -> VcsResult<PatchApplyOutcome>;

    fn push(
        &self,
        repo_path: &Path,
        remote: &str,
        reference: &str,
        force: PushForce,
        set_upstream: bool,
    ) -> VcsResult<()>;

    fn fetch(&self, repo_path: &Path, remote: &str) -> VcsResult<()>;

    /// Whether an `index.lock` file (or equivalent) is present, meaning a
    /// prior process crashed mid-operation. Checked before every mutating
    /// call so the engine fails fast instead of queueing behind a dead lock.
    fn is_index_locked(&self, repo_path: &Path) -> VcsResult<bool>;

    /// Capability probe: whether `push` supports `ForceWithLease` with an
    /// explicit expected-tip value. Every shipped adapter returns `true`;
    /// the predicate exists so a minimal fake adapter can opt out without
    /// needing to implement lease semantics.
    fn supports_force_with_lease(&self) -> bool {
        true
    }
}
