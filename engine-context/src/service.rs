//! Execution-context allocation: which working directory a mutating rebase
//! step runs in, and the bookkeeping needed to restore any sibling worktree
//! that had to be detached to free a branch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::TempDir;
use tracing::{instrument, warn};

use engine_vcs::{CheckoutOptions, VcsAdapter};

use crate::error::{ContextError, ContextResult};
use crate::pool::{Resource, ResourcePool};
use crate::types::{now_ms, DetachedWorktree, ExecutionContext};

struct TempDirFactory;

impl Resource for TempDirFactory {
    type Output = TempDir;
    type Error = std::io::Error;

    fn try_create(&self) -> Result<Self::Output, Self::Error> {
        tempfile::Builder::new().prefix("engine-rebase-").tempdir()
    }
}

/// An acquired context plus, for temporary contexts, the directory it owns,
/// kept alive until [`ContextService::release`] tears it down. The record is
/// kept even when the main working directory is reused so that a conflict
/// paused there can still be found through [`ContextService::current`].
struct ActiveContext {
    dir: Option<TempDir>,
    record: ExecutionContext,
}

/// Allocates and releases the working directories rebase jobs execute in.
pub struct ContextService {
    pool: ResourcePool<TempDirFactory>,
    active: Mutex<HashMap<String, ActiveContext>>,
}

impl Default for ContextService {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextService {
    pub fn new() -> Self {
        Self {
            pool: ResourcePool::new(TempDirFactory),
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire a working directory for `operation` against `repo_path`.
    ///
    /// If `reuse_main` is true (the caller's active working directory is
    /// clean and not itself part of the plan), the main working directory is
    /// reused directly. Otherwise a fresh auxiliary directory is pooled,
    /// checked out to `required_base`, and marked temporary.
    #[instrument(skip(self, adapter), fields(repo = %repo_path.display(), %operation))]
    pub fn acquire(
        &self,
        adapter: &dyn VcsAdapter,
        repo_path: &Path,
        operation: &str,
        reuse_main: bool,
        required_base: &str,
    ) -> ContextResult<ExecutionContext> {
        let (dir, record) = if reuse_main {
            let record = ExecutionContext {
                execution_path: repo_path.to_path_buf(),
                is_temporary: false,
                requires_cleanup: false,
                created_at_ms: now_ms(),
                operation: operation.to_string(),
                repo_path: repo_path.to_path_buf(),
            };
            (None, record)
        } else {
            let handle = self
                .pool
                .try_create()
                .map_err(ContextError::WorktreeCreationFailed)?;
            let dir = handle.take();
            adapter.checkout(
                dir.path(),
                required_base,
                CheckoutOptions {
                    force: true,
                    detach: true,
                    create: false,
                },
            )?;
            let record = ExecutionContext {
                execution_path: dir.path().to_path_buf(),
                is_temporary: true,
                requires_cleanup: true,
                created_at_ms: now_ms(),
                operation: operation.to_string(),
                repo_path: repo_path.to_path_buf(),
            };
            (Some(dir), record)
        };

        let key = repo_key(repo_path);
        self.active.lock().expect("poisoned context map").insert(
            key,
            ActiveContext {
                dir,
                record: record.clone(),
            },
        );
        Ok(record)
    }

    /// Release a previously acquired context. Deletes the auxiliary
    /// directory best-effort for temporary contexts; a no-op for the main
    /// working directory, beyond forgetting the stored record.
    #[instrument(skip(self, context), fields(repo = %context.repo_path.display()))]
    pub fn release(&self, context: &ExecutionContext) {
        let key = repo_key(&context.repo_path);
        let Some(active) = self.active.lock().expect("poisoned context map").remove(&key) else {
            return;
        };
        if context.requires_cleanup {
            if let Some(dir) = active.dir {
                if let Err(err) = dir.close() {
                    warn!(error = %err, "failed to remove auxiliary working directory");
                }
            }
        }
    }

    /// The context currently recorded for `repo_path`, if any — lets a
    /// conflict paused in an auxiliary directory be found again after a
    /// process restart.
    pub fn current(&self, repo_path: &Path) -> Option<ExecutionContext> {
        self.active
            .lock()
            .expect("poisoned context map")
            .get(&repo_key(repo_path))
            .map(|active| active.record.clone())
    }

    /// If `branch` is checked out in a clean sibling worktree, detach that
    /// worktree's HEAD so the branch is free to move. Refuses (returns
    /// `WorktreeDirty`) if the sibling worktree has uncommitted changes.
    #[instrument(skip(self, adapter))]
    pub fn detect_and_detach(
        &self,
        adapter: &dyn VcsAdapter,
        repo_path: &Path,
        branch: &str,
    ) -> ContextResult<Option<DetachedWorktree>> {
        let worktrees = adapter.list_worktrees(repo_path, false)?;
        let Some(worktree) = worktrees
            .iter()
            .find(|w| !w.is_main && w.branch.as_deref() == Some(branch))
        else {
            return Ok(None);
        };

        if worktree.is_dirty {
            return Err(ContextError::WorktreeDirty {
                branch: branch.to_string(),
            });
        }

        let worktree_path = PathBuf::from(&worktree.path);
        adapter.checkout(
            &worktree_path,
            &worktree.head_sha.to_string(),
            CheckoutOptions {
                force: false,
                detach: true,
                create: false,
            },
        )?;

        Ok(Some(DetachedWorktree {
            worktree_path,
            branch: branch.to_string(),
        }))
    }

    /// Re-attach HEAD in a previously detached sibling worktree to its
    /// original branch, undoing [`Self::detect_and_detach`].
    #[instrument(skip(self, adapter))]
    pub fn restore_detached(
        &self,
        adapter: &dyn VcsAdapter,
        detached: &DetachedWorktree,
    ) -> ContextResult<()> {
        adapter.checkout(
            &detached.worktree_path,
            &detached.branch,
            CheckoutOptions::default(),
        )?;
        Ok(())
    }
}

fn repo_key(repo_path: &Path) -> String {
    repo_path.to_string_lossy().trim_end_matches(['/', '\\']).to_string()
}
