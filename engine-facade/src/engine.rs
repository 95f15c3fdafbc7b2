//! The operation facade: the operations the UI layer consumes, wiring the
//! planner, executor, reconciler and validators into discriminated,
//! non-leaking results.

use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{instrument, warn};

use engine_context::{ContextService, DetachedWorktree};
use engine_exec::{ExecuteOutcome, RebaseExecutor};
use engine_machine::{IdGenerator, RebasePlan};
use engine_plan::{PlanInput, RebasePlanner, RepoModel};
use engine_reconcile::reconcile;
use engine_session::{normalize_key, SessionStore};
use engine_txlog::{RecoveryAction, TransactionLog, DEFAULT_INTENT_TTL_MS};
use engine_validate::{
    classify_worktree_conflicts, validate_ancestry, validate_clean, validate_not_trunk,
    WorktreeConflictKind,
};
use engine_vcs::VcsAdapter;

use crate::error::{RebaseError, RebaseErrorCode, RebaseResult};
use crate::types::{conflicts_of, progress_of, RebasePreview, RebaseStatusUi, RunOutcome, SubmitOutcome};

pub struct RepoEngine<'a> {
    adapter: &'a dyn VcsAdapter,
    sessions: SessionStore,
    txlog: TransactionLog,
    contexts: ContextService,
    ids: Box<dyn IdGenerator + Send + Sync>,
    trunk_names: Vec<String>,
    repo_path: PathBuf,
    repo_key: String,
    pending: Mutex<Option<RebasePlan>>,
}

impl<'a> RepoEngine<'a> {
    pub fn new(
        adapter: &'a dyn VcsAdapter,
        sessions: SessionStore,
        txlog: TransactionLog,
        contexts: ContextService,
        ids: Box<dyn IdGenerator + Send + Sync>,
        trunk_names: Vec<String>,
        repo_path: PathBuf,
    ) -> Self {
        let repo_key = normalize_key(&repo_path);
        Self {
            adapter,
            sessions,
            txlog,
            contexts,
            ids,
            trunk_names,
            repo_path,
            repo_key,
            pending: Mutex::new(None),
        }
    }

    fn executor(&self) -> RebaseExecutor<'_> {
        RebaseExecutor {
            adapter: self.adapter,
            sessions: &self.sessions,
            txlog: &self.txlog,
            contexts: &self.contexts,
            ids: self.ids.as_ref(),
            trunk_names: self.trunk_names.clone(),
            repo_path: self.repo_path.clone(),
            repo_key: self.repo_key.clone(),
        }
    }

    /// Builds a preview plan from `model` without persisting a session.
    /// `model` is supplied by the caller's stack-topology builder; how a
    /// host discovers what is stacked on what is outside this crate's
    /// scope.
    #[instrument(skip(self, model))]
    pub fn submit_rebase_intent(
        &self,
        model: &RepoModel,
        old_base_sha: &str,
        new_base_sha: &str,
        moving_branch: &str,
    ) -> RebaseResult<SubmitOutcome> {
        let input = PlanInput {
            moving_branch: moving_branch.to_string(),
            old_base_sha: old_base_sha.to_string(),
            new_base_sha: new_base_sha.to_string(),
        };
        // The preview plan's session timestamps are rewritten when the plan
        // is confirmed (StartPlan stamps the real start time), so the
        // planner's clock input here is irrelevant.
        let Some(plan) = RebasePlanner::plan(model, &input, self.ids.as_ref(), 0) else {
            return Ok(SubmitOutcome::NoOp);
        };

        let branches: Vec<String> = plan.intent.preorder().into_iter().map(|n| n.branch.clone()).collect();
        let worktrees = self.adapter.list_worktrees(&self.repo_path, false)?;
        let dirty: Vec<String> = classify_worktree_conflicts(&branches, &worktrees)
            .into_iter()
            .filter(|c| c.kind == WorktreeConflictKind::Dirty)
            .map(|c| c.branch)
            .collect();
        if !dirty.is_empty() {
            return Ok(SubmitOutcome::WorktreeConflict {
                message: format!("branches {} are checked out in dirty sibling worktrees", dirty.join(", ")),
                conflicts: dirty,
            });
        }

        let preview = RebasePreview {
            intent: plan.intent.clone(),
            branches,
        };
        *self.pending.lock().expect("poisoned pending-plan lock") = Some(plan);
        Ok(SubmitOutcome::Ok { preview })
    }

    #[instrument(skip(self))]
    pub fn confirm_rebase_intent(&self, now_ms: i64) -> RebaseResult<RunOutcome> {
        if self.sessions.get(&self.repo_key)?.is_some() {
            return Err(RebaseError::new(RebaseErrorCode::SessionExists, "a rebase session is already in progress"));
        }
        let plan = self
            .pending
            .lock()
            .expect("poisoned pending-plan lock")
            .take()
            .ok_or_else(|| RebaseError::new(RebaseErrorCode::ValidationFailed, "no pending rebase intent; call submit_rebase_intent first"))?;

        if !self.adapter.supports_force_with_lease() {
            return Err(RebaseError::new(RebaseErrorCode::GitAdapterUnsupported, "adapter does not support force-with-lease push"));
        }

        // Fatal validations run before anything is mutated or persisted, so
        // a refusal here leaves no session behind to clean up.
        for target in plan.intent.preorder() {
            validate_not_trunk(&target.branch, &self.trunk_names)?;
        }
        let status = self.adapter.working_tree_status(&self.repo_path)?;
        validate_clean(&self.repo_path.display().to_string(), &status)?;
        for target in &plan.intent.targets {
            validate_ancestry(self.adapter, &self.repo_path, target)?;
        }

        let mut detached = Vec::new();
        for target in plan.intent.preorder() {
            if let Some(record) = self.contexts.detect_and_detach(self.adapter, &self.repo_path, &target.branch)? {
                detached.push(record);
            }
        }

        let outcome = match self.executor().execute(plan.state, plan.intent, now_ms) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.restore_detached_best_effort(&detached);
                return Err(err.into());
            }
        };
        match &outcome {
            // The executor restores detached worktrees from the session on
            // completion, but this run's detachments were recorded here and
            // never made it into the session; restore them directly.
            ExecuteOutcome::Completed { .. } => self.restore_detached_best_effort(&detached),
            _ if !detached.is_empty() => {
                self.sessions.update(&self.repo_key, now_ms, |session| {
                    session.auto_detached_worktrees = detached.clone();
                })?;
            }
            _ => {}
        }
        self.run_outcome_of(outcome)
    }

    #[instrument(skip(self))]
    pub fn cancel_rebase_intent(&self, now_ms: i64) -> RebaseResult<RebaseStatusUi> {
        *self.pending.lock().expect("poisoned pending-plan lock") = None;
        if let Some(stored) = self.sessions.get(&self.repo_key)? {
            self.restore_detached_best_effort(&stored.auto_detached_worktrees);
            self.sessions.clear(&self.repo_key)?;
        }
        self.status_snapshot(now_ms)
    }

    #[instrument(skip(self))]
    pub fn continue_rebase(&self, now_ms: i64) -> RebaseResult<RunOutcome> {
        let outcome = self.executor().continue_(now_ms)?;
        self.run_outcome_of(outcome)
    }

    #[instrument(skip(self))]
    pub fn abort_rebase(&self, now_ms: i64) -> RebaseResult<RebaseStatusUi> {
        if self.sessions.get(&self.repo_key)?.is_none() {
            return self.status_snapshot(now_ms);
        }
        self.executor().abort(now_ms)?;
        self.status_snapshot(now_ms)
    }

    #[instrument(skip(self))]
    pub fn skip_rebase_commit(&self, now_ms: i64) -> RebaseResult<RunOutcome> {
        let outcome = self.executor().skip(now_ms)?;
        self.run_outcome_of(outcome)
    }

    #[instrument(skip(self))]
    pub fn get_rebase_status(&self, now_ms: i64) -> RebaseResult<RebaseStatusUi> {
        self.status_snapshot(now_ms)
    }

    #[instrument(skip(self))]
    pub fn resume_rebase_queue(&self, now_ms: i64) -> RebaseResult<RunOutcome> {
        let outcome = self.executor().resume_queue(now_ms)?;
        self.run_outcome_of(outcome)
    }

    #[instrument(skip(self))]
    pub fn dismiss_rebase_queue(&self, now_ms: i64) -> RebaseResult<RebaseStatusUi> {
        if let Some(stored) = self.sessions.get(&self.repo_key)? {
            self.restore_detached_best_effort(&stored.auto_detached_worktrees);
        }
        self.sessions.clear(&self.repo_key)?;
        self.txlog.clear()?;
        self.status_snapshot(now_ms)
    }

    fn status_snapshot(&self, now_ms: i64) -> RebaseResult<RebaseStatusUi> {
        let is_rebasing = self.adapter.get_rebase_state(&self.repo_path)?.is_some();
        // Intent-journal recovery runs before reconciliation: a stale failure
        // on disk takes the session with it, and an interrupted execute-job
        // intent is cleared so the external-completion path below can pick up
        // whatever the tool actually did.
        if self.txlog.recover(now_ms, DEFAULT_INTENT_TTL_MS, is_rebasing)?
            == RecoveryAction::ClearedFailed
        {
            self.sessions.clear(&self.repo_key)?;
        }
        reconcile(&self.sessions, self.adapter, &self.repo_path, &self.repo_key, self.ids.as_ref(), now_ms)?;
        let stored = self.sessions.get(&self.repo_key)?;
        Ok(match stored {
            Some(stored) => RebaseStatusUi {
                is_rebasing,
                has_session: true,
                conflicts: conflicts_of(&stored.state),
                progress: Some(progress_of(&stored.state)),
                state: Some(stored.state),
            },
            None => RebaseStatusUi {
                is_rebasing,
                has_session: false,
                conflicts: Vec::new(),
                progress: None,
                state: None,
            },
        })
    }

    fn run_outcome_of(&self, outcome: ExecuteOutcome) -> RebaseResult<RunOutcome> {
        let state_after = self.sessions.get(&self.repo_key).ok().flatten().map(|s| s.state);
        match outcome {
            ExecuteOutcome::Completed { .. } => Ok(RunOutcome::Ok {
                ui: RebaseStatusUi {
                    is_rebasing: false,
                    has_session: false,
                    conflicts: Vec::new(),
                    progress: None,
                    state: None,
                },
            }),
            ExecuteOutcome::Paused { conflicts, .. } => {
                let ui = RebaseStatusUi {
                    is_rebasing: true,
                    has_session: true,
                    conflicts: conflicts.clone(),
                    progress: state_after.as_ref().map(progress_of),
                    state: state_after,
                };
                Ok(RunOutcome::Conflict { ui, conflicts })
            }
            // The session (now marked failed) is kept on file so the user can
            // inspect and dismiss it; the error itself is raised.
            ExecuteOutcome::Failed { error } => {
                Err(RebaseError::new(RebaseErrorCode::Generic, error))
            }
        }
    }

    fn restore_detached_best_effort(&self, detached: &[DetachedWorktree]) {
        for record in detached {
            if let Err(err) = self.contexts.restore_detached(self.adapter, record) {
                warn!(error = %err, branch = %record.branch, "failed to restore detached worktree");
            }
        }
    }
}
