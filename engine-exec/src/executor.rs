//! The rebase executor: a single-threaded controller driving one job to
//! completion before the next. Not re-entrant per repository.

use std::path::PathBuf;

use tracing::{info, instrument, warn};

use engine_context::{ContextService, ExecutionContext};
use engine_machine::{
    transition, Event, IdGenerator, Job, JobStatus, RebaseIntent, RebasePlan, RebaseState,
    SessionStatus,
};
use engine_session::{SessionStore, StoredSession};
use engine_txlog::{IntentType, TransactionLog};
use engine_validate::validate_not_trunk;
use engine_vcs::{CheckoutOptions, PushForce, Sha, VcsAdapter};

use crate::error::{ExecError, ExecResult};
use crate::types::{ExecuteOutcome, PushOutcome};

enum Step {
    Continue(RebaseState),
    Return(ExecuteOutcome),
}

pub struct RebaseExecutor<'a> {
    pub adapter: &'a dyn VcsAdapter,
    pub sessions: &'a SessionStore,
    pub txlog: &'a TransactionLog,
    pub contexts: &'a ContextService,
    pub ids: &'a dyn IdGenerator,
    pub trunk_names: Vec<String>,
    pub repo_path: PathBuf,
    pub repo_key: String,
}

impl RebaseExecutor<'_> {
    #[instrument(skip(self, state, intent))]
    pub fn execute(
        &self,
        state: RebaseState,
        intent: RebaseIntent,
        now_ms: i64,
    ) -> ExecResult<ExecuteOutcome> {
        // A freshly planned state is idle with no active job; StartPlan
        // promotes the first pending job before the session is installed, so
        // the stored session never records a running plan with nothing
        // running.
        let state = if state.active_job().is_none() && !state.queue.pending_job_ids.is_empty() {
            transition(
                &RebasePlan {
                    intent: intent.clone(),
                    state,
                },
                Event::StartPlan,
                self.ids,
                now_ms,
            )?
            .state
        } else {
            state
        };

        let original_branch = self
            .adapter
            .current_branch(&self.repo_path)?
            .unwrap_or_else(|| intent.root.clone());
        let session = StoredSession::new(intent.clone(), state.clone(), original_branch, now_ms);
        self.sessions.create(&self.repo_key, session)?;
        self.drive(state, &intent, now_ms)
    }

    /// Resumes a paused plan: re-runs `rebase_continue` in the stored
    /// context, then falls back into the same job loop as fresh execution.
    #[instrument(skip(self))]
    pub fn continue_(&self, now_ms: i64) -> ExecResult<ExecuteOutcome> {
        let stored = self.sessions.get(&self.repo_key)?.ok_or(ExecError::NoSession)?;
        let context = self.stored_context(&stored).ok_or(ExecError::NoContext)?;
        let job = stored
            .state
            .active_job()
            .cloned()
            .ok_or(ExecError::NoSession)?;

        let outcome = self.adapter.rebase_continue(&context.execution_path)?;
        match self.apply_rebase_outcome(stored.state, &stored.intent, &job, outcome, &context, true, now_ms)? {
            Step::Continue(state) => self.drive(state, &stored.intent, now_ms),
            Step::Return(result) => Ok(result),
        }
    }

    /// Skips the conflicting commit entirely, otherwise identical to
    /// [`Self::continue_`].
    #[instrument(skip(self))]
    pub fn skip(&self, now_ms: i64) -> ExecResult<ExecuteOutcome> {
        let stored = self.sessions.get(&self.repo_key)?.ok_or(ExecError::NoSession)?;
        let context = self.stored_context(&stored).ok_or(ExecError::NoContext)?;
        let job = stored
            .state
            .active_job()
            .cloned()
            .ok_or(ExecError::NoSession)?;

        let outcome = self.adapter.rebase_skip(&context.execution_path)?;
        match self.apply_rebase_outcome(stored.state, &stored.intent, &job, outcome, &context, true, now_ms)? {
            Step::Continue(state) => self.drive(state, &stored.intent, now_ms),
            Step::Return(result) => Ok(result),
        }
    }

    /// Re-enters the job loop without consulting the adapter first: used
    /// after reconciliation appends descendant jobs behind a completed
    /// active job but leaves the session otherwise idle. Mirrors the queue
    /// half of `pop_next_job` in the state machine; duplicated narrowly
    /// here rather than widening that function's visibility for one caller.
    #[instrument(skip(self))]
    pub fn resume_queue(&self, now_ms: i64) -> ExecResult<ExecuteOutcome> {
        let stored = self.sessions.get(&self.repo_key)?.ok_or(ExecError::NoSession)?;
        if stored.state.session.status == SessionStatus::Paused {
            // A paused conflict resumes through the tool, not by replanning
            // the job from scratch.
            return self.continue_(now_ms);
        }
        let mut state = stored.state;
        if state.active_job().is_none() {
            match state.queue.pending_job_ids.first().cloned() {
                Some(next_id) => {
                    state.queue.pending_job_ids.remove(0);
                    if let Some(job) = state.jobs_by_id.get_mut(&next_id) {
                        job.status = JobStatus::Running;
                    }
                    state.queue.active_job_id = Some(next_id);
                    state.session.status = SessionStatus::Running;
                }
                None => return Err(ExecError::NothingToResume),
            }
        }
        self.drive(state, &stored.intent, now_ms)
    }

    /// Aborts the in-progress rebase, restores every auto-detached sibling
    /// worktree, releases the execution context, and clears the session.
    #[instrument(skip(self))]
    pub fn abort(&self, now_ms: i64) -> ExecResult<()> {
        let stored = self.sessions.get(&self.repo_key)?.ok_or(ExecError::NoSession)?;
        if let Some(context) = self.stored_context(&stored) {
            if self.adapter.get_rebase_state(&context.execution_path)?.is_some() {
                self.adapter.rebase_abort(&context.execution_path)?;
            }
            self.contexts.release(&context);
        }

        transition(
            &RebasePlan {
                intent: stored.intent,
                state: stored.state,
            },
            Event::JobAborted,
            self.ids,
            now_ms,
        )?;

        for detached in &stored.auto_detached_worktrees {
            if let Err(err) = self.contexts.restore_detached(self.adapter, detached) {
                warn!(error = %err, branch = %detached.branch, "failed to restore detached worktree on abort");
            }
        }
        self.restore_original_branch(&stored.original_branch);

        self.txlog.clear()?;
        self.sessions.clear(&self.repo_key)?;
        Ok(())
    }

    /// The context the paused rebase lives in: the in-process record if this
    /// process created it, otherwise rebuilt from the path persisted on the
    /// session (the process restarted since the pause). A rebuilt context is
    /// never marked for cleanup — the restarted process does not own the
    /// directory's lifetime.
    fn stored_context(&self, stored: &StoredSession) -> Option<ExecutionContext> {
        if let Some(context) = self.contexts.current(&self.repo_path) {
            return Some(context);
        }
        let execution_path = stored.execution_path.clone()?;
        Some(ExecutionContext {
            is_temporary: execution_path != self.repo_path,
            requires_cleanup: false,
            execution_path,
            created_at_ms: stored.updated_at_ms,
            operation: "rebase".to_string(),
            repo_path: self.repo_path.clone(),
        })
    }

    fn restore_original_branch(&self, original_branch: &str) {
        if let Err(err) =
            self.adapter
                .checkout(&self.repo_path, original_branch, CheckoutOptions::default())
        {
            warn!(error = %err, branch = %original_branch, "failed to restore original branch");
        }
    }

    fn drive(&self, mut state: RebaseState, intent: &RebaseIntent, now_ms: i64) -> ExecResult<ExecuteOutcome> {
        loop {
            let Some(job) = state.active_job().cloned() else {
                return self.finalize(intent);
            };

            if let Err(err) = validate_not_trunk(&job.branch, &self.trunk_names) {
                return self.fail(state, intent, &job, err.to_string(), now_ms);
            }
            if self.adapter.is_index_locked(&self.repo_path).unwrap_or(false) {
                return self.fail(state, intent, &job, "index locked".to_string(), now_ms);
            }

            let status = match self.adapter.working_tree_status(&self.repo_path) {
                Ok(status) => status,
                Err(err) => return self.fail(state, intent, &job, err.to_string(), now_ms),
            };
            let context = match self.contexts.acquire(
                self.adapter,
                &self.repo_path,
                "rebase",
                status.is_clean(),
                &job.old_base_sha,
            ) {
                Ok(context) => context,
                Err(err) => return self.fail(state, intent, &job, err.to_string(), now_ms),
            };

            let tx = self.txlog.write_intent(
                self.ids.next_id(),
                IntentType::ExecuteJob,
                Some(job.branch.clone()),
                now_ms,
            )?;
            let _tx = self.txlog.mark_executing(tx, now_ms)?;

            let rebase_result = self
                .adapter
                .checkout(&context.execution_path, &job.branch, CheckoutOptions::default())
                .and_then(|()| {
                    self.adapter.rebase(
                        &context.execution_path,
                        &Sha::from(job.new_base_sha.clone()),
                        &Sha::from(job.old_base_sha.clone()),
                        &job.branch,
                    )
                });

            let outcome = match rebase_result {
                Ok(outcome) => outcome,
                Err(err) => {
                    self.contexts.release(&context);
                    return self.fail(state, intent, &job, err.to_string(), now_ms);
                }
            };

            match self.apply_rebase_outcome(state, intent, &job, outcome, &context, false, now_ms)? {
                Step::Continue(next_state) => state = next_state,
                Step::Return(result) => return Ok(result),
            }
        }
    }

    fn apply_rebase_outcome(
        &self,
        state: RebaseState,
        intent: &RebaseIntent,
        job: &Job,
        outcome: engine_vcs::RebaseOutcome,
        context: &ExecutionContext,
        resumed: bool,
        now_ms: i64,
    ) -> ExecResult<Step> {
        if outcome.success {
            let new_head = self
                .adapter
                .resolve_ref(&context.execution_path, &job.branch)?
                .to_string();
            let event = if resumed {
                Event::JobResumed {
                    job_id: job.id.clone(),
                    rebased_head_sha: new_head,
                }
            } else {
                Event::JobSucceeded {
                    job_id: job.id.clone(),
                    rebased_head_sha: new_head,
                }
            };
            let plan = transition(
                &RebasePlan {
                    intent: intent.clone(),
                    state,
                },
                event,
                self.ids,
                now_ms,
            )?;
            self.sessions.update(&self.repo_key, now_ms, |session| {
                session.state = plan.state.clone();
                session.execution_path = None;
            })?;
            self.txlog.clear()?;
            self.contexts.release(context);
            Ok(Step::Continue(plan.state))
        } else {
            let plan = transition(
                &RebasePlan {
                    intent: intent.clone(),
                    state,
                },
                Event::JobConflicted {
                    job_id: job.id.clone(),
                    conflicted_files: outcome.conflicts.clone(),
                },
                self.ids,
                now_ms,
            )?;
            // The paused path is persisted alongside the state so the
            // conflict can be found again after a process restart.
            self.sessions.update(&self.repo_key, now_ms, |session| {
                session.state = plan.state.clone();
                session.execution_path = Some(context.execution_path.clone());
            })?;
            Ok(Step::Return(ExecuteOutcome::Paused {
                conflicts: outcome.conflicts,
                execution_path: context.execution_path.clone(),
            }))
        }
    }

    fn fail(
        &self,
        state: RebaseState,
        intent: &RebaseIntent,
        job: &Job,
        error: String,
        now_ms: i64,
    ) -> ExecResult<ExecuteOutcome> {
        let plan = transition(
            &RebasePlan {
                intent: intent.clone(),
                state,
            },
            Event::JobFailed {
                job_id: job.id.clone(),
                error: error.clone(),
            },
            self.ids,
            now_ms,
        )?;
        self.persist_state(&plan.state, now_ms)?;
        if let Some(intent_record) = self.txlog.read()? {
            self.txlog.mark_failed(intent_record, error.clone(), now_ms)?;
        }
        Ok(ExecuteOutcome::Failed { error })
    }

    fn finalize(&self, intent: &RebaseIntent) -> ExecResult<ExecuteOutcome> {
        self.txlog.clear()?;
        let pushed = self.push_all(intent);
        if let Some(stored) = self.sessions.get(&self.repo_key)? {
            for detached in &stored.auto_detached_worktrees {
                if let Err(err) = self.contexts.restore_detached(self.adapter, detached) {
                    warn!(error = %err, branch = %detached.branch, "failed to restore detached worktree on completion");
                }
            }
            self.restore_original_branch(&stored.original_branch);
        }
        self.sessions.clear(&self.repo_key)?;
        info!(repo = %self.repo_key, "rebase plan completed");
        Ok(ExecuteOutcome::Completed { pushed })
    }

    fn persist_state(&self, state: &RebaseState, now_ms: i64) -> ExecResult<()> {
        self.sessions.update(&self.repo_key, now_ms, |session| {
            session.state = state.clone();
        })?;
        Ok(())
    }

    /// Push every moved branch with force-with-lease, using the local
    /// pre-rebase SHA recorded on its target node as the expected remote
    /// tip; a stale-lease rejection is the correct failure mode if something
    /// else moved the remote branch concurrently. Push failures never revert
    /// the local rebase.
    fn push_all(&self, intent: &RebaseIntent) -> Vec<PushOutcome> {
        intent
            .preorder()
            .into_iter()
            .map(|target| {
                let result = self.adapter.push(
                    &self.repo_path,
                    "origin",
                    &target.branch,
                    PushForce::ForceWithLease {
                        expect: Sha::from(target.head_sha.clone()),
                    },
                    false,
                );
                match result {
                    Ok(()) => PushOutcome {
                        branch: target.branch.clone(),
                        pushed: true,
                        error: None,
                    },
                    Err(err) => PushOutcome {
                        branch: target.branch.clone(),
                        pushed: false,
                        error: Some(err.to_string()),
                    },
                }
            })
            .collect()
    }
}
