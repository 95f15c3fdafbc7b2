//! The pure `(state, event) -> state` transition function. No I/O, no VCS
//! adapter reference: every side effect the executor needs (persisting the
//! result, invoking the adapter) happens around calls to [`transition`],
//! never inside it.

use thiserror::Error;

use crate::model::{
    BranchName, Job, JobId, JobStatus, RebasePlan, RebaseState, Sha, SessionStatus, TargetNode,
};

/// Injected so tests can pin generated job ids.
pub trait IdGenerator {
    fn next_id(&self) -> String;
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("job {0} not found")]
    JobNotFound(JobId),

    #[error("event requires job {job_id} to be the active job, but {active_job_id:?} is active")]
    NotActiveJob {
        job_id: JobId,
        active_job_id: Option<JobId>,
    },

    #[error("event requires session status {expected:?}, but session is {actual:?}")]
    WrongSessionStatus {
        expected: SessionStatus,
        actual: SessionStatus,
    },

    #[error("no pending job to start")]
    NoPendingJob,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    StartPlan,
    JobSucceeded {
        job_id: JobId,
        rebased_head_sha: Sha,
    },
    JobConflicted {
        job_id: JobId,
        conflicted_files: Vec<String>,
    },
    JobResumed {
        job_id: JobId,
        rebased_head_sha: Sha,
    },
    JobFailed {
        job_id: JobId,
        error: String,
    },
    JobAborted,
    ExternalCompletionDetected {
        job_id: JobId,
        new_head_sha: Sha,
    },
    EnqueueDescendants {
        branch: BranchName,
        parent_new_head_sha: Sha,
    },
}

/// Apply `event` to `plan`, returning the resulting plan. `now_ms` supplies
/// the current time for `Session` timestamps (passed in rather than read
/// from the clock, so the function stays pure and testable).
pub fn transition(
    plan: &RebasePlan,
    event: Event,
    ids: &dyn IdGenerator,
    now_ms: i64,
) -> Result<RebasePlan, TransitionError> {
    let mut state = plan.state.clone();

    match event {
        Event::StartPlan => {
            state.session.status = SessionStatus::Running;
            state.session.started_at_ms = now_ms;
            pop_next_job(&mut state)?;
        }

        Event::JobSucceeded {
            job_id,
            rebased_head_sha,
        } => {
            require_active(&state, &job_id)?;
            require_job_status(&state, &job_id, JobStatus::Running)?;
            complete_job(&mut state, &job_id, rebased_head_sha, now_ms)?;
        }

        Event::JobResumed {
            job_id,
            rebased_head_sha,
        } => {
            require_active(&state, &job_id)?;
            if state.session.status != SessionStatus::Paused {
                return Err(TransitionError::WrongSessionStatus {
                    expected: SessionStatus::Paused,
                    actual: state.session.status,
                });
            }
            complete_job(&mut state, &job_id, rebased_head_sha, now_ms)?;
        }

        Event::JobConflicted {
            job_id,
            conflicted_files,
        } => {
            require_active(&state, &job_id)?;
            state.session.status = SessionStatus::Paused;
            if let Some(job) = state.jobs_by_id.get_mut(&job_id) {
                job.conflicted_files = conflicted_files;
            }
        }

        Event::JobFailed { job_id, error } => {
            require_active(&state, &job_id)?;
            if let Some(job) = state.jobs_by_id.get_mut(&job_id) {
                job.status = JobStatus::Failed;
                job.last_error = Some(error);
            }
            // A failed job blocks the whole cascade: every job still
            // pending, descendant or not, is cancelled rather than left
            // dangling in a plan whose session is now failed.
            for pending_id in std::mem::take(&mut state.queue.pending_job_ids) {
                if let Some(job) = state.jobs_by_id.get_mut(&pending_id) {
                    job.status = JobStatus::Cancelled;
                    job.cancel_reason = Some("ancestor failed".to_string());
                }
            }
            state.queue.active_job_id = None;
            state.session.status = SessionStatus::Failed;
            state.session.failure_reason = Some("ancestor failed".to_string());
            state.session.ended_at_ms = Some(now_ms);
        }

        Event::JobAborted => {
            if let Some(active_id) = state.queue.active_job_id.take() {
                if let Some(job) = state.jobs_by_id.get_mut(&active_id) {
                    job.status = JobStatus::Cancelled;
                    job.cancel_reason = Some("aborted by user".to_string());
                }
            }
            for pending_id in std::mem::take(&mut state.queue.pending_job_ids) {
                if let Some(job) = state.jobs_by_id.get_mut(&pending_id) {
                    job.status = JobStatus::Cancelled;
                    job.cancel_reason = Some("aborted by user".to_string());
                }
            }
            state.session.status = SessionStatus::Failed;
            state.session.failure_reason = Some("aborted by user".to_string());
            state.session.ended_at_ms = Some(now_ms);
        }

        Event::ExternalCompletionDetected {
            job_id,
            new_head_sha,
        } => {
            require_active(&state, &job_id)?;
            let branch = state
                .jobs_by_id
                .get(&job_id)
                .ok_or_else(|| TransitionError::JobNotFound(job_id.clone()))?
                .branch
                .clone();
            complete_job(&mut state, &job_id, new_head_sha.clone(), now_ms)?;
            if let Some(node) = find_node(&plan.intent.targets, &branch) {
                state = enqueue_descendants(state, node, &new_head_sha, ids);
            }
        }

        Event::EnqueueDescendants {
            branch,
            parent_new_head_sha,
        } => {
            if let Some(node) = find_node(&plan.intent.targets, &branch) {
                state = enqueue_descendants(state, node, &parent_new_head_sha, ids);
            }
        }
    }

    Ok(RebasePlan {
        intent: plan.intent.clone(),
        state,
    })
}

fn require_active(state: &RebaseState, job_id: &JobId) -> Result<(), TransitionError> {
    if state.queue.active_job_id.as_ref() != Some(job_id) {
        return Err(TransitionError::NotActiveJob {
            job_id: job_id.clone(),
            active_job_id: state.queue.active_job_id.clone(),
        });
    }
    Ok(())
}

fn require_job_status(
    state: &RebaseState,
    job_id: &JobId,
    expected: JobStatus,
) -> Result<(), TransitionError> {
    let job = state
        .jobs_by_id
        .get(job_id)
        .ok_or_else(|| TransitionError::JobNotFound(job_id.clone()))?;
    if job.status != expected {
        // Surfaced as a session-status mismatch rather than a bespoke
        // job-status error: completion events are preconditioned on being
        // the active job, and a non-running active job means the session as
        // a whole is out of step with the event stream.
        return Err(TransitionError::WrongSessionStatus {
            expected: SessionStatus::Running,
            actual: state.session.status,
        });
    }
    Ok(())
}

fn complete_job(
    state: &mut RebaseState,
    job_id: &JobId,
    rebased_head_sha: Sha,
    now_ms: i64,
) -> Result<(), TransitionError> {
    let completed = {
        let job = state
            .jobs_by_id
            .get_mut(job_id)
            .ok_or_else(|| TransitionError::JobNotFound(job_id.clone()))?;
        job.status = JobStatus::Completed;
        job.rebased_head_sha = Some(rebased_head_sha.clone());
        job.conflicted_files.clear();
        job.clone()
    };

    let child_ids: Vec<JobId> = state
        .direct_children_of(&completed)
        .into_iter()
        .filter(|j| j.status == JobStatus::Pending)
        .map(|j| j.id.clone())
        .collect();
    for child_id in child_ids {
        if let Some(child) = state.jobs_by_id.get_mut(&child_id) {
            child.new_base_sha = rebased_head_sha.clone();
        }
    }

    pop_next_job(state).or_else(|_| {
        state.queue.active_job_id = None;
        state.session.status = SessionStatus::Completed;
        state.session.ended_at_ms = Some(now_ms);
        Ok::<(), TransitionError>(())
    })
}

/// Pop the next pending job into `activeJobId`, setting it to `Running`. If
/// the queue is empty this returns `Err(NoPendingJob)`, which
/// [`complete_job`] treats as "the plan is done" rather than an error.
fn pop_next_job(state: &mut RebaseState) -> Result<(), TransitionError> {
    if state.queue.pending_job_ids.is_empty() {
        state.queue.active_job_id = None;
        return Err(TransitionError::NoPendingJob);
    }
    let next_id = state.queue.pending_job_ids.remove(0);
    if let Some(job) = state.jobs_by_id.get_mut(&next_id) {
        job.status = JobStatus::Running;
    }
    state.queue.active_job_id = Some(next_id);
    state.session.status = SessionStatus::Running;
    Ok(())
}

fn find_node<'a>(targets: &'a [TargetNode], branch: &str) -> Option<&'a TargetNode> {
    for target in targets {
        if target.branch == branch {
            return Some(target);
        }
        if let Some(found) = find_node(&target.children, branch) {
            return Some(found);
        }
    }
    None
}

fn enqueue_descendants(
    mut state: RebaseState,
    node: &TargetNode,
    parent_new_head_sha: &Sha,
    ids: &dyn IdGenerator,
) -> RebaseState {
    for child in &node.children {
        let already_present = state
            .jobs_by_id
            .values()
            .any(|job| job.branch == child.branch);
        if already_present {
            continue;
        }
        let mut child_node = child.clone();
        child_node.new_base_sha = parent_new_head_sha.clone();
        let job_id = ids.next_id();
        let job = Job::new(job_id.clone(), &child_node);
        state.jobs_by_id.insert(job_id.clone(), job);
        state.queue.pending_job_ids.push(job_id);
    }
    state
}
