//! The reconciliation pass run before every status read: the recorded
//! session is diffed against the tool's observable rebase state rather than
//! trusted blindly, since the user may have driven the tool directly in a
//! terminal.

use std::path::Path;

use tracing::{info, instrument};

use engine_machine::{transition, Event, IdGenerator, RebasePlan};
use engine_session::SessionStore;
use engine_vcs::VcsAdapter;

use crate::error::ReconcileResult;
use crate::types::ReconcileOutcome;

#[instrument(skip(sessions, adapter, ids))]
pub fn reconcile(
    sessions: &SessionStore,
    adapter: &dyn VcsAdapter,
    repo_path: &Path,
    repo_key: &str,
    ids: &dyn IdGenerator,
    now_ms: i64,
) -> ReconcileResult<ReconcileOutcome> {
    let is_rebasing = adapter.get_rebase_state(repo_path)?.is_some();
    let Some(stored) = sessions.get(repo_key)? else {
        if is_rebasing {
            return Ok(ReconcileOutcome::OrphanedExternalRebase);
        }
        return Ok(ReconcileOutcome::Unchanged);
    };

    match stored.state.active_job() {
        Some(job) if !is_rebasing => {
            let job_id = job.id.clone();
            let branch = job.branch.clone();
            let new_head_sha = adapter.resolve_ref(repo_path, &branch)?.to_string();

            let plan = transition(
                &RebasePlan {
                    intent: stored.intent,
                    state: stored.state,
                },
                Event::ExternalCompletionDetected {
                    job_id: job_id.clone(),
                    new_head_sha: new_head_sha.clone(),
                },
                ids,
                now_ms,
            )?;
            sessions.update(repo_key, now_ms, |session| {
                session.state = plan.state.clone();
            })?;
            info!(repo = %repo_key, job = %job_id, "external completion detected");
            Ok(ReconcileOutcome::ExternalCompletion {
                job_id,
                new_head_sha,
            })
        }
        Some(_) => Ok(ReconcileOutcome::Unchanged),
        None => {
            if stored.state.queue.pending_job_ids.is_empty() && !is_rebasing {
                sessions.clear(repo_key)?;
                Ok(ReconcileOutcome::FullyDone)
            } else {
                Ok(ReconcileOutcome::Unchanged)
            }
        }
    }
}
