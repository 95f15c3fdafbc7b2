use engine_machine::{RebaseIntent, RebaseState};

/// Non-leaking snapshot of plan progress for the UI layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RebasePreview {
    pub intent: RebaseIntent,
    pub branches: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RebaseStatusUi {
    pub is_rebasing: bool,
    pub has_session: bool,
    pub state: Option<RebaseState>,
    pub conflicts: Vec<String>,
    pub progress: Option<Progress>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    Ok { preview: RebasePreview },
    WorktreeConflict { conflicts: Vec<String>, message: String },
    NoOp,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Ok { ui: RebaseStatusUi },
    Conflict { ui: RebaseStatusUi, conflicts: Vec<String> },
}

pub(crate) fn progress_of(state: &RebaseState) -> Progress {
    let total = state.jobs_by_id.len();
    let completed = state
        .jobs_by_id
        .values()
        .filter(|j| j.status == engine_machine::JobStatus::Completed)
        .count();
    Progress { completed, total }
}

pub(crate) fn conflicts_of(state: &RebaseState) -> Vec<String> {
    state
        .active_job()
        .map(|job| job.conflicted_files.clone())
        .unwrap_or_default()
}
