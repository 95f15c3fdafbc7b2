//! The data model the state machine operates over: jobs, the queue, the
//! session, and the declarative rebase intent tree. Kept free of any I/O or
//! VCS dependency so the transition function in [`crate::transition`] stays
//! a pure function over these types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub type JobId = String;
pub type BranchName = String;
pub type Sha = String;

/// One node of the declarative intent tree: move `branch` (and everything
/// rooted on it) from `old_base_sha` to `new_base_sha`. Children carry their
/// *original* parent relationship; `new_base_sha` is rewritten as ancestor
/// jobs complete.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetNode {
    pub branch: BranchName,
    pub old_base_sha: Sha,
    pub new_base_sha: Sha,
    pub head_sha: Sha,
    pub children: Vec<TargetNode>,
}

impl TargetNode {
    /// Pre-order traversal (parent before every descendant), matching the
    /// ordering `pendingJobIds` must preserve.
    pub fn preorder(&self) -> Vec<&TargetNode> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.preorder());
        }
        out
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebaseIntent {
    pub root: BranchName,
    pub targets: Vec<TargetNode>,
}

impl RebaseIntent {
    pub fn preorder(&self) -> Vec<&TargetNode> {
        self.targets.iter().flat_map(TargetNode::preorder).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub branch: BranchName,
    pub old_base_sha: Sha,
    pub new_base_sha: Sha,
    pub head_sha: Sha,
    pub status: JobStatus,
    pub rebased_head_sha: Option<Sha>,
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Files reported conflicted the last time this job paused, if any.
    pub conflicted_files: Vec<String>,
    /// Set on cancellation to distinguish "ancestor failed" from "aborted by
    /// user".
    pub cancel_reason: Option<String>,
}

impl Job {
    pub fn new(id: JobId, node: &TargetNode) -> Self {
        Self {
            id,
            branch: node.branch.clone(),
            old_base_sha: node.old_base_sha.clone(),
            new_base_sha: node.new_base_sha.clone(),
            head_sha: node.head_sha.clone(),
            status: JobStatus::Pending,
            rebased_head_sha: None,
            attempts: 0,
            last_error: None,
            conflicted_files: Vec::new(),
            cancel_reason: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Queue {
    pub active_job_id: Option<JobId>,
    pub pending_job_ids: Vec<JobId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Idle,
    Running,
    Paused,
    Completed,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub status: SessionStatus,
    pub started_at_ms: i64,
    pub ended_at_ms: Option<i64>,
    /// Populated on `job_failed`/`job_aborted` with the reason the plan
    /// stopped.
    pub failure_reason: Option<String>,
}

impl Session {
    pub fn idle(now_ms: i64) -> Self {
        Self {
            status: SessionStatus::Idle,
            started_at_ms: now_ms,
            ended_at_ms: None,
            failure_reason: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebaseState {
    pub jobs_by_id: HashMap<JobId, Job>,
    pub queue: Queue,
    pub session: Session,
}

impl RebaseState {
    pub fn active_job(&self) -> Option<&Job> {
        self.queue
            .active_job_id
            .as_ref()
            .and_then(|id| self.jobs_by_id.get(id))
    }

    pub fn is_complete(&self) -> bool {
        self.queue.active_job_id.is_none() && self.queue.pending_job_ids.is_empty()
    }

    /// Direct children of `job_id` in the original intent tree, found by
    /// matching `old_base_sha` against the completed job's recorded
    /// `head_sha` lineage: any job whose `new_base_sha` currently equals the
    /// completed job's pre-rebase `head_sha` is a direct child awaiting that
    /// rebase.
    pub fn direct_children_of<'a>(&'a self, job: &Job) -> Vec<&'a Job> {
        self.jobs_by_id
            .values()
            .filter(|candidate| candidate.old_base_sha == job.head_sha && candidate.id != job.id)
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebasePlan {
    pub intent: RebaseIntent,
    pub state: RebaseState,
}
