//! Builds a `RebasePlan` from a `RepoModel` and a moving-branch intent: one
//! job per branch in the moving stack, parents queued ahead of their
//! descendants.

use std::collections::HashMap;

use engine_machine::{Job, Queue, RebaseIntent, RebasePlan, RebaseState, Session, TargetNode};

use crate::model::RepoModel;

/// What the caller wants moved: `moving_branch`'s stack onto `new_base_sha`,
/// which currently sits on `old_base_sha`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanInput {
    pub moving_branch: String,
    pub old_base_sha: String,
    pub new_base_sha: String,
}

pub struct RebasePlanner;

impl RebasePlanner {
    /// Returns `None` when the intent is rejected: the moving branch doesn't
    /// exist, the new base isn't a valid ref (empty sha), the move is a
    /// no-op (the branch has no commits beyond its current base), or the new
    /// base is itself a descendant of the moving branch (a cycle).
    pub fn plan(
        repo: &RepoModel,
        input: &PlanInput,
        ids: &dyn engine_machine::IdGenerator,
        now_ms: i64,
    ) -> Option<RebasePlan> {
        let moving = repo.branches.get(&input.moving_branch)?;

        if input.new_base_sha.is_empty() {
            return None;
        }
        if moving.head_sha == input.old_base_sha {
            return None;
        }
        let descendants = repo.descendants_of(&input.moving_branch);
        if descendants
            .iter()
            .filter_map(|name| repo.branches.get(name))
            .any(|info| info.head_sha == input.new_base_sha)
        {
            return None;
        }

        let root = build_node(
            repo,
            &input.moving_branch,
            input.old_base_sha.clone(),
            input.new_base_sha.clone(),
            moving.head_sha.clone(),
        );

        let intent = RebaseIntent {
            root: input.moving_branch.clone(),
            targets: vec![root],
        };

        let mut jobs_by_id = HashMap::new();
        let mut pending_job_ids = Vec::new();
        for target in intent.preorder() {
            let id = ids.next_id();
            jobs_by_id.insert(id.clone(), Job::new(id.clone(), target));
            pending_job_ids.push(id);
        }

        Some(RebasePlan {
            intent,
            state: RebaseState {
                jobs_by_id,
                queue: Queue {
                    active_job_id: None,
                    pending_job_ids,
                },
                session: Session::idle(now_ms),
            },
        })
    }
}

/// Builds one node and, recursively, its children. A child's `new_base_sha`
/// is seeded with its parent's *current* head as a placeholder; the state
/// machine overwrites it with the parent's actual rebased head once that
/// job completes.
fn build_node(
    repo: &RepoModel,
    branch: &str,
    old_base_sha: String,
    new_base_sha: String,
    head_sha: String,
) -> TargetNode {
    let mut child_names = repo.direct_children_of(branch);
    child_names.sort();

    let children = child_names
        .into_iter()
        .map(|child_name| {
            let child = &repo.branches[&child_name];
            build_node(
                repo,
                &child_name,
                head_sha.clone(),
                head_sha.clone(),
                child.head_sha.clone(),
            )
        })
        .collect();

    TargetNode {
        branch: branch.to_string(),
        old_base_sha,
        new_base_sha,
        head_sha,
        children,
    }
}
