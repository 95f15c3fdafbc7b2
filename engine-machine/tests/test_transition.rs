use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use engine_machine::{
    transition, Event, IdGenerator, Job, JobStatus, Queue, RebaseIntent, RebasePlan, RebaseState,
    Session, SessionStatus, TargetNode,
};

struct SeqIds(AtomicU64);

impl SeqIds {
    fn new() -> Self {
        Self(AtomicU64::new(0))
    }
}

impl IdGenerator for SeqIds {
    fn next_id(&self) -> String {
        format!("job-{}", self.0.fetch_add(1, Ordering::SeqCst))
    }
}

fn node(branch: &str, old_base: &str, new_base: &str, head: &str, children: Vec<TargetNode>) -> TargetNode {
    TargetNode {
        branch: branch.to_string(),
        old_base_sha: old_base.to_string(),
        new_base_sha: new_base.to_string(),
        head_sha: head.to_string(),
        children,
    }
}

fn plan_from_targets(targets: Vec<TargetNode>) -> RebasePlan {
    let intent = RebaseIntent {
        root: targets[0].branch.clone(),
        targets,
    };
    let mut jobs_by_id = HashMap::new();
    let mut pending_job_ids = Vec::new();
    for (i, target) in intent.preorder().into_iter().enumerate() {
        let id = format!("seed-{i}");
        jobs_by_id.insert(id.clone(), Job::new(id.clone(), target));
        pending_job_ids.push(id);
    }
    RebasePlan {
        intent,
        state: RebaseState {
            jobs_by_id,
            queue: Queue {
                active_job_id: None,
                pending_job_ids,
            },
            session: Session::idle(0),
        },
    }
}

/// Linear stack cascade: A -> B -> C complete in order, each child
/// rebased onto its parent's fresh head.
#[test]
fn linear_stack_cascade_completes_in_order() {
    let c = node("C", "b1", "b1", "c1", vec![]);
    let b = node("B", "a1", "a1", "b1", vec![c]);
    let a = node("A", "m0", "m1", "a1", vec![b]);
    let plan = plan_from_targets(vec![a]);
    let ids = SeqIds::new();

    let plan = transition(&plan, Event::StartPlan, &ids, 0).unwrap();
    assert_eq!(plan.state.session.status, SessionStatus::Running);
    let job_a = plan.state.active_job().unwrap().clone();
    assert_eq!(job_a.branch, "A");

    let plan = transition(
        &plan,
        Event::JobSucceeded {
            job_id: job_a.id.clone(),
            rebased_head_sha: "a1-new".to_string(),
        },
        &ids,
        1,
    )
    .unwrap();
    let job_b = plan.state.active_job().unwrap().clone();
    assert_eq!(job_b.branch, "B");
    assert_eq!(job_b.new_base_sha, "a1-new");

    let plan = transition(
        &plan,
        Event::JobSucceeded {
            job_id: job_b.id.clone(),
            rebased_head_sha: "b1-new".to_string(),
        },
        &ids,
        2,
    )
    .unwrap();
    let job_c = plan.state.active_job().unwrap().clone();
    assert_eq!(job_c.branch, "C");
    assert_eq!(job_c.new_base_sha, "b1-new");

    let plan = transition(
        &plan,
        Event::JobSucceeded {
            job_id: job_c.id.clone(),
            rebased_head_sha: "c1-new".to_string(),
        },
        &ids,
        3,
    )
    .unwrap();
    assert!(plan.state.is_complete());
    assert_eq!(plan.state.session.status, SessionStatus::Completed);
    assert_eq!(plan.state.session.ended_at_ms, Some(3));
}

/// Diamond descendants: A has two direct children B and C.
#[test]
fn diamond_descendants_both_rebase_onto_completed_parent() {
    let b = node("B", "a1", "a1", "b1", vec![]);
    let c = node("C", "a1", "a1", "c1", vec![]);
    let a = node("A", "m0", "m1", "a1", vec![b, c]);
    let plan = plan_from_targets(vec![a]);
    let ids = SeqIds::new();

    let plan = transition(&plan, Event::StartPlan, &ids, 0).unwrap();
    let job_a = plan.state.active_job().unwrap().clone();

    let plan = transition(
        &plan,
        Event::JobSucceeded {
            job_id: job_a.id,
            rebased_head_sha: "a1-new".to_string(),
        },
        &ids,
        1,
    )
    .unwrap();

    for job in plan.state.jobs_by_id.values() {
        if job.branch == "B" || job.branch == "C" {
            assert_eq!(job.new_base_sha, "a1-new");
        }
    }
}

/// Conflict then continue.
#[test]
fn conflict_then_continue_pauses_and_resumes() {
    let a = node("A", "m0", "m1", "a1", vec![]);
    let plan = plan_from_targets(vec![a]);
    let ids = SeqIds::new();

    let plan = transition(&plan, Event::StartPlan, &ids, 0).unwrap();
    let job_a = plan.state.active_job().unwrap().clone();

    let plan = transition(
        &plan,
        Event::JobConflicted {
            job_id: job_a.id.clone(),
            conflicted_files: vec!["file.txt".to_string()],
        },
        &ids,
        1,
    )
    .unwrap();
    assert_eq!(plan.state.session.status, SessionStatus::Paused);
    assert_eq!(
        plan.state.jobs_by_id[&job_a.id].conflicted_files,
        vec!["file.txt".to_string()]
    );

    let plan = transition(
        &plan,
        Event::JobResumed {
            job_id: job_a.id,
            rebased_head_sha: "a1-new".to_string(),
        },
        &ids,
        2,
    )
    .unwrap();
    assert!(plan.state.is_complete());
    assert_eq!(plan.state.session.status, SessionStatus::Completed);
}

/// job_failed cancels every pending descendant.
#[test]
fn job_failed_cancels_descendants() {
    let c = node("C", "b1", "b1", "c1", vec![]);
    let b = node("B", "a1", "a1", "b1", vec![c]);
    let a = node("A", "m0", "m1", "a1", vec![b]);
    let plan = plan_from_targets(vec![a]);
    let ids = SeqIds::new();

    let plan = transition(&plan, Event::StartPlan, &ids, 0).unwrap();
    let job_a = plan.state.active_job().unwrap().clone();

    let plan = transition(
        &plan,
        Event::JobFailed {
            job_id: job_a.id,
            error: "boom".to_string(),
        },
        &ids,
        1,
    )
    .unwrap();

    assert_eq!(plan.state.session.status, SessionStatus::Failed);
    assert_eq!(
        plan.state.session.failure_reason.as_deref(),
        Some("ancestor failed")
    );
    for job in plan.state.jobs_by_id.values() {
        if job.branch == "B" || job.branch == "C" {
            assert_eq!(job.status, JobStatus::Cancelled);
        }
    }
    assert!(plan.state.queue.pending_job_ids.is_empty());
}

/// job_aborted cancels the active job and all pending jobs.
#[test]
fn job_aborted_cancels_everything_pending() {
    let b = node("B", "a1", "a1", "b1", vec![]);
    let a = node("A", "m0", "m1", "a1", vec![b]);
    let plan = plan_from_targets(vec![a]);
    let ids = SeqIds::new();

    let plan = transition(&plan, Event::StartPlan, &ids, 0).unwrap();
    let plan = transition(&plan, Event::JobAborted, &ids, 1).unwrap();

    assert_eq!(plan.state.session.status, SessionStatus::Failed);
    assert_eq!(
        plan.state.session.failure_reason.as_deref(),
        Some("aborted by user")
    );
    assert!(plan
        .state
        .jobs_by_id
        .values()
        .all(|job| job.status == JobStatus::Cancelled));
}

/// External completion enqueues descendants not yet queued.
#[test]
fn external_completion_enqueues_missing_descendants() {
    let b = node("B", "a1", "a1", "b1", vec![]);
    let a = node("A", "m0", "m1", "a1", vec![b]);
    // Simulate a plan that was only ever told about the root job (as if the
    // engine process crashed before materializing descendant jobs).
    let intent = RebaseIntent {
        root: "A".to_string(),
        targets: vec![a],
    };
    let job_a = Job::new("job-a".to_string(), &intent.targets[0]);
    let mut jobs_by_id = HashMap::new();
    jobs_by_id.insert("job-a".to_string(), {
        let mut j = job_a.clone();
        j.status = JobStatus::Running;
        j
    });
    let plan = RebasePlan {
        intent,
        state: RebaseState {
            jobs_by_id,
            queue: Queue {
                active_job_id: Some("job-a".to_string()),
                pending_job_ids: vec![],
            },
            session: Session {
                status: SessionStatus::Running,
                started_at_ms: 0,
                ended_at_ms: None,
                failure_reason: None,
            },
        },
    };
    let ids = SeqIds::new();

    let plan = transition(
        &plan,
        Event::ExternalCompletionDetected {
            job_id: "job-a".to_string(),
            new_head_sha: "a1-new".to_string(),
        },
        &ids,
        5,
    )
    .unwrap();

    assert_eq!(plan.state.queue.pending_job_ids.len(), 1);
    let enqueued_id = &plan.state.queue.pending_job_ids[0];
    let enqueued = &plan.state.jobs_by_id[enqueued_id];
    assert_eq!(enqueued.branch, "B");
    assert_eq!(enqueued.new_base_sha, "a1-new");
}

/// The pending and running job ids always equal the queue's
/// pending list plus the active slot.
#[test]
fn pending_and_running_match_queue_bookkeeping() {
    let b = node("B", "a1", "a1", "b1", vec![]);
    let a = node("A", "m0", "m1", "a1", vec![b]);
    let plan = plan_from_targets(vec![a]);
    let ids = SeqIds::new();
    let plan = transition(&plan, Event::StartPlan, &ids, 0).unwrap();

    let expected: std::collections::HashSet<_> = plan
        .state
        .queue
        .pending_job_ids
        .iter()
        .cloned()
        .chain(plan.state.queue.active_job_id.clone())
        .collect();
    let actual: std::collections::HashSet<_> = plan
        .state
        .jobs_by_id
        .values()
        .filter(|j| matches!(j.status, JobStatus::Pending | JobStatus::Running))
        .map(|j| j.id.clone())
        .collect();
    assert_eq!(expected, actual);
}

/// Snapshot of the enqueue order `StartPlan` produces for a three-way
/// diamond (A has children B and C, B has child D): branches should come
/// out in the same preorder `TargetNode::preorder` walks them in.
#[test]
fn diamond_enqueue_order_matches_preorder_snapshot() {
    let d = node("D", "b1", "b1", "d1", vec![]);
    let b = node("B", "a1", "a1", "b1", vec![d]);
    let c = node("C", "a1", "a1", "c1", vec![]);
    let a = node("A", "m0", "m1", "a1", vec![b, c]);
    let plan = plan_from_targets(vec![a]);
    let ids = SeqIds::new();

    let plan = transition(&plan, Event::StartPlan, &ids, 0).unwrap();
    let branches: Vec<&str> = plan
        .state
        .queue
        .pending_job_ids
        .iter()
        .map(|id| plan.state.jobs_by_id[id].branch.as_str())
        .collect();

    insta::assert_debug_snapshot!(branches, @r###"
    [
        "B",
        "D",
        "C",
    ]
    "###);
}
