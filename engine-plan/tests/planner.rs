use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use engine_machine::IdGenerator;
use engine_plan::{BranchInfo, PlanInput, RebasePlanner, RepoModel};

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

fn linear_stack() -> RepoModel {
    let mut branches = HashMap::new();
    branches.insert(
        "A".to_string(),
        BranchInfo {
            head_sha: "a1".to_string(),
            base_branch: None,
        },
    );
    branches.insert(
        "B".to_string(),
        BranchInfo {
            head_sha: "b1".to_string(),
            base_branch: Some("A".to_string()),
        },
    );
    branches.insert(
        "C".to_string(),
        BranchInfo {
            head_sha: "c1".to_string(),
            base_branch: Some("B".to_string()),
        },
    );
    RepoModel { branches }
}

#[test]
fn plans_a_linear_stack_with_descendants_as_children() {
    let repo = linear_stack();
    let ids = SeqIds::new();
    let input = PlanInput {
        moving_branch: "A".to_string(),
        old_base_sha: "m0".to_string(),
        new_base_sha: "m1".to_string(),
    };

    let plan = RebasePlanner::plan(&repo, &input, &ids, 0).expect("plan should be accepted");
    assert_eq!(plan.intent.root, "A");
    assert_eq!(plan.state.queue.pending_job_ids.len(), 3);

    let root = &plan.intent.targets[0];
    assert_eq!(root.branch, "A");
    assert_eq!(root.new_base_sha, "m1");
    assert_eq!(root.children.len(), 1);
    assert_eq!(root.children[0].branch, "B");
    assert_eq!(root.children[0].old_base_sha, "a1");
    assert_eq!(root.children[0].children[0].branch, "C");
    assert_eq!(root.children[0].children[0].old_base_sha, "b1");
}

#[test]
fn rejects_unknown_moving_branch() {
    let repo = linear_stack();
    let ids = SeqIds::new();
    let input = PlanInput {
        moving_branch: "does-not-exist".to_string(),
        old_base_sha: "m0".to_string(),
        new_base_sha: "m1".to_string(),
    };
    assert!(RebasePlanner::plan(&repo, &input, &ids, 0).is_none());
}

#[test]
fn rejects_invalid_new_base_ref() {
    let repo = linear_stack();
    let ids = SeqIds::new();
    let input = PlanInput {
        moving_branch: "A".to_string(),
        old_base_sha: "m0".to_string(),
        new_base_sha: String::new(),
    };
    assert!(RebasePlanner::plan(&repo, &input, &ids, 0).is_none());
}

#[test]
fn rejects_no_op_move() {
    let repo = linear_stack();
    let ids = SeqIds::new();
    let input = PlanInput {
        moving_branch: "A".to_string(),
        old_base_sha: "a1".to_string(),
        new_base_sha: "m1".to_string(),
    };
    assert!(RebasePlanner::plan(&repo, &input, &ids, 0).is_none());
}

#[test]
fn rejects_cycle_onto_own_descendant() {
    let repo = linear_stack();
    let ids = SeqIds::new();
    let input = PlanInput {
        moving_branch: "A".to_string(),
        old_base_sha: "m0".to_string(),
        new_base_sha: "b1".to_string(),
    };
    assert!(RebasePlanner::plan(&repo, &input, &ids, 0).is_none());
}

#[test]
fn diamond_stack_produces_two_direct_children() {
    let mut branches = HashMap::new();
    branches.insert(
        "A".to_string(),
        BranchInfo {
            head_sha: "a1".to_string(),
            base_branch: None,
        },
    );
    branches.insert(
        "B".to_string(),
        BranchInfo {
            head_sha: "b1".to_string(),
            base_branch: Some("A".to_string()),
        },
    );
    branches.insert(
        "C".to_string(),
        BranchInfo {
            head_sha: "c1".to_string(),
            base_branch: Some("A".to_string()),
        },
    );
    let repo = RepoModel { branches };
    let ids = SeqIds::new();
    let input = PlanInput {
        moving_branch: "A".to_string(),
        old_base_sha: "m0".to_string(),
        new_base_sha: "m1".to_string(),
    };

    let plan = RebasePlanner::plan(&repo, &input, &ids, 0).unwrap();
    let root = &plan.intent.targets[0];
    assert_eq!(root.children.len(), 2);
    assert_eq!(root.children[0].branch, "B");
    assert_eq!(root.children[1].branch, "C");
}
