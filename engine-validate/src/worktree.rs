//! Worktree-conflict classification: for every branch in the plan, check
//! every sibling worktree and classify a claim as `Dirty` (hard block) or
//! `Clean` (candidate for automatic detachment).

use engine_vcs::Worktree;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorktreeConflictKind {
    Dirty,
    Clean,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorktreeConflict {
    pub branch: String,
    pub path: String,
    pub kind: WorktreeConflictKind,
}

pub fn classify_worktree_conflicts(
    plan_branches: &[String],
    worktrees: &[Worktree],
) -> Vec<WorktreeConflict> {
    let mut conflicts = Vec::new();
    for worktree in worktrees.iter().filter(|w| !w.is_main) {
        let Some(branch) = &worktree.branch else {
            continue;
        };
        if !plan_branches.iter().any(|b| b == branch) {
            continue;
        }
        conflicts.push(WorktreeConflict {
            branch: branch.clone(),
            path: worktree.path.clone(),
            kind: if worktree.is_dirty {
                WorktreeConflictKind::Dirty
            } else {
                WorktreeConflictKind::Clean
            },
        });
    }
    conflicts
}
