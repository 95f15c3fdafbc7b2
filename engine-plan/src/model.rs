//! The repository model the planner reads: just enough of the stack
//! topology to resolve a moving branch's descendants, kept separate from the
//! live `VcsAdapter` so the planner stays a pure function over a snapshot.

use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BranchInfo {
    pub head_sha: String,
    /// The branch this one is currently stacked on, if tracked. `None` means
    /// the branch is based directly on trunk or an untracked ref.
    pub base_branch: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RepoModel {
    pub branches: HashMap<String, BranchInfo>,
}

impl RepoModel {
    /// Every branch transitively stacked on `branch`, parent before child
    /// (breadth-first), matching the topological order `pendingJobIds` must
    /// preserve.
    pub fn descendants_of(&self, branch: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut frontier = vec![branch.to_string()];
        while !frontier.is_empty() {
            let mut next_frontier = Vec::new();
            for parent in &frontier {
                for (name, info) in &self.branches {
                    if info.base_branch.as_deref() == Some(parent.as_str()) {
                        out.push(name.clone());
                        next_frontier.push(name.clone());
                    }
                }
            }
            frontier = next_frontier;
        }
        out
    }

    /// The names of the branches stacked directly on `branch`.
    pub fn direct_children_of(&self, branch: &str) -> Vec<String> {
        self.branches
            .iter()
            .filter(|(_, info)| info.base_branch.as_deref() == Some(branch))
            .map(|(name, _)| name.clone())
            .collect()
    }
}
