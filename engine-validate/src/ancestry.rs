//! Ancestry-mismatch detection: a rebase intent tree is only a pure stack
//! if every descendant's recorded `old_base_sha` really is an ancestor of
//! its `head_sha`.

use std::path::Path;

use engine_machine::TargetNode;
use engine_vcs::VcsAdapter;

use crate::error::{ValidationError, ValidationResult};

pub fn validate_ancestry(
    adapter: &dyn VcsAdapter,
    repo_path: &Path,
    node: &TargetNode,
) -> ValidationResult<()> {
    for target in node.preorder() {
        let is_ancestor = adapter
            .is_ancestor(repo_path, &target.old_base_sha, &target.head_sha)
            .unwrap_or(false);
        if !is_ancestor {
            return Err(ValidationError::AncestryMismatch {
                branch: target.branch.clone(),
                old_base_sha: target.old_base_sha.clone(),
                head_sha: target.head_sha.clone(),
            });
        }
    }
    Ok(())
}
