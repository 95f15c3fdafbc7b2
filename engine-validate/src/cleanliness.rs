//! Working-directory cleanliness.

use engine_vcs::WorkingTreeStatus;

use crate::error::{ValidationError, ValidationResult};

pub fn validate_clean(path: &str, status: &WorkingTreeStatus) -> ValidationResult<()> {
    if status.is_rebasing {
        return Err(ValidationError::RebaseInProgress {
            path: path.to_string(),
        });
    }
    if !status.all_changed_files().is_empty() {
        return Err(ValidationError::DirtyWorkingTree {
            path: path.to_string(),
        });
    }
    Ok(())
}
