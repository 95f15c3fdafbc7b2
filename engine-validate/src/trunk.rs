//! Trunk protection: refuse any job whose branch is one of the configured
//! trunk names.

use crate::error::{ValidationError, ValidationResult};

/// Strips a single leading `<remote>/` segment, so `origin/main` is caught
/// by a `main` trunk rule: any single path segment before the first `/` is
/// treated as a remote name, not part of the branch name being checked.
fn strip_remote_prefix(branch: &str) -> &str {
    branch.split_once('/').map_or(branch, |(_, rest)| rest)
}

pub fn is_trunk_branch(branch: &str, trunk_names: &[String]) -> bool {
    let bare = strip_remote_prefix(branch).to_ascii_lowercase();
    trunk_names.iter().any(|name| name.to_ascii_lowercase() == bare)
}

pub fn validate_not_trunk(branch: &str, trunk_names: &[String]) -> ValidationResult<()> {
    if is_trunk_branch(branch, trunk_names) {
        return Err(ValidationError::TrunkProtected(branch.to_string()));
    }
    Ok(())
}
