//! Pure predicate validators that gate rebase execution: trunk protection,
//! working-tree cleanliness, worktree-conflict classification, and
//! stack-ancestry checks.

pub mod ancestry;
pub mod cleanliness;
pub mod error;
pub mod trunk;
pub mod worktree;

pub use ancestry::validate_ancestry;
pub use cleanliness::validate_clean;
pub use error::{ValidationError, ValidationResult};
pub use trunk::{is_trunk_branch, validate_not_trunk};
pub use worktree::{classify_worktree_conflicts, WorktreeConflict, WorktreeConflictKind};
