//! Abstract VCS capability contract plus a `git2`/subprocess-backed
//! implementation. The planner and executor never call a version-control
//! tool directly — they only ever see [`VcsAdapter`].

pub mod adapter;
pub mod error;
pub mod git_adapter;
pub mod run;
pub mod types;

pub use adapter::VcsAdapter;
pub use error::{VcsError, VcsResult};
pub use git_adapter::GitAdapter;
pub use run::GitRunInfo;
pub use types::*;
