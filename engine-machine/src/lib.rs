//! The pure rebase state machine and the data model it operates over.

pub mod model;
pub mod transition;

pub use model::*;
pub use transition::{transition, Event, IdGenerator, TransitionError};
