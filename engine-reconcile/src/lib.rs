mod error;
mod reconcile;
mod types;

pub use error::{ReconcileError, ReconcileResult};
pub use reconcile::reconcile;
pub use types::ReconcileOutcome;
