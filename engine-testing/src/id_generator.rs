//! Deterministic job-id generation, so tests can pin exact job ids.

use std::sync::atomic::{AtomicU64, Ordering};

use engine_machine::IdGenerator;

/// Produces `job-0`, `job-1`, ... in order, for assertions that pin exact
/// job ids.
#[derive(Default)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("job-{n}")
    }
}
