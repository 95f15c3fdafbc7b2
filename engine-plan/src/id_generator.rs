use engine_machine::IdGenerator;

/// Production job-id generator: a short opaque string.
#[derive(Default)]
pub struct NanoIdGenerator;

impl IdGenerator for NanoIdGenerator {
    fn next_id(&self) -> String {
        nanoid::nanoid!(10)
    }
}
