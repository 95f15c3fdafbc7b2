//! Shared test fixtures for the rebase engine workspace.

pub mod fake_adapter;
pub mod id_generator;

pub use fake_adapter::FakeAdapter;
pub use id_generator::SequentialIdGenerator;
