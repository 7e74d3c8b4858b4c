//! In-memory repository implementations for tests.
//!
//! Enabled with the `test-utils` feature so dependent crates can wire a full
//! `Repos` container without a database. Every repository can be told to
//! fail its next writes to exercise rollback paths.

mod memory;

pub use memory::{
    InMemoryArtifactRepository, InMemoryModelSettingsRepository, InMemorySegmentRepository,
    InMemorySettingsRepository, in_memory_repos,
};
