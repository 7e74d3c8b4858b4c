//! `SQLite` repository implementations for pocketllm.
//!
//! Every port in `pocketllm_core::ports` that persists data has an
//! implementation here. No sqlx type crosses the crate boundary.

#![deny(unsafe_code)]

pub mod factory;
pub mod repositories;
pub mod setup;

pub use factory::CoreFactory;

#[cfg(any(test, feature = "test-utils"))]
pub use factory::TestDb;

pub use repositories::{
    SqliteArtifactRepository, SqliteModelSettingsRepository, SqliteSegmentRepository,
    SqliteSettingsRepository,
};

pub use setup::setup_database;
#[cfg(any(test, feature = "test-utils"))]
pub use setup::setup_test_database;
