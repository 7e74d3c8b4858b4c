//! `SQLite` implementations of the repository ports.

mod row_mappers;
mod sqlite_artifact_repository;
mod sqlite_model_settings_repository;
mod sqlite_segment_repository;
mod sqlite_settings_repository;

pub use sqlite_artifact_repository::SqliteArtifactRepository;
pub use sqlite_model_settings_repository::SqliteModelSettingsRepository;
pub use sqlite_segment_repository::SqliteSegmentRepository;
pub use sqlite_settings_repository::SqliteSettingsRepository;
