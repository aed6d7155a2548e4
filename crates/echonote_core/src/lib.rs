//! Storage core for EchoNote.
//! This crate owns schema evolution, validation and backup/restore for the
//! application database; everything above it only needs a connection handle
//! and the stored schema version contract.

pub mod db;
pub mod logging;

pub use db::backup::{create_backup, restore_from_backup, BackupError, RestoreError};
pub use db::migrate::{
    migrate, migrate_checkpointed, migrate_to_latest, migrate_with_policy, MigrationError,
    MigrationResult, MissingStepPolicy,
};
pub use db::schema::{latest_version, MigrationStep, SchemaMutation, TableDescriptor};
pub use db::validate::{validate_migration, validation_report, MissingColumn, ValidationReport};
pub use db::{
    bootstrap_initial_schema, open_db, open_db_in_memory, stored_version, DbError, DbResult,
};
pub use logging::{default_log_level, init_logging, logging_status};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
