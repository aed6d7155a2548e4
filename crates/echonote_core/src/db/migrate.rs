//! Migration executor: drives a connection between schema versions.
//!
//! # Responsibility
//! - Apply registered steps strictly in increasing version order.
//! - Persist the stored version once, after the whole run succeeds.
//!
//! # Invariants
//! - Each step runs inside its own transaction; a failing step leaves no
//!   partial statements behind.
//! - The stored version never moves on failure, even when earlier steps of
//!   the same call already committed. Recovery across committed steps is the
//!   caller's job via backup/restore.

use super::backup::{self, BackupError};
use super::schema::{self, MigrationStep};
use super::{set_stored_version, stored_version};
use log::{debug, error, info};
use rusqlite::{Connection, DatabaseName};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type MigrationResult<T> = Result<T, MigrationError>;

/// Hard failure while executing a migration run.
#[derive(Debug)]
pub enum MigrationError {
    /// `to_version` is behind `from_version`; downgrades are not supported.
    TargetBehindCurrent { from_version: u32, to_version: u32 },
    /// No step registered for `version` and the policy demands one.
    ///
    /// `version` is the first gap encountered while walking the requested
    /// range in increasing order.
    MissingStep { version: u32 },
    /// A statement of the step starting at `version` failed to apply.
    Step {
        version: u32,
        source: rusqlite::Error,
    },
    /// Version bookkeeping against the connection failed.
    Sqlite(rusqlite::Error),
    /// The pre-run snapshot of a checkpointed migration could not be taken.
    Checkpoint(BackupError),
    /// A checkpointed run failed and restoring its snapshot failed too.
    ///
    /// The database is left partially migrated; `step` carries the failure
    /// that triggered the rollback attempt.
    RollbackFailed {
        step: Box<MigrationError>,
        source: rusqlite::Error,
    },
}

impl Display for MigrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TargetBehindCurrent {
                from_version,
                to_version,
            } => write!(
                f,
                "cannot migrate from version {from_version} down to {to_version}"
            ),
            Self::MissingStep { version } => {
                write!(f, "no migration step registered for version {version}")
            }
            Self::Step { version, source } => write!(
                f,
                "migration step {version} -> {} failed: {source}",
                version + 1
            ),
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Checkpoint(err) => write!(f, "checkpoint snapshot failed: {err}"),
            Self::RollbackFailed { step, source } => write!(
                f,
                "snapshot restore failed, database left partially migrated: {source} (after: {step})"
            ),
        }
    }
}

impl Error for MigrationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Step { source, .. } => Some(source),
            Self::Sqlite(err) => Some(err),
            Self::Checkpoint(err) => Some(err),
            Self::RollbackFailed { source, .. } => Some(source),
            Self::TargetBehindCurrent { .. } | Self::MissingStep { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for MigrationError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// What to do when a version in the requested range has no registered step.
///
/// `Skip` matches the historical behavior: the run advances past the gap and
/// still records the requested target, effectively reserving future version
/// numbers. `Fail` rejects the run at the first gap instead, so a missing
/// migration script cannot silently mask un-migrated structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingStepPolicy {
    #[default]
    Skip,
    Fail,
}

/// Migrates the connection from `from_version` to `to_version` using the
/// default lenient [`MissingStepPolicy::Skip`].
pub fn migrate(conn: &mut Connection, from_version: u32, to_version: u32) -> MigrationResult<()> {
    migrate_with_policy(conn, from_version, to_version, MissingStepPolicy::default())
}

/// Migrates the connection from `from_version` to `to_version`.
///
/// # Contract
/// - `to_version == from_version` is a no-op success.
/// - Steps already committed before a failure stay applied; the stored
///   version remains `from_version` in that case.
/// - On success the stored version is set to `to_version` exactly once.
pub fn migrate_with_policy(
    conn: &mut Connection,
    from_version: u32,
    to_version: u32,
    policy: MissingStepPolicy,
) -> MigrationResult<()> {
    if to_version < from_version {
        return Err(MigrationError::TargetBehindCurrent {
            from_version,
            to_version,
        });
    }
    if to_version == from_version {
        return Ok(());
    }

    let started_at = Instant::now();
    info!(
        "event=db_migrate module=db status=start from_version={from_version} to_version={to_version}"
    );

    for version in from_version..to_version {
        match schema::step_for(version) {
            Some(step) => {
                if let Err(err) = apply_step(conn, step) {
                    error!(
                        "event=db_migrate module=db status=error from_version={from_version} \
                         to_version={to_version} failed_version={version} duration_ms={} error={err}",
                        started_at.elapsed().as_millis()
                    );
                    return Err(err);
                }
            }
            None => match policy {
                MissingStepPolicy::Skip => {
                    debug!(
                        "event=db_migrate_skip module=db status=ok version={version} reason=no_registered_step"
                    );
                }
                MissingStepPolicy::Fail => {
                    error!(
                        "event=db_migrate module=db status=error from_version={from_version} \
                         to_version={to_version} failed_version={version} duration_ms={} \
                         error_code=missing_step",
                        started_at.elapsed().as_millis()
                    );
                    return Err(MigrationError::MissingStep { version });
                }
            },
        }
    }

    set_stored_version(conn, to_version)?;
    info!(
        "event=db_migrate module=db status=ok from_version={from_version} to_version={to_version} duration_ms={}",
        started_at.elapsed().as_millis()
    );
    Ok(())
}

/// Migrates from the recorded stored version up to the latest registered one.
pub fn migrate_to_latest(conn: &mut Connection) -> MigrationResult<()> {
    let current = stored_version(conn)?;
    migrate(conn, current, schema::latest_version())
}

/// All-or-nothing variant for file-backed databases.
///
/// Snapshots the database through the SQLite backup API before running, and
/// restores the snapshot into the live connection when any step fails, so a
/// multi-step failure does not leave earlier steps' DDL behind. When the
/// restore itself fails the run returns [`MigrationError::RollbackFailed`]
/// and the database is left partially migrated. The snapshot file is kept
/// either way; its lifetime is the caller's to manage.
pub fn migrate_checkpointed(
    conn: &mut Connection,
    from_version: u32,
    to_version: u32,
) -> MigrationResult<()> {
    let snapshot = backup::create_backup(conn).map_err(MigrationError::Checkpoint)?;

    match migrate(conn, from_version, to_version) {
        Ok(()) => Ok(()),
        Err(err) => match conn.restore(
            DatabaseName::Main,
            &snapshot,
            None::<fn(rusqlite::backup::Progress)>,
        ) {
            Ok(()) => {
                info!(
                    "event=db_migrate_rollback module=db status=ok snapshot={}",
                    snapshot.display()
                );
                Err(err)
            }
            Err(restore_err) => {
                error!(
                    "event=db_migrate_rollback module=db status=error snapshot={} error={restore_err}",
                    snapshot.display()
                );
                Err(MigrationError::RollbackFailed {
                    step: Box::new(err),
                    source: restore_err,
                })
            }
        },
    }
}

fn apply_step(conn: &mut Connection, step: &MigrationStep) -> MigrationResult<()> {
    let step_error = |source: rusqlite::Error| MigrationError::Step {
        version: step.from_version,
        source,
    };

    let tx = conn.transaction().map_err(step_error)?;
    for mutation in step.mutations {
        tx.execute_batch(&mutation.to_sql()).map_err(step_error)?;
    }
    tx.commit().map_err(step_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::MigrationError;
    use std::error::Error;

    #[test]
    fn rollback_failure_reports_partial_state_and_both_causes() {
        // A failed snapshot restore cannot be induced through the public API
        // (the snapshot path is internal to the call), so pin the error's
        // reporting contract directly.
        let err = MigrationError::RollbackFailed {
            step: Box::new(MigrationError::Step {
                version: 3,
                source: rusqlite::Error::QueryReturnedNoRows,
            }),
            source: rusqlite::Error::QueryReturnedNoRows,
        };

        let message = err.to_string();
        assert!(message.contains("partially migrated"));
        assert!(message.contains("migration step 3 -> 4"));
        // The restore failure, not the step failure, is the direct cause.
        assert!(err.source().is_some());
    }
}
