//! Backup/restore manager: point-in-time safety net around migrations.
//!
//! # Responsibility
//! - Snapshot the database file through the SQLite online backup API.
//! - Replace a database file from a previously taken snapshot.
//!
//! # Invariants
//! - Backup file names carry the `backup` marker so operational tooling can
//!   identify and prune them; the engine itself never deletes a backup.
//! - Restore assumes no connection holds the target file open; enforcing
//!   that is the caller's responsibility.

use log::{error, info};
use rusqlite::{Connection, DatabaseName};
use std::error::Error;
use std::ffi::OsString;
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Marker substring present in every backup file name.
pub const BACKUP_MARKER: &str = "backup";

#[derive(Debug)]
pub enum BackupError {
    /// In-memory databases have no file to snapshot.
    InMemoryDatabase,
    Sqlite(rusqlite::Error),
}

impl Display for BackupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InMemoryDatabase => {
                write!(f, "cannot back up an in-memory database")
            }
            Self::Sqlite(err) => write!(f, "backup failed: {err}"),
        }
    }
}

impl Error for BackupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InMemoryDatabase => None,
            Self::Sqlite(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for BackupError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

#[derive(Debug)]
pub enum RestoreError {
    /// The backup file does not exist.
    MissingBackup(PathBuf),
    /// The backup or target file could not be read/written.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for RestoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingBackup(path) => {
                write!(f, "backup file does not exist: {}", path.display())
            }
            Self::Io { path, source } => {
                write!(f, "restore failed at {}: {source}", path.display())
            }
        }
    }
}

impl Error for RestoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MissingBackup(_) => None,
            Self::Io { source, .. } => Some(source),
        }
    }
}

/// Creates a point-in-time copy of the database backing `conn`.
///
/// Uses the SQLite online backup API, so the copy is consistent even in WAL
/// mode and no transaction is started on the source connection. The copy is
/// written next to the database file and its generated name embeds
/// [`BACKUP_MARKER`], a timestamp and a random suffix.
///
/// # Errors
/// - [`BackupError::InMemoryDatabase`] when `conn` has no backing file.
/// - [`BackupError::Sqlite`] when the snapshot cannot be written.
pub fn create_backup(conn: &Connection) -> Result<PathBuf, BackupError> {
    let started_at = Instant::now();
    info!("event=db_backup module=db status=start");

    let db_path = match conn.path().filter(|path| !path.is_empty()) {
        Some(path) => PathBuf::from(path),
        None => {
            error!(
                "event=db_backup module=db status=error duration_ms={} error_code=in_memory_database",
                started_at.elapsed().as_millis()
            );
            return Err(BackupError::InMemoryDatabase);
        }
    };

    let backup_path = generate_backup_path(&db_path);
    if let Err(err) = conn.backup(
        DatabaseName::Main,
        &backup_path,
        None::<fn(rusqlite::backup::Progress)>,
    ) {
        error!(
            "event=db_backup module=db status=error duration_ms={} error_code=db_backup_failed error={err}",
            started_at.elapsed().as_millis()
        );
        return Err(err.into());
    }

    info!(
        "event=db_backup module=db status=ok duration_ms={} path={}",
        started_at.elapsed().as_millis(),
        backup_path.display()
    );
    Ok(backup_path)
}

/// Replaces the database file at `target_path` with the snapshot at
/// `backup_path`.
///
/// Stale `-wal`/`-shm` sidecars of the target are removed so the restored
/// file is not mixed with journal state from the replaced database.
///
/// # Errors
/// - [`RestoreError::MissingBackup`] when `backup_path` does not exist.
/// - [`RestoreError::Io`] when the backup is unreadable or the target
///   cannot be replaced.
pub fn restore_from_backup(target_path: &Path, backup_path: &Path) -> Result<(), RestoreError> {
    let started_at = Instant::now();
    info!(
        "event=db_restore module=db status=start backup={}",
        backup_path.display()
    );

    if let Err(err) = std::fs::metadata(backup_path) {
        let restore_err = if err.kind() == ErrorKind::NotFound {
            RestoreError::MissingBackup(backup_path.to_path_buf())
        } else {
            RestoreError::Io {
                path: backup_path.to_path_buf(),
                source: err,
            }
        };
        error!(
            "event=db_restore module=db status=error duration_ms={} error={restore_err}",
            started_at.elapsed().as_millis()
        );
        return Err(restore_err);
    }

    if let Err(err) = std::fs::copy(backup_path, target_path) {
        let restore_err = RestoreError::Io {
            path: target_path.to_path_buf(),
            source: err,
        };
        error!(
            "event=db_restore module=db status=error duration_ms={} error={restore_err}",
            started_at.elapsed().as_millis()
        );
        return Err(restore_err);
    }

    for suffix in ["-wal", "-shm"] {
        let sidecar = sidecar_path(target_path, suffix);
        match std::fs::remove_file(&sidecar) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                let restore_err = RestoreError::Io {
                    path: sidecar,
                    source: err,
                };
                error!(
                    "event=db_restore module=db status=error duration_ms={} error={restore_err}",
                    started_at.elapsed().as_millis()
                );
                return Err(restore_err);
            }
        }
    }

    info!(
        "event=db_restore module=db status=ok duration_ms={} target={}",
        started_at.elapsed().as_millis(),
        target_path.display()
    );
    Ok(())
}

fn generate_backup_path(db_path: &Path) -> PathBuf {
    let stem = db_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("database");
    let timestamp_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis());
    let suffix = Uuid::new_v4().simple().to_string();
    let file_name = format!(
        "{stem}.{BACKUP_MARKER}-{timestamp_ms}-{}.sqlite3",
        &suffix[..8]
    );
    db_path.with_file_name(file_name)
}

fn sidecar_path(target_path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(target_path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
