use echonote_core::db::{open_db, open_db_in_memory};
use echonote_core::{
    create_backup, latest_version, restore_from_backup, BackupError, RestoreError,
};
use rusqlite::Connection;
use std::path::Path;

#[test]
fn backup_produces_marked_non_empty_file_next_to_database() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("echonote.db");
    let conn = open_db(&db_path).unwrap();

    let backup_path = create_backup(&conn).unwrap();

    assert_eq!(backup_path.parent(), Some(dir.path()));
    let name = backup_path.file_name().and_then(|name| name.to_str()).unwrap();
    assert!(name.contains("backup"), "no backup marker in `{name}`");

    let metadata = std::fs::metadata(&backup_path).unwrap();
    assert!(metadata.len() > 0);
}

#[test]
fn restore_round_trip_reproduces_pre_backup_state() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("echonote.db");

    let conn = open_db(&db_path).unwrap();
    conn.execute(
        "INSERT INTO recordings (id, title, file_path) VALUES ('rec-1', 'memo', '/audio/memo.m4a');",
        [],
    )
    .unwrap();

    let backup_path = create_backup(&conn).unwrap();

    // Diverge from the snapshot, then throw the changes away.
    conn.execute(
        "INSERT INTO recordings (id, title, file_path) VALUES ('rec-2', 'noise', '/audio/noise.m4a');",
        [],
    )
    .unwrap();
    conn.execute(
        "UPDATE settings SET value = '2.0' WHERE key = 'playback_speed';",
        [],
    )
    .unwrap();
    drop(conn);

    restore_from_backup(&db_path, &backup_path).unwrap();

    let restored = Connection::open(&db_path).unwrap();
    let version: u32 = restored
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, latest_version());

    let recording_count: i64 = restored
        .query_row("SELECT COUNT(*) FROM recordings;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(recording_count, 1);

    let title: String = restored
        .query_row(
            "SELECT title FROM recordings WHERE id = 'rec-1';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(title, "memo");

    let playback_speed: String = restored
        .query_row(
            "SELECT value FROM settings WHERE key = 'playback_speed';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(playback_speed, "1.0");
}

#[test]
fn restore_from_missing_backup_fails() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("echonote.db");
    let missing = dir.path().join("echonote.backup-0-deadbeef.sqlite3");

    let err = restore_from_backup(&db_path, &missing).unwrap_err();
    match err {
        RestoreError::MissingBackup(path) => assert_eq!(path, missing),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn restore_removes_stale_wal_sidecars() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("echonote.db");
    let conn = open_db(&db_path).unwrap();
    let backup_path = create_backup(&conn).unwrap();
    drop(conn);

    let wal_path = sidecar(&db_path, "-wal");
    let shm_path = sidecar(&db_path, "-shm");
    std::fs::write(&wal_path, b"stale").unwrap();
    std::fs::write(&shm_path, b"stale").unwrap();

    restore_from_backup(&db_path, &backup_path).unwrap();

    assert!(!wal_path.exists());
    assert!(!shm_path.exists());
}

#[test]
fn in_memory_database_cannot_be_backed_up() {
    let conn = open_db_in_memory().unwrap();

    let err = create_backup(&conn).unwrap_err();
    match err {
        BackupError::InMemoryDatabase => {}
        other => panic!("unexpected error: {other}"),
    }
}

fn sidecar(path: &Path, suffix: &str) -> std::path::PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    std::path::PathBuf::from(name)
}
