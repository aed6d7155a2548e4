use echonote_core::db::{open_db, open_db_in_memory, DbError};
use echonote_core::latest_version;
use rusqlite::Connection;

#[test]
fn open_db_in_memory_bootstraps_and_migrates_to_latest() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "recordings");
    assert_table_exists(&conn, "transcriptions");
    assert_table_exists(&conn, "settings");
    assert_table_exists(&conn, "summaries");
    assert_table_exists(&conn, "shares");
    assert_table_exists(&conn, "analytics_events");
    assert_table_exists(&conn, "sessions");
}

#[test]
fn bootstrap_seeds_default_settings() {
    let conn = open_db_in_memory().unwrap();

    let playback_speed: String = conn
        .query_row(
            "SELECT value FROM settings WHERE key = 'playback_speed';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(playback_speed, "1.0");

    let seeded: i64 = conn
        .query_row("SELECT COUNT(*) FROM settings;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(seeded, 3);
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("echonote.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "recordings");

    // Seed rows must not be duplicated by the second open.
    let seeded: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM settings;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(seeded, 3);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
