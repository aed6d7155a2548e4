use echonote_core::db::bootstrap_initial_schema;
use echonote_core::{latest_version, migrate, validate_migration, validation_report};
use rusqlite::Connection;

#[test]
fn validation_passes_after_successful_migration() {
    let mut conn = bootstrapped_v1();
    migrate(&mut conn, 1, latest_version()).unwrap();

    assert!(validate_migration(&conn, latest_version()).unwrap());
}

#[test]
fn validation_fails_when_stored_version_differs() {
    let conn = bootstrapped_v1();

    assert!(validate_migration(&conn, 1).unwrap());
    assert!(!validate_migration(&conn, latest_version()).unwrap());
}

#[test]
fn validation_fails_when_required_table_is_missing() {
    let mut conn = bootstrapped_v1();
    migrate(&mut conn, 1, latest_version()).unwrap();
    conn.execute_batch("DROP TABLE shares;").unwrap();

    assert!(!validate_migration(&conn, latest_version()).unwrap());

    let report = validation_report(&conn, latest_version()).unwrap();
    assert_eq!(report.missing_tables, vec!["shares".to_string()]);
    assert!(report.missing_columns.is_empty());
}

#[test]
fn validation_fails_when_required_column_is_missing() {
    let mut conn = bootstrapped_v1();
    migrate(&mut conn, 1, latest_version()).unwrap();
    conn.execute_batch("ALTER TABLE recordings DROP COLUMN duration_ms;")
        .unwrap();

    assert!(!validate_migration(&conn, latest_version()).unwrap());

    let report = validation_report(&conn, latest_version()).unwrap();
    assert!(report.missing_tables.is_empty());
    assert_eq!(report.missing_columns.len(), 1);
    assert_eq!(report.missing_columns[0].table, "recordings");
    assert_eq!(report.missing_columns[0].column, "duration_ms");
}

#[test]
fn report_serializes_for_diagnostics() {
    let conn = bootstrapped_v1();
    let report = validation_report(&conn, 1).unwrap();

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["expected_version"], 1);
    assert_eq!(value["stored_version"], 1);
    assert!(value["missing_tables"].as_array().unwrap().is_empty());
    assert!(value["missing_columns"].as_array().unwrap().is_empty());
}

fn bootstrapped_v1() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    bootstrap_initial_schema(&mut conn).unwrap();
    conn
}
