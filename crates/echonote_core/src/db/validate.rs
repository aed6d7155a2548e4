//! Migration validator: structural sanity checks for a declared version.
//!
//! # Responsibility
//! - Compare the live schema against the registry's expectations.
//! - Report mismatches as data, never as errors.
//!
//! # Invariants
//! - Structural mismatch is a soft signal (`Ok(false)` / a non-empty
//!   report); only SQLite query failures are hard errors.
//! - Checks cover table/column existence only, not row-level integrity.

use super::schema;
use super::{stored_version, DbResult};
use log::info;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashSet;

/// A required column absent from an existing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingColumn {
    pub table: String,
    pub column: String,
}

/// Outcome of structurally validating a database against a declared version.
///
/// Serializable so the application layer can surface it in diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub expected_version: u32,
    pub stored_version: u32,
    pub missing_tables: Vec<String>,
    pub missing_columns: Vec<MissingColumn>,
}

impl ValidationReport {
    /// Whether the live schema matches the declared version.
    pub fn is_valid(&self) -> bool {
        self.stored_version == self.expected_version
            && self.missing_tables.is_empty()
            && self.missing_columns.is_empty()
    }
}

/// Checks that the live schema matches what `expected_version` declares.
///
/// Returns `Ok(false)` when the stored version differs or a required
/// table/column is missing; `Err` only on SQLite query failure.
pub fn validate_migration(conn: &Connection, expected_version: u32) -> DbResult<bool> {
    Ok(validation_report(conn, expected_version)?.is_valid())
}

/// Produces the full structural comparison for `expected_version`.
pub fn validation_report(conn: &Connection, expected_version: u32) -> DbResult<ValidationReport> {
    let stored = stored_version(conn)?;
    let mut missing_tables = Vec::new();
    let mut missing_columns = Vec::new();

    for descriptor in schema::required_tables(expected_version) {
        if !table_exists(conn, descriptor.name)? {
            missing_tables.push(descriptor.name.to_string());
            continue;
        }

        let live_columns = table_columns(conn, descriptor.name)?;
        for column in descriptor.required_columns {
            if !live_columns.contains(*column) {
                missing_columns.push(MissingColumn {
                    table: descriptor.name.to_string(),
                    column: (*column).to_string(),
                });
            }
        }
    }

    let report = ValidationReport {
        expected_version,
        stored_version: stored,
        missing_tables,
        missing_columns,
    };
    info!(
        "event=db_validate module=db status=ok expected_version={expected_version} \
         stored_version={stored} valid={} missing_tables={} missing_columns={}",
        report.is_valid(),
        report.missing_tables.len(),
        report.missing_columns.len()
    );
    Ok(report)
}

fn table_exists(conn: &Connection, table_name: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table_name],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table_name: &str) -> DbResult<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1);")?;
    let mut rows = stmt.query([table_name])?;
    let mut columns = HashSet::new();
    while let Some(row) = rows.next()? {
        columns.insert(row.get::<_, String>(0)?);
    }
    Ok(columns)
}
