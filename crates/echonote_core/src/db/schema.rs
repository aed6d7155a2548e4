//! Schema registry: per-version structure and migration steps.
//!
//! # Responsibility
//! - Hold the version-1 bootstrap schema, including seed rows.
//! - Register the single step that advances each version to the next.
//! - Describe the tables/columns a given version requires, for validation.
//!
//! # Invariants
//! - Steps are registered in strictly increasing order with no gaps.
//! - Every `MigrationStep` satisfies `to_version == from_version + 1`.
//! - Newly added columns always carry an explicit default so pre-existing
//!   rows never end up with NULL in a required column.

/// Schema version produced by the bootstrap path when no database exists yet.
pub const INITIAL_VERSION: u32 = 1;

/// One schema mutation inside a migration step.
///
/// Kept as a closed set of kinds (with `RawStatement` as the escape hatch)
/// so each registered step can be inspected instead of being an opaque
/// SQL blob.
#[derive(Debug, Clone, Copy)]
pub enum SchemaMutation {
    /// Full `CREATE TABLE` statement.
    CreateTable(&'static str),
    /// `ALTER TABLE .. ADD COLUMN` from table, column and declaration parts.
    AddColumn {
        table: &'static str,
        column: &'static str,
        decl: &'static str,
    },
    /// Full `CREATE INDEX` statement.
    CreateIndex(&'static str),
    /// Full `CREATE TRIGGER` statement.
    CreateTrigger(&'static str),
    /// Sets `column` to a literal default on every row where it is NULL.
    BackfillDefault {
        table: &'static str,
        column: &'static str,
        default: &'static str,
    },
    /// Arbitrary statement for cases the structured kinds do not cover.
    RawStatement(&'static str),
}

impl SchemaMutation {
    /// Renders this mutation as an executable SQL statement.
    pub fn to_sql(&self) -> String {
        match self {
            Self::CreateTable(sql) | Self::CreateIndex(sql) | Self::CreateTrigger(sql) => {
                (*sql).to_string()
            }
            Self::AddColumn {
                table,
                column,
                decl,
            } => format!("ALTER TABLE {table} ADD COLUMN {column} {decl};"),
            Self::BackfillDefault {
                table,
                column,
                default,
            } => format!("UPDATE {table} SET {column} = {default} WHERE {column} IS NULL;"),
            Self::RawStatement(sql) => (*sql).to_string(),
        }
    }
}

/// Ordered mutations moving the schema from `from_version` to `to_version`.
#[derive(Debug, Clone, Copy)]
pub struct MigrationStep {
    pub from_version: u32,
    pub to_version: u32,
    pub mutations: &'static [SchemaMutation],
}

/// Table plus the columns that must exist for a version to be valid.
///
/// Used for structural assertions only, not for full schema diffing.
#[derive(Debug, Clone, Copy)]
pub struct TableDescriptor {
    pub name: &'static str,
    pub required_columns: &'static [&'static str],
}

const INITIAL_SCHEMA: &[SchemaMutation] = &[
    SchemaMutation::CreateTable(
        "CREATE TABLE recordings (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            file_path TEXT NOT NULL,
            created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000),
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
        );",
    ),
    SchemaMutation::CreateTable(
        "CREATE TABLE transcriptions (
            id TEXT PRIMARY KEY,
            recording_id TEXT NOT NULL REFERENCES recordings(id) ON DELETE CASCADE,
            body TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'pending',
            created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000),
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
        );",
    ),
    SchemaMutation::CreateTable(
        "CREATE TABLE settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    ),
    SchemaMutation::CreateIndex(
        "CREATE INDEX idx_recordings_created_at ON recordings (created_at);",
    ),
    SchemaMutation::CreateIndex(
        "CREATE INDEX idx_transcriptions_recording_id ON transcriptions (recording_id);",
    ),
    SchemaMutation::CreateTrigger(
        "CREATE TRIGGER trg_recordings_touch_updated_at
         AFTER UPDATE OF title, file_path ON recordings
         BEGIN
            UPDATE recordings
            SET updated_at = (strftime('%s', 'now') * 1000)
            WHERE id = NEW.id;
         END;",
    ),
    SchemaMutation::RawStatement(
        "INSERT INTO settings (key, value) VALUES
            ('playback_speed', '1.0'),
            ('transcription_language', 'en'),
            ('cloud_sync_enabled', '0');",
    ),
];

const STEP_1_TO_2: &[SchemaMutation] = &[
    SchemaMutation::CreateTable(
        "CREATE TABLE summaries (
            id TEXT PRIMARY KEY,
            transcription_id TEXT NOT NULL REFERENCES transcriptions(id) ON DELETE CASCADE,
            body TEXT NOT NULL DEFAULT '',
            model TEXT,
            created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
        );",
    ),
    SchemaMutation::AddColumn {
        table: "recordings",
        column: "duration_ms",
        decl: "INTEGER NOT NULL DEFAULT 0",
    },
];

const STEP_2_TO_3: &[SchemaMutation] = &[
    SchemaMutation::CreateTable(
        "CREATE TABLE shares (
            id TEXT PRIMARY KEY,
            recording_id TEXT NOT NULL REFERENCES recordings(id) ON DELETE CASCADE,
            url TEXT NOT NULL,
            created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
        );",
    ),
    SchemaMutation::CreateTable(
        "CREATE TABLE analytics_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            payload TEXT,
            created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
        );",
    ),
    SchemaMutation::CreateIndex("CREATE INDEX idx_shares_recording_id ON shares (recording_id);"),
];

const STEP_3_TO_4: &[SchemaMutation] = &[
    SchemaMutation::CreateTable(
        "CREATE TABLE sessions (
            id TEXT PRIMARY KEY,
            device TEXT,
            started_at INTEGER NOT NULL,
            ended_at INTEGER
        );",
    ),
    SchemaMutation::AddColumn {
        table: "transcriptions",
        column: "language",
        decl: "TEXT DEFAULT 'en'",
    },
    SchemaMutation::BackfillDefault {
        table: "transcriptions",
        column: "language",
        default: "'en'",
    },
    SchemaMutation::CreateTrigger(
        "CREATE TRIGGER trg_transcriptions_touch_updated_at
         AFTER UPDATE OF body, status, language ON transcriptions
         BEGIN
            UPDATE transcriptions
            SET updated_at = (strftime('%s', 'now') * 1000)
            WHERE id = NEW.id;
         END;",
    ),
];

const STEPS: &[MigrationStep] = &[
    MigrationStep {
        from_version: 1,
        to_version: 2,
        mutations: STEP_1_TO_2,
    },
    MigrationStep {
        from_version: 2,
        to_version: 3,
        mutations: STEP_2_TO_3,
    },
    MigrationStep {
        from_version: 3,
        to_version: 4,
        mutations: STEP_3_TO_4,
    },
];

const RECORDINGS_COLS_V1: &[&str] = &["id", "title", "file_path", "created_at", "updated_at"];
const RECORDINGS_COLS_V2: &[&str] = &[
    "id",
    "title",
    "file_path",
    "created_at",
    "updated_at",
    "duration_ms",
];
const TRANSCRIPTIONS_COLS_V1: &[&str] = &[
    "id",
    "recording_id",
    "body",
    "status",
    "created_at",
    "updated_at",
];
const TRANSCRIPTIONS_COLS_V4: &[&str] = &[
    "id",
    "recording_id",
    "body",
    "status",
    "created_at",
    "updated_at",
    "language",
];
const SETTINGS_COLS: &[&str] = &["key", "value"];
const SUMMARIES_COLS: &[&str] = &["id", "transcription_id", "body", "model", "created_at"];
const SHARES_COLS: &[&str] = &["id", "recording_id", "url", "created_at"];
const ANALYTICS_EVENTS_COLS: &[&str] = &["id", "name", "payload", "created_at"];
const SESSIONS_COLS: &[&str] = &["id", "device", "started_at", "ended_at"];

const TABLES_V1: &[TableDescriptor] = &[
    TableDescriptor {
        name: "recordings",
        required_columns: RECORDINGS_COLS_V1,
    },
    TableDescriptor {
        name: "transcriptions",
        required_columns: TRANSCRIPTIONS_COLS_V1,
    },
    TableDescriptor {
        name: "settings",
        required_columns: SETTINGS_COLS,
    },
];

const TABLES_V2: &[TableDescriptor] = &[
    TableDescriptor {
        name: "recordings",
        required_columns: RECORDINGS_COLS_V2,
    },
    TableDescriptor {
        name: "transcriptions",
        required_columns: TRANSCRIPTIONS_COLS_V1,
    },
    TableDescriptor {
        name: "settings",
        required_columns: SETTINGS_COLS,
    },
    TableDescriptor {
        name: "summaries",
        required_columns: SUMMARIES_COLS,
    },
];

const TABLES_V3: &[TableDescriptor] = &[
    TableDescriptor {
        name: "recordings",
        required_columns: RECORDINGS_COLS_V2,
    },
    TableDescriptor {
        name: "transcriptions",
        required_columns: TRANSCRIPTIONS_COLS_V1,
    },
    TableDescriptor {
        name: "settings",
        required_columns: SETTINGS_COLS,
    },
    TableDescriptor {
        name: "summaries",
        required_columns: SUMMARIES_COLS,
    },
    TableDescriptor {
        name: "shares",
        required_columns: SHARES_COLS,
    },
    TableDescriptor {
        name: "analytics_events",
        required_columns: ANALYTICS_EVENTS_COLS,
    },
];

const TABLES_V4: &[TableDescriptor] = &[
    TableDescriptor {
        name: "recordings",
        required_columns: RECORDINGS_COLS_V2,
    },
    TableDescriptor {
        name: "transcriptions",
        required_columns: TRANSCRIPTIONS_COLS_V4,
    },
    TableDescriptor {
        name: "settings",
        required_columns: SETTINGS_COLS,
    },
    TableDescriptor {
        name: "summaries",
        required_columns: SUMMARIES_COLS,
    },
    TableDescriptor {
        name: "shares",
        required_columns: SHARES_COLS,
    },
    TableDescriptor {
        name: "analytics_events",
        required_columns: ANALYTICS_EVENTS_COLS,
    },
    TableDescriptor {
        name: "sessions",
        required_columns: SESSIONS_COLS,
    },
];

/// Ordered mutations that bootstrap a fresh database at version 1.
///
/// Exercised by the connection bootstrap path only; the migration executor
/// never replays the initial schema.
pub fn initial_schema() -> &'static [SchemaMutation] {
    INITIAL_SCHEMA
}

/// Returns the registered step advancing `from_version` by one, if any.
///
/// Absence means `from_version + 1` is past the known schema history.
pub fn step_for(from_version: u32) -> Option<&'static MigrationStep> {
    STEPS
        .iter()
        .find(|step| step.from_version == from_version)
}

/// Latest schema version reachable through registered steps.
pub fn latest_version() -> u32 {
    STEPS
        .last()
        .map_or(INITIAL_VERSION, |step| step.to_version)
}

/// Tables (and required columns) that must exist at `version`.
///
/// Versions past the registered history share the latest known shape,
/// since unregistered steps add no structure.
pub fn required_tables(version: u32) -> &'static [TableDescriptor] {
    match version {
        0 | 1 => TABLES_V1,
        2 => TABLES_V2,
        3 => TABLES_V3,
        _ => TABLES_V4,
    }
}

#[cfg(test)]
mod tests {
    use super::{latest_version, required_tables, step_for, SchemaMutation, STEPS};

    #[test]
    fn steps_are_contiguous_single_increments() {
        let mut expected_from = 1;
        for step in STEPS {
            assert_eq!(step.from_version, expected_from);
            assert_eq!(step.to_version, step.from_version + 1);
            expected_from = step.to_version;
        }
        assert_eq!(latest_version(), expected_from);
    }

    #[test]
    fn step_lookup_matches_registration() {
        assert_eq!(step_for(1).map(|step| step.to_version), Some(2));
        assert_eq!(step_for(3).map(|step| step.to_version), Some(4));
        assert!(step_for(latest_version()).is_none());
        assert!(step_for(0).is_none());
    }

    #[test]
    fn add_column_and_backfill_render_expected_sql() {
        let add = SchemaMutation::AddColumn {
            table: "transcriptions",
            column: "language",
            decl: "TEXT DEFAULT 'en'",
        };
        assert_eq!(
            add.to_sql(),
            "ALTER TABLE transcriptions ADD COLUMN language TEXT DEFAULT 'en';"
        );

        let backfill = SchemaMutation::BackfillDefault {
            table: "transcriptions",
            column: "language",
            default: "'en'",
        };
        assert_eq!(
            backfill.to_sql(),
            "UPDATE transcriptions SET language = 'en' WHERE language IS NULL;"
        );
    }

    #[test]
    fn required_tables_grow_with_version() {
        assert_eq!(required_tables(1).len(), 3);
        assert_eq!(required_tables(4).len(), 7);
        // Unregistered future versions keep the latest known shape.
        assert_eq!(required_tables(10).len(), 7);
    }
}
