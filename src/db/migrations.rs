// Database migrations
// Migrations are forward-only. Never edit or delete a migration after it ships.
// They cover the fixed tables only; DataTable and MarkersTable are generated
// from the template (see template.rs).

use rusqlite::Connection;
use anyhow::Result;

/// All migrations in order. Each migration is a SQL string.
const MIGRATIONS: &[&str] = &[
    // Migration 1: Template, session and recognition tables
    r#"
    -- One row per template field
    CREATE TABLE TemplateTable (
        Id INTEGER PRIMARY KEY AUTOINCREMENT,
        ControlOrder INTEGER NOT NULL DEFAULT 0,
        SpreadsheetOrder INTEGER NOT NULL DEFAULT 0,
        Type TEXT NOT NULL,
        DefaultValue TEXT NOT NULL DEFAULT '',
        Label TEXT NOT NULL DEFAULT '',
        DataLabel TEXT NOT NULL UNIQUE,
        Tooltip TEXT NOT NULL DEFAULT '',
        Width INTEGER NOT NULL DEFAULT 100,
        Copyable TEXT NOT NULL DEFAULT 'true',
        Visible TEXT NOT NULL DEFAULT 'true',
        List TEXT NOT NULL DEFAULT '[]'
    );

    -- Session singleton
    CREATE TABLE ImageSetTable (
        Id INTEGER PRIMARY KEY AUTOINCREMENT,
        Log TEXT NOT NULL DEFAULT '',
        Selection TEXT NOT NULL DEFAULT '0',
        SelectedFolder TEXT NOT NULL DEFAULT '',
        MostRecentFileId TEXT NOT NULL DEFAULT '',
        SortTerms TEXT NOT NULL DEFAULT '',
        QuickPaste TEXT NOT NULL DEFAULT '[]',
        VersionCompatibility TEXT NOT NULL DEFAULT ''
    );

    -- Recognition categories
    CREATE TABLE DetectionCategories (
        category TEXT PRIMARY KEY,
        label TEXT NOT NULL
    );

    CREATE TABLE ClassificationCategories (
        category TEXT PRIMARY KEY,
        label TEXT NOT NULL
    );

    -- One row per bounding box; Id is the file's DataTable Id
    CREATE TABLE Detections (
        detectionID INTEGER PRIMARY KEY AUTOINCREMENT,
        category TEXT NOT NULL,
        conf REAL NOT NULL,
        bbox TEXT NOT NULL DEFAULT '',
        Id INTEGER NOT NULL
    );

    CREATE TABLE Classifications (
        classificationID INTEGER PRIMARY KEY AUTOINCREMENT,
        category TEXT NOT NULL,
        conf REAL NOT NULL,
        detectionID INTEGER NOT NULL REFERENCES Detections(detectionID)
    );

    CREATE INDEX idx_detections_file ON Detections(Id);
    CREATE INDEX idx_classifications_detection ON Classifications(detectionID);
    "#,
];

/// The file's schema version, kept in `PRAGMA user_version`.
fn schema_version(conn: &Connection) -> Result<u32> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

/// Bring the fixed tables up to date. Each step and its version bump commit
/// together, so an interrupted upgrade resumes at the failed step.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let known = MIGRATIONS.len() as u32;
    let found = schema_version(conn)?;
    if found > known {
        anyhow::bail!("Image set database is at schema {} but only {} is understood", found, known);
    }

    for (version, sql) in (1..=known).zip(MIGRATIONS.iter()).skip(found as usize) {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
        log::info!("Image set schema upgraded to {}", version);
    }
    Ok(())
}
