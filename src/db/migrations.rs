// Cache migrations
// Migrations are forward-only. Never edit or delete a migration after it ships.

use rusqlite::Connection;

use crate::error::{CacheError, Result};

/// All migrations in order. Each migration is a SQL string.
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    CREATE TABLE series (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        summary TEXT,
        start_date TEXT,
        runtime_minutes INTEGER,
        network TEXT
    );

    CREATE TABLE season (
        id INTEGER PRIMARY KEY,
        season_number INTEGER NOT NULL,
        series_id INTEGER NOT NULL REFERENCES series(id)
    );

    CREATE TABLE episode (
        id INTEGER PRIMARY KEY,
        episode_number INTEGER NOT NULL,
        extra_episode_number INTEGER,
        title TEXT,
        summary TEXT,
        air_date TEXT,
        file_path TEXT NOT NULL,
        season_id INTEGER NOT NULL REFERENCES season(id)
    );

    -- Items that could not be matched, with every ancestor directory as its own row
    CREATE TABLE unparsed_episode (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        child_path TEXT NOT NULL UNIQUE,
        parent_path TEXT,
        filename TEXT NOT NULL
    );

    CREATE VIEW series_view AS
        SELECT id, title, summary, start_date, runtime_minutes, network
        FROM series;

    CREATE VIEW season_view AS
        SELECT s.id, s.season_number, s.series_id, sr.title AS series_title
        FROM season s
        JOIN series sr ON sr.id = s.series_id;

    CREATE VIEW episode_view AS
        SELECT e.id, e.episode_number, e.extra_episode_number, e.title, e.summary,
               e.air_date, e.file_path, e.season_id,
               s.season_number, s.series_id, sr.title AS series_title
        FROM episode e
        JOIN season s ON s.id = e.season_id
        JOIN series sr ON sr.id = s.series_id;

    CREATE INDEX idx_season_series ON season(series_id);
    CREATE INDEX idx_episode_season ON episode(season_id);
    CREATE INDEX idx_episode_file_path ON episode(file_path);
    CREATE INDEX idx_unparsed_parent ON unparsed_episode(parent_path);
    "#,
];

/// Get current schema version from database
fn get_schema_version(conn: &Connection) -> Result<u32> {
    let version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version)
}

/// Number of migrations this build knows about
pub fn latest_version() -> u32 {
    MIGRATIONS.len() as u32
}

/// Run all pending migrations (crash-safe)
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    let target_version = latest_version();

    // Refuse to touch a cache written by a newer build
    if current_version > target_version {
        return Err(CacheError::SchemaTooNew {
            found: current_version,
            supported: target_version,
        });
    }

    if current_version == target_version {
        return Ok(());
    }

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let migration_version = (i + 1) as u32;
        if migration_version <= current_version {
            continue;
        }

        conn.execute_batch(&format!(
            "BEGIN;\n{}\nPRAGMA user_version = {};\nCOMMIT;",
            migration, migration_version
        ))?;

        log::info!("Applied cache migration {}", migration_version);
    }

    Ok(())
}
