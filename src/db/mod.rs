// Database module

pub mod migrations;
pub mod query;
pub mod schema;

use std::path::{Path, PathBuf};

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Transaction};

use crate::constants::{CACHE_FOLDER, DB_FILENAME};
use crate::error::{classify, CacheError, Result};
use query::{Fetch, Fetched, Filter, FromRecord, Record};

/// Get the cache database path for a source root
pub fn get_db_path(root: &Path) -> PathBuf {
    root.join(CACHE_FOLDER).join(DB_FILENAME)
}

/// Get the cache folder path for a source root
pub fn get_cache_path(root: &Path) -> PathBuf {
    root.join(CACHE_FOLDER)
}

/// Open a connection with the per-connection pragmas applied
fn open_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;

    // Enable foreign keys (must be done per connection)
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    // Enable WAL mode for better concurrency
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;

    Ok(conn)
}

fn run_statement(conn: &Connection, sql: &str, params: &[Value], fetch: Fetch) -> rusqlite::Result<Fetched> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let fetched = match fetch {
        Fetch::LastInsertId => {
            stmt.execute(params_from_iter(params.iter()))?;
            Fetched::LastInsertId(conn.last_insert_rowid())
        }
        Fetch::One => {
            let mut rows = stmt.query(params_from_iter(params.iter()))?;
            let row = match rows.next()? {
                Some(row) => Some(Record::read(row, &columns)?),
                None => None,
            };
            Fetched::Row(row)
        }
        Fetch::All => {
            let mut rows = stmt.query(params_from_iter(params.iter()))?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(Record::read(row, &columns)?);
            }
            Fetched::Rows(records)
        }
    };

    Ok(fetched)
}

/// Handle on one root's cache file.
///
/// Holds only the path, never a Connection. Every operation opens a short-lived
/// connection, so a single statement commits on its own. Multi-statement writes
/// go through [`CacheStore::transaction`].
#[derive(Debug, Clone)]
pub struct CacheStore {
    db_path: PathBuf,
}

impl CacheStore {
    pub fn for_root(root: &Path) -> Self {
        CacheStore {
            db_path: get_db_path(root),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn is_initialized(&self) -> bool {
        self.db_path.exists()
    }

    /// Create the cache file and apply the schema
    pub fn initialize(&self) -> Result<()> {
        if let Some(folder) = self.db_path.parent() {
            std::fs::create_dir_all(folder)?;
        }
        let conn = open_connection(&self.db_path)?;
        migrations::run_migrations(&conn)?;
        log::info!("Initialized cache at {}", self.db_path.display());
        Ok(())
    }

    /// Remove the cache folder and everything in it
    pub fn destroy(&self) -> Result<()> {
        if let Some(folder) = self.db_path.parent() {
            if folder.exists() {
                std::fs::remove_dir_all(folder)?;
                log::info!("Removed cache at {}", folder.display());
            }
        }
        Ok(())
    }

    /// Open a short-lived connection. Fails if the cache was never initialized.
    pub fn connect(&self) -> Result<Connection> {
        if !self.is_initialized() {
            return Err(CacheError::NotInitialized(self.db_path.clone()));
        }
        let conn = open_connection(&self.db_path)?;
        migrations::run_migrations(&conn)?;
        Ok(conn)
    }

    /// Execute one statement on its own connection and commit it.
    /// A uniqueness violation surfaces as `AlreadyExists` in every fetch mode.
    pub fn execute(&self, sql: &str, params: &[Value], fetch: Fetch) -> Result<Fetched> {
        let conn = self.connect()?;
        run_statement(&conn, sql, params, fetch).map_err(|e| classify(e, || sql.to_string()))
    }

    /// First entity of type `T` matching the filter
    pub fn get_row<T: FromRecord>(&self, filter: &Filter) -> Result<Option<T>> {
        let (sql, params) = filter.to_select(T::VIEW)?;
        self.execute(&sql, &params, Fetch::One)?
            .into_row()
            .map(|record| T::from_record(&record))
            .transpose()
    }

    /// All entities of type `T` matching the filter, ordered by id
    pub fn get_rows<T: FromRecord>(&self, filter: &Filter) -> Result<Vec<T>> {
        let (sql, params) = filter.to_select(T::VIEW)?;
        self.execute(&sql, &params, Fetch::All)?
            .into_rows()
            .iter()
            .map(T::from_record)
            .collect()
    }

    /// Run `f` inside one transaction on one connection. Rolls back on error.
    pub fn transaction<T>(&self, f: impl FnOnce(&Transaction) -> Result<T>) -> Result<T> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}
