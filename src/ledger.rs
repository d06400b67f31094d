// Unresolved ledger
// Every failed path is stored together with each of its ancestor directories, so
// "everything unresolved under X" is a single parent_path lookup.

use rusqlite::Connection;

use crate::constants::PATH_DB_SEPARATOR;
use crate::db::query::Filter;
use crate::db::schema::{self, UnresolvedItem};
use crate::db::CacheStore;
use crate::error::{CacheError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerOutcome {
    pub inserted: usize,
    pub already_present: usize,
}

/// Split `a/b/c.mkv` into (`Some("a/b")`, `"c.mkv"`); a root-level name has no parent.
pub fn split_path(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once(PATH_DB_SEPARATOR) {
        Some((parent, filename)) => (Some(parent), filename),
        None => (None, path),
    }
}

/// Record a failed relative path and walk upward until a root-level entry is written.
pub fn record(conn: &Connection, child_path: &str) -> Result<LedgerOutcome> {
    let mut child = child_path.trim_matches(PATH_DB_SEPARATOR);
    if child.is_empty() {
        return Err(CacheError::InvalidPath(format!("empty ledger path {:?}", child_path)));
    }

    let mut outcome = LedgerOutcome::default();

    loop {
        let (parent, filename) = split_path(child);

        match schema::insert_unresolved(conn, child, parent, filename) {
            Ok(_) => outcome.inserted += 1,
            Err(e) if e.is_already_exists() => {
                log::debug!("Ledger already has {}", child);
                outcome.already_present += 1;
            }
            Err(e) => return Err(e),
        }

        match parent {
            Some(p) => child = p,
            None => break,
        }
    }

    Ok(outcome)
}

/// Drop the entry for a path that has since been resolved, then prune ancestor
/// directories left without children. Returns the number of rows removed.
pub fn resolve(conn: &Connection, child_path: &str) -> Result<usize> {
    let mut child = child_path.trim_matches(PATH_DB_SEPARATOR);
    let mut removed = 0;

    if !schema::delete_unresolved(conn, child)? {
        return Ok(0);
    }
    removed += 1;

    while let (Some(parent), _) = split_path(child) {
        if schema::count_unresolved_children(conn, parent)? > 0 {
            break;
        }
        if schema::delete_unresolved(conn, parent)? {
            removed += 1;
        }
        child = parent;
    }

    Ok(removed)
}

/// All entries directly under `parent_path`; `None` lists root-level entries.
pub fn query(store: &CacheStore, parent_path: Option<&str>) -> Result<Vec<UnresolvedItem>> {
    let filter = Filter::new().eq_opt("parent_path", parent_path.map(str::to_string));
    store.get_rows(&filter)
}

/// The entry recorded for exactly this path, if any.
pub fn lookup(store: &CacheStore, child_path: &str) -> Result<Vec<UnresolvedItem>> {
    store.get_rows(&Filter::new().eq("child_path", child_path.to_string()))
}

pub fn list_all(store: &CacheStore) -> Result<Vec<UnresolvedItem>> {
    store.get_rows(&Filter::new())
}
