// Source session: one root directory and its cache

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use crate::constants::PATH_DB_SEPARATOR;
use crate::db::query::Filter;
use crate::db::schema::{Episode, Season, Series, UnresolvedItem};
use crate::db::CacheStore;
use crate::error::{CacheError, Result};
use crate::ingest::ResolvedItem;
use crate::ledger;

/// Immutable context for one reconciliation run over one root directory.
#[derive(Debug, Clone)]
pub struct SourceSession {
    root: PathBuf,
    store: CacheStore,
}

impl SourceSession {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let store = CacheStore::for_root(&root);
        SourceSession { root, store }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn initialize_database(&self) -> Result<()> {
        self.store.initialize()
    }

    pub fn destroy_database(&self) -> Result<()> {
        self.store.destroy()
    }

    /// Root-relative, `/`-separated form of an absolute path under the root.
    pub fn relative_path(&self, path: &Path) -> Result<String> {
        let relative = path.strip_prefix(&self.root).map_err(|_| {
            CacheError::InvalidPath(format!(
                "{} is not under {}",
                path.display(),
                self.root.display()
            ))
        })?;

        let parts: Vec<String> = relative
            .components()
            .map(|c| match c {
                Component::Normal(s) => s.to_str().map(str::to_string).ok_or_else(|| {
                    CacheError::InvalidPath(format!("{} is not valid UTF-8", path.display()))
                }),
                other => Err(CacheError::InvalidPath(format!(
                    "unexpected component {:?} in {}",
                    other,
                    path.display()
                ))),
            })
            .collect::<Result<_>>()?;

        if parts.is_empty() {
            return Err(CacheError::InvalidPath(format!("{} is the root itself", path.display())));
        }
        Ok(parts.join(&PATH_DB_SEPARATOR.to_string()))
    }

    pub fn series(&self, id: i64) -> Result<Option<Series>> {
        self.store.get_row(&Filter::by_id(id))
    }

    pub fn season(&self, id: i64) -> Result<Option<Season>> {
        self.store.get_row(&Filter::by_id(id))
    }

    pub fn episode(&self, id: i64) -> Result<Option<Episode>> {
        self.store.get_row(&Filter::by_id(id))
    }

    pub fn series_where(&self, filter: &Filter) -> Result<Vec<Series>> {
        self.store.get_rows(filter)
    }

    pub fn seasons_where(&self, filter: &Filter) -> Result<Vec<Season>> {
        self.store.get_rows(filter)
    }

    pub fn episodes_where(&self, filter: &Filter) -> Result<Vec<Episode>> {
        self.store.get_rows(filter)
    }

    pub fn unresolved_under(&self, parent_path: Option<&str>) -> Result<Vec<UnresolvedItem>> {
        ledger::query(&self.store, parent_path)
    }

    pub fn unresolved_at(&self, child_path: &str) -> Result<Vec<UnresolvedItem>> {
        ledger::lookup(&self.store, child_path)
    }
}

/// Items resolved during the current run, keyed by relative path.
#[derive(Debug, Clone, Default)]
pub struct ResolvedItems {
    items: BTreeMap<String, ResolvedItem>,
}

impl ResolvedItems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, relative_path: &str) -> Option<&ResolvedItem> {
        self.items.get(relative_path)
    }

    /// Store an item under its relative path, returning any item it replaced.
    pub fn insert(&mut self, item: ResolvedItem) -> Option<ResolvedItem> {
        self.items.insert(item.relative_path.clone(), item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolvedItem)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }
}
