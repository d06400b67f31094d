// Reconciliation pipeline module

pub mod discover;
pub mod parse;

#[cfg(test)]
mod tests;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};
use crate::ledger;
use crate::remote::{EpisodeLookup, RemoteEpisode};
use crate::session::{ResolvedItems, SourceSession};
use crate::writer::{self, SeriesPolicy};

/// A locally discovered file and whatever the filename parser could read from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalItem {
    pub path: PathBuf,
    pub series_name: Option<String>,
    pub season_number: Option<u32>,
    pub episode_number: Option<u32>,
    pub extra_episode_number: Option<u32>,
    pub title_hint: Option<String>,
}

impl LocalItem {
    /// Enough is known to ask a metadata source about this file.
    pub fn is_fully_parsed(&self) -> bool {
        self.series_name.is_some() && self.season_number.is_some() && self.episode_number.is_some()
    }
}

/// A local item after lookup, keyed by its root-relative path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedItem {
    pub relative_path: String,
    pub item: LocalItem,
    pub remote: Option<RemoteEpisode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileOptions {
    pub series_policy: SeriesPolicy,
    /// Ledger items the parser could not complete instead of skipping them.
    pub ledger_incomplete: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        ReconcileOptions {
            series_policy: SeriesPolicy::Skip,
            ledger_incomplete: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub total: usize,
    pub persisted: usize,
    pub duplicates: usize,
    pub no_match: usize,
    pub skipped: usize,
    pub write_failed: usize,
    /// Relative paths that could not be resolved, in processing order.
    pub unresolved: Vec<String>,
}

impl ReconcileSummary {
    pub fn failure_report(&self) -> String {
        format!(
            "{} item(s) could not be resolved:\n{}",
            self.unresolved.len(),
            self.unresolved.join("\n")
        )
    }
}

/// Ledger a failed path. Store errors are logged; the run carries on.
fn ledger_failure(session: &SourceSession, summary: &mut ReconcileSummary, relative_path: String) {
    match session.store().transaction(|tx| ledger::record(tx, &relative_path)) {
        Ok(outcome) if outcome.inserted == 0 => {
            log::debug!("{} was already in the unresolved ledger", relative_path);
        }
        Ok(_) => {}
        Err(e) => log::error!("Failed to ledger {}: {}", relative_path, e),
    }
    summary.unresolved.push(relative_path);
}

/// Write a resolved item's cascade and clear any stale ledger entry in one transaction.
fn persist(
    session: &SourceSession,
    summary: &mut ReconcileSummary,
    item: &ResolvedItem,
    options: &ReconcileOptions,
) {
    let result = session.store().transaction(|tx| {
        let outcome = writer::write_episode(tx, item, options.series_policy)?;
        let cleared = ledger::resolve(tx, &item.relative_path)?;
        if cleared > 0 {
            log::info!("{} resolved, removed {} ledger entries", item.relative_path, cleared);
        }
        Ok(outcome)
    });

    match result {
        Ok(outcome) if outcome.is_duplicate() => {
            log::info!("Episode for {} is already cached", item.relative_path);
            summary.duplicates += 1;
        }
        Ok(_) => summary.persisted += 1,
        Err(e) => {
            log::error!("Failed to write {}: {}", item.relative_path, e);
            summary.write_failed += 1;
        }
    }
}

/// Run one pass over a source's parsed items.
///
/// Lookup failures are ledgered, successes are written, and neither kind of
/// per-item failure stops the pass. Only a missing cache aborts up front.
pub fn run_reconcile<I, L>(
    session: &SourceSession,
    resolved: &mut ResolvedItems,
    items: I,
    lookup: &L,
    options: &ReconcileOptions,
) -> Result<ReconcileSummary>
where
    I: IntoIterator<Item = LocalItem>,
    L: EpisodeLookup + ?Sized,
{
    if !session.store().is_initialized() {
        return Err(CacheError::NotInitialized(session.store().db_path().to_path_buf()));
    }

    log::info!("Reconciling {}", session.root().display());
    let mut summary = ReconcileSummary::default();

    for item in items {
        summary.total += 1;

        let relative_path = match session.relative_path(&item.path) {
            Ok(p) => p,
            Err(e) => {
                log::error!("Skipping {}: {}", item.path.display(), e);
                summary.skipped += 1;
                continue;
            }
        };

        if !item.is_fully_parsed() {
            if options.ledger_incomplete {
                log::warn!("Could not parse {}", relative_path);
                ledger_failure(session, &mut summary, relative_path);
            } else {
                log::debug!("Skipping unparsed {}", relative_path);
                summary.skipped += 1;
            }
            continue;
        }

        match lookup.lookup(&item) {
            Err(e) => {
                log::warn!("Unresolved {}: {}", relative_path, e);
                ledger_failure(session, &mut summary, relative_path);
            }
            Ok(remote) => {
                let resolved_item = ResolvedItem {
                    relative_path,
                    item,
                    remote,
                };
                if resolved_item.remote.is_some() {
                    persist(session, &mut summary, &resolved_item, options);
                } else {
                    log::info!("No metadata attached for {}", resolved_item.relative_path);
                    summary.no_match += 1;
                }
                resolved.insert(resolved_item);
            }
        }
    }

    log::info!(
        "Reconciled {} item(s): {} written, {} already cached, {} unresolved, {} failed writes",
        summary.total,
        summary.persisted,
        summary.duplicates,
        summary.unresolved.len(),
        summary.write_failed
    );
    if !summary.unresolved.is_empty() {
        log::warn!("{}", summary.failure_report());
    }

    Ok(summary)
}

/// Discover, parse and reconcile everything under the session root.
pub fn reconcile_root<L>(
    session: &SourceSession,
    resolved: &mut ResolvedItems,
    lookup: &L,
    options: &ReconcileOptions,
) -> Result<ReconcileSummary>
where
    L: EpisodeLookup + ?Sized,
{
    let files = discover::discover_media_files(session.root())?;
    let items = parse::parse_items(session.root(), files);
    run_reconcile(session, resolved, items, lookup, options)
}
