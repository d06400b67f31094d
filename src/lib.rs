// Showcache - Library Entry Point
//
// Reconciles locally discovered episode files against a metadata source and keeps
// the result in a per-root SQLite cache, alongside a ledger of what failed.

pub mod constants;
pub mod error;
pub mod db;
pub mod remote;
pub mod writer;
pub mod ledger;
pub mod ingest;
pub mod session;

pub use error::{CacheError, Result};
pub use ingest::{reconcile_root, run_reconcile, LocalItem, ReconcileOptions, ReconcileSummary, ResolvedItem};
pub use remote::{EpisodeLookup, JsonCatalog, LookupError, RemoteEpisode};
pub use session::{ResolvedItems, SourceSession};
pub use writer::SeriesPolicy;
