//! Remote metadata model and the lookup seam.
//!
//! Provider payloads arrive text-typed (ids, numbers and dates are all strings);
//! coercion happens later, at the write boundary in [`crate::writer`].

pub mod catalog;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ingest::LocalItem;

pub use catalog::JsonCatalog;

/// Expected per-item failures. Each one is recovered by ledgering the item.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("show not found: {0}")]
    ShowNotFound(String),

    #[error("season {season} not found for {show}")]
    SeasonNotFound { show: String, season: u32 },

    #[error("episode {episode} of season {season} not found for {show}")]
    EpisodeNotFound { show: String, season: u32, episode: u32 },

    #[error("not enough parsed information to look up {0}")]
    Incomplete(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSeries {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub first_aired: Option<String>,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSeason {
    pub id: String,
    pub number: String,
    pub series: RemoteSeries,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEpisode {
    pub id: String,
    pub episode_number: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub first_aired: Option<String>,
    pub season: RemoteSeason,
}

/// Resolves a parsed local item against a metadata source.
///
/// `Ok(None)` means the source answered but had nothing to attach; the item is
/// kept as resolved without being written.
pub trait EpisodeLookup {
    fn lookup(&self, item: &LocalItem) -> Result<Option<RemoteEpisode>, LookupError>;
}

impl<T: EpisodeLookup + ?Sized> EpisodeLookup for &T {
    fn lookup(&self, item: &LocalItem) -> Result<Option<RemoteEpisode>, LookupError> {
        (**self).lookup(item)
    }
}
