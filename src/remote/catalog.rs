// Offline metadata catalog loaded from a JSON document

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{EpisodeLookup, LookupError, RemoteEpisode, RemoteSeason, RemoteSeries};
use crate::error::Result;
use crate::ingest::LocalItem;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonCatalog {
    #[serde(default)]
    pub series: Vec<CatalogSeries>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSeries {
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
    #[serde(default)]
    pub seasons: Vec<CatalogSeason>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSeason {
    pub id: String,
    pub number: String,
    #[serde(default)]
    pub episodes: Vec<CatalogEpisode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEpisode {
    pub id: String,
    pub number: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub first_aired: Option<String>,
}

/// Lowercase alphanumerics only, so "Doctor.Who" and "doctor who" compare equal.
fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

fn same_number(raw: &str, wanted: u32) -> bool {
    raw.trim().parse::<u32>().map(|n| n == wanted).unwrap_or(false)
}

impl JsonCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    fn find_series(&self, name: &str) -> Option<&CatalogSeries> {
        let wanted = normalize_name(name);
        self.series.iter().find(|s| normalize_name(&s.name) == wanted)
    }
}

impl CatalogSeries {
    fn to_remote(&self) -> RemoteSeries {
        RemoteSeries {
            id: self.id.clone(),
            name: self.name.clone(),
            overview: self.overview.clone(),
            first_aired: self.first_aired.clone(),
            runtime: self.runtime.clone(),
            network: self.network.clone(),
        }
    }
}

impl EpisodeLookup for JsonCatalog {
    fn lookup(&self, item: &LocalItem) -> std::result::Result<Option<RemoteEpisode>, LookupError> {
        let (show, season_number, episode_number) = match (
            item.series_name.as_deref(),
            item.season_number,
            item.episode_number,
        ) {
            (Some(show), Some(season), Some(episode)) => (show, season, episode),
            _ => return Err(LookupError::Incomplete(item.path.display().to_string())),
        };

        let series = self
            .find_series(show)
            .ok_or_else(|| LookupError::ShowNotFound(show.to_string()))?;

        let season = series
            .seasons
            .iter()
            .find(|s| same_number(&s.number, season_number))
            .ok_or_else(|| LookupError::SeasonNotFound {
                show: series.name.clone(),
                season: season_number,
            })?;

        let episode = season
            .episodes
            .iter()
            .find(|e| same_number(&e.number, episode_number))
            .ok_or_else(|| LookupError::EpisodeNotFound {
                show: series.name.clone(),
                season: season_number,
                episode: episode_number,
            })?;

        Ok(Some(RemoteEpisode {
            id: episode.id.clone(),
            episode_number: episode.number.clone(),
            name: episode.name.clone(),
            overview: episode.overview.clone(),
            first_aired: episode.first_aired.clone(),
            season: RemoteSeason {
                id: season.id.clone(),
                number: season.number.clone(),
                series: series.to_remote(),
            },
        }))
    }
}
