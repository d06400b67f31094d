// Entity writer: cascading series -> season -> episode upserts
//
// Every function takes the caller's connection. The driver passes a transaction,
// so a cascade either lands completely or not at all.

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::constants::PROVIDER_DATE_FORMATS;
use crate::db::schema::{self, Episode, Season, Series, Upserted};
use crate::error::{CacheError, Result};
use crate::ingest::ResolvedItem;
use crate::remote::RemoteEpisode;

/// What to do when a series that is already cached is resolved again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesPolicy {
    /// Keep the row written first.
    #[default]
    Skip,
    /// Overwrite the cached metadata with the newly resolved values.
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonOutcome {
    pub series: Upserted,
    pub season: Upserted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeOutcome {
    pub series: Upserted,
    pub season: Upserted,
    pub episode: Upserted,
}

impl CascadeOutcome {
    pub fn is_duplicate(&self) -> bool {
        self.episode == Upserted::Existing
    }
}

pub fn coerce_int(field: &'static str, raw: &str) -> Result<i64> {
    raw.trim().parse().map_err(|_| CacheError::InvalidField {
        field,
        value: raw.to_string(),
    })
}

/// Blank or missing values become None; anything else must be an integer.
pub fn coerce_opt_int(field: &'static str, raw: Option<&str>) -> Result<Option<i64>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => coerce_int(field, value).map(Some),
    }
}

/// Parse a provider date. Missing or unreadable dates are stored as NULL.
pub fn parse_provider_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    let parsed = PROVIDER_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok());
    if parsed.is_none() {
        log::warn!("Ignoring unparseable provider date {:?}", raw);
    }
    parsed
}

fn remote_of(item: &ResolvedItem) -> Result<&RemoteEpisode> {
    item.remote
        .as_ref()
        .ok_or_else(|| CacheError::IncompleteEpisode(item.relative_path.clone()))
}

fn series_row(remote: &RemoteEpisode) -> Result<Series> {
    let series = &remote.season.series;
    Ok(Series {
        id: coerce_int("series.id", &series.id)?,
        title: series.name.clone(),
        summary: series.overview.clone(),
        start_date: parse_provider_date(series.first_aired.as_deref()),
        runtime_minutes: coerce_opt_int("series.runtime", series.runtime.as_deref())?,
        network: series.network.clone(),
    })
}

fn season_row(remote: &RemoteEpisode) -> Result<Season> {
    Ok(Season {
        id: coerce_int("season.id", &remote.season.id)?,
        season_number: coerce_int("season.number", &remote.season.number)?,
        series_id: coerce_int("series.id", &remote.season.series.id)?,
        series_title: None,
    })
}

fn episode_row(item: &ResolvedItem, remote: &RemoteEpisode) -> Result<Episode> {
    Ok(Episode {
        id: coerce_int("episode.id", &remote.id)?,
        episode_number: coerce_int("episode.episode_number", &remote.episode_number)?,
        extra_episode_number: item.item.extra_episode_number.map(i64::from),
        title: remote.name.clone(),
        summary: remote.overview.clone(),
        air_date: parse_provider_date(remote.first_aired.as_deref()),
        file_path: item.relative_path.clone(),
        season_id: coerce_int("season.id", &remote.season.id)?,
        season_number: None,
        series_id: None,
        series_title: None,
    })
}

pub fn write_series(conn: &Connection, item: &ResolvedItem, policy: SeriesPolicy) -> Result<Upserted> {
    let series = series_row(remote_of(item)?)?;
    let outcome = schema::upsert_series(conn, &series, policy == SeriesPolicy::Refresh)?;
    match outcome {
        Upserted::Created => log::info!("Cached series {} ({})", series.title, series.id),
        Upserted::Updated => log::info!("Refreshed series {} ({})", series.title, series.id),
        Upserted::Existing => {}
    }
    Ok(outcome)
}

pub fn write_season(conn: &Connection, item: &ResolvedItem, policy: SeriesPolicy) -> Result<SeasonOutcome> {
    let season = season_row(remote_of(item)?)?;
    let series = write_series(conn, item, policy)?;
    let outcome = schema::upsert_season(conn, &season)?;
    if outcome.is_created() {
        log::info!("Cached season {} of series {}", season.season_number, season.series_id);
    }
    Ok(SeasonOutcome { series, season: outcome })
}

/// Persist the episode for a resolved item, creating its season and series first
/// when they are not cached yet.
pub fn write_episode(conn: &Connection, item: &ResolvedItem, policy: SeriesPolicy) -> Result<CascadeOutcome> {
    let remote = remote_of(item)?;
    let episode = episode_row(item, remote)?;
    let parents = write_season(conn, item, policy)?;
    let outcome = schema::upsert_episode(conn, &episode)?;
    Ok(CascadeOutcome {
        series: parents.series,
        season: parents.season,
        episode: outcome,
    })
}
