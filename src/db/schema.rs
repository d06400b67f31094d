// Database schema types and query helpers

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::query::{FromRecord, Record, View};
use crate::constants::STORAGE_DATE_FORMAT;
use crate::error::{classify, Result};

/// Whether an upsert created, kept, or overwrote a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Upserted {
    Created,
    Existing,
    Updated,
}

impl Upserted {
    pub fn is_created(self) -> bool {
        self == Upserted::Created
    }
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(STORAGE_DATE_FORMAT).to_string())
}

fn read_date(record: &Record, column: &str) -> Result<Option<NaiveDate>> {
    let raw: Option<String> = record.get(column)?;
    Ok(raw.and_then(|s| NaiveDate::parse_from_str(&s, STORAGE_DATE_FORMAT).ok()))
}

fn exists_in(conn: &Connection, view: View, id: i64) -> Result<bool> {
    let sql = format!("SELECT id FROM {} WHERE id = ?1", view.name());
    let found = conn
        .query_row(&sql, params![id], |row| row.get::<_, i64>(0))
        .optional()?;
    Ok(found.is_some())
}

// ----- Series -----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub id: i64,
    pub title: String,
    pub summary: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub runtime_minutes: Option<i64>,
    pub network: Option<String>,
}

impl FromRecord for Series {
    const VIEW: View = View::Series;

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Series {
            id: record.get("id")?,
            title: record.get("title")?,
            summary: record.get("summary")?,
            start_date: read_date(record, "start_date")?,
            runtime_minutes: record.get("runtime_minutes")?,
            network: record.get("network")?,
        })
    }
}

/// Insert a series row, or update it in place when `refresh` is set.
pub fn upsert_series(conn: &Connection, series: &Series, refresh: bool) -> Result<Upserted> {
    let existed = series_exists(conn, series.id)?;

    if existed && !refresh {
        return Ok(Upserted::Existing);
    }

    if existed {
        conn.execute(
            "UPDATE series SET title = ?2, summary = ?3, start_date = ?4, runtime_minutes = ?5, network = ?6
             WHERE id = ?1",
            params![
                series.id,
                series.title,
                series.summary,
                format_date(series.start_date),
                series.runtime_minutes,
                series.network,
            ],
        )?;
        return Ok(Upserted::Updated);
    }

    conn.execute(
        "INSERT INTO series (id, title, summary, start_date, runtime_minutes, network)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            series.id,
            series.title,
            series.summary,
            format_date(series.start_date),
            series.runtime_minutes,
            series.network,
        ],
    )
    .map_err(|e| classify(e, || format!("series {}", series.id)))?;
    Ok(Upserted::Created)
}

pub fn series_exists(conn: &Connection, id: i64) -> Result<bool> {
    exists_in(conn, View::Series, id)
}

// ----- Season -----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Season {
    pub id: i64,
    pub season_number: i64,
    pub series_id: i64,
    /// Denormalized from the parent series; ignored on write.
    #[serde(default)]
    pub series_title: Option<String>,
}

impl FromRecord for Season {
    const VIEW: View = View::Season;

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Season {
            id: record.get("id")?,
            season_number: record.get("season_number")?,
            series_id: record.get("series_id")?,
            series_title: record.get("series_title")?,
        })
    }
}

pub fn upsert_season(conn: &Connection, season: &Season) -> Result<Upserted> {
    let changed = conn.execute(
        "INSERT INTO season (id, season_number, series_id) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO NOTHING",
        params![season.id, season.season_number, season.series_id],
    )?;
    Ok(if changed == 0 { Upserted::Existing } else { Upserted::Created })
}

pub fn season_exists(conn: &Connection, id: i64) -> Result<bool> {
    exists_in(conn, View::Season, id)
}

// ----- Episode -----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: i64,
    pub episode_number: i64,
    pub extra_episode_number: Option<i64>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub air_date: Option<NaiveDate>,
    /// Path relative to the source root, `/`-separated.
    pub file_path: String,
    pub season_id: i64,
    // Denormalized ancestor fields, only populated when read from episode_view
    #[serde(default)]
    pub season_number: Option<i64>,
    #[serde(default)]
    pub series_id: Option<i64>,
    #[serde(default)]
    pub series_title: Option<String>,
}

impl FromRecord for Episode {
    const VIEW: View = View::Episode;

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Episode {
            id: record.get("id")?,
            episode_number: record.get("episode_number")?,
            extra_episode_number: record.get("extra_episode_number")?,
            title: record.get("title")?,
            summary: record.get("summary")?,
            air_date: read_date(record, "air_date")?,
            file_path: record.get("file_path")?,
            season_id: record.get("season_id")?,
            season_number: record.get("season_number")?,
            series_id: record.get("series_id")?,
            series_title: record.get("series_title")?,
        })
    }
}

pub fn upsert_episode(conn: &Connection, episode: &Episode) -> Result<Upserted> {
    let changed = conn.execute(
        "INSERT INTO episode (id, episode_number, extra_episode_number, title, summary, air_date, file_path, season_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO NOTHING",
        params![
            episode.id,
            episode.episode_number,
            episode.extra_episode_number,
            episode.title,
            episode.summary,
            format_date(episode.air_date),
            episode.file_path,
            episode.season_id,
        ],
    )?;
    Ok(if changed == 0 { Upserted::Existing } else { Upserted::Created })
}

pub fn episode_exists(conn: &Connection, id: i64) -> Result<bool> {
    exists_in(conn, View::Episode, id)
}

// ----- Unresolved ledger -----

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedItem {
    pub id: i64,
    pub child_path: String,
    /// None marks a root-level entry.
    pub parent_path: Option<String>,
    pub filename: String,
}

impl FromRecord for UnresolvedItem {
    const VIEW: View = View::Unparsed;

    fn from_record(record: &Record) -> Result<Self> {
        Ok(UnresolvedItem {
            id: record.get("id")?,
            child_path: record.get("child_path")?,
            parent_path: record.get("parent_path")?,
            filename: record.get("filename")?,
        })
    }
}

/// Plain insert. A path that is already recorded surfaces as `AlreadyExists`.
pub fn insert_unresolved(conn: &Connection, child_path: &str, parent_path: Option<&str>, filename: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO unparsed_episode (child_path, parent_path, filename) VALUES (?1, ?2, ?3)",
        params![child_path, parent_path, filename],
    )
    .map_err(|e| classify(e, || format!("unresolved path {}", child_path)))?;
    Ok(conn.last_insert_rowid())
}

pub fn delete_unresolved(conn: &Connection, child_path: &str) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM unparsed_episode WHERE child_path = ?1",
        params![child_path],
    )?;
    Ok(changed > 0)
}

pub fn count_unresolved_children(conn: &Connection, parent_path: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM unparsed_episode WHERE parent_path = ?1",
        params![parent_path],
        |row| row.get(0),
    )?;
    Ok(count)
}
