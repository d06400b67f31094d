// Structured read queries over the cache views

use rusqlite::types::{FromSql, Value, ValueRef};

use crate::error::{CacheError, Result};

/// Read-only projections every read path goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Series,
    Season,
    Episode,
    Unparsed,
}

impl View {
    pub fn name(self) -> &'static str {
        match self {
            View::Series => "series_view",
            View::Season => "season_view",
            View::Episode => "episode_view",
            // The ledger has no joins, so it is read straight from its table
            View::Unparsed => "unparsed_episode",
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            View::Series => &["id", "title", "summary", "start_date", "runtime_minutes", "network"],
            View::Season => &["id", "season_number", "series_id", "series_title"],
            View::Episode => &[
                "id", "episode_number", "extra_episode_number", "title", "summary", "air_date",
                "file_path", "season_id", "season_number", "series_id", "series_title",
            ],
            View::Unparsed => &["id", "child_path", "parent_path", "filename"],
        }
    }

    fn column(self, name: &str) -> Result<&'static str> {
        self.columns()
            .iter()
            .copied()
            .find(|c| *c == name)
            .ok_or_else(|| CacheError::UnknownColumn {
                view: self.name(),
                column: name.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cmp {
    Eq(Value),
    IsNull,
    IsNotNull,
}

/// A conjunction of column predicates. Column names are checked against the
/// queried view before any SQL is built.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<(String, Cmp)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: i64) -> Self {
        Self::new().eq("id", id)
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.clauses.push((column.to_string(), Cmp::Eq(value.into())));
        self
    }

    /// Equality that degrades to `IS NULL` when the value is absent.
    pub fn eq_opt(self, column: &str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(v) => self.eq(column, v),
            None => self.is_null(column),
        }
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.clauses.push((column.to_string(), Cmp::IsNull));
        self
    }

    pub fn is_not_null(mut self, column: &str) -> Self {
        self.clauses.push((column.to_string(), Cmp::IsNotNull));
        self
    }

    /// Build `SELECT * FROM <view> [WHERE ...] ORDER BY id` plus its bound parameters.
    pub fn to_select(&self, view: View) -> Result<(String, Vec<Value>)> {
        let mut conditions = Vec::with_capacity(self.clauses.len());
        let mut params = Vec::new();

        for (column, cmp) in &self.clauses {
            let column = view.column(column)?;
            match cmp {
                Cmp::Eq(value) => {
                    params.push(value.clone());
                    conditions.push(format!("{} = ?{}", column, params.len()));
                }
                Cmp::IsNull => conditions.push(format!("{} IS NULL", column)),
                Cmp::IsNotNull => conditions.push(format!("{} IS NOT NULL", column)),
            }
        }

        let mut sql = format!("SELECT * FROM {}", view.name());
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY id");

        Ok((sql, params))
    }
}

/// How many results a statement should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    One,
    All,
    LastInsertId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    Row(Option<Record>),
    Rows(Vec<Record>),
    LastInsertId(i64),
}

impl Fetched {
    pub fn into_row(self) -> Option<Record> {
        match self {
            Fetched::Row(row) => row,
            Fetched::Rows(rows) => rows.into_iter().next(),
            Fetched::LastInsertId(_) => None,
        }
    }

    pub fn into_rows(self) -> Vec<Record> {
        match self {
            Fetched::Row(row) => row.into_iter().collect(),
            Fetched::Rows(rows) => rows,
            Fetched::LastInsertId(_) => Vec::new(),
        }
    }
}

/// A detached result row with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Record {
    pub(crate) fn read(row: &rusqlite::Row, columns: &[String]) -> rusqlite::Result<Self> {
        let mut values = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            values.push(row.get::<_, Value>(idx)?);
        }
        Ok(Record {
            columns: columns.to_vec(),
            values,
        })
    }

    pub fn value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    pub fn get<T: FromSql>(&self, column: &str) -> Result<T> {
        let value = self.value(column).ok_or_else(|| CacheError::Column {
            column: column.to_string(),
            reason: "not present in row".to_string(),
        })?;
        T::column_result(ValueRef::from(value)).map_err(|e| CacheError::Column {
            column: column.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Entity types that can be read back from one of the views.
pub trait FromRecord: Sized {
    const VIEW: View;

    fn from_record(record: &Record) -> Result<Self>;
}
