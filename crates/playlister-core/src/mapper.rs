//! Entity mapper: translates rows to records and back, and provides the CRUD
//! primitives every other layer builds on.
//!
//! Each record kind describes its table through [`Record`]. The generic
//! methods on [`Database`] then work for any kind without per-table SQL.

use std::fmt;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use rusqlite::types::{ToSql, Type, Value};
use rusqlite::{OptionalExtension, Row, Transaction, TransactionBehavior};

use crate::error::{Error, Result};
use crate::model::{Artist, Genre, Song};
use crate::schema::Database;

/// Columns that `save` never rewrites.
const IMMUTABLE_COLUMNS: &[&str] = &["id", "created_at"];

/// Refreshed by every update; every record kind carries it.
const UPDATED_AT_COLUMN: &str = "updated_at";

/// A record kind persisted in its own table.
pub trait Record: Sized {
    type Id: Copy + Eq + Hash + fmt::Display + ToSql + Into<Value>;

    /// Human-readable kind name used in error messages.
    const ENTITY: &'static str;
    const TABLE: &'static str;
    /// Column names in row order. The first one is always `id`.
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> Self::Id;

    /// Check required fields before a write.
    fn validate(&self) -> Result<()>;

    /// Column values, aligned with [`Record::COLUMNS`].
    fn to_values(&self) -> Vec<Value>;

    /// Build a record from a row selected with [`Record::COLUMNS`].
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Mirror the modification timestamp written by an update.
    fn set_updated_at(&mut self, at: DateTime<Utc>);
}

/// A conjunction of column equality clauses.
///
/// `Value::Null` matches with `IS NULL`. Column names are checked against the
/// record kind before any SQL is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(&'static str, Value)>,
}

impl Filter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.clauses.push((column, value.into()));
        self
    }

    #[must_use]
    pub fn is_null(self, column: &'static str) -> Self {
        self.eq(column, Value::Null)
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    fn check_columns<R: Record>(&self) -> Result<()> {
        for (column, _) in &self.clauses {
            if !R::COLUMNS.contains(column) {
                return Err(Error::Validation(format!(
                    "{} has no column named {column}",
                    R::ENTITY
                )));
            }
        }
        Ok(())
    }

    /// Render a `WHERE` clause (empty when there are no clauses) and its
    /// positional parameters.
    fn to_sql<R: Record>(&self) -> Result<(String, Vec<Value>)> {
        self.check_columns::<R>()?;
        if self.is_empty() {
            return Ok((String::new(), Vec::new()));
        }

        let mut conditions = Vec::with_capacity(self.clauses.len());
        let mut params = Vec::new();
        for (column, value) in &self.clauses {
            if *value == Value::Null {
                conditions.push(format!("{column} IS NULL"));
            } else {
                params.push(value.clone());
                conditions.push(format!("{column} = ?{}", params.len()));
            }
        }

        Ok((format!(" WHERE {}", conditions.join(" AND ")), params))
    }

    /// Overwrite the columns this filter names in a column-aligned value list.
    fn merge_into<R: Record>(&self, values: &mut [Value]) -> Result<()> {
        self.check_columns::<R>()?;
        for (column, value) in &self.clauses {
            if let Some(idx) = R::COLUMNS.iter().position(|c| c == column) {
                values[idx] = value.clone();
            }
        }
        Ok(())
    }
}

fn select_sql<R: Record>() -> String {
    format!("SELECT {} FROM {}", R::COLUMNS.join(", "), R::TABLE)
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|n| format!("?{n}"))
        .collect::<Vec<_>>()
        .join(", ")
}

// Record CRUD
impl Database {
    /// Insert a new record. Fails with `Validation` on malformed fields and
    /// with `Persistence` if the store rejects the row (duplicate id or
    /// unique name, missing referenced owner).
    pub fn create<R: Record>(&self, record: R) -> Result<R> {
        record.validate()?;
        self.insert_values::<R>(&record.to_values(), "")?;
        log::debug!("Created {} {}", R::ENTITY, record.id());
        Ok(record)
    }

    /// Look up a record by id.
    pub fn find<R: Record>(&self, id: R::Id) -> Result<Option<R>> {
        let sql = format!("{} WHERE id = ?1", select_sql::<R>());
        let record = self
            .conn()
            .query_row(&sql, [id], |row| R::from_row(row))
            .optional()?;
        Ok(record)
    }

    /// Look up a record by id, treating absence as an error.
    pub fn get<R: Record>(&self, id: R::Id) -> Result<R> {
        self.find(id)?.ok_or_else(|| Error::NotFound {
            entity: R::ENTITY,
            id: id.to_string(),
        })
    }

    /// The first record (in insertion order) matching `filter`.
    pub fn find_by<R: Record>(&self, filter: &Filter) -> Result<Option<R>> {
        let (where_sql, params) = filter.to_sql::<R>()?;
        let sql = format!("{}{where_sql} ORDER BY rowid LIMIT 1", select_sql::<R>());
        let record = self
            .conn()
            .query_row(&sql, rusqlite::params_from_iter(params.iter()), |row| {
                R::from_row(row)
            })
            .optional()?;
        Ok(record)
    }

    /// Every record matching `filter`, in insertion order.
    pub fn find_all_by<R: Record>(&self, filter: &Filter) -> Result<Vec<R>> {
        let (where_sql, params) = filter.to_sql::<R>()?;
        let sql = format!("{}{where_sql} ORDER BY rowid", select_sql::<R>());
        let mut stmt = self.conn().prepare(&sql)?;
        let records = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                R::from_row(row)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Every record of a kind, in insertion order.
    pub fn all<R: Record>(&self) -> Result<Vec<R>> {
        self.find_all_by(&Filter::new())
    }

    /// Number of records matching `filter`.
    pub fn count<R: Record>(&self, filter: &Filter) -> Result<usize> {
        let (where_sql, params) = filter.to_sql::<R>()?;
        let sql = format!("SELECT COUNT(*) FROM {}{where_sql}", R::TABLE);
        let count: i64 = self
            .conn()
            .query_row(&sql, rusqlite::params_from_iter(params.iter()), |row| {
                row.get(0)
            })?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Return the first record matching `filter`, creating it if none exists.
    ///
    /// The new row takes its values from `defaults`, with every column named
    /// by `filter` overwritten by the filter's value. The insert is
    /// conditional (`ON CONFLICT DO NOTHING`): when another connection wins
    /// the race on a unique column, the winner's row is read back and
    /// returned instead.
    pub fn find_or_create_by<R, F>(&self, filter: &Filter, defaults: F) -> Result<R>
    where
        R: Record,
        F: FnOnce() -> R,
    {
        if let Some(existing) = self.find_by::<R>(filter)? {
            return Ok(existing);
        }

        let candidate = defaults();
        let mut values = candidate.to_values();
        filter.merge_into::<R>(&mut values)?;

        let tx = Transaction::new_unchecked(self.conn(), TransactionBehavior::Immediate)?;
        let inserted = self.insert_values::<R>(&values, " ON CONFLICT DO NOTHING")?;
        if inserted == 0 {
            drop(tx);
            log::warn!(
                "Lost find-or-create race on {}; reading existing row",
                R::TABLE
            );
            return self
                .find_by::<R>(filter)?
                .ok_or_else(|| Error::Persistence {
                    table: R::TABLE,
                    message: "conflicting row does not match the lookup".to_string(),
                });
        }

        let created = self
            .find_by::<R>(filter)?
            .ok_or_else(|| Error::NotFound {
                entity: R::ENTITY,
                id: candidate.id().to_string(),
            })?;
        created.validate()?;
        tx.commit()?;

        log::debug!("Created {} {} via find-or-create", R::ENTITY, created.id());
        Ok(created)
    }

    /// Persist in-memory changes to an existing record.
    ///
    /// Identity and creation time are never rewritten. Saving a record that
    /// was never created is a `NotFound` error. `record` is only modified
    /// (its `updated_at`) once the write has succeeded.
    pub fn save<R: Record>(&self, record: &mut R) -> Result<()> {
        record.validate()?;

        let columns: Vec<(&'static str, Value)> = R::COLUMNS
            .iter()
            .copied()
            .zip(record.to_values())
            .filter(|(column, _)| {
                !IMMUTABLE_COLUMNS.contains(column) && *column != UPDATED_AT_COLUMN
            })
            .collect();

        let updated_at = self.update_columns::<R>(record.id(), &columns)?;
        record.set_updated_at(updated_at);

        log::debug!("Saved {} {}", R::ENTITY, record.id());
        Ok(())
    }

    /// Write only the named columns of one row, refreshing `updated_at`.
    ///
    /// Returns the timestamp written so the caller can mirror it in memory.
    pub(crate) fn update_columns<R: Record>(
        &self,
        id: R::Id,
        columns: &[(&'static str, Value)],
    ) -> Result<DateTime<Utc>> {
        for (column, _) in columns {
            if !R::COLUMNS.contains(column)
                || IMMUTABLE_COLUMNS.contains(column)
                || *column == UPDATED_AT_COLUMN
            {
                return Err(Error::Validation(format!(
                    "{} column {column} cannot be updated",
                    R::ENTITY
                )));
            }
        }

        let updated_at = Utc::now();
        let mut params: Vec<Value> = vec![id.into(), timestamp_value(&updated_at)];
        let mut assignments = vec![format!("{UPDATED_AT_COLUMN} = ?2")];
        for (column, value) in columns {
            params.push(value.clone());
            assignments.push(format!("{column} = ?{}", params.len()));
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?1",
            R::TABLE,
            assignments.join(", ")
        );
        let updated = self
            .conn()
            .execute(&sql, rusqlite::params_from_iter(params.iter()))
            .map_err(|err| Error::from_write(R::TABLE, err))?;

        if updated == 0 {
            return Err(Error::NotFound {
                entity: R::ENTITY,
                id: id.to_string(),
            });
        }

        Ok(updated_at)
    }

    fn insert_values<R: Record>(&self, values: &[Value], suffix: &str) -> Result<usize> {
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}){suffix}",
            R::TABLE,
            R::COLUMNS.join(", "),
            placeholders(R::COLUMNS.len())
        );
        self.conn()
            .execute(&sql, rusqlite::params_from_iter(values.iter()))
            .map_err(|err| Error::from_write(R::TABLE, err))
    }
}

fn require_name(entity: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Validation(format!("{entity} name must not be empty")));
    }
    Ok(())
}

fn timestamp_value(ts: &DateTime<Utc>) -> Value {
    Value::Text(ts.to_rfc3339())
}

fn timestamp_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

impl Record for Artist {
    type Id = crate::model::ArtistId;

    const ENTITY: &'static str = "Artist";
    const TABLE: &'static str = "artists";
    const COLUMNS: &'static [&'static str] = &["id", "name", "created_at", "updated_at"];

    fn id(&self) -> Self::Id {
        self.id
    }

    fn validate(&self) -> Result<()> {
        require_name(Self::ENTITY, &self.name)
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            self.id.into(),
            Value::Text(self.name.clone()),
            timestamp_value(&self.created_at),
            timestamp_value(&self.updated_at),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: timestamp_from_row(row, 2)?,
            updated_at: timestamp_from_row(row, 3)?,
        })
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

impl Record for Genre {
    type Id = crate::model::GenreId;

    const ENTITY: &'static str = "Genre";
    const TABLE: &'static str = "genres";
    const COLUMNS: &'static [&'static str] = &["id", "name", "created_at", "updated_at"];

    fn id(&self) -> Self::Id {
        self.id
    }

    fn validate(&self) -> Result<()> {
        require_name(Self::ENTITY, &self.name)
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            self.id.into(),
            Value::Text(self.name.clone()),
            timestamp_value(&self.created_at),
            timestamp_value(&self.updated_at),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: timestamp_from_row(row, 2)?,
            updated_at: timestamp_from_row(row, 3)?,
        })
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

impl Record for Song {
    type Id = crate::model::SongId;

    const ENTITY: &'static str = "Song";
    const TABLE: &'static str = "songs";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "artist_id",
        "genre_id",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> Self::Id {
        self.id
    }

    fn validate(&self) -> Result<()> {
        require_name(Self::ENTITY, &self.name)
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            self.id.into(),
            Value::Text(self.name.clone()),
            self.artist_id.map_or(Value::Null, Value::from),
            self.genre_id.map_or(Value::Null, Value::from),
            timestamp_value(&self.created_at),
            timestamp_value(&self.updated_at),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            artist_id: row.get(2)?,
            genre_id: row.get(3)?,
            created_at: timestamp_from_row(row, 4)?,
            updated_at: timestamp_from_row(row, 5)?,
        })
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}
