//! SQLite-backed persistence gateway.
//!
//! # Responsibility
//! - Implement [`PersistenceGateway`] over the migrated SQLite schema.
//! - Own the single, lazily opened connection handle.
//! - Keep blocking SQLite work off the async executor.
//!
//! # Invariants
//! - The connection is opened (and migrated) on first use, then reused for
//!   the lifetime of the gateway.
//! - Every write is one SQL statement, hence atomic.
//! - Stored rows that cannot be decoded surface as `Corrupted`.

use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::day_entry::{parse_entry_date, DayEntry};
use crate::model::month::MonthKey;
use crate::model::settings::Settings;
use crate::repo::gateway::{
    Collection, MonthCollection, PersistenceGateway, StorageError, StorageErrorKind,
    StorageResult, SETTINGS_KEY,
};
use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
enum DbTarget {
    File(PathBuf),
    Memory,
}

impl DbTarget {
    fn open(&self) -> Result<Connection, DbError> {
        match self {
            Self::File(path) => open_db(path),
            Self::Memory => open_db_in_memory(),
        }
    }
}

/// Gateway over one SQLite database.
pub struct SqliteGateway {
    target: DbTarget,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteGateway {
    /// Gateway over a database file. Nothing is opened until first use.
    pub fn open_file(path: impl Into<PathBuf>) -> Self {
        Self {
            target: DbTarget::File(path.into()),
            conn: Arc::new(Mutex::new(None)),
        }
    }

    /// Gateway over a private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            target: DbTarget::Memory,
            conn: Arc::new(Mutex::new(None)),
        }
    }

    /// Wraps an already migrated connection, e.g. one returned by `open_db`.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            target: DbTarget::Memory,
            conn: Arc::new(Mutex::new(Some(conn))),
        }
    }

    async fn run<T, F>(
        &self,
        collection: Collection,
        kind: StorageErrorKind,
        op: F,
    ) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StorageResult<T> + Send + 'static,
    {
        let handle = Arc::clone(&self.conn);
        let target = self.target.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = handle.lock().map_err(|_| {
                StorageError::new(
                    StorageErrorKind::Unavailable,
                    Some(collection),
                    "connection lock poisoned",
                )
            })?;
            if guard.is_none() {
                let opened = target.open().map_err(|err| {
                    StorageError::from_db(StorageErrorKind::Unavailable, Some(collection), &err)
                })?;
                *guard = Some(opened);
            }
            match guard.as_ref() {
                Some(conn) => op(conn),
                None => Err(StorageError::new(
                    StorageErrorKind::Unavailable,
                    Some(collection),
                    "connection missing after open",
                )),
            }
        })
        .await
        .map_err(|err| {
            StorageError::new(kind, Some(collection), format!("storage task failed: {err}"))
        })?
    }
}

#[async_trait]
impl PersistenceGateway for SqliteGateway {
    async fn load_entries(&self) -> StorageResult<Vec<DayEntry>> {
        let collection = Collection::Entries;
        self.run(collection, StorageErrorKind::ReadFailed, move |conn| {
            let sql_err = sql_error(StorageErrorKind::ReadFailed, collection);
            let mut stmt = conn
                .prepare(
                    "SELECT date, text, symbol, stamp, time_from, time_to
                     FROM day_entries;",
                )
                .map_err(&sql_err)?;
            let mut rows = stmt.query([]).map_err(&sql_err)?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next().map_err(&sql_err)? {
                entries.push(parse_entry_row(row).map_err(&sql_err)??);
            }
            Ok(entries)
        })
        .await
    }

    async fn load_settings(&self) -> StorageResult<Option<serde_json::Value>> {
        let collection = Collection::Settings;
        self.run(collection, StorageErrorKind::ReadFailed, move |conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT value FROM settings WHERE key = ?1;",
                    [SETTINGS_KEY],
                    |row| row.get(0),
                )
                .optional()
                .map_err(sql_error(StorageErrorKind::ReadFailed, collection))?;

            raw.map(|text| {
                serde_json::from_str(&text).map_err(|err| {
                    StorageError::new(
                        StorageErrorKind::Corrupted,
                        Some(collection),
                        format!("settings document is not valid JSON: {err}"),
                    )
                })
            })
            .transpose()
        })
        .await
    }

    async fn load_month_values(
        &self,
        month_collection: MonthCollection,
    ) -> StorageResult<BTreeMap<String, String>> {
        let collection = month_collection.collection();
        self.run(collection, StorageErrorKind::ReadFailed, move |conn| {
            let sql_err = sql_error(StorageErrorKind::ReadFailed, collection);
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT month_key, value FROM {};",
                    collection.table_name()
                ))
                .map_err(&sql_err)?;
            let mut rows = stmt.query([]).map_err(&sql_err)?;
            let mut values = BTreeMap::new();
            while let Some(row) = rows.next().map_err(&sql_err)? {
                let key: String = row.get("month_key").map_err(&sql_err)?;
                let value: String = row.get("value").map_err(&sql_err)?;
                values.insert(key, value);
            }
            Ok(values)
        })
        .await
    }

    async fn put_entry(&self, entry: &DayEntry) -> StorageResult<()> {
        let collection = Collection::Entries;
        let entry = entry.clone();
        self.run(collection, StorageErrorKind::WriteFailed, move |conn| {
            conn.execute(
                "INSERT INTO day_entries (date, text, symbol, stamp, time_from, time_to, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, (strftime('%s', 'now') * 1000))
                 ON CONFLICT(date) DO UPDATE SET
                    text = excluded.text,
                    symbol = excluded.symbol,
                    stamp = excluded.stamp,
                    time_from = excluded.time_from,
                    time_to = excluded.time_to,
                    updated_at = excluded.updated_at;",
                params![
                    entry.date_key(),
                    entry.text.as_str(),
                    entry.symbol.as_deref(),
                    entry.stamp.as_deref(),
                    entry.time_from.as_str(),
                    entry.time_to.as_str(),
                ],
            )
            .map_err(sql_error(StorageErrorKind::WriteFailed, collection))?;
            Ok(())
        })
        .await
    }

    async fn put_settings(&self, settings: &Settings) -> StorageResult<()> {
        let collection = Collection::Settings;
        let document = serde_json::to_string(settings).map_err(|err| {
            StorageError::new(
                StorageErrorKind::WriteFailed,
                Some(collection),
                format!("settings could not be encoded: {err}"),
            )
        })?;
        self.run(collection, StorageErrorKind::WriteFailed, move |conn| {
            conn.execute(
                "INSERT INTO settings (key, value, updated_at)
                 VALUES (?1, ?2, (strftime('%s', 'now') * 1000))
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at;",
                params![SETTINGS_KEY, document],
            )
            .map_err(sql_error(StorageErrorKind::WriteFailed, collection))?;
            Ok(())
        })
        .await
    }

    async fn put_month_value(
        &self,
        month_collection: MonthCollection,
        key: &MonthKey,
        value: &str,
    ) -> StorageResult<()> {
        let collection = month_collection.collection();
        let key = key.as_str().to_string();
        let value = value.to_string();
        self.run(collection, StorageErrorKind::WriteFailed, move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {} (month_key, value, updated_at)
                     VALUES (?1, ?2, (strftime('%s', 'now') * 1000))
                     ON CONFLICT(month_key) DO UPDATE SET
                        value = excluded.value,
                        updated_at = excluded.updated_at;",
                    collection.table_name()
                ),
                params![key, value],
            )
            .map_err(sql_error(StorageErrorKind::WriteFailed, collection))?;
            Ok(())
        })
        .await
    }

    async fn remove_month_value(
        &self,
        month_collection: MonthCollection,
        key: &MonthKey,
    ) -> StorageResult<()> {
        let collection = month_collection.collection();
        let key = key.as_str().to_string();
        self.run(collection, StorageErrorKind::WriteFailed, move |conn| {
            conn.execute(
                &format!(
                    "DELETE FROM {} WHERE month_key = ?1;",
                    collection.table_name()
                ),
                [key],
            )
            .map_err(sql_error(StorageErrorKind::WriteFailed, collection))?;
            Ok(())
        })
        .await
    }
}

/// Decodes one `day_entries` row.
///
/// The outer result carries SQLite access errors, the inner one decoding
/// failures of the stored values.
fn parse_entry_row(row: &Row<'_>) -> rusqlite::Result<StorageResult<DayEntry>> {
    let date_text: String = row.get("date")?;
    let date = match parse_entry_date(&date_text) {
        Ok(date) => date,
        Err(err) => {
            return Ok(Err(StorageError::new(
                StorageErrorKind::Corrupted,
                Some(Collection::Entries),
                format!("invalid value in day_entries.date: {err}"),
            )));
        }
    };

    let symbol: Option<String> = row.get("symbol")?;
    let stamp: Option<String> = row.get("stamp")?;
    Ok(Ok(DayEntry {
        date,
        text: row.get("text")?,
        symbol: symbol.filter(|value| !value.is_empty()),
        stamp: stamp.filter(|value| !value.is_empty()),
        time_from: row.get("time_from")?,
        time_to: row.get("time_to")?,
    }))
}

fn sql_error(
    kind: StorageErrorKind,
    collection: Collection,
) -> impl Fn(rusqlite::Error) -> StorageError {
    move |err| {
        let kind = match &err {
            rusqlite::Error::SqliteFailure(failure, _)
                if matches!(
                    failure.code,
                    ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase
                ) =>
            {
                StorageErrorKind::Corrupted
            }
            rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::FromSqlConversionFailure(..) => StorageErrorKind::Corrupted,
            _ => kind,
        };
        StorageError::new(kind, Some(collection), err.to_string())
    }
}
