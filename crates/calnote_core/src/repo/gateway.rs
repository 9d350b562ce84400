//! Persistence gateway contract.
//!
//! # Responsibility
//! - Define the async CRUD surface over the five durable collections.
//! - Define the single storage error surfaced to callers.
//!
//! # Invariants
//! - Loading a never-written collection yields an empty result, not an error.
//! - Every `put_*`/`remove_*` call is atomic: it is fully stored or it fails.
//! - Implementations hold no cached copy of collection data.

use crate::db::DbError;
use crate::model::day_entry::DayEntry;
use crate::model::month::MonthKey;
use crate::model::settings::Settings;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Singleton key of the settings record.
pub const SETTINGS_KEY: &str = "settings";

/// Independently keyed durable record sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Entries,
    Settings,
    MonthComments,
    MonthThemes,
    MonthGridStyles,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entries => "entries",
            Self::Settings => "settings",
            Self::MonthComments => "month_comments",
            Self::MonthThemes => "month_themes",
            Self::MonthGridStyles => "month_grid_styles",
        }
    }

    pub(crate) fn table_name(self) -> &'static str {
        match self {
            Self::Entries => "day_entries",
            Self::Settings => "settings",
            Self::MonthComments => "month_comments",
            Self::MonthThemes => "month_themes",
            Self::MonthGridStyles => "month_grid_styles",
        }
    }
}

/// Collections keyed by month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonthCollection {
    Comments,
    Themes,
    GridStyles,
}

impl MonthCollection {
    pub const ALL: [MonthCollection; 3] = [Self::Comments, Self::Themes, Self::GridStyles];

    pub fn collection(self) -> Collection {
        match self {
            Self::Comments => Collection::MonthComments,
            Self::Themes => Collection::MonthThemes,
            Self::GridStyles => Collection::MonthGridStyles,
        }
    }
}

/// Failure category of a storage operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    /// Store could not be opened (missing API, permissions, newer schema).
    Unavailable,
    /// A read failed at the store level.
    ReadFailed,
    /// A write failed (quota, read-only media, locked file).
    WriteFailed,
    /// A stored record could not be decoded.
    Corrupted,
}

/// Distinguished storage failure carrying a user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageError {
    kind: StorageErrorKind,
    collection: Option<Collection>,
    message: String,
    detail: String,
}

impl StorageError {
    pub fn new(
        kind: StorageErrorKind,
        collection: Option<Collection>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            collection,
            message: user_message(kind).to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn from_db(
        kind: StorageErrorKind,
        collection: Option<Collection>,
        err: &DbError,
    ) -> Self {
        let kind = match err {
            DbError::UnsupportedSchemaVersion { .. } => StorageErrorKind::Unavailable,
            DbError::Io(_) => StorageErrorKind::Unavailable,
            DbError::Sqlite(_) => kind,
        };
        Self::new(kind, collection, err.to_string())
    }

    pub fn kind(&self) -> StorageErrorKind {
        self.kind
    }

    pub fn collection(&self) -> Option<Collection> {
        self.collection
    }

    /// Message suitable for showing to the user.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Technical cause, for logs.
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.collection {
            Some(collection) => write!(
                f,
                "{} (collection={} cause={})",
                self.message,
                collection.as_str(),
                self.detail
            ),
            None => write!(f, "{} (cause={})", self.message, self.detail),
        }
    }
}

impl Error for StorageError {}

fn user_message(kind: StorageErrorKind) -> &'static str {
    match kind {
        StorageErrorKind::Unavailable => {
            "The local data store could not be opened. Please restart the application."
        }
        StorageErrorKind::ReadFailed => "Saved data could not be read.",
        StorageErrorKind::WriteFailed => {
            "Your change could not be saved. Free some storage space and try again."
        }
        StorageErrorKind::Corrupted => "Saved data is damaged and could not be loaded.",
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Durable CRUD over the calendar collections.
///
/// Raw shapes are returned for settings and month mappings so the caller can
/// apply its own shape validation.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Returns every stored day entry, in no particular order.
    async fn load_entries(&self) -> StorageResult<Vec<DayEntry>>;
    /// Returns the stored settings document, `None` when never written.
    async fn load_settings(&self) -> StorageResult<Option<serde_json::Value>>;
    /// Returns every `month key -> value` pair of one month collection.
    async fn load_month_values(
        &self,
        collection: MonthCollection,
    ) -> StorageResult<BTreeMap<String, String>>;

    /// Upserts one entry keyed by its date.
    async fn put_entry(&self, entry: &DayEntry) -> StorageResult<()>;
    /// Upserts the settings record under [`SETTINGS_KEY`].
    async fn put_settings(&self, settings: &Settings) -> StorageResult<()>;
    /// Upserts one month value.
    async fn put_month_value(
        &self,
        collection: MonthCollection,
        key: &MonthKey,
        value: &str,
    ) -> StorageResult<()>;
    /// Deletes one month value; deleting an absent key succeeds.
    async fn remove_month_value(
        &self,
        collection: MonthCollection,
        key: &MonthKey,
    ) -> StorageResult<()>;
}
