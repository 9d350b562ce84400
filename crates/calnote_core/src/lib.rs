//! Core state and persistence engine for the calendar note store.
//! This crate is the single source of truth for calendar data invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{load_config, ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::day_entry::{parse_entry_date, DayEntry, EntryPatch, EntryValidationError};
pub use model::month::{month_key, CalendarView, MonthKey, YearMonth};
pub use model::settings::{
    GridStyleId, Settings, SettingsField, SettingsPatch, ThemeId, WeekStart, DEFAULT_GRID_STYLE,
};
pub use repo::gateway::{
    Collection, MonthCollection, PersistenceGateway, StorageError, StorageErrorKind,
    StorageResult,
};
pub use repo::sqlite_gateway::SqliteGateway;
pub use service::hooks::{HolidayProvider, LocaleSubsystem, SettingsHooks};
pub use service::projector::{project, Projection, WeekdayPattern};
pub use service::state_store::{
    Lifecycle, ProjectionOutcome, StateStore, StateStoreOptions, StoreError, StoreResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
