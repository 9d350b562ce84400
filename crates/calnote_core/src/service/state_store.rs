//! Calendar state store.
//!
//! # Responsibility
//! - Hold the canonical in-memory snapshot of every persisted collection
//!   plus the transient calendar view.
//! - Drive write-through persistence for every mutation.
//! - Own the initialization lifecycle and its fail-open degraded mode.
//!
//! # Invariants
//! - Mutations persist first and touch memory only after the write succeeded.
//! - Writes for one key are applied in issue order; distinct keys are
//!   independent.
//! - The snapshot lock is never held across an `.await`.
//! - Accessors read memory only and never fail.
//! - Mutations are rejected unless the store is `Ready`; a degraded store
//!   never writes merge results built on its empty defaults.

use crate::model::day_entry::{DayEntry, EntryPatch, EntryValidationError};
use crate::model::month::{month_key, CalendarView, MonthKey, YearMonth};
use crate::model::settings::{GridStyleId, Settings, SettingsPatch, ThemeId, DEFAULT_GRID_STYLE};
use crate::repo::gateway::{
    Collection, MonthCollection, PersistenceGateway, StorageError, StorageErrorKind,
};
use crate::service::hooks::SettingsHooks;
use crate::service::key_locks::KeyedLocks;
use crate::service::projector;
use chrono::NaiveDate;
use log::{info, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};

/// Initialization state of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Loading,
    /// All collections loaded (possibly empty).
    Ready,
    /// Loading failed; collections hold empty defaults.
    Degraded,
}

/// Command-level failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Storage(StorageError),
    Validation(EntryValidationError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::Validation(err) => Some(err),
        }
    }
}

impl From<StorageError> for StoreError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<EntryValidationError> for StoreError {
    fn from(value: EntryValidationError) -> Self {
        Self::Validation(value)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Clock used by `go_to_today` and for the initial view.
pub type TodayFn = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Construction options.
#[derive(Clone)]
pub struct StateStoreOptions {
    /// Earliest month reachable through `go_to_prev_month`.
    pub nav_floor: Option<YearMonth>,
    pub today: TodayFn,
}

impl Default for StateStoreOptions {
    fn default() -> Self {
        Self {
            nav_floor: None,
            today: Arc::new(|| chrono::Local::now().date_naive()),
        }
    }
}

/// Summary of a finished projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionOutcome {
    pub target: YearMonth,
    /// Days written; zero when the previous month had no content.
    pub days_written: usize,
}

#[derive(Debug)]
struct Snapshot {
    lifecycle: Lifecycle,
    init_error: Option<StorageError>,
    entries: BTreeMap<NaiveDate, DayEntry>,
    settings: Settings,
    month_comments: BTreeMap<MonthKey, String>,
    month_themes: BTreeMap<MonthKey, ThemeId>,
    month_grid_styles: BTreeMap<MonthKey, GridStyleId>,
    view: CalendarView,
    selected_date: Option<NaiveDate>,
}

impl Snapshot {
    fn empty(view: CalendarView) -> Self {
        Self {
            lifecycle: Lifecycle::Uninitialized,
            init_error: None,
            entries: BTreeMap::new(),
            settings: Settings::default(),
            month_comments: BTreeMap::new(),
            month_themes: BTreeMap::new(),
            month_grid_styles: BTreeMap::new(),
            view,
            selected_date: None,
        }
    }

    fn month_values(&mut self, collection: MonthCollection) -> &mut BTreeMap<MonthKey, String> {
        match collection {
            MonthCollection::Comments => &mut self.month_comments,
            MonthCollection::Themes => &mut self.month_themes,
            MonthCollection::GridStyles => &mut self.month_grid_styles,
        }
    }
}

/// Validated result of the initial load.
struct Loaded {
    entries: BTreeMap<NaiveDate, DayEntry>,
    settings: Settings,
    month_comments: BTreeMap<MonthKey, String>,
    month_themes: BTreeMap<MonthKey, ThemeId>,
    month_grid_styles: BTreeMap<MonthKey, GridStyleId>,
}

/// Single source of truth for calendar state.
pub struct StateStore {
    gateway: Arc<dyn PersistenceGateway>,
    hooks: SettingsHooks,
    options: StateStoreOptions,
    snapshot: Mutex<Snapshot>,
    write_locks: KeyedLocks,
}

impl StateStore {
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        hooks: SettingsHooks,
        options: StateStoreOptions,
    ) -> Self {
        let view = YearMonth::from_date((options.today)());
        Self {
            gateway,
            hooks,
            options,
            snapshot: Mutex::new(Snapshot::empty(view)),
            write_locks: KeyedLocks::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, Snapshot> {
        self.snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ---- lifecycle -------------------------------------------------------

    /// Loads every collection once and applies locale/region settings.
    ///
    /// Only the first call does work; later calls return the current state.
    /// A load failure leaves the store `Degraded` with empty collections and
    /// the error available through [`StateStore::init_error`].
    pub async fn initialize(&self) -> Lifecycle {
        {
            let mut state = self.state();
            if state.lifecycle != Lifecycle::Uninitialized {
                return state.lifecycle;
            }
            state.lifecycle = Lifecycle::Loading;
        }
        info!("event=store_init module=service status=start");

        match self.load_all().await {
            Ok(loaded) => {
                self.hooks.run_initial(&loaded.settings);
                let mut state = self.state();
                info!(
                    "event=store_init module=service status=ok entries={} comments={} themes={} grid_styles={}",
                    loaded.entries.len(),
                    loaded.month_comments.len(),
                    loaded.month_themes.len(),
                    loaded.month_grid_styles.len()
                );
                state.entries = loaded.entries;
                state.settings = loaded.settings;
                state.month_comments = loaded.month_comments;
                state.month_themes = loaded.month_themes;
                state.month_grid_styles = loaded.month_grid_styles;
                state.init_error = None;
                state.lifecycle = Lifecycle::Ready;
                Lifecycle::Ready
            }
            Err(err) => {
                warn!(
                    "event=store_init module=service status=degraded error_kind={:?} collection={} detail={}",
                    err.kind(),
                    err.collection().map_or("-", Collection::as_str),
                    err.detail()
                );
                let mut state = self.state();
                state.init_error = Some(err);
                state.lifecycle = Lifecycle::Degraded;
                Lifecycle::Degraded
            }
        }
    }

    async fn load_all(&self) -> Result<Loaded, StorageError> {
        let gateway = &self.gateway;
        let (entries, settings, comments, themes, grid_styles) = tokio::join!(
            gateway.load_entries(),
            gateway.load_settings(),
            gateway.load_month_values(MonthCollection::Comments),
            gateway.load_month_values(MonthCollection::Themes),
            gateway.load_month_values(MonthCollection::GridStyles),
        );

        Ok(Loaded {
            entries: validate_entries(entries?),
            settings: validate_settings(settings?),
            month_comments: validate_month_values(MonthCollection::Comments, comments?),
            month_themes: validate_month_values(MonthCollection::Themes, themes?),
            month_grid_styles: validate_month_values(MonthCollection::GridStyles, grid_styles?),
        })
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state().lifecycle
    }

    /// True once loading finished, successfully or not.
    pub fn initialized(&self) -> bool {
        matches!(self.lifecycle(), Lifecycle::Ready | Lifecycle::Degraded)
    }

    /// Error retained by a degraded initialization.
    pub fn init_error(&self) -> Option<StorageError> {
        self.state().init_error.clone()
    }

    /// Fails unless loading succeeded.
    ///
    /// Before `Ready` the snapshot does not reflect the durable store, so a
    /// merge against it could overwrite records that are still on disk.
    fn ensure_writable(&self, collection: Collection) -> StoreResult<()> {
        let lifecycle = self.lifecycle();
        if lifecycle == Lifecycle::Ready {
            return Ok(());
        }
        warn!(
            "event=store_write module=service status=rejected lifecycle={lifecycle:?} collection={}",
            collection.as_str()
        );
        let detail = match lifecycle {
            Lifecycle::Degraded => "store is degraded; writes are disabled",
            _ => "store is not initialized",
        };
        Err(StorageError::new(StorageErrorKind::Unavailable, Some(collection), detail).into())
    }

    // ---- entries ---------------------------------------------------------

    /// Merges `patch` onto the entry for `date` and stores the result.
    pub async fn update_entry(&self, date: NaiveDate, patch: EntryPatch) -> StoreResult<DayEntry> {
        self.ensure_writable(Collection::Entries)?;
        let _slot = self.write_locks.acquire(format!("entry/{date}")).await;

        let base = self
            .state()
            .entries
            .get(&date)
            .cloned()
            .unwrap_or_else(|| DayEntry::empty(date));
        let merged = base.merged(&patch);
        merged.validate()?;

        if let Err(err) = self.gateway.put_entry(&merged).await {
            warn!(
                "event=entry_put module=service status=error date={date} error_kind={:?}",
                err.kind()
            );
            return Err(err.into());
        }

        self.state().entries.insert(date, merged.clone());
        Ok(merged)
    }

    pub fn entry(&self, date: NaiveDate) -> Option<DayEntry> {
        self.state().entries.get(&date).cloned()
    }

    pub fn entry_text(&self, date: NaiveDate) -> String {
        self.state()
            .entries
            .get(&date)
            .map(|entry| entry.text.clone())
            .unwrap_or_default()
    }

    /// Entries stored for `month`, ascending by date.
    pub fn entries_in_month(&self, month: YearMonth) -> Vec<DayEntry> {
        let (Some(first), Some(last)) = (month.first_day(), month.last_day()) else {
            return Vec::new();
        };
        self.state()
            .entries
            .range(first..=last)
            .map(|(_, entry)| entry.clone())
            .collect()
    }

    pub fn entry_count(&self) -> usize {
        self.state().entries.len()
    }

    // ---- settings --------------------------------------------------------

    /// Merges `patch` onto the settings, stores them, then runs the hooks of
    /// every changed field.
    pub async fn update_settings(&self, patch: SettingsPatch) -> StoreResult<Settings> {
        self.ensure_writable(Collection::Settings)?;
        let _slot = self.write_locks.acquire("settings".to_string()).await;

        let previous = self.state().settings.clone();
        let merged = previous.merged(&patch);

        if let Err(err) = self.gateway.put_settings(&merged).await {
            warn!(
                "event=settings_put module=service status=error error_kind={:?}",
                err.kind()
            );
            return Err(err.into());
        }

        self.state().settings = merged.clone();
        self.hooks.run_changed(&previous, &merged);
        Ok(merged)
    }

    pub fn settings(&self) -> Settings {
        self.state().settings.clone()
    }

    // ---- month metadata --------------------------------------------------

    /// Stores a month comment; a blank `text` removes it.
    pub async fn update_month_comment(
        &self,
        year: i32,
        month0: u32,
        text: &str,
    ) -> StoreResult<()> {
        let key = month_key(year, month0);
        if text.trim().is_empty() {
            self.remove_month_value(MonthCollection::Comments, key).await
        } else {
            self.put_month_value(MonthCollection::Comments, key, text.to_string())
                .await
        }
    }

    /// Stores an explicit theme override for one month.
    pub async fn update_month_theme(&self, year: i32, month0: u32, theme: &str) -> StoreResult<()> {
        self.put_month_value(
            MonthCollection::Themes,
            month_key(year, month0),
            theme.to_string(),
        )
        .await
    }

    /// Stores an explicit grid style override for one month.
    pub async fn update_month_grid_style(
        &self,
        year: i32,
        month0: u32,
        grid_style: &str,
    ) -> StoreResult<()> {
        self.put_month_value(
            MonthCollection::GridStyles,
            month_key(year, month0),
            grid_style.to_string(),
        )
        .await
    }

    async fn put_month_value(
        &self,
        collection: MonthCollection,
        key: MonthKey,
        value: String,
    ) -> StoreResult<()> {
        self.ensure_writable(collection.collection())?;
        let _slot = self
            .write_locks
            .acquire(format!("{}/{key}", collection.collection().as_str()))
            .await;

        if let Err(err) = self.gateway.put_month_value(collection, &key, &value).await {
            warn!(
                "event=month_put module=service status=error collection={} month={key} error_kind={:?}",
                collection.collection().as_str(),
                err.kind()
            );
            return Err(err.into());
        }
        self.state().month_values(collection).insert(key, value);
        Ok(())
    }

    async fn remove_month_value(
        &self,
        collection: MonthCollection,
        key: MonthKey,
    ) -> StoreResult<()> {
        self.ensure_writable(collection.collection())?;
        let _slot = self
            .write_locks
            .acquire(format!("{}/{key}", collection.collection().as_str()))
            .await;

        if let Err(err) = self.gateway.remove_month_value(collection, &key).await {
            warn!(
                "event=month_remove module=service status=error collection={} month={key} error_kind={:?}",
                collection.collection().as_str(),
                err.kind()
            );
            return Err(err.into());
        }
        self.state().month_values(collection).remove(&key);
        Ok(())
    }

    pub fn month_comment(&self, year: i32, month0: u32) -> String {
        self.state()
            .month_comments
            .get(&month_key(year, month0))
            .cloned()
            .unwrap_or_default()
    }

    /// Month theme, falling back to the global calendar theme.
    pub fn month_theme(&self, year: i32, month0: u32) -> ThemeId {
        let state = self.state();
        state
            .month_themes
            .get(&month_key(year, month0))
            .cloned()
            .unwrap_or_else(|| state.settings.calendar_theme.clone())
    }

    /// Month grid style, falling back to [`DEFAULT_GRID_STYLE`].
    pub fn month_grid_style(&self, year: i32, month0: u32) -> GridStyleId {
        self.state()
            .month_grid_styles
            .get(&month_key(year, month0))
            .cloned()
            .unwrap_or_else(|| DEFAULT_GRID_STYLE.to_string())
    }

    // ---- projection ------------------------------------------------------

    /// Rewrites the displayed month from the weekday patterns of the month
    /// before it.
    ///
    /// Every day of the displayed month is overwritten, including days whose
    /// weekday had no pattern (they are cleared). A failed day does not stop
    /// the remaining days; the first failure is returned once all days were
    /// attempted.
    pub async fn copy_from_previous_month(&self) -> StoreResult<ProjectionOutcome> {
        self.ensure_writable(Collection::Entries)?;
        let target = self.view();
        let source_entries = self.entries_in_month(target.previous());

        let Some(projection) = projector::project(source_entries.iter(), target) else {
            info!(
                "event=month_copy module=service status=skipped target={target} reason=empty_source"
            );
            return Ok(ProjectionOutcome {
                target,
                days_written: 0,
            });
        };

        let mut days_written = 0;
        let mut first_error: Option<StoreError> = None;
        for day in &projection.days {
            match self.update_entry(day.date, EntryPatch::overwrite(day)).await {
                Ok(_) => days_written += 1,
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => {
                warn!(
                    "event=month_copy module=service status=partial target={target} days_written={days_written} days_total={}",
                    projection.days.len()
                );
                Err(err)
            }
            None => {
                info!(
                    "event=month_copy module=service status=ok target={target} source={} days_written={days_written}",
                    projection.source
                );
                Ok(ProjectionOutcome {
                    target,
                    days_written,
                })
            }
        }
    }

    // ---- view ------------------------------------------------------------

    pub fn view(&self) -> CalendarView {
        self.state().view
    }

    pub fn set_view(&self, view: CalendarView) {
        self.state().view = view;
    }

    /// Steps back one month unless that would pass the navigation floor.
    pub fn go_to_prev_month(&self) -> CalendarView {
        let mut state = self.state();
        let previous = state.view.previous();
        if self.options.nav_floor.is_some_and(|floor| previous < floor) {
            return state.view;
        }
        state.view = previous;
        previous
    }

    pub fn go_to_next_month(&self) -> CalendarView {
        let mut state = self.state();
        state.view = state.view.next();
        state.view
    }

    pub fn go_to_today(&self) -> CalendarView {
        let today = YearMonth::from_date((self.options.today)());
        self.state().view = today;
        today
    }

    pub fn set_selected_date(&self, date: Option<NaiveDate>) {
        self.state().selected_date = date;
    }

    pub fn selected_date(&self) -> Option<NaiveDate> {
        self.state().selected_date
    }
}

fn validate_entries(loaded: Vec<DayEntry>) -> BTreeMap<NaiveDate, DayEntry> {
    let mut entries = BTreeMap::new();
    let mut dropped = 0usize;
    for entry in loaded {
        if entry.validate().is_err() {
            dropped += 1;
            continue;
        }
        entries.insert(entry.date, entry);
    }
    if dropped > 0 {
        warn!("event=validation_default module=service collection=entries dropped={dropped}");
    }
    entries
}

fn validate_settings(loaded: Option<serde_json::Value>) -> Settings {
    let Some(document) = loaded else {
        return Settings::default();
    };
    if !document.is_object() {
        warn!("event=validation_default module=service collection=settings reason=not_an_object");
        return Settings::default();
    }
    match serde_json::from_value::<Settings>(document) {
        Ok(settings) => settings.normalized(),
        Err(err) => {
            warn!(
                "event=validation_default module=service collection=settings reason=decode_failed error={err}"
            );
            Settings::default()
        }
    }
}

fn validate_month_values(
    collection: MonthCollection,
    loaded: BTreeMap<String, String>,
) -> BTreeMap<MonthKey, String> {
    let mut values = BTreeMap::new();
    let mut dropped = 0usize;
    for (raw_key, value) in loaded {
        let blank_comment = collection == MonthCollection::Comments && value.trim().is_empty();
        match MonthKey::parse(&raw_key) {
            Some(key) if !blank_comment => {
                values.insert(key, value);
            }
            _ => dropped += 1,
        }
    }
    if dropped > 0 {
        warn!(
            "event=validation_default module=service collection={} dropped={dropped}",
            collection.collection().as_str()
        );
    }
    values
}
