//! Global user settings model.
//!
//! # Responsibility
//! - Define the single settings record and its defaults.
//! - Merge partial updates and report which fields changed.
//!
//! # Invariants
//! - Exactly one live settings record exists; it is never deleted.
//! - `background_opacity` stays within `[0, 1]`.
//! - Fields missing from a stored document fall back to their defaults.

use serde::{Deserialize, Serialize};

/// Theme identifier (`dark`, `light`, `cafe`, ...).
///
/// Kept opaque: color tables live in the presentation layer.
pub type ThemeId = String;

/// Grid style identifier (`rounded`, `square`, ...).
pub type GridStyleId = String;

/// Grid style used for months without an explicit override.
pub const DEFAULT_GRID_STYLE: &str = "rounded";

/// First column of the month grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekStart {
    #[default]
    Sunday,
    Monday,
}

/// Global application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub week_starts_on: WeekStart,
    pub app_theme: ThemeId,
    /// Month theme used when a month has no override.
    pub calendar_theme: ThemeId,
    /// Locale code handed to the locale subsystem.
    pub language: String,
    /// Region code handed to the holiday provider.
    pub country: String,
    pub show_holidays: bool,
    pub shop_name: String,
    /// Encoded image payload (opaque to core).
    pub shop_logo: Option<String>,
    /// Encoded image payload (opaque to core).
    pub background_image: Option<String>,
    pub background_opacity: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            week_starts_on: WeekStart::Sunday,
            app_theme: "dark".to_string(),
            calendar_theme: "dark".to_string(),
            language: "ja".to_string(),
            country: "JP".to_string(),
            show_holidays: true,
            shop_name: String::new(),
            shop_logo: None,
            background_image: None,
            background_opacity: 0.3,
        }
    }
}

impl Settings {
    /// Returns a copy with `patch` applied.
    ///
    /// A non-finite opacity keeps the current value; finite values are
    /// clamped into `[0, 1]`.
    pub fn merged(&self, patch: &SettingsPatch) -> Self {
        let mut next = self.clone();
        if let Some(value) = patch.week_starts_on {
            next.week_starts_on = value;
        }
        if let Some(value) = &patch.app_theme {
            next.app_theme = value.clone();
        }
        if let Some(value) = &patch.calendar_theme {
            next.calendar_theme = value.clone();
        }
        if let Some(value) = &patch.language {
            next.language = value.clone();
        }
        if let Some(value) = &patch.country {
            next.country = value.clone();
        }
        if let Some(value) = patch.show_holidays {
            next.show_holidays = value;
        }
        if let Some(value) = &patch.shop_name {
            next.shop_name = value.clone();
        }
        if let Some(value) = &patch.shop_logo {
            next.shop_logo = value.clone();
        }
        if let Some(value) = &patch.background_image {
            next.background_image = value.clone();
        }
        if let Some(value) = patch.background_opacity {
            if value.is_finite() {
                next.background_opacity = value.clamp(0.0, 1.0);
            }
        }
        next
    }

    /// Brings a loaded record back within its invariants.
    pub(crate) fn normalized(mut self) -> Self {
        self.background_opacity = if self.background_opacity.is_finite() {
            self.background_opacity.clamp(0.0, 1.0)
        } else {
            Self::default().background_opacity
        };
        self
    }
}

/// Partial settings update. `None` keeps the current value.
///
/// Image fields take `Some(None)` to remove the stored image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub week_starts_on: Option<WeekStart>,
    pub app_theme: Option<ThemeId>,
    pub calendar_theme: Option<ThemeId>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub show_holidays: Option<bool>,
    pub shop_name: Option<String>,
    pub shop_logo: Option<Option<String>>,
    pub background_image: Option<Option<String>>,
    pub background_opacity: Option<f64>,
}

/// Settings fields that dependent subsystems react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsField {
    Language,
    Country,
}

impl SettingsField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Language => "language",
            Self::Country => "country",
        }
    }

    /// Returns whether this field differs between two records.
    pub fn changed(self, previous: &Settings, current: &Settings) -> bool {
        match self {
            Self::Language => previous.language != current.language,
            Self::Country => previous.country != current.country,
        }
    }
}
