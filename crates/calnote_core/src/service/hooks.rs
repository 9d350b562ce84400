//! Settings post-commit hooks for dependent subsystems.
//!
//! # Responsibility
//! - Declare the external subsystems the store reconfigures (locale,
//!   holiday data).
//! - Keep the "field changed -> subsystem reinit" coupling in one explicit
//!   list.
//!
//! # Invariants
//! - Hooks run after a successful settings write, never before.
//! - A hook runs only when its field value actually changed.

use crate::model::settings::{Settings, SettingsField};
use log::info;
use std::sync::Arc;

/// Locale subsystem; receives language codes such as `ja` or `en`.
pub trait LocaleSubsystem: Send + Sync {
    fn set_language(&self, code: &str);
}

/// Holiday data provider; must tolerate repeated calls with any code.
pub trait HolidayProvider: Send + Sync {
    fn init_region(&self, code: &str);
}

type HookFn = Box<dyn Fn(&Settings) + Send + Sync>;

struct SettingsHook {
    field: SettingsField,
    run: HookFn,
}

/// Ordered list of settings hooks.
#[derive(Default)]
pub struct SettingsHooks {
    hooks: Vec<SettingsHook>,
}

impl SettingsHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard wiring: language -> locale, country -> holidays.
    pub fn with_subsystems(
        locale: Arc<dyn LocaleSubsystem>,
        holidays: Arc<dyn HolidayProvider>,
    ) -> Self {
        Self::new()
            .on_change(SettingsField::Language, move |settings| {
                locale.set_language(&settings.language)
            })
            .on_change(SettingsField::Country, move |settings| {
                holidays.init_region(&settings.country)
            })
    }

    /// Registers a hook for `field`.
    pub fn on_change(
        mut self,
        field: SettingsField,
        run: impl Fn(&Settings) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.push(SettingsHook {
            field,
            run: Box::new(run),
        });
        self
    }

    /// Runs every hook with freshly loaded settings.
    pub(crate) fn run_initial(&self, settings: &Settings) {
        for hook in &self.hooks {
            (hook.run)(settings);
        }
    }

    /// Runs hooks whose field differs between `previous` and `current`.
    ///
    /// Returns the number of hooks that ran.
    pub(crate) fn run_changed(&self, previous: &Settings, current: &Settings) -> usize {
        let mut ran = 0;
        for hook in self
            .hooks
            .iter()
            .filter(|hook| hook.field.changed(previous, current))
        {
            info!(
                "event=settings_hook module=service status=run field={}",
                hook.field.as_str()
            );
            (hook.run)(current);
            ran += 1;
        }
        ran
    }
}
