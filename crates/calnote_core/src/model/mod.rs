//! Domain model for calendar annotations.
//!
//! # Responsibility
//! - Define the records held by the state store and persisted by the gateway.
//! - Keep month arithmetic and key formatting in one place.
//!
//! # Invariants
//! - Day entries are keyed by calendar date; per-month metadata by `MonthKey`.
//! - Optional values have exactly one "unset" representation.

pub mod day_entry;
pub mod month;
pub mod settings;
