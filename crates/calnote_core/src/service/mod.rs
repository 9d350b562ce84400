//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate gateway calls into calendar-level commands.
//! - Keep presentation layers decoupled from storage details.

pub mod hooks;
mod key_locks;
pub mod projector;
pub mod state_store;
