//! Persistence gateway contract and its SQLite implementation.
//!
//! # Responsibility
//! - Define the async data access contract used by the state store.
//! - Isolate SQLite query details from orchestration code.
//!
//! # Invariants
//! - Low-level failures are surfaced as exactly one error type
//!   (`StorageError`); write failures are never swallowed.

pub mod gateway;
pub mod sqlite_gateway;
