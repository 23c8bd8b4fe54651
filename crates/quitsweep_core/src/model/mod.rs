//! Domain model for quit-list reconciliation.
//!
//! # Responsibility
//! - Define identity, contact, intake and association records read from storage.
//! - Define the transient external quit row.
//!
//! # Invariants
//! - Every per-person record is keyed by a stable `UserId`.
//! - Deletion is represented by a `deleted_at` timestamp, not hard delete.

pub mod association;
pub mod identity;
pub mod quit_record;
