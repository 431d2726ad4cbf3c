//! Domain model for dependency matrices and their surrounding records.
//!
//! # Responsibility
//! - Define the canonical matrix structure and its pure mutation/aggregation rules.
//! - Define wire shapes for persisted matrix records, users and history entries.
//!
//! # Invariants
//! - Model code performs no I/O and touches no global state.
//! - Persisted shapes serialize with camelCase field names.

pub mod history;
pub mod matrix;
pub mod record;
pub mod user;
pub mod validation;
