//! Repository layer: statement generation and execution.
//!
//! # Responsibility
//! - Generate single-table CRUD statements from record metadata.
//! - Execute them on a transaction and map rows back into records.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`) distinct from
//!   transport, decoding and configuration errors.
//! - No value is ever interpolated into SQL text.

pub mod error;
pub mod sqlite_repo;
pub mod statement;
