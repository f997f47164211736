//! Record mapping model.
//!
//! # Responsibility
//! - Define the annotation vocabulary record types use to declare columns.
//! - Define the `Persistable` capability and value marshaling types.
//!
//! # Invariants
//! - Record shapes are declared statically; nothing is inspected at runtime.

pub mod column;
pub mod record;
