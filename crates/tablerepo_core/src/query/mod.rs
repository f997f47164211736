//! Query building blocks passed into repository reads.
//!
//! # Responsibility
//! - Provide the predicate tree used for filtering.
//! - Provide per-call select options (filter, ordering, paging).

pub mod options;
pub mod predicate;
