//! Record type registration.
//!
//! # Responsibility
//! - Map each record type to its connection target and validated table
//!   mapping.
//!
//! # Invariants
//! - Registration requires `&mut self`; once the registry is shared it is
//!   read-only, so every registration happens before first use.
//! - A type is registered at most once; there is no update or removal.

use crate::db::ConnectionTarget;
use crate::metadata::TableMapping;
use crate::model::record::Persistable;
use crate::repo::error::ConfigError;
use log::info;
use std::any::{type_name, TypeId};
use std::collections::HashMap;

/// Stored configuration for one record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub type_name: &'static str,
    pub target: ConnectionTarget,
    pub mapping: TableMapping,
}

impl Registration {
    pub fn table(&self) -> &str {
        &self.mapping.table
    }
}

/// Type → table registry and unit-of-work entry point.
///
/// Build it once at startup, then share it (`&RepositoryRegistry` or
/// `Arc<RepositoryRegistry>`) with every caller.
#[derive(Debug, Default)]
pub struct RepositoryRegistry {
    entries: HashMap<TypeId, Registration>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` as stored in `table` at `target`.
    ///
    /// # Errors
    /// - `InvalidTarget` when the target cannot be opened as written.
    /// - Any mapping error from [`TableMapping::of`].
    /// - `DuplicateRegistration` when `T` is already registered.
    pub fn register<T: Persistable + 'static>(
        &mut self,
        target: ConnectionTarget,
        table: &str,
    ) -> Result<(), ConfigError> {
        let type_name = type_name::<T>();
        if self.entries.contains_key(&TypeId::of::<T>()) {
            return Err(ConfigError::DuplicateRegistration { type_name });
        }
        target
            .validate()
            .map_err(|err| ConfigError::InvalidTarget(err.to_string()))?;
        let mapping = TableMapping::of::<T>(table)?;

        info!(
            "event=repo_register module=registry status=ok type={type_name} table={} columns={} mode={}",
            mapping.table,
            mapping.columns.len(),
            target.mode()
        );
        self.entries.insert(
            TypeId::of::<T>(),
            Registration {
                type_name,
                target,
                mapping,
            },
        );
        Ok(())
    }

    /// Returns the registration of `T`.
    pub fn registration<T: 'static>(&self) -> Result<&Registration, ConfigError> {
        self.entries
            .get(&TypeId::of::<T>())
            .ok_or(ConfigError::NotRegistered {
                type_name: type_name::<T>(),
            })
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
