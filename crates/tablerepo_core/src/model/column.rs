//! Field annotations and derived column descriptors.
//!
//! # Responsibility
//! - Define the static annotation vocabulary a record type declares per field.
//! - Define the descriptor shape consumed by statement generation.
//!
//! # Invariants
//! - A field is persisted only when it carries both a storage name and a
//!   storage kind annotation.
//! - Annotation tables are `'static` and immutable for the process lifetime.

use std::fmt::{Display, Formatter};

/// Declared value kind of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Integer,
    Real,
    Text,
    Blob,
    /// Stored as integer `0`/`1`.
    Boolean,
    /// Nested structured value, persisted through a JSON column.
    Document,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Text => "text",
            Self::Blob => "blob",
            Self::Boolean => "boolean",
            Self::Document => "document",
        }
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field value kind plus nullability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldType {
    pub kind: ValueKind,
    /// `true` for `Option<_>` fields; SQL NULL maps to `None`.
    pub optional: bool,
}

impl FieldType {
    pub const INTEGER: Self = Self::required(ValueKind::Integer);
    pub const REAL: Self = Self::required(ValueKind::Real);
    pub const TEXT: Self = Self::required(ValueKind::Text);
    pub const BLOB: Self = Self::required(ValueKind::Blob);
    pub const BOOLEAN: Self = Self::required(ValueKind::Boolean);
    pub const DOCUMENT: Self = Self::required(ValueKind::Document);

    pub const fn required(kind: ValueKind) -> Self {
        Self {
            kind,
            optional: false,
        }
    }

    pub const fn optional(kind: ValueKind) -> Self {
        Self {
            kind,
            optional: true,
        }
    }

    /// Returns the same kind marked as nullable.
    pub const fn nullable(self) -> Self {
        Self::optional(self.kind)
    }
}

/// Logical storage kind of a persisted column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// Value maps directly to one SQL storage class.
    Scalar,
    /// Value is stored as serialized JSON text and decoded into a nested value.
    Json,
}

impl ColumnKind {
    /// Stable annotation string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Json => "json",
        }
    }

    /// Parses the annotation string, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "scalar" => Some(Self::Scalar),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl Display for ColumnKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistence annotations for one declared record field.
///
/// Built with `const` builders so a record type can keep its whole table in
/// a `static`:
///
/// ```
/// use tablerepo_core::{FieldSpec, FieldType};
///
/// static FIELDS: &[FieldSpec] = &[
///     FieldSpec::new("id", FieldType::INTEGER).column("id").scalar().primary_key(),
///     FieldSpec::new("name", FieldType::TEXT).column("name").scalar(),
///     FieldSpec::new("tags", FieldType::DOCUMENT).column("tags").json(),
///     // Not persisted: no storage annotations.
///     FieldSpec::new("scratch", FieldType::TEXT),
/// ];
/// assert_eq!(FIELDS.len(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub field: &'static str,
    pub field_type: FieldType,
    pub column: Option<&'static str>,
    pub kind: Option<ColumnKind>,
    pub default_value: Option<&'static str>,
    pub primary_key: bool,
    pub read_only: bool,
}

impl FieldSpec {
    /// Declares a field with no persistence annotations.
    pub const fn new(field: &'static str, field_type: FieldType) -> Self {
        Self {
            field,
            field_type,
            column: None,
            kind: None,
            default_value: None,
            primary_key: false,
            read_only: false,
        }
    }

    pub const fn column(mut self, name: &'static str) -> Self {
        self.column = Some(name);
        self
    }

    pub const fn kind(mut self, kind: ColumnKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub const fn scalar(self) -> Self {
        self.kind(ColumnKind::Scalar)
    }

    pub const fn json(self) -> Self {
        self.kind(ColumnKind::Json)
    }

    pub const fn default_value(mut self, value: &'static str) -> Self {
        self.default_value = Some(value);
        self
    }

    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Returns the descriptor for this field, or `None` when the field is
    /// missing its storage name or storage kind.
    pub fn descriptor(&self) -> Option<ColumnDescriptor> {
        let name = self.column?;
        let kind = self.kind?;
        Some(ColumnDescriptor {
            field: self.field,
            field_type: self.field_type,
            name,
            kind,
            default_value: self.default_value,
            is_primary_key: self.primary_key,
            is_read_only: self.read_only,
        })
    }
}

/// One persisted field as seen by statement generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Source field name on the record.
    pub field: &'static str,
    pub field_type: FieldType,
    /// Storage column name.
    pub name: &'static str,
    pub kind: ColumnKind,
    /// Recorded only; the store owns default evaluation.
    pub default_value: Option<&'static str>,
    pub is_primary_key: bool,
    pub is_read_only: bool,
}

impl ColumnDescriptor {
    pub fn is_json(&self) -> bool {
        self.kind == ColumnKind::Json
    }

    pub fn is_optional(&self) -> bool {
        self.field_type.optional
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnKind, FieldSpec, FieldType, ValueKind};

    #[test]
    fn descriptor_requires_name_and_kind() {
        let bare = FieldSpec::new("a", FieldType::TEXT);
        let named_only = FieldSpec::new("a", FieldType::TEXT).column("a");
        let kind_only = FieldSpec::new("a", FieldType::TEXT).scalar();
        assert!(bare.descriptor().is_none());
        assert!(named_only.descriptor().is_none());
        assert!(kind_only.descriptor().is_none());

        let full = FieldSpec::new("a", FieldType::TEXT)
            .column("col_a")
            .json()
            .default_value("[]")
            .read_only();
        let descriptor = full.descriptor().expect("fully annotated field");
        assert_eq!(descriptor.name, "col_a");
        assert_eq!(descriptor.kind, ColumnKind::Json);
        assert_eq!(descriptor.default_value, Some("[]"));
        assert!(descriptor.is_read_only);
        assert!(!descriptor.is_primary_key);
    }

    #[test]
    fn column_kind_parses_case_insensitively() {
        assert_eq!(ColumnKind::parse("Json"), Some(ColumnKind::Json));
        assert_eq!(ColumnKind::parse(" scalar "), Some(ColumnKind::Scalar));
        assert_eq!(ColumnKind::parse("xml"), None);
    }

    #[test]
    fn nullable_keeps_kind() {
        let ty = FieldType::INTEGER.nullable();
        assert_eq!(ty.kind, ValueKind::Integer);
        assert!(ty.optional);
    }
}
