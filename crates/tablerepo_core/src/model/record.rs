//! Record capability and value marshaling.
//!
//! # Responsibility
//! - Define the `Persistable` capability a record type implements instead of
//!   being inspected at runtime.
//! - Convert field values into bound SQL values and result rows back into
//!   typed field values.
//!
//! # Invariants
//! - Scalar values are checked against the declared `FieldType` in both
//!   directions; NULL is accepted only for optional fields.
//! - JSON column payloads that fail to (de)serialize surface as errors and
//!   are never replaced with defaults.

use crate::model::column::{ColumnDescriptor, ColumnKind, FieldSpec, ValueKind};
use rusqlite::types::{Value, ValueRef};
use rusqlite::Row;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Capability implemented by every record type mapped to a table.
///
/// `fields()` is the static annotation table in declaration order. The order
/// drives column order in generated statements, so it must not depend on
/// runtime state.
pub trait Persistable: Sized {
    /// Field annotations in declaration order.
    fn fields() -> &'static [FieldSpec];

    /// Reads one declared field for binding.
    ///
    /// Unknown field names should return [`EncodeError::UnknownField`].
    fn field_value(&self, field: &str) -> Result<FieldValue, EncodeError>;

    /// Builds a record from one decoded row.
    ///
    /// Fields without persistence annotations are not present in `row` and
    /// should be initialized by the implementation.
    fn from_row(row: &RowValues) -> Result<Self, DecodeError>;
}

/// In-memory field value handed to the engine for binding.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Boolean(bool),
    /// Nested value for JSON columns; serialized to text at bind time.
    Json(serde_json::Value),
}

impl FieldValue {
    /// Converts a nested value for a JSON column.
    pub fn json<T: Serialize + ?Sized>(field: &str, value: &T) -> Result<Self, EncodeError> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|source| EncodeError::Json {
                field: field.to_string(),
                source,
            })
    }

    /// Like [`FieldValue::json`], mapping `None` to SQL NULL.
    pub fn optional_json<T: Serialize>(field: &str, value: Option<&T>) -> Result<Self, EncodeError> {
        match value {
            Some(inner) => Self::json(field, inner),
            None => Ok(Self::Null),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
            Self::Boolean(_) => "boolean",
            Self::Json(_) => "json",
        }
    }

    /// Marshals this value for `column` into a bound SQL value.
    ///
    /// JSON columns receive serialized text (a `Text` value becomes a JSON
    /// string); scalar columns receive the value itself with one level of
    /// optionality unwrapped.
    pub fn into_sql(self, column: &ColumnDescriptor) -> Result<Value, EncodeError> {
        if self.is_null() {
            if column.is_optional() {
                return Ok(Value::Null);
            }
            return Err(EncodeError::UnexpectedNull {
                field: column.field,
            });
        }

        match column.kind {
            ColumnKind::Json => match self {
                Self::Json(document) => serde_json::to_string(&document)
                    .map(Value::Text)
                    .map_err(|source| EncodeError::Json {
                        field: column.field.to_string(),
                        source,
                    }),
                // Plain text is stored as a JSON string.
                Self::Text(text) => serde_json::to_string(&text)
                    .map(Value::Text)
                    .map_err(|source| EncodeError::Json {
                        field: column.field.to_string(),
                        source,
                    }),
                other => Err(EncodeError::KindMismatch {
                    field: column.field,
                    expected: column.field_type.kind,
                    found: other.type_name(),
                }),
            },
            ColumnKind::Scalar => {
                let expected = column.field_type.kind;
                match (expected, self) {
                    (ValueKind::Integer, Self::Integer(value)) => Ok(Value::Integer(value)),
                    (ValueKind::Real, Self::Real(value)) => Ok(Value::Real(value)),
                    (ValueKind::Real, Self::Integer(value)) => Ok(Value::Real(value as f64)),
                    (ValueKind::Text, Self::Text(value)) => Ok(Value::Text(value)),
                    (ValueKind::Blob, Self::Blob(value)) => Ok(Value::Blob(value)),
                    (ValueKind::Boolean, Self::Boolean(value)) => {
                        Ok(Value::Integer(i64::from(value)))
                    }
                    (_, other) => Err(EncodeError::KindMismatch {
                        field: column.field,
                        expected,
                        found: other.type_name(),
                    }),
                }
            }
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Field marshaling error.
#[derive(Debug)]
pub enum EncodeError {
    UnknownField(String),
    Json {
        field: String,
        source: serde_json::Error,
    },
    UnexpectedNull {
        field: &'static str,
    },
    KindMismatch {
        field: &'static str,
        expected: ValueKind,
        found: &'static str,
    },
}

impl Display for EncodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownField(field) => write!(f, "record has no field `{field}`"),
            Self::Json { field, source } => {
                write!(f, "failed to serialize field `{field}` as json: {source}")
            }
            Self::UnexpectedNull { field } => {
                write!(f, "field `{field}` is not optional but has no value")
            }
            Self::KindMismatch {
                field,
                expected,
                found,
            } => write!(
                f,
                "field `{field}` is declared as {expected} but produced a {found} value"
            ),
        }
    }
}

impl Error for EncodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Row unmarshaling error.
#[derive(Debug)]
pub enum DecodeError {
    MissingField(String),
    UnexpectedNull {
        field: String,
    },
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    OutOfRange {
        field: String,
        value: i64,
    },
    InvalidUtf8 {
        field: String,
    },
    Json {
        field: String,
        source: serde_json::Error,
    },
    /// Value decoded but violates a record-level rule.
    InvalidData(String),
    Row(rusqlite::Error),
}

impl DecodeError {
    fn mismatch(field: &str, expected: &'static str, found: &Value) -> Self {
        Self::TypeMismatch {
            field: field.to_string(),
            expected,
            found: storage_class(found),
        }
    }
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "row has no value for field `{field}`"),
            Self::UnexpectedNull { field } => {
                write!(f, "NULL stored for non-optional field `{field}`")
            }
            Self::TypeMismatch {
                field,
                expected,
                found,
            } => write!(f, "field `{field}` expects {expected} but row holds {found}"),
            Self::OutOfRange { field, value } => {
                write!(f, "value {value} is out of range for field `{field}`")
            }
            Self::InvalidUtf8 { field } => write!(f, "field `{field}` holds invalid UTF-8 text"),
            Self::Json { field, source } => {
                write!(f, "failed to decode json for field `{field}`: {source}")
            }
            Self::InvalidData(message) => write!(f, "invalid row data: {message}"),
            Self::Row(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json { source, .. } => Some(source),
            Self::Row(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for DecodeError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Row(value)
    }
}

/// Decoded column values of one result row, keyed by source field name.
#[derive(Debug, Clone, Default)]
pub struct RowValues {
    values: Vec<(&'static str, Value)>,
}

impl RowValues {
    /// Decodes `row` using `columns` as the projection, in order.
    pub(crate) fn decode(row: &Row<'_>, columns: &[ColumnDescriptor]) -> Result<Self, DecodeError> {
        let mut values = Vec::with_capacity(columns.len());
        for (index, column) in columns.iter().enumerate() {
            let raw = row.get_ref(index)?;
            values.push((column.field, decode_column(column, raw)?));
        }
        Ok(Self { values })
    }

    /// Returns the raw decoded value for `field`.
    pub fn raw(&self, field: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, value)| value)
    }

    /// Reads a scalar field.
    pub fn get<U: FromColumn>(&self, field: &str) -> Result<U, DecodeError> {
        let value = self
            .raw(field)
            .ok_or_else(|| DecodeError::MissingField(field.to_string()))?;
        U::from_column(field, value)
    }

    /// Deserializes a JSON column into its nested value.
    pub fn json<U: DeserializeOwned>(&self, field: &str) -> Result<U, DecodeError> {
        match self.optional_json(field)? {
            Some(value) => Ok(value),
            None => Err(DecodeError::UnexpectedNull {
                field: field.to_string(),
            }),
        }
    }

    /// Deserializes a nullable JSON column; SQL NULL maps to `None`.
    pub fn optional_json<U: DeserializeOwned>(&self, field: &str) -> Result<Option<U>, DecodeError> {
        let value = self
            .raw(field)
            .ok_or_else(|| DecodeError::MissingField(field.to_string()))?;
        match value {
            Value::Null => Ok(None),
            Value::Text(text) => serde_json::from_str(text)
                .map(Some)
                .map_err(|source| DecodeError::Json {
                    field: field.to_string(),
                    source,
                }),
            other => Err(DecodeError::mismatch(field, "json text", other)),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Conversion from a decoded column value into a record field type.
pub trait FromColumn: Sized {
    fn from_column(field: &str, value: &Value) -> Result<Self, DecodeError>;
}

impl FromColumn for i64 {
    fn from_column(field: &str, value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Integer(value) => Ok(*value),
            Value::Null => Err(unexpected_null(field)),
            other => Err(DecodeError::mismatch(field, "integer", other)),
        }
    }
}

impl FromColumn for i32 {
    fn from_column(field: &str, value: &Value) -> Result<Self, DecodeError> {
        let wide = i64::from_column(field, value)?;
        i32::try_from(wide).map_err(|_| DecodeError::OutOfRange {
            field: field.to_string(),
            value: wide,
        })
    }
}

impl FromColumn for u32 {
    fn from_column(field: &str, value: &Value) -> Result<Self, DecodeError> {
        let wide = i64::from_column(field, value)?;
        u32::try_from(wide).map_err(|_| DecodeError::OutOfRange {
            field: field.to_string(),
            value: wide,
        })
    }
}

impl FromColumn for f64 {
    fn from_column(field: &str, value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Real(value) => Ok(*value),
            Value::Integer(value) => Ok(*value as f64),
            Value::Null => Err(unexpected_null(field)),
            other => Err(DecodeError::mismatch(field, "real", other)),
        }
    }
}

impl FromColumn for bool {
    fn from_column(field: &str, value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Integer(0) => Ok(false),
            Value::Integer(1) => Ok(true),
            Value::Integer(other) => Err(DecodeError::OutOfRange {
                field: field.to_string(),
                value: *other,
            }),
            Value::Null => Err(unexpected_null(field)),
            other => Err(DecodeError::mismatch(field, "boolean", other)),
        }
    }
}

impl FromColumn for String {
    fn from_column(field: &str, value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Text(value) => Ok(value.clone()),
            Value::Null => Err(unexpected_null(field)),
            other => Err(DecodeError::mismatch(field, "text", other)),
        }
    }
}

impl FromColumn for Vec<u8> {
    fn from_column(field: &str, value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Blob(value) => Ok(value.clone()),
            Value::Null => Err(unexpected_null(field)),
            other => Err(DecodeError::mismatch(field, "blob", other)),
        }
    }
}

impl<U: FromColumn> FromColumn for Option<U> {
    fn from_column(field: &str, value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Null => Ok(None),
            other => U::from_column(field, other).map(Some),
        }
    }
}

fn unexpected_null(field: &str) -> DecodeError {
    DecodeError::UnexpectedNull {
        field: field.to_string(),
    }
}

fn decode_column(column: &ColumnDescriptor, raw: ValueRef<'_>) -> Result<Value, DecodeError> {
    if let ValueRef::Null = raw {
        if column.is_optional() {
            return Ok(Value::Null);
        }
        return Err(unexpected_null(column.field));
    }

    let field = column.field;
    match column.kind {
        // Raw payload only; the record deserializes into its own field type.
        ColumnKind::Json => match raw {
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => std::str::from_utf8(bytes)
                .map(|text| Value::Text(text.to_string()))
                .map_err(|_| DecodeError::InvalidUtf8 {
                    field: field.to_string(),
                }),
            other => Err(DecodeError::mismatch(field, "json text", &Value::from(other))),
        },
        ColumnKind::Scalar => match (column.field_type.kind, raw) {
            (ValueKind::Integer, ValueRef::Integer(value)) => Ok(Value::Integer(value)),
            (ValueKind::Boolean, ValueRef::Integer(value)) => match value {
                0 | 1 => Ok(Value::Integer(value)),
                other => Err(DecodeError::OutOfRange {
                    field: field.to_string(),
                    value: other,
                }),
            },
            (ValueKind::Real, ValueRef::Real(value)) => Ok(Value::Real(value)),
            (ValueKind::Real, ValueRef::Integer(value)) => Ok(Value::Real(value as f64)),
            (ValueKind::Text, ValueRef::Text(bytes)) => std::str::from_utf8(bytes)
                .map(|text| Value::Text(text.to_string()))
                .map_err(|_| DecodeError::InvalidUtf8 {
                    field: field.to_string(),
                }),
            (ValueKind::Blob, ValueRef::Blob(bytes)) => Ok(Value::Blob(bytes.to_vec())),
            (kind, other) => Err(DecodeError::TypeMismatch {
                field: field.to_string(),
                expected: kind.as_str(),
                found: storage_class(&Value::from(other)),
            }),
        },
    }
}

/// SQLite storage class name of a value.
pub(crate) fn storage_class(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Integer(_) => "integer",
        Value::Real(_) => "real",
        Value::Text(_) => "text",
        Value::Blob(_) => "blob",
    }
}
