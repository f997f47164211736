//! Composable `WHERE` predicate tree.
//!
//! # Responsibility
//! - Model leaf comparisons and `AND`/`OR` combinators as an immutable tree.
//! - Render a tree into SQL text plus an ordered list of bound parameters.
//!
//! # Invariants
//! - Literals are always bound as parameters, never written into SQL text.
//! - Rendering is deterministic: the same tree renders to the same output.
//! - Every node renders parenthesized, so nested combinators keep their
//!   grouping.
//! - A failing sub-expression fails the whole render; no partial text escapes.

use crate::metadata::is_valid_identifier;
use rusqlite::types::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Comparison operator of a leaf predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    /// Substring match; the literal is wrapped in `%` on both sides.
    Like,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Like => "LIKE",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// Literal operand of a leaf predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Real(f64),
    Text(String),
    /// Bound as `0`/`1`.
    Boolean(bool),
}

impl Literal {
    fn to_sql_value(&self) -> Value {
        match self {
            Self::Integer(value) => Value::Integer(*value),
            Self::Real(value) => Value::Real(*value),
            Self::Text(value) => Value::Text(value.clone()),
            Self::Boolean(value) => Value::Integer(i64::from(*value)),
        }
    }
}

/// SQL-literal rendering for diagnostics; never used to build statements.
impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "'{}'", value.replace('\'', "''")),
            Self::Boolean(value) => write!(f, "{}", i64::from(*value)),
        }
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for Literal {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Boolean expression tree used as a `WHERE` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: String,
        op: CompareOp,
        value: Literal,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

/// Rendered predicate: SQL fragment with `?` placeholders and their values
/// in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPredicate {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Predicate {
    pub fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<Literal>) -> Self {
        Self::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    pub fn ne(column: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(column, CompareOp::Ne, value)
    }

    pub fn like(column: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(column, CompareOp::Like, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(column, CompareOp::Lt, value)
    }

    pub fn le(column: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(column, CompareOp::Le, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(column, CompareOp::Gt, value)
    }

    pub fn ge(column: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(column, CompareOp::Ge, value)
    }

    /// Combines `self AND other`.
    pub fn and(self, other: Predicate) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    /// Combines `self OR other`.
    pub fn or(self, other: Predicate) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// Renders this tree into SQL text and bound parameters.
    ///
    /// # Errors
    /// - `InvalidColumn` when a leaf column is not a plain SQL identifier.
    /// - `LikeRequiresText` when a `LIKE` leaf carries a non-text literal.
    pub fn render(&self) -> Result<RenderedPredicate, PredicateError> {
        let mut sql = String::new();
        let mut params = Vec::new();
        self.render_into(&mut sql, &mut params)?;
        Ok(RenderedPredicate { sql, params })
    }

    fn render_into(&self, sql: &mut String, params: &mut Vec<Value>) -> Result<(), PredicateError> {
        match self {
            Self::Compare { column, op, value } => {
                if !is_valid_identifier(column) {
                    return Err(PredicateError::InvalidColumn(column.clone()));
                }
                let bound = match (op, value) {
                    (CompareOp::Like, Literal::Text(text)) => Value::Text(format!("%{text}%")),
                    (CompareOp::Like, _) => {
                        return Err(PredicateError::LikeRequiresText {
                            column: column.clone(),
                        });
                    }
                    (_, literal) => literal.to_sql_value(),
                };
                sql.push_str(&format!("({column} {} ?)", op.as_sql()));
                params.push(bound);
                Ok(())
            }
            Self::And(left, right) => render_pair(left, right, "AND", sql, params),
            Self::Or(left, right) => render_pair(left, right, "OR", sql, params),
        }
    }
}

fn render_pair(
    left: &Predicate,
    right: &Predicate,
    keyword: &str,
    sql: &mut String,
    params: &mut Vec<Value>,
) -> Result<(), PredicateError> {
    let left = left.render()?;
    let right = right.render()?;
    sql.push_str(&format!("({} {keyword} {})", left.sql, right.sql));
    params.extend(left.params);
    params.extend(right.params);
    Ok(())
}

/// Predicate rendering error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateError {
    InvalidColumn(String),
    LikeRequiresText { column: String },
}

impl Display for PredicateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidColumn(column) => {
                write!(f, "predicate column `{column}` is not a valid identifier")
            }
            Self::LikeRequiresText { column } => {
                write!(f, "LIKE on column `{column}` requires a text literal")
            }
        }
    }
}

impl Error for PredicateError {}

#[cfg(test)]
mod tests {
    use super::{Literal, Predicate, PredicateError};
    use rusqlite::types::Value;

    #[test]
    fn leaf_renders_placeholder_and_binds_literal() {
        let rendered = Predicate::eq("name", "a").render().unwrap();
        assert_eq!(rendered.sql, "(name = ?)");
        assert_eq!(rendered.params, vec![Value::Text("a".to_string())]);
    }

    #[test]
    fn like_wraps_literal_in_wildcards() {
        let rendered = Predicate::like("name", "ab").render().unwrap();
        assert_eq!(rendered.sql, "(name LIKE ?)");
        assert_eq!(rendered.params, vec![Value::Text("%ab%".to_string())]);

        let err = Predicate::like("id", 3).render().unwrap_err();
        assert_eq!(
            err,
            PredicateError::LikeRequiresText {
                column: "id".to_string()
            }
        );
    }

    #[test]
    fn failing_branch_fails_whole_tree() {
        let tree = Predicate::eq("id", 1).or(Predicate::eq("name; DROP TABLE x", "a"));
        let err = tree.render().unwrap_err();
        assert!(matches!(err, PredicateError::InvalidColumn(_)));
    }

    #[test]
    fn literal_display_quotes_text_only() {
        assert_eq!(Literal::from("it's").to_string(), "'it''s'");
        assert_eq!(Literal::from(42).to_string(), "42");
        assert_eq!(Literal::from(true).to_string(), "1");
    }
}
