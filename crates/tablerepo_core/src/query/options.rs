//! Per-call read options.

use crate::query::predicate::Predicate;

/// Sort direction for `ORDER BY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// Ordering on one persisted column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Storage column name.
    pub column: String,
    pub direction: SortDirection,
}

/// Options for `select` and `select_all`.
///
/// `limit` only applies to `select_all`; `select` always reads one row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectOptions {
    pub filter: Option<Predicate>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl SelectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options filtered by `predicate`.
    pub fn filtered(predicate: Predicate) -> Self {
        Self::new().filter(predicate)
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by = Some(OrderBy {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}
