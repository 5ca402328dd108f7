//! Attribute query model shared by collections and stores.
//!
//! # Responsibility
//! - Define filter operators, ordering and the request a store executes.
//! - Shape caller conditions into store requests (`plan`).
//! - Provide a reference evaluator for in-process stores (`eval`).
//!
//! # Invariants
//! - A `StructuredQuery` holds at most one `in` filter with at most
//!   `MAX_IN_VALUES` values.

pub mod eval;
pub mod plan;

use crate::schema::validate::ValidationError;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Max number of values the store accepts in a single `in` filter.
pub const MAX_IN_VALUES: usize = 10;
/// Max number of `in` chunks one request may fan out into.
pub const MAX_IN_CHUNKS: usize = 10;

/// Filter operator understood by the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    In,
    NotIn,
    ArrayContains,
    ArrayContainsAny,
}

impl Operator {
    /// Wire form of the operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::In => "in",
            Self::NotIn => "not-in",
            Self::ArrayContains => "array-contains",
            Self::ArrayContainsAny => "array-contains-any",
        }
    }

    /// Whether this operator may be combined with other operator kinds.
    pub fn is_mixable(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::LessThan
                | Self::LessThanOrEqual
                | Self::GreaterThan
                | Self::GreaterThanOrEqual
                | Self::In
        )
    }

    /// Whether the operand must be an array of candidate values.
    pub fn takes_array(self) -> bool {
        matches!(self, Self::In | Self::NotIn | Self::ArrayContainsAny)
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "==" => Ok(Self::Equal),
            "!=" => Ok(Self::NotEqual),
            "<" => Ok(Self::LessThan),
            "<=" => Ok(Self::LessThanOrEqual),
            ">" => Ok(Self::GreaterThan),
            ">=" => Ok(Self::GreaterThanOrEqual),
            "in" => Ok(Self::In),
            "not-in" | "not_in" => Ok(Self::NotIn),
            "array-contains" | "array_contains" => Ok(Self::ArrayContains),
            "array-contains-any" | "array_contains_any" => Ok(Self::ArrayContainsAny),
            other => Err(QueryError::UnknownOperator(other.to_string())),
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction for `OrderBy`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "ASCENDING",
            Self::Descending => "DESCENDING",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }
}

/// One `field op value` filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: Operator,
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Equal, value)
    }
}

/// Request executed by a `DocumentStore` against one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredQuery {
    pub filters: Vec<Condition>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
}

impl StructuredQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.filters.push(condition);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

pub type QueryResult<T> = Result<T, QueryError>;

/// Rejected query shape.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    UnknownOperator(String),
    InvalidFieldPath(ValidationError),
    MultipleIn,
    TooManyInValues { values: usize, max: usize },
    OrderByWithIn,
    UnmixableOperators(Vec<Operator>),
    ExpectedArray { field: String, op: Operator },
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownOperator(op) => write!(f, "unknown query operator `{op}`"),
            Self::InvalidFieldPath(err) => write!(f, "{err}"),
            Self::MultipleIn => write!(f, "cannot use more than one `in` operator in conditions"),
            Self::TooManyInValues { values, max } => write!(
                f,
                "too many values provided for `in` query: {values} (max {max})"
            ),
            Self::OrderByWithIn => write!(f, "`order_by` is not supported together with `in`"),
            Self::UnmixableOperators(ops) => {
                let used = ops
                    .iter()
                    .map(|op| op.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(
                    f,
                    "operators [{used}] cannot be mixed; only ==, <, <=, >, >=, in can"
                )
            }
            Self::ExpectedArray { field, op } => {
                write!(f, "`{op}` condition on `{field}` requires an array value")
            }
        }
    }
}

impl Error for QueryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidFieldPath(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for QueryError {
    fn from(value: ValidationError) -> Self {
        Self::InvalidFieldPath(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{Operator, QueryError};

    #[test]
    fn operators_parse_case_insensitively() {
        assert_eq!("IN".parse::<Operator>().unwrap(), Operator::In);
        assert_eq!(" >= ".parse::<Operator>().unwrap(), Operator::GreaterThanOrEqual);
        assert_eq!(
            "Array-Contains-Any".parse::<Operator>().unwrap(),
            Operator::ArrayContainsAny
        );
        assert_eq!(
            "like".parse::<Operator>().unwrap_err(),
            QueryError::UnknownOperator("like".to_string())
        );
    }
}
