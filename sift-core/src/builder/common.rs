//! Types and traits shared by the query builder

use crate::Value;
use std::fmt::{self, Display};

/// Core trait for query builders: render without executing
pub trait QueryBuilder {
    /// Generate the SQL query string
    fn to_sql(&self) -> String;

    /// Get the parameters for the query, in `?` order
    fn parameters(&self) -> &[Value];
}

/// Trait for types that can be converted to column lists
pub trait IntoColumns {
    fn into_columns(self) -> Vec<String>;
}

impl IntoColumns for &str {
    fn into_columns(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoColumns for String {
    fn into_columns(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoColumns for &String {
    fn into_columns(self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl IntoColumns for Vec<String> {
    fn into_columns(self) -> Vec<String> {
        self
    }
}

impl IntoColumns for Vec<&str> {
    fn into_columns(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoColumns for &[&str] {
    fn into_columns(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

impl<const N: usize> IntoColumns for [&str; N] {
    fn into_columns(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

impl IntoColumns for (&str, &str) {
    fn into_columns(self) -> Vec<String> {
        vec![self.0.to_string(), self.1.to_string()]
    }
}

impl IntoColumns for (&str, &str, &str) {
    fn into_columns(self) -> Vec<String> {
        vec![self.0.to_string(), self.1.to_string(), self.2.to_string()]
    }
}

impl IntoColumns for (&str, &str, &str, &str) {
    fn into_columns(self) -> Vec<String> {
        vec![
            self.0.to_string(),
            self.1.to_string(),
            self.2.to_string(),
            self.3.to_string(),
        ]
    }
}

/// JOIN types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

impl Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER"),
            JoinType::Left => write!(f, "LEFT"),
            JoinType::Right => write!(f, "RIGHT"),
        }
    }
}

/// A JOIN on a single column equality
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: String,
    pub left_column: String,
    pub right_column: String,
}

impl JoinClause {
    pub fn new(join_type: JoinType, table: &str, left_column: &str, right_column: &str) -> Self {
        Self {
            join_type,
            table: table.to_string(),
            left_column: left_column.to_string(),
            right_column: right_column.to_string(),
        }
    }
}

impl Display for JoinClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} JOIN {} ON {} = {}",
            self.join_type, self.table, self.left_column, self.right_column
        )
    }
}

/// Sort direction for ORDER BY clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "ASC"),
            SortDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// An ORDER BY term
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByClause {
    pub column: String,
    pub direction: SortDirection,
}

impl OrderByClause {
    /// Parse a prefixed sort key.
    ///
    /// `-col` sorts descending. `col` and `+col` sort ascending; leading
    /// whitespace after any `+` is dropped too, since a `+` that reached us
    /// through an unencoded query string arrives as a space.
    pub fn parse(key: &str) -> Self {
        if key.starts_with('-') {
            return Self {
                column: key.trim_start_matches('-').to_string(),
                direction: SortDirection::Desc,
            };
        }

        Self {
            column: key.trim_start_matches('+').trim_start().to_string(),
            direction: SortDirection::Asc,
        }
    }
}

impl Display for OrderByClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.column, self.direction)
    }
}

/// Row ordering of a query
#[derive(Debug, Clone, PartialEq)]
pub enum Sort {
    Columns(Vec<OrderByClause>),
    /// Dialect specific random order
    Random,
}
