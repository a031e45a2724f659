//! Sift Core - a fluent builder for parameterized SQL SELECT statements
//!
//! Builder calls (table, joins, columns, filters, ordering, pagination) are
//! rendered into one SQL string plus the values for its `?` placeholders, in
//! order. Values are always bound, never spliced into the SQL text. The
//! statement is then run through an [`Executor`].

pub mod builder;
pub mod error;
pub mod executor;
pub mod operator;
pub mod row;
pub mod value;

// Re-export main types
pub use builder::{
    IntoColumns, JoinClause, JoinType, OrderByClause, Query, QueryBuilder, Sort, SortDirection,
};
pub use error::{Error, Result};
pub use executor::{Dialect, Executor};
pub use operator::{op, IntoOperator, Operator, Predicate};
pub use row::Row;
pub use value::Value;

/// Start a new SELECT query bound to `executor`
pub fn query<E: Executor>(executor: &E) -> Query<'_, E> {
    Query::new(executor)
}
