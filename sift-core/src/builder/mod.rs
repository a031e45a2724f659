//! Query builder module

pub mod common;
pub mod select;

// Re-export types from submodules
pub use common::{IntoColumns, JoinClause, JoinType, OrderByClause, QueryBuilder, Sort, SortDirection};
pub use select::Query;
