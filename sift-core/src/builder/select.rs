//! SELECT query builder implementation

use super::common::{IntoColumns, JoinClause, JoinType, OrderByClause, QueryBuilder, Sort};
use crate::{Error, Executor, IntoOperator, Result, Row, Value};
use std::fmt;
use tracing::{debug, warn};

/// A SELECT statement under construction, bound to the executor that will run it.
///
/// Builder methods take the query by value and hand it back, so a chain can
/// end directly in one of the terminal methods ([`get`](Self::get),
/// [`row`](Self::row), [`single`](Self::single),
/// [`get_total_rows`](Self::get_total_rows)). A query runs at most once;
/// clone it to run variants.
///
/// ```ignore
/// let rows = sift_core::query(&pool)
///     .table("users")
///     .select(("id", "name"))
///     .where_("age", "ge", 18)?
///     .where_("status", "eq", "active")?
///     .order_by(["-created_at"])
///     .limit(10)
///     .get()
///     .await?;
/// ```
pub struct Query<'e, E: Executor> {
    executor: &'e E,
    from: Option<String>,
    distinct: bool,
    inner_join: Option<JoinClause>,
    left_join: Option<JoinClause>,
    right_join: Option<JoinClause>,
    columns: Vec<String>,
    filters: Vec<String>,
    sort: Option<Sort>,
    limit: Option<i64>,
    offset: Option<i64>,
    parameters: Vec<Value>,
}

impl<'e, E: Executor> Query<'e, E> {
    /// Create an empty query bound to `executor`
    pub fn new(executor: &'e E) -> Self {
        Self {
            executor,
            from: None,
            distinct: false,
            inner_join: None,
            left_join: None,
            right_join: None,
            columns: Vec::new(),
            filters: Vec::new(),
            sort: None,
            limit: None,
            offset: None,
            parameters: Vec::new(),
        }
    }

    /// Set the table to select from. The name is written verbatim.
    pub fn table(mut self, name: &str) -> Self {
        self.from = Some(name.to_string());
        self
    }

    /// Mark the query as DISTINCT
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Set the INNER JOIN, replacing any earlier one
    pub fn inner_join(mut self, table: &str, left_column: &str, right_column: &str) -> Self {
        self.inner_join = Some(JoinClause::new(JoinType::Inner, table, left_column, right_column));
        self
    }

    /// Set the LEFT JOIN, replacing any earlier one
    pub fn left_join(mut self, table: &str, left_column: &str, right_column: &str) -> Self {
        self.left_join = Some(JoinClause::new(JoinType::Left, table, left_column, right_column));
        self
    }

    /// Set the RIGHT JOIN, replacing any earlier one
    pub fn right_join(mut self, table: &str, left_column: &str, right_column: &str) -> Self {
        self.right_join = Some(JoinClause::new(JoinType::Right, table, left_column, right_column));
        self
    }

    /// Append one or more columns to the select list. Without any, `*` is selected.
    pub fn select<T>(mut self, columns: T) -> Self
    where
        T: IntoColumns,
    {
        self.columns.extend(columns.into_columns());
        self
    }

    /// Add a filter, joined to earlier ones with AND.
    ///
    /// `operator` is one of `eq`, `!eq`, `lt`, `gt`, `le`, `ge`, `sw`, `!sw`,
    /// `ew`, `!ew`, `has`, `!has`, `in`, `!in`, `null` or an
    /// [`Operator`](crate::Operator). On error the query is consumed with
    /// nothing added; clone it first to keep building after a rejection.
    pub fn where_<O, V>(mut self, column: &str, operator: O, value: V) -> Result<Self>
    where
        O: IntoOperator,
        V: Into<Value>,
    {
        let predicate = operator
            .into_operator(column)
            .and_then(|op| op.render(column, value.into()))
            .map_err(|e| {
                warn!(column, error = %e, "Rejected filter");
                e
            })?;

        self.filters.push(predicate.sql);
        self.parameters.extend(predicate.parameters);
        Ok(self)
    }

    /// Order by prefixed keys: `-col` descending, `col` or `+col` ascending.
    /// An empty list keeps the current ordering.
    pub fn order_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let clauses: Vec<OrderByClause> = columns
            .into_iter()
            .map(|key| OrderByClause::parse(key.as_ref()))
            .collect();

        if !clauses.is_empty() {
            self.sort = Some(Sort::Columns(clauses));
        }
        self
    }

    /// Order rows randomly, replacing any earlier ordering
    pub fn order_by_rand(mut self) -> Self {
        self.sort = Some(Sort::Random);
        self
    }

    /// Set the LIMIT clause
    pub fn limit(mut self, count: i64) -> Self {
        self.limit = Some(count);
        self
    }

    /// Set the OFFSET clause
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Render the row count variant: FROM, joins and WHERE only
    pub fn to_count_sql(&self) -> String {
        let mut sql = String::from("SELECT COUNT(*)");
        self.push_source(&mut sql);
        sql
    }

    /// Execute the query and return every row
    pub async fn get(self) -> Result<Vec<Row>> {
        let sql = self.to_sql();
        debug!(sql = %sql, params = self.parameters.len(), "Fetching all rows");
        self.executor.fetch_all(&sql, &self.parameters).await
    }

    /// Execute the query and return the first row, if any
    pub async fn row(self) -> Result<Option<Row>> {
        let sql = self.to_sql();
        debug!(sql = %sql, params = self.parameters.len(), "Fetching first row");
        self.executor.fetch_optional(&sql, &self.parameters).await
    }

    /// Execute the query and return the first column of the first row, if any
    pub async fn single(self) -> Result<Option<Value>> {
        let sql = self.to_sql();
        debug!(sql = %sql, params = self.parameters.len(), "Fetching single value");
        self.executor.fetch_scalar(&sql, &self.parameters).await
    }

    /// Count the rows matching FROM, joins and WHERE, ignoring columns,
    /// DISTINCT, ordering, LIMIT and OFFSET.
    pub async fn get_total_rows(self) -> Result<i64> {
        let sql = self.to_count_sql();
        debug!(sql = %sql, params = self.parameters.len(), "Counting rows");

        match self.executor.fetch_scalar(&sql, &self.parameters).await? {
            None => Ok(0),
            Some(value) => value.as_i64().ok_or_else(|| {
                Error::decode(
                    "COUNT(*)",
                    format!("expected an integer, got {}", value.type_name()),
                )
            }),
        }
    }

    fn push_source(&self, sql: &mut String) {
        if let Some(table) = &self.from {
            sql.push_str(" FROM ");
            sql.push_str(table);
        }

        for join in [&self.inner_join, &self.left_join, &self.right_join]
            .into_iter()
            .flatten()
        {
            sql.push(' ');
            sql.push_str(&join.to_string());
        }

        if !self.filters.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.filters.join(" AND "));
        }
    }
}

impl<'e, E: Executor> QueryBuilder for Query<'e, E> {
    fn to_sql(&self) -> String {
        let mut sql = String::from("SELECT ");

        if self.distinct {
            sql.push_str("DISTINCT ");
        }

        if self.columns.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.columns.join(", "));
        }

        self.push_source(&mut sql);

        match &self.sort {
            Some(Sort::Columns(clauses)) => {
                let order_parts: Vec<String> = clauses.iter().map(ToString::to_string).collect();
                sql.push_str(" ORDER BY ");
                sql.push_str(&order_parts.join(", "));
            }
            Some(Sort::Random) => {
                sql.push_str(" ORDER BY ");
                sql.push_str(self.executor.dialect().random_function());
            }
            None => {}
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        sql
    }

    fn parameters(&self) -> &[Value] {
        &self.parameters
    }
}

impl<'e, E: Executor> Clone for Query<'e, E> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor,
            from: self.from.clone(),
            distinct: self.distinct,
            inner_join: self.inner_join.clone(),
            left_join: self.left_join.clone(),
            right_join: self.right_join.clone(),
            columns: self.columns.clone(),
            filters: self.filters.clone(),
            sort: self.sort.clone(),
            limit: self.limit,
            offset: self.offset,
            parameters: self.parameters.clone(),
        }
    }
}

impl<'e, E: Executor> fmt::Debug for Query<'e, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("sql", &self.to_sql())
            .field("parameters", &self.parameters)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::RecordingExecutor;
    use crate::{op, Dialect, Operator};

    fn executor() -> RecordingExecutor {
        RecordingExecutor::default()
    }

    fn count_row(count: i64) -> Row {
        let mut row = Row::new();
        row.push("COUNT(*)", Value::I64(count));
        row
    }

    #[test]
    fn test_basic_select() {
        let db = executor();
        let query = Query::new(&db).table("users");
        assert_eq!(query.to_sql(), "SELECT * FROM users");
        assert!(query.parameters().is_empty());
    }

    #[test]
    fn test_empty_query_renders_only_select() {
        let db = executor();
        assert_eq!(Query::new(&db).to_sql(), "SELECT *");
    }

    #[test]
    fn test_select_columns() {
        let db = executor();
        let query = Query::new(&db).table("users").select(("id", "name"));
        assert_eq!(query.to_sql(), "SELECT id, name FROM users");
    }

    #[test]
    fn test_select_accumulates_in_call_order() {
        let db = executor();
        let query = Query::new(&db).table("t").select("a").select(vec!["b", "c"]);
        assert_eq!(query.to_sql(), "SELECT a, b, c FROM t");
    }

    #[test]
    fn test_distinct_basic() {
        let db = executor();
        let query = Query::new(&db).table("users").select("status").distinct();
        assert_eq!(query.to_sql(), "SELECT DISTINCT status FROM users");
    }

    #[test]
    fn test_full_chain() {
        let db = executor();
        let query = Query::new(&db)
            .table("users")
            .select(vec!["id", "name"])
            .where_("age", "ge", 18)
            .unwrap()
            .where_("status", "eq", "active")
            .unwrap()
            .limit(10)
            .offset(5);

        assert_eq!(
            query.to_sql(),
            "SELECT id, name FROM users WHERE age >= ? AND status = ? LIMIT 10 OFFSET 5"
        );
        assert_eq!(
            query.parameters(),
            &[Value::I32(18), Value::from("active")]
        );
    }

    #[test]
    fn test_where_with_operator_constants() {
        let db = executor();
        let query = Query::new(&db)
            .table("users")
            .where_("age", op::GT, 21)
            .unwrap()
            .where_("name", Operator::NotHas, "bot")
            .unwrap();

        assert_eq!(
            query.to_sql(),
            "SELECT * FROM users WHERE age > ? AND name NOT LIKE ?"
        );
        assert_eq!(query.parameters(), &[Value::I32(21), Value::from("%bot%")]);
    }

    #[test]
    fn test_each_simple_operator_binds_exactly_one_value() {
        let cases = [
            ("eq", Value::from("v")),
            ("!eq", Value::from("v")),
            ("lt", Value::from("v")),
            ("gt", Value::from("v")),
            ("le", Value::from("v")),
            ("ge", Value::from("v")),
            ("sw", Value::from("v%")),
            ("!sw", Value::from("v%")),
            ("ew", Value::from("%v")),
            ("!ew", Value::from("%v")),
            ("has", Value::from("%v%")),
            ("!has", Value::from("%v%")),
        ];

        for (token, bound) in cases {
            let db = executor();
            let query = Query::new(&db).table("t").where_("c", token, "v").unwrap();
            assert_eq!(query.parameters(), &[bound], "operator {token}");
            assert_eq!(query.to_sql().matches('?').count(), 1, "operator {token}");
        }
    }

    #[test]
    fn test_in_binds_one_value_per_token() {
        let db = executor();
        let query = Query::new(&db).table("t").where_("c", "in", "a,b,c").unwrap();

        assert_eq!(query.to_sql(), "SELECT * FROM t WHERE c IN (?,?,?)");
        assert_eq!(
            query.parameters(),
            &[Value::from("a"), Value::from("b"), Value::from("c")]
        );
    }

    #[test]
    fn test_not_in_after_other_filters_keeps_parameter_order() {
        let db = executor();
        let query = Query::new(&db)
            .table("t")
            .where_("x", "eq", 1)
            .unwrap()
            .where_("c", "!in", "4,5")
            .unwrap()
            .where_("y", "lt", 9)
            .unwrap();

        assert_eq!(
            query.to_sql(),
            "SELECT * FROM t WHERE x = ? AND c NOT IN (?,?) AND y < ?"
        );
        assert_eq!(
            query.parameters(),
            &[
                Value::I32(1),
                Value::from("4"),
                Value::from("5"),
                Value::I32(9)
            ]
        );
    }

    #[test]
    fn test_null_operator() {
        let db = executor();
        let query = Query::new(&db)
            .table("t")
            .where_("deleted_at", "null", "true")
            .unwrap()
            .where_("email", "null", "false")
            .unwrap();

        assert_eq!(
            query.to_sql(),
            "SELECT * FROM t WHERE deleted_at IS NULL AND email IS NOT NULL"
        );
        assert!(query.parameters().is_empty());
    }

    #[test]
    fn test_empty_string_comparison_is_inline() {
        let db = executor();
        let query = Query::new(&db).table("t").where_("nickname", "!eq", "").unwrap();
        assert_eq!(query.to_sql(), "SELECT * FROM t WHERE nickname != ''");
        assert!(query.parameters().is_empty());
    }

    #[test]
    fn test_missing_value_compares_against_empty_string() {
        let db = executor();
        let query = Query::new(&db)
            .table("t")
            .where_("c", "eq", Value::Null)
            .unwrap()
            .where_("d", "lt", None::<i32>)
            .unwrap();

        assert_eq!(query.to_sql(), "SELECT * FROM t WHERE c = '' AND d < ''");
        assert!(query.parameters().is_empty());
    }

    #[test]
    fn test_invalid_operator_leaves_query_untouched() {
        let db = executor();
        let query = Query::new(&db).table("t").where_("a", "eq", 1).unwrap();
        let before = query.to_sql();

        let err = query.clone().where_("b", "bogus", 2).unwrap_err();
        assert!(matches!(err, Error::InvalidOperator { .. }));
        assert_eq!(query.parameters().len(), 1);
        assert_eq!(query.to_sql(), before);

        // The next valid filter joins cleanly
        let query = query.where_("c", "gt", 3).unwrap();
        assert_eq!(query.to_sql(), "SELECT * FROM t WHERE a = ? AND c > ?");
        assert_eq!(query.parameters(), &[Value::I32(1), Value::I32(3)]);
    }

    #[test]
    fn test_invalid_null_value_leaves_query_untouched() {
        let db = executor();
        let query = Query::new(&db).table("t");

        let err = query.clone().where_("a", "null", "maybe").unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));
        assert_eq!(query.to_sql(), "SELECT * FROM t");
        assert!(query.parameters().is_empty());
    }

    #[test]
    fn test_joins_render_in_fixed_order() {
        let db = executor();
        let query = Query::new(&db)
            .table("users")
            .right_join("teams", "users.team_id", "teams.id")
            .left_join("profiles", "users.id", "profiles.user_id")
            .inner_join("accounts", "users.account_id", "accounts.id");

        assert_eq!(
            query.to_sql(),
            "SELECT * FROM users \
             INNER JOIN accounts ON users.account_id = accounts.id \
             LEFT JOIN profiles ON users.id = profiles.user_id \
             RIGHT JOIN teams ON users.team_id = teams.id"
        );
    }

    #[test]
    fn test_repeated_join_kind_overwrites() {
        let db = executor();
        let query = Query::new(&db)
            .table("users")
            .left_join("profiles", "users.id", "profiles.user_id")
            .left_join("avatars", "users.id", "avatars.user_id");

        assert_eq!(
            query.to_sql(),
            "SELECT * FROM users LEFT JOIN avatars ON users.id = avatars.user_id"
        );
    }

    #[test]
    fn test_order_by_prefixes() {
        let db = executor();
        let query = Query::new(&db)
            .table("users")
            .order_by(["-age", "name", "+id"]);
        assert_eq!(
            query.to_sql(),
            "SELECT * FROM users ORDER BY age DESC, name ASC, id ASC"
        );
    }

    #[test]
    fn test_empty_order_by_is_noop() {
        let db = executor();
        let query = Query::new(&db).table("users").order_by(Vec::<String>::new());
        assert_eq!(query.to_sql(), "SELECT * FROM users");

        let query = query.order_by(["name"]).order_by(Vec::<&str>::new());
        assert_eq!(query.to_sql(), "SELECT * FROM users ORDER BY name ASC");
    }

    #[test]
    fn test_order_by_rand_overwrites_sort() {
        let db = executor();
        let query = Query::new(&db).table("users").order_by(["name"]).order_by_rand();
        assert_eq!(query.to_sql(), "SELECT * FROM users ORDER BY RAND()");

        let query = query.order_by(["-id"]);
        assert_eq!(query.to_sql(), "SELECT * FROM users ORDER BY id DESC");
    }

    #[test]
    fn test_order_by_rand_follows_dialect() {
        let db = RecordingExecutor {
            dialect: Dialect::Sqlite,
            ..RecordingExecutor::default()
        };
        let query = Query::new(&db).table("users").order_by_rand();
        assert_eq!(query.to_sql(), "SELECT * FROM users ORDER BY RANDOM()");
    }

    #[test]
    fn test_limit_and_offset_overwrite() {
        let db = executor();
        let query = Query::new(&db)
            .table("users")
            .limit(5)
            .offset(1)
            .limit(10)
            .offset(-2);
        assert_eq!(query.to_sql(), "SELECT * FROM users LIMIT 10 OFFSET -2");
    }

    #[test]
    fn test_full_clause_order() {
        let db = executor();
        let query = Query::new(&db)
            .offset(40)
            .limit(20)
            .order_by(["-created_at"])
            .where_("users.active", "eq", true)
            .unwrap()
            .left_join("profiles", "users.id", "profiles.user_id")
            .select("users.*")
            .distinct()
            .table("users");

        assert_eq!(
            query.to_sql(),
            "SELECT DISTINCT users.* FROM users \
             LEFT JOIN profiles ON users.id = profiles.user_id \
             WHERE users.active = ? ORDER BY created_at DESC LIMIT 20 OFFSET 40"
        );
    }

    #[test]
    fn test_count_sql_ignores_projection_and_paging() {
        let db = executor();
        let query = Query::new(&db)
            .table("users")
            .distinct()
            .select(vec!["id", "name"])
            .inner_join("teams", "users.team_id", "teams.id")
            .where_("age", "ge", 18)
            .unwrap()
            .order_by(["-age"])
            .limit(10)
            .offset(5);

        let sql = query.to_count_sql();
        assert_eq!(
            sql,
            "SELECT COUNT(*) FROM users INNER JOIN teams ON users.team_id = teams.id WHERE age >= ?"
        );
        assert!(!sql.contains("LIMIT"));
        assert!(!sql.contains("OFFSET"));
        assert!(!sql.contains("ORDER BY"));
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let db = executor();
        let query = Query::new(&db)
            .table("users")
            .where_("id", "in", "1,2")
            .unwrap()
            .order_by(["name"]);

        let first = (query.to_sql(), query.parameters().to_vec());
        let second = (query.to_sql(), query.parameters().to_vec());
        assert_eq!(first, second);
    }

    #[test]
    fn test_clone_for_variants() {
        let db = executor();
        let base = Query::new(&db).table("users").where_("active", "eq", 1).unwrap();
        let adults = base.clone().where_("age", "ge", 18).unwrap();

        assert_eq!(base.to_sql(), "SELECT * FROM users WHERE active = ?");
        assert_eq!(
            adults.to_sql(),
            "SELECT * FROM users WHERE active = ? AND age >= ?"
        );
    }

    #[tokio::test]
    async fn test_chain_ends_in_terminal_method() {
        let mut row = Row::new();
        row.push("id", Value::I64(1));
        let db = RecordingExecutor::with_rows(vec![row]);

        let rows = crate::query(&db)
            .table("users")
            .where_("a", "eq", 1)
            .unwrap()
            .get()
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);

        let total = crate::query(&db)
            .table("users")
            .where_("a", "eq", 1)
            .unwrap()
            .get_total_rows()
            .await;
        assert!(matches!(total, Ok(1)));
    }

    #[tokio::test]
    async fn test_get_passes_sql_and_parameters() {
        let mut row = Row::new();
        row.push("id", Value::I64(1));
        let db = RecordingExecutor::with_rows(vec![row.clone(), row]);

        let rows = Query::new(&db)
            .table("users")
            .select("id")
            .where_("name", "sw", "Jo")
            .unwrap()
            .get()
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(
            db.calls(),
            vec![(
                "SELECT id FROM users WHERE name LIKE ?".to_string(),
                vec![Value::from("Jo%")]
            )]
        );
    }

    #[tokio::test]
    async fn test_get_without_rows_is_empty() {
        let db = executor();
        let rows = Query::new(&db).table("users").get().await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_row_and_single() {
        let mut row = Row::new();
        row.push("name", Value::from("John"));
        row.push("age", Value::I64(34));
        let db = RecordingExecutor::with_rows(vec![row]);

        let query = Query::new(&db).table("users").where_("id", "eq", 1).unwrap();
        let found = query.clone().row().await.unwrap().unwrap();
        assert_eq!(found.get("age"), Some(&Value::I64(34)));

        let single = query.single().await.unwrap();
        assert_eq!(single, Some(Value::from("John")));

        let calls = db.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], calls[1]);
    }

    #[tokio::test]
    async fn test_row_and_single_without_rows() {
        let db = executor();
        let query = Query::new(&db).table("users");
        assert_eq!(query.clone().row().await.unwrap(), None);
        assert_eq!(query.single().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_total_rows_uses_count_query_and_same_parameters() {
        let db = RecordingExecutor::with_rows(vec![count_row(42)]);
        let query = Query::new(&db)
            .table("users")
            .select("name")
            .where_("age", "ge", 18)
            .unwrap()
            .where_("role", "in", "admin,editor")
            .unwrap()
            .order_by_rand()
            .limit(10)
            .offset(20);
        let expected_params = query.parameters().to_vec();

        assert_eq!(query.get_total_rows().await.unwrap(), 42);
        assert_eq!(
            db.calls(),
            vec![(
                "SELECT COUNT(*) FROM users WHERE age >= ? AND role IN (?,?)".to_string(),
                expected_params
            )]
        );
    }

    #[tokio::test]
    async fn test_get_total_rows_accepts_textual_counts() {
        let mut row = Row::new();
        row.push("COUNT(*)", Value::from("7"));
        let db = RecordingExecutor::with_rows(vec![row]);

        let total = Query::new(&db).table("users").get_total_rows().await;
        assert_eq!(total.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_get_total_rows_rejects_non_integer() {
        let mut row = Row::new();
        row.push("COUNT(*)", Value::F64(1.5));
        let db = RecordingExecutor::with_rows(vec![row]);

        let result = Query::new(&db).table("users").get_total_rows().await;
        assert!(matches!(result, Err(Error::Decode { .. })));
    }

    #[tokio::test]
    async fn test_executor_errors_propagate() {
        let db = RecordingExecutor {
            fail_prepare: true,
            ..RecordingExecutor::default()
        };
        let query = Query::new(&db).table("users");

        let result = query.clone().get().await;
        assert!(matches!(result, Err(Error::Prepare(_))));
        let result = query.get_total_rows().await;
        assert!(matches!(result, Err(Error::Prepare(_))));
    }
}
