//! Query execution interface and sqlx-backed executors

use crate::{Result, Row, Value};
use std::future::Future;

/// SQL dialect spoken by an executor's database.
///
/// Only consulted for constructs that have no portable spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    MySql,
    Sqlite,
}

impl Dialect {
    /// Function that yields a random number per row, for `ORDER BY`
    pub const fn random_function(self) -> &'static str {
        match self {
            Dialect::MySql => "RAND()",
            Dialect::Sqlite => "RANDOM()",
        }
    }
}

/// A database handle that can run a prepared SELECT.
///
/// Every method prepares `sql`, binds `params` positionally to its `?`
/// markers, executes it and fetches. Preparation failures surface as
/// [`crate::Error::Prepare`] and everything after that as
/// [`crate::Error::Execution`].
pub trait Executor: Send + Sync {
    /// Dialect used to render engine specific clauses
    fn dialect(&self) -> Dialect {
        Dialect::default()
    }

    /// Execute a query and return every row
    fn fetch_all(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Result<Vec<Row>>> + Send;

    /// Execute a query and return the first row, if any
    fn fetch_optional(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Result<Option<Row>>> + Send;

    /// Execute a query and return the first column of the first row, if any
    fn fetch_scalar(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Result<Option<Value>>> + Send {
        async move {
            let row = self.fetch_optional(sql, params).await?;
            Ok(row.and_then(Row::into_first))
        }
    }
}

/// SQLite executor
#[cfg(feature = "sqlite")]
pub mod sqlite {
    use super::*;
    use crate::Error;
    use sqlx::sqlite::{SqliteArguments, SqliteRow};
    use sqlx::{Column as _, Executor as _, Row as _, Sqlite, Statement as _, TypeInfo as _, ValueRef as _};
    use tracing::instrument;

    type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

    /// SQLite connection pool wrapper
    #[derive(Clone, Debug)]
    pub struct SqlitePool {
        inner: sqlx::SqlitePool,
    }

    impl SqlitePool {
        /// Create a new SQLite pool from a connection string
        pub async fn new(database_url: &str) -> Result<Self> {
            let pool = sqlx::SqlitePool::connect(database_url)
                .await
                .map_err(Error::Execution)?;
            Ok(Self { inner: pool })
        }

        /// Create from an existing sqlx pool
        pub fn from_pool(pool: sqlx::SqlitePool) -> Self {
            Self { inner: pool }
        }

        /// The wrapped sqlx pool
        pub fn inner(&self) -> &sqlx::SqlitePool {
            &self.inner
        }
    }

    impl Executor for SqlitePool {
        fn dialect(&self) -> Dialect {
            Dialect::Sqlite
        }

        #[instrument(skip(self, params), fields(param_count = params.len()))]
        async fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
            let statement = (&self.inner).prepare(sql).await.map_err(Error::Prepare)?;
            let rows = bind_values_to_query(statement.query(), params)
                .fetch_all(&self.inner)
                .await
                .map_err(Error::Execution)?;

            rows.iter().map(decode_row).collect()
        }

        #[instrument(skip(self, params), fields(param_count = params.len()))]
        async fn fetch_optional(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
            let statement = (&self.inner).prepare(sql).await.map_err(Error::Prepare)?;
            let row = bind_values_to_query(statement.query(), params)
                .fetch_optional(&self.inner)
                .await
                .map_err(Error::Execution)?;

            row.as_ref().map(decode_row).transpose()
        }
    }

    /// Bind Sift Values to a SQLx query
    fn bind_values_to_query<'q>(mut query: SqliteQuery<'q>, params: &[Value]) -> SqliteQuery<'q> {
        for param in params {
            query = match param {
                Value::Null => query.bind(None::<String>),
                Value::Bool(b) => query.bind(*b),
                Value::I32(i) => query.bind(*i),
                Value::I64(i) => query.bind(*i),
                Value::F32(f) => query.bind(*f),
                Value::F64(f) => query.bind(*f),
                Value::String(s) => query.bind(s.clone()),
                Value::Bytes(b) => query.bind(b.clone()),
            };
        }
        query
    }

    /// SQLite values carry their own storage class, so dispatch on the value
    /// rather than the declared column type.
    fn decode_row(row: &SqliteRow) -> Result<Row> {
        let mut decoded = Row::with_capacity(row.len());

        for (idx, column) in row.columns().iter().enumerate() {
            let column_name = column.name();
            let raw = row.try_get_raw(idx).map_err(Error::Execution)?;
            let storage = if raw.is_null() {
                None
            } else {
                Some(raw.type_info().name().to_string())
            };

            let value = match storage.as_deref() {
                None => Value::Null,
                Some("INTEGER") => Value::I64(decode(row, idx, column_name)?),
                Some("REAL") => Value::F64(decode(row, idx, column_name)?),
                Some("BLOB") => Value::Bytes(decode(row, idx, column_name)?),
                Some(_) => Value::String(decode(row, idx, column_name)?),
            };

            decoded.push(column_name, value);
        }

        Ok(decoded)
    }

    fn decode<'r, T>(row: &'r SqliteRow, idx: usize, column_name: &str) -> Result<T>
    where
        T: sqlx::Decode<'r, Sqlite>,
    {
        row.try_get_unchecked(idx)
            .map_err(|e| Error::decode(column_name, e.to_string()))
    }

}

/// MySQL executor
#[cfg(feature = "mysql")]
pub mod mysql {
    use super::*;
    use crate::Error;
    use sqlx::mysql::{MySqlArguments, MySqlRow};
    use sqlx::{Column as _, Executor as _, MySql, Row as _, Statement as _, TypeInfo as _, ValueRef as _};
    use tracing::instrument;

    type MySqlQuery<'q> = sqlx::query::Query<'q, MySql, MySqlArguments>;

    /// MySQL connection pool wrapper
    #[derive(Clone, Debug)]
    pub struct MySqlPool {
        inner: sqlx::MySqlPool,
    }

    impl MySqlPool {
        /// Create a new MySQL pool from a connection string
        pub async fn new(database_url: &str) -> Result<Self> {
            let pool = sqlx::MySqlPool::connect(database_url)
                .await
                .map_err(Error::Execution)?;
            Ok(Self { inner: pool })
        }

        /// Create from an existing sqlx pool
        pub fn from_pool(pool: sqlx::MySqlPool) -> Self {
            Self { inner: pool }
        }

        /// The wrapped sqlx pool
        pub fn inner(&self) -> &sqlx::MySqlPool {
            &self.inner
        }
    }

    impl Executor for MySqlPool {
        fn dialect(&self) -> Dialect {
            Dialect::MySql
        }

        #[instrument(skip(self, params), fields(param_count = params.len()))]
        async fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
            let statement = (&self.inner).prepare(sql).await.map_err(Error::Prepare)?;
            let rows = bind_values_to_query(statement.query(), params)
                .fetch_all(&self.inner)
                .await
                .map_err(Error::Execution)?;

            rows.iter().map(decode_row).collect()
        }

        #[instrument(skip(self, params), fields(param_count = params.len()))]
        async fn fetch_optional(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
            let statement = (&self.inner).prepare(sql).await.map_err(Error::Prepare)?;
            let row = bind_values_to_query(statement.query(), params)
                .fetch_optional(&self.inner)
                .await
                .map_err(Error::Execution)?;

            row.as_ref().map(decode_row).transpose()
        }
    }

    /// Bind Sift Values to a SQLx query
    fn bind_values_to_query<'q>(mut query: MySqlQuery<'q>, params: &[Value]) -> MySqlQuery<'q> {
        for param in params {
            query = match param {
                Value::Null => query.bind(None::<String>),
                Value::Bool(b) => query.bind(*b),
                Value::I32(i) => query.bind(*i),
                Value::I64(i) => query.bind(*i),
                Value::F32(f) => query.bind(*f),
                Value::F64(f) => query.bind(*f),
                Value::String(s) => query.bind(s.clone()),
                Value::Bytes(b) => query.bind(b.clone()),
            };
        }
        query
    }

    fn decode_row(row: &MySqlRow) -> Result<Row> {
        let mut decoded = Row::with_capacity(row.len());

        for (idx, column) in row.columns().iter().enumerate() {
            let column_name = column.name();
            let raw = row.try_get_raw(idx).map_err(Error::Execution)?;
            if raw.is_null() {
                decoded.push(column_name, Value::Null);
                continue;
            }

            let type_info = column.type_info();
            let type_name = type_info.name();

            let value = match type_name {
                "BOOLEAN" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
                    Value::I64(decode(row, idx, column_name)?)
                }
                "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED"
                | "INT UNSIGNED" | "BIGINT UNSIGNED" => {
                    unsigned_value(decode(row, idx, column_name)?)
                }
                "FLOAT" => Value::F32(decode(row, idx, column_name)?),
                "DOUBLE" => Value::F64(decode(row, idx, column_name)?),
                "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
                    Value::Bytes(decode(row, idx, column_name)?)
                }
                "DATE" | "TIME" | "DATETIME" | "TIMESTAMP" => {
                    decode_temporal(row, idx, column_name, type_name)?
                }
                "CHAR" | "VARCHAR" | "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM"
                | "SET" | "JSON" | "DECIMAL" => Value::String(decode(row, idx, column_name)?),
                unknown => {
                    tracing::warn!(
                        "Unknown MySQL type '{}' for column '{}', attempting string extraction",
                        unknown,
                        column_name
                    );
                    Value::String(decode(row, idx, column_name)?)
                }
            };

            decoded.push(column_name, value);
        }

        Ok(decoded)
    }

    /// Unsigned integers past `i64::MAX` keep their exact digits as text
    fn unsigned_value(value: u64) -> Value {
        i64::try_from(value)
            .map(Value::I64)
            .unwrap_or_else(|_| Value::String(value.to_string()))
    }

    fn decode<'r, T>(row: &'r MySqlRow, idx: usize, column_name: &str) -> Result<T>
    where
        T: sqlx::Decode<'r, MySql>,
    {
        row.try_get_unchecked(idx)
            .map_err(|e| Error::decode(column_name, e.to_string()))
    }

    #[cfg(feature = "datetime-support")]
    fn decode_temporal(row: &MySqlRow, idx: usize, column_name: &str, type_name: &str) -> Result<Value> {
        let value = match type_name {
            "DATE" => Value::from(decode::<chrono::NaiveDate>(row, idx, column_name)?),
            "TIME" => Value::from(decode::<chrono::NaiveTime>(row, idx, column_name)?),
            _ => Value::from(decode::<chrono::NaiveDateTime>(row, idx, column_name)?),
        };
        Ok(value)
    }

    #[cfg(not(feature = "datetime-support"))]
    fn decode_temporal(_row: &MySqlRow, _idx: usize, column_name: &str, type_name: &str) -> Result<Value> {
        Err(Error::decode(
            column_name,
            format!("{type_name} columns require the `datetime-support` feature"),
        ))
    }

}
