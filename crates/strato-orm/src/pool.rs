//! Pooled statement execution and result shaping.
//!
//! A [`Pool`] wraps one backend connection pool and executes compiled
//! `(sql, params)` pairs. Results come back as a [`QueryOutput`] whose shape
//! is selected by the [`QueryKind`] the caller passes, so row queries,
//! scalars, and write acknowledgements cannot be confused.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::mysql::{MySqlPool, MySqlRow};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Column as _, Row as _, TypeInfo as _};
use strato_sql_core::dialect::numbered_placeholders;
use strato_sql_core::{FromSqlValue, SqlValue};

use crate::error::{OrmError, Result};

/// One decoded result row: column names paired with dynamically-typed values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Builds a row from parallel column/value lists.
    #[must_use]
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    /// Column names in select-list order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Raw value lookup by column name.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// Decodes a required column; missing columns and type mismatches error.
    pub fn decode<T: FromSqlValue>(&self, column: &str) -> Result<T> {
        let value = self
            .get(column)
            .ok_or_else(|| OrmError::Decode(format!("missing column `{column}`")))?;
        T::from_sql_value(value).ok_or_else(|| {
            OrmError::Decode(format!(
                "column `{column}`: cannot decode {value:?} as {}",
                T::TYPE_NAME
            ))
        })
    }

    /// Decodes an optional column; absent columns and NULL both yield `None`.
    pub fn try_decode<T: FromSqlValue>(&self, column: &str) -> Result<Option<T>> {
        match self.get(column) {
            None | Some(SqlValue::Null) => Ok(None),
            Some(value) => T::from_sql_value(value).map(Some).ok_or_else(|| {
                OrmError::Decode(format!(
                    "column `{column}`: cannot decode {value:?} as {}",
                    T::TYPE_NAME
                ))
            }),
        }
    }

    /// Iterates `(column, value)` pairs in select-list order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// Declared shape of a statement's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// All matching rows.
    All,
    /// At most one row.
    One,
    /// Up to `n` rows.
    Many(usize),
    /// A single integer scalar.
    Count,
    /// A grouped count: the number of returned grouped rows.
    GroupCount,
    /// Single-row INSERT.
    Create,
    /// Multi-row INSERT.
    CreateBatch,
    /// UPDATE by predicate.
    Update,
    /// Per-row UPDATE batch.
    UpdateBatch,
    /// DELETE by predicate.
    Delete,
}

/// Shaped result of one executed statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    /// Row sets (`All` and `Many`).
    Rows(Vec<Row>),
    /// `One`.
    Row(Option<Row>),
    /// `Count`.
    Scalar(i64),
    /// `GroupCount`.
    GroupCount(usize),
    /// `Create`: whether a row was inserted, plus the generated key when the
    /// backend reports one (MySQL only).
    Created {
        ok: bool,
        last_insert_id: Option<u64>,
    },
    /// `CreateBatch`: total inserted rows plus the last generated key.
    CreatedBatch {
        rows: u64,
        last_insert_id: Option<u64>,
    },
    /// `Update` / `Delete`: whether any row was touched.
    Affected(bool),
    /// `UpdateBatch`: total touched rows.
    AffectedCount(u64),
}

/// A backend connection pool.
#[derive(Debug, Clone)]
pub enum Pool {
    MySql(MySqlPool),
    Postgres(PgPool),
}

impl Pool {
    /// Executes one statement, shaping the result per `kind`.
    ///
    /// `sql` uses `?` placeholders; the Postgres arm renumbers them to `$n`
    /// before dispatch. Batch kinds must go through [`Pool::execute_batch`].
    pub async fn execute(
        &self,
        sql: &str,
        params: &[SqlValue],
        kind: QueryKind,
    ) -> Result<QueryOutput> {
        if matches!(kind, QueryKind::CreateBatch | QueryKind::UpdateBatch) {
            return Err(OrmError::Usage(String::from(
                "batch kinds require execute_batch",
            )));
        }
        match self {
            Pool::MySql(pool) => execute_mysql(pool, sql, params, kind).await,
            Pool::Postgres(pool) => {
                let sql = numbered_placeholders(sql);
                execute_postgres(pool, &sql, params, kind).await
            }
        }
    }

    /// Executes one parameterized statement once per parameter set, on a
    /// single connection.
    ///
    /// Postgres refuses batch execution before touching the network; run
    /// per-row statements individually there instead.
    pub async fn execute_batch(
        &self,
        sql: &str,
        sets: &[Vec<SqlValue>],
        kind: QueryKind,
    ) -> Result<QueryOutput> {
        match self {
            Pool::Postgres(_) => Err(OrmError::Unsupported(String::from(
                "postgres does not support batch execution",
            ))),
            Pool::MySql(pool) => {
                let mut conn = pool.acquire().await?;
                let mut total: u64 = 0;
                let mut last_insert_id: Option<u64> = None;
                for params in sets {
                    let mut query = sqlx::query(sql);
                    for value in params {
                        query = bind_mysql(query, value);
                    }
                    let done = query.execute(&mut *conn).await?;
                    total += done.rows_affected();
                    if done.last_insert_id() != 0 {
                        last_insert_id = Some(done.last_insert_id());
                    }
                }
                match kind {
                    QueryKind::CreateBatch => Ok(QueryOutput::CreatedBatch {
                        rows: total,
                        last_insert_id,
                    }),
                    QueryKind::UpdateBatch => Ok(QueryOutput::AffectedCount(total)),
                    _ => Err(OrmError::Usage(String::from(
                        "execute_batch requires a batch kind",
                    ))),
                }
            }
        }
    }

    /// Closes the underlying pool.
    pub async fn close(&self) {
        match self {
            Pool::MySql(pool) => pool.close().await,
            Pool::Postgres(pool) => pool.close().await,
        }
    }
}

async fn execute_mysql(
    pool: &MySqlPool,
    sql: &str,
    params: &[SqlValue],
    kind: QueryKind,
) -> Result<QueryOutput> {
    let mut query = sqlx::query(sql);
    for value in params {
        query = bind_mysql(query, value);
    }
    match kind {
        QueryKind::All | QueryKind::Many(_) => {
            let rows = query.fetch_all(pool).await?;
            Ok(QueryOutput::Rows(
                rows.iter().map(decode_mysql_row).collect::<Result<_>>()?,
            ))
        }
        QueryKind::One => {
            let row = query.fetch_optional(pool).await?;
            Ok(QueryOutput::Row(match &row {
                Some(row) => Some(decode_mysql_row(row)?),
                None => None,
            }))
        }
        QueryKind::Count => {
            let row = query.fetch_one(pool).await?;
            Ok(QueryOutput::Scalar(row.try_get::<i64, _>(0)?))
        }
        QueryKind::GroupCount => {
            let rows = query.fetch_all(pool).await?;
            Ok(QueryOutput::GroupCount(rows.len()))
        }
        QueryKind::Create => {
            let done = query.execute(pool).await?;
            Ok(QueryOutput::Created {
                ok: done.rows_affected() > 0,
                last_insert_id: Some(done.last_insert_id()),
            })
        }
        QueryKind::Update | QueryKind::Delete => {
            let done = query.execute(pool).await?;
            Ok(QueryOutput::Affected(done.rows_affected() > 0))
        }
        QueryKind::CreateBatch | QueryKind::UpdateBatch => unreachable!("rejected in execute"),
    }
}

async fn execute_postgres(
    pool: &PgPool,
    sql: &str,
    params: &[SqlValue],
    kind: QueryKind,
) -> Result<QueryOutput> {
    let mut query = sqlx::query(sql);
    for value in params {
        query = bind_postgres(query, value);
    }
    match kind {
        QueryKind::All | QueryKind::Many(_) => {
            let rows = query.fetch_all(pool).await?;
            Ok(QueryOutput::Rows(
                rows.iter().map(decode_postgres_row).collect::<Result<_>>()?,
            ))
        }
        QueryKind::One => {
            let row = query.fetch_optional(pool).await?;
            Ok(QueryOutput::Row(match &row {
                Some(row) => Some(decode_postgres_row(row)?),
                None => None,
            }))
        }
        QueryKind::Count => {
            let row = query.fetch_one(pool).await?;
            Ok(QueryOutput::Scalar(row.try_get::<i64, _>(0)?))
        }
        QueryKind::GroupCount => {
            let rows = query.fetch_all(pool).await?;
            Ok(QueryOutput::GroupCount(rows.len()))
        }
        QueryKind::Create => {
            let done = query.execute(pool).await?;
            // Postgres reports no generated key through the wire protocol.
            Ok(QueryOutput::Created {
                ok: done.rows_affected() > 0,
                last_insert_id: None,
            })
        }
        QueryKind::Update | QueryKind::Delete => {
            let done = query.execute(pool).await?;
            Ok(QueryOutput::Affected(done.rows_affected() > 0))
        }
        QueryKind::CreateBatch | QueryKind::UpdateBatch => unreachable!("rejected in execute"),
    }
}

type MySqlQuery<'q> = sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments>;
type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

fn bind_mysql<'q>(query: MySqlQuery<'q>, value: &SqlValue) -> MySqlQuery<'q> {
    match value {
        SqlValue::Null => query.bind(Option::<String>::None),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Decimal(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Blob(v) => query.bind(v.clone()),
        SqlValue::Date(v) => query.bind(*v),
        SqlValue::DateTime(v) => query.bind(*v),
        SqlValue::Json(v) => query.bind(v.clone()),
    }
}

fn bind_postgres<'q>(query: PgQuery<'q>, value: &SqlValue) -> PgQuery<'q> {
    match value {
        SqlValue::Null => query.bind(Option::<String>::None),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Decimal(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Blob(v) => query.bind(v.clone()),
        SqlValue::Date(v) => query.bind(*v),
        SqlValue::DateTime(v) => query.bind(*v),
        SqlValue::Json(v) => query.bind(v.clone()),
    }
}

fn decode_mysql_row(row: &MySqlRow) -> Result<Row> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (i, col) in row.columns().iter().enumerate() {
        columns.push(col.name().to_string());
        let value = match col.type_info().name() {
            "BOOLEAN" => row.try_get::<Option<bool>, _>(i)?.map(SqlValue::Bool),
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
                row.try_get::<Option<i64>, _>(i)?.map(SqlValue::Int)
            }
            "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED" => {
                row.try_get::<Option<u32>, _>(i)?
                    .map(|v| SqlValue::Int(i64::from(v)))
            }
            "BIGINT UNSIGNED" => match row.try_get::<Option<u64>, _>(i)? {
                Some(v) => Some(SqlValue::Int(i64::try_from(v).map_err(|_| {
                    OrmError::Decode(format!("column `{}`: unsigned value {v} overflows", col.name()))
                })?)),
                None => None,
            },
            "FLOAT" => row
                .try_get::<Option<f32>, _>(i)?
                .map(|v| SqlValue::Float(f64::from(v))),
            "DOUBLE" => row.try_get::<Option<f64>, _>(i)?.map(SqlValue::Float),
            "DECIMAL" => row.try_get::<Option<Decimal>, _>(i)?.map(SqlValue::Decimal),
            "DATE" => row.try_get::<Option<NaiveDate>, _>(i)?.map(SqlValue::Date),
            "DATETIME" | "TIMESTAMP" => row
                .try_get::<Option<NaiveDateTime>, _>(i)?
                .map(SqlValue::DateTime),
            "JSON" => row
                .try_get::<Option<serde_json::Value>, _>(i)?
                .map(SqlValue::Json),
            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
                row.try_get::<Option<Vec<u8>>, _>(i)?.map(SqlValue::Blob)
            }
            _ => row.try_get::<Option<String>, _>(i)?.map(SqlValue::Text),
        };
        values.push(value.unwrap_or(SqlValue::Null));
    }
    Ok(Row::new(columns, values))
}

fn decode_postgres_row(row: &PgRow) -> Result<Row> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (i, col) in row.columns().iter().enumerate() {
        columns.push(col.name().to_string());
        let value = match col.type_info().name() {
            "BOOL" => row.try_get::<Option<bool>, _>(i)?.map(SqlValue::Bool),
            // sqlx accepts each integer column only at its declared width;
            // fetch narrow and widen afterwards.
            "INT2" => row
                .try_get::<Option<i16>, _>(i)?
                .map(|v| SqlValue::Int(i64::from(v))),
            "INT4" => row
                .try_get::<Option<i32>, _>(i)?
                .map(|v| SqlValue::Int(i64::from(v))),
            "INT8" => row.try_get::<Option<i64>, _>(i)?.map(SqlValue::Int),
            "FLOAT4" => row
                .try_get::<Option<f32>, _>(i)?
                .map(|v| SqlValue::Float(f64::from(v))),
            "FLOAT8" => row.try_get::<Option<f64>, _>(i)?.map(SqlValue::Float),
            "NUMERIC" => row.try_get::<Option<Decimal>, _>(i)?.map(SqlValue::Decimal),
            "DATE" => row.try_get::<Option<NaiveDate>, _>(i)?.map(SqlValue::Date),
            "TIMESTAMP" => row
                .try_get::<Option<NaiveDateTime>, _>(i)?
                .map(SqlValue::DateTime),
            "TIMESTAMPTZ" => row
                .try_get::<Option<DateTime<Utc>>, _>(i)?
                .map(|v| SqlValue::DateTime(v.naive_utc())),
            "JSON" | "JSONB" => row
                .try_get::<Option<serde_json::Value>, _>(i)?
                .map(SqlValue::Json),
            "BYTEA" => row.try_get::<Option<Vec<u8>>, _>(i)?.map(SqlValue::Blob),
            _ => row.try_get::<Option<String>, _>(i)?.map(SqlValue::Text),
        };
        values.push(value.unwrap_or(SqlValue::Null));
    }
    Ok(Row::new(columns, values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> Row {
        Row::new(
            vec![String::from("id"), String::from("name"), String::from("bio")],
            vec![
                SqlValue::Int(7),
                SqlValue::Text(String::from("ada")),
                SqlValue::Null,
            ],
        )
    }

    #[test]
    fn decode_by_column_name() {
        let row = sample_row();
        assert_eq!(row.decode::<i64>("id").expect("id decodes"), 7);
        assert_eq!(
            row.decode::<String>("name").expect("name decodes"),
            String::from("ada")
        );
    }

    #[test]
    fn missing_column_is_a_decode_error() {
        let row = sample_row();
        let err = row.decode::<i64>("nope").expect_err("missing column");
        assert!(matches!(err, OrmError::Decode(_)));
    }

    #[test]
    fn try_decode_maps_null_and_missing_to_none() {
        let row = sample_row();
        assert_eq!(row.try_decode::<String>("bio").expect("null ok"), None);
        assert_eq!(row.try_decode::<String>("nope").expect("missing ok"), None);
        assert_eq!(
            row.try_decode::<String>("name").expect("present ok"),
            Some(String::from("ada"))
        );
    }

    #[test]
    fn type_mismatch_is_a_decode_error() {
        let row = sample_row();
        assert!(row.decode::<Vec<u8>>("name").is_err());
    }

    #[test]
    fn narrow_postgres_integers_decode_at_declared_width() {
        use sqlx::{Postgres, Type};
        let int2 = <i16 as Type<Postgres>>::type_info();
        let int4 = <i32 as Type<Postgres>>::type_info();
        // i64 is only compatible with INT8, so smallint/integer columns
        // must be fetched narrow and widened.
        assert!(!<i64 as Type<Postgres>>::compatible(&int2));
        assert!(!<i64 as Type<Postgres>>::compatible(&int4));
        assert!(<i16 as Type<Postgres>>::compatible(&int2));
        assert!(<i32 as Type<Postgres>>::compatible(&int4));
        assert!(<i64 as Type<Postgres>>::compatible(
            &<i64 as Type<Postgres>>::type_info()
        ));
    }

    #[tokio::test]
    async fn postgres_pool_refuses_batch_before_any_io() {
        // A lazy pool opens no connection; the rejection must come first.
        let pool = Pool::Postgres(
            PgPool::connect_lazy("postgres://localhost/app").expect("lazy pool"),
        );
        let err = pool
            .execute_batch(
                "INSERT INTO t (a) VALUES (?)",
                &[vec![SqlValue::Int(1)]],
                QueryKind::CreateBatch,
            )
            .await
            .expect_err("unsupported");
        assert!(matches!(err, OrmError::Unsupported(_)));
    }
}
