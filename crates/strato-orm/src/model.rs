//! Entity-level persistence operations.

use chrono::{NaiveDateTime, Utc};
use strato_sql_core::{Field, SqlValue, Table};

use crate::builder::QueryBuilder;
use crate::engine::Engine;
use crate::error::{OrmError, Result};
use crate::pool::{QueryKind, QueryOutput, Row};
use crate::registry;

/// An entity struct bound to a table schema.
///
/// Implemented by `#[derive(Model)]`; the provided methods are the public
/// surface.
pub trait Model: Sized {
    /// The schema marker type generated alongside the entity.
    type Table: Table;

    /// Current values, one entry per column in declaration order. `None`
    /// marks an unset optional field.
    fn field_values(&self) -> Vec<(&'static str, Option<SqlValue>)>;

    /// The primary key value, when the schema declares one and it is set.
    fn primary_key_value(&self) -> Option<SqlValue>;

    /// Decodes one result row into an entity.
    fn from_row(row: &Row) -> Result<Self>;

    fn table_name() -> &'static str {
        Self::Table::NAME
    }

    fn columns() -> &'static [&'static str] {
        Self::Table::COLUMNS
    }

    fn fields() -> &'static [Field] {
        Self::Table::FIELDS
    }

    fn primary_key() -> Option<&'static str> {
        Self::Table::PRIMARY_KEY
    }

    /// Starts a fresh query against this table. Each call returns an
    /// independent builder; in-flight queries never share state.
    #[must_use]
    fn query() -> QueryBuilder<Self> {
        registry::ensure_registered::<Self::Table>();
        QueryBuilder::new()
    }
}

/// Write operations on entity instances.
#[allow(async_fn_in_trait)]
pub trait ModelOps: Model {
    /// Inserts this entity, returning whether a row landed and the generated
    /// key when the backend reports one.
    ///
    /// Unset timestamp-managed columns get the current time; unset columns
    /// with a literal default get that value; other unset columns are
    /// omitted so database-side defaults apply.
    async fn insert(&self, engine: &Engine) -> Result<(bool, Option<u64>)> {
        registry::ensure_registered::<Self::Table>();
        let resolved =
            resolve_insert_values(Self::fields(), self.field_values(), Utc::now().naive_utc());
        if resolved.is_empty() {
            return Err(OrmError::Usage(String::from("nothing to insert")));
        }
        let (sql, params) = insert_statement(engine, Self::table_name(), &[resolved]);
        match engine.run(&sql, &params[0], QueryKind::Create).await? {
            QueryOutput::Created { ok, last_insert_id } => Ok((ok, last_insert_id)),
            other => Err(OrmError::Decode(format!("unexpected output {other:?}"))),
        }
    }

    /// Inserts many entities with one prepared statement, returning the total
    /// inserted and the last generated key.
    ///
    /// The column set comes from the first entity; columns unset on later
    /// entities are inserted as NULL. Postgres rejects this before any
    /// statement is sent.
    async fn insert_batch(engine: &Engine, items: &[Self]) -> Result<(u64, Option<u64>)> {
        registry::ensure_registered::<Self::Table>();
        if items.is_empty() {
            return Err(OrmError::Usage(String::from("insert_batch of nothing")));
        }
        let now = Utc::now().naive_utc();
        let first = resolve_insert_values(Self::fields(), items[0].field_values(), now);
        if first.is_empty() {
            return Err(OrmError::Usage(String::from("nothing to insert")));
        }
        let columns: Vec<&'static str> = first.iter().map(|(c, _)| *c).collect();
        let mut sets: Vec<Vec<SqlValue>> = Vec::with_capacity(items.len());
        for item in items {
            let resolved = resolve_insert_values(Self::fields(), item.field_values(), now);
            sets.push(
                columns
                    .iter()
                    .map(|col| {
                        resolved
                            .iter()
                            .find(|(c, _)| c == col)
                            .map_or(SqlValue::Null, |(_, v)| v.clone())
                    })
                    .collect(),
            );
        }
        let dialect = engine.dialect();
        let cols: Vec<String> = columns
            .iter()
            .map(|c| dialect.quote_identifier(c))
            .collect();
        let placeholders = vec![SqlValue::placeholder(); columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            dialect.quote_identifier(Self::table_name()),
            cols.join(", "),
        );
        match engine
            .run_batch(&sql, &sets, QueryKind::CreateBatch)
            .await?
        {
            QueryOutput::CreatedBatch {
                rows,
                last_insert_id,
            } => Ok((rows, last_insert_id)),
            other => Err(OrmError::Decode(format!("unexpected output {other:?}"))),
        }
    }

    /// Updates many entities by primary key with one prepared statement,
    /// returning the total touched rows. Postgres rejects this before any
    /// statement is sent.
    ///
    /// The assignment column set comes from the first entity; columns unset
    /// on later entities are written as NULL.
    async fn update_batch(engine: &Engine, items: &[Self]) -> Result<u64> {
        registry::ensure_registered::<Self::Table>();
        let pk_column = Self::primary_key()
            .ok_or_else(|| OrmError::Usage(String::from("need where or primary key")))?;
        if items.is_empty() {
            return Err(OrmError::Usage(String::from("update_batch of nothing")));
        }
        let columns: Vec<&'static str> = items[0]
            .field_values()
            .into_iter()
            .filter(|(column, value)| *column != pk_column && value.is_some())
            .map(|(column, _)| column)
            .collect();
        if columns.is_empty() {
            return Err(OrmError::Usage(String::from("nothing to update")));
        }
        let mut sets: Vec<Vec<SqlValue>> = Vec::with_capacity(items.len());
        for item in items {
            let pk_value = item
                .primary_key_value()
                .ok_or_else(|| OrmError::Usage(String::from("need where or primary key")))?;
            let values = item.field_values();
            let mut params: Vec<SqlValue> = columns
                .iter()
                .map(|col| {
                    values
                        .iter()
                        .find(|(c, _)| c == col)
                        .and_then(|(_, v)| v.clone())
                        .unwrap_or(SqlValue::Null)
                })
                .collect();
            params.push(pk_value);
            sets.push(params);
        }
        let dialect = engine.dialect();
        let set_clause: Vec<String> = columns
            .iter()
            .map(|c| format!("{} = ?", dialect.quote_identifier(c)))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            dialect.quote_identifier(Self::table_name()),
            set_clause.join(", "),
            dialect.quote_identifier(pk_column),
        );
        match engine
            .run_batch(&sql, &sets, QueryKind::UpdateBatch)
            .await?
        {
            QueryOutput::AffectedCount(n) => Ok(n),
            other => Err(OrmError::Decode(format!("unexpected output {other:?}"))),
        }
    }

    /// Updates this entity by primary key, returning whether a row changed.
    async fn update(&self, engine: &Engine) -> Result<bool> {
        registry::ensure_registered::<Self::Table>();
        let pk_column = Self::primary_key()
            .ok_or_else(|| OrmError::Usage(String::from("need where or primary key")))?;
        let pk_value = self
            .primary_key_value()
            .ok_or_else(|| OrmError::Usage(String::from("need where or primary key")))?;
        let now = Utc::now().naive_utc();
        let mut assignments: Vec<(&'static str, SqlValue)> = Vec::new();
        for (column, value) in self.field_values() {
            if column == pk_column {
                continue;
            }
            let field = Self::fields().iter().find(|f| f.name == column);
            match value {
                Some(value) => assignments.push((column, value)),
                None => {
                    if field.is_some_and(|f| f.updated_timestamp) {
                        assignments.push((column, SqlValue::DateTime(now)));
                    }
                }
            }
        }
        if assignments.is_empty() {
            return Err(OrmError::Usage(String::from("nothing to update")));
        }
        let dialect = engine.dialect();
        let set_clause: Vec<String> = assignments
            .iter()
            .map(|(c, _)| format!("{} = ?", dialect.quote_identifier(c)))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            dialect.quote_identifier(Self::table_name()),
            set_clause.join(", "),
            dialect.quote_identifier(pk_column),
        );
        let mut params: Vec<SqlValue> = assignments.into_iter().map(|(_, v)| v).collect();
        params.push(pk_value);
        match engine.run(&sql, &params, QueryKind::Update).await? {
            QueryOutput::Affected(changed) => Ok(changed),
            other => Err(OrmError::Decode(format!("unexpected output {other:?}"))),
        }
    }

    /// Deletes this entity by primary key, returning whether a row went away.
    async fn delete(&self, engine: &Engine) -> Result<bool> {
        registry::ensure_registered::<Self::Table>();
        let pk_column = Self::primary_key()
            .ok_or_else(|| OrmError::Usage(String::from("need where or primary key")))?;
        let pk_value = self
            .primary_key_value()
            .ok_or_else(|| OrmError::Usage(String::from("need where or primary key")))?;
        let dialect = engine.dialect();
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            dialect.quote_identifier(Self::table_name()),
            dialect.quote_identifier(pk_column),
        );
        match engine.run(&sql, &[pk_value], QueryKind::Delete).await? {
            QueryOutput::Affected(gone) => Ok(gone),
            other => Err(OrmError::Decode(format!("unexpected output {other:?}"))),
        }
    }
}

impl<M: Model> ModelOps for M {}

fn insert_statement(
    engine: &Engine,
    table: &str,
    rows: &[Vec<(&'static str, SqlValue)>],
) -> (String, Vec<Vec<SqlValue>>) {
    let dialect = engine.dialect();
    let columns: Vec<String> = rows[0]
        .iter()
        .map(|(c, _)| dialect.quote_identifier(c))
        .collect();
    let placeholders = vec![SqlValue::placeholder(); columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        dialect.quote_identifier(table),
        columns.join(", "),
    );
    let params = rows
        .iter()
        .map(|row| row.iter().map(|(_, v)| v.clone()).collect())
        .collect();
    (sql, params)
}

/// Applies insert-time value resolution: explicit values win, unset
/// timestamp-managed columns get `now`, unset columns with a parseable
/// declared default get it, generated keys and other unset columns are
/// omitted.
pub(crate) fn resolve_insert_values(
    fields: &[Field],
    values: Vec<(&'static str, Option<SqlValue>)>,
    now: NaiveDateTime,
) -> Vec<(&'static str, SqlValue)> {
    let mut resolved = Vec::with_capacity(values.len());
    for (column, value) in values {
        let field = fields.iter().find(|f| f.name == column);
        match value {
            Some(value) => resolved.push((column, value)),
            None => {
                let Some(field) = field else { continue };
                if field.auto_increment {
                    continue;
                }
                if field.created_timestamp || field.updated_timestamp {
                    resolved.push((column, SqlValue::DateTime(now)));
                } else if let Some(default) = field.default_value() {
                    resolved.push((column, default));
                }
            }
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use strato_sql_core::SqlType;

    fn fields() -> Vec<Field> {
        let mut id = Field::new("notes", "id", SqlType::BigInt);
        id.primary_key = true;
        id.auto_increment = true;
        let mut body = Field::new("notes", "body", SqlType::Char);
        body.default = Some("untitled");
        let mut stars = Field::new("notes", "stars", SqlType::Int);
        stars.default = Some("0");
        let mut created = Field::new("notes", "created_at", SqlType::DateTime);
        created.created_timestamp = true;
        vec![id, body, stars, created]
    }

    #[test]
    fn explicit_values_pass_through() {
        let now = NaiveDateTime::default();
        let resolved = resolve_insert_values(
            &fields(),
            vec![
                ("id", None),
                ("body", Some(SqlValue::Text(String::from("hi")))),
                ("stars", Some(SqlValue::Int(5))),
                ("created_at", None),
            ],
            now,
        );
        assert_eq!(
            resolved,
            vec![
                ("body", SqlValue::Text(String::from("hi"))),
                ("stars", SqlValue::Int(5)),
                ("created_at", SqlValue::DateTime(now)),
            ]
        );
    }

    #[test]
    fn unset_columns_fall_back_to_declared_defaults() {
        let now = NaiveDateTime::default();
        let resolved = resolve_insert_values(
            &fields(),
            vec![
                ("id", None),
                ("body", None),
                ("stars", None),
                ("created_at", None),
            ],
            now,
        );
        assert_eq!(
            resolved,
            vec![
                ("body", SqlValue::Text(String::from("untitled"))),
                ("stars", SqlValue::Int(0)),
                ("created_at", SqlValue::DateTime(now)),
            ]
        );
    }

    #[test]
    fn generated_keys_are_omitted() {
        let resolved = resolve_insert_values(
            &fields(),
            vec![("id", Some(SqlValue::Int(3))), ("body", None)],
            NaiveDateTime::default(),
        );
        // An explicitly set key is still honored.
        assert_eq!(resolved[0], ("id", SqlValue::Int(3)));
    }
}
