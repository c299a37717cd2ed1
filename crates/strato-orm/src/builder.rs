//! Owned, per-call query builder.
//!
//! Every call to `M::query()` returns a fresh [`QueryBuilder`]; terminal
//! methods take `self` by value, so a builder can never leak clauses into a
//! later query and concurrent tasks cannot observe each other's state.

use std::marker::PhantomData;

use strato_sql_core::{Dialect, Expr, Field, MySqlDialect, SqlValue, Table, ToSqlValue};

use crate::engine::Engine;
use crate::error::{OrmError, Result};
use crate::model::Model;
use crate::pool::{QueryKind, QueryOutput, Row};

/// A single SELECT/UPDATE/DELETE under construction for table `M`.
pub struct QueryBuilder<M: Model> {
    columns: Vec<Expr>,
    joins: Vec<(&'static str, Expr)>,
    filter: Option<Expr>,
    having: Option<Expr>,
    group_by: Vec<Field>,
    order_by: Vec<Expr>,
    limit: Option<usize>,
    offset: Option<usize>,
    _marker: PhantomData<fn() -> M>,
}

fn and_fold<E: Into<Expr>>(exprs: impl IntoIterator<Item = E>) -> Option<Expr> {
    exprs.into_iter().map(Into::into).reduce(Expr::and)
}

impl<M: Model> QueryBuilder<M> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            joins: Vec::new(),
            filter: None,
            having: None,
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            _marker: PhantomData,
        }
    }

    /// Replaces the select list; defaults to every column of `M`.
    #[must_use]
    pub fn select<E: Into<Expr>>(mut self, columns: impl IntoIterator<Item = E>) -> Self {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Joins table `T`, AND-folding the given conditions into the ON clause.
    #[must_use]
    pub fn join<T: Model, E: Into<Expr>>(mut self, on: impl IntoIterator<Item = E>) -> Self {
        if let Some(cond) = and_fold(on) {
            self.joins.push((T::Table::NAME, cond));
        }
        self
    }

    /// AND-folds conditions into the WHERE clause; repeated calls stack.
    #[must_use]
    pub fn filter<E: Into<Expr>>(mut self, conditions: impl IntoIterator<Item = E>) -> Self {
        if let Some(cond) = and_fold(conditions) {
            self.filter = Some(match self.filter.take() {
                Some(existing) => existing.and(cond),
                None => cond,
            });
        }
        self
    }

    /// AND-folds conditions into the HAVING clause.
    #[must_use]
    pub fn having<E: Into<Expr>>(mut self, conditions: impl IntoIterator<Item = E>) -> Self {
        if let Some(cond) = and_fold(conditions) {
            self.having = Some(match self.having.take() {
                Some(existing) => existing.and(cond),
                None => cond,
            });
        }
        self
    }

    /// Appends GROUP BY keys.
    #[must_use]
    pub fn group_by(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.group_by.extend(fields);
        self
    }

    /// Appends ORDER BY keys; build with [`Field::asc`] / [`Field::desc`].
    #[must_use]
    pub fn order_by<E: Into<Expr>>(mut self, keys: impl IntoIterator<Item = E>) -> Self {
        self.order_by.extend(keys.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    #[must_use]
    pub fn offset(mut self, n: usize) -> Self {
        self.offset = Some(n);
        self
    }

    /// Compiles the SELECT this builder describes.
    #[must_use]
    pub fn build_select(&self, dialect: &dyn Dialect) -> (String, Vec<SqlValue>) {
        let mut sql = String::from("SELECT ");
        let mut params = Vec::new();

        if self.columns.is_empty() {
            for (i, field) in M::fields().iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push_str(&field.full_name(dialect));
            }
        } else {
            for (i, column) in self.columns.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                column.compile_into(dialect, &mut sql, &mut params);
            }
        }

        sql.push_str(" FROM ");
        sql.push_str(&dialect.quote_identifier(M::table_name()));
        self.push_tail(dialect, &mut sql, &mut params, true);
        (sql, params)
    }

    fn push_tail(
        &self,
        dialect: &dyn Dialect,
        sql: &mut String,
        params: &mut Vec<SqlValue>,
        with_result_shape: bool,
    ) {
        for (table, cond) in &self.joins {
            sql.push_str(" INNER JOIN ");
            sql.push_str(&dialect.quote_identifier(table));
            sql.push_str(" ON ");
            cond.compile_into(dialect, sql, params);
        }
        if let Some(filter) = &self.filter {
            sql.push_str(" WHERE ");
            filter.compile_into(dialect, sql, params);
        }
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            for (i, field) in self.group_by.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push_str(&field.full_name(dialect));
            }
        }
        if let Some(having) = &self.having {
            sql.push_str(" HAVING ");
            having.compile_into(dialect, sql, params);
        }
        if !with_result_shape {
            return;
        }
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            for (i, key) in self.order_by.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                key.compile_into(dialect, sql, params);
            }
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
    }

    /// Renders the SELECT in MySQL syntax without executing it.
    #[must_use]
    pub fn test(&self) -> (String, Vec<SqlValue>) {
        self.build_select(&MySqlDialect)
    }

    /// Fetches at most one entity; a limit of 1 is forced.
    pub async fn one(mut self, engine: &Engine) -> Result<Option<M>> {
        self.limit = Some(1);
        let (sql, params) = self.build_select(engine.dialect());
        match engine.run(&sql, &params, QueryKind::One).await? {
            QueryOutput::Row(Some(row)) => Ok(Some(M::from_row(&row)?)),
            QueryOutput::Row(None) => Ok(None),
            other => Err(OrmError::Decode(format!("unexpected output {other:?}"))),
        }
    }

    /// Fetches every matching entity.
    pub async fn all(self, engine: &Engine) -> Result<Vec<M>> {
        let (sql, params) = self.build_select(engine.dialect());
        match engine.run(&sql, &params, QueryKind::All).await? {
            QueryOutput::Rows(rows) => rows.iter().map(M::from_row).collect(),
            other => Err(OrmError::Decode(format!("unexpected output {other:?}"))),
        }
    }

    /// Fetches at most `n` entities; the limit is forced to `n`.
    pub async fn many(mut self, engine: &Engine, n: usize) -> Result<Vec<M>> {
        self.limit = Some(n);
        let (sql, params) = self.build_select(engine.dialect());
        match engine.run(&sql, &params, QueryKind::Many(n)).await? {
            QueryOutput::Rows(rows) => rows.iter().map(M::from_row).collect(),
            other => Err(OrmError::Decode(format!("unexpected output {other:?}"))),
        }
    }

    /// Fetches at most one keyed row; use for projections and joins whose
    /// shape is not `M`.
    pub async fn row(mut self, engine: &Engine) -> Result<Option<Row>> {
        self.limit = Some(1);
        let (sql, params) = self.build_select(engine.dialect());
        match engine.run(&sql, &params, QueryKind::One).await? {
            QueryOutput::Row(row) => Ok(row),
            other => Err(OrmError::Decode(format!("unexpected output {other:?}"))),
        }
    }

    /// Fetches every matching keyed row.
    pub async fn rows(self, engine: &Engine) -> Result<Vec<Row>> {
        let (sql, params) = self.build_select(engine.dialect());
        match engine.run(&sql, &params, QueryKind::All).await? {
            QueryOutput::Rows(rows) => Ok(rows),
            other => Err(OrmError::Decode(format!("unexpected output {other:?}"))),
        }
    }

    /// Counts matching rows.
    ///
    /// With GROUP BY, this counts the returned grouped rows, which a LIMIT
    /// clause truncates like any other grouped result.
    pub async fn count(self, engine: &Engine) -> Result<usize> {
        let dialect = engine.dialect();
        if self.group_by.is_empty() {
            let mut sql = String::from("SELECT COUNT(*) FROM ");
            sql.push_str(&dialect.quote_identifier(M::table_name()));
            let mut params = Vec::new();
            self.push_tail(dialect, &mut sql, &mut params, false);
            match engine.run(&sql, &params, QueryKind::Count).await? {
                QueryOutput::Scalar(n) => Ok(usize::try_from(n).unwrap_or(0)),
                other => Err(OrmError::Decode(format!("unexpected output {other:?}"))),
            }
        } else {
            let (sql, params) = self.build_select(dialect);
            match engine.run(&sql, &params, QueryKind::GroupCount).await? {
                QueryOutput::GroupCount(n) => Ok(n),
                other => Err(OrmError::Decode(format!("unexpected output {other:?}"))),
            }
        }
    }

    /// Whether any row matches the filter.
    pub async fn exists(self, engine: &Engine) -> Result<bool> {
        let dialect = engine.dialect();
        let mut sql = String::from("SELECT 1 FROM ");
        sql.push_str(&dialect.quote_identifier(M::table_name()));
        let mut params = Vec::new();
        self.push_tail(dialect, &mut sql, &mut params, false);
        sql.push_str(" LIMIT 1");
        match engine.run(&sql, &params, QueryKind::One).await? {
            QueryOutput::Row(row) => Ok(row.is_some()),
            other => Err(OrmError::Decode(format!("unexpected output {other:?}"))),
        }
    }

    /// Updates matching rows with the given assignments, returning whether
    /// any row changed. Refuses to run without a WHERE clause.
    pub async fn update<V: ToSqlValue>(
        self,
        engine: &Engine,
        values: impl IntoIterator<Item = (Field, V)>,
    ) -> Result<bool> {
        let filter = self
            .filter
            .as_ref()
            .ok_or_else(|| OrmError::Usage(String::from("need where or primary key")))?;
        let dialect = engine.dialect();
        let mut params = Vec::new();
        let mut set_clause = String::new();
        for (i, (field, value)) in values.into_iter().enumerate() {
            if i > 0 {
                set_clause.push_str(", ");
            }
            set_clause.push_str(&dialect.quote_identifier(field.name));
            set_clause.push_str(" = ?");
            params.push(value.to_sql_value());
        }
        if set_clause.is_empty() {
            return Err(OrmError::Usage(String::from("nothing to update")));
        }
        let mut sql = format!(
            "UPDATE {} SET {set_clause} WHERE ",
            dialect.quote_identifier(M::table_name()),
        );
        filter.compile_into(dialect, &mut sql, &mut params);
        match engine.run(&sql, &params, QueryKind::Update).await? {
            QueryOutput::Affected(changed) => Ok(changed),
            other => Err(OrmError::Decode(format!("unexpected output {other:?}"))),
        }
    }

    /// Deletes matching rows, returning whether any row went away. Refuses
    /// to run without a WHERE clause.
    pub async fn delete(self, engine: &Engine) -> Result<bool> {
        let filter = self
            .filter
            .as_ref()
            .ok_or_else(|| OrmError::Usage(String::from("need where or primary key")))?;
        let dialect = engine.dialect();
        let mut sql = format!(
            "DELETE FROM {} WHERE ",
            dialect.quote_identifier(M::table_name()),
        );
        let mut params = Vec::new();
        filter.compile_into(dialect, &mut sql, &mut params);
        match engine.run(&sql, &params, QueryKind::Delete).await? {
            QueryOutput::Affected(gone) => Ok(gone),
            other => Err(OrmError::Decode(format!("unexpected output {other:?}"))),
        }
    }
}

impl<M: Model> Default for QueryBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}

// Manual impls: the entity type is only a phantom, so no `M` bounds apply.
impl<M: Model> Clone for QueryBuilder<M> {
    fn clone(&self) -> Self {
        Self {
            columns: self.columns.clone(),
            joins: self.joins.clone(),
            filter: self.filter.clone(),
            having: self.having.clone(),
            group_by: self.group_by.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
            _marker: PhantomData,
        }
    }
}

impl<M: Model> std::fmt::Debug for QueryBuilder<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("table", &M::table_name())
            .field("filter", &self.filter)
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strato_sql_core::{PostgresDialect, SqlType};

    use crate::engine::DriverKind;

    struct Book {
        id: Option<i64>,
        title: Option<String>,
        author_id: Option<i64>,
    }

    struct BookTable;

    const BOOK_FIELDS: &[Field] = &[
        Field::new("books", "id", SqlType::BigInt),
        Field::new("books", "title", SqlType::Char),
        Field::new("books", "author_id", SqlType::BigInt),
    ];

    impl Table for BookTable {
        const NAME: &'static str = "books";
        const COLUMNS: &'static [&'static str] = &["id", "title", "author_id"];
        const PRIMARY_KEY: Option<&'static str> = Some("id");
        const FIELDS: &'static [Field] = BOOK_FIELDS;
    }

    impl Book {
        const fn id() -> Field {
            BOOK_FIELDS[0]
        }
        const fn title() -> Field {
            BOOK_FIELDS[1]
        }
        const fn author_id() -> Field {
            BOOK_FIELDS[2]
        }
    }

    impl Model for Book {
        type Table = BookTable;

        fn field_values(&self) -> Vec<(&'static str, Option<SqlValue>)> {
            vec![
                ("id", self.id.map(SqlValue::Int)),
                ("title", self.title.clone().map(SqlValue::Text)),
                ("author_id", self.author_id.map(SqlValue::Int)),
            ]
        }

        fn primary_key_value(&self) -> Option<SqlValue> {
            self.id.map(SqlValue::Int)
        }

        fn from_row(row: &Row) -> Result<Self> {
            Ok(Self {
                id: row.try_decode("id")?,
                title: row.try_decode("title")?,
                author_id: row.try_decode("author_id")?,
            })
        }
    }

    struct Author;

    struct AuthorTable;

    const AUTHOR_FIELDS: &[Field] = &[
        Field::new("authors", "id", SqlType::BigInt),
        Field::new("authors", "name", SqlType::Char),
    ];

    impl Table for AuthorTable {
        const NAME: &'static str = "authors";
        const COLUMNS: &'static [&'static str] = &["id", "name"];
        const PRIMARY_KEY: Option<&'static str> = Some("id");
        const FIELDS: &'static [Field] = AUTHOR_FIELDS;
    }

    impl Author {
        const fn id() -> Field {
            AUTHOR_FIELDS[0]
        }
        const fn name() -> Field {
            AUTHOR_FIELDS[1]
        }
    }

    impl Model for Author {
        type Table = AuthorTable;

        fn field_values(&self) -> Vec<(&'static str, Option<SqlValue>)> {
            Vec::new()
        }

        fn primary_key_value(&self) -> Option<SqlValue> {
            None
        }

        fn from_row(_row: &Row) -> Result<Self> {
            Ok(Self)
        }
    }

    #[test]
    fn bare_query_selects_all_columns() {
        let (sql, params) = Book::query().test();
        assert_eq!(
            sql,
            "SELECT `books`.id, `books`.title, `books`.author_id FROM `books`"
        );
        assert!(params.is_empty());
    }

    #[test]
    fn filter_order_limit_offset() {
        let (sql, params) = Book::query()
            .filter([Book::author_id().eq(7), Book::title().like("rust%")])
            .order_by([Book::id().desc()])
            .limit(10)
            .offset(20)
            .test();
        assert_eq!(
            sql,
            "SELECT `books`.id, `books`.title, `books`.author_id FROM `books` \
             WHERE ((`books`.author_id = ?) AND (`books`.title LIKE ?)) \
             ORDER BY `books`.id DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(
            params,
            vec![SqlValue::Int(7), SqlValue::Text(String::from("rust%"))]
        );
    }

    #[test]
    fn repeated_filters_stack_with_and() {
        let (sql, _) = Book::query()
            .filter([Book::author_id().eq(7)])
            .filter([Book::id().gt(100)])
            .test();
        assert!(sql.contains("WHERE ((`books`.author_id = ?) AND (`books`.id > ?))"));
    }

    #[test]
    fn join_renders_on_clause_with_column_comparison() {
        let (sql, params) = Book::query()
            .select([Book::title(), Author::name()])
            .join::<Author, _>([Book::author_id().eq(Author::id())])
            .test();
        assert_eq!(
            sql,
            "SELECT `books`.title, `authors`.name FROM `books` \
             INNER JOIN `authors` ON (`books`.author_id = `authors`.id)"
        );
        assert!(params.is_empty());
    }

    #[test]
    fn group_by_and_having() {
        let (sql, params) = Book::query()
            .select([
                Expr::from(Book::author_id()),
                Book::id().count().alias("n"),
            ])
            .group_by([Book::author_id()])
            .having([Book::id().count().gt(3)])
            .test();
        assert_eq!(
            sql,
            "SELECT `books`.author_id, COUNT(`books`.id) AS n FROM `books` \
             GROUP BY `books`.author_id HAVING (COUNT(`books`.id) > ?)"
        );
        assert_eq!(params, vec![SqlValue::Int(3)]);
    }

    #[test]
    fn postgres_rendering_quotes_and_ilike() {
        let (sql, _) = Book::query()
            .filter([Book::title().ilike("rust%")])
            .build_select(&PostgresDialect);
        assert_eq!(
            sql,
            "SELECT \"books\".id, \"books\".title, \"books\".author_id FROM \"books\" \
             WHERE (\"books\".title ILIKE ?)"
        );
    }

    #[test]
    fn builders_are_independent() {
        let base = Book::query().filter([Book::author_id().eq(1)]);
        let narrowed = base.clone().filter([Book::id().gt(5)]);
        let (base_sql, _) = base.test();
        let (narrowed_sql, _) = narrowed.test();
        assert!(!base_sql.contains("`books`.id >"));
        assert!(narrowed_sql.contains("`books`.id >"));
    }

    #[tokio::test]
    async fn update_without_filter_is_rejected_before_network() {
        let engine = Engine::disconnected(DriverKind::MySql);
        let err = Book::query()
            .update(&engine, [(Book::title(), "x")])
            .await
            .expect_err("no filter");
        assert!(matches!(err, OrmError::Usage(message) if message.contains("need where")));
    }

    #[tokio::test]
    async fn delete_without_filter_is_rejected_before_network() {
        let engine = Engine::disconnected(DriverKind::MySql);
        let err = Book::query()
            .delete(&engine)
            .await
            .expect_err("no filter");
        assert!(matches!(err, OrmError::Usage(_)));
    }

    #[tokio::test]
    async fn entity_update_without_key_is_rejected() {
        use crate::model::ModelOps;
        let engine = Engine::disconnected(DriverKind::MySql);
        let book = Book {
            id: None,
            title: Some(String::from("untracked")),
            author_id: None,
        };
        let err = book.update(&engine).await.expect_err("no key");
        assert!(matches!(err, OrmError::Usage(message) if message.contains("need where")));
    }

    #[tokio::test]
    async fn empty_batch_insert_is_rejected() {
        use crate::model::ModelOps;
        let engine = Engine::disconnected(DriverKind::MySql);
        let err = Book::insert_batch(&engine, &[]).await.expect_err("empty");
        assert!(matches!(err, OrmError::Usage(_)));
    }

    #[tokio::test]
    async fn batch_insert_on_postgres_is_unsupported() {
        use crate::model::ModelOps;
        let engine = Engine::disconnected(DriverKind::Postgres);
        let books = [Book {
            id: None,
            title: Some(String::from("a")),
            author_id: Some(1),
        }];
        let err = Book::insert_batch(&engine, &books)
            .await
            .expect_err("no batch on postgres");
        assert!(matches!(err, OrmError::Unsupported(_)));
    }
}
