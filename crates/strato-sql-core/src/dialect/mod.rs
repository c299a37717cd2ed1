//! SQL dialect support.
//!
//! The builder compiles one expression tree; everything backend-specific is
//! funneled through the [`Dialect`] trait so MySQL-family and
//! Postgres-family output never diverge structurally.

mod mysql;
mod postgres;

pub use mysql::MySqlDialect;
pub use postgres::{numbered_placeholders, translate, PostgresDialect};

/// Trait for dialect-specific SQL rendering.
pub trait Dialect {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Returns the identifier quote character.
    fn identifier_quote(&self) -> char {
        '"'
    }

    /// Quotes an identifier.
    fn quote_identifier(&self, name: &str) -> String {
        let quote = self.identifier_quote();
        format!("{quote}{name}{quote}")
    }

    /// Renders a table-qualified column reference.
    fn qualify(&self, table: &str, column: &str) -> String {
        format!("{}.{column}", self.quote_identifier(table))
    }

    /// Expression yielding the current date.
    fn current_date(&self) -> &'static str;

    /// Expression yielding the current timestamp.
    fn current_timestamp(&self) -> &'static str;

    /// Renders an interval literal, `unit` being an uppercase singular unit
    /// such as `DAY`.
    fn interval(&self, n: i64, unit: &str) -> String;

    /// Pattern-match operator; `case_insensitive` requests ILIKE semantics.
    fn like_operator(&self, case_insensitive: bool) -> &'static str {
        let _ = case_insensitive;
        "LIKE"
    }

    /// Renders string aggregation over a rendered column.
    fn group_concat(&self, col: &str) -> String;

    /// Renders date formatting over a rendered column, with one placeholder
    /// for the format string.
    fn date_format(&self, col: &str) -> String;

    /// Renders JSON containment of a single-pair object, with one
    /// placeholder for the value. `key` is already rendered.
    fn json_contains_object(&self, col: &str, key: &str) -> String;

    /// Renders JSON containment of an array; `placeholders` is the rendered
    /// comma-separated placeholder list.
    fn json_contains_array(&self, col: &str, placeholders: &str) -> String;

    /// Whether multi-row statements may be driven through `execute_batch`.
    fn supports_batch(&self) -> bool {
        true
    }
}
