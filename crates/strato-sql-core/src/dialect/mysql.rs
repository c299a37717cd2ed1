//! MySQL-family dialect.

use super::Dialect;

/// MySQL and compatible servers (MariaDB, Aurora MySQL).
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn identifier_quote(&self) -> char {
        '`'
    }

    fn current_date(&self) -> &'static str {
        "CURDATE()"
    }

    fn current_timestamp(&self) -> &'static str {
        "NOW()"
    }

    fn interval(&self, n: i64, unit: &str) -> String {
        format!("INTERVAL {n} {unit}")
    }

    fn group_concat(&self, col: &str) -> String {
        format!("GROUP_CONCAT({col})")
    }

    fn date_format(&self, col: &str) -> String {
        format!("DATE_FORMAT({col}, ?)")
    }

    fn json_contains_object(&self, col: &str, key: &str) -> String {
        format!("JSON_CONTAINS({col}, JSON_OBJECT({key}, ?))")
    }

    fn json_contains_array(&self, col: &str, placeholders: &str) -> String {
        format!("JSON_CONTAINS({col}, JSON_ARRAY({placeholders}))")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_and_clock_tokens() {
        let dialect = MySqlDialect::new();
        assert_eq!(dialect.qualify("users", "id"), "`users`.id");
        assert_eq!(dialect.current_date(), "CURDATE()");
        assert_eq!(dialect.interval(7, "DAY"), "INTERVAL 7 DAY");
        assert_eq!(dialect.like_operator(true), "LIKE");
        assert!(dialect.supports_batch());
    }
}
