//! Postgres-family dialect, plus textual helpers for raw MySQL-flavored SQL.

use std::sync::LazyLock;

use regex::Regex;

use super::Dialect;

/// PostgreSQL and compatible servers (Aurora Postgres).
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new Postgres dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn current_date(&self) -> &'static str {
        "CURRENT_DATE"
    }

    fn current_timestamp(&self) -> &'static str {
        "CURRENT_TIMESTAMP"
    }

    fn interval(&self, n: i64, unit: &str) -> String {
        format!("INTERVAL '{n} {}'", unit.to_ascii_lowercase())
    }

    fn like_operator(&self, case_insensitive: bool) -> &'static str {
        if case_insensitive {
            "ILIKE"
        } else {
            "LIKE"
        }
    }

    fn group_concat(&self, col: &str) -> String {
        format!("STRING_AGG({col}, ',')")
    }

    fn date_format(&self, col: &str) -> String {
        format!("TO_CHAR({col}, ?)")
    }

    fn json_contains_object(&self, col: &str, key: &str) -> String {
        format!("{col} @> jsonb_build_object({key}, ?)")
    }

    fn json_contains_array(&self, col: &str, placeholders: &str) -> String {
        format!("{col} @> jsonb_build_array({placeholders})")
    }

    fn supports_batch(&self) -> bool {
        false
    }
}

static INTERVAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bINTERVAL\s+(\d+)\s+(YEAR|MONTH|WEEK|DAY|HOUR|MINUTE|SECOND)\b")
        .unwrap_or_else(|e| panic!("interval pattern: {e}"))
});

/// Rewrites raw MySQL-flavored SQL into Postgres syntax.
///
/// Covers identifier quoting, the clock functions, and bare interval
/// literals. Applying it to already-translated text is a no-op, so callers
/// may run it unconditionally on the raw path.
#[must_use]
pub fn translate(sql: &str) -> String {
    let sql = sql.replace('`', "\"");
    let sql = sql.replace("CURDATE()", "CURRENT_DATE");
    let sql = sql.replace("NOW()", "CURRENT_TIMESTAMP");
    INTERVAL_RE
        .replace_all(&sql, |caps: &regex::Captures<'_>| {
            format!("INTERVAL '{} {}'", &caps[1], caps[2].to_ascii_lowercase())
        })
        .into_owned()
}

/// Rewrites `?` placeholders to `$1..$n`, skipping quoted string spans.
#[must_use]
pub fn numbered_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut in_string = false;
    let mut n = 0usize;
    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_string = !in_string;
                out.push(ch);
            }
            '?' if !in_string => {
                n += 1;
                out.push('$');
                out.push_str(&n.to_string());
            }
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_tokens() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.qualify("users", "id"), "\"users\".id");
        assert_eq!(dialect.interval(3, "DAY"), "INTERVAL '3 day'");
        assert_eq!(dialect.like_operator(true), "ILIKE");
        assert!(!dialect.supports_batch());
    }

    #[test]
    fn translate_rewrites_mysql_tokens() {
        let sql = "SELECT `users`.name FROM `users` WHERE created_at >= NOW() - INTERVAL 3 DAY AND birthday >= CURDATE()";
        assert_eq!(
            translate(sql),
            "SELECT \"users\".name FROM \"users\" WHERE created_at >= CURRENT_TIMESTAMP - INTERVAL '3 day' AND birthday >= CURRENT_DATE"
        );
    }

    #[test]
    fn translate_is_idempotent() {
        let sql = "SELECT * FROM `t` WHERE a >= NOW() - INTERVAL 12 HOUR";
        let once = translate(sql);
        assert_eq!(translate(&once), once);
    }

    #[test]
    fn placeholders_are_numbered_left_to_right() {
        assert_eq!(
            numbered_placeholders("SELECT * FROM t WHERE a = ? AND b IN (?, ?)"),
            "SELECT * FROM t WHERE a = $1 AND b IN ($2, $3)"
        );
    }

    #[test]
    fn placeholders_skip_quoted_spans() {
        assert_eq!(
            numbered_placeholders("SELECT '?' , a FROM t WHERE b = ?"),
            "SELECT '?' , a FROM t WHERE b = $1"
        );
    }
}
