//! Function and aggregate calls.
//!
//! Every supported function is a [`FuncKind`] variant, so an unsupported
//! construct is unrepresentable rather than silently passed through as raw
//! text. Dialect-sensitive rendering goes through the [`Dialect`] hooks.

use crate::dialect::Dialect;
use crate::expr::{BinaryOp, Expr, IntoOperand, OrderDirection};
use crate::field::Field;
use crate::value::SqlValue;

/// Standard aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggKind {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

/// Date-relative predicates on a date/datetime column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRel {
    /// Value falls on the current date.
    IsToday,
    /// Value is older than `n` days.
    BeforeDays(i64),
    /// Value is within the last `n` days.
    LastedDays(i64),
    /// Value is within the last `n` hours.
    LastedHours(i64),
    /// Value is within the last `n` minutes.
    LastedMinutes(i64),
}

/// Key operand for JSON object containment.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonKey {
    /// Key taken from another column.
    Column(Field),
    /// Literal key name.
    Name(String),
}

impl From<Field> for JsonKey {
    fn from(field: Field) -> Self {
        JsonKey::Column(field)
    }
}

impl From<&str> for JsonKey {
    fn from(name: &str) -> Self {
        JsonKey::Name(String::from(name))
    }
}

impl From<String> for JsonKey {
    fn from(name: String) -> Self {
        JsonKey::Name(name)
    }
}

/// The shape of a function application.
#[derive(Debug, Clone, PartialEq)]
pub enum FuncKind {
    /// `AGG(col)`.
    Agg(AggKind),
    /// `AGG(CASE WHEN cond THEN then [ELSE else] END)`.
    AggWhen {
        agg: AggKind,
        cond: Box<Expr>,
        then: Box<Expr>,
        else_: Option<Box<Expr>>,
    },
    /// `DISTINCT col`.
    Distinct,
    /// `GROUP_CONCAT(col)` / `STRING_AGG(col, ',')`.
    GroupConcat,
    /// `DATE_FORMAT(col, ?)` / `TO_CHAR(col, ?)` with the format bound.
    DateFormat(String),
    /// JSON containment of a single-pair object, value bound.
    JsonContainsObject { key: JsonKey, value: SqlValue },
    /// JSON containment of an array of bound values.
    JsonContainsArray(Vec<SqlValue>),
    /// Date-relative predicate.
    DateRel(DateRel),
}

/// A function applied to one column.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncCall {
    pub field: Field,
    pub kind: FuncKind,
}

impl FuncCall {
    /// `call AS alias`.
    pub fn alias(self, alias: impl Into<String>) -> Expr {
        Expr::from(self).alias(alias)
    }

    /// Ascending sort on the call result.
    #[must_use]
    pub fn asc(self) -> Expr {
        Expr::Sort {
            expr: Box::new(Expr::from(self)),
            direction: OrderDirection::Asc,
        }
    }

    /// Descending sort on the call result.
    #[must_use]
    pub fn desc(self) -> Expr {
        Expr::Sort {
            expr: Box::new(Expr::from(self)),
            direction: OrderDirection::Desc,
        }
    }

    /// `(self AND other)` for predicate calls.
    #[must_use]
    pub fn and(self, other: Expr) -> Expr {
        Expr::from(self).and(other)
    }

    /// `(self OR other)` for predicate calls.
    #[must_use]
    pub fn or(self, other: Expr) -> Expr {
        Expr::from(self).or(other)
    }

    fn binary(self, op: BinaryOp, rhs: impl IntoOperand) -> Expr {
        Expr::Binary {
            left: Box::new(Expr::from(self)),
            op,
            right: Box::new(rhs.into_operand()),
        }
    }

    /// `(call = rhs)`; with the rest of the comparisons, mainly for HAVING.
    pub fn eq(self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Eq, rhs)
    }

    /// `(call != rhs)`.
    pub fn ne(self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Ne, rhs)
    }

    /// `(call < rhs)`.
    pub fn lt(self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Lt, rhs)
    }

    /// `(call <= rhs)`.
    pub fn le(self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Le, rhs)
    }

    /// `(call > rhs)`.
    pub fn gt(self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Gt, rhs)
    }

    /// `(call >= rhs)`.
    pub fn ge(self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Ge, rhs)
    }

    /// Appends the rendered call to `sql`, pushing bound parameters in
    /// placeholder order.
    pub fn compile_into(
        &self,
        dialect: &dyn Dialect,
        sql: &mut String,
        params: &mut Vec<SqlValue>,
    ) {
        let col = self.field.full_name(dialect);
        match &self.kind {
            FuncKind::Agg(agg) => {
                sql.push_str(agg.as_str());
                sql.push('(');
                sql.push_str(&col);
                sql.push(')');
            }
            FuncKind::AggWhen {
                agg,
                cond,
                then,
                else_,
            } => {
                sql.push_str(agg.as_str());
                sql.push_str("(CASE WHEN ");
                cond.compile_into(dialect, sql, params);
                sql.push_str(" THEN ");
                then.compile_into(dialect, sql, params);
                if let Some(else_) = else_ {
                    sql.push_str(" ELSE ");
                    else_.compile_into(dialect, sql, params);
                }
                sql.push_str(" END)");
            }
            FuncKind::Distinct => {
                sql.push_str("DISTINCT ");
                sql.push_str(&col);
            }
            FuncKind::GroupConcat => sql.push_str(&dialect.group_concat(&col)),
            FuncKind::DateFormat(format) => {
                sql.push_str(&dialect.date_format(&col));
                params.push(SqlValue::Text(format.clone()));
            }
            FuncKind::JsonContainsObject { key, value } => {
                let key_sql = match key {
                    JsonKey::Column(field) => field.full_name(dialect),
                    JsonKey::Name(name) => format!("'{name}'"),
                };
                sql.push_str(&dialect.json_contains_object(&col, &key_sql));
                params.push(value.clone());
            }
            FuncKind::JsonContainsArray(values) => {
                let placeholders = vec![SqlValue::placeholder(); values.len()].join(", ");
                sql.push_str(&dialect.json_contains_array(&col, &placeholders));
                params.extend(values.iter().cloned());
            }
            FuncKind::DateRel(rel) => {
                sql.push('(');
                sql.push_str(&col);
                match rel {
                    DateRel::IsToday => {
                        sql.push_str(" >= ");
                        sql.push_str(dialect.current_date());
                    }
                    DateRel::BeforeDays(n) => {
                        sql.push_str(" < ");
                        sql.push_str(dialect.current_date());
                        sql.push_str(" - ");
                        sql.push_str(&dialect.interval(*n, "DAY"));
                    }
                    DateRel::LastedDays(n) => {
                        sql.push_str(" >= ");
                        sql.push_str(dialect.current_timestamp());
                        sql.push_str(" - ");
                        sql.push_str(&dialect.interval(*n, "DAY"));
                    }
                    DateRel::LastedHours(n) => {
                        sql.push_str(" >= ");
                        sql.push_str(dialect.current_timestamp());
                        sql.push_str(" - ");
                        sql.push_str(&dialect.interval(*n, "HOUR"));
                    }
                    DateRel::LastedMinutes(n) => {
                        sql.push_str(" >= ");
                        sql.push_str(dialect.current_timestamp());
                        sql.push_str(" - ");
                        sql.push_str(&dialect.interval(*n, "MINUTE"));
                    }
                }
                sql.push(')');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySqlDialect, PostgresDialect};
    use crate::field::SqlType;

    const ID: Field = Field::new("orders", "id", SqlType::BigInt);
    const TOTAL: Field = Field::new("orders", "total", SqlType::Decimal);
    const STATE: Field = Field::new("orders", "state", SqlType::Char);
    const CREATED: Field = Field::new("orders", "created_at", SqlType::DateTime);
    const TAGS: Field = Field::new("orders", "tags", SqlType::Json);

    #[test]
    fn plain_aggregate() {
        let (sql, params) = Expr::from(ID.count()).compile(&MySqlDialect);
        assert_eq!(sql, "COUNT(`orders`.id)");
        assert!(params.is_empty());
    }

    #[test]
    fn count_when_binds_then_one() {
        let expr = Expr::from(ID.count_when(STATE.eq("paid"))).alias("paid_count");
        let (sql, params) = expr.compile(&MySqlDialect);
        assert_eq!(
            sql,
            "COUNT(CASE WHEN (`orders`.state = ?) THEN ? END) AS paid_count"
        );
        assert_eq!(
            params,
            vec![SqlValue::Text(String::from("paid")), SqlValue::Int(1)]
        );
    }

    #[test]
    fn sum_when_includes_else() {
        let expr = Expr::from(TOTAL.sum_when(STATE.eq("paid"), TOTAL, 0));
        let (sql, params) = expr.compile(&MySqlDialect);
        assert_eq!(
            sql,
            "SUM(CASE WHEN (`orders`.state = ?) THEN `orders`.total ELSE ? END)"
        );
        assert_eq!(
            params,
            vec![SqlValue::Text(String::from("paid")), SqlValue::Int(0)]
        );
    }

    #[test]
    fn group_concat_per_dialect() {
        let (mysql, _) = Expr::from(STATE.group_concat()).compile(&MySqlDialect);
        assert_eq!(mysql, "GROUP_CONCAT(`orders`.state)");
        let (pg, _) = Expr::from(STATE.group_concat()).compile(&PostgresDialect);
        assert_eq!(pg, "STRING_AGG(\"orders\".state, ',')");
    }

    #[test]
    fn date_format_binds_format_string() {
        let (sql, params) = Expr::from(CREATED.date_format("%Y-%m")).compile(&MySqlDialect);
        assert_eq!(sql, "DATE_FORMAT(`orders`.created_at, ?)");
        assert_eq!(params, vec![SqlValue::Text(String::from("%Y-%m"))]);
        let (pg, _) = Expr::from(CREATED.date_format("YYYY-MM")).compile(&PostgresDialect);
        assert_eq!(pg, "TO_CHAR(\"orders\".created_at, ?)");
    }

    #[test]
    fn json_contains_object_binds_value() {
        let expr = Expr::from(TAGS.json_contains_object("kind", "rush"));
        let (sql, params) = expr.compile(&MySqlDialect);
        assert_eq!(sql, "JSON_CONTAINS(`orders`.tags, JSON_OBJECT('kind', ?))");
        assert_eq!(params, vec![SqlValue::Text(String::from("rush"))]);
        let (pg, _) = expr.compile(&PostgresDialect);
        assert_eq!(pg, "\"orders\".tags @> jsonb_build_object('kind', ?)");
    }

    #[test]
    fn json_contains_array_binds_each_value() {
        let expr = Expr::from(TAGS.json_contains_array(["a", "b"]));
        let (sql, params) = expr.compile(&MySqlDialect);
        assert_eq!(sql, "JSON_CONTAINS(`orders`.tags, JSON_ARRAY(?, ?))");
        assert_eq!(
            params,
            vec![
                SqlValue::Text(String::from("a")),
                SqlValue::Text(String::from("b"))
            ]
        );
    }

    #[test]
    fn date_relative_predicates() {
        let (sql, _) = Expr::from(CREATED.is_today()).compile(&MySqlDialect);
        assert_eq!(sql, "(`orders`.created_at >= CURDATE())");

        let (sql, _) = Expr::from(CREATED.before_days(3)).compile(&MySqlDialect);
        assert_eq!(sql, "(`orders`.created_at < CURDATE() - INTERVAL 3 DAY)");

        let (sql, _) = Expr::from(CREATED.before_days(3)).compile(&PostgresDialect);
        assert_eq!(
            sql,
            "(\"orders\".created_at < CURRENT_DATE - INTERVAL '3 day')"
        );

        let (sql, _) = Expr::from(CREATED.lasted_hours(6)).compile(&MySqlDialect);
        assert_eq!(sql, "(`orders`.created_at >= NOW() - INTERVAL 6 HOUR)");

        let (sql, _) = Expr::from(CREATED.lasted_minutes(30)).compile(&PostgresDialect);
        assert_eq!(
            sql,
            "(\"orders\".created_at >= CURRENT_TIMESTAMP - INTERVAL '30 minute')"
        );
    }

    #[test]
    fn aggregate_comparison_for_having() {
        let (sql, params) = ID.count().gt(5).compile(&MySqlDialect);
        assert_eq!(sql, "(COUNT(`orders`.id) > ?)");
        assert_eq!(params, vec![SqlValue::Int(5)]);
    }
}
