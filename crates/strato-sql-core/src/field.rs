//! Typed column descriptors.
//!
//! A [`Field`] is `'static` metadata about one table column. Entity instances
//! hold their values in ordinary struct fields; a `Field` never carries a live
//! value. All predicate and projection constructors hang off `Field`, so
//! application code reads like `User::age().gt(18).and(User::name().like("a%"))`.

use crate::dialect::Dialect;
use crate::expr::{BinaryOp, Expr, IntoOperand, LikeKind, OrderDirection};
use crate::func::{AggKind, DateRel, FuncCall, FuncKind, JsonKey};
use crate::value::{SqlValue, ToSqlValue};

/// SQL column type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    /// CHAR / VARCHAR.
    Char,
    /// TEXT and its long variants.
    Text,
    /// BOOLEAN (TINYINT(1) on MySQL).
    Boolean,
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    BigInt,
    /// FLOAT / DOUBLE.
    Float,
    /// DECIMAL / NUMERIC.
    Decimal,
    /// DATE.
    Date,
    /// DATETIME.
    DateTime,
    /// TIMESTAMP.
    Timestamp,
    /// JSON.
    Json,
    /// BLOB / BYTEA.
    Blob,
}

/// Column metadata attached to an entity type.
///
/// Constructed as consts by `#[derive(Model)]`; cheap to copy around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Owning table name.
    pub table: &'static str,
    /// Column name.
    pub name: &'static str,
    /// SQL type tag.
    pub sql_type: SqlType,
    /// Declared default, as the literal text from the declaration.
    pub default: Option<&'static str>,
    /// Whether this column is the primary key.
    pub primary_key: bool,
    /// NOT NULL constraint.
    pub not_null: bool,
    /// AUTO_INCREMENT / SERIAL behaviour.
    pub auto_increment: bool,
    /// Maximum length for character/numeric types.
    pub max_length: Option<u32>,
    /// Decimal scale.
    pub scale: Option<u32>,
    /// UNSIGNED flag (MySQL).
    pub unsigned: bool,
    /// Filled with the current timestamp on insert when unset.
    pub created_timestamp: bool,
    /// Filled with the current timestamp on insert/update when unset.
    pub updated_timestamp: bool,
    /// Column comment.
    pub comment: Option<&'static str>,
}

impl Field {
    /// Creates a bare field with the given identity; remaining metadata off.
    #[must_use]
    pub const fn new(table: &'static str, name: &'static str, sql_type: SqlType) -> Self {
        Self {
            table,
            name,
            sql_type,
            default: None,
            primary_key: false,
            not_null: false,
            auto_increment: false,
            max_length: None,
            scale: None,
            unsigned: false,
            created_timestamp: false,
            updated_timestamp: false,
            comment: None,
        }
    }

    /// Fully-qualified display name, rendered for the given dialect.
    #[must_use]
    pub fn full_name(&self, dialect: &dyn Dialect) -> String {
        dialect.qualify(self.table, self.name)
    }

    /// Parses the declared default into a bindable value.
    ///
    /// Non-literal defaults (`CURRENT_TIMESTAMP(3)` and friends) return
    /// `None`: the column is then omitted from INSERT so the database-side
    /// default applies.
    #[must_use]
    pub fn default_value(&self) -> Option<SqlValue> {
        let raw = self.default?;
        match self.sql_type {
            SqlType::Int | SqlType::BigInt => raw.parse::<i64>().ok().map(SqlValue::Int),
            SqlType::Float => raw.parse::<f64>().ok().map(SqlValue::Float),
            SqlType::Decimal => raw.parse().ok().map(SqlValue::Decimal),
            SqlType::Boolean => match raw {
                "true" | "TRUE" | "1" => Some(SqlValue::Bool(true)),
                "false" | "FALSE" | "0" => Some(SqlValue::Bool(false)),
                _ => None,
            },
            SqlType::Char | SqlType::Text => Some(SqlValue::Text(String::from(raw))),
            SqlType::Json => serde_json::from_str(raw).ok().map(SqlValue::Json),
            SqlType::Date | SqlType::DateTime | SqlType::Timestamp | SqlType::Blob => None,
        }
    }

    fn binary(self, op: BinaryOp, rhs: impl IntoOperand) -> Expr {
        Expr::Binary {
            left: Box::new(Expr::Column(self)),
            op,
            right: Box::new(rhs.into_operand()),
        }
    }

    /// `field = rhs`. A Field/Expr right-hand side compares column-to-column.
    pub fn eq(self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Eq, rhs)
    }

    /// `field != rhs`.
    pub fn ne(self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Ne, rhs)
    }

    /// `field < rhs`.
    pub fn lt(self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Lt, rhs)
    }

    /// `field <= rhs`.
    pub fn le(self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Le, rhs)
    }

    /// `field > rhs`.
    pub fn gt(self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Gt, rhs)
    }

    /// `field >= rhs`.
    pub fn ge(self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Ge, rhs)
    }

    /// `field + rhs`.
    pub fn add(self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Add, rhs)
    }

    /// `field - rhs`.
    pub fn sub(self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Sub, rhs)
    }

    /// `field * rhs`.
    pub fn mul(self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Mul, rhs)
    }

    /// `field / rhs`.
    pub fn div(self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Div, rhs)
    }

    /// `field IN (…)`, binding every element.
    pub fn in_list<T: ToSqlValue>(self, values: impl IntoIterator<Item = T>) -> Expr {
        Expr::In {
            expr: Box::new(Expr::Column(self)),
            values: values.into_iter().map(ToSqlValue::to_sql_value).collect(),
            negated: false,
        }
    }

    /// `field NOT IN (…)`.
    pub fn not_in<T: ToSqlValue>(self, values: impl IntoIterator<Item = T>) -> Expr {
        Expr::In {
            expr: Box::new(Expr::Column(self)),
            values: values.into_iter().map(ToSqlValue::to_sql_value).collect(),
            negated: true,
        }
    }

    /// `field LIKE ?`.
    pub fn like(self, pattern: impl Into<String>) -> Expr {
        Expr::Like {
            expr: Box::new(Expr::Column(self)),
            kind: LikeKind::Like,
            pattern: pattern.into(),
        }
    }

    /// `field NOT LIKE ?`.
    pub fn not_like(self, pattern: impl Into<String>) -> Expr {
        Expr::Like {
            expr: Box::new(Expr::Column(self)),
            kind: LikeKind::NotLike,
            pattern: pattern.into(),
        }
    }

    /// Case-insensitive LIKE. Native `ILIKE` on Postgres; MySQL already
    /// compares case-insensitively under its default collation, so it
    /// renders as plain `LIKE` there.
    pub fn ilike(self, pattern: impl Into<String>) -> Expr {
        Expr::Like {
            expr: Box::new(Expr::Column(self)),
            kind: LikeKind::ILike,
            pattern: pattern.into(),
        }
    }

    /// `field BETWEEN ? AND ?`.
    pub fn between<T: ToSqlValue>(self, low: T, high: T) -> Expr {
        Expr::Between {
            expr: Box::new(Expr::Column(self)),
            low: low.to_sql_value(),
            high: high.to_sql_value(),
            negated: false,
        }
    }

    /// `field NOT BETWEEN ? AND ?`.
    pub fn not_between<T: ToSqlValue>(self, low: T, high: T) -> Expr {
        Expr::Between {
            expr: Box::new(Expr::Column(self)),
            low: low.to_sql_value(),
            high: high.to_sql_value(),
            negated: true,
        }
    }

    /// `field IS NULL`.
    #[must_use]
    pub fn is_null(self) -> Expr {
        Expr::Null {
            expr: Box::new(Expr::Column(self)),
            negated: false,
        }
    }

    /// `field IS NOT NULL`.
    #[must_use]
    pub fn not_null(self) -> Expr {
        Expr::Null {
            expr: Box::new(Expr::Column(self)),
            negated: true,
        }
    }

    /// Ascending sort key for `order_by`.
    #[must_use]
    pub fn asc(self) -> Expr {
        Expr::Sort {
            expr: Box::new(Expr::Column(self)),
            direction: OrderDirection::Asc,
        }
    }

    /// Descending sort key for `order_by`.
    #[must_use]
    pub fn desc(self) -> Expr {
        Expr::Sort {
            expr: Box::new(Expr::Column(self)),
            direction: OrderDirection::Desc,
        }
    }

    /// `field AS alias`; the alias is inserted verbatim, never bound.
    pub fn alias(self, alias: impl Into<String>) -> Expr {
        Expr::Alias {
            expr: Box::new(Expr::Column(self)),
            alias: alias.into(),
        }
    }

    fn func(self, kind: FuncKind) -> FuncCall {
        FuncCall { field: self, kind }
    }

    /// `COUNT(field)`.
    #[must_use]
    pub fn count(self) -> FuncCall {
        self.func(FuncKind::Agg(AggKind::Count))
    }

    /// `SUM(field)`.
    #[must_use]
    pub fn sum(self) -> FuncCall {
        self.func(FuncKind::Agg(AggKind::Sum))
    }

    /// `AVG(field)`.
    #[must_use]
    pub fn avg(self) -> FuncCall {
        self.func(FuncKind::Agg(AggKind::Avg))
    }

    /// `MIN(field)`.
    #[must_use]
    pub fn min(self) -> FuncCall {
        self.func(FuncKind::Agg(AggKind::Min))
    }

    /// `MAX(field)`.
    #[must_use]
    pub fn max(self) -> FuncCall {
        self.func(FuncKind::Agg(AggKind::Max))
    }

    /// `COUNT(CASE WHEN cond THEN 1 END)` — counts rows matching `cond`.
    #[must_use]
    pub fn count_when(self, cond: Expr) -> FuncCall {
        self.func(FuncKind::AggWhen {
            agg: AggKind::Count,
            cond: Box::new(cond),
            then: Box::new(Expr::Value(SqlValue::Int(1))),
            else_: None,
        })
    }

    /// `SUM(CASE WHEN cond THEN then ELSE else END)`.
    pub fn sum_when(self, cond: Expr, then: impl IntoOperand, else_: impl IntoOperand) -> FuncCall {
        self.func(FuncKind::AggWhen {
            agg: AggKind::Sum,
            cond: Box::new(cond),
            then: Box::new(then.into_operand()),
            else_: Some(Box::new(else_.into_operand())),
        })
    }

    /// `AVG(CASE WHEN cond THEN then END)` (ELSE defaults to NULL).
    pub fn avg_when(self, cond: Expr, then: impl IntoOperand) -> FuncCall {
        self.func(FuncKind::AggWhen {
            agg: AggKind::Avg,
            cond: Box::new(cond),
            then: Box::new(then.into_operand()),
            else_: None,
        })
    }

    /// `MIN(CASE WHEN cond THEN then END)`.
    pub fn min_when(self, cond: Expr, then: impl IntoOperand) -> FuncCall {
        self.func(FuncKind::AggWhen {
            agg: AggKind::Min,
            cond: Box::new(cond),
            then: Box::new(then.into_operand()),
            else_: None,
        })
    }

    /// `MAX(CASE WHEN cond THEN then END)`.
    pub fn max_when(self, cond: Expr, then: impl IntoOperand) -> FuncCall {
        self.func(FuncKind::AggWhen {
            agg: AggKind::Max,
            cond: Box::new(cond),
            then: Box::new(then.into_operand()),
            else_: None,
        })
    }

    /// `DISTINCT field`.
    #[must_use]
    pub fn distinct(self) -> FuncCall {
        self.func(FuncKind::Distinct)
    }

    /// `GROUP_CONCAT(field)` (Postgres: `STRING_AGG(field, ',')`).
    #[must_use]
    pub fn group_concat(self) -> FuncCall {
        self.func(FuncKind::GroupConcat)
    }

    /// `DATE_FORMAT(field, ?)` (Postgres: `TO_CHAR`), binding the format.
    pub fn date_format(self, format: impl Into<String>) -> FuncCall {
        self.func(FuncKind::DateFormat(format.into()))
    }

    /// JSON containment of `{key: value}` in a JSON column.
    ///
    /// A `Field` key compares against another column; a string key is taken
    /// as an object key literal. The value is always bound.
    pub fn json_contains_object(self, key: impl Into<JsonKey>, value: impl ToSqlValue) -> FuncCall {
        self.func(FuncKind::JsonContainsObject {
            key: key.into(),
            value: value.to_sql_value(),
        })
    }

    /// JSON containment of an array of bound values in a JSON column.
    pub fn json_contains_array<T: ToSqlValue>(
        self,
        values: impl IntoIterator<Item = T>,
    ) -> FuncCall {
        self.func(FuncKind::JsonContainsArray(
            values.into_iter().map(ToSqlValue::to_sql_value).collect(),
        ))
    }

    /// `field >= CURDATE()` — the value falls on the current date.
    #[must_use]
    pub fn is_today(self) -> FuncCall {
        self.func(FuncKind::DateRel(DateRel::IsToday))
    }

    /// `field < CURDATE() - INTERVAL n DAY` — older than `n` days.
    #[must_use]
    pub fn before_days(self, n: i64) -> FuncCall {
        self.func(FuncKind::DateRel(DateRel::BeforeDays(n)))
    }

    /// `field >= NOW() - INTERVAL n DAY` — within the last `n` days.
    #[must_use]
    pub fn lasted_days(self, n: i64) -> FuncCall {
        self.func(FuncKind::DateRel(DateRel::LastedDays(n)))
    }

    /// `field >= NOW() - INTERVAL n HOUR` — within the last `n` hours.
    #[must_use]
    pub fn lasted_hours(self, n: i64) -> FuncCall {
        self.func(FuncKind::DateRel(DateRel::LastedHours(n)))
    }

    /// `field >= NOW() - INTERVAL n MINUTE` — within the last `n` minutes.
    #[must_use]
    pub fn lasted_minutes(self, n: i64) -> FuncCall {
        self.func(FuncKind::DateRel(DateRel::LastedMinutes(n)))
    }
}
