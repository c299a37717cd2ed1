//! Expression tree and SQL compilation.
//!
//! Predicates and projections build an [`Expr`] tree; [`Expr::compile`]
//! renders it for a dialect into a SQL fragment plus the bound parameters in
//! left-to-right order. Literals always become `?` placeholders; only
//! identifiers and fixed operator/function tokens are interpolated.

use crate::dialect::Dialect;
use crate::field::Field;
use crate::func::FuncCall;
use crate::value::{SqlValue, ToSqlValue};

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    /// SQL token for the operator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }
}

/// Sort direction for `ORDER BY` keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Pattern-match flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeKind {
    Like,
    NotLike,
    /// Case-insensitive; rendering is dialect-specific.
    ILike,
}

/// A SQL expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference, rendered as a qualified identifier.
    Column(Field),
    /// Literal, always rendered as a placeholder with the value bound.
    Value(SqlValue),
    /// `(left op right)`.
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    /// `expr IS [NOT] NULL`.
    Null { expr: Box<Expr>, negated: bool },
    /// `expr [NOT] IN (?, …)`.
    In {
        expr: Box<Expr>,
        values: Vec<SqlValue>,
        negated: bool,
    },
    /// `expr LIKE ?` and variants.
    Like {
        expr: Box<Expr>,
        kind: LikeKind,
        pattern: String,
    },
    /// `expr [NOT] BETWEEN ? AND ?`.
    Between {
        expr: Box<Expr>,
        low: SqlValue,
        high: SqlValue,
        negated: bool,
    },
    /// Aggregate or scalar function application.
    Func(FuncCall),
    /// `expr AS alias`.
    Alias { expr: Box<Expr>, alias: String },
    /// `expr ASC|DESC`, only meaningful inside `ORDER BY`.
    Sort {
        expr: Box<Expr>,
        direction: OrderDirection,
    },
}

impl Expr {
    /// `(self AND other)`.
    #[must_use]
    pub fn and(self, other: Expr) -> Expr {
        Expr::Binary {
            left: Box::new(self),
            op: BinaryOp::And,
            right: Box::new(other),
        }
    }

    /// `(self OR other)`.
    #[must_use]
    pub fn or(self, other: Expr) -> Expr {
        Expr::Binary {
            left: Box::new(self),
            op: BinaryOp::Or,
            right: Box::new(other),
        }
    }

    fn binary(self, op: BinaryOp, rhs: impl IntoOperand) -> Expr {
        Expr::Binary {
            left: Box::new(self),
            op,
            right: Box::new(rhs.into_operand()),
        }
    }

    /// `(self = rhs)`.
    pub fn eq(self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Eq, rhs)
    }

    /// `(self != rhs)`.
    pub fn ne(self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Ne, rhs)
    }

    /// `(self < rhs)`.
    pub fn lt(self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Lt, rhs)
    }

    /// `(self <= rhs)`.
    pub fn le(self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Le, rhs)
    }

    /// `(self > rhs)`.
    pub fn gt(self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Gt, rhs)
    }

    /// `(self >= rhs)`.
    pub fn ge(self, rhs: impl IntoOperand) -> Expr {
        self.binary(BinaryOp::Ge, rhs)
    }

    /// Renames the expression in the select list.
    pub fn alias(self, alias: impl Into<String>) -> Expr {
        Expr::Alias {
            expr: Box::new(self),
            alias: alias.into(),
        }
    }

    /// Renders the expression, returning the SQL text and bound parameters.
    #[must_use]
    pub fn compile(&self, dialect: &dyn Dialect) -> (String, Vec<SqlValue>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        self.compile_into(dialect, &mut sql, &mut params);
        (sql, params)
    }

    /// Appends the rendered expression to `sql`, pushing bound parameters in
    /// placeholder order.
    pub fn compile_into(&self, dialect: &dyn Dialect, sql: &mut String, params: &mut Vec<SqlValue>) {
        match self {
            Expr::Column(field) => sql.push_str(&field.full_name(dialect)),
            Expr::Value(value) => {
                sql.push_str(SqlValue::placeholder());
                params.push(value.clone());
            }
            Expr::Binary { left, op, right } => {
                sql.push('(');
                left.compile_into(dialect, sql, params);
                sql.push(' ');
                sql.push_str(op.as_str());
                sql.push(' ');
                right.compile_into(dialect, sql, params);
                sql.push(')');
            }
            Expr::Null { expr, negated } => {
                sql.push('(');
                expr.compile_into(dialect, sql, params);
                sql.push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
                sql.push(')');
            }
            Expr::In {
                expr,
                values,
                negated,
            } => {
                sql.push('(');
                expr.compile_into(dialect, sql, params);
                sql.push_str(if *negated { " NOT IN (" } else { " IN (" });
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    sql.push_str(SqlValue::placeholder());
                    params.push(value.clone());
                }
                sql.push_str("))");
            }
            Expr::Like {
                expr,
                kind,
                pattern,
            } => {
                sql.push('(');
                expr.compile_into(dialect, sql, params);
                sql.push(' ');
                sql.push_str(match kind {
                    LikeKind::Like => "LIKE",
                    LikeKind::NotLike => "NOT LIKE",
                    LikeKind::ILike => dialect.like_operator(true),
                });
                sql.push(' ');
                sql.push_str(SqlValue::placeholder());
                params.push(SqlValue::Text(pattern.clone()));
                sql.push(')');
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                sql.push('(');
                expr.compile_into(dialect, sql, params);
                sql.push_str(if *negated {
                    " NOT BETWEEN "
                } else {
                    " BETWEEN "
                });
                sql.push_str(SqlValue::placeholder());
                params.push(low.clone());
                sql.push_str(" AND ");
                sql.push_str(SqlValue::placeholder());
                params.push(high.clone());
                sql.push(')');
            }
            Expr::Func(call) => call.compile_into(dialect, sql, params),
            Expr::Alias { expr, alias } => {
                expr.compile_into(dialect, sql, params);
                sql.push_str(" AS ");
                sql.push_str(alias);
            }
            Expr::Sort { expr, direction } => {
                expr.compile_into(dialect, sql, params);
                sql.push(' ');
                sql.push_str(direction.as_str());
            }
        }
    }
}

impl From<Field> for Expr {
    fn from(field: Field) -> Self {
        Expr::Column(field)
    }
}

impl From<FuncCall> for Expr {
    fn from(call: FuncCall) -> Self {
        Expr::Func(call)
    }
}

/// Right-hand sides accepted by comparison and arithmetic constructors.
///
/// A [`Field`] or [`Expr`] operand is rendered structurally (column-to-column
/// comparison); everything else is bound as a placeholder.
pub trait IntoOperand {
    fn into_operand(self) -> Expr;
}

impl IntoOperand for Expr {
    fn into_operand(self) -> Expr {
        self
    }
}

impl IntoOperand for Field {
    fn into_operand(self) -> Expr {
        Expr::Column(self)
    }
}

impl IntoOperand for FuncCall {
    fn into_operand(self) -> Expr {
        Expr::Func(self)
    }
}

impl IntoOperand for SqlValue {
    fn into_operand(self) -> Expr {
        Expr::Value(self)
    }
}

macro_rules! impl_into_operand_value {
    ($($ty:ty),* $(,)?) => {
        $(impl IntoOperand for $ty {
            fn into_operand(self) -> Expr {
                Expr::Value(self.to_sql_value())
            }
        })*
    };
}

impl_into_operand_value!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    f32,
    f64,
    rust_decimal::Decimal,
    String,
    &str,
    chrono::NaiveDate,
    chrono::NaiveDateTime,
    serde_json::Value,
);

impl<T> IntoOperand for Option<T>
where
    T: IntoOperand + ToSqlValue,
{
    fn into_operand(self) -> Expr {
        match self {
            Some(v) => v.into_operand(),
            None => Expr::Value(SqlValue::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::MySqlDialect;
    use crate::field::SqlType;

    const AGE: Field = Field::new("users", "age", SqlType::Int);
    const NAME: Field = Field::new("users", "name", SqlType::Char);
    const MANAGER: Field = Field::new("users", "manager_id", SqlType::BigInt);
    const ID: Field = Field::new("users", "id", SqlType::BigInt);

    fn compile(expr: &Expr) -> (String, Vec<SqlValue>) {
        expr.compile(&MySqlDialect)
    }

    #[test]
    fn comparison_binds_literal() {
        let (sql, params) = compile(&ID.gt(10));
        assert_eq!(sql, "(`users`.id > ?)");
        assert_eq!(params, vec![SqlValue::Int(10)]);
    }

    #[test]
    fn field_rhs_compares_columns() {
        let (sql, params) = compile(&ID.eq(MANAGER));
        assert_eq!(sql, "(`users`.id = `users`.manager_id)");
        assert!(params.is_empty());
    }

    #[test]
    fn and_or_nest_with_parens() {
        let expr = AGE.ge(18).and(NAME.like("a%").or(NAME.is_null()));
        let (sql, params) = compile(&expr);
        assert_eq!(
            sql,
            "((`users`.age >= ?) AND ((`users`.name LIKE ?) OR (`users`.name IS NULL)))"
        );
        assert_eq!(
            params,
            vec![SqlValue::Int(18), SqlValue::Text(String::from("a%"))]
        );
    }

    #[test]
    fn in_list_binds_each_element() {
        let (sql, params) = compile(&ID.in_list([1i64, 2, 3]));
        assert_eq!(sql, "(`users`.id IN (?, ?, ?))");
        assert_eq!(
            params,
            vec![SqlValue::Int(1), SqlValue::Int(2), SqlValue::Int(3)]
        );
    }

    #[test]
    fn not_in_renders_negation() {
        let (sql, _) = compile(&ID.not_in([1i64]));
        assert_eq!(sql, "(`users`.id NOT IN (?))");
    }

    #[test]
    fn between_binds_bounds_in_order() {
        let (sql, params) = compile(&AGE.between(18, 30));
        assert_eq!(sql, "(`users`.age BETWEEN ? AND ?)");
        assert_eq!(params, vec![SqlValue::Int(18), SqlValue::Int(30)]);
    }

    #[test]
    fn arithmetic_composes_with_comparison() {
        let (sql, params) = compile(&AGE.add(1).gt(21));
        assert_eq!(sql, "((`users`.age + ?) > ?)");
        assert_eq!(params, vec![SqlValue::Int(1), SqlValue::Int(21)]);
    }

    #[test]
    fn alias_renders_without_parens() {
        let (sql, params) = compile(&NAME.alias("n"));
        assert_eq!(sql, "`users`.name AS n");
        assert!(params.is_empty());
    }

    #[test]
    fn sort_direction_is_appended() {
        let (sql, _) = compile(&AGE.desc());
        assert_eq!(sql, "`users`.age DESC");
    }

    #[test]
    fn none_operand_becomes_null_placeholder() {
        let (sql, params) = compile(&NAME.eq(None::<&str>));
        assert_eq!(sql, "(`users`.name = ?)");
        assert_eq!(params, vec![SqlValue::Null]);
    }
}
