//! # strato-sql-core
//!
//! Dialect-aware SQL construction: typed column descriptors, an expression
//! tree, and compilation to `(sql, params)` pairs.
//!
//! This crate provides:
//! - [`Field`] column descriptors with fluent predicate and aggregate
//!   constructors
//! - An [`Expr`] tree compiled per [`dialect::Dialect`], with every literal
//!   bound as a `?` placeholder
//! - Database URL parsing via [`dsn::parse_url`]
//!
//! ## Building a predicate
//!
//! ```rust
//! use strato_sql_core::{Field, SqlType, SqlValue};
//! use strato_sql_core::dialect::MySqlDialect;
//!
//! const AGE: Field = Field::new("users", "age", SqlType::Int);
//! const NAME: Field = Field::new("users", "name", SqlType::Char);
//!
//! let (sql, params) = AGE.ge(18).and(NAME.like("a%")).compile(&MySqlDialect);
//! assert_eq!(sql, "((`users`.age >= ?) AND (`users`.name LIKE ?))");
//! assert_eq!(params, vec![SqlValue::Int(18), SqlValue::Text("a%".into())]);
//! ```
//!
//! Values never reach the SQL text directly; injection-prone input travels
//! only through the parameter vector.

pub mod dialect;
pub mod dsn;
pub mod error;
pub mod expr;
pub mod field;
pub mod func;
pub mod schema;
pub mod value;

pub use dialect::{Dialect, MySqlDialect, PostgresDialect};
pub use dsn::ConnInfo;
pub use error::{CoreError, Result};
pub use expr::{BinaryOp, Expr, IntoOperand, LikeKind, OrderDirection};
pub use field::{Field, SqlType};
pub use func::{AggKind, DateRel, FuncCall, FuncKind, JsonKey};
pub use schema::{Table, TableSchema};
pub use value::{FromSqlValue, SqlValue, ToSqlValue};
