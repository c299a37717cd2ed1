//! # strato-orm
//!
//! Asynchronous, dialect-aware query construction and execution for
//! MySQL-family and Postgres-family databases.
//!
//! This crate provides:
//! - `#[derive(Model)]` binding entity structs to typed table schemas
//! - An owned, per-call [`QueryBuilder`] compiled through the dialect layer
//! - Pooled execution with results shaped by [`QueryKind`]
//! - A raw-SQL escape hatch on [`Engine`] with MySQL-to-Postgres translation
//!
//! ## Quick Start
//!
//! ```ignore
//! use strato_orm::{create_engine, EngineConfig, Model, ModelOps};
//!
//! #[derive(Model)]
//! #[model(table = "users")]
//! struct User {
//!     #[field(primary_key, auto_increment)]
//!     id: Option<i64>,
//!     #[field(max_length = 150)]
//!     name: Option<String>,
//!     age: Option<i32>,
//! }
//!
//! async fn example() -> strato_orm::Result<()> {
//!     let config = EngineConfig::from_url("mysql://root:pw@localhost/app")?;
//!     let engine = create_engine(config).await;
//!
//!     let adults = User::query()
//!         .filter([User::age().ge(18)])
//!         .order_by([User::id().desc()])
//!         .all(&engine)
//!         .await?;
//!
//!     let user = User { id: None, name: Some("ada".into()), age: Some(36) };
//!     let (inserted, key) = user.insert(&engine).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! Builders are owned values: every `User::query()` starts clean, terminal
//! calls consume the builder, and nothing is shared between tasks.

pub mod builder;
pub mod engine;
pub mod error;
pub mod model;
pub mod pool;
mod registry;

pub use builder::QueryBuilder;
pub use engine::{create_engine, Db, DriverKind, Engine, EngineConfig};
pub use error::{OrmError, Result};
pub use model::{Model, ModelOps};
pub use pool::{Pool, QueryKind, QueryOutput, Row};

pub use strato_sql_derive::Model;
