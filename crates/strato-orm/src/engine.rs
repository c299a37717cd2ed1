//! Engine configuration, connection, and the named-engine registry.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use sqlx::mysql::MySqlConnectOptions;
use sqlx::postgres::PgConnectOptions;
use strato_sql_core::dialect::{translate, Dialect, MySqlDialect, PostgresDialect};
use strato_sql_core::{dsn, SqlValue};

use crate::error::{OrmError, Result};
use crate::pool::{Pool, QueryKind, QueryOutput};

/// Backend family an engine talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    MySql,
    Postgres,
}

impl DriverKind {
    /// Maps a URL scheme to a driver; AWS flavors share the plain drivers.
    #[must_use]
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "mysql" | "aws-mysql" => Some(Self::MySql),
            "postgres" | "postgresql" | "aws-postgres" => Some(Self::Postgres),
            _ => None,
        }
    }

    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::MySql => 3306,
            Self::Postgres => 5432,
        }
    }

    #[must_use]
    pub const fn dialect(self) -> &'static dyn Dialect {
        match self {
            Self::MySql => &MySqlDialect,
            Self::Postgres => &PostgresDialect,
        }
    }
}

/// Connection settings for one engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub driver: DriverKind,
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub db: Option<String>,
    /// MySQL connection charset.
    pub charset: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Pool acquire timeout in seconds.
    pub acquire_timeout_secs: Option<u64>,
    /// Log every statement at DEBUG before execution.
    pub echo: bool,
}

fn parse_numeric_param(
    query: &BTreeMap<String, Vec<String>>,
    key: &str,
) -> Result<Option<u32>> {
    match query.get(key).and_then(|values| values.last()) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| OrmError::Config(format!("bad {key} `{raw}`"))),
    }
}

impl EngineConfig {
    /// Builds a config with driver defaults for everything but the backend.
    #[must_use]
    pub fn new(driver: DriverKind) -> Self {
        Self {
            driver,
            host: String::from("localhost"),
            port: driver.default_port(),
            user: None,
            password: None,
            db: None,
            charset: None,
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_secs: None,
            echo: false,
        }
    }

    /// Parses a database URL into a config.
    ///
    /// Recognized query parameters: `charset` (MySQL), `maxsize`, `minsize`,
    /// and `timeout` (pool acquire timeout, seconds).
    pub fn from_url(url: &str) -> Result<Self> {
        let info = dsn::parse_url(url)?;
        let driver = DriverKind::from_scheme(&info.scheme)
            .ok_or_else(|| OrmError::Config(format!("unknown driver `{}`", info.scheme)))?;
        let mut config = Self::new(driver);
        if let Some(host) = info.host {
            config.host = host;
        }
        if let Some(port) = info.port {
            config.port = port;
        }
        config.user = info.username;
        config.password = info.password;
        config.db = info.db;
        if let Some(values) = info.query.get("charset") {
            config.charset = values.last().cloned();
        }
        if let Some(n) = parse_numeric_param(&info.query, "maxsize")? {
            config.max_connections = n;
        }
        if let Some(n) = parse_numeric_param(&info.query, "minsize")? {
            config.min_connections = n;
        }
        if let Some(n) = parse_numeric_param(&info.query, "timeout")? {
            config.acquire_timeout_secs = Some(u64::from(n));
        }
        Ok(config)
    }

    fn pool_options<DB: sqlx::Database>(&self) -> sqlx::pool::PoolOptions<DB> {
        let mut options = sqlx::pool::PoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections);
        if let Some(secs) = self.acquire_timeout_secs {
            options = options.acquire_timeout(std::time::Duration::from_secs(secs));
        }
        options
    }

    fn label(&self) -> String {
        format!(
            "{}://{}:{}/{}",
            match self.driver {
                DriverKind::MySql => "mysql",
                DriverKind::Postgres => "postgres",
            },
            self.host,
            self.port,
            self.db.as_deref().unwrap_or("")
        )
    }
}

/// A connected (or connection-failed) database engine.
///
/// Connection failures do not abort startup; the engine is kept around in a
/// degraded state and every operation on it returns a usage error until a
/// fresh `create_engine` succeeds.
///
/// Clones share one pool slot, so closing any clone disconnects them all.
#[derive(Debug, Clone)]
pub struct Engine {
    pool: Arc<RwLock<Option<Pool>>>,
    kind: DriverKind,
    echo: bool,
    label: String,
}

/// Connects a pool for `config` and wraps it in an [`Engine`].
pub async fn create_engine(config: EngineConfig) -> Engine {
    let label = config.label();
    let connected = match config.driver {
        DriverKind::MySql => {
            let mut options = MySqlConnectOptions::new()
                .host(&config.host)
                .port(config.port);
            if let Some(user) = &config.user {
                options = options.username(user);
            }
            if let Some(password) = &config.password {
                options = options.password(password);
            }
            if let Some(db) = &config.db {
                options = options.database(db);
            }
            if let Some(charset) = &config.charset {
                options = options.charset(charset);
            }
            config
                .pool_options::<sqlx::MySql>()
                .connect_with(options)
                .await
                .map(Pool::MySql)
        }
        DriverKind::Postgres => {
            let mut options = PgConnectOptions::new()
                .host(&config.host)
                .port(config.port);
            if let Some(user) = &config.user {
                options = options.username(user);
            }
            if let Some(password) = &config.password {
                options = options.password(password);
            }
            if let Some(db) = &config.db {
                options = options.database(db);
            }
            config
                .pool_options::<sqlx::Postgres>()
                .connect_with(options)
                .await
                .map(Pool::Postgres)
        }
    };

    match connected {
        Ok(pool) => {
            tracing::info!(target: "strato_orm", engine = %label, "database connected");
            Engine {
                pool: Arc::new(RwLock::new(Some(pool))),
                kind: config.driver,
                echo: config.echo,
                label,
            }
        }
        Err(error) => {
            tracing::error!(target: "strato_orm", engine = %label, %error, "database connection failed");
            Engine {
                pool: Arc::new(RwLock::new(None)),
                kind: config.driver,
                echo: config.echo,
                label,
            }
        }
    }
}

impl Engine {
    /// An engine with no pool, as left behind by a failed connection.
    #[must_use]
    pub fn disconnected(kind: DriverKind) -> Self {
        Self {
            pool: Arc::new(RwLock::new(None)),
            kind,
            echo: false,
            label: String::from("disconnected"),
        }
    }

    #[must_use]
    pub const fn driver(&self) -> DriverKind {
        self.kind
    }

    #[must_use]
    pub const fn dialect(&self) -> &'static dyn Dialect {
        self.kind.dialect()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.read_pool().is_some()
    }

    fn read_pool(&self) -> Option<Pool> {
        let guard = match self.pool.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.clone()
    }

    /// A handle to the live pool, or a usage error when the connection never
    /// came up or the engine was closed.
    pub fn pool(&self) -> Result<Pool> {
        self.read_pool()
            .ok_or_else(|| OrmError::Usage(String::from("must be create_engine first")))
    }

    fn ensure_batch_supported(&self) -> Result<()> {
        if self.dialect().supports_batch() {
            Ok(())
        } else {
            Err(OrmError::Unsupported(format!(
                "{} does not support batch execution",
                self.dialect().name()
            )))
        }
    }

    fn prepare(&self, sql: &str) -> String {
        let sql = match self.kind {
            DriverKind::MySql => String::from(sql),
            // Raw statements may arrive in MySQL syntax; rewriting is a
            // no-op on already-Postgres text.
            DriverKind::Postgres => translate(sql),
        };
        if self.echo {
            tracing::debug!(target: "strato_orm", engine = %self.label, sql = %sql, "execute");
        }
        sql
    }

    /// Executes SQL already compiled for this engine's dialect.
    pub(crate) async fn run(
        &self,
        sql: &str,
        params: &[SqlValue],
        kind: QueryKind,
    ) -> Result<QueryOutput> {
        if self.echo {
            tracing::debug!(target: "strato_orm", engine = %self.label, sql = %sql, "execute");
        }
        self.pool()?.execute(sql, params, kind).await
    }

    /// Batch variant of [`Engine::run`].
    ///
    /// Backends without batch support are rejected before the pool is even
    /// consulted, so the error does not depend on connection state.
    pub(crate) async fn run_batch(
        &self,
        sql: &str,
        sets: &[Vec<SqlValue>],
        kind: QueryKind,
    ) -> Result<QueryOutput> {
        self.ensure_batch_supported()?;
        if self.echo {
            tracing::debug!(target: "strato_orm", engine = %self.label, sql = %sql, sets = sets.len(), "execute batch");
        }
        self.pool()?.execute_batch(sql, sets, kind).await
    }

    /// Executes a raw statement with `?` placeholders.
    pub async fn query(
        &self,
        sql: &str,
        params: &[SqlValue],
        kind: QueryKind,
    ) -> Result<QueryOutput> {
        let sql = self.prepare(sql);
        self.pool()?.execute(&sql, params, kind).await
    }

    /// Executes a raw statement once per parameter set.
    pub async fn query_batch(
        &self,
        sql: &str,
        sets: &[Vec<SqlValue>],
        kind: QueryKind,
    ) -> Result<QueryOutput> {
        self.ensure_batch_supported()?;
        let sql = self.prepare(sql);
        self.pool()?.execute_batch(&sql, sets, kind).await
    }

    /// Closes the pool for this engine and every clone of it; further calls
    /// error as disconnected.
    pub async fn close(&self) {
        let taken = {
            let mut guard = match self.pool.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.take()
        };
        if let Some(pool) = taken {
            pool.close().await;
            tracing::info!(target: "strato_orm", engine = %self.label, "database closed");
        }
    }
}

/// Named collection of engines, for applications talking to several
/// databases.
#[derive(Debug, Default)]
pub struct Db {
    engines: HashMap<String, Engine>,
}

impl Db {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an engine under a name, replacing any previous holder.
    pub fn insert(&mut self, name: impl Into<String>, engine: Engine) {
        self.engines.insert(name.into(), engine);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Engine> {
        self.engines.get(name)
    }

    /// Closes every registered engine.
    pub async fn close_all(&self) {
        for engine in self.engines.values() {
            engine.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_url_defaults_and_overrides() {
        let config =
            EngineConfig::from_url("mysql://root:pw@db.host/shop?charset=utf8mb4&maxsize=20&minsize=2&timeout=5")
                .expect("parses");
        assert_eq!(config.driver, DriverKind::MySql);
        assert_eq!(config.host, "db.host");
        assert_eq!(config.port, 3306);
        assert_eq!(config.user.as_deref(), Some("root"));
        assert_eq!(config.password.as_deref(), Some("pw"));
        assert_eq!(config.db.as_deref(), Some("shop"));
        assert_eq!(config.charset.as_deref(), Some("utf8mb4"));
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.acquire_timeout_secs, Some(5));
    }

    #[test]
    fn aws_schemes_map_to_plain_drivers() {
        assert_eq!(
            DriverKind::from_scheme("aws-mysql"),
            Some(DriverKind::MySql)
        );
        assert_eq!(
            DriverKind::from_scheme("aws-postgres"),
            Some(DriverKind::Postgres)
        );
        assert_eq!(DriverKind::from_scheme("sqlite"), None);
    }

    #[test]
    fn unknown_scheme_is_a_config_error() {
        let err = EngineConfig::from_url("oracle://h/db").expect_err("unknown driver");
        assert!(matches!(err, OrmError::Config(_)));
    }

    #[test]
    fn disconnected_engine_reports_usage_error() {
        let engine = Engine::disconnected(DriverKind::MySql);
        assert!(!engine.is_connected());
        let err = engine.pool().expect_err("no pool");
        assert!(matches!(err, OrmError::Usage(_)));
    }

    #[tokio::test]
    async fn raw_query_on_disconnected_engine_errors_before_network() {
        let engine = Engine::disconnected(DriverKind::Postgres);
        let err = engine
            .query("SELECT 1", &[], QueryKind::Count)
            .await
            .expect_err("no pool");
        assert!(matches!(err, OrmError::Usage(_)));
    }

    #[tokio::test]
    async fn raw_batch_on_postgres_is_unsupported_before_network() {
        let engine = Engine::disconnected(DriverKind::Postgres);
        let err = engine
            .query_batch(
                "INSERT INTO t (a) VALUES (?)",
                &[vec![SqlValue::Int(1)]],
                QueryKind::CreateBatch,
            )
            .await
            .expect_err("no batch on postgres");
        assert!(matches!(err, OrmError::Unsupported(_)));
    }

    #[tokio::test]
    async fn close_disconnects_every_clone() {
        // A lazy pool never opens a connection, so close needs no server.
        let engine = Engine {
            pool: Arc::new(RwLock::new(Some(Pool::Postgres(
                sqlx::postgres::PgPool::connect_lazy("postgres://localhost/app")
                    .expect("lazy pool"),
            )))),
            kind: DriverKind::Postgres,
            echo: false,
            label: String::from("postgres://localhost:5432/app"),
        };
        let clone = engine.clone();
        assert!(clone.is_connected());
        engine.close().await;
        assert!(!clone.is_connected());
        let err = clone
            .query("SELECT 1", &[], QueryKind::Count)
            .await
            .expect_err("closed engine");
        assert!(matches!(err, OrmError::Usage(_)));
    }
}
