//! Database engine: a connection pool bound to the configured URI.

use crate::config::{db_core_group, db_group, ConfigManager, DatabaseConfig};
use crate::error::DbError;
use crate::session::get_session;
use crate::uri::redact_db_uri;
use futures::future::BoxFuture;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool, Postgres, Transaction};
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct EngineOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Create the engine for `config` with default pool options. No connection is opened
/// until the first session.
pub fn init_db_engine(config: &DatabaseConfig) -> Result<PgPool, DbError> {
    init_db_engine_with(config, &EngineOptions::default())
}

pub fn init_db_engine_with(config: &DatabaseConfig, options: &EngineOptions) -> Result<PgPool, DbError> {
    let uri = config.uri()?;
    let pool = PgPoolOptions::new()
        .max_connections(options.max_connections)
        .acquire_timeout(options.acquire_timeout)
        .connect_lazy(&uri)?;
    tracing::info!(server = %config.code, uri = %redact_db_uri(&uri), "database engine created");
    Ok(pool)
}

/// Create the database named in `database_url` if it does not exist, connecting through the
/// `postgres` maintenance database on the same server.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), DbError> {
    let (admin_url, db_name) = split_db_name(database_url);
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = PgConnectOptions::from_str(&admin_url)?;
    let mut conn = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
        tracing::info!(database = %db_name, "created database");
    }
    Ok(())
}

fn split_db_name(url: &str) -> (String, String) {
    let path_start = url.rfind('/').map(|i| i + 1).unwrap_or(url.len());
    let db_name = url[path_start..].split('?').next().unwrap_or("").trim();
    let admin_url = format!("{}postgres", &url[..path_start]);
    (admin_url, db_name.to_string())
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Handle to the primary database: engine plus session factory.
#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Database { pool }
    }

    /// Load the database config groups into `mgr` and create the primary engine.
    pub fn from_config(mgr: &mut ConfigManager) -> Result<Self, DbError> {
        mgr.load_group(&db_core_group())?;
        mgr.load_group(&db_group())?;
        let config = DatabaseConfig::from_manager(mgr, "")?;
        Ok(Database::new(init_db_engine(&config)?))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// [`get_session`] on this database's pool.
    pub async fn session<B, T, E>(&self, body: B) -> Result<T, E>
    where
        B: for<'s> FnOnce(&'s mut Transaction<'static, Postgres>) -> BoxFuture<'s, Result<T, E>>,
        E: From<DbError>,
    {
        get_session(&self.pool, body).await
    }
}
