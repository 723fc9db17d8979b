use anyhow::{Context, Result};
use sqlx::{
    mysql::{MySqlConnectOptions, MySqlPoolOptions},
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    MySqlPool, PgPool,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::util::env::{env_opt, env_parse, env_req};

/// Connect to the target Postgres store.
///
/// Resolution order: `TARGET_DATABASE_URL`, `DATABASE_URL`, then discrete
/// `POSTGRES_HOST`/`POSTGRES_PORT`/`POSTGRES_USER`/`POSTGRES_PASSWORD`/
/// `POSTGRES_DATABASE` variables. The run is a single logical flow, so the
/// pool defaults small; raise it with `DB_MAX_CONNS` if needed.
pub async fn connect_target() -> Result<PgPool> {
    let mut connect_options = match env_opt("TARGET_DATABASE_URL").or_else(|| env_opt("DATABASE_URL")) {
        Some(url) => {
            let mut opts = PgConnectOptions::from_str(&url)
                .context("invalid target database URL")?;
            // Be explicit about TLS when the DSN asks for it.
            if url.contains("sslmode=require") && !url.contains("sslmode=disable") {
                opts = opts.ssl_mode(PgSslMode::Require);
            }
            opts
        }
        None => {
            let host = env_req("POSTGRES_HOST")?;
            let user = env_req("POSTGRES_USER")?;
            let database = env_req("POSTGRES_DATABASE")?;
            let port: u16 = env_parse("POSTGRES_PORT", 5432);
            let mut opts = PgConnectOptions::new()
                .host(&host)
                .port(port)
                .username(&user)
                .database(&database);
            if let Some(password) = env_opt("POSTGRES_PASSWORD") {
                opts = opts.password(&password);
            }
            if env_opt("POSTGRES_SSLMODE").as_deref() == Some("require") {
                opts = opts.ssl_mode(PgSslMode::Require);
            }
            opts
        }
    };

    // One-shot statements throughout; skipping the cache also keeps pooler
    // (transaction mode) setups happy.
    connect_options = connect_options.statement_cache_capacity(0);

    let max_conns: u32 = env_parse("DB_MAX_CONNS", 5);
    let pool = PgPoolOptions::new()
        .max_connections(max_conns)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .connect_with(connect_options)
        .await
        .context("failed to connect to target store")?;
    info!(max_conns, "connected to target store");
    Ok(pool)
}

/// Connect to the legacy MySQL store.
///
/// Resolution order: `LEGACY_DATABASE_URL`, then discrete `MYSQL_HOST`/
/// `MYSQL_PORT`/`MYSQL_USER`/`MYSQL_PASSWORD`/`MYSQL_DATABASE` variables.
/// The source side serializes on one connection.
pub async fn connect_legacy() -> Result<MySqlPool> {
    let connect_options = match env_opt("LEGACY_DATABASE_URL") {
        Some(url) => MySqlConnectOptions::from_str(&url)
            .context("invalid legacy database URL")?,
        None => {
            let host = env_req("MYSQL_HOST")?;
            let user = env_req("MYSQL_USER")?;
            let database = env_req("MYSQL_DATABASE")?;
            let port: u16 = env_parse("MYSQL_PORT", 3306);
            let mut opts = MySqlConnectOptions::new()
                .host(&host)
                .port(port)
                .username(&user)
                .database(&database);
            if let Some(password) = env_opt("MYSQL_PASSWORD") {
                opts = opts.password(&password);
            }
            opts
        }
    };

    let pool = MySqlPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(connect_options)
        .await
        .context("failed to connect to legacy store")?;
    info!("connected to legacy store");
    Ok(pool)
}
