pub mod issues;
pub mod models;

use std::str::FromStr;

use anyhow::Context;
use sqlx::any::{AnyConnectOptions, AnyPoolOptions};
use sqlx::{AnyPool, ConnectOptions, Executor};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./src/db/migrations");

pub async fn connect_and_migrate(db_url: &str) -> anyhow::Result<AnyPool> {
    sqlx::any::install_default_drivers();

    let normalized = normalized_db_url(db_url);

    let connect_options = AnyConnectOptions::from_str(&normalized)
        .with_context(|| format!("invalid SUPPORT_DB_URL: {db_url}"))?
        .disable_statement_logging();

    let pool = AnyPoolOptions::new()
        .max_connections(8)
        .connect_with(connect_options)
        .await
        .context("failed to establish sqlx AnyPool")?;

    if normalized.starts_with("sqlite://") {
        pool.execute("PRAGMA journal_mode = WAL;")
            .await
            .context("failed to set sqlite WAL mode")?;
    }

    MIGRATOR
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    Ok(pool)
}

/// SQLite files are created on first start unless the URL already sets a mode.
fn normalized_db_url(db_url: &str) -> String {
    if db_url.starts_with("sqlite://") && !db_url.contains('?') {
        format!("{db_url}?mode=rwc")
    } else {
        db_url.to_string()
    }
}
