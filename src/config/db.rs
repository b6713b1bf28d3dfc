// src/config/db.rs
// DOCUMENTATION: Database connection pool initialization
// PURPOSE: Setup the PostgreSQL connection pool and apply migrations

use crate::config::Config;
use anyhow::Context;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Initialize PostgreSQL connection pool
/// DOCUMENTATION: Called once during application startup in main.rs when
/// STORAGE_BACKEND=postgres; runs pending migrations before returning
pub async fn init_db_pool(config: &Config) -> anyhow::Result<PgPool> {
    log::info!("Initializing database pool");

    let pool = PgPoolOptions::new()
        // Maximum concurrent connections
        .max_connections(config.db_max_connections)
        // Timeout waiting for connection from pool
        .acquire_timeout(Duration::from_secs(config.db_connection_timeout))
        // Connection idle timeout (5 minutes)
        .idle_timeout(Duration::from_secs(300))
        // Connection lifetime (30 minutes before recycle)
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    // Verify connection works
    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .context("database did not answer SELECT 1")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    log::info!("Database pool initialized successfully");
    Ok(pool)
}
