// src/main.rs
// DOCUMENTATION: Application entry point
// PURPOSE: Initialize config, storage backends, and start HTTP server

mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod services;

use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use config::{Config, StorageBackend};
use db::{EntityStore, MemoryStore, PgStore};
use dotenv::dotenv;
use services::{BlobStore, LocalBlobStore};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load environment variables
    dotenv().ok();

    // 2. Load configuration
    let config = Config::from_env();

    // 3. Initialize logging
    if std::env::var("RUST_LOG").is_err() {
        let log_level = if !config.log_level.is_empty() {
            config.log_level.clone()
        } else {
            "info,actix_web=info,sqlx=warn".to_string()
        };
        std::env::set_var("RUST_LOG", log_level);
    }
    env_logger::init();

    if let Err(e) = config.validate() {
        log::error!("Configuration error: {}", e);
        anyhow::bail!("invalid configuration: {}", e);
    }

    log::info!("Starting image-service...");
    log::info!("Environment: {}", config.environment);
    log::info!(
        "Server Address: {}:{}",
        config.server_address,
        config.server_port
    );

    // 4. Entity store
    let store: Arc<dyn EntityStore> = match config.storage_backend {
        StorageBackend::Postgres => {
            let pool = config::init_db_pool(&config).await?;
            Arc::new(PgStore::new(pool))
        }
        StorageBackend::Memory => {
            log::info!("Using in-memory entity store");
            Arc::new(MemoryStore::new())
        }
    };

    // 5. Blob store for uploaded files
    let blobs: Arc<dyn BlobStore> = Arc::new(
        LocalBlobStore::open(&config.upload_dir)
            .await
            .context("failed to prepare upload directory")?,
    );

    // 6. Start HTTP server
    let server_addr = format!("{}:{}", config.server_address, config.server_port);
    let store_data = web::Data::from(store);
    let blob_data = web::Data::from(blobs);
    let config_data = web::Data::new(config);

    HttpServer::new(move || {
        App::new()
            // Application state (entity store, blob store, config)
            .app_data(store_data.clone())
            .app_data(blob_data.clone())
            .app_data(config_data.clone())
            // Middleware
            .wrap(Logger::default())
            .wrap(actix_web::middleware::Compress::default())
            // Routes
            .configure(handlers::health_config)
            .configure(handlers::api_config)
    })
    .bind(&server_addr)
    .with_context(|| format!("failed to bind {}", server_addr))?
    .run()
    .await?;

    Ok(())
}
