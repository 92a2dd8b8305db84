// GTFS schedule loader
// Periodically reloads routes, trips, shapes and calendar from a GTFS static
// feed into a table store and serves filtered reads over them.

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use clap::Parser;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

mod api;
mod archive;
mod config;
mod error;
mod gtfs_models;
mod loader;
mod parser;
mod refresh;
mod store;
#[cfg(test)]
mod test_support;

use api::AppState;
use config::Config;
use refresh::{RefreshSettings, Refresher};
use store::{MemoryStore, RestStore, TableStore};

// ============================================================================
// Background Task
// ============================================================================

async fn data_refresh_task(refresher: Arc<Refresher>, period: Duration) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        info!("🔄 Scheduled GTFS refresh...");

        match refresher.refresh_all().await {
            Ok(report) => {
                info!(
                    "✓ Scheduled refresh completed at {} ({} rows)",
                    report.finished_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    report.total_loaded()
                );
            }
            Err(error::RefreshError::InProgress) => {
                warn!("⚠️  Skipping scheduled refresh, a manual one is running");
            }
            Err(e) => {
                error!("❌ Scheduled refresh failed: {}", e);
            }
        }
    }
}

// ============================================================================
// Server Setup
// ============================================================================

fn build_store(config: &Config) -> Result<Arc<dyn TableStore>, error::StoreError> {
    if config.memory_store {
        warn!("⚠️  Using the in-memory store, data is lost on restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    // validate() has already checked both are present.
    let url = config.store_url.as_deref().unwrap_or_default();
    let key = config.store_key.as_deref().unwrap_or_default();
    Ok(Arc::new(RestStore::new(url, key, config.fetch_timeout())?))
}

async fn run_server(config: Config, state: AppState) -> std::io::Result<()> {
    match config.refresh_interval() {
        Some(period) => {
            let refresher = state.refresher.clone();
            actix_web::rt::spawn(async move {
                data_refresh_task(refresher, period).await;
            });
            info!("🔄 Auto-refresh: every {} seconds", period.as_secs());
        }
        None => info!("🔄 Auto-refresh disabled"),
    }

    info!("🌐 Server running on: http://{}:{}", config.bind_addr, config.port);
    info!("📍 Routes:");
    info!("   POST /refresh                     - Reload the GTFS feed");
    info!("   GET  /routes                      - All routes");
    info!("   GET  /trips?route_id=ID           - Trips of a route");
    info!("   GET  /shapes?shape_id=ID          - Points of a shape");
    info!("   GET  /calendar?service_id=ID      - Service calendar");
    info!("   GET  /health                      - Health check");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(api::configure)
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    if let Err(e) = config.validate() {
        error!("❌ Invalid configuration: {}", e);
        std::process::exit(2);
    }

    let store = match build_store(&config) {
        Ok(store) => store,
        Err(e) => {
            error!("❌ Failed to set up the table store: {}", e);
            std::process::exit(1);
        }
    };

    let client = match archive::create_http_client(config.fetch_timeout()) {
        Ok(client) => client,
        Err(e) => {
            error!("❌ {}", e);
            std::process::exit(1);
        }
    };

    let settings = RefreshSettings {
        feed_url: config.feed_url.clone(),
        batch_size: config.batch_size,
        parse: config.parse_options(),
    };
    let refresher = Arc::new(Refresher::new(client, store.clone(), settings));
    let settings = refresher.settings();
    info!(
        "📡 Feed: {} (batch size {}, {:?})",
        settings.feed_url, settings.batch_size, settings.parse
    );

    let state = AppState { store, refresher };

    actix_web::rt::System::new().block_on(run_server(config, state))
}
