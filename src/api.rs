// HTTP endpoints: manual refresh trigger and filtered reads over the store.

use crate::error::RefreshError;
use crate::gtfs_models::GtfsTable;
use crate::refresh::Refresher;
use crate::store::TableStore;
use actix_web::http::StatusCode;
use actix_web::error::InternalError;
use actix_web::{web, HttpResponse};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TableStore>,
    pub refresher: Arc<Refresher>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(ErrorBody {
        error: message.into(),
    })
}

#[derive(Deserialize)]
pub struct TripsQuery {
    route_id: Option<String>,
}

#[derive(Deserialize)]
pub struct ShapesQuery {
    shape_id: Option<String>,
}

#[derive(Deserialize)]
pub struct CalendarQuery {
    service_id: Option<String>,
}

// ============================================================================
// Read Endpoints
// ============================================================================

async fn select_matching(
    state: &AppState,
    table: GtfsTable,
    column: &'static str,
    value: Option<String>,
) -> HttpResponse {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, format!("missing {}", column));
    };

    match state.store.select(table.table_name(), column, &value).await {
        Ok(rows) => {
            info!("📍 {} {}={}: {} rows", table, column, value, rows.len());
            HttpResponse::Ok().json(rows)
        }
        Err(e) => {
            error!("❌ Failed to query {}: {}", table, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn get_trips(state: web::Data<AppState>, query: web::Query<TripsQuery>) -> HttpResponse {
    select_matching(&state, GtfsTable::Trips, "route_id", query.into_inner().route_id).await
}

async fn get_shapes(state: web::Data<AppState>, query: web::Query<ShapesQuery>) -> HttpResponse {
    select_matching(&state, GtfsTable::Shapes, "shape_id", query.into_inner().shape_id).await
}

async fn get_calendar(state: web::Data<AppState>, query: web::Query<CalendarQuery>) -> HttpResponse {
    select_matching(&state, GtfsTable::Calendar, "service_id", query.into_inner().service_id).await
}

async fn get_routes(state: web::Data<AppState>) -> HttpResponse {
    match state.store.select_all(GtfsTable::Routes.table_name()).await {
        Ok(rows) => {
            info!("🚌 Routes requested: {} total", rows.len());
            HttpResponse::Ok().json(rows)
        }
        Err(e) => {
            error!("❌ Failed to query routes: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

// ============================================================================
// Control
// ============================================================================

async fn post_refresh(state: web::Data<AppState>) -> HttpResponse {
    info!("🔄 Manual refresh requested...");

    match state.refresher.refresh_all().await {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(RefreshError::InProgress) => {
            warn!("⚠️  Manual refresh rejected, another one is running");
            error_response(StatusCode::CONFLICT, RefreshError::InProgress.to_string())
        }
        Err(e) => {
            error!("❌ Manual refresh failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Refresh failed: {}", e))
        }
    }
}

async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let last_refresh = state.refresher.last_report().map(|report| {
        serde_json::json!({
            "finished_at": report.finished_at,
            "rows_loaded": report.total_loaded(),
            "failed_tables": report.failed_tables(),
        })
    });

    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "gtfs-sync",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().timestamp(),
        "last_refresh": last_refresh,
    }))
}

async fn not_found() -> HttpResponse {
    error_response(StatusCode::NOT_FOUND, "not found")
}

/// Route table shared by the server and the endpoint tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    let query_config = web::QueryConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        InternalError::from_response(err, error_response(StatusCode::BAD_REQUEST, message)).into()
    });

    cfg.app_data(query_config)
        .route("/health", web::get().to(health_check))
        .route("/refresh", web::post().to(post_refresh))
        .route("/api/database-refresh", web::post().to(post_refresh))
        .route("/routes", web::get().to(get_routes))
        .route("/trips", web::get().to(get_trips))
        .route("/shapes", web::get().to(get_shapes))
        .route("/calendar", web::get().to(get_calendar))
        .default_service(web::to(not_found));
}
