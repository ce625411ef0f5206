//! API Routes
//!
//! - `/initiate-payment` - Start an M-PESA STK push
//! - `/mpesa/callback` - Daraja result callback
//! - `/api/health` - Health check

pub mod health;
pub mod payments;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::apply_cors;
use crate::models::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let origins = state.config.server.cors_allowed_origins.clone();

    let router = Router::new()
        .merge(payments::router(state))
        .merge(health::router());

    apply_cors(router, &origins).layer(TraceLayer::new_for_http())
}
