// InvestWise payments - M-PESA STK push relay for the InvestWise predictor

pub mod config;
pub mod models;
pub mod types;
pub mod payment;
pub mod routes;
pub mod middleware;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;
pub use types::{AppError, AppResult};

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
