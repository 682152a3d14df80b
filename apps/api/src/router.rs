use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::handlers::BookingState;
use appointment_cell::router::appointment_routes;
use doctor_cell::handlers::DirectoryState;
use doctor_cell::router::provider_routes;
use shared_config::AppConfig;

pub fn create_router(config: Arc<AppConfig>, booking: BookingState, directory: DirectoryState) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/providers", provider_routes(config.clone(), directory))
        .nest("/appointments", appointment_routes(config, booking))
}
