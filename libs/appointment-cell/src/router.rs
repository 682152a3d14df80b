// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, BookingState};

pub fn appointment_routes(config: Arc<AppConfig>, state: BookingState) -> Router {
    // Every appointment operation requires authentication
    Router::new()
        .route("/", get(handlers::list_appointments))
        .route("/summary", get(handlers::appointment_summary))
        .route("/services", get(handlers::list_services))
        .route("/slots", get(handlers::available_slots))
        .route("/direct", post(handlers::direct_book))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/actions", post(handlers::apply_action))
        // Booking wizard sessions
        .route("/wizard", post(handlers::open_wizard))
        .route(
            "/wizard/{session_id}",
            get(handlers::get_wizard)
                .put(handlers::update_wizard)
                .delete(handlers::cancel_wizard),
        )
        .route("/wizard/{session_id}/next", post(handlers::wizard_next))
        .route("/wizard/{session_id}/back", post(handlers::wizard_back))
        .route("/wizard/{session_id}/submit", post(handlers::submit_wizard))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
