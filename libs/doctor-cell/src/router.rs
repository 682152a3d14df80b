use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, DirectoryState};

pub fn provider_routes(config: Arc<AppConfig>, directory: DirectoryState) -> Router {
    Router::new()
        .route("/", get(handlers::list_providers))
        .route("/{provider_id}", get(handlers::get_provider))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(directory)
}
