use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use shared_models::error::AppError;

use crate::models::{DirectoryError, Provider, ProviderSearchQuery};
use crate::services::ProviderDirectory;

pub type DirectoryState = Arc<dyn ProviderDirectory>;

impl From<DirectoryError> for AppError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::ProviderNotFound(_) => AppError::NotFound(e.to_string()),
        }
    }
}

#[axum::debug_handler]
pub async fn list_providers(
    State(directory): State<DirectoryState>,
    Query(query): Query<ProviderSearchQuery>,
) -> Json<Vec<Provider>> {
    let providers = directory
        .list_providers()
        .await
        .into_iter()
        .filter(|p| query.matches(p))
        .collect();

    Json(providers)
}

#[axum::debug_handler]
pub async fn get_provider(
    State(directory): State<DirectoryState>,
    Path(provider_id): Path<String>,
) -> Result<Json<Provider>, AppError> {
    let provider = directory.get_provider(&provider_id).await?;
    Ok(Json(provider))
}
