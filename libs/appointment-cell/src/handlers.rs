// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use shared_models::error::AppError;
use shared_utils::extractor::AuthUser;

use crate::models::{
    Appointment, AppointmentError, AppointmentSummary, AppointmentView, AvailableSlotsResponse,
    DirectBookingRequest, LifecycleAction, OpenWizardRequest, Service, WizardUpdate,
};
use crate::services::booking::{AppointmentBookingService, WizardSessionView};
use crate::services::query::{AppointmentQuery, DateRange, SortField, SortKey, SortOrder, StatusFilter};

pub type BookingState = Arc<AppointmentBookingService>;

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::Validation { ref fields } => AppError::ValidationError {
                fields: fields.clone(),
                message: e.to_string(),
            },
            AppointmentError::AvailabilityConflict { .. } | AppointmentError::InvalidTransition { .. } => {
                AppError::Conflict(e.to_string())
            }
            AppointmentError::NotFound { .. } => AppError::NotFound(e.to_string()),
            AppointmentError::Unauthorized(_) => AppError::Forbidden(e.to_string()),
        }
    }
}

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub provider_id: String,
    pub date: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentListParams {
    pub status: Option<String>,
    pub q: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub provider_id: Option<String>,
    pub sort: Option<SortField>,
    pub order: Option<SortOrder>,
}

impl AppointmentListParams {
    pub fn into_query(self) -> Result<AppointmentQuery, AppError> {
        let status_filter = match self.status.as_deref() {
            Some(raw) => raw.parse::<StatusFilter>().map_err(AppError::BadRequest)?,
            None => StatusFilter::All,
        };

        let date_range = match (self.from, self.to) {
            (None, None) => None,
            (from, to) => Some(DateRange { from, to }),
        };

        Ok(AppointmentQuery {
            status_filter,
            free_text: self.q.unwrap_or_default(),
            date_range,
            provider_id: self.provider_id,
            sort: self.sort.map(|field| SortKey {
                field,
                order: self.order.unwrap_or_default(),
            }),
        })
    }
}

// ==============================================================================
// CATALOG AND SLOTS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_services(State(service): State<BookingState>) -> Json<Vec<Service>> {
    Json(service.list_services().await)
}

#[axum::debug_handler]
pub async fn available_slots(
    State(service): State<BookingState>,
    Query(params): Query<SlotsQuery>,
) -> Result<Json<AvailableSlotsResponse>, AppError> {
    let response = service.available_slots(&params.provider_id, params.date).await?;
    Ok(Json(response))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(service): State<BookingState>,
    AuthUser(user): AuthUser,
    Query(params): Query<AppointmentListParams>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let query = params.into_query()?;
    Ok(Json(service.list_appointments(&user, &query).await))
}

#[axum::debug_handler]
pub async fn appointment_summary(
    State(service): State<BookingState>,
    AuthUser(user): AuthUser,
) -> Json<AppointmentSummary> {
    Json(service.summary(&user).await)
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(service): State<BookingState>,
    AuthUser(user): AuthUser,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<AppointmentView>, AppError> {
    Ok(Json(service.get_appointment(&user, appointment_id).await?))
}

#[axum::debug_handler]
pub async fn direct_book(
    State(service): State<BookingState>,
    AuthUser(user): AuthUser,
    Json(request): Json<DirectBookingRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let appointment = service.direct_book(&user, request).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

#[axum::debug_handler]
pub async fn apply_action(
    State(service): State<BookingState>,
    AuthUser(user): AuthUser,
    Path(appointment_id): Path<Uuid>,
    Json(action): Json<LifecycleAction>,
) -> Result<Json<AppointmentView>, AppError> {
    Ok(Json(service.apply_action(&user, appointment_id, action).await?))
}

// ==============================================================================
// WIZARD HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn open_wizard(
    State(service): State<BookingState>,
    AuthUser(user): AuthUser,
    Json(request): Json<OpenWizardRequest>,
) -> Result<(StatusCode, Json<WizardSessionView>), AppError> {
    let view = service.open_wizard(&user, request).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[axum::debug_handler]
pub async fn get_wizard(
    State(service): State<BookingState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<WizardSessionView>, AppError> {
    Ok(Json(service.wizard_session(&user, session_id).await?))
}

#[axum::debug_handler]
pub async fn update_wizard(
    State(service): State<BookingState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
    Json(update): Json<WizardUpdate>,
) -> Result<Json<WizardSessionView>, AppError> {
    Ok(Json(service.update_wizard(&user, session_id, update).await?))
}

#[axum::debug_handler]
pub async fn wizard_next(
    State(service): State<BookingState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<WizardSessionView>, AppError> {
    Ok(Json(service.advance_wizard(&user, session_id).await?))
}

#[axum::debug_handler]
pub async fn wizard_back(
    State(service): State<BookingState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<WizardSessionView>, AppError> {
    Ok(Json(service.wizard_back(&user, session_id).await?))
}

#[axum::debug_handler]
pub async fn submit_wizard(
    State(service): State<BookingState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let appointment = service.submit_wizard(&user, session_id).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_wizard(
    State(service): State<BookingState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    service.cancel_wizard(&user, session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
