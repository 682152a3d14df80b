// libs/appointment-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use shared_models::error::FieldError;

// ==============================================================================
// CATALOG MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub duration_minutes: u32,
    pub description: String,
}

impl Service {
    pub fn new(id: &str, name: &str, duration_minutes: u32, description: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            duration_minutes,
            description: description.to_string(),
        }
    }
}

/// Identity of the patient an appointment is booked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRef {
    pub id: String,
    pub name: String,
}

impl PatientRef {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

// ==============================================================================
// SLOT MODELS
// ==============================================================================

/// Start time of a slot, always rendered as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime(NaiveTime);

impl SlotTime {
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(SlotTime)
    }

    pub fn minutes_since_midnight(&self) -> u32 {
        self.0.hour() * 60 + self.0.minute()
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl FromStr for SlotTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // chrono accepts single-digit hours; labels are always two digits
        if trimmed.len() != 5 {
            return Err(format!("invalid slot label: {:?}", s));
        }
        NaiveTime::parse_from_str(trimmed, "%H:%M")
            .map(SlotTime)
            .map_err(|_| format!("invalid slot label: {:?}", s))
    }
}

impl Serialize for SlotTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A bookable `(date, start)` pair of fixed length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    pub date: NaiveDate,
    pub start: SlotTime,
    pub duration_minutes: u32,
}

impl TimeSlot {
    pub fn new(date: NaiveDate, start: SlotTime, duration_minutes: u32) -> Self {
        Self {
            date,
            start,
            duration_minutes,
        }
    }

    pub fn same_pair(&self, date: NaiveDate, start: SlotTime) -> bool {
        self.date == date && self.start == start
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.start)
    }
}

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Waiting,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 5] = [
        AppointmentStatus::Waiting,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ];

    /// Whether an appointment in this status holds its slot.
    pub fn is_occupying(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Waiting | AppointmentStatus::InProgress | AppointmentStatus::Completed
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Waiting => write!(f, "waiting"),
            AppointmentStatus::InProgress => write!(f, "in-progress"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no-show"),
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "waiting" => Ok(AppointmentStatus::Waiting),
            "in-progress" => Ok(AppointmentStatus::InProgress),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "no-show" => Ok(AppointmentStatus::NoShow),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    #[default]
    Normal,
    Urgent,
}

/// How the appointment reached its current slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingOrigin {
    Wizard,
    Direct,
    Rescheduled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentNote {
    pub text: String,
    pub author_id: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: AppointmentStatus,
    pub to: AppointmentStatus,
    pub action: ActionKind,
    pub at: DateTime<Utc>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: String,
    pub patient_name: String,
    pub provider_id: String,
    pub service_id: String,
    pub service_name: String,
    pub scheduled_at: TimeSlot,
    pub status: AppointmentStatus,
    pub urgency: Urgency,
    pub origin: BookingOrigin,
    pub reschedule_count: u32,
    pub notes: Vec<AppointmentNote>,
    pub status_history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn occupies(&self, provider_id: &str, date: NaiveDate, start: SlotTime) -> bool {
        self.status.is_occupying()
            && self.provider_id == provider_id
            && self.scheduled_at.same_pair(date, start)
    }
}

// ==============================================================================
// LIFECYCLE ACTION MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    Start,
    Complete,
    Cancel,
    MarkNoShow,
    AddNote,
    Reschedule,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Start => write!(f, "start"),
            ActionKind::Complete => write!(f, "complete"),
            ActionKind::Cancel => write!(f, "cancel"),
            ActionKind::MarkNoShow => write!(f, "mark-no-show"),
            ActionKind::AddNote => write!(f, "add-note"),
            ActionKind::Reschedule => write!(f, "reschedule"),
        }
    }
}

/// A status-changing or annotating request against an existing appointment.
/// Rescheduling goes through the booking wizard instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum LifecycleAction {
    Start,
    Complete,
    Cancel { reason: Option<String> },
    MarkNoShow,
    AddNote { text: String },
}

impl LifecycleAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            LifecycleAction::Start => ActionKind::Start,
            LifecycleAction::Complete => ActionKind::Complete,
            LifecycleAction::Cancel { .. } => ActionKind::Cancel,
            LifecycleAction::MarkNoShow => ActionKind::MarkNoShow,
            LifecycleAction::AddNote { .. } => ActionKind::AddNote,
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Secretary booking straight into the schedule, bypassing the wizard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectBookingRequest {
    pub patient: PatientRef,
    pub provider_id: String,
    pub service_id: String,
    pub date: NaiveDate,
    pub time_slot: SlotTime,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub notes: String,
}

/// Body of `POST /wizard`. Without a patient the caller books for themself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenWizardRequest {
    #[serde(default)]
    pub reschedule_appointment_id: Option<Uuid>,
    #[serde(default)]
    pub patient: Option<PatientRef>,
}

/// Fields to set on the current wizard step. Absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WizardUpdate {
    pub service_id: Option<String>,
    pub provider_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub time_slot: Option<SlotTime>,
    pub notes: Option<String>,
}

/// An appointment together with what the caller may do with it next.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub allowed_actions: Vec<ActionKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlotsResponse {
    pub provider_id: String,
    pub date: NaiveDate,
    pub bookable_date: bool,
    pub slots: Vec<SlotTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentSummary {
    pub total: usize,
    pub waiting: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub no_show: usize,
    pub urgent_open: usize,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Appointment,
    Provider,
    Service,
    WizardSession,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Appointment => write!(f, "Appointment"),
            EntityKind::Provider => write!(f, "Provider"),
            EntityKind::Service => write!(f, "Service"),
            EntityKind::WizardSession => write!(f, "Wizard session"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    SlotTaken,
    PatientDoubleBooked,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::SlotTaken => write!(f, "slot no longer available"),
            ConflictKind::PatientDoubleBooked => write!(f, "patient already booked at this time"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Validation failed: {}", describe_fields(.fields))]
    Validation { fields: Vec<FieldError> },

    #[error("{kind}: {provider_id} on {date} at {slot}")]
    AvailabilityConflict {
        kind: ConflictKind,
        provider_id: String,
        date: NaiveDate,
        slot: SlotTime,
    },

    #[error("Cannot {action} while {state}")]
    InvalidTransition { state: String, action: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Not authorized: {0}")]
    Unauthorized(String),
}

impl AppointmentError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        AppointmentError::Validation {
            fields: vec![FieldError {
                field: field.to_string(),
                message: message.into(),
            }],
        }
    }

    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        AppointmentError::NotFound { kind, id: id.into() }
    }

    pub fn invalid_transition(state: impl fmt::Display, action: impl fmt::Display) -> Self {
        AppointmentError::InvalidTransition {
            state: state.to_string(),
            action: action.to_string(),
        }
    }
}

impl From<doctor_cell::models::DirectoryError> for AppointmentError {
    fn from(e: doctor_cell::models::DirectoryError) -> Self {
        match e {
            doctor_cell::models::DirectoryError::ProviderNotFound(id) => {
                AppointmentError::not_found(EntityKind::Provider, id)
            }
        }
    }
}

fn describe_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}
