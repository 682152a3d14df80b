// libs/appointment-cell/src/services/wizard.rs
//
// Three-step booking flow: service, then provider/date/time, then
// confirmation. The wizard only orchestrates over the snapshot handed to it;
// persisting the emitted event is the caller's job.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Serializer};
use tracing::{debug, info};
use uuid::Uuid;

use doctor_cell::models::Provider;
use shared_config::{BookingPolicy, ClinicHours, PatientOverlapPolicy};
use shared_models::error::FieldError;

use crate::models::{
    ActionKind, Appointment, AppointmentError, AppointmentNote, AppointmentStatus, BookingOrigin,
    ConflictKind, EntityKind, PatientRef, Service, SlotTime, TimeSlot, Urgency,
};
use crate::services::availability::{patient_has_overlap, AvailabilityFilter};
use crate::services::lifecycle::AppointmentLifecycleService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WizardStep {
    SelectService = 1,
    SelectProviderDateTime = 2,
    Confirm = 3,
}

impl WizardStep {
    pub fn number(&self) -> u8 {
        *self as u8
    }

    fn previous(&self) -> Option<WizardStep> {
        match self {
            WizardStep::SelectService => None,
            WizardStep::SelectProviderDateTime => Some(WizardStep::SelectService),
            WizardStep::Confirm => Some(WizardStep::SelectProviderDateTime),
        }
    }
}

impl Serialize for WizardStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.number())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WizardMode {
    Book,
    Reschedule { appointment_id: Uuid },
}

/// Unsaved state of one wizard session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingDraft {
    pub step: WizardStep,
    pub service_id: Option<String>,
    pub provider_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub time_slot: Option<SlotTime>,
    pub notes: String,
}

impl Default for BookingDraft {
    fn default() -> Self {
        Self {
            step: WizardStep::SelectService,
            service_id: None,
            provider_id: None,
            date: None,
            time_slot: None,
            notes: String::new(),
        }
    }
}

/// Snapshot of everything the wizard consults.
#[derive(Debug, Clone, Copy)]
pub struct WizardContext<'a> {
    pub services: &'a [Service],
    pub providers: &'a [Provider],
    pub appointments: &'a [Appointment],
    pub hours: &'a ClinicHours,
    pub policy: BookingPolicy,
    pub now: DateTime<Utc>,
    /// Clinic-local calendar date used for bookability.
    pub today: NaiveDate,
}

impl<'a> WizardContext<'a> {
    pub fn today(&self) -> NaiveDate {
        self.today
    }

    fn filter(&self) -> AvailabilityFilter {
        AvailabilityFilter::new(self.hours)
    }

    fn service(&self, service_id: &str) -> Result<&'a Service, AppointmentError> {
        self.services
            .iter()
            .find(|s| s.id == service_id)
            .ok_or_else(|| AppointmentError::not_found(EntityKind::Service, service_id))
    }

    fn provider(&self, provider_id: &str) -> Result<&'a Provider, AppointmentError> {
        self.providers
            .iter()
            .find(|p| p.id == provider_id)
            .ok_or_else(|| AppointmentError::not_found(EntityKind::Provider, provider_id))
    }

    fn appointment(&self, appointment_id: Uuid) -> Result<&'a Appointment, AppointmentError> {
        self.appointments
            .iter()
            .find(|a| a.id == appointment_id)
            .ok_or_else(|| AppointmentError::not_found(EntityKind::Appointment, appointment_id.to_string()))
    }
}

/// The single event a successful submit emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "appointment", rename_all = "snake_case")]
pub enum BookingEvent {
    Created(Appointment),
    Rescheduled(Appointment),
}

impl BookingEvent {
    pub fn appointment(&self) -> &Appointment {
        match self {
            BookingEvent::Created(a) | BookingEvent::Rescheduled(a) => a,
        }
    }

    pub fn into_appointment(self) -> Appointment {
        match self {
            BookingEvent::Created(a) | BookingEvent::Rescheduled(a) => a,
        }
    }
}

struct ScheduleChoice<'a> {
    provider: &'a Provider,
    date: NaiveDate,
    slot: SlotTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingWizard {
    mode: WizardMode,
    /// `None` once the wizard is closed.
    draft: Option<BookingDraft>,
}

impl Default for BookingWizard {
    fn default() -> Self {
        Self::open()
    }
}

impl BookingWizard {
    pub fn open() -> Self {
        Self {
            mode: WizardMode::Book,
            draft: Some(BookingDraft::default()),
        }
    }

    /// Opens the wizard to move an existing appointment. Service and provider
    /// are pre-filled; only cancelled and no-show appointments qualify.
    pub fn open_reschedule(appointment: &Appointment) -> Result<Self, AppointmentError> {
        AppointmentLifecycleService::new().next_status(appointment.status, ActionKind::Reschedule)?;

        Ok(Self {
            mode: WizardMode::Reschedule {
                appointment_id: appointment.id,
            },
            draft: Some(BookingDraft {
                service_id: Some(appointment.service_id.clone()),
                provider_id: Some(appointment.provider_id.clone()),
                ..BookingDraft::default()
            }),
        })
    }

    pub fn mode(&self) -> WizardMode {
        self.mode
    }

    pub fn draft(&self) -> Option<&BookingDraft> {
        self.draft.as_ref()
    }

    pub fn step(&self) -> Option<WizardStep> {
        self.draft.as_ref().map(|d| d.step)
    }

    pub fn is_closed(&self) -> bool {
        self.draft.is_none()
    }

    fn draft_mut(&mut self, action: &str) -> Result<&mut BookingDraft, AppointmentError> {
        self.draft
            .as_mut()
            .ok_or_else(|| AppointmentError::invalid_transition("closed", action))
    }

    fn draft_on_step(
        &mut self,
        step: WizardStep,
        field: &str,
    ) -> Result<&mut BookingDraft, AppointmentError> {
        let draft = self.draft_mut(&format!("set {}", field))?;
        if draft.step != step {
            return Err(AppointmentError::field(
                field,
                format!("can only be changed on step {}", step.number()),
            ));
        }
        Ok(draft)
    }

    pub fn select_service(&mut self, service_id: &str) -> Result<(), AppointmentError> {
        let service_id = required(service_id, "service_id")?;
        let draft = self.draft_on_step(WizardStep::SelectService, "service_id")?;
        draft.service_id = Some(service_id);
        Ok(())
    }

    pub fn select_provider(&mut self, provider_id: &str) -> Result<(), AppointmentError> {
        let provider_id = required(provider_id, "provider_id")?;
        let draft = self.draft_on_step(WizardStep::SelectProviderDateTime, "provider_id")?;
        draft.provider_id = Some(provider_id);
        Ok(())
    }

    pub fn select_date(&mut self, date: NaiveDate) -> Result<(), AppointmentError> {
        let draft = self.draft_on_step(WizardStep::SelectProviderDateTime, "date")?;
        draft.date = Some(date);
        Ok(())
    }

    pub fn select_slot(&mut self, slot: SlotTime) -> Result<(), AppointmentError> {
        let draft = self.draft_on_step(WizardStep::SelectProviderDateTime, "time_slot")?;
        draft.time_slot = Some(slot);
        Ok(())
    }

    pub fn set_notes(&mut self, notes: &str) -> Result<(), AppointmentError> {
        let draft = self.draft_mut("set notes")?;
        draft.notes = notes.to_string();
        Ok(())
    }

    /// Advances one step once the current step's gate passes.
    pub fn next(&mut self, ctx: &WizardContext<'_>) -> Result<WizardStep, AppointmentError> {
        let exclude = self.rescheduled_id();
        let draft = self.draft_mut("advance")?;

        let next = match draft.step {
            WizardStep::SelectService => {
                check_service_step(draft, ctx)?;
                WizardStep::SelectProviderDateTime
            }
            WizardStep::SelectProviderDateTime => {
                let choice = check_schedule_step(draft, ctx)?;
                let free = ctx.filter().is_slot_free(
                    &choice.provider.id,
                    choice.date,
                    choice.slot,
                    ctx.appointments,
                    exclude,
                );
                if !free {
                    return Err(AppointmentError::field("time_slot", "This slot is already booked"));
                }
                WizardStep::Confirm
            }
            WizardStep::Confirm => {
                return Err(AppointmentError::invalid_transition("on step 3", "advance past confirmation"));
            }
        };

        debug!("Wizard advanced from step {} to {}", draft.step.number(), next.number());
        draft.step = next;
        Ok(next)
    }

    /// Runs the provider/date/time gate without checking whether the slot is
    /// still free. Only meaningful on step 2.
    pub fn check_schedule(&self, ctx: &WizardContext<'_>) -> Result<(), AppointmentError> {
        let draft = self
            .draft
            .as_ref()
            .ok_or_else(|| AppointmentError::invalid_transition("closed", "check schedule"))?;
        if draft.step != WizardStep::SelectProviderDateTime {
            return Err(AppointmentError::invalid_transition(
                format!("on step {}", draft.step.number()),
                "check schedule",
            ));
        }
        check_schedule_step(draft, ctx).map(|_| ())
    }

    /// Goes back one step. Entered fields are kept.
    pub fn back(&mut self) -> Result<WizardStep, AppointmentError> {
        let draft = self.draft_mut("back")?;
        let previous = draft
            .step
            .previous()
            .ok_or_else(|| AppointmentError::invalid_transition("on step 1", "go back"))?;
        draft.step = previous;
        Ok(previous)
    }

    /// Discards the draft. Cancelling a closed wizard is a no-op.
    pub fn cancel(&mut self) {
        if self.draft.take().is_some() {
            debug!("Wizard cancelled, draft discarded");
        }
    }

    /// Starts over with an empty draft in booking mode.
    pub fn reopen(&mut self) {
        *self = Self::open();
    }

    /// After a lost race: back to step 2 without the taken slot.
    pub fn return_to_slot_selection(&mut self) {
        if let Some(draft) = self.draft.as_mut() {
            draft.step = WizardStep::SelectProviderDateTime;
            draft.time_slot = None;
        }
    }

    /// Free slots for the provider and date currently in the draft.
    pub fn available_slots(&self, ctx: &WizardContext<'_>) -> Vec<SlotTime> {
        let Some(draft) = self.draft.as_ref() else {
            return Vec::new();
        };
        let (Some(provider_id), Some(date)) = (&draft.provider_id, draft.date) else {
            return Vec::new();
        };
        match ctx.provider(provider_id) {
            Ok(provider) if provider.available => ctx.filter().available_slots(
                &provider.id,
                date,
                ctx.today(),
                ctx.appointments,
                self.rescheduled_id(),
            ),
            _ => Vec::new(),
        }
    }

    /// Confirms the draft. Every gate is re-run against `ctx`; a slot taken
    /// since it was picked is an `AvailabilityConflict`. On success the
    /// wizard closes and exactly one event is returned.
    pub fn submit(
        &mut self,
        ctx: &WizardContext<'_>,
        patient: &PatientRef,
    ) -> Result<BookingEvent, AppointmentError> {
        let mode = self.mode;
        let draft = self.draft_mut("submit")?;

        if draft.step != WizardStep::Confirm {
            return Err(AppointmentError::invalid_transition(
                format!("on step {}", draft.step.number()),
                "submit",
            ));
        }

        let service = check_service_step(draft, ctx)?;
        let choice = check_schedule_step(draft, ctx)?;
        let slot = TimeSlot::new(choice.date, choice.slot, ctx.hours.step_minutes);

        let event = match mode {
            WizardMode::Book => {
                let appointment = new_appointment(patient, service, choice.provider, slot, &draft.notes, ctx.now);
                ensure_claimable(&appointment, ctx, None)?;
                BookingEvent::Created(appointment)
            }
            WizardMode::Reschedule { appointment_id } => {
                let existing = ctx.appointment(appointment_id)?;
                let moved = AppointmentLifecycleService::new().reschedule(
                    existing,
                    service,
                    &choice.provider.id,
                    slot,
                    ctx.now,
                )?;
                ensure_claimable(&moved, ctx, Some(appointment_id))?;
                BookingEvent::Rescheduled(moved)
            }
        };

        info!(
            "Wizard submitted: appointment {} with {} at {}",
            event.appointment().id,
            event.appointment().provider_id,
            event.appointment().scheduled_at
        );
        self.draft = None;
        Ok(event)
    }

    fn rescheduled_id(&self) -> Option<Uuid> {
        match self.mode {
            WizardMode::Book => None,
            WizardMode::Reschedule { appointment_id } => Some(appointment_id),
        }
    }
}

fn required(value: &str, field: &str) -> Result<String, AppointmentError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppointmentError::field(field, "is required"));
    }
    Ok(trimmed.to_string())
}

fn check_service_step<'a>(
    draft: &BookingDraft,
    ctx: &WizardContext<'a>,
) -> Result<&'a Service, AppointmentError> {
    let service_id = draft
        .service_id
        .as_deref()
        .ok_or_else(|| AppointmentError::field("service_id", "is required"))?;
    ctx.service(service_id)
}

fn check_schedule_step<'a>(
    draft: &BookingDraft,
    ctx: &WizardContext<'a>,
) -> Result<ScheduleChoice<'a>, AppointmentError> {
    let mut fields = Vec::new();
    let missing = |name: &str| FieldError {
        field: name.to_string(),
        message: "is required".to_string(),
    };

    if draft.provider_id.is_none() {
        fields.push(missing("provider_id"));
    }
    if draft.date.is_none() {
        fields.push(missing("date"));
    }
    if draft.time_slot.is_none() {
        fields.push(missing("time_slot"));
    }

    let (Some(provider_id), Some(date), Some(slot)) = (&draft.provider_id, draft.date, draft.time_slot) else {
        return Err(AppointmentError::Validation { fields });
    };

    let provider = ctx.provider(provider_id)?;
    let filter = ctx.filter();

    if !provider.available {
        fields.push(FieldError {
            field: "provider_id".to_string(),
            message: format!("{} is not accepting appointments", provider.name),
        });
    }
    if !filter.is_bookable_date(date, ctx.today()) {
        fields.push(FieldError {
            field: "date".to_string(),
            message: format!(
                "must be a weekday within {} days from today",
                filter.horizon_days()
            ),
        });
    }
    if !filter.generator().contains(slot) {
        fields.push(FieldError {
            field: "time_slot".to_string(),
            message: "is not a clinic slot".to_string(),
        });
    }

    if !fields.is_empty() {
        return Err(AppointmentError::Validation { fields });
    }

    Ok(ScheduleChoice { provider, date, slot })
}

fn ensure_claimable(
    appointment: &Appointment,
    ctx: &WizardContext<'_>,
    exclude: Option<Uuid>,
) -> Result<(), AppointmentError> {
    SubmitValidator::new(ctx.hours, ctx.policy).check(appointment, ctx.appointments, exclude)
}

fn new_appointment(
    patient: &PatientRef,
    service: &Service,
    provider: &Provider,
    slot: TimeSlot,
    notes: &str,
    now: DateTime<Utc>,
) -> Appointment {
    let notes = match notes.trim() {
        "" => Vec::new(),
        text => vec![AppointmentNote {
            text: text.to_string(),
            author_id: patient.id.clone(),
            added_at: now,
        }],
    };

    Appointment {
        id: Uuid::new_v4(),
        patient_id: patient.id.clone(),
        patient_name: patient.name.clone(),
        provider_id: provider.id.clone(),
        service_id: service.id.clone(),
        service_name: service.name.clone(),
        scheduled_at: slot,
        status: AppointmentStatus::Waiting,
        urgency: Urgency::Normal,
        origin: BookingOrigin::Wizard,
        reschedule_count: 0,
        notes,
        status_history: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

/// Final claim check run immediately before an appointment is written:
/// slot still free for the provider and, under the reject policy, the
/// patient not already booked elsewhere at that time.
#[derive(Debug, Clone, Copy)]
pub struct SubmitValidator {
    filter: AvailabilityFilter,
    policy: BookingPolicy,
}

impl SubmitValidator {
    pub fn new(hours: &ClinicHours, policy: BookingPolicy) -> Self {
        Self {
            filter: AvailabilityFilter::new(hours),
            policy,
        }
    }

    pub fn check(
        &self,
        candidate: &Appointment,
        existing: &[Appointment],
        exclude: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        let date = candidate.scheduled_at.date;
        let slot = candidate.scheduled_at.start;

        self.filter
            .ensure_slot_free(&candidate.provider_id, date, slot, existing, exclude)?;

        if self.policy.patient_overlap == PatientOverlapPolicy::Reject
            && patient_has_overlap(&candidate.patient_id, date, slot, existing, exclude)
        {
            return Err(AppointmentError::AvailabilityConflict {
                kind: ConflictKind::PatientDoubleBooked,
                provider_id: candidate.provider_id.clone(),
                date,
                slot,
            });
        }

        Ok(())
    }
}
