// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::models::Provider;
use doctor_cell::services::ProviderDirectory;
use shared_config::{AppConfig, BookingPolicy, ClinicHours};
use shared_models::auth::{Capability, CurrentUser};

use crate::models::{
    ActionKind, Appointment, AppointmentError, AppointmentSummary, AppointmentView,
    AvailableSlotsResponse, BookingOrigin, DirectBookingRequest, LifecycleAction, OpenWizardRequest,
    PatientRef, Service, SlotTime, WizardUpdate,
};
use crate::services::availability::AvailabilityFilter;
use crate::services::catalog::ServiceCatalog;
use crate::services::clock::Clock;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::query::{self, AppointmentQuery};
use crate::services::sessions::{WizardSession, WizardSessions};
use crate::services::store::AppointmentStore;
use crate::services::wizard::{BookingEvent, BookingWizard, SubmitValidator, WizardContext, WizardStep};

/// A wizard session plus the slot list for its current provider and date.
#[derive(Debug, Clone, Serialize)]
pub struct WizardSessionView {
    #[serde(flatten)]
    pub session: WizardSession,
    pub step: Option<WizardStep>,
    pub available_slots: Vec<SlotTime>,
}

/// Everything one operation reads, taken once at its start.
struct Snapshot {
    services: Vec<Service>,
    providers: Vec<Provider>,
    appointments: Vec<Appointment>,
    now: DateTime<Utc>,
    today: NaiveDate,
}

pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    catalog: Arc<dyn ServiceCatalog>,
    directory: Arc<dyn ProviderDirectory>,
    clock: Arc<dyn Clock>,
    sessions: WizardSessions,
    lifecycle_service: AppointmentLifecycleService,
    clinic_hours: ClinicHours,
    booking_policy: BookingPolicy,
}

impl AppointmentBookingService {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn AppointmentStore>,
        catalog: Arc<dyn ServiceCatalog>,
        directory: Arc<dyn ProviderDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            catalog,
            directory,
            clock,
            sessions: WizardSessions::new(Duration::minutes(config.wizard_session_ttl_minutes)),
            lifecycle_service: AppointmentLifecycleService::new(),
            clinic_hours: config.clinic_hours,
            booking_policy: config.booking_policy,
        }
    }

    pub fn clinic_hours(&self) -> &ClinicHours {
        &self.clinic_hours
    }

    async fn snapshot(&self) -> Snapshot {
        Snapshot {
            services: self.catalog.list_services().await,
            providers: self.directory.list_providers().await,
            appointments: self.store.snapshot().await,
            now: self.clock.now(),
            today: self.clock.today(),
        }
    }

    fn context<'a>(&'a self, snapshot: &'a Snapshot) -> WizardContext<'a> {
        WizardContext {
            services: &snapshot.services,
            providers: &snapshot.providers,
            appointments: &snapshot.appointments,
            hours: &self.clinic_hours,
            policy: self.booking_policy,
            now: snapshot.now,
            today: snapshot.today,
        }
    }

    fn validator(&self) -> SubmitValidator {
        SubmitValidator::new(&self.clinic_hours, self.booking_policy)
    }

    pub async fn list_services(&self) -> Vec<Service> {
        self.catalog.list_services().await
    }

    /// Refreshed slot list for one provider and date.
    pub async fn available_slots(
        &self,
        provider_id: &str,
        date: NaiveDate,
    ) -> Result<AvailableSlotsResponse, AppointmentError> {
        let provider = self.directory.get_provider(provider_id).await?;
        let filter = AvailabilityFilter::new(&self.clinic_hours);
        let today = self.clock.today();
        let bookable_date = filter.is_bookable_date(date, today);

        let slots = if provider.available {
            let appointments = self.store.snapshot().await;
            filter.available_slots(&provider.id, date, today, &appointments, None)
        } else {
            Vec::new()
        };

        debug!("{} free slots for {} on {}", slots.len(), provider_id, date);
        Ok(AvailableSlotsResponse {
            provider_id: provider.id,
            date,
            bookable_date,
            slots,
        })
    }

    // ==========================================================================
    // WIZARD SESSIONS
    // ==========================================================================

    pub async fn open_wizard(
        &self,
        user: &CurrentUser,
        request: OpenWizardRequest,
    ) -> Result<WizardSessionView, AppointmentError> {
        let (wizard, patient) = match request.reschedule_appointment_id {
            Some(appointment_id) => {
                let appointment = self.store.get(appointment_id).await?;
                authorize(user, &appointment, ActionKind::Reschedule)?;
                let wizard = BookingWizard::open_reschedule(&appointment)?;
                let patient = PatientRef::new(&appointment.patient_id, &appointment.patient_name);
                (wizard, patient)
            }
            None => (BookingWizard::open(), resolve_patient(user, request.patient)?),
        };

        let session = self
            .sessions
            .insert(&user.id, patient, wizard, self.clock.now())
            .await;
        info!("Booking wizard {} opened by {} for {}", session.id, user.id, session.patient.id);
        Ok(self.view(session).await)
    }

    pub async fn wizard_session(
        &self,
        user: &CurrentUser,
        session_id: Uuid,
    ) -> Result<WizardSessionView, AppointmentError> {
        let session = self.sessions.get(session_id, &user.id).await?;
        Ok(self.view(session).await)
    }

    /// Applies every present field or none of them.
    pub async fn update_wizard(
        &self,
        user: &CurrentUser,
        session_id: Uuid,
        update: WizardUpdate,
    ) -> Result<WizardSessionView, AppointmentError> {
        let session = self.sessions.get(session_id, &user.id).await?;
        let mut wizard = session.wizard;

        if let Some(service_id) = &update.service_id {
            wizard.select_service(service_id)?;
        }
        if let Some(provider_id) = &update.provider_id {
            wizard.select_provider(provider_id)?;
        }
        if let Some(date) = update.date {
            wizard.select_date(date)?;
        }
        if let Some(slot) = update.time_slot {
            wizard.select_slot(slot)?;
        }
        if let Some(notes) = &update.notes {
            wizard.set_notes(notes)?;
        }

        let session = self.sessions.save(session_id, &user.id, wizard).await?;
        Ok(self.view(session).await)
    }

    pub async fn advance_wizard(
        &self,
        user: &CurrentUser,
        session_id: Uuid,
    ) -> Result<WizardSessionView, AppointmentError> {
        let session = self.sessions.get(session_id, &user.id).await?;
        let snapshot = self.snapshot().await;
        let mut wizard = session.wizard;

        wizard.next(&self.context(&snapshot))?;

        let session = self.sessions.save(session_id, &user.id, wizard).await?;
        Ok(self.view(session).await)
    }

    pub async fn wizard_back(
        &self,
        user: &CurrentUser,
        session_id: Uuid,
    ) -> Result<WizardSessionView, AppointmentError> {
        let session = self.sessions.get(session_id, &user.id).await?;
        let mut wizard = session.wizard;

        wizard.back()?;

        let session = self.sessions.save(session_id, &user.id, wizard).await?;
        Ok(self.view(session).await)
    }

    /// Discards the session and its draft. Nothing else is touched.
    pub async fn cancel_wizard(&self, user: &CurrentUser, session_id: Uuid) -> Result<(), AppointmentError> {
        let mut session = self.sessions.remove(session_id, &user.id).await?;
        session.wizard.cancel();
        debug!("Booking wizard {} cancelled", session_id);
        Ok(())
    }

    /// Confirms the draft and commits it. When the slot was claimed in the
    /// meantime the session is sent back to slot selection and the conflict
    /// is returned.
    pub async fn submit_wizard(
        &self,
        user: &CurrentUser,
        session_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let session = self.sessions.get(session_id, &user.id).await?;
        let snapshot = self.snapshot().await;
        let mut wizard = session.wizard.clone();

        let result = match wizard.submit(&self.context(&snapshot), &session.patient) {
            Ok(event) => self.store.commit(event, &self.validator()).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(appointment) => {
                self.sessions.remove(session_id, &user.id).await?;
                Ok(appointment)
            }
            Err(e @ AppointmentError::AvailabilityConflict { .. }) => {
                warn!("Booking wizard {} lost its slot: {}", session_id, e);
                let mut wizard = session.wizard;
                wizard.return_to_slot_selection();
                self.sessions.save(session_id, &user.id, wizard).await?;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn view(&self, session: WizardSession) -> WizardSessionView {
        let step = session.wizard.step();
        let available_slots = if step == Some(WizardStep::SelectProviderDateTime) {
            let snapshot = self.snapshot().await;
            session.wizard.available_slots(&self.context(&snapshot))
        } else {
            Vec::new()
        };

        WizardSessionView {
            session,
            step,
            available_slots,
        }
    }

    // ==========================================================================
    // DIRECT BOOKING
    // ==========================================================================

    /// Books straight into the schedule on a patient's behalf. The same gates
    /// as the wizard apply; a taken slot is reported as a conflict.
    pub async fn direct_book(
        &self,
        user: &CurrentUser,
        request: DirectBookingRequest,
    ) -> Result<Appointment, AppointmentError> {
        if !user.has_capability(Capability::BookForOthers) {
            return Err(AppointmentError::Unauthorized(format!(
                "{} may not book appointments for other patients",
                user.id
            )));
        }

        let snapshot = self.snapshot().await;
        let ctx = self.context(&snapshot);

        let mut wizard = BookingWizard::open();
        wizard.select_service(&request.service_id)?;
        wizard.next(&ctx)?;
        wizard.select_provider(&request.provider_id)?;
        wizard.select_date(request.date)?;
        wizard.select_slot(request.time_slot)?;
        wizard.set_notes(&request.notes)?;

        // gates first so a bad field is never reported as a conflict
        wizard.check_schedule(&ctx)?;
        AvailabilityFilter::new(&self.clinic_hours).ensure_slot_free(
            &request.provider_id,
            request.date,
            request.time_slot,
            &snapshot.appointments,
            None,
        )?;
        wizard.next(&ctx)?;

        let mut appointment = wizard.submit(&ctx, &request.patient)?.into_appointment();
        appointment.urgency = request.urgency;
        appointment.origin = BookingOrigin::Direct;
        for note in appointment.notes.iter_mut() {
            note.author_id = user.id.clone();
        }

        let appointment = self
            .store
            .commit(BookingEvent::Created(appointment), &self.validator())
            .await?;
        info!("Direct booking {} by {} for {}", appointment.id, user.id, appointment.patient_id);
        Ok(appointment)
    }

    // ==========================================================================
    // LIFECYCLE
    // ==========================================================================

    pub async fn apply_action(
        &self,
        user: &CurrentUser,
        appointment_id: Uuid,
        action: LifecycleAction,
    ) -> Result<AppointmentView, AppointmentError> {
        let current = self.store.get(appointment_id).await?;
        authorize(user, &current, action.kind())?;

        let lifecycle = self.lifecycle_service;
        let actor_id = user.id.clone();
        let now = self.clock.now();
        let updated = self
            .store
            .update(
                appointment_id,
                Box::new(move |stored: &Appointment| lifecycle.apply(stored, &action, &actor_id, now)),
            )
            .await?;

        Ok(self.view_appointment(user, updated))
    }

    /// Action kinds `user` may take on `appointment` right now.
    pub fn allowed_actions(&self, user: &CurrentUser, appointment: &Appointment) -> Vec<ActionKind> {
        self.lifecycle_service
            .allowed_actions(appointment.status)
            .iter()
            .copied()
            .filter(|kind| authorize(user, appointment, *kind).is_ok())
            .collect()
    }

    fn view_appointment(&self, user: &CurrentUser, appointment: Appointment) -> AppointmentView {
        AppointmentView {
            allowed_actions: self.allowed_actions(user, &appointment),
            appointment,
        }
    }

    // ==========================================================================
    // QUERIES
    // ==========================================================================

    pub async fn get_appointment(
        &self,
        user: &CurrentUser,
        appointment_id: Uuid,
    ) -> Result<AppointmentView, AppointmentError> {
        let appointment = self.store.get(appointment_id).await?;
        if !can_view(user, &appointment) {
            return Err(AppointmentError::Unauthorized(format!(
                "{} may not view appointment {}",
                user.id, appointment_id
            )));
        }
        Ok(self.view_appointment(user, appointment))
    }

    pub async fn list_appointments(&self, user: &CurrentUser, filter: &AppointmentQuery) -> Vec<Appointment> {
        let appointments = self.store.snapshot().await;
        let visible: Vec<Appointment> = query::visible_to(user, &appointments)
            .into_iter()
            .cloned()
            .collect();
        query::query(&visible, filter)
    }

    pub async fn summary(&self, user: &CurrentUser) -> AppointmentSummary {
        let appointments = self.store.snapshot().await;
        let visible: Vec<Appointment> = query::visible_to(user, &appointments)
            .into_iter()
            .cloned()
            .collect();
        query::summarize(&visible)
    }
}

fn can_view(user: &CurrentUser, appointment: &Appointment) -> bool {
    user.has_capability(Capability::ViewAllAppointments) || appointment.patient_id == user.id
}

fn resolve_patient(user: &CurrentUser, patient: Option<PatientRef>) -> Result<PatientRef, AppointmentError> {
    match patient {
        Some(patient) if patient.id != user.id => {
            if !user.has_capability(Capability::BookForOthers) {
                return Err(AppointmentError::Unauthorized(format!(
                    "{} may not book for patient {}",
                    user.id, patient.id
                )));
            }
            Ok(patient)
        }
        _ => {
            if !user.has_capability(Capability::BookForSelf) {
                return Err(AppointmentError::Unauthorized(format!(
                    "{} may not book appointments",
                    user.id
                )));
            }
            Ok(PatientRef::new(&user.id, &user.name))
        }
    }
}

/// Capability gate for one action on one appointment.
fn authorize(user: &CurrentUser, appointment: &Appointment, action: ActionKind) -> Result<(), AppointmentError> {
    let is_owner = appointment.patient_id == user.id;
    let allowed = match action {
        ActionKind::Start | ActionKind::Complete | ActionKind::MarkNoShow => {
            user.has_capability(Capability::ManageLifecycle)
        }
        ActionKind::Cancel => user.has_capability(Capability::CancelAppointment) && can_view(user, appointment),
        ActionKind::AddNote => user.has_capability(Capability::AnnotateAppointment),
        ActionKind::Reschedule => {
            user.has_capability(Capability::BookForOthers)
                || (is_owner && user.has_capability(Capability::BookForSelf))
        }
    };

    if allowed {
        Ok(())
    } else {
        Err(AppointmentError::Unauthorized(format!(
            "{} may not {} appointment {}",
            user.id, action, appointment.id
        )))
    }
}
