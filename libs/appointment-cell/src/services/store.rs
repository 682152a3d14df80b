// libs/appointment-cell/src/services/store.rs
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{ActionKind, Appointment, AppointmentError, EntityKind};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::wizard::{BookingEvent, SubmitValidator};

/// Change computed from the current stored value of one appointment.
pub type Mutation = Box<dyn FnOnce(&Appointment) -> Result<Appointment, AppointmentError> + Send>;

/// Holder of the appointment list. The scheduling rules never write to it
/// directly; they hand over an event or a mutation.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Current appointments in insertion order.
    async fn snapshot(&self) -> Vec<Appointment>;

    async fn get(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.snapshot()
            .await
            .into_iter()
            .find(|a| a.id == appointment_id)
            .ok_or_else(|| AppointmentError::not_found(EntityKind::Appointment, appointment_id.to_string()))
    }

    /// Persists a booking event. `validator` is re-run against the stored
    /// contents in the same critical section as the write, so of two
    /// commits for one slot only the first succeeds.
    async fn commit(
        &self,
        event: BookingEvent,
        validator: &SubmitValidator,
    ) -> Result<Appointment, AppointmentError>;

    /// Replaces one appointment with the result of `mutation`, applied to the
    /// stored value. Nothing is written when the mutation fails.
    async fn update(&self, appointment_id: Uuid, mutation: Mutation) -> Result<Appointment, AppointmentError>;
}

#[derive(Debug, Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<Vec<Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new(appointments: Vec<Appointment>) -> Self {
        Self {
            appointments: RwLock::new(appointments),
        }
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn snapshot(&self) -> Vec<Appointment> {
        self.appointments.read().await.clone()
    }

    async fn commit(
        &self,
        event: BookingEvent,
        validator: &SubmitValidator,
    ) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.write().await;

        match event {
            BookingEvent::Created(appointment) => {
                if appointments.iter().any(|a| a.id == appointment.id) {
                    warn!("Appointment {} already stored, refusing duplicate create", appointment.id);
                    return Err(AppointmentError::invalid_transition("already booked", "create"));
                }
                validator.check(&appointment, &appointments, None)?;

                info!("Appointment {} created for patient {}", appointment.id, appointment.patient_id);
                appointments.push(appointment.clone());
                Ok(appointment)
            }
            BookingEvent::Rescheduled(appointment) => {
                let index = appointments
                    .iter()
                    .position(|a| a.id == appointment.id)
                    .ok_or_else(|| {
                        AppointmentError::not_found(EntityKind::Appointment, appointment.id.to_string())
                    })?;

                // Someone may have rescheduled it first.
                let stored_status = appointments[index].status;
                AppointmentLifecycleService::new().next_status(stored_status, ActionKind::Reschedule)?;
                validator.check(&appointment, &appointments, Some(appointment.id))?;

                info!("Appointment {} moved to {}", appointment.id, appointment.scheduled_at);
                appointments[index] = appointment.clone();
                Ok(appointment)
            }
        }
    }

    async fn update(&self, appointment_id: Uuid, mutation: Mutation) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.write().await;
        let stored = appointments
            .iter_mut()
            .find(|a| a.id == appointment_id)
            .ok_or_else(|| AppointmentError::not_found(EntityKind::Appointment, appointment_id.to_string()))?;

        let updated = mutation(stored)?;
        debug!("Appointment {} updated ({})", appointment_id, updated.status);
        *stored = updated.clone();
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentStatus, ConflictKind, LifecycleAction};
    use crate::test_support::appointment_at;
    use shared_config::{BookingPolicy, ClinicHours};

    fn validator() -> SubmitValidator {
        SubmitValidator::new(&ClinicHours::default(), BookingPolicy::default())
    }

    #[tokio::test]
    async fn test_first_commit_wins() {
        let store = InMemoryAppointmentStore::default();
        let first = appointment_at("doc-1", "pat-1", "2024-06-10", "10:00");
        let second = appointment_at("doc-1", "pat-2", "2024-06-10", "10:00");

        let stored = store.commit(BookingEvent::Created(first.clone()), &validator()).await.unwrap();
        assert_eq!(stored.id, first.id);

        let err = store.commit(BookingEvent::Created(second), &validator()).await.unwrap_err();
        assert!(matches!(
            err,
            AppointmentError::AvailabilityConflict { kind: ConflictKind::SlotTaken, .. }
        ));
        assert_eq!(store.snapshot().await, vec![first]);
    }

    #[tokio::test]
    async fn test_duplicate_create_is_refused() {
        let store = InMemoryAppointmentStore::default();
        let appointment = appointment_at("doc-1", "pat-1", "2024-06-10", "10:00");
        store.commit(BookingEvent::Created(appointment.clone()), &validator()).await.unwrap();

        let mut moved = appointment.clone();
        moved.scheduled_at = appointment_at("doc-1", "pat-1", "2024-06-10", "11:00").scheduled_at;
        assert!(store.commit(BookingEvent::Created(moved), &validator()).await.is_err());
    }

    #[tokio::test]
    async fn test_reschedule_requires_stored_status_to_allow_it() {
        let mut cancelled = appointment_at("doc-1", "pat-1", "2024-06-10", "10:00");
        cancelled.status = AppointmentStatus::Cancelled;
        let store = InMemoryAppointmentStore::new(vec![cancelled.clone()]);

        let mut moved = cancelled.clone();
        moved.status = AppointmentStatus::Waiting;
        store.commit(BookingEvent::Rescheduled(moved.clone()), &validator()).await.unwrap();

        // a second, stale reschedule of the same appointment loses
        let err = store.commit(BookingEvent::Rescheduled(moved), &validator()).await.unwrap_err();
        assert!(matches!(err, AppointmentError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_update_applies_to_stored_value() {
        let appointment = appointment_at("doc-1", "pat-1", "2024-06-10", "10:00");
        let id = appointment.id;
        let store = InMemoryAppointmentStore::new(vec![appointment]);
        let now: chrono::DateTime<chrono::Utc> = "2024-06-10T10:00:00Z".parse().unwrap();

        let start: Mutation = Box::new(move |current: &Appointment| {
            AppointmentLifecycleService::new().apply(current, &LifecycleAction::Start, "doc-1", now)
        });
        let updated = store.update(id, start).await.unwrap();
        assert_eq!(updated.status, AppointmentStatus::InProgress);

        let start_again: Mutation = Box::new(move |current: &Appointment| {
            AppointmentLifecycleService::new().apply(current, &LifecycleAction::Start, "doc-1", now)
        });
        assert!(store.update(id, start_again).await.is_err());
        assert_eq!(store.get(id).await.unwrap().status, AppointmentStatus::InProgress);

        let missing: Mutation = Box::new(|current: &Appointment| Ok(current.clone()));
        assert!(matches!(
            store.update(Uuid::new_v4(), missing).await,
            Err(AppointmentError::NotFound { .. })
        ));
    }
}
