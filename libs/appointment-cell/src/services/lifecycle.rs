// libs/appointment-cell/src/services/lifecycle.rs
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::models::{
    ActionKind, Appointment, AppointmentError, AppointmentNote, AppointmentStatus, BookingOrigin,
    LifecycleAction, Service, StatusChange, TimeSlot,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Actions accepted from `status`, in the order a UI should offer them.
    pub fn allowed_actions(&self, status: AppointmentStatus) -> &'static [ActionKind] {
        match status {
            AppointmentStatus::Waiting => &[
                ActionKind::Start,
                ActionKind::Cancel,
                ActionKind::MarkNoShow,
                ActionKind::AddNote,
            ],
            AppointmentStatus::InProgress => {
                &[ActionKind::Complete, ActionKind::Cancel, ActionKind::AddNote]
            }
            // Terminal for status changes; annotation only
            AppointmentStatus::Completed => &[ActionKind::AddNote],
            AppointmentStatus::Cancelled | AppointmentStatus::NoShow => {
                &[ActionKind::Reschedule, ActionKind::AddNote]
            }
        }
    }

    pub fn is_allowed(&self, status: AppointmentStatus, action: ActionKind) -> bool {
        self.allowed_actions(status).contains(&action)
    }

    /// Status reached by taking `action` from `status`.
    pub fn next_status(
        &self,
        status: AppointmentStatus,
        action: ActionKind,
    ) -> Result<AppointmentStatus, AppointmentError> {
        debug!("Validating action {} from status {}", action, status);

        if !self.is_allowed(status, action) {
            warn!("Invalid lifecycle action attempted: {} from {}", action, status);
            return Err(AppointmentError::invalid_transition(status, action));
        }

        Ok(match action {
            ActionKind::Start => AppointmentStatus::InProgress,
            ActionKind::Complete => AppointmentStatus::Completed,
            ActionKind::Cancel => AppointmentStatus::Cancelled,
            ActionKind::MarkNoShow => AppointmentStatus::NoShow,
            ActionKind::Reschedule => AppointmentStatus::Waiting,
            ActionKind::AddNote => status,
        })
    }

    /// Applies `action` and returns the updated appointment. The input is
    /// left untouched; on error nothing changes.
    pub fn apply(
        &self,
        appointment: &Appointment,
        action: &LifecycleAction,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let next = self.next_status(appointment.status, action.kind())?;
        let mut updated = appointment.clone();

        match action {
            LifecycleAction::AddNote { text } => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(AppointmentError::field("text", "Note cannot be empty"));
                }
                updated.notes.push(AppointmentNote {
                    text: text.to_string(),
                    author_id: actor_id.to_string(),
                    added_at: now,
                });
            }
            LifecycleAction::Cancel { reason } => {
                record_change(&mut updated, next, ActionKind::Cancel, now, clean_reason(reason));
            }
            other => {
                record_change(&mut updated, next, other.kind(), now, None);
            }
        }

        updated.updated_at = now;
        info!("Appointment {} {} -> {}", appointment.id, appointment.status, updated.status);
        Ok(updated)
    }

    /// Moves a cancelled or no-show appointment to a new slot. The identity is
    /// kept; the status returns to waiting.
    pub fn reschedule(
        &self,
        appointment: &Appointment,
        service: &Service,
        provider_id: &str,
        slot: TimeSlot,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let next = self.next_status(appointment.status, ActionKind::Reschedule)?;
        let mut updated = appointment.clone();

        let reason = format!("moved from {} to {}", appointment.scheduled_at, slot);
        record_change(&mut updated, next, ActionKind::Reschedule, now, Some(reason));

        updated.provider_id = provider_id.to_string();
        updated.service_id = service.id.clone();
        updated.service_name = service.name.clone();
        updated.scheduled_at = slot;
        updated.origin = BookingOrigin::Rescheduled;
        updated.reschedule_count += 1;
        updated.updated_at = now;

        info!("Appointment {} rescheduled to {}", updated.id, slot);
        Ok(updated)
    }
}

fn record_change(
    appointment: &mut Appointment,
    next: AppointmentStatus,
    action: ActionKind,
    at: DateTime<Utc>,
    reason: Option<String>,
) {
    appointment.status_history.push(StatusChange {
        from: appointment.status,
        to: next,
        action,
        at,
        reason,
    });
    appointment.status = next;
}

fn clean_reason(reason: &Option<String>) -> Option<String> {
    reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::appointment_at;

    fn now() -> DateTime<Utc> {
        "2024-06-10T10:05:00Z".parse().unwrap()
    }

    fn every_action() -> Vec<LifecycleAction> {
        vec![
            LifecycleAction::Start,
            LifecycleAction::Complete,
            LifecycleAction::Cancel { reason: None },
            LifecycleAction::MarkNoShow,
            LifecycleAction::AddNote { text: "note".to_string() },
        ]
    }

    fn with_status(status: AppointmentStatus) -> Appointment {
        let mut appointment = appointment_at("doc-1", "pat-1", "2024-06-10", "10:00");
        appointment.status = status;
        appointment
    }

    #[test]
    fn test_happy_path_waiting_to_completed() {
        let lifecycle = AppointmentLifecycleService::new();
        let waiting = with_status(AppointmentStatus::Waiting);

        let started = lifecycle.apply(&waiting, &LifecycleAction::Start, "doc-1", now()).unwrap();
        assert_eq!(started.status, AppointmentStatus::InProgress);

        let completed = lifecycle.apply(&started, &LifecycleAction::Complete, "doc-1", now()).unwrap();
        assert_eq!(completed.status, AppointmentStatus::Completed);
        assert_eq!(completed.status_history.len(), 2);
        assert_eq!(completed.status_history[1].from, AppointmentStatus::InProgress);

        // the input snapshot is never mutated
        assert_eq!(waiting.status, AppointmentStatus::Waiting);
        assert!(waiting.status_history.is_empty());
    }

    #[test]
    fn test_completed_only_accepts_notes() {
        let lifecycle = AppointmentLifecycleService::new();
        let completed = with_status(AppointmentStatus::Completed);

        for action in every_action() {
            let result = lifecycle.apply(&completed, &action, "doc-1", now());
            if action.kind() == ActionKind::AddNote {
                let updated = result.unwrap();
                assert_eq!(updated.status, AppointmentStatus::Completed);
                assert_eq!(updated.notes.len(), 1);
            } else {
                assert!(matches!(result, Err(AppointmentError::InvalidTransition { .. })), "{:?}", action);
            }
        }
    }

    #[test]
    fn test_transition_table() {
        let lifecycle = AppointmentLifecycleService::new();
        use ActionKind::*;
        use AppointmentStatus::*;

        let expected = [
            (Waiting, Start, Some(InProgress)),
            (Waiting, Cancel, Some(Cancelled)),
            (Waiting, MarkNoShow, Some(NoShow)),
            (Waiting, Complete, None),
            (Waiting, Reschedule, None),
            (InProgress, Complete, Some(Completed)),
            (InProgress, Cancel, Some(Cancelled)),
            (InProgress, MarkNoShow, None),
            (InProgress, Start, None),
            (Cancelled, Reschedule, Some(Waiting)),
            (Cancelled, Start, None),
            (NoShow, Reschedule, Some(Waiting)),
            (NoShow, Cancel, None),
            (Completed, Reschedule, None),
        ];

        for (from, action, to) in expected {
            assert_eq!(lifecycle.next_status(from, action).ok(), to, "{} --{}-->", from, action);
        }

        for status in AppointmentStatus::ALL {
            assert_eq!(lifecycle.next_status(status, AddNote), Ok(status));
        }
    }

    #[test]
    fn test_cancel_records_reason() {
        let lifecycle = AppointmentLifecycleService::new();
        let waiting = with_status(AppointmentStatus::Waiting);
        let action = LifecycleAction::Cancel { reason: Some("  patient called  ".to_string()) };

        let cancelled = lifecycle.apply(&waiting, &action, "sec-1", now()).unwrap();
        assert_eq!(cancelled.status_history[0].reason.as_deref(), Some("patient called"));
        assert_eq!(cancelled.status_history[0].action, ActionKind::Cancel);
    }

    #[test]
    fn test_empty_note_rejected() {
        let lifecycle = AppointmentLifecycleService::new();
        let waiting = with_status(AppointmentStatus::Waiting);
        let action = LifecycleAction::AddNote { text: "   ".to_string() };
        assert!(matches!(
            lifecycle.apply(&waiting, &action, "doc-1", now()),
            Err(AppointmentError::Validation { .. })
        ));
    }

    #[test]
    fn test_reschedule_keeps_identity() {
        let lifecycle = AppointmentLifecycleService::new();
        let no_show = with_status(AppointmentStatus::NoShow);
        let service = Service::new("svc-consult", "Consultation", 30, "General consultation");
        let slot = TimeSlot::new("2024-06-12".parse().unwrap(), "14:00".parse().unwrap(), 30);

        let moved = lifecycle.reschedule(&no_show, &service, "doc-2", slot, now()).unwrap();
        assert_eq!(moved.id, no_show.id);
        assert_eq!(moved.status, AppointmentStatus::Waiting);
        assert_eq!(moved.scheduled_at, slot);
        assert_eq!(moved.provider_id, "doc-2");
        assert_eq!(moved.origin, BookingOrigin::Rescheduled);
        assert_eq!(moved.reschedule_count, 1);

        let waiting = with_status(AppointmentStatus::Waiting);
        assert!(lifecycle.reschedule(&waiting, &service, "doc-1", slot, now()).is_err());
    }
}
