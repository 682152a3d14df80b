use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::NaiveDate;

use appointment_cell::models::{
    AppointmentError, AppointmentStatus, BookingOrigin, ConflictKind, DirectBookingRequest,
    LifecycleAction, OpenWizardRequest, PatientRef, Service, Urgency, WizardUpdate,
};
use appointment_cell::services::{
    AppointmentBookingService, AppointmentQuery, AppointmentStore, FixedClock, InMemoryAppointmentStore,
    InMemoryServiceCatalog, WizardStep,
};
use doctor_cell::models::Provider;
use doctor_cell::services::InMemoryProviderDirectory;
use shared_config::AppConfig;
use shared_models::auth::{CurrentUser, Role};

struct Clinic {
    store: Arc<InMemoryAppointmentStore>,
    service: AppointmentBookingService,
}

fn clinic() -> Clinic {
    let store = Arc::new(InMemoryAppointmentStore::default());
    let service = AppointmentBookingService::new(
        &AppConfig::default(),
        store.clone(),
        Arc::new(InMemoryServiceCatalog::new(vec![
            Service::new("svc-consult", "Consultation", 30, "General consultation"),
            Service::new("svc-ecg", "ECG", 30, "Electrocardiogram"),
        ])),
        Arc::new(InMemoryProviderDirectory::new(vec![
            Provider::new("doc-1", "Dr. Amina Diallo", "General Practice"),
            Provider::new("doc-2", "Dr. Paul Martin", "Cardiology"),
        ])),
        // Monday
        Arc::new(FixedClock::on(date("2024-06-10"))),
    );
    Clinic { store, service }
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn patient(id: &str, name: &str) -> CurrentUser {
    CurrentUser::new(id, name, Role::Patient)
}

fn secretary() -> CurrentUser {
    CurrentUser::new("sec-1", "Sam Reyes", Role::Secretary)
}

fn doctor() -> CurrentUser {
    CurrentUser::new("doc-1", "Dr. Amina Diallo", Role::Doctor)
}

/// Opens a wizard for `user` and drives it to the confirmation step.
async fn wizard_at_confirm(
    service: &AppointmentBookingService,
    user: &CurrentUser,
    provider_id: &str,
    day: &str,
    slot: &str,
) -> uuid::Uuid {
    let view = service.open_wizard(user, OpenWizardRequest::default()).await.unwrap();
    let id = view.session.id;

    service
        .update_wizard(user, id, WizardUpdate { service_id: Some("svc-consult".into()), ..Default::default() })
        .await
        .unwrap();
    service.advance_wizard(user, id).await.unwrap();
    service
        .update_wizard(
            user,
            id,
            WizardUpdate {
                provider_id: Some(provider_id.into()),
                date: Some(date(day)),
                time_slot: Some(slot.parse().unwrap()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let view = service.advance_wizard(user, id).await.unwrap();
    assert_eq!(view.step, Some(WizardStep::Confirm));
    id
}

#[tokio::test]
async fn test_race_for_the_same_slot_first_committer_wins() {
    let Clinic { store, service } = clinic();
    let maria = patient("pat-1", "Maria Lopez");
    let john = patient("pat-2", "John Smith");

    let first = wizard_at_confirm(&service, &maria, "doc-1", "2024-06-10", "10:00").await;
    let second = wizard_at_confirm(&service, &john, "doc-1", "2024-06-10", "10:00").await;

    let booked = service.submit_wizard(&maria, first).await.unwrap();
    assert_eq!(booked.status, AppointmentStatus::Waiting);
    assert_eq!(booked.patient_id, "pat-1");

    let err = service.submit_wizard(&john, second).await.unwrap_err();
    assert_matches!(
        err,
        AppointmentError::AvailabilityConflict { kind: ConflictKind::SlotTaken, ref provider_id, .. }
            if provider_id == "doc-1"
    );

    // the loser is back on step 2 with a refreshed list that no longer offers 10:00
    let view = service.wizard_session(&john, second).await.unwrap();
    assert_eq!(view.step, Some(WizardStep::SelectProviderDateTime));
    let draft = view.session.wizard.draft().unwrap();
    assert_eq!(draft.time_slot, None);
    assert_eq!(draft.provider_id.as_deref(), Some("doc-1"));
    assert!(!view.available_slots.contains(&"10:00".parse().unwrap()));
    assert_eq!(view.available_slots.len(), 15);

    assert_eq!(store.snapshot().await.len(), 1);
}

#[tokio::test]
async fn test_concurrent_submits_store_exactly_one_appointment() {
    let Clinic { store, service } = clinic();
    let maria = patient("pat-1", "Maria Lopez");
    let john = patient("pat-2", "John Smith");

    let first = wizard_at_confirm(&service, &maria, "doc-1", "2024-06-10", "10:00").await;
    let second = wizard_at_confirm(&service, &john, "doc-1", "2024-06-10", "10:00").await;

    let (a, b) = tokio::join!(service.submit_wizard(&maria, first), service.submit_wizard(&john, second));
    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    assert_eq!(store.snapshot().await.len(), 1);
}

#[tokio::test]
async fn test_same_slot_with_different_providers_both_succeed() {
    let Clinic { service, .. } = clinic();
    let maria = patient("pat-1", "Maria Lopez");
    let john = patient("pat-2", "John Smith");

    let first = wizard_at_confirm(&service, &maria, "doc-1", "2024-06-10", "10:00").await;
    let second = wizard_at_confirm(&service, &john, "doc-2", "2024-06-10", "10:00").await;

    assert!(service.submit_wizard(&maria, first).await.is_ok());
    assert!(service.submit_wizard(&john, second).await.is_ok());
}

#[tokio::test]
async fn test_no_show_rescheduled_keeps_identity() {
    let Clinic { service, .. } = clinic();
    let maria = patient("pat-1", "Maria Lopez");

    let id = wizard_at_confirm(&service, &maria, "doc-1", "2024-06-10", "09:00").await;
    let booked = service.submit_wizard(&maria, id).await.unwrap();

    let view = service
        .apply_action(&doctor(), booked.id, LifecycleAction::MarkNoShow)
        .await
        .unwrap();
    assert_eq!(view.appointment.status, AppointmentStatus::NoShow);

    let opened = service
        .open_wizard(
            &maria,
            OpenWizardRequest { reschedule_appointment_id: Some(booked.id), patient: None },
        )
        .await
        .unwrap();
    let session = opened.session.id;
    service.advance_wizard(&maria, session).await.unwrap();
    service
        .update_wizard(
            &maria,
            session,
            WizardUpdate {
                date: Some(date("2024-06-12")),
                time_slot: Some("14:30".parse().unwrap()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    service.advance_wizard(&maria, session).await.unwrap();

    let moved = service.submit_wizard(&maria, session).await.unwrap();
    assert_eq!(moved.id, booked.id);
    assert_eq!(moved.status, AppointmentStatus::Waiting);
    assert_eq!(moved.scheduled_at.date, date("2024-06-12"));
    assert_eq!(moved.scheduled_at.start.to_string(), "14:30");
    assert_eq!(moved.origin, BookingOrigin::Rescheduled);
    assert_eq!(moved.reschedule_count, 1);

    let all = service.list_appointments(&secretary(), &AppointmentQuery::default()).await;
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn test_active_appointment_cannot_be_rescheduled() {
    let Clinic { service, .. } = clinic();
    let maria = patient("pat-1", "Maria Lopez");
    let id = wizard_at_confirm(&service, &maria, "doc-1", "2024-06-10", "09:00").await;
    let booked = service.submit_wizard(&maria, id).await.unwrap();

    let result = service
        .open_wizard(
            &maria,
            OpenWizardRequest { reschedule_appointment_id: Some(booked.id), patient: None },
        )
        .await;
    assert_matches!(result, Err(AppointmentError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_cancelled_wizard_is_gone_and_a_new_one_starts_fresh() {
    let Clinic { store, service } = clinic();
    let maria = patient("pat-1", "Maria Lopez");

    let id = wizard_at_confirm(&service, &maria, "doc-1", "2024-06-10", "11:00").await;
    service.cancel_wizard(&maria, id).await.unwrap();

    assert_matches!(
        service.advance_wizard(&maria, id).await,
        Err(AppointmentError::NotFound { .. })
    );
    assert!(store.snapshot().await.is_empty());

    let reopened = service.open_wizard(&maria, OpenWizardRequest::default()).await.unwrap();
    let draft = reopened.session.wizard.draft().unwrap();
    assert_eq!(draft.step, WizardStep::SelectService);
    assert_eq!(draft.service_id, None);
    assert_eq!(draft.time_slot, None);
}

#[tokio::test]
async fn test_wizard_updates_are_all_or_nothing() {
    let Clinic { service, .. } = clinic();
    let maria = patient("pat-1", "Maria Lopez");
    let view = service.open_wizard(&maria, OpenWizardRequest::default()).await.unwrap();
    let id = view.session.id;

    // provider belongs to step 2, so the service id must not stick either
    let result = service
        .update_wizard(
            &maria,
            id,
            WizardUpdate {
                service_id: Some("svc-consult".into()),
                provider_id: Some("doc-1".into()),
                ..Default::default()
            },
        )
        .await;
    assert_matches!(result, Err(AppointmentError::Validation { .. }));

    let view = service.wizard_session(&maria, id).await.unwrap();
    assert_eq!(view.session.wizard.draft().unwrap().service_id, None);
}

#[tokio::test]
async fn test_completed_appointment_only_accepts_notes() {
    let Clinic { service, .. } = clinic();
    let maria = patient("pat-1", "Maria Lopez");
    let id = wizard_at_confirm(&service, &maria, "doc-1", "2024-06-10", "09:30").await;
    let booked = service.submit_wizard(&maria, id).await.unwrap();

    service.apply_action(&doctor(), booked.id, LifecycleAction::Start).await.unwrap();
    let done = service.apply_action(&doctor(), booked.id, LifecycleAction::Complete).await.unwrap();
    assert_eq!(done.allowed_actions, vec![appointment_cell::models::ActionKind::AddNote]);

    for action in [
        LifecycleAction::Start,
        LifecycleAction::Complete,
        LifecycleAction::Cancel { reason: None },
        LifecycleAction::MarkNoShow,
    ] {
        assert_matches!(
            service.apply_action(&doctor(), booked.id, action).await,
            Err(AppointmentError::InvalidTransition { .. })
        );
    }

    let noted = service
        .apply_action(&doctor(), booked.id, LifecycleAction::AddNote { text: "Follow up in 3 months".into() })
        .await
        .unwrap();
    assert_eq!(noted.appointment.status, AppointmentStatus::Completed);
    assert_eq!(noted.appointment.notes.len(), 1);
    assert_eq!(noted.appointment.status_history.len(), 2);
}

#[tokio::test]
async fn test_secretary_direct_booking_is_urgent_and_tagged() {
    let Clinic { service, .. } = clinic();
    let request = DirectBookingRequest {
        patient: PatientRef::new("pat-7", "Walk-in Patient"),
        provider_id: "doc-2".into(),
        service_id: "svc-ecg".into(),
        date: date("2024-06-10"),
        time_slot: "15:00".parse().unwrap(),
        urgency: Urgency::Urgent,
        notes: "chest pain".into(),
    };

    let appointment = service.direct_book(&secretary(), request.clone()).await.unwrap();
    assert_eq!(appointment.origin, BookingOrigin::Direct);
    assert_eq!(appointment.urgency, Urgency::Urgent);
    assert_eq!(appointment.service_name, "ECG");
    assert_eq!(appointment.notes[0].author_id, "sec-1");

    assert_matches!(
        service.direct_book(&secretary(), request).await,
        Err(AppointmentError::AvailabilityConflict { .. })
    );
    assert_eq!(service.summary(&secretary()).await.urgent_open, 1);
}

#[tokio::test]
async fn test_direct_booking_on_a_weekend_is_rejected() {
    let Clinic { service, .. } = clinic();
    let request = DirectBookingRequest {
        patient: PatientRef::new("pat-7", "Walk-in Patient"),
        provider_id: "doc-1".into(),
        service_id: "svc-consult".into(),
        date: date("2024-06-15"),
        time_slot: "10:00".parse().unwrap(),
        urgency: Urgency::Normal,
        notes: String::new(),
    };

    let err = service.direct_book(&secretary(), request).await.unwrap_err();
    assert_matches!(err, AppointmentError::Validation { ref fields } if fields[0].field == "date");
}

#[tokio::test]
async fn test_direct_booking_reports_bad_fields_before_conflicts() {
    let Clinic { service, .. } = clinic();
    let request = DirectBookingRequest {
        patient: PatientRef::new("pat-7", "Walk-in Patient"),
        provider_id: "doc-1".into(),
        service_id: "svc-consult".into(),
        date: date("2024-06-10"),
        time_slot: "10:00".parse().unwrap(),
        urgency: Urgency::Normal,
        notes: String::new(),
    };
    service.direct_book(&secretary(), request.clone()).await.unwrap();

    for off_grid in ["10:15", "18:00"] {
        let err = service
            .direct_book(
                &secretary(),
                DirectBookingRequest {
                    time_slot: off_grid.parse().unwrap(),
                    ..request.clone()
                },
            )
            .await
            .unwrap_err();
        assert_matches!(err, AppointmentError::Validation { ref fields } if fields[0].field == "time_slot");
    }

    // 10:00 is taken, but the unknown service is reported first
    let err = service
        .direct_book(
            &secretary(),
            DirectBookingRequest {
                service_id: "svc-unknown".into(),
                ..request.clone()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::NotFound { ref id, .. } if id == "svc-unknown");

    assert_matches!(
        service.direct_book(&secretary(), request).await,
        Err(AppointmentError::AvailabilityConflict { kind: ConflictKind::SlotTaken, .. })
    );
}

#[tokio::test]
async fn test_patients_cancel_only_their_own() {
    let Clinic { service, .. } = clinic();
    let maria = patient("pat-1", "Maria Lopez");
    let john = patient("pat-2", "John Smith");
    let id = wizard_at_confirm(&service, &maria, "doc-1", "2024-06-10", "13:00").await;
    let booked = service.submit_wizard(&maria, id).await.unwrap();

    assert_matches!(
        service
            .apply_action(&john, booked.id, LifecycleAction::Cancel { reason: None })
            .await,
        Err(AppointmentError::Unauthorized(_))
    );

    let cancelled = service
        .apply_action(&maria, booked.id, LifecycleAction::Cancel { reason: Some("travelling".into()) })
        .await
        .unwrap();
    assert_eq!(cancelled.appointment.status, AppointmentStatus::Cancelled);

    // the slot is free again
    let slots = service.available_slots("doc-1", date("2024-06-10")).await.unwrap();
    assert!(slots.slots.contains(&"13:00".parse().unwrap()));
}
