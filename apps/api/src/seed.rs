// Mock clinic data served by the API until real directories are wired in.
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use tracing::info;
use uuid::Uuid;

use appointment_cell::handlers::BookingState;
use appointment_cell::models::{
    Appointment, AppointmentStatus, BookingOrigin, Service, TimeSlot, Urgency,
};
use appointment_cell::services::{
    AppointmentBookingService, Clock, InMemoryAppointmentStore, InMemoryServiceCatalog, SlotGenerator,
    SystemClock,
};
use doctor_cell::handlers::DirectoryState;
use doctor_cell::models::Provider;
use doctor_cell::services::InMemoryProviderDirectory;
use shared_config::{AppConfig, ClinicHours};

pub fn services() -> Vec<Service> {
    vec![
        Service::new("svc-consult", "General consultation", 30, "First visit or new complaint"),
        Service::new("svc-followup", "Follow-up visit", 30, "Review of an ongoing treatment"),
        Service::new("svc-ecg", "ECG", 30, "Resting electrocardiogram"),
        Service::new("svc-vaccine", "Vaccination", 30, "Routine or travel vaccination"),
    ]
}

pub fn providers() -> Vec<Provider> {
    vec![
        Provider::new("doc-1", "Dr. Amina Diallo", "General Practice"),
        Provider::new("doc-2", "Dr. Paul Martin", "Cardiology"),
        Provider::new("doc-3", "Dr. Lea Rossi", "Dermatology").unavailable(),
    ]
}

struct SeedAppointment {
    patient_id: &'static str,
    patient_name: &'static str,
    provider_id: &'static str,
    service_id: &'static str,
    slot_index: usize,
    status: AppointmentStatus,
    urgency: Urgency,
}

const SEED: &[SeedAppointment] = &[
    SeedAppointment {
        patient_id: "pat-1",
        patient_name: "Maria Lopez",
        provider_id: "doc-1",
        service_id: "svc-consult",
        slot_index: 0,
        status: AppointmentStatus::Completed,
        urgency: Urgency::Normal,
    },
    SeedAppointment {
        patient_id: "pat-2",
        patient_name: "John Smith",
        provider_id: "doc-1",
        service_id: "svc-followup",
        slot_index: 1,
        status: AppointmentStatus::InProgress,
        urgency: Urgency::Normal,
    },
    SeedAppointment {
        patient_id: "pat-3",
        patient_name: "Anna Ivanova",
        provider_id: "doc-2",
        service_id: "svc-ecg",
        slot_index: 2,
        status: AppointmentStatus::Waiting,
        urgency: Urgency::Urgent,
    },
    SeedAppointment {
        patient_id: "pat-4",
        patient_name: "Kwame Mensah",
        provider_id: "doc-2",
        service_id: "svc-consult",
        slot_index: 4,
        status: AppointmentStatus::Cancelled,
        urgency: Urgency::Normal,
    },
    SeedAppointment {
        patient_id: "pat-5",
        patient_name: "Yuki Tanaka",
        provider_id: "doc-1",
        service_id: "svc-vaccine",
        slot_index: 6,
        status: AppointmentStatus::NoShow,
        urgency: Urgency::Normal,
    },
];

/// First weekday on or after `date`.
fn clinic_day(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date + Duration::days(2),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

/// Seed appointments on the next clinic day. Entries whose slot does not
/// exist under the configured hours are skipped.
pub fn appointments(hours: &ClinicHours, now: DateTime<Utc>) -> Vec<Appointment> {
    let day = clinic_day(now.date_naive());
    let generator = SlotGenerator::from_hours(hours);
    let services = services();

    SEED.iter()
        .filter_map(|seed| {
            let start = generator.iter().nth(seed.slot_index)?;
            let service = services.iter().find(|s| s.id == seed.service_id)?;

            Some(Appointment {
                id: Uuid::new_v4(),
                patient_id: seed.patient_id.to_string(),
                patient_name: seed.patient_name.to_string(),
                provider_id: seed.provider_id.to_string(),
                service_id: service.id.clone(),
                service_name: service.name.clone(),
                scheduled_at: TimeSlot::new(day, start, hours.step_minutes),
                status: seed.status,
                urgency: seed.urgency,
                origin: BookingOrigin::Direct,
                reschedule_count: 0,
                notes: Vec::new(),
                status_history: Vec::new(),
                created_at: now,
                updated_at: now,
            })
        })
        .collect()
}

pub fn build_state(config: &Arc<AppConfig>) -> (BookingState, DirectoryState) {
    let clock = Arc::new(SystemClock);
    let seeded = appointments(&config.clinic_hours, clock.now());
    info!("Seeded {} appointments, {} providers", seeded.len(), providers().len());

    let directory: DirectoryState = Arc::new(InMemoryProviderDirectory::new(providers()));
    let booking = AppointmentBookingService::new(
        config,
        Arc::new(InMemoryAppointmentStore::new(seeded)),
        Arc::new(InMemoryServiceCatalog::new(services())),
        directory.clone(),
        clock,
    );

    (Arc::new(booking), directory)
}
