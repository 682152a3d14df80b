// libs/appointment-cell/src/test_support.rs
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus, BookingOrigin, TimeSlot, Urgency};

pub fn appointment_at(provider_id: &str, patient_id: &str, date: &str, slot: &str) -> Appointment {
    let created: DateTime<Utc> = "2024-06-01T09:00:00Z".parse().unwrap();
    Appointment {
        id: Uuid::new_v4(),
        patient_id: patient_id.to_string(),
        patient_name: format!("Patient {}", patient_id),
        provider_id: provider_id.to_string(),
        service_id: "svc-consult".to_string(),
        service_name: "Consultation".to_string(),
        scheduled_at: TimeSlot::new(date.parse().unwrap(), slot.parse().unwrap(), 30),
        status: AppointmentStatus::Waiting,
        urgency: Urgency::Normal,
        origin: BookingOrigin::Wizard,
        reschedule_count: 0,
        notes: Vec::new(),
        status_history: Vec::new(),
        created_at: created,
        updated_at: created,
    }
}
