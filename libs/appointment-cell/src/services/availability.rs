// libs/appointment-cell/src/services/availability.rs
use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, Weekday};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::ClinicHours;

use crate::models::{Appointment, AppointmentError, ConflictKind, SlotTime};
use crate::services::slots::SlotGenerator;

/// A date is bookable when it falls on a weekday within
/// `[today, today + horizon_days]`. Same-day booking is allowed.
pub fn is_bookable_date(candidate: NaiveDate, today: NaiveDate, horizon_days: i64) -> bool {
    if horizon_days < 0 {
        return false;
    }
    if matches!(candidate.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }

    let days_ahead = candidate.signed_duration_since(today).num_days();
    (0..=horizon_days).contains(&days_ahead)
}

/// A slot is free when no occupying appointment of the same provider sits on
/// the same `(date, slot)` pair. A snapshot holding the same appointment id
/// twice is treated as corrupt and nothing is free.
pub fn is_slot_free(
    provider_id: &str,
    date: NaiveDate,
    slot: SlotTime,
    existing: &[Appointment],
    exclude: Option<Uuid>,
) -> bool {
    if provider_id.trim().is_empty() || !is_well_formed(existing) {
        return false;
    }

    !existing
        .iter()
        .filter(|a| Some(a.id) != exclude)
        .any(|a| a.occupies(provider_id, date, slot))
}

fn is_well_formed(existing: &[Appointment]) -> bool {
    let mut seen = HashSet::with_capacity(existing.len());
    let ok = existing.iter().all(|a| seen.insert(a.id));
    if !ok {
        warn!("Appointment snapshot contains duplicate ids, treating every slot as taken");
    }
    ok
}

/// Bookability rules bound to one clinic configuration.
#[derive(Debug, Clone, Copy)]
pub struct AvailabilityFilter {
    generator: SlotGenerator,
    horizon_days: i64,
}

impl AvailabilityFilter {
    pub fn new(hours: &ClinicHours) -> Self {
        Self {
            generator: SlotGenerator::from_hours(hours),
            horizon_days: hours.booking_horizon_days,
        }
    }

    pub fn generator(&self) -> &SlotGenerator {
        &self.generator
    }

    pub fn horizon_days(&self) -> i64 {
        self.horizon_days
    }

    pub fn is_bookable_date(&self, candidate: NaiveDate, today: NaiveDate) -> bool {
        is_bookable_date(candidate, today, self.horizon_days)
    }

    /// Like [`is_slot_free`], but off-grid slots are never free.
    pub fn is_slot_free(
        &self,
        provider_id: &str,
        date: NaiveDate,
        slot: SlotTime,
        existing: &[Appointment],
        exclude: Option<Uuid>,
    ) -> bool {
        if !self.generator.contains(slot) {
            debug!("Slot {} is not on the clinic grid", slot);
            return false;
        }
        is_slot_free(provider_id, date, slot, existing, exclude)
    }

    /// The refreshed slot list shown on the provider/date/time step.
    pub fn available_slots(
        &self,
        provider_id: &str,
        date: NaiveDate,
        today: NaiveDate,
        existing: &[Appointment],
        exclude: Option<Uuid>,
    ) -> Vec<SlotTime> {
        if !self.is_bookable_date(date, today) {
            return Vec::new();
        }
        if !is_well_formed(existing) {
            return Vec::new();
        }

        self.generator
            .iter()
            .filter(|slot| is_slot_free(provider_id, date, *slot, existing, exclude))
            .collect()
    }

    /// Conflict error for a taken slot, `Ok` when the slot can be claimed.
    pub fn ensure_slot_free(
        &self,
        provider_id: &str,
        date: NaiveDate,
        slot: SlotTime,
        existing: &[Appointment],
        exclude: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        if self.is_slot_free(provider_id, date, slot, existing, exclude) {
            return Ok(());
        }

        warn!("Slot {} {} for provider {} is not available", date, slot, provider_id);
        Err(AppointmentError::AvailabilityConflict {
            kind: ConflictKind::SlotTaken,
            provider_id: provider_id.to_string(),
            date,
            slot,
        })
    }
}

/// Whether the patient already holds an occupying appointment at the same
/// `(date, slot)` with any provider.
pub fn patient_has_overlap(
    patient_id: &str,
    date: NaiveDate,
    slot: SlotTime,
    existing: &[Appointment],
    exclude: Option<Uuid>,
) -> bool {
    existing.iter().filter(|a| Some(a.id) != exclude).any(|a| {
        a.patient_id == patient_id && a.status.is_occupying() && a.scheduled_at.same_pair(date, slot)
    })
}
