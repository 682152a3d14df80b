// libs/appointment-cell/src/services/slots.rs
use shared_config::ClinicHours;

use crate::models::SlotTime;

/// Grid of bookable start times for one clinic day.
///
/// `start_hour` is inclusive and `end_hour` exclusive. A trailing slot that
/// would run past `end_hour` is never produced. Degenerate parameters
/// (zero step, empty or inverted day, end past midnight) produce no slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotGenerator {
    pub start_hour: u32,
    pub end_hour: u32,
    pub step_minutes: u32,
}

impl SlotGenerator {
    pub fn new(start_hour: u32, end_hour: u32, step_minutes: u32) -> Self {
        Self {
            start_hour,
            end_hour,
            step_minutes,
        }
    }

    pub fn from_hours(hours: &ClinicHours) -> Self {
        Self::new(hours.start_hour, hours.end_hour, hours.step_minutes)
    }

    fn is_degenerate(&self) -> bool {
        self.step_minutes == 0 || self.start_hour >= self.end_hour || self.end_hour > 24
    }

    /// A fresh iterator over the grid; each call starts from the first slot.
    pub fn iter(&self) -> Slots {
        let (next, end) = if self.is_degenerate() {
            (0, 0)
        } else {
            (self.start_hour * 60, self.end_hour * 60)
        };

        Slots {
            next,
            end,
            step: self.step_minutes,
        }
    }

    /// Number of slots the grid holds.
    pub fn len(&self) -> usize {
        if self.is_degenerate() {
            return 0;
        }
        ((self.end_hour - self.start_hour) * 60 / self.step_minutes) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `slot` is one of the start times on this grid.
    pub fn contains(&self, slot: SlotTime) -> bool {
        if self.is_degenerate() {
            return false;
        }
        let minutes = slot.minutes_since_midnight();
        let start = self.start_hour * 60;
        let fits = minutes
            .checked_add(self.step_minutes)
            .is_some_and(|slot_end| slot_end <= self.end_hour * 60);
        minutes >= start && fits && (minutes - start) % self.step_minutes == 0
    }
}

impl IntoIterator for &SlotGenerator {
    type Item = SlotTime;
    type IntoIter = Slots;

    fn into_iter(self) -> Slots {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct Slots {
    next: u32,
    end: u32,
    step: u32,
}

impl Iterator for Slots {
    type Item = SlotTime;

    fn next(&mut self) -> Option<SlotTime> {
        let slot_end = self.next.checked_add(self.step)?;
        if self.step == 0 || slot_end > self.end {
            return None;
        }
        let slot = SlotTime::from_hm(self.next / 60, self.next % 60)?;
        self.next = slot_end;
        Some(slot)
    }
}

/// All start times from `start_hour:00` up to (not including) `end_hour:00`.
pub fn generate_slots(start_hour: u32, end_hour: u32, step_minutes: u32) -> Vec<SlotTime> {
    SlotGenerator::new(start_hour, end_hour, step_minutes).iter().collect()
}
