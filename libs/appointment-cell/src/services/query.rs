// libs/appointment-cell/src/services/query.rs
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use shared_models::auth::{Capability, CurrentUser};

use crate::models::{Appointment, AppointmentStatus, AppointmentSummary, Urgency};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(AppointmentStatus),
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") || s.trim().is_empty() {
            return Ok(StatusFilter::All);
        }
        s.parse().map(StatusFilter::Only)
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => write!(f, "all"),
            StatusFilter::Only(status) => write!(f, "{}", status),
        }
    }
}

/// Inclusive on both ends; an open end is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    ScheduledAt,
    CreatedAt,
    PatientName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentQuery {
    pub status_filter: StatusFilter,
    pub free_text: String,
    pub date_range: Option<DateRange>,
    pub provider_id: Option<String>,
    pub sort: Option<SortKey>,
}

impl AppointmentQuery {
    pub fn with_status(status: AppointmentStatus) -> Self {
        Self {
            status_filter: StatusFilter::Only(status),
            ..Self::default()
        }
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        if let StatusFilter::Only(status) = self.status_filter {
            if appointment.status != status {
                return false;
            }
        }

        if let Some(provider_id) = &self.provider_id {
            if &appointment.provider_id != provider_id {
                return false;
            }
        }

        if let Some(range) = &self.date_range {
            if !range.contains(appointment.scheduled_at.date) {
                return false;
            }
        }

        matches_text(appointment, &self.free_text)
    }
}

fn matches_text(appointment: &Appointment, free_text: &str) -> bool {
    let needle = free_text.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }

    [
        appointment.patient_name.as_str(),
        appointment.service_name.as_str(),
        appointment.patient_id.as_str(),
    ]
    .iter()
    .any(|haystack| haystack.to_lowercase().contains(&needle))
}

/// Filters (and optionally sorts) a snapshot into a new list. Input order is
/// kept unless a sort key is given; ties always keep input order.
pub fn query(appointments: &[Appointment], query: &AppointmentQuery) -> Vec<Appointment> {
    let mut result: Vec<Appointment> = appointments
        .iter()
        .filter(|a| query.matches(a))
        .cloned()
        .collect();

    if let Some(key) = query.sort {
        // sort_by is stable
        result.sort_by(|a, b| {
            let ordering = compare(a, b, key.field);
            match key.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
    }

    result
}

fn compare(a: &Appointment, b: &Appointment, field: SortField) -> Ordering {
    match field {
        SortField::ScheduledAt => (a.scheduled_at.date, a.scheduled_at.start)
            .cmp(&(b.scheduled_at.date, b.scheduled_at.start)),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::PatientName => a
            .patient_name
            .to_lowercase()
            .cmp(&b.patient_name.to_lowercase()),
    }
}

/// Narrows a snapshot to what `user` may see: everything with
/// `ViewAllAppointments`, otherwise only the user's own appointments.
pub fn visible_to<'a>(user: &CurrentUser, appointments: &'a [Appointment]) -> Vec<&'a Appointment> {
    if user.has_capability(Capability::ViewAllAppointments) {
        return appointments.iter().collect();
    }
    appointments.iter().filter(|a| a.patient_id == user.id).collect()
}

pub fn summarize(appointments: &[Appointment]) -> AppointmentSummary {
    appointments
        .iter()
        .fold(AppointmentSummary::default(), |mut summary, a| {
            summary.total += 1;
            match a.status {
                AppointmentStatus::Waiting => summary.waiting += 1,
                AppointmentStatus::InProgress => summary.in_progress += 1,
                AppointmentStatus::Completed => summary.completed += 1,
                AppointmentStatus::Cancelled => summary.cancelled += 1,
                AppointmentStatus::NoShow => summary.no_show += 1,
            }
            if a.urgency == Urgency::Urgent
                && matches!(a.status, AppointmentStatus::Waiting | AppointmentStatus::InProgress)
            {
                summary.urgent_open += 1;
            }
            summary
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::appointment_at;
    use shared_models::auth::Role;

    fn fixture() -> Vec<Appointment> {
        let mut a = appointment_at("doc-1", "pat-1", "2024-06-10", "10:00");
        a.patient_name = "Maria Lopez".to_string();
        a.status = AppointmentStatus::Cancelled;

        let mut b = appointment_at("doc-2", "pat-2", "2024-06-11", "09:00");
        b.patient_name = "John Smith".to_string();
        b.service_name = "Cardiology follow-up".to_string();

        let mut c = appointment_at("doc-1", "pat-3", "2024-06-09", "11:00");
        c.patient_name = "Anna Ivanova".to_string();
        c.status = AppointmentStatus::Cancelled;

        let mut d = appointment_at("doc-1", "pat-4", "2024-06-12", "15:30");
        d.patient_name = "Bob Stone".to_string();
        d.status = AppointmentStatus::Completed;
        d.urgency = Urgency::Urgent;

        vec![a, b, c, d]
    }

    fn ids(result: &[Appointment]) -> Vec<&str> {
        result.iter().map(|a| a.patient_id.as_str()).collect()
    }

    #[test]
    fn test_cancelled_only_in_input_order() {
        let input = fixture();
        let result = query(&input, &AppointmentQuery::with_status(AppointmentStatus::Cancelled));
        assert_eq!(ids(&result), vec!["pat-1", "pat-3"]);
        // input untouched
        assert_eq!(input.len(), 4);
    }

    #[test]
    fn test_all_with_empty_text_returns_everything() {
        let input = fixture();
        assert_eq!(query(&input, &AppointmentQuery::default()), input);
    }

    #[test]
    fn test_free_text_is_case_insensitive_on_name_service_and_id() {
        let input = fixture();
        let by = |text: &str| {
            let q = AppointmentQuery { free_text: text.to_string(), ..Default::default() };
            ids(&query(&input, &q)).into_iter().map(String::from).collect::<Vec<_>>()
        };

        assert_eq!(by("maria"), vec!["pat-1"]);
        assert_eq!(by("CARDIO"), vec!["pat-2"]);
        assert_eq!(by("PAT-3"), vec!["pat-3"]);
        assert_eq!(by("  "), vec!["pat-1", "pat-2", "pat-3", "pat-4"]);
        assert!(by("nobody").is_empty());
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let input = fixture();
        let q = AppointmentQuery {
            date_range: Some(DateRange {
                from: Some("2024-06-10".parse().unwrap()),
                to: Some("2024-06-11".parse().unwrap()),
            }),
            ..Default::default()
        };
        assert_eq!(ids(&query(&input, &q)), vec!["pat-1", "pat-2"]);

        let open_end = AppointmentQuery {
            date_range: Some(DateRange { from: Some("2024-06-11".parse().unwrap()), to: None }),
            ..Default::default()
        };
        assert_eq!(ids(&query(&input, &open_end)), vec!["pat-2", "pat-4"]);
    }

    #[test]
    fn test_sort_by_schedule_and_name() {
        let input = fixture();
        let q = AppointmentQuery {
            sort: Some(SortKey { field: SortField::ScheduledAt, order: SortOrder::Asc }),
            ..Default::default()
        };
        assert_eq!(ids(&query(&input, &q)), vec!["pat-3", "pat-1", "pat-2", "pat-4"]);

        let q = AppointmentQuery {
            sort: Some(SortKey { field: SortField::PatientName, order: SortOrder::Desc }),
            ..Default::default()
        };
        assert_eq!(ids(&query(&input, &q)), vec!["pat-1", "pat-2", "pat-4", "pat-3"]);
    }

    #[test]
    fn test_provider_filter_and_status_filter_parse() {
        let input = fixture();
        let q = AppointmentQuery {
            provider_id: Some("doc-1".to_string()),
            status_filter: "completed".parse().unwrap(),
            ..Default::default()
        };
        assert_eq!(ids(&query(&input, &q)), vec!["pat-4"]);
        assert_eq!("ALL".parse::<StatusFilter>(), Ok(StatusFilter::All));
        assert!("archived".parse::<StatusFilter>().is_err());
    }

    #[test]
    fn test_patients_only_see_their_own() {
        let input = fixture();
        let patient = CurrentUser::new("pat-2", "John Smith", Role::Patient);
        let doctor = CurrentUser::new("doc-1", "Dr. One", Role::Doctor);

        assert_eq!(visible_to(&patient, &input).len(), 1);
        assert_eq!(visible_to(&doctor, &input).len(), 4);
    }

    #[test]
    fn test_summary_counts() {
        let summary = summarize(&fixture());
        assert_eq!(summary.total, 4);
        assert_eq!(summary.cancelled, 2);
        assert_eq!(summary.waiting, 1);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.urgent_open, 0);
    }
}
