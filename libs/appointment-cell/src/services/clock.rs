// libs/appointment-cell/src/services/clock.rs
use chrono::{DateTime, Local, NaiveDate, Utc};

/// Source of "now" for bookability checks and timestamps.
///
/// `today` is the calendar date in clinic-local time, since clinic hours and
/// the booking horizon are local. The default takes the UTC date, which is
/// only right for clocks pinned to UTC.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

/// The host clock. The server is expected to run in the clinic's timezone.
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock pinned to a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Pins the clock to 08:00 UTC on `date`.
    pub fn on(date: NaiveDate) -> Self {
        let instant = date
            .and_hms_opt(8, 0, 0)
            .unwrap_or_default()
            .and_utc();
        FixedClock(instant)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
