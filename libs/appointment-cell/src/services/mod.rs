pub mod availability;
pub mod booking;
pub mod catalog;
pub mod clock;
pub mod lifecycle;
pub mod query;
pub mod sessions;
pub mod slots;
pub mod store;
pub mod wizard;

pub use availability::{is_bookable_date, is_slot_free, AvailabilityFilter};
pub use booking::{AppointmentBookingService, WizardSessionView};
pub use catalog::{InMemoryServiceCatalog, ServiceCatalog};
pub use clock::{Clock, FixedClock, SystemClock};
pub use lifecycle::AppointmentLifecycleService;
pub use query::{query, summarize, visible_to, AppointmentQuery, DateRange, SortField, SortKey, SortOrder, StatusFilter};
pub use sessions::{WizardSession, WizardSessions};
pub use slots::{generate_slots, SlotGenerator};
pub use store::{AppointmentStore, InMemoryAppointmentStore};
pub use wizard::{BookingDraft, BookingEvent, BookingWizard, SubmitValidator, WizardContext, WizardMode, WizardStep};
