//! Vaccination scheduling for health units.
//!
//! Pure rules (eligibility, age, dose counting, appointment windows, operating
//! hours) live in their own modules; `service` combines them with the storage
//! traits of `repository`, and `router` exposes the services over HTTP.

pub mod assignment;
pub mod clock;
pub mod domain;
pub mod eligibility;
pub mod export;
pub mod hours;
pub mod memory;
pub mod patient;
pub mod reception;
pub mod repository;
pub mod router;
pub mod service;
pub mod time_of_day;
pub mod validation;
pub mod window;

#[cfg(test)]
mod tests;

pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::{
    Appointment, AppointmentId, Patient, PatientId, TargetAudience, Ubs, UbsId, UserId,
};
pub use eligibility::{EligibilityRules, SENIOR_GROUP};
pub use hours::{ActiveHoursForm, HolidayCalendar, OperatingHours, TimeComponents};
pub use memory::InMemoryStore;
pub use patient::{DoseStatus, MAX_LOGIN_ATTEMPTS};
pub use reception::{ReceptionEntry, ReceptionError};
pub use repository::{
    AppointmentRepository, PatientRepository, RepositoryError, UbsRepository,
};
pub use router::{scheduling_router, ActingUser, ACTING_USER_HEADER};
pub use service::{
    CheckInSearch, EligibilityView, PatientDetails, PatientService, SchedulingError,
    SlotDurationForm, UnitDashboard, UnitScheduleView, UnitService,
};
pub use time_of_day::TimeOfDay;
pub use validation::{FieldError, PatientForm, ValidationErrors};
