mod patients;
mod units;

pub use patients::{EligibilityView, PatientService};
pub use units::{
    CheckInSearch, PatientDetails, SlotDurationForm, UnitDashboard, UnitScheduleView, UnitService,
};

use super::domain::{AppointmentId, PatientId, UserId};
use super::hours::HoursError;
use super::reception::ReceptionError;
use super::repository::RepositoryError;
use super::validation::ValidationErrors;

/// Error raised by the scheduling services.
#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("patient {0} not found")]
    PatientNotFound(PatientId),
    #[error("appointment {0} not found")]
    AppointmentNotFound(AppointmentId),
    #[error("no health unit is linked to user {0}")]
    UnitNotFound(UserId),
    #[error(transparent)]
    Reception(#[from] ReceptionError),
    #[error(transparent)]
    Hours(#[from] HoursError),
    #[error("{0} must be greater than zero")]
    InvalidSlotDuration(&'static str),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
