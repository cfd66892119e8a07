use super::domain::{Appointment, AppointmentId, Patient, PatientId, Ubs, UbsId, UserId};
use super::window::AppointmentFilter;

/// Storage abstraction for patients.
pub trait PatientRepository: Send + Sync {
    fn insert(&self, patient: Patient) -> Result<Patient, RepositoryError>;
    fn update(&self, patient: Patient) -> Result<(), RepositoryError>;
    fn fetch(&self, id: PatientId) -> Result<Option<Patient>, RepositoryError>;
    fn find_by_cpf(&self, cpf: &str) -> Result<Option<Patient>, RepositoryError>;
    /// Case-insensitive match anywhere in the name.
    fn search_by_name(&self, fragment: &str) -> Result<Vec<Patient>, RepositoryError>;
    fn fetch_many(&self, ids: &[PatientId]) -> Result<Vec<Patient>, RepositoryError>;
    fn bedridden_for_unit(&self, ubs_id: UbsId) -> Result<Vec<Patient>, RepositoryError>;
    fn next_id(&self) -> Result<PatientId, RepositoryError>;
}

/// Storage abstraction for appointment slots.
pub trait AppointmentRepository: Send + Sync {
    fn insert(&self, appointment: Appointment) -> Result<Appointment, RepositoryError>;
    fn update(&self, appointment: Appointment) -> Result<(), RepositoryError>;
    fn fetch(&self, id: AppointmentId) -> Result<Option<Appointment>, RepositoryError>;
    /// Matching rows ordered by start, then id.
    fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, RepositoryError>;
    fn exists(&self, filter: &AppointmentFilter) -> Result<bool, RepositoryError> {
        Ok(!self.list(filter)?.is_empty())
    }
    /// Sets `active` on every matching row as one operation, returning the row count.
    fn set_active(&self, filter: &AppointmentFilter, active: bool)
        -> Result<usize, RepositoryError>;
}

/// Storage abstraction for health units.
pub trait UbsRepository: Send + Sync {
    fn fetch(&self, id: UbsId) -> Result<Option<Ubs>, RepositoryError>;
    fn find_by_user(&self, user: &UserId) -> Result<Option<Ubs>, RepositoryError>;
    fn all(&self) -> Result<Vec<Ubs>, RepositoryError>;
    /// Replaces the stored unit as a whole.
    fn update(&self, ubs: Ubs) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
