use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{Appointment, AppointmentId, Patient, PatientId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReceptionError {
    #[error("patient {0} has no active appointment")]
    NoActiveAppointment(PatientId),
    #[error("appointment {0} is already checked in")]
    AlreadyCheckedIn(AppointmentId),
    #[error("appointment {0} has not been checked in")]
    NotCheckedIn(AppointmentId),
    #[error("appointment {0} is already checked out")]
    AlreadyCheckedOut(AppointmentId),
    #[error("appointment {0} is cancelled")]
    Cancelled(AppointmentId),
}

impl Appointment {
    pub fn check_in_at(&mut self, now: DateTime<Utc>) -> Result<(), ReceptionError> {
        if !self.active {
            return Err(ReceptionError::Cancelled(self.id));
        }
        if self.checked_in() {
            return Err(ReceptionError::AlreadyCheckedIn(self.id));
        }
        self.check_in = Some(now);
        Ok(())
    }

    pub fn check_out_at(&mut self, now: DateTime<Utc>) -> Result<(), ReceptionError> {
        if !self.active {
            return Err(ReceptionError::Cancelled(self.id));
        }
        if !self.checked_in() {
            return Err(ReceptionError::NotCheckedIn(self.id));
        }
        if self.checked_out() {
            return Err(ReceptionError::AlreadyCheckedOut(self.id));
        }
        self.check_out = Some(now);
        Ok(())
    }
}

/// The appointment a check-out applies to: latest active, checked in, still open.
pub fn open_visit(appointments: &[Appointment]) -> Option<&Appointment> {
    appointments
        .iter()
        .filter(|appointment| {
            appointment.active && appointment.checked_in() && !appointment.checked_out()
        })
        .max_by_key(|appointment| appointment.start)
}

/// One row of the reception desk listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceptionEntry {
    pub patient_id: PatientId,
    pub appointment_id: AppointmentId,
    pub name: String,
    pub cpf: String,
    pub start: DateTime<Utc>,
    /// Absolute distance between the start and now, in seconds.
    pub time_delta_seconds: i64,
}

/// Joins appointments with their patients, nearest to `now` first in either direction.
///
/// Appointments whose patient is not in `patients` are skipped.
pub fn reception_entries(
    patients: &[Patient],
    appointments: &[Appointment],
    now: DateTime<Utc>,
) -> Vec<ReceptionEntry> {
    let by_id: HashMap<PatientId, &Patient> =
        patients.iter().map(|patient| (patient.id, patient)).collect();

    let mut entries: Vec<ReceptionEntry> = appointments
        .iter()
        .filter_map(|appointment| {
            let patient = by_id.get(&appointment.patient_id?)?;
            Some(ReceptionEntry {
                patient_id: patient.id,
                appointment_id: appointment.id,
                name: patient.name.clone(),
                cpf: patient.cpf.clone(),
                start: appointment.start,
                time_delta_seconds: (appointment.start - now).num_seconds().abs(),
            })
        })
        .collect();

    entries.sort_by_key(|entry| (entry.time_delta_seconds, entry.appointment_id));
    entries
}
