use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use super::domain::{Appointment, Patient};

/// Failed logins tolerated before the account is blocked.
pub const MAX_LOGIN_ATTEMPTS: u32 = 2;

impl Patient {
    /// Whole years elapsed between the birth date and `today`.
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        let birth = self.birth_date;
        if today < birth {
            return 0;
        }

        let mut years = today.year() - birth.year();
        if (today.month(), today.day()) < (birth.month(), birth.day()) {
            years -= 1;
        }
        u32::try_from(years).unwrap_or(0)
    }

    pub fn blocked(&self) -> bool {
        self.login_attempts >= MAX_LOGIN_ATTEMPTS
    }

    pub fn remaining_attempts(&self) -> u32 {
        MAX_LOGIN_ATTEMPTS.saturating_sub(self.login_attempts)
    }

    pub fn in_group(&self, name: &str) -> bool {
        self.groups.iter().any(|group| group == name)
    }
}

/// Dose counters derived from completed appointments.
///
/// Counts active, checked-out appointments until vaccinations are recorded on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DoseStatus {
    pub completed_appointments: usize,
    pub got_first_dose: bool,
    pub got_second_dose: bool,
    pub vaccinated: bool,
}

impl DoseStatus {
    pub fn from_appointments(appointments: &[Appointment]) -> Self {
        let completed_appointments = appointments
            .iter()
            .filter(|appointment| appointment.active && appointment.checked_out())
            .count();

        Self {
            completed_appointments,
            got_first_dose: completed_appointments >= 1,
            got_second_dose: completed_appointments >= 2,
            vaccinated: completed_appointments >= 2,
        }
    }
}

/// Earliest checked-out appointment by start time.
pub fn first_appointment(appointments: &[Appointment]) -> Option<&Appointment> {
    appointments
        .iter()
        .filter(|appointment| appointment.checked_out())
        .min_by_key(|appointment| appointment.start)
}

/// Latest active appointment by start time.
pub fn current_appointment(appointments: &[Appointment]) -> Option<&Appointment> {
    appointments
        .iter()
        .filter(|appointment| appointment.active)
        .max_by_key(|appointment| appointment.start)
}
