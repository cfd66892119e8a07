use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::hours::OperatingHours;

/// Identifier wrapper for registered patients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PatientId(pub u64);

/// Identifier wrapper for appointment slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AppointmentId(pub u64);

/// Identifier wrapper for health units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UbsId(pub u64);

/// Authenticated staff account that operates a unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

macro_rules! display_id {
    ($($name:ident),*) => {
        $(
            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

display_id!(PatientId, AppointmentId, UbsId, UserId);

/// Outreach category declared by the patient at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetAudience {
    Kid,
    Elderly,
    Chronic,
    Disabled,
    Pregnant,
    Postpartum,
    Teacher,
    Over55,
    #[default]
    WithoutTarget,
}

/// Registered patient as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub cpf: String,
    pub name: String,
    pub mother_name: String,
    pub birth_date: NaiveDate,
    pub phone: String,
    pub other_phone: Option<String>,
    pub email: Option<String>,
    pub neighborhood: String,
    pub public_place: Option<String>,
    pub place_number: Option<String>,
    pub sus: Option<String>,
    pub specific_comorbidity: Option<String>,
    pub target_audience: TargetAudience,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub login_attempts: u32,
    #[serde(default)]
    pub bedridden: bool,
    pub main_ubs_id: Option<UbsId>,
}

/// A slot at a unit, optionally booked by a patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub ubs_id: UbsId,
    pub patient_id: Option<PatientId>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub active: bool,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
}

impl Appointment {
    pub fn checked_in(&self) -> bool {
        self.check_in.is_some()
    }

    pub fn checked_out(&self) -> bool {
        self.check_out.is_some()
    }
}

/// Health unit ("UBS") with its scheduling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ubs {
    pub id: UbsId,
    pub name: String,
    pub user_id: UserId,
    pub neighborhoods: Vec<String>,
    pub active: bool,
    pub slot_interval_minutes: u32,
    pub appointments_per_time_slot: u32,
    pub hours: OperatingHours,
}

impl Ubs {
    pub fn serves(&self, neighborhood: &str) -> bool {
        self.neighborhoods.iter().any(|name| name == neighborhood)
    }

    pub fn slot_interval(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.slot_interval_minutes))
    }
}
