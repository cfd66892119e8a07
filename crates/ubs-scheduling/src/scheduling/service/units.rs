use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::SchedulingError;
use crate::config::SchedulingConfig;
use crate::scheduling::clock::{day_bounds, local_date, Clock};
use crate::scheduling::domain::{Appointment, AppointmentId, Patient, PatientId, Ubs, UserId};
use crate::scheduling::eligibility::EligibilityRules;
use crate::scheduling::export::{export_rows, AppointmentExportRow};
use crate::scheduling::hours::ActiveHoursForm;
use crate::scheduling::patient::current_appointment;
use crate::scheduling::reception::{open_visit, reception_entries, ReceptionEntry, ReceptionError};
use crate::scheduling::repository::{AppointmentRepository, PatientRepository, UbsRepository};
use crate::scheduling::validation::normalize_cpf;
use crate::scheduling::window::{
    active_future_appointments, awaiting_checkout, future_appointments,
    inactive_future_appointments, AppointmentFilter,
};

/// Upcoming booked appointments of a unit plus its bedridden patients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitDashboard {
    pub unit: Ubs,
    pub appointments: Vec<Appointment>,
    pub bedridden_patients: Vec<Patient>,
}

/// A unit's configuration next to the active appointments it affects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitScheduleView {
    pub unit: Ubs,
    pub appointments: Vec<Appointment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDurationForm {
    pub slot_interval_minutes: u32,
    pub appointments_per_time_slot: u32,
}

/// Reception search; a CPF wins over a name when both are given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CheckInSearch {
    #[serde(default)]
    pub cpf: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientDetails {
    pub id: PatientId,
    pub name: String,
    pub cpf: String,
    pub groups: Vec<String>,
    pub appointment: Option<Appointment>,
}

/// Service covering everything a unit's staff does: hours, slots,
/// cancellations and the reception desk.
pub struct UnitService<P, A, U> {
    patients: Arc<P>,
    appointments: Arc<A>,
    units: Arc<U>,
    rules: Arc<EligibilityRules>,
    clock: Arc<dyn Clock>,
    config: SchedulingConfig,
}

impl<P, A, U> UnitService<P, A, U>
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    pub fn new(
        patients: Arc<P>,
        appointments: Arc<A>,
        units: Arc<U>,
        clock: Arc<dyn Clock>,
        config: SchedulingConfig,
    ) -> Self {
        Self {
            patients,
            appointments,
            units,
            rules: Arc::new(EligibilityRules::standard()),
            clock,
            config,
        }
    }

    pub fn with_rules(mut self, rules: EligibilityRules) -> Self {
        self.rules = Arc::new(rules);
        self
    }

    pub fn unit_for_user(&self, user: &UserId) -> Result<Ubs, SchedulingError> {
        self.units
            .find_by_user(user)?
            .ok_or_else(|| SchedulingError::UnitNotFound(user.clone()))
    }

    pub fn dashboard(&self, user: &UserId) -> Result<UnitDashboard, SchedulingError> {
        let unit = self.unit_for_user(user)?;
        let appointments = self
            .appointments
            .list(&future_appointments(&unit, self.clock.now()).with_patient())?;
        let bedridden_patients = self.patients.bedridden_for_unit(unit.id)?;

        Ok(UnitDashboard {
            unit,
            appointments,
            bedridden_patients,
        })
    }

    pub fn active_hours(&self, user: &UserId) -> Result<UnitScheduleView, SchedulingError> {
        self.schedule_view(self.unit_for_user(user)?)
    }

    pub fn slot_duration(&self, user: &UserId) -> Result<UnitScheduleView, SchedulingError> {
        self.schedule_view(self.unit_for_user(user)?)
    }

    /// Replaces all operating hours at once; nothing is stored if any field is invalid.
    pub fn change_active_hours(
        &self,
        user: &UserId,
        form: &ActiveHoursForm,
    ) -> Result<Ubs, SchedulingError> {
        let mut unit = self.unit_for_user(user)?;
        unit.hours = form.parse()?;
        self.units.update(unit.clone())?;

        info!(
            ubs_id = %unit.id,
            open_saturday = unit.hours.open_saturday,
            "operating hours changed"
        );
        Ok(unit)
    }

    pub fn change_slot_duration(
        &self,
        user: &UserId,
        form: SlotDurationForm,
    ) -> Result<Ubs, SchedulingError> {
        if form.slot_interval_minutes == 0 {
            return Err(SchedulingError::InvalidSlotDuration("slot_interval_minutes"));
        }
        if form.appointments_per_time_slot == 0 {
            return Err(SchedulingError::InvalidSlotDuration(
                "appointments_per_time_slot",
            ));
        }

        let mut unit = self.unit_for_user(user)?;
        unit.slot_interval_minutes = form.slot_interval_minutes;
        unit.appointments_per_time_slot = form.appointments_per_time_slot;
        self.units.update(unit.clone())?;

        info!(
            ubs_id = %unit.id,
            slot_interval_minutes = unit.slot_interval_minutes,
            appointments_per_time_slot = unit.appointments_per_time_slot,
            "slot duration changed"
        );
        Ok(unit)
    }

    pub fn set_unit_active(&self, user: &UserId, active: bool) -> Result<Ubs, SchedulingError> {
        let mut unit = self.unit_for_user(user)?;
        unit.active = active;
        self.units.update(unit.clone())?;
        info!(ubs_id = %unit.id, active, "unit availability changed");
        Ok(unit)
    }

    pub fn cancel_appointment(
        &self,
        user: &UserId,
        id: AppointmentId,
    ) -> Result<Appointment, SchedulingError> {
        self.toggle_appointment(user, id, false)
    }

    pub fn activate_appointment(
        &self,
        user: &UserId,
        id: AppointmentId,
    ) -> Result<Appointment, SchedulingError> {
        self.toggle_appointment(user, id, true)
    }

    /// Cancels every appointment inside the future window, including the one-slot grace
    /// period; returns how many matched.
    pub fn cancel_all_future_appointments(&self, user: &UserId) -> Result<usize, SchedulingError> {
        let unit = self.unit_for_user(user)?;
        let filter = future_appointments(&unit, self.clock.now());
        let updated = self.appointments.set_active(&filter, false)?;
        info!(ubs_id = %unit.id, updated, "future appointments cancelled");
        Ok(updated)
    }

    /// Reactivates cancelled appointments inside the grace window; returns how many changed.
    pub fn activate_all_future_appointments(
        &self,
        user: &UserId,
    ) -> Result<usize, SchedulingError> {
        let unit = self.unit_for_user(user)?;
        let filter = inactive_future_appointments(&unit, self.clock.now());
        let updated = self.appointments.set_active(&filter, true)?;
        info!(ubs_id = %unit.id, updated, "future appointments reactivated");
        Ok(updated)
    }

    /// Patients matching the search with their appointments not yet checked in.
    pub fn find_patients(
        &self,
        search: &CheckInSearch,
    ) -> Result<Vec<ReceptionEntry>, SchedulingError> {
        let patients = match (search.cpf.as_deref(), search.name.as_deref()) {
            (Some(cpf), _) if !cpf.trim().is_empty() => self
                .patients
                .find_by_cpf(&normalize_cpf(cpf))?
                .into_iter()
                .collect(),
            (_, Some(name)) if !name.trim().is_empty() => self.patients.search_by_name(name)?,
            _ => Vec::new(),
        };
        if patients.is_empty() {
            return Ok(Vec::new());
        }

        let appointments = self.appointments.list(
            &AppointmentFilter::for_patients(patients.iter().map(|patient| patient.id))
                .checked_in(false),
        )?;
        Ok(reception_entries(&patients, &appointments, self.clock.now()))
    }

    /// Patients awaiting check-out for tomorrow's appointments, nearest first.
    pub fn checkout_list(&self) -> Result<Vec<ReceptionEntry>, SchedulingError> {
        let now = self.clock.now();
        let tomorrow = local_date(now, self.config.utc_offset) + Duration::days(1);
        let (day_start, day_end) = day_bounds(tomorrow, self.config.utc_offset);

        let pending = self
            .appointments
            .list(&awaiting_checkout(day_start, day_end))?;
        let ids: Vec<PatientId> = pending
            .iter()
            .filter_map(|appointment| appointment.patient_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let patients = self.patients.fetch_many(&ids)?;
        let appointments = self
            .appointments
            .list(&AppointmentFilter::for_patients(ids).checked_in(true))?;
        Ok(reception_entries(&patients, &appointments, now))
    }

    pub fn confirm_check_in(&self, patient_id: PatientId) -> Result<Appointment, SchedulingError> {
        let history = self.patient_appointments(patient_id)?;
        let mut appointment = current_appointment(&history)
            .cloned()
            .ok_or(ReceptionError::NoActiveAppointment(patient_id))?;

        appointment.check_in_at(self.clock.now())?;
        self.appointments.update(appointment.clone())?;
        info!(patient_id = %patient_id, appointment_id = %appointment.id, "patient checked in");
        Ok(appointment)
    }

    pub fn confirm_check_out(&self, patient_id: PatientId) -> Result<Appointment, SchedulingError> {
        let history = self.patient_appointments(patient_id)?;
        let Some(open) = open_visit(&history) else {
            let current = current_appointment(&history)
                .ok_or(ReceptionError::NoActiveAppointment(patient_id))?;
            let error = if current.checked_out() {
                ReceptionError::AlreadyCheckedOut(current.id)
            } else {
                ReceptionError::NotCheckedIn(current.id)
            };
            return Err(error.into());
        };

        let mut appointment = open.clone();
        appointment.check_out_at(self.clock.now())?;
        self.appointments.update(appointment.clone())?;
        info!(patient_id = %patient_id, appointment_id = %appointment.id, "patient checked out");
        Ok(appointment)
    }

    pub fn patient_details(
        &self,
        patient_id: PatientId,
    ) -> Result<PatientDetails, SchedulingError> {
        let patient = self
            .patients
            .fetch(patient_id)?
            .ok_or(SchedulingError::PatientNotFound(patient_id))?;
        let today = local_date(self.clock.now(), self.config.utc_offset);

        let appointment = self
            .appointments
            .list(&AppointmentFilter::for_patients([patient_id]).checked_out(false))?
            .into_iter()
            .max_by_key(|appointment| appointment.start);

        Ok(PatientDetails {
            id: patient.id,
            groups: self
                .rules
                .conditions(&patient, today)
                .into_iter()
                .map(str::to_string)
                .collect(),
            name: patient.name,
            cpf: patient.cpf,
            appointment,
        })
    }

    /// The unit's appointments on today's local calendar day, by start.
    pub fn today_appointments(&self, user: &UserId) -> Result<Vec<Appointment>, SchedulingError> {
        let unit = self.unit_for_user(user)?;
        let today = local_date(self.clock.now(), self.config.utc_offset);
        let (day_start, day_end) = day_bounds(today, self.config.utc_offset);
        Ok(self.appointments.list(
            &AppointmentFilter::for_unit(unit.id).starting_between(day_start, day_end),
        )?)
    }

    pub fn today_export(
        &self,
        user: &UserId,
    ) -> Result<(NaiveDate, Vec<AppointmentExportRow>), SchedulingError> {
        let appointments = self.today_appointments(user)?;
        let ids: Vec<PatientId> = appointments
            .iter()
            .filter_map(|appointment| appointment.patient_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let patients = if ids.is_empty() {
            Vec::new()
        } else {
            self.patients.fetch_many(&ids)?
        };

        let today = local_date(self.clock.now(), self.config.utc_offset);
        Ok((
            today,
            export_rows(&appointments, &patients, self.config.utc_offset),
        ))
    }

    fn schedule_view(&self, unit: Ubs) -> Result<UnitScheduleView, SchedulingError> {
        let appointments = self
            .appointments
            .list(&active_future_appointments(&unit, self.clock.now()))?;
        Ok(UnitScheduleView { unit, appointments })
    }

    fn toggle_appointment(
        &self,
        user: &UserId,
        id: AppointmentId,
        active: bool,
    ) -> Result<Appointment, SchedulingError> {
        let unit = self.unit_for_user(user)?;
        let mut appointment = self
            .appointments
            .fetch(id)?
            .filter(|appointment| appointment.ubs_id == unit.id)
            .ok_or(SchedulingError::AppointmentNotFound(id))?;

        appointment.active = active;
        self.appointments.update(appointment.clone())?;
        info!(ubs_id = %unit.id, appointment_id = %id, active, "appointment toggled");
        Ok(appointment)
    }

    fn patient_appointments(
        &self,
        patient_id: PatientId,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        if self.patients.fetch(patient_id)?.is_none() {
            return Err(SchedulingError::PatientNotFound(patient_id));
        }
        Ok(self
            .appointments
            .list(&AppointmentFilter::for_patients([patient_id]))?)
    }
}
