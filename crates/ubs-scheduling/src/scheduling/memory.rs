//! In-process storage used by the demo server and the test suites.
//!
//! Each collection sits behind its own mutex, so every repository call, bulk
//! updates included, is applied atomically.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::domain::{Appointment, AppointmentId, Patient, PatientId, Ubs, UbsId, UserId};
use super::repository::{
    AppointmentRepository, PatientRepository, RepositoryError, UbsRepository,
};
use super::window::AppointmentFilter;

#[derive(Default, Clone)]
pub struct InMemoryStore {
    patients: Arc<Mutex<BTreeMap<PatientId, Patient>>>,
    appointments: Arc<Mutex<BTreeMap<AppointmentId, Appointment>>>,
    units: Arc<Mutex<BTreeMap<UbsId, Ubs>>>,
    patient_sequence: Arc<AtomicU64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_units(units: impl IntoIterator<Item = Ubs>) -> Self {
        let store = Self::default();
        {
            let mut guard = store.units.lock().expect("unit mutex poisoned");
            for unit in units {
                guard.insert(unit.id, unit);
            }
        }
        store
    }

    pub fn add_appointment(&self, appointment: Appointment) {
        self.appointments
            .lock()
            .expect("appointment mutex poisoned")
            .insert(appointment.id, appointment);
    }

    pub fn patient(&self, id: PatientId) -> Option<Patient> {
        self.patients
            .lock()
            .expect("patient mutex poisoned")
            .get(&id)
            .cloned()
    }

    pub fn appointment(&self, id: AppointmentId) -> Option<Appointment> {
        self.appointments
            .lock()
            .expect("appointment mutex poisoned")
            .get(&id)
            .cloned()
    }

    pub fn unit(&self, id: UbsId) -> Option<Ubs> {
        self.units
            .lock()
            .expect("unit mutex poisoned")
            .get(&id)
            .cloned()
    }

    pub fn appointments(&self) -> Vec<Appointment> {
        self.appointments
            .lock()
            .expect("appointment mutex poisoned")
            .values()
            .cloned()
            .collect()
    }
}

impl PatientRepository for InMemoryStore {
    fn insert(&self, patient: Patient) -> Result<Patient, RepositoryError> {
        let mut guard = self.patients.lock().expect("patient mutex poisoned");
        let duplicate = guard.contains_key(&patient.id)
            || guard.values().any(|existing| existing.cpf == patient.cpf);
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        self.patient_sequence
            .fetch_max(patient.id.0, Ordering::Relaxed);
        guard.insert(patient.id, patient.clone());
        Ok(patient)
    }

    fn update(&self, patient: Patient) -> Result<(), RepositoryError> {
        let mut guard = self.patients.lock().expect("patient mutex poisoned");
        match guard.get_mut(&patient.id) {
            Some(stored) => {
                *stored = patient;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: PatientId) -> Result<Option<Patient>, RepositoryError> {
        let guard = self.patients.lock().expect("patient mutex poisoned");
        Ok(guard.get(&id).cloned())
    }

    fn find_by_cpf(&self, cpf: &str) -> Result<Option<Patient>, RepositoryError> {
        let guard = self.patients.lock().expect("patient mutex poisoned");
        Ok(guard.values().find(|patient| patient.cpf == cpf).cloned())
    }

    fn search_by_name(&self, fragment: &str) -> Result<Vec<Patient>, RepositoryError> {
        let needle = fragment.trim().to_lowercase();
        let guard = self.patients.lock().expect("patient mutex poisoned");
        Ok(guard
            .values()
            .filter(|patient| patient.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    fn fetch_many(&self, ids: &[PatientId]) -> Result<Vec<Patient>, RepositoryError> {
        let guard = self.patients.lock().expect("patient mutex poisoned");
        Ok(ids.iter().filter_map(|id| guard.get(id).cloned()).collect())
    }

    fn bedridden_for_unit(&self, ubs_id: UbsId) -> Result<Vec<Patient>, RepositoryError> {
        let guard = self.patients.lock().expect("patient mutex poisoned");
        Ok(guard
            .values()
            .filter(|patient| patient.bedridden && patient.main_ubs_id == Some(ubs_id))
            .cloned()
            .collect())
    }

    fn next_id(&self) -> Result<PatientId, RepositoryError> {
        Ok(PatientId(
            self.patient_sequence.fetch_add(1, Ordering::Relaxed) + 1,
        ))
    }
}

impl AppointmentRepository for InMemoryStore {
    fn insert(&self, appointment: Appointment) -> Result<Appointment, RepositoryError> {
        let mut guard = self.appointments.lock().expect("appointment mutex poisoned");
        if guard.contains_key(&appointment.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    fn update(&self, appointment: Appointment) -> Result<(), RepositoryError> {
        let mut guard = self.appointments.lock().expect("appointment mutex poisoned");
        match guard.get_mut(&appointment.id) {
            Some(stored) => {
                *stored = appointment;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: AppointmentId) -> Result<Option<Appointment>, RepositoryError> {
        let guard = self.appointments.lock().expect("appointment mutex poisoned");
        Ok(guard.get(&id).cloned())
    }

    fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, RepositoryError> {
        let guard = self.appointments.lock().expect("appointment mutex poisoned");
        let mut rows: Vec<Appointment> = guard
            .values()
            .filter(|appointment| filter.matches(appointment))
            .cloned()
            .collect();
        rows.sort_by_key(|appointment| (appointment.start, appointment.id));
        Ok(rows)
    }

    fn set_active(
        &self,
        filter: &AppointmentFilter,
        active: bool,
    ) -> Result<usize, RepositoryError> {
        let mut guard = self.appointments.lock().expect("appointment mutex poisoned");
        let mut updated = 0;
        for appointment in guard.values_mut().filter(|appointment| filter.matches(appointment)) {
            appointment.active = active;
            updated += 1;
        }
        Ok(updated)
    }
}

impl UbsRepository for InMemoryStore {
    fn fetch(&self, id: UbsId) -> Result<Option<Ubs>, RepositoryError> {
        let guard = self.units.lock().expect("unit mutex poisoned");
        Ok(guard.get(&id).cloned())
    }

    fn find_by_user(&self, user: &UserId) -> Result<Option<Ubs>, RepositoryError> {
        let guard = self.units.lock().expect("unit mutex poisoned");
        Ok(guard.values().find(|unit| &unit.user_id == user).cloned())
    }

    fn all(&self) -> Result<Vec<Ubs>, RepositoryError> {
        let guard = self.units.lock().expect("unit mutex poisoned");
        Ok(guard.values().cloned().collect())
    }

    fn update(&self, ubs: Ubs) -> Result<(), RepositoryError> {
        let mut guard = self.units.lock().expect("unit mutex poisoned");
        match guard.get_mut(&ubs.id) {
            Some(stored) => {
                *stored = ubs;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }
}
