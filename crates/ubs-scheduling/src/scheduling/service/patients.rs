use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use super::SchedulingError;
use crate::config::SchedulingConfig;
use crate::scheduling::assignment::{needs_assignment, select_main_ubs};
use crate::scheduling::clock::{local_date, Clock};
use crate::scheduling::domain::{Patient, PatientId, UbsId};
use crate::scheduling::eligibility::EligibilityRules;
use crate::scheduling::patient::DoseStatus;
use crate::scheduling::repository::{
    AppointmentRepository, PatientRepository, RepositoryError, UbsRepository,
};
use crate::scheduling::validation::{
    cpf_is_valid, normalize_cpf, optional_text, validate_patient, FieldError, PatientDraft,
    PatientForm, ValidationErrors,
};
use crate::scheduling::window::AppointmentFilter;

/// Eligibility and account state exposed to patient-facing callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EligibilityView {
    pub patient_id: PatientId,
    pub age: u32,
    pub conditions: Vec<String>,
    pub can_schedule: bool,
    pub allowed: bool,
    pub blocked: bool,
    pub remaining_attempts: u32,
    pub doses: DoseStatus,
}

/// Service covering registration, profile updates, eligibility and login throttling.
pub struct PatientService<P, A, U> {
    patients: Arc<P>,
    appointments: Arc<A>,
    units: Arc<U>,
    rules: Arc<EligibilityRules>,
    clock: Arc<dyn Clock>,
    config: SchedulingConfig,
}

impl<P, A, U> PatientService<P, A, U>
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
        Self::with_rules(
            patients,
            appointments,
            units,
            clock,
            config,
            EligibilityRules::standard(),
        )
    }

    pub fn with_rules(
        patients: Arc<P>,
        appointments: Arc<A>,
        units: Arc<U>,
        clock: Arc<dyn Clock>,
        config: SchedulingConfig,
        rules: EligibilityRules,
    ) -> Self {
        Self {
            patients,
            appointments,
            units,
            rules: Arc::new(rules),
            clock,
            config,
        }
    }

    fn today(&self) -> NaiveDate {
        local_date(self.clock.now(), self.config.utc_offset)
    }

    /// Validate and store a new patient, assigning a main unit.
    pub fn register(&self, form: PatientForm) -> Result<Patient, SchedulingError> {
        let taken = match form.cpf.as_deref().map(normalize_cpf) {
            Some(cpf) if cpf_is_valid(&cpf) => self.patients.find_by_cpf(&cpf)?.is_some(),
            _ => false,
        };
        let draft = validate_patient(&form, |_| taken)?;
        let main_ubs_id = self.pick_main_ubs(&draft.neighborhood)?;

        let patient = build_patient(self.patients.next_id()?, draft, &form, main_ubs_id);
        // A concurrent registration may claim the CPF after the lookup above.
        let stored = match self.patients.insert(patient) {
            Err(RepositoryError::Conflict) => {
                let mut errors = ValidationErrors::default();
                errors.add("cpf", FieldError::Taken);
                return Err(errors.into());
            }
            other => other?,
        };

        info!(
            patient_id = %stored.id,
            main_ubs = ?stored.main_ubs_id,
            "patient registered"
        );
        Ok(stored)
    }

    /// Apply profile changes; the CPF cannot be changed.
    pub fn update(&self, id: PatientId, changes: PatientForm) -> Result<Patient, SchedulingError> {
        let current = self.get(id)?;
        let form = PatientForm::from_patient(&current).merged_with(changes);
        let draft = validate_patient(&form, |_| false)?;

        let main_ubs_id = if needs_assignment(
            current.main_ubs_id,
            Some(&current.neighborhood),
            &draft.neighborhood,
        ) {
            self.pick_main_ubs(&draft.neighborhood)?
        } else {
            current.main_ubs_id
        };

        let mut updated = build_patient(id, draft, &form, main_ubs_id);
        updated.groups = current.groups;
        updated.login_attempts = current.login_attempts;

        self.patients.update(updated.clone())?;
        Ok(updated)
    }

    pub fn get(&self, id: PatientId) -> Result<Patient, SchedulingError> {
        self.patients
            .fetch(id)?
            .ok_or(SchedulingError::PatientNotFound(id))
    }

    pub fn eligibility(&self, id: PatientId) -> Result<EligibilityView, SchedulingError> {
        let patient = self.get(id)?;
        let now = self.clock.now();
        let today = local_date(now, self.config.utc_offset);

        let has_future_active = self.appointments.exists(
            &AppointmentFilter::for_patients([id])
                .starting_from(now)
                .active(true),
        )?;
        let history = self
            .appointments
            .list(&AppointmentFilter::for_patients([id]))?;

        let conditions = self.rules.conditions(&patient, today);
        Ok(EligibilityView {
            patient_id: id,
            age: patient.age_on(today),
            can_schedule: !conditions.is_empty(),
            allowed: self.rules.allowed(&patient, today, has_future_active),
            conditions: conditions.into_iter().map(str::to_string).collect(),
            blocked: patient.blocked(),
            remaining_attempts: patient.remaining_attempts(),
            doses: DoseStatus::from_appointments(&history),
        })
    }

    /// Labels of the groups the patient currently satisfies.
    pub fn conditions(&self, id: PatientId) -> Result<Vec<&'static str>, SchedulingError> {
        let patient = self.get(id)?;
        Ok(self.rules.conditions(&patient, self.today()))
    }

    /// Record a failed login; the counter is persisted before returning.
    pub fn increase_login_attempts(&self, id: PatientId) -> Result<Patient, SchedulingError> {
        let mut patient = self.get(id)?;
        patient.login_attempts = patient.login_attempts.saturating_add(1);
        self.patients.update(patient.clone())?;

        if patient.blocked() {
            warn!(patient_id = %id, attempts = patient.login_attempts, "patient account blocked");
        }
        Ok(patient)
    }

    pub fn unblock(&self, id: PatientId) -> Result<Patient, SchedulingError> {
        let mut patient = self.get(id)?;
        patient.login_attempts = 0;
        self.patients.update(patient.clone())?;
        info!(patient_id = %id, "patient account unblocked");
        Ok(patient)
    }

    pub fn dose_status(&self, id: PatientId) -> Result<DoseStatus, SchedulingError> {
        self.get(id)?;
        let history = self
            .appointments
            .list(&AppointmentFilter::for_patients([id]))?;
        Ok(DoseStatus::from_appointments(&history))
    }

    fn pick_main_ubs(&self, neighborhood: &str) -> Result<Option<UbsId>, SchedulingError> {
        let units = self.units.all()?;
        let assignment = select_main_ubs(&units, neighborhood, &mut rand::thread_rng());
        if assignment.is_none() {
            warn!(neighborhood, "no health unit available for main unit assignment");
        }
        Ok(assignment.map(|assignment| assignment.ubs_id))
    }
}

fn build_patient(
    id: PatientId,
    draft: PatientDraft,
    form: &PatientForm,
    main_ubs_id: Option<UbsId>,
) -> Patient {
    Patient {
        id,
        cpf: draft.cpf,
        name: draft.name,
        mother_name: draft.mother_name,
        birth_date: draft.birth_date,
        phone: draft.phone,
        other_phone: optional_text(form.other_phone.as_deref()),
        email: optional_text(form.email.as_deref()),
        neighborhood: draft.neighborhood,
        public_place: optional_text(form.public_place.as_deref()),
        place_number: optional_text(form.place_number.as_deref()),
        sus: optional_text(form.sus.as_deref()),
        specific_comorbidity: optional_text(form.specific_comorbidity.as_deref()),
        target_audience: form.target_audience.unwrap_or_default(),
        groups: Vec::new(),
        login_attempts: 0,
        bedridden: form.bedridden.unwrap_or(false),
        main_ubs_id,
    }
}
