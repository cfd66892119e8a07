use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::Response;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::config::SchedulingConfig;
use crate::scheduling::clock::FixedClock;
use crate::scheduling::domain::{
    Appointment, AppointmentId, Patient, PatientId, TargetAudience, Ubs, UbsId, UserId,
};
use crate::scheduling::hours::OperatingHours;
use crate::scheduling::memory::InMemoryStore;
use crate::scheduling::repository::{
    AppointmentRepository, PatientRepository, RepositoryError, UbsRepository,
};
use crate::scheduling::service::{PatientService, UnitService};
use crate::scheduling::time_of_day::TimeOfDay;
use crate::scheduling::validation::PatientForm;
use crate::scheduling::window::AppointmentFilter;

pub(super) const SENIOR_CPF: &str = "52998224725";
pub(super) const YOUNG_CPF: &str = "11144477735";
pub(super) const UNIT_USER: &str = "ubs-centro";

/// Monday 2026-10-19, 09:00 on the clinic's calendar.
pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
}

pub(super) fn offset() -> FixedOffset {
    FixedOffset::west_opt(3 * 3600).expect("valid offset")
}

pub(super) fn config() -> SchedulingConfig {
    SchedulingConfig {
        utc_offset: offset(),
    }
}

pub(super) fn time(hour: u32, minute: u32) -> TimeOfDay {
    TimeOfDay::new(hour, minute).expect("valid time")
}

pub(super) fn hours() -> OperatingHours {
    OperatingHours {
        shift_start: time(8, 0),
        break_start: time(12, 0),
        break_end: time(13, 0),
        shift_end: time(17, 0),
        open_saturday: false,
        saturday_shift_start: time(8, 0),
        saturday_break_start: time(10, 0),
        saturday_break_end: time(10, 30),
        saturday_shift_end: time(12, 0),
    }
}

pub(super) fn unit(id: u64, user: &str, neighborhoods: &[&str], active: bool) -> Ubs {
    Ubs {
        id: UbsId(id),
        name: format!("UBS {id}"),
        user_id: UserId(user.to_string()),
        neighborhoods: neighborhoods.iter().map(|name| name.to_string()).collect(),
        active,
        slot_interval_minutes: 15,
        appointments_per_time_slot: 2,
        hours: hours(),
    }
}

pub(super) fn user() -> UserId {
    UserId(UNIT_USER.to_string())
}

pub(super) fn form(cpf: &str, name: &str, birth_date: &str) -> PatientForm {
    PatientForm {
        cpf: Some(cpf.to_string()),
        name: Some(name.to_string()),
        mother_name: Some("Ana Souza".to_string()),
        birth_date: Some(birth_date.to_string()),
        phone: Some("(11) 98765-4321".to_string()),
        neighborhood: Some("Centro".to_string()),
        ..PatientForm::default()
    }
}

pub(super) fn senior_form() -> PatientForm {
    form(SENIOR_CPF, "Maria da Silva", "1950-03-10")
}

pub(super) fn young_form() -> PatientForm {
    form(YOUNG_CPF, "Joao Pereira", "1990-05-20")
}

pub(super) fn stored_patient(id: u64, cpf: &str, name: &str) -> Patient {
    Patient {
        id: PatientId(id),
        cpf: cpf.to_string(),
        name: name.to_string(),
        mother_name: "Ana Souza".to_string(),
        birth_date: NaiveDate::from_ymd_opt(1950, 3, 10).expect("valid date"),
        phone: "11987654321".to_string(),
        other_phone: None,
        email: None,
        neighborhood: "Centro".to_string(),
        public_place: None,
        place_number: None,
        sus: None,
        specific_comorbidity: None,
        target_audience: TargetAudience::Elderly,
        groups: Vec::new(),
        login_attempts: 0,
        bedridden: false,
        main_ubs_id: Some(UbsId(1)),
    }
}

/// Slot at unit 1 starting `minutes` after `now()`.
pub(super) fn slot(id: u64, patient: Option<u64>, minutes: i64, active: bool) -> Appointment {
    let start = now() + Duration::minutes(minutes);
    Appointment {
        id: AppointmentId(id),
        ubs_id: UbsId(1),
        patient_id: patient.map(PatientId),
        start,
        end: start + Duration::minutes(15),
        active,
        check_in: None,
        check_out: None,
    }
}

pub(super) struct Fixture {
    pub(super) store: InMemoryStore,
    pub(super) patients: PatientService<InMemoryStore, InMemoryStore, InMemoryStore>,
    pub(super) units: UnitService<InMemoryStore, InMemoryStore, InMemoryStore>,
}

pub(super) fn fixture() -> Fixture {
    fixture_at(now())
}

pub(super) fn fixture_at(instant: DateTime<Utc>) -> Fixture {
    let store = InMemoryStore::with_units([
        unit(1, UNIT_USER, &["Centro"], true),
        unit(2, "ubs-norte", &["Vila Nova"], true),
    ]);
    let shared = Arc::new(store.clone());
    let clock = Arc::new(FixedClock(instant));

    Fixture {
        patients: PatientService::new(
            shared.clone(),
            shared.clone(),
            shared.clone(),
            clock.clone(),
            config(),
        ),
        units: UnitService::new(shared.clone(), shared.clone(), shared, clock, config()),
        store,
    }
}

pub(super) fn unit_service_with(
    store: UnavailableStore,
) -> UnitService<InMemoryStore, UnavailableStore, InMemoryStore> {
    let shared = Arc::new(InMemoryStore::with_units([unit(1, UNIT_USER, &["Centro"], true)]));
    UnitService::new(
        shared.clone(),
        Arc::new(store),
        shared,
        Arc::new(FixedClock(now())),
        config(),
    )
}

/// Storage that fails every call.
#[derive(Debug, Default, Clone, Copy)]
pub(super) struct UnavailableStore;

fn unavailable<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl PatientRepository for UnavailableStore {
    fn insert(&self, _: Patient) -> Result<Patient, RepositoryError> {
        unavailable()
    }

    fn update(&self, _: Patient) -> Result<(), RepositoryError> {
        unavailable()
    }

    fn fetch(&self, _: PatientId) -> Result<Option<Patient>, RepositoryError> {
        unavailable()
    }

    fn find_by_cpf(&self, _: &str) -> Result<Option<Patient>, RepositoryError> {
        unavailable()
    }

    fn search_by_name(&self, _: &str) -> Result<Vec<Patient>, RepositoryError> {
        unavailable()
    }

    fn fetch_many(&self, _: &[PatientId]) -> Result<Vec<Patient>, RepositoryError> {
        unavailable()
    }

    fn bedridden_for_unit(&self, _: UbsId) -> Result<Vec<Patient>, RepositoryError> {
        unavailable()
    }

    fn next_id(&self) -> Result<PatientId, RepositoryError> {
        unavailable()
    }
}

impl AppointmentRepository for UnavailableStore {
    fn insert(&self, _: Appointment) -> Result<Appointment, RepositoryError> {
        unavailable()
    }

    fn update(&self, _: Appointment) -> Result<(), RepositoryError> {
        unavailable()
    }

    fn fetch(&self, _: AppointmentId) -> Result<Option<Appointment>, RepositoryError> {
        unavailable()
    }

    fn list(&self, _: &AppointmentFilter) -> Result<Vec<Appointment>, RepositoryError> {
        unavailable()
    }

    fn set_active(&self, _: &AppointmentFilter, _: bool) -> Result<usize, RepositoryError> {
        unavailable()
    }
}

impl UbsRepository for UnavailableStore {
    fn fetch(&self, _: UbsId) -> Result<Option<Ubs>, RepositoryError> {
        unavailable()
    }

    fn find_by_user(&self, _: &UserId) -> Result<Option<Ubs>, RepositoryError> {
        unavailable()
    }

    fn all(&self) -> Result<Vec<Ubs>, RepositoryError> {
        unavailable()
    }

    fn update(&self, _: Ubs) -> Result<(), RepositoryError> {
        unavailable()
    }
}

/// Patient storage whose CPF lookup misses rows another writer already stored.
#[derive(Clone)]
pub(super) struct StaleLookupStore(pub(super) InMemoryStore);

impl PatientRepository for StaleLookupStore {
    fn insert(&self, patient: Patient) -> Result<Patient, RepositoryError> {
        PatientRepository::insert(&self.0, patient)
    }

    fn update(&self, patient: Patient) -> Result<(), RepositoryError> {
        PatientRepository::update(&self.0, patient)
    }

    fn fetch(&self, id: PatientId) -> Result<Option<Patient>, RepositoryError> {
        PatientRepository::fetch(&self.0, id)
    }

    fn find_by_cpf(&self, _: &str) -> Result<Option<Patient>, RepositoryError> {
        Ok(None)
    }

    fn search_by_name(&self, fragment: &str) -> Result<Vec<Patient>, RepositoryError> {
        self.0.search_by_name(fragment)
    }

    fn fetch_many(&self, ids: &[PatientId]) -> Result<Vec<Patient>, RepositoryError> {
        self.0.fetch_many(ids)
    }

    fn bedridden_for_unit(&self, ubs_id: UbsId) -> Result<Vec<Patient>, RepositoryError> {
        self.0.bedridden_for_unit(ubs_id)
    }

    fn next_id(&self) -> Result<PatientId, RepositoryError> {
        self.0.next_id()
    }
}

pub(super) fn stale_lookup_fixture(
    store: &InMemoryStore,
) -> PatientService<StaleLookupStore, InMemoryStore, InMemoryStore> {
    let shared = Arc::new(store.clone());
    PatientService::new(
        Arc::new(StaleLookupStore(store.clone())),
        shared.clone(),
        shared,
        Arc::new(FixedClock(now())),
        config(),
    )
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub(super) fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected, "unexpected status");
}
