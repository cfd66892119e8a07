use std::sync::Arc;

use super::common::*;
use crate::scheduling::clock::FixedClock;
use crate::scheduling::domain::{PatientId, TargetAudience, UbsId};
use crate::scheduling::memory::InMemoryStore;
use crate::scheduling::repository::{PatientRepository, RepositoryError};
use crate::scheduling::service::{PatientService, SchedulingError};
use crate::scheduling::validation::{FieldError, PatientForm};

#[test]
fn registration_normalizes_and_assigns_neighborhood_unit() {
    let fixture = fixture();
    let mut form = senior_form();
    form.cpf = Some("529.982.247-25".to_string());
    form.email = Some("  ".to_string());
    form.target_audience = Some(TargetAudience::Elderly);

    let patient = fixture.patients.register(form).expect("registration succeeds");

    assert_eq!(patient.cpf, SENIOR_CPF);
    assert_eq!(patient.phone, "11987654321");
    assert_eq!(patient.email, None);
    assert_eq!(patient.target_audience, TargetAudience::Elderly);
    assert_eq!(patient.main_ubs_id, Some(UbsId(1)));
    assert_eq!(patient.login_attempts, 0);
    assert_eq!(fixture.store.patient(patient.id), Some(patient));
}

#[test]
fn registration_reports_every_failing_field() {
    let fixture = fixture();
    let form = PatientForm {
        cpf: Some("123.456.789-00".to_string()),
        phone: Some("123".to_string()),
        birth_date: Some("31/02/1950".to_string()),
        ..PatientForm::default()
    };

    let error = fixture.patients.register(form).expect_err("invalid form");
    let SchedulingError::Validation(errors) = &error else {
        panic!("expected validation error, got {error:?}");
    };

    assert_eq!(errors.on("cpf"), [FieldError::Invalid]);
    assert_eq!(errors.on("phone"), [FieldError::Invalid]);
    assert_eq!(errors.on("birth_date"), [FieldError::Invalid]);
    assert_eq!(errors.on("name"), [FieldError::Blank]);
    assert_eq!(errors.on("mother_name"), [FieldError::Blank]);
    assert_eq!(errors.on("neighborhood"), [FieldError::Blank]);
    assert!(fixture.store.patient(PatientId(1)).is_none());
}

#[test]
fn duplicate_cpf_is_reported_as_taken() {
    let fixture = fixture();
    fixture.patients.register(senior_form()).expect("first registration");

    let error = fixture
        .patients
        .register(senior_form())
        .expect_err("duplicate cpf");

    let SchedulingError::Validation(errors) = &error else {
        panic!("expected validation error, got {error:?}");
    };
    assert_eq!(errors.on("cpf"), [FieldError::Taken]);
}

#[test]
fn cpf_claimed_between_lookup_and_insert_is_reported_as_taken() {
    let store = InMemoryStore::with_units([unit(1, UNIT_USER, &["Centro"], true)]);
    PatientRepository::insert(&store, stored_patient(1, SENIOR_CPF, "Maria da Silva"))
        .expect("seeded");
    let service = stale_lookup_fixture(&store);

    let error = service
        .register(senior_form())
        .expect_err("cpf already stored");

    let SchedulingError::Validation(errors) = &error else {
        panic!("expected validation error, got {error:?}");
    };
    assert_eq!(errors.on("cpf"), [FieldError::Taken]);
    assert!(store.patient(PatientId(2)).is_none());
}

#[test]
fn registration_falls_back_to_any_active_unit() {
    let fixture = fixture();
    let mut form = young_form();
    form.neighborhood = Some("Jardim Sem Unidade".to_string());

    let patient = fixture.patients.register(form).expect("registration succeeds");

    assert!(matches!(patient.main_ubs_id, Some(UbsId(1)) | Some(UbsId(2))));
}

#[test]
fn registration_without_units_leaves_main_unit_empty() {
    let store = Arc::new(InMemoryStore::new());
    let service = PatientService::new(
        store.clone(),
        store.clone(),
        store,
        Arc::new(FixedClock(now())),
        config(),
    );

    let patient = service.register(senior_form()).expect("registration succeeds");

    assert_eq!(patient.main_ubs_id, None);
}

#[test]
fn update_keeps_cpf_and_reassigns_on_neighborhood_change() {
    let fixture = fixture();
    let patient = fixture.patients.register(senior_form()).expect("registered");

    let changes = PatientForm {
        cpf: Some(YOUNG_CPF.to_string()),
        neighborhood: Some("Vila Nova".to_string()),
        bedridden: Some(true),
        ..PatientForm::default()
    };
    let updated = fixture
        .patients
        .update(patient.id, changes)
        .expect("update succeeds");

    assert_eq!(updated.cpf, SENIOR_CPF);
    assert_eq!(updated.neighborhood, "Vila Nova");
    assert_eq!(updated.main_ubs_id, Some(UbsId(2)));
    assert!(updated.bedridden);
    assert_eq!(updated.name, patient.name);
}

#[test]
fn update_keeps_main_unit_when_neighborhood_is_unchanged() {
    let fixture = fixture();
    let patient = fixture.patients.register(senior_form()).expect("registered");

    let changes = PatientForm {
        phone: Some("11 3333-4444".to_string()),
        ..PatientForm::default()
    };
    let updated = fixture
        .patients
        .update(patient.id, changes)
        .expect("update succeeds");

    assert_eq!(updated.phone, "1133334444");
    assert_eq!(updated.main_ubs_id, patient.main_ubs_id);
}

#[test]
fn update_rejects_invalid_changes_without_storing() {
    let fixture = fixture();
    let patient = fixture.patients.register(senior_form()).expect("registered");

    let changes = PatientForm {
        name: Some("   ".to_string()),
        ..PatientForm::default()
    };
    let error = fixture
        .patients
        .update(patient.id, changes)
        .expect_err("blank name");

    assert!(matches!(error, SchedulingError::Validation(_)));
    assert_eq!(fixture.store.patient(patient.id), Some(patient));
}

#[test]
fn two_failed_logins_block_and_unblock_clears() {
    let fixture = fixture();
    let patient = fixture.patients.register(senior_form()).expect("registered");

    let first = fixture
        .patients
        .increase_login_attempts(patient.id)
        .expect("first failure");
    assert!(!first.blocked());
    assert_eq!(first.remaining_attempts(), 1);

    let second = fixture
        .patients
        .increase_login_attempts(patient.id)
        .expect("second failure");
    assert!(second.blocked());
    assert_eq!(second.remaining_attempts(), 0);
    assert_eq!(
        fixture.store.patient(patient.id).map(|p| p.login_attempts),
        Some(2)
    );

    let third = fixture
        .patients
        .increase_login_attempts(patient.id)
        .expect("third failure");
    assert_eq!(third.remaining_attempts(), 0);

    let unblocked = fixture.patients.unblock(patient.id).expect("unblock");
    assert!(!unblocked.blocked());
    assert_eq!(
        fixture.store.patient(patient.id).map(|p| p.login_attempts),
        Some(0)
    );
}

#[test]
fn unknown_patient_is_not_found() {
    let fixture = fixture();

    let error = fixture
        .patients
        .increase_login_attempts(PatientId(404))
        .expect_err("missing patient");

    assert!(matches!(error, SchedulingError::PatientNotFound(PatientId(404))));
}

#[test]
fn doses_count_completed_appointments() {
    let fixture = fixture();
    let patient = fixture.patients.register(senior_form()).expect("registered");

    let mut first = slot(1, Some(patient.id.0), -60 * 24 * 30, true);
    first.check_in = Some(first.start);
    first.check_out = Some(first.end);
    fixture.store.add_appointment(first);

    let status = fixture.patients.dose_status(patient.id).expect("doses");
    assert_eq!(status.completed_appointments, 1);
    assert!(status.got_first_dose);
    assert!(!status.vaccinated);
}

#[test]
fn storage_failures_propagate() {
    let service = PatientService::new(
        Arc::new(UnavailableStore),
        Arc::new(UnavailableStore),
        Arc::new(UnavailableStore),
        Arc::new(FixedClock(now())),
        config(),
    );

    let error = service.register(senior_form()).expect_err("storage offline");

    assert!(matches!(
        error,
        SchedulingError::Repository(RepositoryError::Unavailable(_))
    ));
}
