use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::error;

use super::domain::{AppointmentId, PatientId, UserId};
use super::export::{export_file_name, write_csv};
use super::hours::ActiveHoursForm;
use super::reception::ReceptionError;
use super::repository::{
    AppointmentRepository, PatientRepository, RepositoryError, UbsRepository,
};
use super::service::{CheckInSearch, PatientService, SchedulingError, SlotDurationForm, UnitService};
use super::validation::PatientForm;

/// Header carrying the authenticated staff account.
pub const ACTING_USER_HEADER: &str = "x-user-id";

/// Staff account taken from the request headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActingUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ACTING_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        match value {
            Some(user) => Ok(ActingUser(UserId(user.to_string()))),
            None => {
                let payload = json!({
                    "error": format!("missing {ACTING_USER_HEADER} header"),
                });
                Err((StatusCode::UNAUTHORIZED, Json(payload)).into_response())
            }
        }
    }
}

/// Router builder exposing the patient and unit endpoints.
pub fn scheduling_router<P, A, U>(
    patients: Arc<PatientService<P, A, U>>,
    units: Arc<UnitService<P, A, U>>,
) -> Router
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    patient_routes(patients).merge(unit_routes(units))
}

fn patient_routes<P, A, U>(service: Arc<PatientService<P, A, U>>) -> Router
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    Router::new()
        .route("/api/v1/patients", post(register_handler::<P, A, U>))
        .route(
            "/api/v1/patients/:patient_id",
            get(patient_handler::<P, A, U>).patch(update_handler::<P, A, U>),
        )
        .route(
            "/api/v1/patients/:patient_id/eligibility",
            get(eligibility_handler::<P, A, U>),
        )
        .route(
            "/api/v1/patients/:patient_id/login-failures",
            post(login_failure_handler::<P, A, U>),
        )
        .route(
            "/api/v1/patients/:patient_id/unblock",
            post(unblock_handler::<P, A, U>),
        )
        .with_state(service)
}

fn unit_routes<P, A, U>(service: Arc<UnitService<P, A, U>>) -> Router
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    Router::new()
        .route("/api/v1/ubs/appointments", get(dashboard_handler::<P, A, U>))
        .route(
            "/api/v1/ubs/active-hours",
            get(active_hours_handler::<P, A, U>).put(change_active_hours_handler::<P, A, U>),
        )
        .route(
            "/api/v1/ubs/slot-duration",
            get(slot_duration_handler::<P, A, U>).put(change_slot_duration_handler::<P, A, U>),
        )
        .route("/api/v1/ubs/activate", post(activate_unit_handler::<P, A, U>))
        .route(
            "/api/v1/ubs/deactivate",
            post(deactivate_unit_handler::<P, A, U>),
        )
        .route(
            "/api/v1/ubs/appointments/cancel-future",
            post(cancel_future_handler::<P, A, U>),
        )
        .route(
            "/api/v1/ubs/appointments/activate-future",
            post(activate_future_handler::<P, A, U>),
        )
        .route(
            "/api/v1/ubs/appointments/today.csv",
            get(today_export_handler::<P, A, U>),
        )
        .route(
            "/api/v1/ubs/appointments/:appointment_id/cancel",
            post(cancel_appointment_handler::<P, A, U>),
        )
        .route(
            "/api/v1/ubs/appointments/:appointment_id/activate",
            post(activate_appointment_handler::<P, A, U>),
        )
        .route("/api/v1/ubs/check-in", get(check_in_search_handler::<P, A, U>))
        .route("/api/v1/ubs/check-out", get(checkout_list_handler::<P, A, U>))
        .route(
            "/api/v1/ubs/patients/:patient_id",
            get(patient_details_handler::<P, A, U>),
        )
        .route(
            "/api/v1/ubs/patients/:patient_id/check-in",
            post(confirm_check_in_handler::<P, A, U>),
        )
        .route(
            "/api/v1/ubs/patients/:patient_id/check-out",
            post(confirm_check_out_handler::<P, A, U>),
        )
        .with_state(service)
}

/// Maps service failures onto status codes with a JSON error body.
pub fn error_response(error: SchedulingError) -> Response {
    let status = match &error {
        SchedulingError::Validation(errors) => {
            let payload = json!({
                "error": "validation failed",
                "fields": errors,
            });
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
        }
        SchedulingError::PatientNotFound(_)
        | SchedulingError::AppointmentNotFound(_)
        | SchedulingError::UnitNotFound(_) => StatusCode::NOT_FOUND,
        SchedulingError::Reception(ReceptionError::NoActiveAppointment(_)) => {
            StatusCode::NOT_FOUND
        }
        SchedulingError::Reception(_) => StatusCode::CONFLICT,
        SchedulingError::Hours(_) | SchedulingError::InvalidSlotDuration(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        SchedulingError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        SchedulingError::Repository(source) => {
            error!(error = %source, "scheduling storage failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = json!({
        "error": error.to_string(),
    });
    (status, Json(payload)).into_response()
}

fn respond<T: serde::Serialize>(
    status: StatusCode,
    result: Result<T, SchedulingError>,
) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn register_handler<P, A, U>(
    State(service): State<Arc<PatientService<P, A, U>>>,
    Json(form): Json<PatientForm>,
) -> Response
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    respond(StatusCode::CREATED, service.register(form))
}

pub(crate) async fn patient_handler<P, A, U>(
    State(service): State<Arc<PatientService<P, A, U>>>,
    Path(patient_id): Path<u64>,
) -> Response
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    respond(StatusCode::OK, service.get(PatientId(patient_id)))
}

pub(crate) async fn update_handler<P, A, U>(
    State(service): State<Arc<PatientService<P, A, U>>>,
    Path(patient_id): Path<u64>,
    Json(changes): Json<PatientForm>,
) -> Response
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    respond(StatusCode::OK, service.update(PatientId(patient_id), changes))
}

pub(crate) async fn eligibility_handler<P, A, U>(
    State(service): State<Arc<PatientService<P, A, U>>>,
    Path(patient_id): Path<u64>,
) -> Response
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    respond(StatusCode::OK, service.eligibility(PatientId(patient_id)))
}

pub(crate) async fn login_failure_handler<P, A, U>(
    State(service): State<Arc<PatientService<P, A, U>>>,
    Path(patient_id): Path<u64>,
) -> Response
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    let result = service
        .increase_login_attempts(PatientId(patient_id))
        .map(|patient| {
            json!({
                "patient_id": patient.id,
                "login_attempts": patient.login_attempts,
                "remaining_attempts": patient.remaining_attempts(),
                "blocked": patient.blocked(),
            })
        });
    respond(StatusCode::OK, result)
}

pub(crate) async fn unblock_handler<P, A, U>(
    State(service): State<Arc<PatientService<P, A, U>>>,
    Path(patient_id): Path<u64>,
) -> Response
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    let result = service.unblock(PatientId(patient_id)).map(|patient| {
        json!({
            "patient_id": patient.id,
            "login_attempts": patient.login_attempts,
            "blocked": patient.blocked(),
        })
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn dashboard_handler<P, A, U>(
    State(service): State<Arc<UnitService<P, A, U>>>,
    ActingUser(user): ActingUser,
) -> Response
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    respond(StatusCode::OK, service.dashboard(&user))
}

pub(crate) async fn active_hours_handler<P, A, U>(
    State(service): State<Arc<UnitService<P, A, U>>>,
    ActingUser(user): ActingUser,
) -> Response
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    respond(StatusCode::OK, service.active_hours(&user))
}

pub(crate) async fn change_active_hours_handler<P, A, U>(
    State(service): State<Arc<UnitService<P, A, U>>>,
    ActingUser(user): ActingUser,
    Json(form): Json<ActiveHoursForm>,
) -> Response
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    respond(StatusCode::OK, service.change_active_hours(&user, &form))
}

pub(crate) async fn slot_duration_handler<P, A, U>(
    State(service): State<Arc<UnitService<P, A, U>>>,
    ActingUser(user): ActingUser,
) -> Response
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    respond(StatusCode::OK, service.slot_duration(&user))
}

pub(crate) async fn change_slot_duration_handler<P, A, U>(
    State(service): State<Arc<UnitService<P, A, U>>>,
    ActingUser(user): ActingUser,
    Json(form): Json<SlotDurationForm>,
) -> Response
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    respond(StatusCode::OK, service.change_slot_duration(&user, form))
}

pub(crate) async fn activate_unit_handler<P, A, U>(
    State(service): State<Arc<UnitService<P, A, U>>>,
    ActingUser(user): ActingUser,
) -> Response
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    respond(StatusCode::OK, service.set_unit_active(&user, true))
}

pub(crate) async fn deactivate_unit_handler<P, A, U>(
    State(service): State<Arc<UnitService<P, A, U>>>,
    ActingUser(user): ActingUser,
) -> Response
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    respond(StatusCode::OK, service.set_unit_active(&user, false))
}

pub(crate) async fn cancel_appointment_handler<P, A, U>(
    State(service): State<Arc<UnitService<P, A, U>>>,
    ActingUser(user): ActingUser,
    Path(appointment_id): Path<u64>,
) -> Response
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    respond(
        StatusCode::OK,
        service.cancel_appointment(&user, AppointmentId(appointment_id)),
    )
}

pub(crate) async fn activate_appointment_handler<P, A, U>(
    State(service): State<Arc<UnitService<P, A, U>>>,
    ActingUser(user): ActingUser,
    Path(appointment_id): Path<u64>,
) -> Response
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    respond(
        StatusCode::OK,
        service.activate_appointment(&user, AppointmentId(appointment_id)),
    )
}

pub(crate) async fn cancel_future_handler<P, A, U>(
    State(service): State<Arc<UnitService<P, A, U>>>,
    ActingUser(user): ActingUser,
) -> Response
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    let result = service
        .cancel_all_future_appointments(&user)
        .map(|updated| json!({ "updated": updated }));
    respond(StatusCode::OK, result)
}

pub(crate) async fn activate_future_handler<P, A, U>(
    State(service): State<Arc<UnitService<P, A, U>>>,
    ActingUser(user): ActingUser,
) -> Response
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    let result = service
        .activate_all_future_appointments(&user)
        .map(|updated| json!({ "updated": updated }));
    respond(StatusCode::OK, result)
}

pub(crate) async fn check_in_search_handler<P, A, U>(
    State(service): State<Arc<UnitService<P, A, U>>>,
    ActingUser(user): ActingUser,
    Query(search): Query<CheckInSearch>,
) -> Response
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    let result = service
        .unit_for_user(&user)
        .and_then(|_| service.find_patients(&search));
    respond(StatusCode::OK, result)
}

pub(crate) async fn checkout_list_handler<P, A, U>(
    State(service): State<Arc<UnitService<P, A, U>>>,
    ActingUser(user): ActingUser,
) -> Response
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    let result = service
        .unit_for_user(&user)
        .and_then(|_| service.checkout_list());
    respond(StatusCode::OK, result)
}

pub(crate) async fn patient_details_handler<P, A, U>(
    State(service): State<Arc<UnitService<P, A, U>>>,
    ActingUser(user): ActingUser,
    Path(patient_id): Path<u64>,
) -> Response
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    let result = service
        .unit_for_user(&user)
        .and_then(|_| service.patient_details(PatientId(patient_id)));
    respond(StatusCode::OK, result)
}

pub(crate) async fn confirm_check_in_handler<P, A, U>(
    State(service): State<Arc<UnitService<P, A, U>>>,
    ActingUser(user): ActingUser,
    Path(patient_id): Path<u64>,
) -> Response
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    let result = service
        .unit_for_user(&user)
        .and_then(|_| service.confirm_check_in(PatientId(patient_id)));
    respond(StatusCode::OK, result)
}

pub(crate) async fn confirm_check_out_handler<P, A, U>(
    State(service): State<Arc<UnitService<P, A, U>>>,
    ActingUser(user): ActingUser,
    Path(patient_id): Path<u64>,
) -> Response
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    let result = service
        .unit_for_user(&user)
        .and_then(|_| service.confirm_check_out(PatientId(patient_id)));
    respond(StatusCode::OK, result)
}

pub(crate) async fn today_export_handler<P, A, U>(
    State(service): State<Arc<UnitService<P, A, U>>>,
    ActingUser(user): ActingUser,
) -> Response
where
    P: PatientRepository + 'static,
    A: AppointmentRepository + 'static,
    U: UbsRepository + 'static,
{
    let (date, rows) = match service.today_export(&user) {
        Ok(export) => export,
        Err(error) => return error_response(error),
    };

    let mut body = Vec::new();
    if let Err(error) = write_csv(&mut body, &rows) {
        error!(error = %error, "failed to render appointment export");
        let payload = json!({
            "error": error.to_string(),
        });
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response();
    }

    let disposition = format!("attachment; filename=\"{}\"", export_file_name(date));
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}
