use chrono::{NaiveDate, NaiveTime};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use ubs_scheduling::config::SchedulingConfig;
use ubs_scheduling::scheduling::{
    Clock, InMemoryStore, OperatingHours, PatientService, TimeOfDay, Ubs, UbsId, UnitService,
    UserId,
};

pub(crate) type Patients = PatientService<InMemoryStore, InMemoryStore, InMemoryStore>;
pub(crate) type Units = UnitService<InMemoryStore, InMemoryStore, InMemoryStore>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Wires both services over one shared store.
pub(crate) fn build_services(
    store: &InMemoryStore,
    clock: Arc<dyn Clock>,
    config: SchedulingConfig,
) -> (Arc<Patients>, Arc<Units>) {
    let shared = Arc::new(store.clone());
    let patients = PatientService::new(
        shared.clone(),
        shared.clone(),
        shared.clone(),
        clock.clone(),
        config,
    );
    let units = UnitService::new(shared.clone(), shared.clone(), shared, clock, config);
    (Arc::new(patients), Arc::new(units))
}

fn at(hour: u32, minute: u32) -> TimeOfDay {
    TimeOfDay::from(NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN))
}

pub(crate) fn default_hours() -> OperatingHours {
    OperatingHours {
        shift_start: at(8, 0),
        break_start: at(12, 0),
        break_end: at(13, 0),
        shift_end: at(17, 0),
        open_saturday: false,
        saturday_shift_start: at(8, 0),
        saturday_break_start: at(10, 0),
        saturday_break_end: at(10, 30),
        saturday_shift_end: at(12, 0),
    }
}

/// Units available to a fresh in-memory deployment.
pub(crate) fn seed_units() -> Vec<Ubs> {
    [
        (1, "UBS Centro", "ubs-centro", vec!["Centro", "Vila Rica"]),
        (2, "UBS Jardim Norte", "ubs-norte", vec!["Jardim Norte"]),
        (3, "UBS Vila Nova", "ubs-vila-nova", vec!["Vila Nova", "Bela Vista"]),
    ]
    .into_iter()
    .map(|(id, name, user, neighborhoods)| Ubs {
        id: UbsId(id),
        name: name.to_string(),
        user_id: UserId(user.to_string()),
        neighborhoods: neighborhoods.into_iter().map(str::to_string).collect(),
        active: true,
        slot_interval_minutes: 15,
        appointments_per_time_slot: 2,
        hours: default_hours(),
    })
    .collect()
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
