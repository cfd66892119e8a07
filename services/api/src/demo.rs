use crate::infra::{build_services, seed_units};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use clap::Args;
use serde::Serialize;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use ubs_scheduling::config::SchedulingConfig;
use ubs_scheduling::error::AppError;
use ubs_scheduling::scheduling::export::{export_file_name, write_csv};
use ubs_scheduling::scheduling::{
    Appointment, AppointmentId, FixedClock, InMemoryStore, PatientForm, PatientId, UbsId, UserId,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Day to simulate (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// UTC offset in whole hours used for the local calendar.
    #[arg(long, default_value = "-3", allow_hyphen_values = true)]
    pub(crate) utc_offset_hours: String,
    /// Directory receiving the day's appointment export; printed to stdout when omitted.
    #[arg(long)]
    pub(crate) export_dir: Option<PathBuf>,
}

const DEMO_UNIT_USER: &str = "ubs-centro";

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        today,
        utc_offset_hours,
        export_dir,
    } = args;

    let config = SchedulingConfig::from_offset_hours(&utc_offset_hours)?;
    let today = today.unwrap_or_else(|| Utc::now().with_timezone(&config.utc_offset).date_naive());
    let now = local_noon(today, &config);

    let store = InMemoryStore::with_units(seed_units());
    let (patients, units) = build_services(&store, Arc::new(FixedClock(now)), config);
    let user = UserId(DEMO_UNIT_USER.to_string());

    println!("UBS scheduling demo for {today}");

    let senior = patients.register(demo_form(
        "52998224725",
        "Maria Aparecida",
        seventy_years_before(today),
        "Centro",
    ))?;
    let younger = patients.register(demo_form(
        "11144477735",
        "Joao Batista",
        NaiveDate::from_ymd_opt(1992, 4, 2).unwrap_or(today),
        "Vila Nova",
    ))?;

    println!("\nEligibility");
    print_json(&patients.eligibility(senior.id)?);
    print_json(&patients.eligibility(younger.id)?);

    println!("\nLogin throttling for {}", younger.name);
    for _ in 0..2 {
        let state = patients.increase_login_attempts(younger.id)?;
        println!(
            "  attempts={} remaining={} blocked={}",
            state.login_attempts,
            state.remaining_attempts(),
            state.blocked()
        );
    }
    let unblocked = patients.unblock(younger.id)?;
    println!("  after unblock: blocked={}", unblocked.blocked());

    seed_appointments(&store, now, senior.id, younger.id);

    println!("\nBulk (de)activation at {}", DEMO_UNIT_USER);
    let cancelled = units.cancel_all_future_appointments(&user)?;
    let restored = units.activate_all_future_appointments(&user)?;
    println!("  cancelled={cancelled} reactivated={restored}");

    println!("\nReception desk");
    let checked_in = units.confirm_check_in(senior.id)?;
    println!("  checked in appointment {}", checked_in.id);
    let checked_out = units.confirm_check_out(senior.id)?;
    println!("  checked out appointment {}", checked_out.id);
    print_json(&patients.dose_status(senior.id)?);

    let (date, rows) = units.today_export(&user)?;
    match export_dir {
        Some(dir) => {
            let path = dir.join(export_file_name(date));
            write_csv(File::create(&path)?, &rows)?;
            println!("\nExported {} appointments to {}", rows.len(), path.display());
        }
        None => {
            println!("\nToday's appointments");
            write_csv(io::stdout().lock(), &rows)?;
        }
    }

    Ok(())
}

fn local_noon(today: NaiveDate, config: &SchedulingConfig) -> DateTime<Utc> {
    let (day_start, _) = ubs_scheduling::scheduling::clock::day_bounds(today, config.utc_offset);
    day_start + Duration::hours(12)
}

fn seventy_years_before(today: NaiveDate) -> NaiveDate {
    today
        .with_year(today.year() - 70)
        .or_else(|| (today - Duration::days(1)).with_year(today.year() - 70))
        .unwrap_or(today)
}

fn demo_form(cpf: &str, name: &str, birth_date: NaiveDate, neighborhood: &str) -> PatientForm {
    PatientForm {
        cpf: Some(cpf.to_string()),
        name: Some(name.to_string()),
        mother_name: Some("Rosa Oliveira".to_string()),
        birth_date: Some(birth_date.format("%Y-%m-%d").to_string()),
        phone: Some("11987654321".to_string()),
        neighborhood: Some(neighborhood.to_string()),
        ..PatientForm::default()
    }
}

fn seed_appointments(store: &InMemoryStore, now: DateTime<Utc>, senior: PatientId, other: PatientId) {
    let slots = [
        (1, Some(senior), 10),
        (2, Some(other), 40),
        (3, None, -10),
        (4, None, 120),
    ];
    for (id, patient_id, minutes) in slots {
        let start = now + Duration::minutes(minutes);
        store.add_appointment(Appointment {
            id: AppointmentId(id),
            ubs_id: UbsId(1),
            patient_id,
            start,
            end: start + Duration::minutes(15),
            active: true,
            check_in: None,
            check_out: None,
        });
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("failed to render demo output: {err}"),
    }
}
