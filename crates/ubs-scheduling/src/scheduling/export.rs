use std::collections::HashMap;
use std::io::Write;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use super::domain::{Appointment, Patient, PatientId};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn humanize_datetime(instant: DateTime<Utc>, offset: FixedOffset) -> String {
    instant
        .with_timezone(&offset)
        .format("%d/%m/%Y às %H:%M")
        .to_string()
}

pub fn humanize_time(instant: DateTime<Utc>, offset: FixedOffset) -> String {
    instant.with_timezone(&offset).format("%H:%M").to_string()
}

/// `00000000000` → `000.000.000-00`; other lengths are returned unchanged.
pub fn humanize_cpf(cpf: &str) -> String {
    if cpf.len() != 11 || !cpf.is_ascii() {
        return cpf.to_string();
    }
    format!("{}.{}.{}-{}", &cpf[0..3], &cpf[3..6], &cpf[6..9], &cpf[9..11])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppointmentExportRow {
    #[serde(rename = "Appointment")]
    pub appointment_id: u64,
    #[serde(rename = "Start")]
    pub start: String,
    #[serde(rename = "Patient")]
    pub patient_name: String,
    #[serde(rename = "CPF")]
    pub cpf: String,
    #[serde(rename = "Phone")]
    pub phone: String,
    #[serde(rename = "Active")]
    pub active: bool,
    #[serde(rename = "Check-in")]
    pub check_in: String,
    #[serde(rename = "Check-out")]
    pub check_out: String,
}

/// Flattens appointments and their patients into export rows, keeping input order.
pub fn export_rows(
    appointments: &[Appointment],
    patients: &[Patient],
    offset: FixedOffset,
) -> Vec<AppointmentExportRow> {
    let by_id: HashMap<PatientId, &Patient> =
        patients.iter().map(|patient| (patient.id, patient)).collect();

    appointments
        .iter()
        .map(|appointment| {
            let patient = appointment.patient_id.and_then(|id| by_id.get(&id).copied());
            AppointmentExportRow {
                appointment_id: appointment.id.0,
                start: humanize_datetime(appointment.start, offset),
                patient_name: patient.map(|p| p.name.clone()).unwrap_or_default(),
                cpf: patient.map(|p| humanize_cpf(&p.cpf)).unwrap_or_default(),
                phone: patient.map(|p| p.phone.clone()).unwrap_or_default(),
                active: appointment.active,
                check_in: appointment
                    .check_in
                    .map(|at| humanize_time(at, offset))
                    .unwrap_or_default(),
                check_out: appointment
                    .check_out
                    .map(|at| humanize_time(at, offset))
                    .unwrap_or_default(),
            }
        })
        .collect()
}

pub fn write_csv<W: Write>(writer: W, rows: &[AppointmentExportRow]) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        csv_writer.write_record([
            "Appointment",
            "Start",
            "Patient",
            "CPF",
            "Phone",
            "Active",
            "Check-in",
            "Check-out",
        ])?;
    }
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// File name offered for download of one day's appointments.
pub fn export_file_name(date: chrono::NaiveDate) -> String {
    format!("appointments_{}.csv", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::domain::{AppointmentId, TargetAudience, UbsId};
    use chrono::{Duration, NaiveDate, TimeZone};

    fn offset() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).expect("valid offset")
    }

    fn patient() -> Patient {
        Patient {
            id: PatientId(4),
            cpf: "52998224725".to_string(),
            name: "Maria".to_string(),
            mother_name: "Ana".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1950, 1, 1).expect("valid"),
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

    #[test]
    fn cpf_is_punctuated() {
        assert_eq!(humanize_cpf("52998224725"), "529.982.247-25");
        assert_eq!(humanize_cpf("123"), "123");
    }

    #[test]
    fn writes_one_row_per_appointment_in_local_time() {
        let start = Utc.with_ymd_and_hms(2026, 10, 19, 12, 30, 0).unwrap();
        let booked = Appointment {
            id: AppointmentId(1),
            ubs_id: UbsId(1),
            patient_id: Some(PatientId(4)),
            start,
            end: start + Duration::minutes(15),
            active: true,
            check_in: Some(start),
            check_out: None,
        };
        let open_slot = Appointment {
            id: AppointmentId(2),
            patient_id: None,
            ..booked.clone()
        };

        let rows = export_rows(&[booked, open_slot], &[patient()], offset());
        let mut buffer = Vec::new();
        write_csv(&mut buffer, &rows).expect("writes csv");
        let text = String::from_utf8(buffer).expect("utf8");
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "Appointment,Start,Patient,CPF,Phone,Active,Check-in,Check-out"
        );
        assert_eq!(
            lines[1],
            "1,19/10/2026 às 09:30,Maria,529.982.247-25,11987654321,true,09:30,"
        );
        assert!(lines[2].starts_with("2,19/10/2026 às 09:30,,,,true,"));
    }

    #[test]
    fn empty_exports_still_carry_headers() {
        let mut buffer = Vec::new();
        write_csv(&mut buffer, &[]).expect("writes csv");
        assert_eq!(
            String::from_utf8(buffer).expect("utf8").trim_end(),
            "Appointment,Start,Patient,CPF,Phone,Active,Check-in,Check-out"
        );
    }

    #[test]
    fn file_name_carries_the_date() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).expect("valid");
        assert_eq!(export_file_name(date), "appointments_2026-10-19.csv");
    }
}
