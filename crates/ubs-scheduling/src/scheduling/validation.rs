use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{Patient, TargetAudience};

/// Why a single field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldError {
    Blank,
    Invalid,
    Taken,
}

impl FieldError {
    pub const fn label(self) -> &'static str {
        match self {
            FieldError::Blank => "can't be blank",
            FieldError::Invalid => "is invalid",
            FieldError::Taken => "has already been taken",
        }
    }
}

/// Per-field validation failures, collected rather than raised one at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<&'static str, Vec<FieldError>>,
}

impl ValidationErrors {
    pub fn add(&mut self, field: &'static str, error: FieldError) {
        let entry = self.fields.entry(field).or_default();
        if !entry.contains(&error) {
            entry.push(error);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn on(&self, field: &str) -> &[FieldError] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }

    fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, errors) in &self.fields {
            for error in errors {
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "{field} {}", error.label())?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Registration or profile-update payload as submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientForm {
    #[serde(default)]
    pub cpf: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mother_name: Option<String>,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub other_phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub neighborhood: Option<String>,
    #[serde(default)]
    pub public_place: Option<String>,
    #[serde(default)]
    pub place_number: Option<String>,
    #[serde(default)]
    pub sus: Option<String>,
    #[serde(default)]
    pub specific_comorbidity: Option<String>,
    #[serde(default)]
    pub target_audience: Option<TargetAudience>,
    #[serde(default)]
    pub bedridden: Option<bool>,
}

impl PatientForm {
    /// Form pre-filled with the stored attributes, as shown when editing a profile.
    pub fn from_patient(patient: &Patient) -> Self {
        Self {
            cpf: Some(patient.cpf.clone()),
            name: Some(patient.name.clone()),
            mother_name: Some(patient.mother_name.clone()),
            birth_date: Some(patient.birth_date.format("%Y-%m-%d").to_string()),
            phone: Some(patient.phone.clone()),
            other_phone: patient.other_phone.clone(),
            email: patient.email.clone(),
            neighborhood: Some(patient.neighborhood.clone()),
            public_place: patient.public_place.clone(),
            place_number: patient.place_number.clone(),
            sus: patient.sus.clone(),
            specific_comorbidity: patient.specific_comorbidity.clone(),
            target_audience: Some(patient.target_audience),
            bedridden: Some(patient.bedridden),
        }
    }

    /// Applies submitted changes over `self`; the CPF is never taken from `changes`.
    pub fn merged_with(self, changes: PatientForm) -> Self {
        Self {
            cpf: self.cpf,
            name: changes.name.or(self.name),
            mother_name: changes.mother_name.or(self.mother_name),
            birth_date: changes.birth_date.or(self.birth_date),
            phone: changes.phone.or(self.phone),
            other_phone: changes.other_phone.or(self.other_phone),
            email: changes.email.or(self.email),
            neighborhood: changes.neighborhood.or(self.neighborhood),
            public_place: changes.public_place.or(self.public_place),
            place_number: changes.place_number.or(self.place_number),
            sus: changes.sus.or(self.sus),
            specific_comorbidity: changes.specific_comorbidity.or(self.specific_comorbidity),
            target_audience: changes.target_audience.or(self.target_audience),
            bedridden: changes.bedridden.or(self.bedridden),
        }
    }
}

/// Blank optional text is stored as absent.
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(str::to_string)
}

/// Required patient attributes after normalisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientDraft {
    pub cpf: String,
    pub name: String,
    pub mother_name: String,
    pub birth_date: NaiveDate,
    pub phone: String,
    pub neighborhood: String,
}

/// Validates the required fields of `form`, reporting every failing field at once.
///
/// `cpf_taken` is consulted only for a well-formed CPF.
pub fn validate_patient(
    form: &PatientForm,
    cpf_taken: impl FnOnce(&str) -> bool,
) -> Result<PatientDraft, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let name = required(&mut errors, "name", form.name.as_deref());
    let mother_name = required(&mut errors, "mother_name", form.mother_name.as_deref());
    let neighborhood = required(&mut errors, "neighborhood", form.neighborhood.as_deref());

    let cpf = required(&mut errors, "cpf", form.cpf.as_deref()).and_then(|raw| {
        let digits = normalize_cpf(&raw);
        if !cpf_is_valid(&digits) {
            errors.add("cpf", FieldError::Invalid);
            None
        } else if cpf_taken(&digits) {
            errors.add("cpf", FieldError::Taken);
            None
        } else {
            Some(digits)
        }
    });

    let phone = required(&mut errors, "phone", form.phone.as_deref()).and_then(|raw| {
        let digits = digits_only(&raw);
        if phone_is_valid(&digits) {
            Some(digits)
        } else {
            errors.add("phone", FieldError::Invalid);
            None
        }
    });

    let birth_date =
        required(&mut errors, "birth_date", form.birth_date.as_deref()).and_then(|raw| {
            let parsed = parse_birth_date(&raw);
            if parsed.is_none() {
                errors.add("birth_date", FieldError::Invalid);
            }
            parsed
        });

    match (name, mother_name, neighborhood, cpf, phone, birth_date) {
        (
            Some(name),
            Some(mother_name),
            Some(neighborhood),
            Some(cpf),
            Some(phone),
            Some(birth_date),
        ) => errors.into_result(PatientDraft {
            cpf,
            name,
            mother_name,
            birth_date,
            phone,
            neighborhood,
        }),
        _ => Err(errors),
    }
}

fn required(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: Option<&str>,
) -> Option<String> {
    match value.map(str::trim) {
        Some(trimmed) if !trimmed.is_empty() => Some(trimmed.to_string()),
        _ => {
            errors.add(field, FieldError::Blank);
            None
        }
    }
}

fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Strips the usual `000.000.000-00` punctuation.
pub fn normalize_cpf(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, '.' | '-' | ' '))
        .collect()
}

/// Eleven digits, not all identical, with both check digits matching.
pub fn cpf_is_valid(cpf: &str) -> bool {
    if cpf.len() != 11 || !cpf.bytes().all(|byte| byte.is_ascii_digit()) {
        return false;
    }

    let digits: Vec<u32> = cpf.bytes().map(|byte| u32::from(byte - b'0')).collect();
    if digits.iter().all(|digit| *digit == digits[0]) {
        return false;
    }

    let check = |len: usize| -> u32 {
        let sum: u32 = digits[..len]
            .iter()
            .enumerate()
            .map(|(index, digit)| digit * (len as u32 + 1 - index as u32))
            .sum();
        let rest = (sum * 10) % 11;
        if rest == 10 {
            0
        } else {
            rest
        }
    };

    check(9) == digits[9] && check(10) == digits[10]
}

/// Area code plus an eight or nine digit number.
pub fn phone_is_valid(digits: &str) -> bool {
    matches!(digits.len(), 10 | 11) && !digits.starts_with('0')
}

/// Accepts ISO `YYYY-MM-DD` and the local `DD/MM/YYYY` notation.
pub fn parse_birth_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d/%m/%Y"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> PatientForm {
        PatientForm {
            cpf: Some("529.982.247-25".to_string()),
            name: Some("Maria das Dores".to_string()),
            mother_name: Some("Ana das Dores".to_string()),
            birth_date: Some("1950-04-12".to_string()),
            phone: Some("(11) 98765-4321".to_string()),
            neighborhood: Some("Centro".to_string()),
            ..PatientForm::default()
        }
    }

    #[test]
    fn accepts_well_formed_registration() {
        let draft = validate_patient(&form(), |_| false).expect("valid form");
        assert_eq!(draft.cpf, "52998224725");
        assert_eq!(draft.phone, "11987654321");
        assert_eq!(
            draft.birth_date,
            NaiveDate::from_ymd_opt(1950, 4, 12).expect("valid")
        );
    }

    #[test]
    fn collects_every_failing_field() {
        let mut broken = form();
        broken.name = Some("   ".to_string());
        broken.cpf = Some("123.456.789-00".to_string());
        broken.phone = Some("1234".to_string());
        broken.birth_date = Some("31/02/1950".to_string());

        let errors = validate_patient(&broken, |_| false).expect_err("invalid form");
        assert_eq!(errors.on("name"), &[FieldError::Blank]);
        assert_eq!(errors.on("cpf"), &[FieldError::Invalid]);
        assert_eq!(errors.on("phone"), &[FieldError::Invalid]);
        assert_eq!(errors.on("birth_date"), &[FieldError::Invalid]);
        assert!(errors.on("mother_name").is_empty());
        assert_eq!(errors.fields().count(), 4);
    }

    #[test]
    fn reports_duplicate_cpf() {
        let errors = validate_patient(&form(), |cpf| cpf == "52998224725").expect_err("taken");
        assert_eq!(errors.on("cpf"), &[FieldError::Taken]);
        assert!(errors.to_string().contains("cpf has already been taken"));
    }

    #[test]
    fn cpf_check_digits() {
        assert!(cpf_is_valid("52998224725"));
        assert!(cpf_is_valid("11144477735"));
        assert!(!cpf_is_valid("52998224724"));
        assert!(!cpf_is_valid("11111111111"));
        assert!(!cpf_is_valid("5299822472"));
    }

    #[test]
    fn merged_form_keeps_cpf_and_unchanged_fields() {
        let base = form();
        let changes = PatientForm {
            cpf: Some("111.444.777-35".to_string()),
            neighborhood: Some("Jardim".to_string()),
            ..PatientForm::default()
        };

        let merged = base.clone().merged_with(changes);
        assert_eq!(merged.cpf, base.cpf);
        assert_eq!(merged.neighborhood.as_deref(), Some("Jardim"));
        assert_eq!(merged.name, base.name);
    }

    #[test]
    fn blank_optional_text_is_dropped() {
        assert_eq!(optional_text(Some("  ")), None);
        assert_eq!(optional_text(Some(" apto 2 ")), Some("apto 2".to_string()));
        assert_eq!(optional_text(None), None);
    }

    #[test]
    fn birth_date_accepts_local_notation() {
        assert_eq!(
            parse_birth_date("12/04/1950"),
            NaiveDate::from_ymd_opt(1950, 4, 12)
        );
        assert_eq!(parse_birth_date("1950-13-01"), None);
    }
}
