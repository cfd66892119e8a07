//! Outreach groups a patient qualifies for.
//!
//! Rules are plain data: a label paired with a pure predicate over the patient and the
//! evaluation date. They are evaluated in declaration order so `conditions` output is
//! stable, and new groups are added with [`EligibilityRules::with_rule`] without changing
//! any caller.

use std::fmt;

use chrono::NaiveDate;

use super::domain::Patient;

pub const SENIOR_GROUP: &str = "General population aged 70 or older";

/// Minimum age for the senior outreach group.
pub const SENIOR_MINIMUM_AGE: u32 = 70;

/// Inputs a rule may inspect besides the patient record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityContext {
    pub today: NaiveDate,
}

pub type EligibilityPredicate = fn(&Patient, &EligibilityContext) -> bool;

#[derive(Clone, Copy)]
pub struct EligibilityRule {
    pub label: &'static str,
    pub predicate: EligibilityPredicate,
}

impl fmt::Debug for EligibilityRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EligibilityRule")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Ordered registry of eligibility rules.
#[derive(Debug, Clone)]
pub struct EligibilityRules {
    rules: Vec<EligibilityRule>,
}

fn senior(patient: &Patient, context: &EligibilityContext) -> bool {
    patient.age_on(context.today) >= SENIOR_MINIMUM_AGE
}

impl EligibilityRules {
    /// The groups currently open for scheduling.
    pub fn standard() -> Self {
        Self::empty().with_rule(SENIOR_GROUP, senior)
    }

    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(mut self, label: &'static str, predicate: EligibilityPredicate) -> Self {
        self.rules.push(EligibilityRule { label, predicate });
        self
    }

    pub fn rules(&self) -> &[EligibilityRule] {
        &self.rules
    }

    pub fn conditions(&self, patient: &Patient, today: NaiveDate) -> Vec<&'static str> {
        let context = EligibilityContext { today };
        self.rules
            .iter()
            .filter(|rule| (rule.predicate)(patient, &context))
            .map(|rule| rule.label)
            .collect()
    }

    pub fn can_schedule(&self, patient: &Patient, today: NaiveDate) -> bool {
        !self.conditions(patient, today).is_empty()
    }

    /// Patients already holding a future active appointment stay allowed even when
    /// the current rules would no longer admit them.
    pub fn allowed(&self, patient: &Patient, today: NaiveDate, has_future_active: bool) -> bool {
        self.can_schedule(patient, today) || has_future_active
    }
}

impl Default for EligibilityRules {
    fn default() -> Self {
        Self::standard()
    }
}
