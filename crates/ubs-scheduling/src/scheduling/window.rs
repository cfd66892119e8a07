use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::domain::{Appointment, PatientId, Ubs, UbsId};

/// Declarative appointment query evaluated by the storage layer.
///
/// Unset criteria match everything; set criteria are combined with AND.
/// Both ends of the start range are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentFilter {
    pub ubs_id: Option<UbsId>,
    pub start_from: Option<DateTime<Utc>>,
    pub start_until: Option<DateTime<Utc>>,
    pub active: Option<bool>,
    pub patient_ids: Option<BTreeSet<PatientId>>,
    pub has_patient: Option<bool>,
    pub checked_in: Option<bool>,
    pub checked_out: Option<bool>,
}

impl AppointmentFilter {
    pub fn for_unit(ubs_id: UbsId) -> Self {
        Self {
            ubs_id: Some(ubs_id),
            ..Self::default()
        }
    }

    pub fn for_patients(ids: impl IntoIterator<Item = PatientId>) -> Self {
        Self {
            patient_ids: Some(ids.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn starting_from(mut self, from: DateTime<Utc>) -> Self {
        self.start_from = Some(from);
        self
    }

    pub fn starting_between(mut self, from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.start_from = Some(from);
        self.start_until = Some(until);
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn with_patient(mut self) -> Self {
        self.has_patient = Some(true);
        self
    }

    pub fn checked_in(mut self, checked_in: bool) -> Self {
        self.checked_in = Some(checked_in);
        self
    }

    pub fn checked_out(mut self, checked_out: bool) -> Self {
        self.checked_out = Some(checked_out);
        self
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        fn holds<T: PartialEq>(wanted: Option<T>, actual: T) -> bool {
            wanted.map_or(true, |wanted| wanted == actual)
        }

        holds(self.ubs_id, appointment.ubs_id)
            && self.start_from.map_or(true, |from| appointment.start >= from)
            && self.start_until.map_or(true, |until| appointment.start <= until)
            && holds(self.active, appointment.active)
            && self.patient_ids.as_ref().map_or(true, |ids| {
                appointment
                    .patient_id
                    .is_some_and(|patient_id| ids.contains(&patient_id))
            })
            && holds(self.has_patient, appointment.patient_id.is_some())
            && holds(self.checked_in, appointment.checked_in())
            && holds(self.checked_out, appointment.checked_out())
    }
}

/// Earliest start still listed as upcoming: one slot interval before `now`, so a
/// patient arriving late for a slot that just began can still be received.
pub fn grace_window_start(ubs: &Ubs, now: DateTime<Utc>) -> DateTime<Utc> {
    now - ubs.slot_interval()
}

/// Appointments of the unit starting at or after the grace window, in any state.
pub fn future_appointments(ubs: &Ubs, now: DateTime<Utc>) -> AppointmentFilter {
    AppointmentFilter::for_unit(ubs.id).starting_from(grace_window_start(ubs, now))
}

/// Active appointments starting at or after `now`, with no grace window.
pub fn active_future_appointments(ubs: &Ubs, now: DateTime<Utc>) -> AppointmentFilter {
    AppointmentFilter::for_unit(ubs.id)
        .starting_from(now)
        .active(true)
}

/// Cancelled appointments inside the grace window, the set restored by bulk reactivation.
pub fn inactive_future_appointments(ubs: &Ubs, now: DateTime<Utc>) -> AppointmentFilter {
    future_appointments(ubs, now).active(false)
}

/// Checked in, not yet checked out, starting within `[day_start, day_end]`.
pub fn awaiting_checkout(day_start: DateTime<Utc>, day_end: DateTime<Utc>) -> AppointmentFilter {
    AppointmentFilter::default()
        .checked_in(true)
        .checked_out(false)
        .starting_between(day_start, day_end)
}
