use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::time_of_day::{TimeOfDay, TimeOfDayError};

/// Operating hours of a unit: one weekday schedule and an optional Saturday schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingHours {
    pub shift_start: TimeOfDay,
    pub break_start: TimeOfDay,
    pub break_end: TimeOfDay,
    pub shift_end: TimeOfDay,
    pub open_saturday: bool,
    pub saturday_shift_start: TimeOfDay,
    pub saturday_break_start: TimeOfDay,
    pub saturday_break_end: TimeOfDay,
    pub saturday_shift_end: TimeOfDay,
}

/// Hour and minute as submitted by the hours form, before parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeComponents {
    #[serde(default)]
    pub hour: String,
    #[serde(default)]
    pub minute: String,
}

impl TimeComponents {
    pub fn new(hour: impl Into<String>, minute: impl Into<String>) -> Self {
        Self {
            hour: hour.into(),
            minute: minute.into(),
        }
    }

    fn parse(&self, field: &'static str) -> Result<TimeOfDay, HoursError> {
        TimeOfDay::from_components(&self.hour, &self.minute)
            .map_err(|source| HoursError::InvalidBoundary { field, source })
    }
}

/// Raw active-hours form: eight boundaries plus the Saturday switch (`"1"` means open).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveHoursForm {
    pub shift_start: TimeComponents,
    pub break_start: TimeComponents,
    pub break_end: TimeComponents,
    pub shift_end: TimeComponents,
    pub saturday_shift_start: TimeComponents,
    pub saturday_break_start: TimeComponents,
    pub saturday_break_end: TimeComponents,
    pub saturday_shift_end: TimeComponents,
    #[serde(default)]
    pub open_saturday: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HoursError {
    #[error("invalid {field}: {source}")]
    InvalidBoundary {
        field: &'static str,
        source: TimeOfDayError,
    },
}

impl ActiveHoursForm {
    /// Parses every boundary; the first failing field aborts the whole conversion.
    pub fn parse(&self) -> Result<OperatingHours, HoursError> {
        Ok(OperatingHours {
            shift_start: self.shift_start.parse("shift_start")?,
            break_start: self.break_start.parse("break_start")?,
            break_end: self.break_end.parse("break_end")?,
            shift_end: self.shift_end.parse("shift_end")?,
            open_saturday: self.open_saturday.trim().parse::<i64>().ok() == Some(1),
            saturday_shift_start: self.saturday_shift_start.parse("saturday_shift_start")?,
            saturday_break_start: self.saturday_break_start.parse("saturday_break_start")?,
            saturday_break_end: self.saturday_break_end.parse("saturday_break_end")?,
            saturday_shift_end: self.saturday_shift_end.parse("saturday_shift_end")?,
        })
    }
}

/// Fixed-date holidays as `(day, month)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HolidayCalendar {
    days: Vec<(u32, u32)>,
}

impl HolidayCalendar {
    pub fn new(days: impl IntoIterator<Item = (u32, u32)>) -> Self {
        Self {
            days: days.into_iter().collect(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.days.contains(&(date.day(), date.month()))
    }
}

impl OperatingHours {
    /// Saturdays open without holiday checks; weekdays open unless listed as holidays.
    pub fn is_business_day(&self, date: NaiveDate, holidays: &HolidayCalendar) -> bool {
        match date.weekday() {
            Weekday::Sun => false,
            Weekday::Sat => self.open_saturday,
            _ => !holidays.contains(date),
        }
    }
}
