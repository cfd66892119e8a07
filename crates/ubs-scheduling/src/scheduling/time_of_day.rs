use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Wall-clock time without a date, used for shift and break boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(NaiveTime);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeOfDayError {
    #[error("'{0}' is not a valid time of day")]
    Invalid(String),
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self, TimeOfDayError> {
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(Self)
            .ok_or_else(|| TimeOfDayError::Invalid(format!("{hour}:{minute}")))
    }

    /// Accepts `H:MM`, `HH:MM` and `HH:MM:SS`.
    pub fn parse(raw: &str) -> Result<Self, TimeOfDayError> {
        let trimmed = raw.trim();
        let invalid = || TimeOfDayError::Invalid(raw.to_string());

        let mut parts = trimmed.split(':');
        let hour = parse_component(parts.next(), 23).ok_or_else(invalid)?;
        let minute = parse_component(parts.next(), 59).ok_or_else(invalid)?;
        let second = match parts.next() {
            Some(value) => parse_component(Some(value), 59).ok_or_else(invalid)?,
            None => 0,
        };
        if parts.next().is_some() {
            return Err(invalid());
        }

        NaiveTime::from_hms_opt(hour, minute, second)
            .map(Self)
            .ok_or_else(invalid)
    }

    /// Joins separately submitted hour and minute form fields before parsing.
    pub fn from_components(hour: &str, minute: &str) -> Result<Self, TimeOfDayError> {
        Self::parse(&format!("{}:{}", hour.trim(), minute.trim()))
    }

    pub fn hour(self) -> u32 {
        self.0.hour()
    }

    pub fn minute(self) -> u32 {
        self.0.minute()
    }
}

fn parse_component(raw: Option<&str>, max: u32) -> Option<u32> {
    let raw = raw?;
    if raw.is_empty() || raw.len() > 2 || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    raw.parse::<u32>().ok().filter(|value| *value <= max)
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M:%S"))
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeOfDayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<NaiveTime> for TimeOfDay {
    fn from(value: NaiveTime) -> Self {
        Self(value)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
