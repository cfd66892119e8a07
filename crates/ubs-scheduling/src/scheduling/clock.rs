use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

/// Source of "now" for services; every call reads it afresh.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant, for demos and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Calendar date of `instant` on the clinic's local calendar.
pub fn local_date(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

/// First and last instants (inclusive) of `date` on the local calendar, in UTC.
pub fn day_bounds(date: NaiveDate, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    let start = DateTime::<Utc>::from_naive_utc_and_offset(midnight, Utc)
        - chrono::Duration::seconds(i64::from(offset.local_minus_utc()));
    let end = start + chrono::Duration::days(1) - chrono::Duration::nanoseconds(1);
    (start, end)
}
