//! Health-unit (UBS) vaccination scheduling: patient eligibility, patient lifecycle,
//! appointment windows, and the reception desk check-in/check-out flow.

pub mod config;
pub mod error;
pub mod scheduling;
pub mod telemetry;
