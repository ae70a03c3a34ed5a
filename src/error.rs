use chrono::NaiveTime;
use thiserror::Error;

/// Errors raised while building or validating a [`crate::FareConfig`].
///
/// The computations themselves never fail; only configuration does.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid time of day: {0}")]
    InvalidTime(String),
    #[error("Trip schedule is empty")]
    EmptySchedule,
    #[error("Trip slot id {0} is used more than once")]
    DuplicateSlotId(String),
    #[error("Trip slot {id} ends before it starts")]
    InvertedWindow { id: String },
    #[error("Trip slots {first} and {second} overlap")]
    OverlappingSlots { first: String, second: String },
    #[error("Trip schedule leaves {from}..={to} uncovered")]
    ScheduleGap { from: NaiveTime, to: NaiveTime },
    #[error("{name} must be positive, got {value}")]
    NonPositiveTolerance { name: &'static str, value: f64 },
    #[cfg(feature = "serde")]
    #[error("Config JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
