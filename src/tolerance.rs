//! Time-tolerance checks used to pair a temperature reading with a wetness reading.
//!
//! The default [`MatchMode::Directional`] check only bounds `b - a` from above, so a
//! `b` that precedes `a` always passes. [`MatchMode::Symmetric`] bounds the absolute
//! difference instead.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToleranceUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl ToleranceUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            ToleranceUnit::Milliseconds => "milliseconds",
            ToleranceUnit::Seconds => "seconds",
            ToleranceUnit::Minutes => "minutes",
            ToleranceUnit::Hours => "hours",
            ToleranceUnit::Days => "days",
            ToleranceUnit::Weeks => "weeks",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Tolerance {
    pub amount: u32,
    pub unit: ToleranceUnit,
}

impl Tolerance {
    pub const fn new(amount: u32, unit: ToleranceUnit) -> Self {
        Self { amount, unit }
    }

    pub fn as_duration(&self) -> Duration {
        let amount = i64::from(self.amount);
        match self.unit {
            ToleranceUnit::Milliseconds => Duration::milliseconds(amount),
            ToleranceUnit::Seconds => Duration::seconds(amount),
            ToleranceUnit::Minutes => Duration::minutes(amount),
            ToleranceUnit::Hours => Duration::hours(amount),
            ToleranceUnit::Days => Duration::days(amount),
            ToleranceUnit::Weeks => Duration::weeks(amount),
        }
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::new(1, ToleranceUnit::Minutes)
    }
}

impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.unit.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Directional,
    Symmetric,
}

impl MatchMode {
    pub fn matches(self, a: DateTime<Utc>, b: DateTime<Utc>, tolerance: Tolerance) -> bool {
        match self {
            MatchMode::Directional => within_tolerance(a, b, tolerance.amount, tolerance.unit),
            MatchMode::Symmetric => {
                within_tolerance_symmetric(a, b, tolerance.amount, tolerance.unit)
            }
        }
    }
}

/// Signed check: `b - a <= tolerance`. Passes unconditionally when `b` is earlier than `a`.
pub fn within_tolerance(
    a: DateTime<Utc>,
    b: DateTime<Utc>,
    amount: u32,
    unit: ToleranceUnit,
) -> bool {
    b - a <= Tolerance::new(amount, unit).as_duration()
}

/// Absolute check: `|b - a| <= tolerance`.
pub fn within_tolerance_symmetric(
    a: DateTime<Utc>,
    b: DateTime<Utc>,
    amount: u32,
    unit: ToleranceUnit,
) -> bool {
    let tolerance = Tolerance::new(amount, unit).as_duration();
    let diff = b - a;
    diff <= tolerance && diff >= -tolerance
}

/// True when the directional check passed only because `b` precedes `a` by more than
/// the tolerance, i.e. the symmetric check would have rejected the pair.
pub fn passes_only_directionally(
    a: DateTime<Utc>,
    b: DateTime<Utc>,
    tolerance: Tolerance,
) -> bool {
    within_tolerance(a, b, tolerance.amount, tolerance.unit)
        && !within_tolerance_symmetric(a, b, tolerance.amount, tolerance.unit)
}
