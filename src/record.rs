use chrono::{DateTime, Utc};
use std::fmt;

/// Field names written by the leaf sensors and by this job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    LeafTemperature,
    LeafWetness,
    LeafDiseaseSeverity,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::LeafTemperature => "LeafTemperature",
            Field::LeafWetness => "LeafWetness",
            Field::LeafDiseaseSeverity => "LeafDiseaseSeverity",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub time: DateTime<Utc>,
    pub field: Field,
    pub value: f64,
}

impl Record {
    pub fn new(time: DateTime<Utc>, field: Field, value: f64) -> Self {
        Self { time, field, value }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Record(time={}, field={}, value={})",
            self.time.to_rfc3339(),
            self.field,
            self.value
        )
    }
}
