//! InfluxDB v2 line protocol encoding.
//!
//! ```text
//! measurement,tag1=val1,tag2=val2 field1=1.5,field2=2 timestamp_ns
//! ```
//!
//! See: <https://docs.influxdata.com/influxdb/v2/reference/syntax/line-protocol/>

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// A single point with float fields. Tags are kept sorted by key.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: Vec<(String, f64)>,
    timestamp: Option<DateTime<Utc>>,
}

impl Point {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: Vec::new(),
            timestamp: None,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: f64) -> Self {
        self.fields.push((key.into(), value));
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn fields(&self) -> &[(String, f64)] {
        &self.fields
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// Encodes the point. Fails when there are no fields, a field is not finite, or the
    /// timestamp does not fit in nanoseconds since the epoch.
    pub fn to_line_protocol(&self) -> Result<String, StoreError> {
        if self.fields.is_empty() {
            return Err(StoreError::Encode(format!(
                "point '{}' has no fields",
                self.measurement
            )));
        }

        let mut line = escape_measurement(&self.measurement);
        for (key, value) in &self.tags {
            line.push(',');
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&escape_key(value));
        }

        line.push(' ');
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if !value.is_finite() {
                return Err(StoreError::Encode(format!("field '{key}' is {value}")));
            }
            if i > 0 {
                line.push(',');
            }
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&value.to_string());
        }

        if let Some(timestamp) = self.timestamp {
            let nanos = timestamp.timestamp_nanos_opt().ok_or_else(|| {
                StoreError::Encode(format!("timestamp {timestamp} out of range"))
            })?;
            line.push(' ');
            line.push_str(&nanos.to_string());
        }

        Ok(line)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_line_protocol() {
            Ok(line) => f.write_str(&line),
            Err(err) => write!(f, "<{err}>"),
        }
    }
}

fn escape_measurement(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace(' ', "\\ ")
}

/// Tag keys, tag values and field keys share the same escaping rules.
fn escape_key(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}
