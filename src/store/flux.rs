//! Flux query rendering and annotated-CSV response decoding for InfluxDB v2.

use super::{LatestQuery, StoreRow};
use crate::error::StoreError;
use chrono::{DateTime, Utc};

const TOPIC_TAG: &str = "topic";

pub fn render_latest_query(query: &LatestQuery<'_>) -> String {
    let lookback_secs = query.lookback.as_secs().max(1);
    format!(
        r#"from(bucket: "{bucket}")
  |> range(start: -{lookback_secs}s)
  |> filter(fn: (r) => r["_measurement"] == "{measurement}")
  |> filter(fn: (r) => r["_field"] == "{field}")
  |> last()"#,
        bucket = escape_string(query.bucket),
        measurement = escape_string(query.measurement),
        field = escape_string(query.field.as_str()),
    )
}

/// Escapes a value for a double-quoted Flux string literal, including `${` interpolation.
pub fn escape_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            other => out.push(other),
        }
    }
    out
}

struct Columns {
    time: usize,
    value: usize,
    field: usize,
    topic: Option<usize>,
}

enum Section {
    Data(Columns),
    Error { message: Option<usize> },
}

/// Decodes an annotated CSV body (possibly several tables) into rows.
///
/// A table whose header carries an `error` column instead of `_value` is the
/// server-side error encoding and is returned as [`StoreError::Rejected`].
pub fn parse_annotated_csv(body: &str) -> Result<Vec<StoreRow>, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut rows = Vec::new();
    let mut section: Option<Section> = None;
    let mut expect_header = true;

    for result in reader.records() {
        let record = result.map_err(|err| StoreError::Decode(err.to_string()))?;
        let first = record.get(0).unwrap_or_default();
        if first.starts_with('#') {
            expect_header = true;
            continue;
        }
        if record.iter().all(str::is_empty) {
            expect_header = true;
            continue;
        }
        if expect_header {
            section = Some(section_from_header(&record)?);
            expect_header = false;
            continue;
        }

        match &section {
            Some(Section::Data(columns)) => rows.push(decode_row(&record, columns)?),
            Some(Section::Error { message }) => {
                let message = message
                    .and_then(|idx| record.get(idx))
                    .filter(|msg| !msg.is_empty())
                    .unwrap_or("unknown error");
                return Err(StoreError::Rejected(message.to_string()));
            }
            None => return Err(StoreError::Decode("data row before header".to_string())),
        }
    }

    Ok(rows)
}

fn section_from_header(record: &csv::StringRecord) -> Result<Section, StoreError> {
    let position = |name: &str| record.iter().position(|cell| cell == name);

    match (position("_time"), position("_value"), position("_field")) {
        (Some(time), Some(value), Some(field)) => Ok(Section::Data(Columns {
            time,
            value,
            field,
            topic: position(TOPIC_TAG),
        })),
        _ if position("error").is_some() => Ok(Section::Error {
            message: position("error"),
        }),
        _ => Err(StoreError::Decode(format!(
            "header is missing _time/_value/_field: {:?}",
            record.iter().collect::<Vec<_>>()
        ))),
    }
}

fn decode_row(record: &csv::StringRecord, columns: &Columns) -> Result<StoreRow, StoreError> {
    let cell = |idx: usize, name: &str| {
        record
            .get(idx)
            .ok_or_else(|| StoreError::Decode(format!("row is missing {name}")))
    };

    let raw_time = cell(columns.time, "_time")?;
    let time = DateTime::parse_from_rfc3339(raw_time)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| StoreError::Decode(format!("bad _time '{raw_time}': {err}")))?;

    let raw_value = cell(columns.value, "_value")?;
    let value = raw_value
        .trim()
        .parse::<f64>()
        .map_err(|err| StoreError::Decode(format!("bad _value '{raw_value}': {err}")))?;

    let field = cell(columns.field, "_field")?.to_string();
    let topic = columns
        .topic
        .and_then(|idx| record.get(idx))
        .filter(|topic| !topic.is_empty())
        .map(str::to_string);

    Ok(StoreRow {
        time,
        field,
        value,
        topic,
    })
}
