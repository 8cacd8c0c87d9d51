use crate::record::Field;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PredictorError>;

#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("time-series store at {url} is unreachable: {reason}")]
    Connection { url: String, reason: String },

    #[error("no '{field}' record for topic '{topic}' in the lookback window")]
    NotFound { field: Field, topic: String },

    #[error("querying '{field}' failed: {source}")]
    Query {
        field: Field,
        #[source]
        source: StoreError,
    },

    #[error(
        "temperature at {temperature_time} and wetness at {wetness_time} are not within {tolerance}"
    )]
    ToleranceMismatch {
        temperature_time: DateTime<Utc>,
        wetness_time: DateTime<Utc>,
        tolerance: String,
    },

    #[error("severity undefined for temperature={temperature}, wetness={wetness}: {reason}")]
    Computation {
        temperature: f64,
        wetness: f64,
        reason: &'static str,
    },

    #[error("writing severity for location '{location}' failed: {source}")]
    Write {
        location: String,
        #[source]
        source: StoreError,
    },
}

impl PredictorError {
    /// Missing or mismatched input data. The mapping is skipped, nothing is broken.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            PredictorError::NotFound { .. } | PredictorError::ToleranceMismatch { .. }
        )
    }
}

/// Transport/protocol failures from the store client.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed query response: {0}")]
    Decode(String),

    #[error("store rejected query: {0}")]
    Rejected(String),

    #[error("cannot encode point: {0}")]
    Encode(String),

    #[error("invalid store url: {0}")]
    Url(#[from] url::ParseError),
}
