//! Time-series store seam: the run loop only talks to [`TimeSeriesStore`].

pub mod flux;
pub mod influx;
pub mod line_protocol;

use crate::error::StoreError;
use crate::record::Field;
use chrono::{DateTime, Utc};
use std::time::Duration;

pub use influx::InfluxClient;
pub use line_protocol::Point;

/// "Most recent value of `field` within `measurement` over the last `lookback`."
#[derive(Debug, Clone, PartialEq)]
pub struct LatestQuery<'a> {
    pub bucket: &'a str,
    pub measurement: &'a str,
    pub field: Field,
    pub lookback: Duration,
}

/// One row returned by a latest-value query.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRow {
    pub time: DateTime<Utc>,
    pub field: String,
    pub value: f64,
    pub topic: Option<String>,
}

pub trait TimeSeriesStore {
    fn ping(&self) -> Result<(), StoreError>;

    fn query_latest(&self, query: &LatestQuery<'_>) -> Result<Vec<StoreRow>, StoreError>;

    fn write_point(&self, bucket: &str, point: &Point) -> Result<(), StoreError>;
}
