#[cfg(test)]
mod tests;

use crate::config::{Config, Mapping, MatchingConfig, ServerConfig};
use crate::error::{PredictorError, Result};
use crate::observer::{RunObserver, TracingObserver};
use crate::record::{Field, Record};
use crate::severity::calculate_severity;
use crate::store::{InfluxClient, LatestQuery, Point, TimeSeriesStore};
use crate::tolerance::{passes_only_directionally, MatchMode};
use chrono::Utc;

/// Per-run tallies. Skips are missing or unmatched input; failures are query,
/// computation or write errors.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub mappings: usize,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct LeafDiseasePredictor<S, O = TracingObserver> {
    store: S,
    observer: O,
    server: ServerConfig,
    matching: MatchingConfig,
    mappings: Vec<Mapping>,
}

impl LeafDiseasePredictor<InfluxClient, TracingObserver> {
    /// Connects to the configured InfluxDB server and verifies it is reachable.
    pub fn connect(config: Config) -> Result<Self> {
        let store = InfluxClient::connect(&config.server, &config.token)?;
        Ok(Self::new(store, TracingObserver, config))
    }
}

impl<S: TimeSeriesStore, O: RunObserver> LeafDiseasePredictor<S, O> {
    pub fn new(store: S, observer: O, config: Config) -> Self {
        Self {
            store,
            observer,
            server: config.server,
            matching: config.matching,
            mappings: config.mappings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    /// Latest `field` sample for `topic` inside the lookback window, if any. Rows whose
    /// `_field` differs from the requested one are ignored.
    pub fn find_latest(&self, field: Field, topic: &str) -> Result<Option<Record>> {
        let query = LatestQuery {
            bucket: &self.server.bucket,
            measurement: &self.server.measurement,
            field,
            lookback: self.matching.lookback,
        };
        let rows = self
            .store
            .query_latest(&query)
            .map_err(|source| PredictorError::Query { field, source })?;

        Ok(rows
            .into_iter()
            .filter(|row| row.field == field.as_str())
            .find(|row| row.topic.as_deref() == Some(topic))
            .map(|row| Record::new(row.time, field, row.value)))
    }

    pub fn fetch_latest(&self, field: Field, topic: &str) -> Result<Record> {
        self.find_latest(field, topic)?
            .ok_or_else(|| PredictorError::NotFound {
                field,
                topic: topic.to_string(),
            })
    }

    /// Writes one `LeafDiseaseSeverity` point tagged with `location`, stamped at write time.
    pub fn write_severity(&self, value: f64, location: &str) -> Result<()> {
        let point = Point::new(self.server.output_measurement.as_str())
            .tag("location", location)
            .field(Field::LeafDiseaseSeverity.as_str(), value)
            .timestamp(Utc::now());

        self.store
            .write_point(&self.server.bucket, &point)
            .map_err(|source| PredictorError::Write {
                location: location.to_string(),
                source,
            })?;
        tracing::debug!(bucket = %self.server.bucket, %point, "point written");
        Ok(())
    }

    /// One fetch → match → compute → write cycle. Returns the written severity.
    pub fn process_mapping(&self, mapping: &Mapping) -> Result<f64> {
        let temperature = self.fetch_for(mapping, Field::LeafTemperature)?;
        let wetness = self.fetch_for(mapping, Field::LeafWetness)?;

        let tolerance = self.matching.tolerance;
        if !self
            .matching
            .mode
            .matches(temperature.time, wetness.time, tolerance)
        {
            return Err(PredictorError::ToleranceMismatch {
                temperature_time: temperature.time,
                wetness_time: wetness.time,
                tolerance: tolerance.to_string(),
            });
        }
        if self.matching.mode == MatchMode::Directional
            && passes_only_directionally(temperature.time, wetness.time, tolerance)
        {
            self.observer
                .asymmetric_match(mapping, &temperature, &wetness, tolerance);
        }

        let severity = calculate_severity(temperature.value, wetness.value)?;
        self.write_severity(severity, &mapping.location)?;
        self.observer
            .severity_written(mapping, &temperature, &wetness, severity);
        Ok(severity)
    }

    fn fetch_for(&self, mapping: &Mapping, field: Field) -> Result<Record> {
        let record = self.fetch_latest(field, &mapping.topic)?;
        self.observer.record_fetched(mapping, &record);
        Ok(record)
    }

    /// Processes every mapping once, in order. Per-mapping errors never abort the run.
    pub fn run(&self) -> RunSummary {
        let mut summary = RunSummary {
            mappings: self.mappings.len(),
            ..RunSummary::default()
        };

        for mapping in &self.mappings {
            match self.process_mapping(mapping) {
                Ok(_) => summary.written += 1,
                Err(err) if err.is_skip() => {
                    self.observer.mapping_skipped(mapping, &err);
                    summary.skipped += 1;
                }
                Err(err) => {
                    self.observer.mapping_failed(mapping, &err);
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}
