//! Run events, delivered to an injected observer instead of a global logger.

use crate::config::Mapping;
use crate::error::PredictorError;
use crate::record::Record;
use crate::tolerance::Tolerance;

pub trait RunObserver {
    fn record_fetched(&self, _mapping: &Mapping, _record: &Record) {}

    /// The pair passed the directional check only because wetness precedes temperature
    /// by more than the tolerance.
    fn asymmetric_match(
        &self,
        _mapping: &Mapping,
        _temperature: &Record,
        _wetness: &Record,
        _tolerance: Tolerance,
    ) {
    }

    fn severity_written(
        &self,
        _mapping: &Mapping,
        _temperature: &Record,
        _wetness: &Record,
        _severity: f64,
    ) {
    }

    fn mapping_skipped(&self, _mapping: &Mapping, _reason: &PredictorError) {}

    fn mapping_failed(&self, _mapping: &Mapping, _error: &PredictorError) {}
}

/// Forwards run events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn record_fetched(&self, mapping: &Mapping, record: &Record) {
        tracing::info!(
            topic = %mapping.topic,
            field = %record.field,
            time = %record.time.to_rfc3339(),
            value = record.value,
            "fetched record"
        );
    }

    fn asymmetric_match(
        &self,
        mapping: &Mapping,
        temperature: &Record,
        wetness: &Record,
        tolerance: Tolerance,
    ) {
        tracing::debug!(
            topic = %mapping.topic,
            location = %mapping.location,
            temperature_time = %temperature.time.to_rfc3339(),
            wetness_time = %wetness.time.to_rfc3339(),
            %tolerance,
            "wetness precedes temperature by more than the tolerance; accepted by directional matching"
        );
    }

    fn severity_written(
        &self,
        mapping: &Mapping,
        temperature: &Record,
        wetness: &Record,
        severity: f64,
    ) {
        tracing::info!(
            topic = %mapping.topic,
            location = %mapping.location,
            temperature = temperature.value,
            wetness = wetness.value,
            severity,
            "severity written"
        );
    }

    fn mapping_skipped(&self, mapping: &Mapping, reason: &PredictorError) {
        tracing::warn!(
            topic = %mapping.topic,
            location = %mapping.location,
            reason = %reason,
            "mapping skipped"
        );
    }

    fn mapping_failed(&self, mapping: &Mapping, error: &PredictorError) {
        tracing::error!(
            topic = %mapping.topic,
            location = %mapping.location,
            error = %error,
            "mapping failed"
        );
    }
}
