use super::{LeafDiseasePredictor, RunSummary};
use crate::config::{Config, Mapping, MatchingConfig, ServerConfig};
use crate::error::{PredictorError, StoreError};
use crate::observer::RunObserver;
use crate::record::{Field, Record};
use crate::store::{LatestQuery, Point, StoreRow, TimeSeriesStore};
use crate::tolerance::{MatchMode, Tolerance};
use approx::assert_relative_eq;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use url::Url;

const GOLDEN_20_10: f64 = 0.5189085840007874;

#[derive(Default)]
struct FakeStore {
    rows: HashMap<Field, Vec<StoreRow>>,
    failing_queries: HashSet<Field>,
    rejecting_locations: HashSet<String>,
    queries: RefCell<Vec<(String, String, Field, Duration)>>,
    writes: RefCell<Vec<(String, Point)>>,
}

impl FakeStore {
    fn with_row(
        mut self,
        field: Field,
        topic: Option<&str>,
        time: DateTime<Utc>,
        value: f64,
    ) -> Self {
        self.rows.entry(field).or_default().push(StoreRow {
            time,
            field: field.as_str().to_string(),
            value,
            topic: topic.map(str::to_string),
        });
        self
    }

    fn failing_query(mut self, field: Field) -> Self {
        self.failing_queries.insert(field);
        self
    }

    fn rejecting(mut self, location: &str) -> Self {
        self.rejecting_locations.insert(location.to_string());
        self
    }

    fn writes(&self) -> Vec<(String, Point)> {
        self.writes.borrow().clone()
    }
}

impl TimeSeriesStore for FakeStore {
    fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn query_latest(&self, query: &LatestQuery<'_>) -> Result<Vec<StoreRow>, StoreError> {
        self.queries.borrow_mut().push((
            query.bucket.to_string(),
            query.measurement.to_string(),
            query.field,
            query.lookback,
        ));
        if self.failing_queries.contains(&query.field) {
            return Err(StoreError::Status {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        Ok(self.rows.get(&query.field).cloned().unwrap_or_default())
    }

    fn write_point(&self, bucket: &str, point: &Point) -> Result<(), StoreError> {
        if let Some(location) = point.tags().get("location") {
            if self.rejecting_locations.contains(location) {
                return Err(StoreError::Status {
                    status: 403,
                    body: "write forbidden".to_string(),
                });
            }
        }
        self.writes
            .borrow_mut()
            .push((bucket.to_string(), point.clone()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Fetched(String, Field),
    Asymmetric(String),
    Written(String, f64, f64, f64),
    Skipped(String, String),
    Failed(String, String),
}

#[derive(Default)]
struct RecordingObserver {
    events: RefCell<Vec<Event>>,
}

impl RecordingObserver {
    fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    fn skipped(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Skipped(location, reason) => Some((location, reason)),
                _ => None,
            })
            .collect()
    }

    fn failed(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Failed(location, reason) => Some((location, reason)),
                _ => None,
            })
            .collect()
    }
}

impl RunObserver for RecordingObserver {
    fn record_fetched(&self, mapping: &Mapping, record: &Record) {
        self.events
            .borrow_mut()
            .push(Event::Fetched(mapping.topic.clone(), record.field));
    }

    fn asymmetric_match(
        &self,
        mapping: &Mapping,
        _temperature: &Record,
        _wetness: &Record,
        _tolerance: Tolerance,
    ) {
        self.events
            .borrow_mut()
            .push(Event::Asymmetric(mapping.location.clone()));
    }

    fn severity_written(
        &self,
        mapping: &Mapping,
        temperature: &Record,
        wetness: &Record,
        severity: f64,
    ) {
        self.events.borrow_mut().push(Event::Written(
            mapping.location.clone(),
            temperature.value,
            wetness.value,
            severity,
        ));
    }

    fn mapping_skipped(&self, mapping: &Mapping, reason: &PredictorError) {
        let kind = match reason {
            PredictorError::NotFound { .. } => "not_found",
            PredictorError::ToleranceMismatch { .. } => "tolerance",
            _ => "other",
        };
        self.events
            .borrow_mut()
            .push(Event::Skipped(mapping.location.clone(), kind.to_string()));
    }

    fn mapping_failed(&self, mapping: &Mapping, error: &PredictorError) {
        let kind = match error {
            PredictorError::Query { .. } => "query",
            PredictorError::Computation { .. } => "computation",
            PredictorError::Write { .. } => "write",
            _ => "other",
        };
        self.events
            .borrow_mut()
            .push(Event::Failed(mapping.location.clone(), kind.to_string()));
    }
}

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, h, m, s).unwrap()
}

fn mapping(topic: &str, location: &str) -> Mapping {
    Mapping {
        topic: topic.to_string(),
        location: location.to_string(),
    }
}

fn config(mappings: Vec<Mapping>, mode: MatchMode) -> Config {
    Config {
        server: ServerConfig {
            url: Url::parse("http://localhost:8086").unwrap(),
            org: "farm".to_string(),
            bucket: "sensors".to_string(),
            measurement: "mqtt".to_string(),
            output_measurement: "mqtt".to_string(),
            timeout: Duration::from_secs(5),
        },
        token: "test-token".to_string(),
        matching: MatchingConfig {
            mode,
            ..MatchingConfig::default()
        },
        mappings,
    }
}

fn predictor(
    store: FakeStore,
    mappings: Vec<Mapping>,
) -> LeafDiseasePredictor<FakeStore, RecordingObserver> {
    LeafDiseasePredictor::new(
        store,
        RecordingObserver::default(),
        config(mappings, MatchMode::Directional),
    )
}

#[test]
fn matched_pair_writes_one_tagged_severity() {
    let store = FakeStore::default()
        .with_row(Field::LeafTemperature, Some("stationA"), at(12, 0, 0), 20.0)
        .with_row(Field::LeafWetness, Some("stationA"), at(12, 0, 30), 10.0);
    let before = Utc::now();
    let predictor = predictor(store, vec![mapping("stationA", "fieldA")]);

    let summary = predictor.run();
    assert_eq!(
        summary,
        RunSummary {
            mappings: 1,
            written: 1,
            skipped: 0,
            failed: 0
        }
    );

    let writes = predictor.store().writes();
    assert_eq!(writes.len(), 1);
    let (bucket, point) = &writes[0];
    assert_eq!(bucket, "sensors");
    assert_eq!(point.measurement(), "mqtt");
    assert_eq!(point.tags().len(), 1);
    assert_eq!(point.tags().get("location").map(String::as_str), Some("fieldA"));
    assert_eq!(point.fields().len(), 1);
    assert_eq!(point.fields()[0].0, "LeafDiseaseSeverity");
    assert_relative_eq!(point.fields()[0].1, GOLDEN_20_10, max_relative = 1e-12);
    // Stamped at write time, not sample time.
    assert!(point.time().expect("timestamp") >= before);

    let events = predictor.observer().events();
    assert_eq!(
        events[..2],
        [
            Event::Fetched("stationA".to_string(), Field::LeafTemperature),
            Event::Fetched("stationA".to_string(), Field::LeafWetness),
        ]
    );
    match &events[2] {
        Event::Written(location, temperature, wetness, severity) => {
            assert_eq!(location, "fieldA");
            assert_eq!(*temperature, 20.0);
            assert_eq!(*wetness, 10.0);
            assert_relative_eq!(*severity, GOLDEN_20_10, max_relative = 1e-12);
        }
        other => panic!("expected written event, got {other:?}"),
    }
}

#[test]
fn readings_five_minutes_apart_are_not_written() {
    let store = FakeStore::default()
        .with_row(Field::LeafTemperature, Some("stationA"), at(12, 0, 0), 20.0)
        .with_row(Field::LeafWetness, Some("stationA"), at(12, 5, 0), 10.0);
    let predictor = predictor(store, vec![mapping("stationA", "fieldA")]);

    let summary = predictor.run();
    assert_eq!(summary.written, 0);
    assert_eq!(summary.skipped, 1);
    assert!(predictor.store().writes().is_empty());
    assert_eq!(
        predictor.observer().skipped(),
        vec![("fieldA".to_string(), "tolerance".to_string())]
    );
}

#[test]
fn missing_wetness_skips_mapping_and_continues() {
    let store = FakeStore::default()
        .with_row(Field::LeafTemperature, Some("stationA"), at(12, 0, 0), 20.0)
        .with_row(Field::LeafTemperature, Some("stationB"), at(12, 0, 0), 20.0)
        .with_row(Field::LeafWetness, Some("stationB"), at(12, 0, 20), 10.0);
    let predictor = predictor(
        store,
        vec![mapping("stationA", "fieldA"), mapping("stationB", "fieldB")],
    );

    let summary = predictor.run();
    assert_eq!(
        summary,
        RunSummary {
            mappings: 2,
            written: 1,
            skipped: 1,
            failed: 0
        }
    );
    assert_eq!(
        predictor.observer().skipped(),
        vec![("fieldA".to_string(), "not_found".to_string())]
    );

    let writes = predictor.store().writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(
        writes[0].1.tags().get("location").map(String::as_str),
        Some("fieldB")
    );
}

#[test]
fn first_row_with_matching_topic_is_selected() {
    let store = FakeStore::default()
        .with_row(Field::LeafTemperature, None, at(12, 0, 0), 5.0)
        .with_row(Field::LeafTemperature, Some("stationB"), at(12, 0, 0), 30.0)
        .with_row(Field::LeafTemperature, Some("stationA"), at(12, 0, 10), 20.0)
        .with_row(Field::LeafTemperature, Some("stationA"), at(12, 0, 20), 99.0);
    let predictor = predictor(store, vec![]);

    let record = predictor
        .fetch_latest(Field::LeafTemperature, "stationA")
        .expect("record");
    assert_eq!(
        record,
        Record::new(at(12, 0, 10), Field::LeafTemperature, 20.0)
    );

    assert!(predictor
        .find_latest(Field::LeafTemperature, "stationC")
        .expect("query")
        .is_none());
    assert!(matches!(
        predictor.fetch_latest(Field::LeafTemperature, "stationC"),
        Err(PredictorError::NotFound { field: Field::LeafTemperature, ref topic }) if topic == "stationC"
    ));
}

#[test]
fn rows_for_another_field_are_ignored() {
    let mut store = FakeStore::default()
        .with_row(Field::LeafTemperature, Some("stationA"), at(12, 0, 30), 20.0);
    store
        .rows
        .get_mut(&Field::LeafTemperature)
        .expect("rows")
        .insert(
            0,
            StoreRow {
                time: at(12, 0, 0),
                field: Field::LeafWetness.as_str().to_string(),
                value: 10.0,
                topic: Some("stationA".to_string()),
            },
        );
    let predictor = predictor(store, vec![]);

    let record = predictor
        .fetch_latest(Field::LeafTemperature, "stationA")
        .expect("record");
    assert_eq!(
        record,
        Record::new(at(12, 0, 30), Field::LeafTemperature, 20.0)
    );
}

#[test]
fn queries_use_configured_bucket_measurement_and_lookback() {
    let store = FakeStore::default();
    let predictor = predictor(store, vec![mapping("stationA", "fieldA")]);
    predictor.run();

    let queries = predictor.store().queries.borrow().clone();
    // Temperature is missing, so wetness is never queried.
    assert_eq!(
        queries,
        vec![(
            "sensors".to_string(),
            "mqtt".to_string(),
            Field::LeafTemperature,
            Duration::from_secs(120)
        )]
    );
}

#[test]
fn earlier_wetness_passes_directional_matching_and_is_surfaced() {
    let store = FakeStore::default()
        .with_row(Field::LeafTemperature, Some("stationA"), at(12, 0, 0), 20.0)
        .with_row(
            Field::LeafWetness,
            Some("stationA"),
            at(12, 0, 0) - ChronoDuration::seconds(1000),
            10.0,
        );
    let predictor = predictor(store, vec![mapping("stationA", "fieldA")]);

    let summary = predictor.run();
    assert_eq!(summary.written, 1);
    assert!(predictor
        .observer()
        .events()
        .contains(&Event::Asymmetric("fieldA".to_string())));
}

#[test]
fn symmetric_mode_rejects_earlier_wetness() {
    let store = FakeStore::default()
        .with_row(Field::LeafTemperature, Some("stationA"), at(12, 0, 0), 20.0)
        .with_row(
            Field::LeafWetness,
            Some("stationA"),
            at(12, 0, 0) - ChronoDuration::seconds(1000),
            10.0,
        );
    let predictor = LeafDiseasePredictor::new(
        store,
        RecordingObserver::default(),
        config(vec![mapping("stationA", "fieldA")], MatchMode::Symmetric),
    );

    let summary = predictor.run();
    assert_eq!(summary.written, 0);
    assert_eq!(summary.skipped, 1);
    assert!(!predictor
        .observer()
        .events()
        .contains(&Event::Asymmetric("fieldA".to_string())));
}

#[test]
fn computation_error_fails_only_that_mapping() {
    let store = FakeStore::default()
        .with_row(Field::LeafTemperature, Some("frozen"), at(12, 0, 0), 0.0)
        .with_row(Field::LeafWetness, Some("frozen"), at(12, 0, 0), 10.0)
        .with_row(Field::LeafTemperature, Some("stationA"), at(12, 0, 0), 20.0)
        .with_row(Field::LeafWetness, Some("stationA"), at(12, 0, 30), 10.0);
    let predictor = predictor(
        store,
        vec![mapping("frozen", "fieldX"), mapping("stationA", "fieldA")],
    );

    let summary = predictor.run();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.written, 1);
    assert_eq!(
        predictor.observer().failed(),
        vec![("fieldX".to_string(), "computation".to_string())]
    );
    assert_eq!(predictor.store().writes().len(), 1);
}

#[test]
fn write_rejection_fails_only_that_mapping() {
    let store = FakeStore::default()
        .with_row(Field::LeafTemperature, Some("stationA"), at(12, 0, 0), 20.0)
        .with_row(Field::LeafWetness, Some("stationA"), at(12, 0, 30), 10.0)
        .rejecting("fieldA");
    let predictor = predictor(
        store,
        vec![mapping("stationA", "fieldA"), mapping("stationA", "fieldA2")],
    );

    let summary = predictor.run();
    assert_eq!(
        summary,
        RunSummary {
            mappings: 2,
            written: 1,
            skipped: 0,
            failed: 1
        }
    );
    assert_eq!(
        predictor.observer().failed(),
        vec![("fieldA".to_string(), "write".to_string())]
    );
    let writes = predictor.store().writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(
        writes[0].1.tags().get("location").map(String::as_str),
        Some("fieldA2")
    );
}

#[test]
fn query_failure_is_reported_per_mapping() {
    let store = FakeStore::default()
        .with_row(Field::LeafTemperature, Some("stationA"), at(12, 0, 0), 20.0)
        .failing_query(Field::LeafWetness);
    let predictor = predictor(
        store,
        vec![mapping("stationA", "fieldA"), mapping("stationB", "fieldB")],
    );

    let summary = predictor.run();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(
        predictor.observer().failed(),
        vec![("fieldA".to_string(), "query".to_string())]
    );
    assert!(predictor.store().writes().is_empty());
}

#[test]
fn output_measurement_is_configurable() {
    let store = FakeStore::default();
    let mut cfg = config(vec![], MatchMode::Directional);
    cfg.server.output_measurement = "disease".to_string();
    let predictor = LeafDiseasePredictor::new(store, RecordingObserver::default(), cfg);

    predictor.write_severity(0.25, "field A").expect("write");
    let writes = predictor.store().writes();
    assert_eq!(writes[0].1.measurement(), "disease");
    assert_eq!(
        writes[0].1.tags().get("location").map(String::as_str),
        Some("field A")
    );
}

#[test]
fn empty_mapping_list_is_a_no_op() {
    let predictor = predictor(FakeStore::default(), vec![]);
    assert_eq!(predictor.run(), RunSummary::default());
    assert!(predictor.observer().events().is_empty());
    assert!(predictor.mappings().is_empty());
}

#[test]
fn tolerance_default_is_one_minute() {
    assert_eq!(MatchingConfig::default().tolerance, Tolerance::default());
    assert_eq!(Tolerance::default().as_duration(), ChronoDuration::minutes(1));
}
