//! Leaf disease severity batch job.
//!
//! Reads the latest `LeafTemperature` and `LeafWetness` samples per station topic from
//! InfluxDB v2, pairs them when their timestamps are close enough, evaluates a
//! Gompertz-type disease progress model and writes `LeafDiseaseSeverity` back tagged
//! with the station's location.

pub mod config;
pub mod error;
pub mod observer;
pub mod predictor;
pub mod record;
pub mod severity;
pub mod store;
pub mod tolerance;

pub use config::{Config, Mapping};
pub use error::{PredictorError, StoreError};
pub use predictor::{LeafDiseasePredictor, RunSummary};
