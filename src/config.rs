use crate::error::{PredictorError, Result};
use crate::tolerance::{MatchMode, Tolerance};
use dotenvy::dotenv;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const TOKEN_ENV_VAR: &str = "INFLUXDB_TOKEN";

const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_LOOKBACK_SECONDS: u64 = 120;

#[derive(Debug, Deserialize)]
struct RawConfig {
    server: Option<RawServer>,
    #[serde(default)]
    matching: RawMatching,
    mappings: Option<Vec<RawMapping>>,
}

#[derive(Debug, Deserialize)]
struct RawServer {
    url: Option<String>,
    org: Option<String>,
    bucket: Option<String>,
    measurement: Option<String>,
    #[serde(default)]
    output_measurement: Option<String>,
    #[serde(default)]
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMatching {
    #[serde(default)]
    tolerance: Option<Tolerance>,
    #[serde(default)]
    mode: Option<MatchMode>,
    #[serde(default)]
    lookback_seconds: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawMapping {
    topic: Option<String>,
    location: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub url: Url,
    pub org: String,
    pub bucket: String,
    /// Measurement the sensor fields are read from.
    pub measurement: String,
    /// Measurement the severity is written to.
    pub output_measurement: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchingConfig {
    pub tolerance: Tolerance,
    pub mode: MatchMode,
    pub lookback: Duration,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            mode: MatchMode::default(),
            lookback: Duration::from_secs(DEFAULT_LOOKBACK_SECONDS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub topic: String,
    pub location: String,
}

#[derive(Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub token: String,
    pub matching: MatchingConfig,
    pub mappings: Vec<Mapping>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server", &self.server)
            .field("token", &"<redacted>")
            .field("matching", &self.matching)
            .field("mappings", &self.mappings)
            .finish()
    }
}

impl Config {
    /// Reads the YAML document at `path` and takes the token from `INFLUXDB_TOKEN`
    /// (a `.env` file in the working directory is honoured).
    pub fn load(path: &Path) -> Result<Self> {
        dotenv().ok();
        Self::load_with_token(path, std::env::var(TOKEN_ENV_VAR).ok())
    }

    pub fn load_with_token(path: &Path, token: Option<String>) -> Result<Self> {
        tracing::info!(path = %path.display(), "using configuration file");

        let contents = std::fs::read_to_string(path).map_err(|err| {
            PredictorError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_yaml_str(&contents, token)
    }

    pub fn from_yaml_str(yaml: &str, token: Option<String>) -> Result<Self> {
        let raw: RawConfig = serde_yaml::from_str(yaml)
            .map_err(|err| PredictorError::Config(format!("malformed document: {err}")))?;
        Self::validate(raw, token)
    }

    fn validate(raw: RawConfig, token: Option<String>) -> Result<Self> {
        let server = raw
            .server
            .ok_or_else(|| missing("server"))?;

        let url_raw = required(server.url, "server.url")?;
        let url = Url::parse(&url_raw).map_err(|err| {
            PredictorError::Config(format!("server.url '{url_raw}' is invalid: {err}"))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(PredictorError::Config(format!(
                "server.url '{url_raw}' must use http or https"
            )));
        }

        let org = required(server.org, "server.org")?;
        let bucket = required(server.bucket, "server.bucket")?;
        let measurement = required(server.measurement, "server.measurement")?;
        let output_measurement = non_blank(server.output_measurement)
            .unwrap_or_else(|| measurement.clone());
        let timeout_seconds = server.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        if timeout_seconds == 0 {
            return Err(PredictorError::Config(
                "server.timeout_seconds must be greater than zero".to_string(),
            ));
        }

        let token = non_blank(token).ok_or_else(|| {
            PredictorError::Config(format!("{TOKEN_ENV_VAR} is not set or empty"))
        })?;

        let lookback_seconds = raw
            .matching
            .lookback_seconds
            .unwrap_or(DEFAULT_LOOKBACK_SECONDS);
        if lookback_seconds == 0 {
            return Err(PredictorError::Config(
                "matching.lookback_seconds must be greater than zero".to_string(),
            ));
        }
        let matching = MatchingConfig {
            tolerance: raw.matching.tolerance.unwrap_or_default(),
            mode: raw.matching.mode.unwrap_or_default(),
            lookback: Duration::from_secs(lookback_seconds),
        };

        let mappings = raw
            .mappings
            .ok_or_else(|| missing("mappings"))?
            .into_iter()
            .enumerate()
            .map(|(idx, mapping)| {
                Ok(Mapping {
                    topic: required(mapping.topic, &format!("mappings[{idx}].topic"))?,
                    location: required(mapping.location, &format!("mappings[{idx}].location"))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            server: ServerConfig {
                url,
                org,
                bucket,
                measurement,
                output_measurement,
                timeout: Duration::from_secs(timeout_seconds),
            },
            token,
            matching,
            mappings,
        })
    }
}

fn missing(key: &str) -> PredictorError {
    PredictorError::Config(format!("missing required key '{key}'"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, key: &str) -> Result<String> {
    non_blank(value).ok_or_else(|| missing(key))
}
