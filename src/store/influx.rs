use super::flux::{parse_annotated_csv, render_latest_query};
use super::{LatestQuery, Point, StoreRow, TimeSeriesStore};
use crate::config::ServerConfig;
use crate::error::{PredictorError, StoreError};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde_json::json;
use url::Url;

/// Blocking InfluxDB v2 HTTP client. One instance is reused for a whole run.
pub struct InfluxClient {
    base_url: Url,
    org: String,
    token: String,
    http: HttpClient,
}

impl InfluxClient {
    pub fn new(server: &ServerConfig, token: &str) -> Result<Self, StoreError> {
        let http = HttpClient::builder().timeout(server.timeout).build()?;
        Ok(Self {
            base_url: with_trailing_slash(&server.url),
            org: server.org.clone(),
            token: token.to_string(),
            http,
        })
    }

    /// Builds the client and verifies the server answers `/ping`.
    pub fn connect(server: &ServerConfig, token: &str) -> Result<Self, PredictorError> {
        let connection_error = |reason: String| PredictorError::Connection {
            url: server.url.to_string(),
            reason,
        };
        let client = Self::new(server, token).map_err(|err| connection_error(err.to_string()))?;
        client
            .ping()
            .map_err(|err| connection_error(err.to_string()))?;
        tracing::debug!(url = %server.url, "time-series store reachable");
        Ok(client)
    }

    fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        Ok(self.base_url.join(path)?)
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.token)
    }
}

impl TimeSeriesStore for InfluxClient {
    fn ping(&self) -> Result<(), StoreError> {
        let response = self.http.get(self.endpoint("ping")?).send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    fn query_latest(&self, query: &LatestQuery<'_>) -> Result<Vec<StoreRow>, StoreError> {
        let mut url = self.endpoint("api/v2/query")?;
        url.query_pairs_mut().append_pair("org", &self.org);

        let flux = render_latest_query(query);
        tracing::trace!(%flux, "flux query");
        let payload = json!({
            "query": flux,
            "type": "flux",
            "dialect": {
                "header": true,
                "delimiter": ",",
                "annotations": ["datatype", "group", "default"],
            },
        });

        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, self.auth_header())
            .header(ACCEPT, "application/csv")
            .json(&payload)
            .send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        parse_annotated_csv(&body)
    }

    fn write_point(&self, bucket: &str, point: &Point) -> Result<(), StoreError> {
        let line = point.to_line_protocol()?;
        let mut url = self.endpoint("api/v2/write")?;
        url.query_pairs_mut()
            .append_pair("org", &self.org)
            .append_pair("bucket", bucket)
            .append_pair("precision", "ns");

        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, self.auth_header())
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(line)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// `Url::join` drops the last path segment unless the base ends in `/`.
fn with_trailing_slash(url: &Url) -> Url {
    let mut url = url.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
