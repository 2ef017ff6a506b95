use std::collections::HashMap;
use std::future::Future;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::DistanceConfig;

/// Outbound distance lookup between a recipient zip code and candidate donor zip codes.
///
/// Zip codes missing from the returned map, or mapped to a value that is not a number,
/// simply have no known distance.
pub trait DistanceService: Send + Sync {
    fn distances(
        &self,
        origin_zip: &str,
        candidate_zips: &[String],
    ) -> impl Future<Output = Result<HashMap<String, f64>, DistanceError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum DistanceError {
    #[error("distance lookup is not configured")]
    NotConfigured,
    #[error("distance lookup timed out")]
    Timeout,
    #[error("distance transport failed: {0}")]
    Transport(String),
    #[error("distance service returned status {0}")]
    Status(u16),
    #[error("malformed distance response: {0}")]
    Malformed(String),
}

/// Client for the zipcodebase distance endpoint.
pub struct ZipCodeBaseClient {
    http: reqwest::Client,
    config: DistanceConfig,
}

impl ZipCodeBaseClient {
    pub fn new(config: DistanceConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("relief-match/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self { http, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }
}

impl std::fmt::Debug for ZipCodeBaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipCodeBaseClient")
            .field("base_url", &self.config.base_url)
            .field("configured", &self.is_configured())
            .finish_non_exhaustive()
    }
}

impl DistanceService for ZipCodeBaseClient {
    fn distances(
        &self,
        origin_zip: &str,
        candidate_zips: &[String],
    ) -> impl Future<Output = Result<HashMap<String, f64>, DistanceError>> + Send {
        let compare = candidate_zips.join(",");
        let origin = origin_zip.to_string();

        async move {
            let api_key = self
                .config
                .api_key
                .as_deref()
                .ok_or(DistanceError::NotConfigured)?;

            debug!(origin = %origin, compare = %compare, "querying donor distances");

            let response = self
                .http
                .get(&self.config.base_url)
                .query(&[
                    ("apikey", api_key),
                    ("code", origin.as_str()),
                    ("compare", compare.as_str()),
                    ("country", self.config.country.as_str()),
                    ("unit", self.config.unit.as_str()),
                ])
                .send()
                .await
                .map_err(|err| {
                    if err.is_timeout() {
                        DistanceError::Timeout
                    } else {
                        DistanceError::Transport(err.to_string())
                    }
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(DistanceError::Status(status.as_u16()));
            }

            let body = response
                .text()
                .await
                .map_err(|err| DistanceError::Transport(err.to_string()))?;
            parse_distance_body(&body)
        }
    }
}

#[derive(Debug, Deserialize)]
struct DistanceBody {
    results: Value,
}

/// Decode a `{ "results": { zip: distance } }` payload.
pub(crate) fn parse_distance_body(body: &str) -> Result<HashMap<String, f64>, DistanceError> {
    let parsed: DistanceBody =
        serde_json::from_str(body).map_err(|err| DistanceError::Malformed(err.to_string()))?;

    match parsed.results {
        Value::Object(entries) => Ok(entries
            .into_iter()
            .filter_map(|(zip, value)| distance_value(&value).map(|distance| (zip, distance)))
            .collect()),
        // The service answers an empty list when no compare code resolved.
        Value::Array(items) if items.is_empty() => Ok(HashMap::new()),
        other => Err(DistanceError::Malformed(format!(
            "results must be an object, got {other}"
        ))),
    }
}

fn distance_value(value: &Value) -> Option<f64> {
    let distance = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    distance.is_finite().then_some(distance)
}
