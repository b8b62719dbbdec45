//! Coordinate enrichment for events the provider did not locate.

use crate::constants::GOOGLE_GEOCODE_URL;
use crate::error::{Result, SyncError};
use crate::http::check_ok;
use crate::metrics::PipelineMetrics;
use crate::progress::ProgressSink;
use crate::types::{Brevet, GeoPoint};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// Resolves a free-text address to a coordinate pair
#[async_trait::async_trait]
pub trait GeocodingOracle: Send + Sync {
    /// `Ok(None)` when the address is unknown; `Err` only for transport or auth failures
    async fn resolve(&self, address: &str) -> Result<Option<GeoPoint>>;
}

/// Spacing between consecutive oracle calls
#[async_trait::async_trait]
pub trait Throttle: Send + Sync {
    async fn wait(&self);
}

/// Enforces a minimum interval between calls
#[derive(Debug)]
pub struct IntervalThrottle {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl IntervalThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl Throttle for IntervalThrottle {
    async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

pub struct NoThrottle;

#[async_trait::async_trait]
impl Throttle for NoThrottle {
    async fn wait(&self) {}
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Location,
}

#[derive(Debug, Deserialize)]
struct Location {
    lat: Option<f64>,
    lng: Option<f64>,
}

/// Google Maps Geocoding API client
pub struct GoogleGeocoder {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl GoogleGeocoder {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self::with_endpoint(client, api_key, GOOGLE_GEOCODE_URL)
    }

    pub fn with_endpoint(
        client: reqwest::Client,
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        }
    }
}

/// First result's location; `ZERO_RESULTS` is a miss, any other non-OK status is fatal.
fn location_from_response(body: serde_json::Value) -> Result<Option<GeoPoint>> {
    let response: GeocodeResponse = serde_json::from_value(body)?;
    match response.status.as_str() {
        "OK" => Ok(response
            .results
            .first()
            .and_then(|r| GeoPoint::from_parts(r.geometry.location.lat, r.geometry.location.lng))),
        "ZERO_RESULTS" => Ok(None),
        status => Err(SyncError::Geocoding {
            message: match response.error_message {
                Some(detail) => format!("{status}: {detail}"),
                None => status.to_string(),
            },
        }),
    }
}

#[async_trait::async_trait]
impl GeocodingOracle for GoogleGeocoder {
    async fn resolve(&self, address: &str) -> Result<Option<GeoPoint>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await?;
        let body: serde_json::Value = check_ok(response, "geocode")?.json().await?;
        location_from_response(body)
    }
}

/// Non-empty location fields joined coarse-to-fine: `country, region, department, city`.
pub fn build_address(brevet: &Brevet) -> String {
    [&brevet.country, &brevet.region, &brevet.department, &brevet.city]
        .into_iter()
        .filter_map(|part| part.as_deref())
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentReport {
    /// Oracle calls made
    pub attempted: usize,
    pub resolved: usize,
    /// No usable result, or nothing to look up
    pub missed: usize,
    /// Already had coordinates
    pub skipped: usize,
}

/// Walks a batch in order and fills in missing coordinates one call at a time.
pub struct Enricher {
    oracle: Box<dyn GeocodingOracle>,
    throttle: Box<dyn Throttle>,
    progress: Box<dyn ProgressSink>,
}

impl Enricher {
    pub fn new(
        oracle: Box<dyn GeocodingOracle>,
        throttle: Box<dyn Throttle>,
        progress: Box<dyn ProgressSink>,
    ) -> Self {
        Self {
            oracle,
            throttle,
            progress,
        }
    }

    #[instrument(skip(self, brevets), fields(events = brevets.len()))]
    pub async fn enrich(&self, brevets: &mut [Brevet]) -> Result<EnrichmentReport> {
        let mut report = EnrichmentReport::default();
        self.progress.start(brevets.len() as u64);

        for (i, brevet) in brevets.iter_mut().enumerate() {
            self.progress.set_position(i as u64 + 1);
            if brevet.has_coordinates() {
                report.skipped += 1;
                continue;
            }
            let address = build_address(brevet);
            if address.is_empty() {
                debug!(id = %brevet.object_id, "No location fields to geocode");
                report.missed += 1;
                continue;
            }

            self.throttle.wait().await;
            report.attempted += 1;
            match self.oracle.resolve(&address).await? {
                Some(point) => {
                    brevet.set_coordinates(point);
                    report.resolved += 1;
                }
                None => {
                    debug!(id = %brevet.object_id, %address, "Address not found");
                    report.missed += 1;
                }
            }
        }

        self.progress.finish();
        PipelineMetrics::record_geocoding(report.resolved, report.missed);
        info!(
            attempted = report.attempted,
            resolved = report.resolved,
            missed = report.missed,
            skipped = report.skipped,
            "Geocoding complete"
        );
        Ok(report)
    }
}
