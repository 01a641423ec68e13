//! # Fleet REST Backend
//!
//! The request side of the sync engine. [`FleetBackend`] is the seam the
//! engine fetches through; [`HttpBackend`] is the production implementation
//! over `reqwest`.
//!
//! ## Endpoints
//! ```text
//! GET {base}/api/vehicles                  → fleet snapshot
//! GET {base}/api/vehicles/status/{status}  → filtered list
//! GET {base}/api/vehicles/{id}             → one vehicle (404 = not found)
//! GET {base}/api/statistics                → authoritative aggregates
//! ```
//!
//! Every response is normalized before it leaves this module, so the engine
//! only ever sees canonical `Vehicle` / `StatisticsPatch` values.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

use fleet_core::payload::{vehicle_array, vehicle_object};
use fleet_core::{normalize, normalize_all, StatisticsPatch, Vehicle, VehicleStatus};

use crate::config::FleetConfig;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Backend Trait
// =============================================================================

/// Source of fleet data.
#[async_trait]
pub trait FleetBackend: Send + Sync {
    /// Full fleet snapshot.
    async fn fetch_all(&self) -> SyncResult<Vec<Vehicle>>;

    /// Vehicles currently in `status`.
    async fn fetch_by_status(&self, status: &VehicleStatus) -> SyncResult<Vec<Vehicle>>;

    /// One vehicle, `None` when the backend does not know the id.
    async fn fetch_by_id(&self, id: &str) -> SyncResult<Option<Vehicle>>;

    /// Authoritative statistics. Absent fields stay `None`.
    async fn fetch_statistics(&self) -> SyncResult<StatisticsPatch>;
}

// =============================================================================
// HTTP Backend
// =============================================================================

/// REST client for the fleet API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    /// Creates a client for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, request_timeout: Duration) -> SyncResult<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::InvalidUrl(format!("not a base URL: {base_url}")));
        }

        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(HttpBackend { client, base_url })
    }

    pub fn from_config(config: &FleetConfig) -> SyncResult<Self> {
        Self::new(&config.api.base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> SyncResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GETs `url` and decodes JSON. `Ok(None)` on 404.
    async fn get_json(&self, url: Url) -> SyncResult<Option<Value>> {
        debug!(url = %url, "GET");
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SyncError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(Some(response.json::<Value>().await?))
    }

    /// GETs a list endpoint, treating 404 as an error.
    async fn get_list(&self, url: Url) -> SyncResult<Vec<Vehicle>> {
        let body = self.get_json(url.clone()).await?.ok_or(SyncError::HttpStatus {
            status: StatusCode::NOT_FOUND.as_u16(),
            url: url.to_string(),
        })?;
        let vehicles = normalize_all(vehicle_array(&body)?);
        debug!(url = %url, count = vehicles.len(), "Fetched vehicle list");
        Ok(vehicles)
    }
}

#[async_trait]
impl FleetBackend for HttpBackend {
    async fn fetch_all(&self) -> SyncResult<Vec<Vehicle>> {
        let url = self.endpoint(&["api", "vehicles"])?;
        self.get_list(url).await
    }

    async fn fetch_by_status(&self, status: &VehicleStatus) -> SyncResult<Vec<Vehicle>> {
        let url = self.endpoint(&["api", "vehicles", "status", status.as_str()])?;
        self.get_list(url).await
    }

    async fn fetch_by_id(&self, id: &str) -> SyncResult<Option<Vehicle>> {
        let url = self.endpoint(&["api", "vehicles", id])?;
        match self.get_json(url).await? {
            Some(body) => Ok(Some(normalize(vehicle_object(&body)?)?)),
            None => Ok(None),
        }
    }

    async fn fetch_statistics(&self) -> SyncResult<StatisticsPatch> {
        let url = self.endpoint(&["api", "statistics"])?;
        let body = self.get_json(url.clone()).await?.ok_or(SyncError::HttpStatus {
            status: StatusCode::NOT_FOUND.as_u16(),
            url: url.to_string(),
        })?;
        Ok(StatisticsPatch::from_value(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base: &str) -> HttpBackend {
        HttpBackend::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_endpoint_building() {
        let b = backend("http://fleet.local:3000");
        assert_eq!(
            b.endpoint(&["api", "vehicles"]).unwrap().as_str(),
            "http://fleet.local:3000/api/vehicles"
        );

        // Trailing slash and path prefix are both kept sane
        let b = backend("http://fleet.local/v1/");
        assert_eq!(
            b.endpoint(&["api", "statistics"]).unwrap().as_str(),
            "http://fleet.local/v1/api/statistics"
        );
    }

    #[test]
    fn test_ids_are_percent_encoded() {
        let b = backend("http://fleet.local");
        let url = b.endpoint(&["api", "vehicles", "TRK 1/a"]).unwrap();
        assert_eq!(url.as_str(), "http://fleet.local/api/vehicles/TRK%201%2Fa");
    }

    #[test]
    fn test_rejects_non_base_urls() {
        assert!(HttpBackend::new("mailto:ops@fleet", Duration::from_secs(1)).is_err());
        assert!(HttpBackend::new("not a url", Duration::from_secs(1)).is_err());
    }
}
