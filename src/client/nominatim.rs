//! Geocoding client used to cross-check model-provided coordinates

use std::num::NonZeroU32;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::config::GeocoderConfig;
use crate::error::{ApiError, Result};

/// A geocoder hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Place-name resolution seam; the chat service only depends on this
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Best match for a place name, or None when the service has none
    async fn resolve(&self, name: &str) -> Result<Option<Coordinates>>;
}

/// Nominatim-style geocoding client, rate limited to the public service's
/// usage policy
pub struct NominatimClient {
    http: HttpClient,
    url: String,
    country_codes: String,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl NominatimClient {
    pub fn new(http: HttpClient, config: &GeocoderConfig) -> Self {
        let per_second = NonZeroU32::new(config.max_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(per_second));

        Self {
            http,
            url: config.url.clone(),
            country_codes: config.country_codes.clone(),
            rate_limiter,
        }
    }
}

#[async_trait]
impl Geocoder for NominatimClient {
    async fn resolve(&self, name: &str) -> Result<Option<Coordinates>> {
        // Coordinates come back as strings in the search response
        #[derive(Deserialize)]
        struct SearchHit {
            lat: String,
            lon: String,
        }

        self.rate_limiter.until_ready().await;

        let response = self
            .http
            .get(&self.url)
            .query(&[
                ("q", name),
                ("format", "json"),
                ("limit", "1"),
                ("countrycodes", &self.country_codes),
            ])
            .send()
            .await
            .map_err(ApiError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Upstream(format!("geocoder returned status {status}")).into());
        }

        let hits: Vec<SearchHit> = response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse geocoder response: {e}"))
        })?;

        Ok(hits.first().and_then(|hit| {
            Some(Coordinates {
                lat: hit.lat.parse().ok()?,
                lon: hit.lon.parse().ok()?,
            })
        }))
    }
}
