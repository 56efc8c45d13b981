//! Administrative boundary source (GeoJSON FeatureCollection)

use geojson::FeatureCollection;
use reqwest::Client as HttpClient;

use crate::error::{ApiError, Result};

/// Client for the external boundary-polygon source
pub struct BoundaryClient {
    http: HttpClient,
    url: String,
}

impl BoundaryClient {
    pub fn new(http: HttpClient, url: &str) -> Self {
        Self {
            http,
            url: url.to_string(),
        }
    }

    pub async fn fetch(&self) -> Result<FeatureCollection> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(ApiError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(
                ApiError::Upstream(format!("boundary source returned status {status}")).into(),
            );
        }

        response.json::<FeatureCollection>().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse boundary collection: {e}")).into()
        })
    }
}
