//! Overpass API client for POI lookups

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use crate::config::OverpassConfig;
use crate::error::{ApiError, Result};

/// Upper bound on elements per query; keeps worst-case city-center
/// responses from dominating the cache
const MAX_RESULTS: usize = 200;

/// A point of interest in the canonical shape the frontend renders
#[derive(Debug, Clone, Serialize)]
pub struct Poi {
    pub id: i64,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<Element>,
}

#[derive(Debug, Deserialize)]
struct Element {
    id: i64,
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<Center>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct Center {
    lat: f64,
    lon: f64,
}

impl Element {
    /// Nodes carry coordinates directly, ways/relations via `center`;
    /// anything without either is dropped
    fn into_poi(self) -> Option<Poi> {
        let (lat, lon) = match (self.lat, self.lon, self.center) {
            (Some(lat), Some(lon), _) => (lat, lon),
            (_, _, Some(center)) => (center.lat, center.lon),
            _ => return None,
        };
        let name = self.tags.get("name").cloned().unwrap_or_default();

        Some(Poi {
            id: self.id,
            name,
            lat,
            lon,
            tags: self.tags,
        })
    }
}

/// Client for an Overpass-style interpreter endpoint
pub struct OverpassClient {
    http: HttpClient,
    url: String,
    timeout: Duration,
}

impl OverpassClient {
    pub fn new(http: HttpClient, config: &OverpassConfig) -> Self {
        Self {
            http,
            url: config.url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Query nodes and ways carrying `tag_key=tag_value` inside the bbox.
    ///
    /// The bbox string must already be validated; it is spliced into the
    /// query verbatim. The Overpass timeout hint and the request timeout
    /// are the same value - the one caller-side timeout in the system.
    pub async fn search(&self, tag_key: &str, tag_value: &str, bbox: &str) -> Result<Vec<Poi>> {
        let query = format!(
            "[out:json][timeout:{timeout}];\
             (node[\"{tag_key}\"=\"{tag_value}\"]({bbox});\
              way[\"{tag_key}\"=\"{tag_value}\"]({bbox}););\
             out center {MAX_RESULTS};",
            timeout = self.timeout.as_secs(),
        );

        let response = self
            .http
            .post(&self.url)
            .timeout(self.timeout)
            .form(&[("data", query.as_str())])
            .send()
            .await
            .map_err(ApiError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Upstream(format!("Overpass returned status {status}")).into());
        }

        let body: OverpassResponse = response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse Overpass response: {e}"))
        })?;

        Ok(body
            .elements
            .into_iter()
            .filter_map(Element::into_poi)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(server: &mockito::ServerGuard) -> OverpassClient {
        let config = OverpassConfig {
            url: format!("{}/api/interpreter", server.url()),
            timeout_secs: 25,
        };
        OverpassClient::new(crate::client::http_client().unwrap(), &config)
    }

    #[tokio::test]
    async fn test_search_maps_elements() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/interpreter")
            .with_status(200)
            .with_body(
                r#"{
                    "elements": [
                        {"type": "node", "id": 1, "lat": 55.6, "lon": 13.0,
                         "tags": {"name": "Kafé Agnez", "amenity": "cafe"}},
                        {"type": "way", "id": 2,
                         "center": {"lat": 55.61, "lon": 13.01},
                         "tags": {"amenity": "cafe"}},
                        {"type": "relation", "id": 3, "tags": {"amenity": "cafe"}}
                    ]
                }"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let pois = client
            .search("amenity", "cafe", "55.5,12.9,55.7,13.1")
            .await
            .unwrap();

        // Element 3 has no coordinates at all and is dropped
        assert_eq!(pois.len(), 2);
        assert_eq!(pois[0].name, "Kafé Agnez");
        assert_eq!(pois[0].lat, 55.6);
        assert_eq!(pois[0].tags.get("amenity").unwrap(), "cafe");
        // Missing name defaults to empty, center coordinates are used
        assert_eq!(pois[1].name, "");
        assert_eq!(pois[1].lat, 55.61);
    }

    #[tokio::test]
    async fn test_search_empty_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/interpreter")
            .with_status(200)
            .with_body(r#"{"elements": []}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let pois = client.search("amenity", "fuel", "1,2,3,4").await.unwrap();
        assert!(pois.is_empty());
    }

    #[tokio::test]
    async fn test_search_upstream_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/interpreter")
            .with_status(504)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.search("amenity", "cafe", "1,2,3,4").await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Api(ApiError::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn test_search_garbage_body_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/interpreter")
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.search("amenity", "cafe", "1,2,3,4").await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Api(ApiError::InvalidResponse(_))
        ));
    }
}
