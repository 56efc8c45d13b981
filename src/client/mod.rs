//! Clients for the upstream geodata and AI services

use reqwest::Client as HttpClient;

use crate::error::{ApiError, Result};

pub mod boundaries;
pub mod llm;
pub mod nominatim;
pub mod overpass;
pub mod scb;
pub mod wmts;

pub use boundaries::BoundaryClient;
pub use llm::LlmClient;
pub use nominatim::{Coordinates, Geocoder, NominatimClient};
pub use overpass::{OverpassClient, Poi};
pub use scb::{RegionStatistics, ScbClient};
pub use wmts::WmtsClient;

/// Build the reqwest client shared by every upstream.
///
/// The identifying User-Agent is required by the public Overpass and
/// Nominatim usage policies.
pub fn http_client() -> Result<HttpClient> {
    HttpClient::builder()
        .user_agent(concat!("kartvy/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ApiError::Network(e.to_string()).into())
}
