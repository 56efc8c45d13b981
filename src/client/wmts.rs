//! WMTS tile service client: OAuth2 token cache + authenticated tile proxy

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use reqwest::{Client as HttpClient, StatusCode, header};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::WmtsConfig;
use crate::error::{ApiError, ConfigError, Result};

/// Safety margin subtracted from the upstream token lifetime so we refresh
/// before the upstream's own expiry can race us
const EXPIRY_MARGIN_SECS: i64 = 300;

/// A fetched tile, ready to relay to the map client
#[derive(Debug)]
pub struct Tile {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Client for the OAuth2-protected WMTS tile endpoint.
///
/// Holds the one bearer token the whole server shares. The token slot is a
/// Mutex held across the exchange, so concurrent requests that all find the
/// token stale wait for a single refresh instead of stampeding the token
/// endpoint.
pub struct WmtsClient {
    http: HttpClient,
    token_url: String,
    tile_url: String,
    credentials: Option<(String, String)>,
    token: Mutex<Option<AccessToken>>,
}

impl WmtsClient {
    pub fn new(http: HttpClient, config: &WmtsConfig) -> Self {
        let credentials = config
            .client_id
            .clone()
            .zip(config.client_secret.clone());

        Self {
            http,
            token_url: config.token_url.clone(),
            tile_url: config.tile_url.clone(),
            credentials,
            token: Mutex::new(None),
        }
    }

    /// Proxy one tile request, forwarding the query string verbatim.
    ///
    /// On 401 the cached token is invalidated and the request retried
    /// exactly once with a fresh token; any further failure propagates the
    /// upstream status. Tile requests are latency-sensitive, so there is no
    /// retry beyond that.
    pub async fn fetch_tile(&self, raw_query: &str) -> Result<Tile> {
        let token = self.bearer_token().await?;
        let response = self.tile_request(raw_query, &token).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.invalidate().await;
            let token = self.bearer_token().await?;
            let response = self.tile_request(raw_query, &token).await?;
            return Self::read_tile(response).await;
        }

        Self::read_tile(response).await
    }

    /// Get the cached bearer token, refreshing it when missing or past the
    /// expiry margin
    pub async fn bearer_token(&self) -> Result<String> {
        let mut slot = self.token.lock().await;
        if let Some(token) = slot.as_ref()
            && Utc::now() < token.expires_at
        {
            return Ok(token.value.clone());
        }

        let fresh = self.exchange().await?;
        log::debug!("refreshed WMTS access token, valid until {}", fresh.expires_at);
        let value = fresh.value.clone();
        *slot = Some(fresh);
        Ok(value)
    }

    /// Drop the cached token so the next call performs a fresh exchange
    async fn invalidate(&self) {
        *self.token.lock().await = None;
    }

    /// OAuth2 client-credentials exchange
    async fn exchange(&self) -> Result<AccessToken> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: i64,
        }

        let (client_id, client_secret) = self
            .credentials
            .as_ref()
            .ok_or(ConfigError::MissingCredential("wmts.client_id"))?;

        let basic = BASE64.encode(format!("{client_id}:{client_secret}"));
        let response = self
            .http
            .post(&self.token_url)
            .header(header::AUTHORIZATION, format!("Basic {basic}"))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(ApiError::from)?;

        if !response.status().is_success() {
            return Err(ApiError::Unauthorized.into());
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse token response: {e}"))
        })?;

        // A lifetime shorter than the margin yields an already-stale token;
        // clamp so the expiry never lands in the past
        let lifetime = (token.expires_in - EXPIRY_MARGIN_SECS).max(0);
        Ok(AccessToken {
            value: token.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(lifetime),
        })
    }

    async fn tile_request(&self, raw_query: &str, token: &str) -> Result<reqwest::Response> {
        let url = if raw_query.is_empty() {
            self.tile_url.clone()
        } else {
            format!("{}?{}", self.tile_url, raw_query)
        };

        self.http
            .get(&url)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await
            .map_err(|e| ApiError::from(e).into())
    }

    async fn read_tile(response: reqwest::Response) -> Result<Tile> {
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::TileStatus(status.as_u16()).into());
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png")
            .to_string();
        let bytes = response.bytes().await.map_err(ApiError::from)?.to_vec();

        Ok(Tile {
            content_type,
            bytes,
        })
    }

    /// Seed the token slot directly, bypassing the exchange
    #[cfg(test)]
    pub(crate) async fn seed_token(&self, value: &str, ttl_secs: i64) {
        *self.token.lock().await = Some(AccessToken {
            value: value.to_string(),
            expires_at: Utc::now() + chrono::Duration::seconds(ttl_secs),
        });
    }
}
