//! Error types for the Kartvy backend

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Result type alias for Kartvy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the application
#[derive(Debug, Error)]
#[allow(dead_code)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation failed: {0}")]
    Other(String),
}

/// Errors from upstream APIs and request validation
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication with the tile service was rejected")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Tile service returned status {0}")]
    TileStatus(u16),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid upstream response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network("Request timed out".to_string())
        } else if err.is_connect() {
            ApiError::Network("Failed to connect to upstream service".to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
#[allow(dead_code)]
pub enum ConfigError {
    #[error("Configuration file not found")]
    NotFound,

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("{0} is not configured")]
    MissingCredential(&'static str),

    #[error("{0} still has a placeholder value")]
    PlaceholderCredential(&'static str),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl Error {
    /// HTTP status this error maps to.
    ///
    /// Tile pass-through keeps the upstream's own status; upstream
    /// non-success and transport failures are gateway errors; everything
    /// configuration- or parse-shaped is on us.
    fn status(&self) -> StatusCode {
        match self {
            Error::Api(ApiError::BadRequest(_)) => StatusCode::BAD_REQUEST,
            Error::Api(ApiError::Upstream(_)) | Error::Api(ApiError::Network(_)) => {
                StatusCode::BAD_GATEWAY
            }
            Error::Api(ApiError::TileStatus(status)) => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if matches!(self, Error::Api(ApiError::TileStatus(_))) {
            // Latency-sensitive binary endpoint: generic plain-text body,
            // no JSON envelope for the client to parse.
            return (status, "tile request failed").into_response();
        }
        log::debug!("request failed with {}: {}", status, self);
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_unauthorized_message() {
        let err = ApiError::Unauthorized;
        assert!(err.to_string().contains("rejected"));
    }

    #[test]
    fn test_api_error_bad_request() {
        let err = ApiError::BadRequest("unknown category \"pubs\"".to_string());
        assert!(err.to_string().contains("pubs"));
    }

    #[test]
    fn test_api_error_upstream() {
        let err = ApiError::Upstream("Overpass returned status 504".to_string());
        assert!(err.to_string().contains("504"));
    }

    #[test]
    fn test_api_error_network() {
        let err = ApiError::Network("Connection refused".to_string());
        assert!(err.to_string().contains("Connection refused"));
    }

    #[test]
    fn test_api_error_invalid_response() {
        let err = ApiError::InvalidResponse("missing field 'access_token'".to_string());
        assert!(err.to_string().contains("access_token"));
    }

    #[test]
    fn test_config_error_missing_credential() {
        let err = ConfigError::MissingCredential("chat.api_key");
        assert!(err.to_string().contains("chat.api_key"));
    }

    #[test]
    fn test_config_error_placeholder_credential() {
        let err = ConfigError::PlaceholderCredential("chat.api_key");
        assert!(err.to_string().contains("placeholder"));
    }

    #[test]
    fn test_config_error_from_yaml_error() {
        let yaml_str = "invalid: [yaml: content";
        let yaml_err = serde_yaml::from_str::<serde_yaml::Value>(yaml_str).unwrap_err();
        let config_err: ConfigError = yaml_err.into();

        match config_err {
            ConfigError::ParseError(_) => (),
            _ => panic!("Expected ConfigError::ParseError"),
        }
    }

    #[test]
    fn test_error_from_api_error() {
        let api_err = ApiError::Unauthorized;
        let err: Error = api_err.into();

        match err {
            Error::Api(ApiError::Unauthorized) => (),
            _ => panic!("Expected Error::Api(ApiError::Unauthorized)"),
        }
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                Error::Api(ApiError::BadRequest("x".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                Error::Api(ApiError::Upstream("x".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                Error::Api(ApiError::Network("x".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                Error::Api(ApiError::TileStatus(401)),
                StatusCode::UNAUTHORIZED,
            ),
            (
                Error::Api(ApiError::InvalidResponse("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                Error::Config(ConfigError::MissingCredential("chat.api_key")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "wrong status for {err}");
        }
    }

    #[test]
    fn test_tile_status_falls_back_on_invalid_codes() {
        assert_eq!(
            Error::Api(ApiError::TileStatus(418)).status(),
            StatusCode::IM_A_TEAPOT
        );
        assert_eq!(
            Error::Api(ApiError::TileStatus(99)).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
