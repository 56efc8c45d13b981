//! HTTP surface: application state, router and CORS wiring

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::cache::CacheTtl;
use crate::chat::ChatService;
use crate::client::{
    BoundaryClient, LlmClient, NominatimClient, OverpassClient, ScbClient, WmtsClient,
};
use crate::config::Config;
use crate::employment::EmploymentService;
use crate::error::Result;
use crate::pois::PoiService;

pub mod handlers;

/// Shared application state: one client per upstream, caches included
pub struct AppState {
    pub config: Config,
    pub wmts: WmtsClient,
    pub pois: PoiService,
    pub chat: ChatService,
    pub employment: EmploymentService,
}

impl AppState {
    pub fn build(config: Config) -> Result<Self> {
        let http = crate::client::http_client()?;

        let wmts = WmtsClient::new(http.clone(), &config.wmts);
        let pois = PoiService::new(
            OverpassClient::new(http.clone(), &config.overpass),
            CacheTtl::POIS,
        );
        let chat = ChatService::new(
            LlmClient::new(http.clone(), &config.chat),
            Arc::new(NominatimClient::new(http.clone(), &config.geocoder)),
            &config.chat,
        );
        let employment = EmploymentService::new(
            ScbClient::new(http.clone(), &config.statistics),
            BoundaryClient::new(http, &config.statistics.boundaries_url),
            &config.statistics,
        );

        Ok(Self {
            config,
            wmts,
            pois,
            chat,
            employment,
        })
    }
}

/// Build the router: API routes, permissive CORS (the map client may be
/// served from anywhere during development), static frontend fallback
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let static_dir = state.config.static_dir.clone();

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/wmts", get(handlers::wmts_tile))
        .route("/api/pois", get(handlers::pois))
        .route("/api/chat", post(handlers::chat))
        .route(
            "/api/kommuner-sysselsattning",
            get(handlers::kommuner_sysselsattning),
        )
        .fallback_service(ServeDir::new(static_dir))
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    /// Config with every upstream pointed at the mock server
    fn test_config(server: &mockito::ServerGuard) -> Config {
        let mut config = Config::default();
        config.wmts.token_url = format!("{}/oauth2/token", server.url());
        config.wmts.tile_url = format!("{}/wmts", server.url());
        config.wmts.client_id = Some("id".to_string());
        config.wmts.client_secret = Some("secret".to_string());
        config.overpass.url = format!("{}/api/interpreter", server.url());
        config.chat.url = format!("{}/v1/chat/completions", server.url());
        config.chat.api_key = Some("sk-test".to_string());
        config.geocoder.url = format!("{}/search", server.url());
        config.geocoder.max_per_second = 100;
        config.statistics.table_url = format!("{}/scb", server.url());
        config.statistics.boundaries_url = format!("{}/kommuner.geojson", server.url());
        config
    }

    fn app_for(config: Config) -> Router {
        router(Arc::new(AppState::build(config).unwrap()))
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let server = mockito::Server::new_async().await;
        let response = app_for(test_config(&server))
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("\"status\":\"ok\""));
    }

    #[tokio::test]
    async fn test_pois_unknown_category_is_400_listing_options() {
        let server = mockito::Server::new_async().await;
        let response = app_for(test_config(&server))
            .oneshot(
                Request::get("/api/pois?category=disco&bbox=55.5,12.9,55.7,13.1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_string(response).await;
        assert!(body.contains("disco"));
        assert!(body.contains("restaurant"));
        assert!(body.contains("cafe"));
        assert!(body.contains("fuel"));
    }

    #[tokio::test]
    async fn test_pois_missing_bbox_is_400() {
        let server = mockito::Server::new_async().await;
        let response = app_for(test_config(&server))
            .oneshot(
                Request::get("/api/pois?category=cafe")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("bbox"));
    }

    #[tokio::test]
    async fn test_pois_upstream_failure_is_502() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/interpreter")
            .with_status(500)
            .create_async()
            .await;

        let response = app_for(test_config(&server))
            .oneshot(
                Request::get("/api/pois?category=cafe&bbox=55.5,12.9,55.7,13.1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_chat_missing_message_is_400() {
        let server = mockito::Server::new_async().await;
        let response = app_for(test_config(&server))
            .oneshot(
                Request::post("/api/chat")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("message"));
    }

    #[tokio::test]
    async fn test_chat_unconfigured_key_is_500() {
        let server = mockito::Server::new_async().await;
        let mut config = test_config(&server);
        config.chat.api_key = None;

        let response = app_for(config)
            .oneshot(
                Request::post("/api/chat")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"message": "hej"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_wmts_happy_path_sets_cache_control() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth2/token")
            .with_status(200)
            .with_body(r#"{"access_token": "tok", "expires_in": 3600}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/wmts")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body("tilebytes")
            .create_async()
            .await;

        let response = app_for(test_config(&server))
            .oneshot(
                Request::get("/api/wmts?layer=topowebb&tilematrix=5&tilerow=10&tilecol=11")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "public, max-age=86400"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/png"
        );
        assert_eq!(body_string(response).await, "tilebytes");
    }

    #[tokio::test]
    async fn test_wmts_upstream_status_passes_through() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth2/token")
            .with_status(200)
            .with_body(r#"{"access_token": "tok", "expires_in": 3600}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/wmts")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let response = app_for(test_config(&server))
            .oneshot(
                Request::get("/api/wmts?layer=nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, "tile request failed");
    }

    #[tokio::test]
    async fn test_kommuner_sysselsattning_enriches_features() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/scb")
            .with_status(200)
            .with_body(
                r#"{"variables": [{"code": "Region", "values": ["1280"], "valueTexts": ["malmö"]}]}"#,
            )
            .create_async()
            .await;
        server
            .mock("POST", "/scb")
            .with_status(200)
            .with_body(r#"{"data": [{"key": ["1280", "2023"], "values": ["171885"]}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/kommuner.geojson")
            .with_status(200)
            .with_body(
                r#"{"type": "FeatureCollection", "features": [
                    {"type": "Feature", "properties": {"name": "Malmö"},
                     "geometry": {"type": "Polygon", "coordinates": [[[13.0, 55.6], [13.1, 55.6], [13.1, 55.7], [13.0, 55.6]]]}}
                ]}"#,
            )
            .create_async()
            .await;

        let response = app_for(test_config(&server))
            .oneshot(
                Request::get("/api/kommuner-sysselsattning")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("\"FeatureCollection\""));
        // Case-insensitive match against the lowercased statistics name
        assert!(body.contains("\"code\":\"1280\""));
        assert!(body.contains("171885"));
    }

    #[tokio::test]
    async fn test_preflight_is_short_circuited_with_cors_headers() {
        let server = mockito::Server::new_async().await;
        let response = app_for(test_config(&server))
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/pois")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_success());
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }
}
