//! Request handlers for the map-viewer API

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, RawQuery, State};
use axum::http::header;
use axum::response::IntoResponse;
use geojson::FeatureCollection;
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use crate::chat::ChatReply;
use crate::client::Poi;
use crate::error::{ApiError, Error};

/// Tiles are immutable for a day; caching is left to the browser/CDN
const TILE_CACHE_CONTROL: &str = "public, max-age=86400";

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /api/wmts?<tile params>` — authenticated tile pass-through
pub async fn wmts_tile(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Result<impl IntoResponse, Error> {
    let tile = state
        .wmts
        .fetch_tile(query.as_deref().unwrap_or_default())
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, tile.content_type),
            (header::CACHE_CONTROL, TILE_CACHE_CONTROL.to_string()),
        ],
        tile.bytes,
    ))
}

#[derive(Debug, Deserialize)]
pub struct PoiParams {
    category: Option<String>,
    bbox: Option<String>,
}

/// `GET /api/pois?category=<enum>&bbox=<s,w,n,e>`
pub async fn pois(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PoiParams>,
) -> Result<Json<Vec<Poi>>, Error> {
    let category = params.category.as_deref().ok_or_else(|| {
        ApiError::BadRequest(format!(
            "category parameter is required, valid categories: {}",
            crate::pois::PoiCategory::valid_names()
        ))
    })?;
    let bbox = params.bbox.as_deref().ok_or_else(|| {
        ApiError::BadRequest("bbox parameter is required (south,west,north,east)".to_string())
    })?;

    Ok(Json(state.pois.lookup(category, bbox).await?))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    message: Option<String>,
}

/// `POST /api/chat` — model reply plus coordinate-checked place mentions
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, Error> {
    let message = request
        .message
        .filter(|message| !message.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("message is required".to_string()))?;

    Ok(Json(state.chat.chat(&message).await?))
}

/// `GET /api/kommuner-sysselsattning` — boundaries enriched with statistics
pub async fn kommuner_sysselsattning(
    State(state): State<Arc<AppState>>,
) -> Result<Json<FeatureCollection>, Error> {
    Ok(Json(state.employment.enriched_municipalities().await?))
}
