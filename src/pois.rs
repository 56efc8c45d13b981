//! POI lookup service: category validation + short-TTL caching over Overpass

use std::time::Duration;

use log::debug;

use crate::cache::TtlMap;
use crate::client::{OverpassClient, Poi};
use crate::error::{ApiError, Result};

/// Entry count above which inserts trigger a staleness sweep
const SWEEP_THRESHOLD: usize = 200;

/// POI categories the map client can request, each mapping to one upstream
/// tag filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoiCategory {
    Restaurant,
    Cafe,
    FastFood,
    Hospital,
    Pharmacy,
    School,
    Supermarket,
    Fuel,
}

impl PoiCategory {
    /// All categories, in the order they are reported to clients
    pub const ALL: [PoiCategory; 8] = [
        PoiCategory::Restaurant,
        PoiCategory::Cafe,
        PoiCategory::FastFood,
        PoiCategory::Hospital,
        PoiCategory::Pharmacy,
        PoiCategory::School,
        PoiCategory::Supermarket,
        PoiCategory::Fuel,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.name() == raw)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PoiCategory::Restaurant => "restaurant",
            PoiCategory::Cafe => "cafe",
            PoiCategory::FastFood => "fast_food",
            PoiCategory::Hospital => "hospital",
            PoiCategory::Pharmacy => "pharmacy",
            PoiCategory::School => "school",
            PoiCategory::Supermarket => "supermarket",
            PoiCategory::Fuel => "fuel",
        }
    }

    /// The Overpass tag filter this category queries
    pub fn tag(&self) -> (&'static str, &'static str) {
        match self {
            PoiCategory::Restaurant => ("amenity", "restaurant"),
            PoiCategory::Cafe => ("amenity", "cafe"),
            PoiCategory::FastFood => ("amenity", "fast_food"),
            PoiCategory::Hospital => ("amenity", "hospital"),
            PoiCategory::Pharmacy => ("amenity", "pharmacy"),
            PoiCategory::School => ("amenity", "school"),
            PoiCategory::Supermarket => ("shop", "supermarket"),
            PoiCategory::Fuel => ("amenity", "fuel"),
        }
    }

    /// Comma-separated list of valid names, for error messages
    pub fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(|category| category.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// POI lookups with a short-TTL cache keyed on the literal
/// (category, bbox) pair. Bboxes are not normalized, so every distinct
/// pan/zoom costs its own cache slot - hence the sweep.
pub struct PoiService {
    overpass: OverpassClient,
    cache: TtlMap<(PoiCategory, String), Vec<Poi>>,
}

impl PoiService {
    pub fn new(overpass: OverpassClient, ttl: Duration) -> Self {
        Self {
            overpass,
            cache: TtlMap::new(ttl, SWEEP_THRESHOLD),
        }
    }

    pub async fn lookup(&self, raw_category: &str, bbox: &str) -> Result<Vec<Poi>> {
        let category = PoiCategory::parse(raw_category).ok_or_else(|| {
            ApiError::BadRequest(format!(
                "unknown category {raw_category:?}, valid categories: {}",
                PoiCategory::valid_names()
            ))
        })?;
        validate_bbox(bbox)?;

        let key = (category, bbox.to_string());
        if let Some(hit) = self.cache.get(&key).await {
            debug!("POI cache hit for {}/{bbox}", category.name());
            return Ok(hit);
        }

        let (tag_key, tag_value) = category.tag();
        let pois = self.overpass.search(tag_key, tag_value, bbox).await?;
        debug!(
            "fetched {} {} POIs for {bbox}",
            pois.len(),
            category.name()
        );
        self.cache.insert(key, pois.clone()).await;
        Ok(pois)
    }
}

/// A bbox is four comma-separated numbers: south,west,north,east
fn validate_bbox(raw: &str) -> Result<()> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != 4 || parts.iter().any(|part| part.trim().parse::<f64>().is_err()) {
        return Err(ApiError::BadRequest(
            "bbox must be four comma-separated numbers: south,west,north,east".to_string(),
        )
        .into());
    }
    Ok(())
}
