//! Configuration management for the Kartvy backend

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// Default system prompt sent with every chat request. Instructs the model
/// to answer in Swedish and to always append a fenced `places` block that
/// the chat service can parse.
const DEFAULT_SYSTEM_PROMPT: &str = r#"Du är en hjälpsam assistent för en interaktiv Sverigekarta. Svara alltid på svenska och håll dig till platser i Sverige.

Avsluta varje svar med ett kodblock märkt places som innehåller en JSON-lista över de platser du nämner, till exempel:

```places
[{"name": "Malmö", "lat": 55.605, "lon": 13.0038, "description": "Sveriges tredje största stad"}]
```

Använd en tom lista om inga platser nämns.
"#;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server binds to
    pub listen: String,

    /// Directory with the built frontend assets, served for unmatched routes
    pub static_dir: PathBuf,

    pub wmts: WmtsConfig,
    pub overpass: OverpassConfig,
    pub chat: ChatConfig,
    pub geocoder: GeocoderConfig,
    pub statistics: StatisticsConfig,
}

/// WMTS tile service (OAuth2 client credentials)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WmtsConfig {
    pub token_url: String,
    pub tile_url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

/// Overpass-style POI interpreter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverpassConfig {
    pub url: String,

    /// Query timeout, embedded in the Overpass QL and applied to the request
    pub timeout_secs: u64,
}

/// Hosted chat-completion provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub url: String,
    pub model: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// System prompt template; swap together with `places_tag` when
    /// changing providers
    pub system_prompt: String,

    /// Tag of the fenced block the model embeds its place list in
    pub places_tag: String,
}

/// Geocoding service used to cross-check chat place coordinates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub url: String,

    /// Comma-separated ISO country codes the search is restricted to
    pub country_codes: String,

    /// Usage-policy rate limit for the public service
    pub max_per_second: u32,
}

/// National statistics table + administrative boundary source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    /// PxWeb table endpoint (GET for metadata, POST for data)
    pub table_url: String,

    /// GeoJSON FeatureCollection of administrative boundaries
    pub boundaries_url: String,

    /// Metadata variable that enumerates the regions
    pub region_variable: String,

    /// Feature property holding the region display name
    pub name_property: String,

    /// Optional admin-level filter: keep only features whose
    /// `level_property` equals `level_value`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_property: Option<String>,
    pub level_value: String,

    /// Measurement/demographic/year selections appended to the region
    /// selection in the data query
    pub query: Vec<ScbSelection>,
}

/// One PxWeb query selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScbSelection {
    pub code: String,
    pub values: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:3000".to_string(),
            static_dir: PathBuf::from("dist"),
            wmts: WmtsConfig::default(),
            overpass: OverpassConfig::default(),
            chat: ChatConfig::default(),
            geocoder: GeocoderConfig::default(),
            statistics: StatisticsConfig::default(),
        }
    }
}

impl Default for WmtsConfig {
    fn default() -> Self {
        Self {
            token_url: "https://apimanager.lantmateriet.se/oauth2/token".to_string(),
            tile_url: "https://api.lantmateriet.se/open/topowebb-ccby/v1.1/wmts".to_string(),
            client_id: None,
            client_secret: None,
        }
    }
}

impl Default for OverpassConfig {
    fn default() -> Self {
        Self {
            url: "https://overpass-api.de/api/interpreter".to_string(),
            timeout_secs: 25,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            url: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            places_tag: "places".to_string(),
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            url: "https://nominatim.openstreetmap.org/search".to_string(),
            country_codes: "se".to_string(),
            max_per_second: 1,
        }
    }
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            table_url:
                "https://api.scb.se/OV0104/v1/doris/sv/ssd/START/AM/AM0210/AM0210A/ArbStatusM"
                    .to_string(),
            boundaries_url:
                "https://raw.githubusercontent.com/okfse/sweden-geojson/master/swedish_municipalities.geojson"
                    .to_string(),
            region_variable: "Region".to_string(),
            name_property: "name".to_string(),
            level_property: None,
            level_value: "7".to_string(),
            query: vec![
                ScbSelection {
                    code: "Alder".to_string(),
                    values: vec!["20-64".to_string()],
                },
                ScbSelection {
                    code: "Kon".to_string(),
                    values: vec!["1+2".to_string()],
                },
                ScbSelection {
                    code: "ContentsCode".to_string(),
                    values: vec!["000006SZ".to_string()],
                },
                ScbSelection {
                    code: "Tid".to_string(),
                    values: vec!["2023".to_string()],
                },
            ],
        }
    }
}

impl Config {
    /// Load configuration from the default locations, falling back to
    /// built-in defaults when no file exists. A server should come up with
    /// nothing but environment-provided secrets.
    pub fn load() -> Result<Self> {
        let local = PathBuf::from("kartvy.yaml");
        if local.exists() {
            return Self::load_from(local);
        }

        if let Some(base) = dirs::config_dir() {
            let path = base.join("kartvy").join("config.yaml");
            if path.exists() {
                return Self::load_from(path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound.into());
        }

        let contents = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;

        Ok(config)
    }

    /// Apply environment overrides for secrets so credentials never have
    /// to live in the config file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("KARTVY_WMTS_CLIENT_ID") {
            self.wmts.client_id = Some(value);
        }
        if let Ok(value) = std::env::var("KARTVY_WMTS_CLIENT_SECRET") {
            self.wmts.client_secret = Some(value);
        }
        if let Ok(value) = std::env::var("KARTVY_CHAT_API_KEY") {
            self.chat.api_key = Some(value);
        }
    }
}

/// Whether a credential value is an obvious stand-in rather than a real key
pub fn is_placeholder(value: &str) -> bool {
    value.is_empty() || value == "changeme" || value.starts_with("your-")
}
