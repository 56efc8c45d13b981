//! Chat orchestration: model completion, place extraction, coordinate
//! cross-checking
//!
//! The model is asked (via the system prompt) to end every reply with a
//! fenced block tagged `places` holding a JSON array of place mentions.
//! Everything downstream of the completion is best-effort: a malformed
//! block or a failed geocoder lookup degrades the answer, never the
//! request.

use std::sync::Arc;

use futures::future::join_all;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::client::{Geocoder, LlmClient};
use crate::config::ChatConfig;
use crate::error::Result;

/// A place mentioned in a model reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub description: String,
}

/// Chat response: display text with the places block stripped, plus the
/// extracted (and coordinate-checked) places in their original order
#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub text: String,
    pub places: Vec<Place>,
}

pub struct ChatService {
    llm: LlmClient,
    geocoder: Arc<dyn Geocoder>,
    system_prompt: String,
    places_tag: String,
}

impl ChatService {
    pub fn new(llm: LlmClient, geocoder: Arc<dyn Geocoder>, config: &ChatConfig) -> Self {
        Self {
            llm,
            geocoder,
            system_prompt: config.system_prompt.clone(),
            places_tag: config.places_tag.clone(),
        }
    }

    pub async fn chat(&self, message: &str) -> Result<ChatReply> {
        let content = self.llm.complete(&self.system_prompt, message).await?;
        let (text, places) = extract_places(&content, &self.places_tag);
        let places = self.verify_coordinates(places).await;

        Ok(ChatReply { text, places })
    }

    /// Cross-check every place against the geocoder, concurrently.
    ///
    /// A hit overwrites the model's coordinates; a miss or a failed lookup
    /// keeps them. `join_all` preserves the original ordering regardless of
    /// which lookup finishes first.
    async fn verify_coordinates(&self, places: Vec<Place>) -> Vec<Place> {
        let lookups = places.into_iter().map(|place| async move {
            match self.geocoder.resolve(&place.name).await {
                Ok(Some(coordinates)) => Place {
                    lat: coordinates.lat,
                    lon: coordinates.lon,
                    ..place
                },
                Ok(None) => place,
                Err(err) => {
                    warn!(
                        "geocoding {:?} failed, keeping model coordinates: {err}",
                        place.name
                    );
                    place
                }
            }
        });

        join_all(lookups).await
    }
}

/// Split a model reply into display text and its place mentions.
///
/// Returns the reply with the fenced block removed. A missing, unterminated
/// or unparsable block yields an empty place list - the text still goes
/// back to the caller.
fn extract_places(content: &str, tag: &str) -> (String, Vec<Place>) {
    let fence = format!("```{tag}");
    let Some(start) = content.find(&fence) else {
        return (content.trim().to_string(), Vec::new());
    };

    let body_start = start + fence.len();
    let Some(end) = content[body_start..].find("```") else {
        warn!("places block is not terminated, returning reply as-is");
        return (content.trim().to_string(), Vec::new());
    };

    let places = match serde_json::from_str::<Vec<Place>>(content[body_start..body_start + end].trim())
    {
        Ok(places) => places,
        Err(err) => {
            warn!("failed to parse places block: {err}");
            Vec::new()
        }
    };

    let text = format!(
        "{}{}",
        &content[..start],
        &content[body_start + end + 3..]
    );
    (text.trim().to_string(), places)
}
