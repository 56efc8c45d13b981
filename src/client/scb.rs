//! PxWeb statistics client (SCB-style national statistics API)

use std::collections::HashMap;

use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;

use crate::config::{ScbSelection, StatisticsConfig};
use crate::error::{ApiError, Result};

/// Region statistics in the shape the merge step consumes
#[derive(Debug, Clone)]
pub struct RegionStatistics {
    /// Region display name → 4-digit municipality code
    pub name_to_code: HashMap<String, String>,
    /// Municipality code → measurement value
    pub code_to_value: HashMap<String, f64>,
}

/// Client for one PxWeb table: GET for metadata, POST for data
pub struct ScbClient {
    http: HttpClient,
    table_url: String,
    region_variable: String,
    selections: Vec<ScbSelection>,
}

impl ScbClient {
    pub fn new(http: HttpClient, config: &StatisticsConfig) -> Self {
        Self {
            http,
            table_url: config.table_url.clone(),
            region_variable: config.region_variable.clone(),
            selections: config.query.clone(),
        }
    }

    /// Full refresh: discover municipality codes, then query their values
    pub async fn fetch(&self) -> Result<RegionStatistics> {
        let name_to_code = self.fetch_region_codes().await?;
        let codes: Vec<&str> = name_to_code.values().map(String::as_str).collect();
        let code_to_value = self.fetch_values(&codes).await?;

        Ok(RegionStatistics {
            name_to_code,
            code_to_value,
        })
    }

    /// Read the table metadata and map municipality names to their codes.
    ///
    /// Municipalities are the 4-digit codes; counties (2 digits) and the
    /// national total ("00") share the same variable and are filtered out.
    async fn fetch_region_codes(&self) -> Result<HashMap<String, String>> {
        #[derive(Deserialize)]
        struct Metadata {
            variables: Vec<Variable>,
        }

        #[derive(Deserialize)]
        struct Variable {
            code: String,
            values: Vec<String>,
            #[serde(rename = "valueTexts")]
            value_texts: Vec<String>,
        }

        let response = self
            .http
            .get(&self.table_url)
            .send()
            .await
            .map_err(ApiError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(
                ApiError::Upstream(format!("statistics metadata returned status {status}")).into(),
            );
        }

        let metadata: Metadata = response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse statistics metadata: {e}"))
        })?;

        let region = metadata
            .variables
            .into_iter()
            .find(|variable| variable.code == self.region_variable)
            .ok_or_else(|| {
                ApiError::InvalidResponse(format!(
                    "metadata has no {:?} variable",
                    self.region_variable
                ))
            })?;

        Ok(region
            .values
            .into_iter()
            .zip(region.value_texts)
            .filter(|(code, _)| code.len() == 4 && code.chars().all(|c| c.is_ascii_digit()))
            .map(|(code, text)| (text.trim().to_string(), code))
            .collect())
    }

    /// Query the configured measurement slice for the given region codes
    async fn fetch_values(&self, codes: &[&str]) -> Result<HashMap<String, f64>> {
        #[derive(Deserialize)]
        struct DataResponse {
            #[serde(default)]
            data: Vec<Row>,
        }

        #[derive(Deserialize)]
        struct Row {
            key: Vec<String>,
            values: Vec<String>,
        }

        // The region selection goes first so the region code is key[0] of
        // every data row
        let mut query = vec![json!({
            "code": self.region_variable,
            "selection": { "filter": "item", "values": codes },
        })];
        query.extend(self.selections.iter().map(|selection| {
            json!({
                "code": selection.code,
                "selection": { "filter": "item", "values": selection.values },
            })
        }));

        let body = json!({
            "query": query,
            "response": { "format": "json" },
        });

        let response = self
            .http
            .post(&self.table_url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(
                ApiError::Upstream(format!("statistics query returned status {status}")).into(),
            );
        }

        let data: DataResponse = response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse statistics data: {e}"))
        })?;

        // Suppressed cells come through as ".." and are dropped silently
        Ok(data
            .data
            .into_iter()
            .filter_map(|row| {
                let code = row.key.first()?.clone();
                let value = row.values.first()?.parse::<f64>().ok()?;
                Some((code, value))
            })
            .collect())
    }
}
