use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use tracing::warn;

use crate::core::models::model::ModelRecord;

/// Where the model rate table comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum PricingSource {
    /// Only the table compiled into the binary.
    Embedded,
    /// A JSON file on disk.
    File(PathBuf),
    /// A JSON document served over HTTPS.
    Url(String),
}

/// Registry documents are either a bare array or wrapped in `{"models": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RegistryDocument {
    List(Vec<Value>),
    Wrapped { models: Vec<Value> },
}

impl PricingSource {
    /// Interpret a configured source string.
    ///
    /// Empty or `"embedded"` selects the embedded table, `http(s)://` a URL,
    /// anything else a file path.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("embedded") {
            Self::Embedded
        } else if value.starts_with("https://") || value.starts_with("http://") {
            Self::Url(value.to_string())
        } else {
            Self::File(PathBuf::from(value))
        }
    }

    /// Fetch and parse the model records. `Ok(None)` for the embedded source.
    pub async fn fetch_records(&self) -> Result<Option<Vec<ModelRecord>>> {
        let content = match self {
            Self::Embedded => return Ok(None),
            Self::File(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read pricing file {}", path.display()))?,
            Self::Url(url) => fetch_url(url).await?,
        };
        let records = parse_records(&content)
            .with_context(|| format!("Malformed pricing data from {}", self))?;
        if records.is_empty() {
            anyhow::bail!("Pricing data from {} contains no models", self);
        }
        Ok(Some(records))
    }
}

impl fmt::Display for PricingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embedded => write!(f, "embedded table"),
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Url(url) => write!(f, "{}", url),
        }
    }
}

/// Parse a registry document. Entries that do not describe a model record are
/// skipped with a warning; only an unreadable document is an error.
pub fn parse_records(content: &str) -> Result<Vec<ModelRecord>> {
    let document: RegistryDocument =
        serde_json::from_str(content).context("Failed to parse model registry JSON")?;
    let entries = match document {
        RegistryDocument::List(models) | RegistryDocument::Wrapped { models } => models,
    };

    let mut records = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let id = entry
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("<missing id>")
            .to_string();
        match serde_json::from_value::<ModelRecord>(entry) {
            Ok(record) => records.push(record),
            Err(e) => warn!(index, model = %id, error = %e, "skipping malformed model record"),
        }
    }
    Ok(records)
}

/// Validate that a pricing URL uses HTTPS.
pub fn validate_endpoint(url: &str) -> Result<()> {
    if !url.starts_with("https://") {
        anyhow::bail!("pricing endpoint must use HTTPS, got: {}", url);
    }
    Ok(())
}

async fn fetch_url(url: &str) -> Result<String> {
    validate_endpoint(url)?;

    let response = reqwest::Client::new()
        .get(url)
        .header("Accept", "application/json")
        .send()
        .await
        .with_context(|| format!("Failed to send request to {}", url))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("HTTP {} from pricing endpoint: {}", status.as_u16(), body);
    }

    response
        .text()
        .await
        .context("Failed to read pricing response body")
}
