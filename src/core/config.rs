use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::core::cost::estimator::{
    EstimatorSettings, DEFAULT_CHARS_PER_TOKEN, DEFAULT_COLD_START_BUFFER_SECS,
    DEFAULT_MIN_INPUT_TOKENS,
};
use crate::core::cost::pricing::{ComputeRateCard, DEFAULT_HARDWARE_CLASS, FALLBACK_MODEL_ID};
use crate::core::cost::registry::PricingRegistry;
use crate::core::cost::source::PricingSource;

/// Overrides `pricing.source` when set.
pub const PRICING_SOURCE_ENV: &str = "FLOWCOST_PRICING_SOURCE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_format")]
    pub default_format: String,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_format() -> String {
    "text".to_string()
}
fn default_color() -> String {
    "auto".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_format: default_format(),
            color: default_color(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareRateConfig {
    pub id: String,
    pub price_per_second_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// File path or HTTPS URL of the model registry; unset means embedded only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,
    #[serde(default = "default_hardware")]
    pub default_hardware: String,
    #[serde(default)]
    pub hardware: Vec<HardwareRateConfig>,
}

fn default_fetch_timeout_secs() -> u64 {
    10
}
fn default_fallback_model() -> String {
    FALLBACK_MODEL_ID.to_string()
}
fn default_hardware() -> String {
    DEFAULT_HARDWARE_CLASS.to_string()
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            source: None,
            fetch_timeout_secs: default_fetch_timeout_secs(),
            fallback_model: default_fallback_model(),
            default_hardware: default_hardware(),
            hardware: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    #[serde(default = "default_cold_start")]
    pub cold_start_buffer_secs: f64,
    #[serde(default = "default_min_input_tokens")]
    pub min_input_tokens: u64,
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: u64,
}

fn default_cold_start() -> f64 {
    DEFAULT_COLD_START_BUFFER_SECS
}
fn default_min_input_tokens() -> u64 {
    DEFAULT_MIN_INPUT_TOKENS
}
fn default_chars_per_token() -> u64 {
    DEFAULT_CHARS_PER_TOKEN
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            cold_start_buffer_secs: default_cold_start(),
            min_input_tokens: default_min_input_tokens(),
            chars_per_token: default_chars_per_token(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub estimator: EstimatorConfig,
}

impl AppConfig {
    /// Get the config file path, respecting XDG_CONFIG_HOME
    pub fn config_path() -> PathBuf {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("~"))
                    .join(".config")
            });
        config_dir.join("flowcost").join("config.toml")
    }

    /// Load config from the default path, falling back to defaults if not found.
    /// The pricing source env var wins over the file.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        if let Ok(source) = std::env::var(PRICING_SOURCE_ENV) {
            config.pricing.source = Some(source);
        }
        Ok(config)
    }

    /// Serialize and write this config to the config file path.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    pub fn pricing_source(&self) -> PricingSource {
        PricingSource::parse(self.pricing.source.as_deref().unwrap_or(""))
    }

    /// Built-in compute rates with the configured overrides applied.
    pub fn compute_card(&self) -> ComputeRateCard {
        self.pricing
            .hardware
            .iter()
            .fold(ComputeRateCard::builtin(), |card, hw| {
                card.with_rate(&hw.id, hw.price_per_second_usd)
            })
    }

    /// A registry wired to this config. Nothing is loaded until first use.
    pub fn registry(&self) -> PricingRegistry {
        PricingRegistry::new(self.pricing_source())
            .fetch_timeout(Duration::from_secs(self.pricing.fetch_timeout_secs))
            .fallback_model(self.pricing.fallback_model.clone())
            .compute_card(self.compute_card())
    }

    /// Estimator knobs from `[estimator]`, clamped so quotes never drop below one
    /// input token or go negative. `validate()` reports the raw values.
    pub fn estimator_settings(&self) -> EstimatorSettings {
        let cold_start = self.estimator.cold_start_buffer_secs;
        EstimatorSettings {
            chars_per_token: self.estimator.chars_per_token.max(1),
            min_input_tokens: self.estimator.min_input_tokens.max(1),
            cold_start_buffer_secs: if cold_start.is_finite() {
                cold_start.max(0.0)
            } else {
                DEFAULT_COLD_START_BUFFER_SECS
            },
        }
    }

    /// Validate the config
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !["text", "json"].contains(&self.settings.default_format.as_str()) {
            issues.push(format!(
                "Invalid default_format: '{}' (must be 'text' or 'json')",
                self.settings.default_format
            ));
        }
        if !["auto", "always", "never"].contains(&self.settings.color.as_str()) {
            issues.push(format!(
                "Invalid color: '{}' (must be 'auto', 'always', or 'never')",
                self.settings.color
            ));
        }
        if let Some(source) = &self.pricing.source {
            if source.starts_with("http://") {
                issues.push(format!("Pricing source must use HTTPS: '{}'", source));
            }
        }
        if self.pricing.fetch_timeout_secs == 0 {
            issues.push("pricing.fetch_timeout_secs must be greater than 0".to_string());
        }
        if self.pricing.fallback_model.trim().is_empty() {
            issues.push("pricing.fallback_model must not be empty".to_string());
        }
        for hw in &self.pricing.hardware {
            if hw.id.trim().is_empty() {
                issues.push("Hardware rate with empty id".to_string());
            }
            if !hw.price_per_second_usd.is_finite() || hw.price_per_second_usd < 0.0 {
                issues.push(format!(
                    "Hardware '{}': price_per_second_usd must be non-negative, got {}",
                    hw.id, hw.price_per_second_usd
                ));
            }
        }
        if !self.estimator.cold_start_buffer_secs.is_finite()
            || self.estimator.cold_start_buffer_secs < 0.0
        {
            issues.push(format!(
                "estimator.cold_start_buffer_secs must be non-negative, got {}",
                self.estimator.cold_start_buffer_secs
            ));
        }
        if self.estimator.chars_per_token == 0 {
            issues.push("estimator.chars_per_token must be greater than 0".to_string());
        }
        if self.estimator.min_input_tokens == 0 {
            issues.push("estimator.min_input_tokens must be greater than 0".to_string());
        }
        issues
    }
}
