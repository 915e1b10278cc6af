use serde::{Deserialize, Serialize};

pub const DEFAULT_TOKENS_PER_SECOND: f64 = 60.0;

fn default_tokens_per_second() -> f64 {
    DEFAULT_TOKENS_PER_SECOND
}

/// One entry of the external model registry (`llm-registry.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRecord {
    pub id: String,
    pub price_per_1k_tokens_input_usd: f64,
    pub price_per_1k_tokens_output_usd: f64,
    #[serde(default = "default_tokens_per_second")]
    pub tokens_per_second: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ModelRecord {
    /// Returns a reason when the record cannot be used for pricing.
    pub fn problem(&self) -> Option<String> {
        if self.id.trim().is_empty() {
            return Some("empty model id".to_string());
        }
        let prices = [
            ("input price", self.price_per_1k_tokens_input_usd),
            ("output price", self.price_per_1k_tokens_output_usd),
        ];
        for (label, value) in prices {
            if !value.is_finite() || value < 0.0 {
                return Some(format!("{} must be a non-negative number, got {}", label, value));
            }
        }
        None
    }
}
