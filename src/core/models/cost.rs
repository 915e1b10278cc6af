use serde::{Deserialize, Serialize};

/// Pre-execution quote for a flow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub container_cost_usd: f64,
    pub llm_cost_usd: f64,
    pub total_cost_usd: f64,
    pub estimated_runtime_seconds: f64,
    pub estimated_input_tokens: u64,
    pub estimated_output_tokens: u64,
    pub model_id: String,
    pub hardware_class: String,
}

impl CostEstimate {
    pub fn estimated_total_tokens(&self) -> u64 {
        self.estimated_input_tokens + self.estimated_output_tokens
    }
}

/// A single realized model call recorded by a tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmCallRecord {
    pub model_id: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

impl LlmCallRecord {
    pub fn tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Realized cost of one flow execution, produced when its tracker closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub container_cost_usd: f64,
    pub llm_cost_usd: f64,
    pub total_cost_usd: f64,
    pub runtime_seconds: f64,
    pub tokens_used: u64,
    pub model_used: Option<String>,
    pub llm_calls: usize,
}
