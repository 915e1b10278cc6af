//! Execution harness that wraps a flow body with cost tracking.
//!
//! ```ignore
//! let options = FlowOptions::new("cluster-keywords").hardware("l4");
//! let mut execution = FlowExecution::start(&cards, options);
//! let outcome = my_flow(inputs, execution.context_mut()).await;
//! let result = execution.finish(outcome)?;
//! ```

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::core::cost::pricing::{RateCards, DEFAULT_HARDWARE_CLASS};
use crate::core::cost::tracker::CostTracker;
use crate::core::error::CostError;
use crate::core::llm::LlmCompletion;
use crate::core::models::cost::CostBreakdown;

/// How a flow is run.
#[derive(Debug, Clone)]
pub struct FlowOptions {
    pub flow_id: String,
    pub hardware_class: String,
    pub track_costs: bool,
}

impl FlowOptions {
    pub fn new(flow_id: impl Into<String>) -> Self {
        Self {
            flow_id: flow_id.into(),
            hardware_class: DEFAULT_HARDWARE_CLASS.to_string(),
            track_costs: true,
        }
    }

    pub fn hardware(mut self, hardware_class: impl Into<String>) -> Self {
        self.hardware_class = hardware_class.into();
        self
    }

    pub fn track_costs(mut self, enabled: bool) -> Self {
        self.track_costs = enabled;
        self
    }
}

/// What a finished execution reports, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowResult {
    pub flow_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<CostBreakdown>,
    pub runtime_seconds: f64,
    pub tokens_used: u64,
    pub model_used: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl FlowResult {
    pub fn cost_usd(&self) -> Option<f64> {
        self.cost.as_ref().map(|c| c.total_cost_usd)
    }
}

/// Handed to the flow body; records every model call it makes.
pub struct FlowContext<'a> {
    flow_id: String,
    tracker: CostTracker<'a>,
}

impl<'a> FlowContext<'a> {
    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    pub fn tracker(&self) -> &CostTracker<'a> {
        &self.tracker
    }

    /// Record a call priced from the rate cards.
    pub fn record_usage(
        &mut self,
        model_id: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Result<f64, CostError> {
        self.tracker.record_usage(model_id, input_tokens, output_tokens)
    }

    /// Await a provider call and record its token usage against `model_id`.
    pub async fn call_llm<F>(&mut self, model_id: &str, call: F) -> anyhow::Result<LlmCompletion>
    where
        F: Future<Output = anyhow::Result<LlmCompletion>>,
    {
        let completion = call.await?;
        self.tracker
            .record_usage(model_id, completion.input_tokens, completion.output_tokens)?;
        Ok(completion)
    }

    pub fn log(&self, message: &str) {
        info!(flow_id = %self.flow_id, "{}", message);
    }
}

/// A running flow: created before the body runs, finished once it returns.
pub struct FlowExecution<'a> {
    track_costs: bool,
    context: FlowContext<'a>,
}

impl<'a> FlowExecution<'a> {
    pub fn start(cards: &'a RateCards, options: FlowOptions) -> Self {
        info!(flow_id = %options.flow_id, hardware = %options.hardware_class, "starting flow");
        Self {
            track_costs: options.track_costs,
            context: FlowContext {
                flow_id: options.flow_id,
                tracker: CostTracker::new(cards, &options.hardware_class),
            },
        }
    }

    pub fn context_mut(&mut self) -> &mut FlowContext<'a> {
        &mut self.context
    }

    /// Close the tracker with the elapsed runtime and build the result.
    ///
    /// Failed bodies still report what they cost up to the failure. An error is
    /// returned only when the tracker itself cannot be closed.
    pub fn finish(self, outcome: anyhow::Result<Value>) -> Result<FlowResult, CostError> {
        let FlowContext {
            flow_id,
            mut tracker,
        } = self.context;
        let runtime = tracker.elapsed_seconds();
        let tokens_used = tracker.total_tokens();
        let model_used = tracker.last_model_used().map(str::to_string);
        let started_at = tracker.started_at();

        let cost = if self.track_costs {
            Some(tracker.close(runtime).inspect_err(|e| {
                error!(%flow_id, error = %e, "failed to close cost tracker");
            })?)
        } else {
            None
        };

        let (success, data, error_message) = match outcome {
            Ok(data) => {
                match &cost {
                    Some(c) => info!(
                        %flow_id,
                        runtime_seconds = runtime,
                        cost_usd = c.total_cost_usd,
                        "flow completed"
                    ),
                    None => info!(%flow_id, runtime_seconds = runtime, "flow completed"),
                }
                (true, Some(data), None)
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!(%flow_id, runtime_seconds = runtime, error = %message, "flow failed");
                (false, None, Some(message))
            }
        };

        Ok(FlowResult {
            flow_id,
            success,
            data,
            error: error_message,
            cost,
            runtime_seconds: runtime,
            tokens_used,
            model_used,
            started_at,
            completed_at: Utc::now(),
        })
    }
}
