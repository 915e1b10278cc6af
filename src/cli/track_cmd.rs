use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::output::{print_json, OutputFormat, OutputOptions};
use crate::cli::renderer;
use flowcost::core::config::AppConfig;
use flowcost::core::cost::CostTracker;
use flowcost::core::models::cost::{CostBreakdown, LlmCallRecord};

/// A call given on the command line as `MODEL:IN:OUT[:COST]`.
#[derive(Debug, Clone, PartialEq)]
struct CallSpec {
    model_id: String,
    input_tokens: u64,
    output_tokens: u64,
    cost_usd: Option<f64>,
}

/// Parse `MODEL:IN:OUT[:COST]`. Model ids may themselves contain colons
/// (`llama3:8b:1200:300`); counts are read from the right.
fn parse_call(spec: &str) -> Result<CallSpec> {
    let parts: Vec<&str> = spec.split(':').collect();
    let n = parts.len();

    if n >= 4 {
        if let (Ok(input), Ok(output), Ok(cost)) = (
            parts[n - 3].parse::<u64>(),
            parts[n - 2].parse::<u64>(),
            parts[n - 1].parse::<f64>(),
        ) {
            let model_id = parts[..n - 3].join(":");
            if !model_id.is_empty() {
                return Ok(CallSpec {
                    model_id,
                    input_tokens: input,
                    output_tokens: output,
                    cost_usd: Some(cost),
                });
            }
        }
    }
    if n >= 3 {
        let input = parts[n - 2]
            .parse::<u64>()
            .with_context(|| format!("Call '{}': input tokens must be an integer", spec))?;
        let output = parts[n - 1]
            .parse::<u64>()
            .with_context(|| format!("Call '{}': output tokens must be an integer", spec))?;
        let model_id = parts[..n - 2].join(":");
        if model_id.is_empty() {
            anyhow::bail!("Call '{}' has an empty model id", spec);
        }
        return Ok(CallSpec {
            model_id,
            input_tokens: input,
            output_tokens: output,
            cost_usd: None,
        });
    }
    anyhow::bail!("Call '{}' must look like MODEL:IN:OUT or MODEL:IN:OUT:COST", spec)
}

#[derive(Serialize)]
struct TrackPayload<'a> {
    hardware_class: &'a str,
    calls: &'a [LlmCallRecord],
    breakdown: &'a CostBreakdown,
}

/// Replay recorded calls through a tracker and report the realized cost.
pub async fn run(
    hardware: Option<String>,
    runtime_seconds: f64,
    calls: Vec<String>,
    config: &AppConfig,
    opts: &OutputOptions,
) -> Result<()> {
    let specs = calls
        .iter()
        .map(|c| parse_call(c))
        .collect::<Result<Vec<_>>>()?;
    let hardware = hardware.unwrap_or_else(|| config.pricing.default_hardware.clone());

    let registry = config.registry();
    let cards = registry.rate_cards().await;
    let mut tracker = CostTracker::new(cards, &hardware);
    for spec in &specs {
        match spec.cost_usd {
            Some(cost) => tracker.record_llm_call(
                &spec.model_id,
                spec.input_tokens,
                spec.output_tokens,
                cost,
            )?,
            None => {
                tracker.record_usage(&spec.model_id, spec.input_tokens, spec.output_tokens)?;
            }
        }
    }
    let breakdown = tracker
        .close(runtime_seconds)
        .context("Failed to close cost tracker")?;

    match opts.format {
        OutputFormat::Text => println!(
            "{}",
            renderer::render_breakdown(&hardware, &breakdown, tracker.calls(), opts.use_color)
        ),
        OutputFormat::Json => print_json(
            &TrackPayload {
                hardware_class: &hardware,
                calls: tracker.calls(),
                breakdown: &breakdown,
            },
            opts,
        )?,
    }
    Ok(())
}
