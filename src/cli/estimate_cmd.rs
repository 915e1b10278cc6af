use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::cli::output::{print_json, OutputFormat, OutputOptions};
use crate::cli::renderer;
use flowcost::core::config::AppConfig;
use flowcost::core::cost::CostEstimator;

pub struct EstimateArgs {
    pub flow_id: String,
    pub inputs: Vec<String>,
    pub inputs_json: Option<String>,
    pub inputs_file: Option<PathBuf>,
    pub model: Option<String>,
    pub hardware: Option<String>,
    pub runtime: Option<f64>,
}

/// Split `key=value` into a named input. The value is always a string.
fn parse_input_pair(pair: &str) -> Result<(String, Value)> {
    let (key, value) = pair
        .split_once('=')
        .with_context(|| format!("Input '{}' must look like key=value", pair))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Input '{}' has an empty key", pair);
    }
    Ok((key.to_string(), Value::String(value.to_string())))
}

fn object_from(value: Value, origin: &str) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("{} must be a JSON object of named inputs", origin),
    }
}

/// Merge inputs in precedence order: file, then `--inputs`, then `--input` pairs.
fn collect_inputs(args: &EstimateArgs) -> Result<Map<String, Value>> {
    let mut inputs = Map::new();

    if let Some(path) = &args.inputs_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read inputs file {}", path.display()))?;
        let value: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse inputs file {}", path.display()))?;
        inputs.extend(object_from(value, "Inputs file")?);
    }
    if let Some(json) = &args.inputs_json {
        let value: Value = serde_json::from_str(json).context("Failed to parse --inputs JSON")?;
        inputs.extend(object_from(value, "--inputs")?);
    }
    for pair in &args.inputs {
        let (key, value) = parse_input_pair(pair)?;
        inputs.insert(key, value);
    }
    Ok(inputs)
}

pub async fn run(args: EstimateArgs, config: &AppConfig, opts: &OutputOptions) -> Result<()> {
    let inputs = collect_inputs(&args)?;
    let model = args
        .model
        .clone()
        .unwrap_or_else(|| config.pricing.fallback_model.clone());
    let hardware = args
        .hardware
        .clone()
        .unwrap_or_else(|| config.pricing.default_hardware.clone());

    let registry = config.registry();
    let cards = registry.rate_cards().await;
    let estimator = CostEstimator::with_settings(cards, config.estimator_settings());
    let estimate = estimator
        .estimate(&args.flow_id, &inputs, &model, &hardware, args.runtime)
        .with_context(|| format!("Failed to estimate flow '{}'", args.flow_id))?;

    match opts.format {
        OutputFormat::Text => {
            let mut notes = Vec::new();
            if !cards.is_known_model(&model) {
                notes.push(format!(
                    "Model '{}' is unknown, priced as {}",
                    model,
                    cards.models.fallback_model()
                ));
            }
            if !cards.is_known_hardware(&hardware) {
                notes.push(format!("Hardware '{}' is unknown, priced as cpu", hardware));
            }
            println!(
                "{}",
                renderer::render_estimate(&args.flow_id, &estimate, &notes, opts.use_color)
            );
        }
        OutputFormat::Json => print_json(&estimate, opts)?,
    }
    Ok(())
}
