use anyhow::Result;
use serde::Serialize;

use crate::cli::output::{print_json, OutputFormat, OutputOptions};
use crate::cli::renderer;
use flowcost::core::config::AppConfig;
use flowcost::core::models::model::ModelRecord;

#[derive(Serialize)]
struct ModelsPayload<'a> {
    fallback_model: &'a str,
    models: Vec<&'a ModelRecord>,
}

#[derive(Serialize)]
struct HardwareEntry<'a> {
    id: &'a str,
    price_per_second_usd: f64,
}

/// List the model rate card the registry resolves to.
pub async fn models(config: &AppConfig, opts: &OutputOptions) -> Result<()> {
    let registry = config.registry();
    let cards = registry.rate_cards().await;
    match opts.format {
        OutputFormat::Text => println!(
            "{}",
            renderer::render_models(&cards.models, opts.use_color)
        ),
        OutputFormat::Json => print_json(
            &ModelsPayload {
                fallback_model: cards.models.fallback_model(),
                models: cards.models.records().collect(),
            },
            opts,
        )?,
    }
    Ok(())
}

/// List container prices per hardware class.
pub fn hardware(config: &AppConfig, opts: &OutputOptions) -> Result<()> {
    let card = config.compute_card();
    match opts.format {
        OutputFormat::Text => println!(
            "{}",
            renderer::render_hardware(&card, &config.pricing.default_hardware, opts.use_color)
        ),
        OutputFormat::Json => {
            let entries: Vec<HardwareEntry> = card
                .entries()
                .map(|(id, price_per_second_usd)| HardwareEntry {
                    id,
                    price_per_second_usd,
                })
                .collect();
            print_json(&entries, opts)?;
        }
    }
    Ok(())
}
