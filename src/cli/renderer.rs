use colored::{control, ColoredString, Colorize};

use flowcost::core::cost::pricing::{ComputeRateCard, ModelRateCard};
use flowcost::core::formatter::{
    format_duration, format_hourly, format_rate_per_1k, format_tokens, format_usd,
};
use flowcost::core::models::cost::{CostBreakdown, CostEstimate, LlmCallRecord};

/// Render a pre-execution quote.
///
/// Layout:
/// ```text
///  Estimate cluster-keywords (llama3-8b-q4 on cpu)
///   Tokens     100 in / 50 out
///   Runtime    7.5s
///   LLM        $0.00003
///   Container  $0.00009825
///   Total      $0.0001283
/// ```
pub fn render_estimate(
    flow_id: &str,
    estimate: &CostEstimate,
    notes: &[String],
    use_color: bool,
) -> String {
    control::set_override(use_color);

    let mut lines: Vec<String> = Vec::new();
    let header = format!(
        " Estimate {} ({} on {})",
        flow_id, estimate.model_id, estimate.hardware_class
    );
    lines.push(header.bold().to_string());
    lines.push(format!(
        "  {}     {} in / {} out",
        "Tokens".cyan(),
        format_tokens(estimate.estimated_input_tokens),
        format_tokens(estimate.estimated_output_tokens)
    ));
    lines.push(format!(
        "  {}    {}",
        "Runtime".cyan(),
        format_duration(estimate.estimated_runtime_seconds)
    ));
    push_costs(
        &mut lines,
        estimate.llm_cost_usd,
        estimate.container_cost_usd,
        estimate.total_cost_usd,
    );
    for note in notes {
        lines.push(format!("  {}", note.dimmed()));
    }
    lines.join("\n")
}

/// Render the realized cost of a tracked run, with one line per recorded call.
pub fn render_breakdown(
    hardware_class: &str,
    breakdown: &CostBreakdown,
    calls: &[LlmCallRecord],
    use_color: bool,
) -> String {
    control::set_override(use_color);

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!(" Breakdown ({})", hardware_class).bold().to_string());
    lines.push(format!(
        "  {}    {}",
        "Runtime".cyan(),
        format_duration(breakdown.runtime_seconds)
    ));
    lines.push(format!(
        "  {}     {} across {} call{}",
        "Tokens".cyan(),
        format_tokens(breakdown.tokens_used),
        breakdown.llm_calls,
        if breakdown.llm_calls == 1 { "" } else { "s" }
    ));
    if let Some(model) = &breakdown.model_used {
        lines.push(format!("  {}  {}", "Last model".cyan(), model));
    }
    push_costs(
        &mut lines,
        breakdown.llm_cost_usd,
        breakdown.container_cost_usd,
        breakdown.total_cost_usd,
    );

    if !calls.is_empty() {
        lines.push(format!("  {}:", "Calls".cyan()));
        for call in calls {
            lines.push(format!(
                "    {:<24} {:<12} ({} in / {} out)",
                call.model_id,
                format_usd(call.cost_usd),
                format_tokens(call.input_tokens),
                format_tokens(call.output_tokens)
            ));
        }
    }
    lines.join("\n")
}

fn push_costs(lines: &mut Vec<String>, llm: f64, container: f64, total: f64) {
    lines.push(format!("  {}        {}", "LLM".cyan(), format_usd(llm)));
    lines.push(format!("  {}  {}", "Container".cyan(), format_usd(container)));
    lines.push(format!(
        "  {}      {}",
        "Total".cyan(),
        color_by_total(total, &format_usd(total))
    ));
}

/// Color a total green/yellow/red by how much a single run costs.
fn color_by_total(total: f64, text: &str) -> ColoredString {
    if total < 0.01 {
        text.green()
    } else if total < 1.0 {
        text.yellow()
    } else {
        text.red()
    }
}

/// Render the model rate card, marking the fallback model.
pub fn render_models(card: &ModelRateCard, use_color: bool) -> String {
    control::set_override(use_color);

    let mut lines: Vec<String> = Vec::new();
    lines.push(" Models".bold().to_string());
    for record in card.records() {
        let marker = if record.id == card.fallback_model() {
            " (fallback)".dimmed().to_string()
        } else {
            String::new()
        };
        let provider = record.provider.as_deref().unwrap_or("-");
        lines.push(format!(
            "  {:<24} {:<10} in {:<22} out {:<22} {:>5} tok/s{}",
            record.id.cyan(),
            provider,
            format_rate_per_1k(record.price_per_1k_tokens_input_usd),
            format_rate_per_1k(record.price_per_1k_tokens_output_usd),
            record.tokens_per_second,
            marker
        ));
    }
    lines.join("\n")
}

/// Render the compute rate card, marking the default class.
pub fn render_hardware(card: &ComputeRateCard, default_class: &str, use_color: bool) -> String {
    control::set_override(use_color);

    let mut lines: Vec<String> = Vec::new();
    lines.push(" Hardware".bold().to_string());
    for (id, price) in card.entries() {
        let marker = if id == default_class {
            " (default)".dimmed().to_string()
        } else {
            String::new()
        };
        lines.push(format!(
            "  {:<12} {:<12} /s  {:>10}{}",
            id.cyan(),
            format_usd(price),
            format_hourly(price),
            marker
        ));
    }
    lines.join("\n")
}
