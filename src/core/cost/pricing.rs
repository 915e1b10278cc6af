use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::core::models::model::ModelRecord;

/// Hardware class used when a requested class has no entry.
pub const DEFAULT_HARDWARE_CLASS: &str = "cpu";

/// Model whose rate card prices unknown model ids.
pub const FALLBACK_MODEL_ID: &str = "llama3-8b-q4";

/// Per-second container price for one hardware class.
#[derive(Debug, Clone)]
pub struct ComputeRate {
    pub hardware_class: &'static str,
    pub price_per_second_usd: f64,
}

/// Built-in container prices.
static COMPUTE_TABLE: &[ComputeRate] = &[
    ComputeRate {
        hardware_class: "cpu",
        price_per_second_usd: 0.0000131,
    },
    ComputeRate {
        hardware_class: "l4",
        price_per_second_usd: 0.000222,
    },
    ComputeRate {
        hardware_class: "a10g",
        price_per_second_usd: 0.000306,
    },
    ComputeRate {
        hardware_class: "a100",
        price_per_second_usd: 0.000583,
    },
    ComputeRate {
        hardware_class: "a100-80gb",
        price_per_second_usd: 0.000833,
    },
];

/// Model rates compiled into the binary, used when the pricing source is unavailable.
fn embedded_records() -> Vec<ModelRecord> {
    vec![
        ModelRecord {
            id: FALLBACK_MODEL_ID.to_string(),
            price_per_1k_tokens_input_usd: 0.0002,
            price_per_1k_tokens_output_usd: 0.0002,
            tokens_per_second: 60.0,
            name: Some("Llama 3 8B (Q4)".to_string()),
            provider: Some("ClosedAI".to_string()),
            context_window_tokens: Some(8192),
            status: Some("active".to_string()),
        },
        ModelRecord {
            id: "gpt-4o-mini".to_string(),
            price_per_1k_tokens_input_usd: 0.15,
            price_per_1k_tokens_output_usd: 0.60,
            tokens_per_second: 140.0,
            name: Some("GPT-4o mini".to_string()),
            provider: Some("OpenAI".to_string()),
            context_window_tokens: Some(128_000),
            status: Some("active".to_string()),
        },
    ]
}

fn normalize_hardware(hardware_class: &str) -> String {
    hardware_class.trim().to_ascii_lowercase()
}

/// Hardware class → USD per second.
#[derive(Debug, Clone)]
pub struct ComputeRateCard {
    rates: BTreeMap<String, f64>,
}

impl ComputeRateCard {
    pub fn builtin() -> Self {
        let rates = COMPUTE_TABLE
            .iter()
            .map(|r| (r.hardware_class.to_string(), r.price_per_second_usd))
            .collect();
        Self { rates }
    }

    /// Add or replace the price for a hardware class.
    ///
    /// Empty class ids and negative or non-finite prices are skipped with a warning.
    pub fn with_rate(mut self, hardware_class: &str, price_per_second_usd: f64) -> Self {
        let id = normalize_hardware(hardware_class);
        if id.is_empty() {
            warn!("skipping hardware rate with empty class id");
        } else if !price_per_second_usd.is_finite() || price_per_second_usd < 0.0 {
            warn!(
                hardware_class = %id,
                price_per_second_usd,
                "skipping hardware rate, price must be a non-negative number"
            );
        } else {
            self.rates.insert(id, price_per_second_usd);
        }
        self
    }

    /// Price per second for `hardware_class`, or the `cpu` price when unknown.
    pub fn compute_rate(&self, hardware_class: &str) -> f64 {
        match self.rates.get(&normalize_hardware(hardware_class)) {
            Some(rate) => *rate,
            None => {
                debug!(hardware_class, "unknown hardware class, pricing as cpu");
                self.default_rate()
            }
        }
    }

    fn default_rate(&self) -> f64 {
        self.rates
            .get(DEFAULT_HARDWARE_CLASS)
            .copied()
            .unwrap_or(COMPUTE_TABLE[0].price_per_second_usd)
    }

    pub fn is_known(&self, hardware_class: &str) -> bool {
        self.rates.contains_key(&normalize_hardware(hardware_class))
    }

    /// All classes, sorted by id.
    pub fn entries(&self) -> impl Iterator<Item = (&str, f64)> {
        self.rates.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl Default for ComputeRateCard {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Prices and throughput for one model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelRate {
    pub input_per_1k_usd: f64,
    pub output_per_1k_usd: f64,
    pub tokens_per_second: f64,
}

impl ModelRate {
    fn from_record(record: &ModelRecord) -> Self {
        let tps = record.tokens_per_second;
        let tokens_per_second = if tps.is_finite() && tps > 0.0 {
            tps
        } else {
            crate::core::models::model::DEFAULT_TOKENS_PER_SECOND
        };
        Self {
            input_per_1k_usd: record.price_per_1k_tokens_input_usd,
            output_per_1k_usd: record.price_per_1k_tokens_output_usd,
            tokens_per_second,
        }
    }

    /// Token cost in USD.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1000.0) * self.input_per_1k_usd
            + (output_tokens as f64 / 1000.0) * self.output_per_1k_usd
    }

    /// Seconds needed to process `tokens` at this model's throughput.
    pub fn processing_seconds(&self, tokens: u64) -> f64 {
        tokens as f64 / self.tokens_per_second
    }
}

/// Model id → rate, with a resolved fallback for unknown ids.
#[derive(Debug, Clone)]
pub struct ModelRateCard {
    records: BTreeMap<String, ModelRecord>,
    fallback_model: String,
    fallback: ModelRate,
}

impl ModelRateCard {
    /// The embedded table with the default fallback model.
    pub fn embedded() -> Self {
        Self::from_records(embedded_records(), FALLBACK_MODEL_ID)
    }

    /// Build a card from loaded records.
    ///
    /// Records with unusable prices are skipped. If `fallback_model` has no usable
    /// record, the embedded entry for it (or for the default fallback model) is added.
    pub fn from_records(records: Vec<ModelRecord>, fallback_model: &str) -> Self {
        let mut table = BTreeMap::new();
        for record in records {
            if let Some(problem) = record.problem() {
                warn!(model = %record.id, %problem, "skipping model pricing record");
                continue;
            }
            table.insert(record.id.clone(), record);
        }

        let mut fallback_model = fallback_model.to_string();
        if !table.contains_key(&fallback_model) {
            let embedded = embedded_records();
            let entry = match embedded.iter().find(|r| r.id == fallback_model) {
                Some(r) => r.clone(),
                None => {
                    warn!(
                        model = %fallback_model,
                        "fallback model has no rate card, using {}", FALLBACK_MODEL_ID
                    );
                    fallback_model = FALLBACK_MODEL_ID.to_string();
                    match table.get(FALLBACK_MODEL_ID) {
                        Some(r) => r.clone(),
                        None => embedded[0].clone(),
                    }
                }
            };
            table.entry(entry.id.clone()).or_insert(entry);
        }

        let fallback = table
            .get(&fallback_model)
            .map(ModelRate::from_record)
            .unwrap_or_else(|| ModelRate::from_record(&embedded_records()[0]));

        Self {
            records: table,
            fallback_model,
            fallback,
        }
    }

    /// Rate for `model_id`, or the fallback model's rate when unknown.
    pub fn model_rate(&self, model_id: &str) -> ModelRate {
        match self.records.get(model_id) {
            Some(record) => ModelRate::from_record(record),
            None => {
                debug!(
                    model_id,
                    fallback = %self.fallback_model,
                    "unknown model, using fallback rate"
                );
                self.fallback
            }
        }
    }

    pub fn get(&self, model_id: &str) -> Option<&ModelRecord> {
        self.records.get(model_id)
    }

    pub fn is_known(&self, model_id: &str) -> bool {
        self.records.contains_key(model_id)
    }

    pub fn fallback_model(&self) -> &str {
        &self.fallback_model
    }

    /// All records, sorted by id.
    pub fn records(&self) -> impl Iterator<Item = &ModelRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Both rate cards, immutable once built.
#[derive(Debug, Clone, Default)]
pub struct RateCards {
    pub compute: ComputeRateCard,
    pub models: ModelRateCard,
}

impl Default for ModelRateCard {
    fn default() -> Self {
        Self::embedded()
    }
}

impl RateCards {
    pub fn new(compute: ComputeRateCard, models: ModelRateCard) -> Self {
        Self { compute, models }
    }

    pub fn embedded() -> Self {
        Self::default()
    }

    pub fn compute_rate(&self, hardware_class: &str) -> f64 {
        self.compute.compute_rate(hardware_class)
    }

    pub fn model_rate(&self, model_id: &str) -> ModelRate {
        self.models.model_rate(model_id)
    }

    /// Whether `model_id` has its own rate card rather than the fallback's.
    pub fn is_known_model(&self, model_id: &str) -> bool {
        self.models.is_known(model_id)
    }

    pub fn is_known_hardware(&self, hardware_class: &str) -> bool {
        self.compute.is_known(hardware_class)
    }

    /// LLM cost of a call with the given token counts.
    pub fn llm_cost(&self, model_id: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        self.model_rate(model_id).cost(input_tokens, output_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, input: f64, output: f64, tps: f64) -> ModelRecord {
        ModelRecord {
            id: id.to_string(),
            price_per_1k_tokens_input_usd: input,
            price_per_1k_tokens_output_usd: output,
            tokens_per_second: tps,
            name: None,
            provider: None,
            context_window_tokens: None,
            status: None,
        }
    }

    #[test]
    fn builtin_compute_rates() {
        let card = ComputeRateCard::builtin();
        assert!((card.compute_rate("cpu") - 0.0000131).abs() < 1e-15);
        assert!((card.compute_rate("l4") - 0.000222).abs() < 1e-15);
        assert!((card.compute_rate("a100-80gb") - 0.000833).abs() < 1e-15);
    }

    #[test]
    fn unknown_hardware_prices_as_cpu() {
        let card = ComputeRateCard::builtin();
        assert!(!card.is_known("tpu-v5"));
        assert_eq!(card.compute_rate("tpu-v5"), card.compute_rate("cpu"));
    }

    #[test]
    fn hardware_lookup_ignores_case_and_whitespace() {
        let card = ComputeRateCard::builtin();
        assert_eq!(card.compute_rate(" L4 "), card.compute_rate("l4"));
    }

    #[test]
    fn with_rate_overrides_and_adds() {
        let card = ComputeRateCard::builtin()
            .with_rate("h100", 0.001)
            .with_rate("cpu", 0.00002);
        assert!((card.compute_rate("h100") - 0.001).abs() < 1e-15);
        assert!((card.compute_rate("unknown") - 0.00002).abs() < 1e-15);
    }

    #[test]
    fn with_rate_skips_unusable_prices() {
        let card = ComputeRateCard::builtin()
            .with_rate("cpu", -0.5)
            .with_rate("l4", f64::NAN)
            .with_rate("h100", f64::INFINITY)
            .with_rate("  ", 0.001);
        assert!((card.compute_rate("cpu") - 0.0000131).abs() < 1e-15);
        assert!((card.compute_rate("l4") - 0.000222).abs() < 1e-15);
        assert!(!card.is_known("h100"));
        assert_eq!(card.entries().count(), 5);
    }

    #[test]
    fn entries_sorted() {
        let card = ComputeRateCard::builtin();
        let ids: Vec<&str> = card.entries().map(|(id, _)| id).collect();
        assert!(ids.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn model_rate_cost() {
        let rate = ModelRate {
            input_per_1k_usd: 0.15,
            output_per_1k_usd: 0.6,
            tokens_per_second: 140.0,
        };
        // 2000 in * 0.15/1k + 500 out * 0.6/1k = 0.3 + 0.3
        assert!((rate.cost(2000, 500) - 0.6).abs() < 1e-12);
        assert_eq!(rate.cost(0, 0), 0.0);
    }

    #[test]
    fn embedded_card_has_fallback() {
        let card = ModelRateCard::embedded();
        assert_eq!(card.fallback_model(), FALLBACK_MODEL_ID);
        assert!(card.is_known("gpt-4o-mini"));
        let rate = card.model_rate(FALLBACK_MODEL_ID);
        assert!((rate.input_per_1k_usd - 0.0002).abs() < 1e-15);
        assert!((rate.tokens_per_second - 60.0).abs() < 1e-12);
    }

    #[test]
    fn unknown_model_uses_fallback_rate() {
        let card = ModelRateCard::embedded();
        assert!(!card.is_known("foo-bar"));
        assert_eq!(card.model_rate("foo-bar"), card.model_rate(FALLBACK_MODEL_ID));
    }

    #[test]
    fn loaded_table_without_fallback_gets_embedded_entry() {
        let records = vec![record("mistral-7b", 0.001, 0.002, 80.0)];
        let card = ModelRateCard::from_records(records, FALLBACK_MODEL_ID);
        assert!(card.is_known("mistral-7b"));
        assert!(card.is_known(FALLBACK_MODEL_ID));
        assert_eq!(card.len(), 2);
    }

    #[test]
    fn loaded_fallback_entry_wins_over_embedded() {
        let card = ModelRateCard::from_records(
            vec![record(FALLBACK_MODEL_ID, 0.0003, 0.0004, 50.0)],
            FALLBACK_MODEL_ID,
        );
        let rate = card.model_rate("anything");
        assert!((rate.input_per_1k_usd - 0.0003).abs() < 1e-15);
        assert!((rate.tokens_per_second - 50.0).abs() < 1e-12);
    }

    #[test]
    fn configured_fallback_from_loaded_table() {
        let records = vec![record("mistral-7b", 0.001, 0.002, 80.0)];
        let card = ModelRateCard::from_records(records, "mistral-7b");
        assert_eq!(card.fallback_model(), "mistral-7b");
        assert!((card.model_rate("nope").input_per_1k_usd - 0.001).abs() < 1e-15);
    }

    #[test]
    fn unresolvable_fallback_reverts_to_default() {
        let card = ModelRateCard::from_records(vec![], "does-not-exist");
        assert_eq!(card.fallback_model(), FALLBACK_MODEL_ID);
        assert!((card.model_rate("x").input_per_1k_usd - 0.0002).abs() < 1e-15);
    }

    #[test]
    fn invalid_records_skipped() {
        let card = ModelRateCard::from_records(
            vec![record("bad", -1.0, 0.1, 60.0), record("nan", f64::NAN, 0.1, 60.0)],
            FALLBACK_MODEL_ID,
        );
        assert!(!card.is_known("bad"));
        assert!(!card.is_known("nan"));
    }

    #[test]
    fn zero_throughput_uses_default() {
        let card =
            ModelRateCard::from_records(vec![record("slow", 0.1, 0.1, 0.0)], FALLBACK_MODEL_ID);
        assert!((card.model_rate("slow").tokens_per_second - 60.0).abs() < 1e-12);
    }

    #[test]
    fn rate_cards_llm_cost() {
        let cards = RateCards::embedded();
        // 1000 in + 1000 out at 0.15/0.60 per 1k
        assert!((cards.llm_cost("gpt-4o-mini", 1000, 1000) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn rate_cards_report_exact_hits() {
        let cards = RateCards::embedded();
        assert!(cards.is_known_model("gpt-4o-mini"));
        assert!(!cards.is_known_model("GPT-4o-mini"));
        assert!(cards.is_known_hardware(" A10G "));
        assert!(!cards.is_known_hardware("tpu"));
    }
}
