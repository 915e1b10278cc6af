use std::io;

use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use serde_json::Value;
use tracing::debug;

use crate::core::cost::pricing::RateCards;
use crate::core::error::{check_runtime, CostError};
use crate::core::models::cost::CostEstimate;

pub const DEFAULT_CHARS_PER_TOKEN: u64 = 4;
pub const DEFAULT_MIN_INPUT_TOKENS: u64 = 100;
pub const DEFAULT_COLD_START_BUFFER_SECS: f64 = 5.0;

/// Heuristic knobs for quoting. Approximate by nature, so they stay overridable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorSettings {
    pub chars_per_token: u64,
    pub min_input_tokens: u64,
    pub cold_start_buffer_secs: f64,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
            min_input_tokens: DEFAULT_MIN_INPUT_TOKENS,
            cold_start_buffer_secs: DEFAULT_COLD_START_BUFFER_SECS,
        }
    }
}

/// How many output tokens a flow produces for a given input size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPolicy {
    /// `min(cap, input / divisor)`
    Shrink { divisor: u64, cap: u64 },
    /// `min(cap, input * factor)`
    Expand { factor: u64, cap: u64 },
}

impl OutputPolicy {
    pub fn output_tokens(&self, input_tokens: u64) -> u64 {
        match *self {
            Self::Shrink { divisor, cap } => cap.min(input_tokens / divisor.max(1)),
            Self::Expand { factor, cap } => cap.min(input_tokens.saturating_mul(factor)),
        }
    }
}

/// Output policy for flows without an entry in [`FLOW_OUTPUT_POLICIES`].
pub const DEFAULT_OUTPUT_POLICY: OutputPolicy = OutputPolicy::Expand { factor: 1, cap: 1000 };

/// Known flows and their output-size heuristics.
pub static FLOW_OUTPUT_POLICIES: &[(&str, OutputPolicy)] = &[
    ("cluster-keywords", OutputPolicy::Shrink { divisor: 2, cap: 500 }),
    ("crawl4contacts", OutputPolicy::Expand { factor: 2, cap: 2000 }),
    ("generate-blog", OutputPolicy::Expand { factor: 3, cap: 4000 }),
    ("analyze-sentiment", OutputPolicy::Shrink { divisor: 4, cap: 200 }),
];

pub fn output_policy(flow_id: &str) -> OutputPolicy {
    FLOW_OUTPUT_POLICIES
        .iter()
        .find(|(id, _)| *id == flow_id)
        .map(|(_, policy)| *policy)
        .unwrap_or(DEFAULT_OUTPUT_POLICY)
}

/// JSON with `", "` and `": "` separators, the spacing of a printed list or map.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

/// Character length a value contributes to the input size.
///
/// Strings count their characters; everything else counts its spaced JSON text
/// (`[1, 2]`, `{"k": "v"}`).
fn rendered_len(value: &Value) -> Result<u64, CostError> {
    let chars = match value {
        Value::String(s) => s.chars().count(),
        other => {
            let mut buf = Vec::new();
            let mut ser = Serializer::with_formatter(&mut buf, SpacedFormatter);
            other.serialize(&mut ser)?;
            String::from_utf8_lossy(&buf).chars().count()
        }
    };
    Ok(chars as u64)
}

/// Quotes flow runs against a set of rate cards. Stateless.
#[derive(Debug, Clone, Copy)]
pub struct CostEstimator<'a> {
    cards: &'a RateCards,
    settings: EstimatorSettings,
}

impl<'a> CostEstimator<'a> {
    pub fn new(cards: &'a RateCards) -> Self {
        Self::with_settings(cards, EstimatorSettings::default())
    }

    pub fn with_settings(cards: &'a RateCards, settings: EstimatorSettings) -> Self {
        Self { cards, settings }
    }

    pub fn settings(&self) -> &EstimatorSettings {
        &self.settings
    }

    /// Input tokens implied by a payload, floored at the configured minimum.
    ///
    /// The payload must serialize to a JSON object.
    pub fn input_tokens<T: Serialize + ?Sized>(&self, inputs: &T) -> Result<u64, CostError> {
        let value = serde_json::to_value(inputs)?;
        let fields = match value {
            Value::Object(fields) => fields,
            other => {
                return Err(CostError::InvalidInput(format!(
                    "expected an object of named inputs, got {}",
                    json_kind(&other)
                )))
            }
        };
        let mut total_chars = 0u64;
        for value in fields.values() {
            total_chars += rendered_len(value)?;
        }
        let tokens = total_chars / self.settings.chars_per_token.max(1);
        Ok(tokens.max(self.settings.min_input_tokens))
    }

    /// Pre-execution cost estimate for running `flow_id` on `inputs`.
    ///
    /// Unknown flow, model, or hardware ids are priced with their fallbacks.
    /// `known_runtime_seconds` replaces the throughput-based runtime guess.
    pub fn estimate<T: Serialize + ?Sized>(
        &self,
        flow_id: &str,
        inputs: &T,
        model_id: &str,
        hardware_class: &str,
        known_runtime_seconds: Option<f64>,
    ) -> Result<CostEstimate, CostError> {
        let rate = self.cards.model_rate(model_id);

        let input_tokens = self.input_tokens(inputs)?;
        let output_tokens = output_policy(flow_id).output_tokens(input_tokens);
        let llm_cost = rate.cost(input_tokens, output_tokens);

        let runtime = match known_runtime_seconds {
            Some(seconds) => check_runtime(seconds)?,
            None => {
                rate.processing_seconds(input_tokens + output_tokens)
                    + self.settings.cold_start_buffer_secs
            }
        };
        let container_cost = runtime * self.cards.compute_rate(hardware_class);

        debug!(
            flow_id,
            model_id,
            hardware_class,
            input_tokens,
            output_tokens,
            runtime,
            "estimated flow cost"
        );

        Ok(CostEstimate {
            container_cost_usd: container_cost,
            llm_cost_usd: llm_cost,
            total_cost_usd: llm_cost + container_cost,
            estimated_runtime_seconds: runtime,
            estimated_input_tokens: input_tokens,
            estimated_output_tokens: output_tokens,
            model_id: model_id.to_string(),
            hardware_class: hardware_class.to_string(),
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn cards() -> RateCards {
        RateCards::embedded()
    }

    #[test]
    fn flow_policies_match_table() {
        assert_eq!(output_policy("cluster-keywords").output_tokens(100), 50);
        assert_eq!(output_policy("cluster-keywords").output_tokens(5000), 500);
        assert_eq!(output_policy("crawl4contacts").output_tokens(300), 600);
        assert_eq!(output_policy("crawl4contacts").output_tokens(1500), 2000);
        assert_eq!(output_policy("generate-blog").output_tokens(1000), 3000);
        assert_eq!(output_policy("generate-blog").output_tokens(2000), 4000);
        assert_eq!(output_policy("analyze-sentiment").output_tokens(400), 100);
        assert_eq!(output_policy("analyze-sentiment").output_tokens(10_000), 200);
    }

    #[test]
    fn unregistered_flow_uses_default_policy() {
        assert_eq!(output_policy("translate"), DEFAULT_OUTPUT_POLICY);
        assert_eq!(output_policy("translate").output_tokens(250), 250);
        assert_eq!(output_policy("translate").output_tokens(5000), 1000);
    }

    #[test]
    fn scenario_cluster_keywords_on_cpu() {
        let cards = cards();
        let est = CostEstimator::new(&cards)
            .estimate(
                "cluster-keywords",
                &json!({ "text": "a".repeat(400) }),
                "llama3-8b-q4",
                "cpu",
                None,
            )
            .unwrap();
        assert_eq!(est.estimated_input_tokens, 100);
        assert_eq!(est.estimated_output_tokens, 50);
        assert!((est.llm_cost_usd - 0.00003).abs() < 1e-12);
        assert!((est.estimated_runtime_seconds - 7.5).abs() < 1e-9);
        assert!((est.container_cost_usd - 7.5 * 0.0000131).abs() < 1e-12);
        assert!((est.total_cost_usd - 0.00012825).abs() < 1e-10);
        assert_eq!(est.estimated_total_tokens(), 150);
    }

    #[test]
    fn total_is_exact_sum() {
        let cards = cards();
        let estimator = CostEstimator::new(&cards);
        for (flow, model, hw) in [
            ("generate-blog", "gpt-4o-mini", "a100"),
            ("crawl4contacts", "llama3-8b-q4", "l4"),
            ("unknown", "foo", "bar"),
        ] {
            let est = estimator
                .estimate(flow, &json!({ "text": "x".repeat(3000), "n": 5 }), model, hw, None)
                .unwrap();
            assert_eq!(est.total_cost_usd, est.container_cost_usd + est.llm_cost_usd);
            assert!(est.container_cost_usd >= 0.0 && est.llm_cost_usd >= 0.0);
        }
    }

    #[test]
    fn empty_payload_floors_to_minimum() {
        let cards = cards();
        let est = CostEstimator::new(&cards)
            .estimate("cluster-keywords", &json!({}), "llama3-8b-q4", "cpu", None)
            .unwrap();
        assert_eq!(est.estimated_input_tokens, 100);
        assert!(est.total_cost_usd > 0.0);
    }

    #[test]
    fn non_string_values_count_rendered_length() {
        let cards = cards();
        let estimator = CostEstimator::with_settings(
            &cards,
            EstimatorSettings {
                min_input_tokens: 0,
                ..EstimatorSettings::default()
            },
        );
        // "hello" = 5, 12345 = 5, [1, 2, 3] = 9, {"k": "v"} = 10, true = 4 -> 33 / 4 = 8
        let tokens = estimator
            .input_tokens(&json!({
                "s": "hello",
                "n": 12345,
                "list": [1, 2, 3],
                "obj": {"k": "v"},
                "flag": true
            }))
            .unwrap();
        assert_eq!(tokens, 8);
    }

    #[test]
    fn nested_values_count_separator_spacing() {
        let cards = cards();
        let estimator = CostEstimator::with_settings(
            &cards,
            EstimatorSettings {
                min_input_tokens: 0,
                ..EstimatorSettings::default()
            },
        );
        // ["ab", "cd", "ef", "gh"] = 24 chars
        let list = estimator
            .input_tokens(&json!({ "l": ["ab", "cd", "ef", "gh"] }))
            .unwrap();
        assert_eq!(list, 6);
        // {"a": 1, "b": 2} = 16 chars
        let map = estimator.input_tokens(&json!({ "o": { "a": 1, "b": 2 } })).unwrap();
        assert_eq!(map, 4);
        // [[1, 2], {"k": []}] = 19 chars
        let nested = estimator
            .input_tokens(&json!({ "n": [[1, 2], { "k": [] }] }))
            .unwrap();
        assert_eq!(nested, 4);
    }

    #[test]
    fn multibyte_text_counts_characters() {
        let cards = cards();
        let estimator = CostEstimator::with_settings(
            &cards,
            EstimatorSettings {
                min_input_tokens: 1,
                ..EstimatorSettings::default()
            },
        );
        let tokens = estimator.input_tokens(&json!({ "text": "é".repeat(800) })).unwrap();
        assert_eq!(tokens, 200);
    }

    #[test]
    fn longer_input_never_costs_less() {
        let cards = cards();
        let estimator = CostEstimator::new(&cards);
        let mut previous_tokens = 0;
        let mut previous_cost = 0.0;
        for len in (0..6000).step_by(250) {
            let inputs = json!({ "text": "z".repeat(len) });
            let est = estimator
                .estimate("generate-blog", &inputs, "gpt-4o-mini", "cpu", None)
                .unwrap();
            assert!(est.estimated_input_tokens >= previous_tokens);
            assert!(est.llm_cost_usd >= previous_cost);
            previous_tokens = est.estimated_input_tokens;
            previous_cost = est.llm_cost_usd;
        }
    }

    #[test]
    fn unknown_model_and_hardware_use_fallbacks() {
        let cards = cards();
        let estimator = CostEstimator::new(&cards);
        let inputs = json!({ "text": "abc" });
        let unknown = estimator
            .estimate("cluster-keywords", &inputs, "foo-bar", "quantum", None)
            .unwrap();
        let fallback = estimator
            .estimate("cluster-keywords", &inputs, "llama3-8b-q4", "cpu", None)
            .unwrap();
        assert_eq!(unknown.llm_cost_usd, fallback.llm_cost_usd);
        assert_eq!(unknown.container_cost_usd, fallback.container_cost_usd);
        assert_eq!(unknown.model_id, "foo-bar");
        assert_eq!(unknown.hardware_class, "quantum");
    }

    #[test]
    fn known_runtime_skips_cold_start() {
        let cards = cards();
        let est = CostEstimator::new(&cards)
            .estimate("cluster-keywords", &json!({}), "llama3-8b-q4", "l4", Some(30.0))
            .unwrap();
        assert_eq!(est.estimated_runtime_seconds, 30.0);
        assert!((est.container_cost_usd - 30.0 * 0.000222).abs() < 1e-12);
    }

    #[test]
    fn negative_known_runtime_rejected() {
        let cards = cards();
        let err = CostEstimator::new(&cards)
            .estimate("cluster-keywords", &json!({}), "llama3-8b-q4", "cpu", Some(-2.0))
            .unwrap_err();
        assert!(matches!(err, CostError::InvalidRuntime(_)));
    }

    #[test]
    fn custom_cold_start_buffer() {
        let cards = cards();
        let estimator = CostEstimator::with_settings(
            &cards,
            EstimatorSettings {
                cold_start_buffer_secs: 0.0,
                ..EstimatorSettings::default()
            },
        );
        let est = estimator
            .estimate("cluster-keywords", &json!({}), "llama3-8b-q4", "cpu", None)
            .unwrap();
        assert!((est.estimated_runtime_seconds - 2.5).abs() < 1e-9);
    }

    #[test]
    fn non_object_payload_is_invalid() {
        let cards = cards();
        let err = CostEstimator::new(&cards)
            .estimate("x", &json!(["a", "b"]), "llama3-8b-q4", "cpu", None)
            .unwrap_err();
        assert!(matches!(err, CostError::InvalidInput(_)));
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn non_serializable_payload_is_invalid() {
        let cards = cards();
        let mut bad: HashMap<(u8, u8), String> = HashMap::new();
        bad.insert((1, 2), "tuple keys cannot become JSON".into());
        let err = CostEstimator::new(&cards)
            .estimate("x", &bad, "llama3-8b-q4", "cpu", None)
            .unwrap_err();
        assert!(matches!(err, CostError::InvalidInput(_)));
    }

    #[test]
    fn typed_struct_inputs() {
        #[derive(Serialize)]
        struct ClusterInputs {
            text: String,
            num_clusters: u32,
        }
        let cards = cards();
        let tokens = CostEstimator::new(&cards)
            .input_tokens(&ClusterInputs {
                text: "w".repeat(1000),
                num_clusters: 5,
            })
            .unwrap();
        // 1000 + 1 chars -> 250
        assert_eq!(tokens, 250);
    }
}
