use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::core::cost::pricing::RateCards;
use crate::core::error::{check_runtime, CostError};
use crate::core::models::cost::{CostBreakdown, LlmCallRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackerState {
    Open,
    Closed,
}

/// Accrues the realized cost of a single flow execution.
///
/// Owned by the execution that created it. Model calls are recorded while it is
/// open; [`CostTracker::close`] prices the container runtime, returns the
/// breakdown, and rejects any further mutation.
#[derive(Debug)]
pub struct CostTracker<'a> {
    cards: &'a RateCards,
    hardware_class: String,
    compute_rate: f64,
    calls: Vec<LlmCallRecord>,
    total_tokens: u64,
    last_model_used: Option<String>,
    started_at: DateTime<Utc>,
    started: Instant,
    state: TrackerState,
}

impl<'a> CostTracker<'a> {
    pub fn new(cards: &'a RateCards, hardware_class: &str) -> Self {
        Self {
            cards,
            hardware_class: hardware_class.to_string(),
            compute_rate: cards.compute_rate(hardware_class),
            calls: Vec::new(),
            total_tokens: 0,
            last_model_used: None,
            started_at: Utc::now(),
            started: Instant::now(),
            state: TrackerState::Open,
        }
    }

    fn ensure_open(&self) -> Result<(), CostError> {
        match self.state {
            TrackerState::Open => Ok(()),
            TrackerState::Closed => Err(CostError::TrackerClosed {
                hardware_class: self.hardware_class.clone(),
            }),
        }
    }

    /// Record a model call whose cost was already computed by the caller.
    pub fn record_llm_call(
        &mut self,
        model_id: &str,
        input_tokens: u64,
        output_tokens: u64,
        cost_usd: f64,
    ) -> Result<(), CostError> {
        self.ensure_open()?;
        if !cost_usd.is_finite() || cost_usd < 0.0 {
            return Err(CostError::InvalidInput(format!(
                "call cost must be a non-negative number, got {}",
                cost_usd
            )));
        }

        debug!(model_id, input_tokens, output_tokens, cost_usd, "recorded llm call");
        self.calls.push(LlmCallRecord {
            model_id: model_id.to_string(),
            input_tokens,
            output_tokens,
            cost_usd,
        });
        self.total_tokens += input_tokens + output_tokens;
        self.last_model_used = Some(model_id.to_string());
        Ok(())
    }

    /// Price a model call from the rate cards and record it. Returns its cost.
    pub fn record_usage(
        &mut self,
        model_id: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Result<f64, CostError> {
        let cost = self.cards.llm_cost(model_id, input_tokens, output_tokens);
        self.record_llm_call(model_id, input_tokens, output_tokens, cost)?;
        Ok(cost)
    }

    /// Close the tracker, pricing `runtime_seconds` of container time.
    pub fn close(&mut self, runtime_seconds: f64) -> Result<CostBreakdown, CostError> {
        self.ensure_open()?;
        let runtime_seconds = check_runtime(runtime_seconds)?;

        let container_cost = self.container_cost(runtime_seconds);
        let llm_cost = self.llm_cost();
        self.state = TrackerState::Closed;

        Ok(CostBreakdown {
            container_cost_usd: container_cost,
            llm_cost_usd: llm_cost,
            total_cost_usd: container_cost + llm_cost,
            runtime_seconds,
            tokens_used: self.total_tokens,
            model_used: self.last_model_used.clone(),
            llm_calls: self.calls.len(),
        })
    }

    /// Close with the wall-clock time elapsed since creation.
    pub fn close_elapsed(&mut self) -> Result<CostBreakdown, CostError> {
        let runtime = self.elapsed_seconds();
        self.close(runtime)
    }

    pub fn container_cost(&self, runtime_seconds: f64) -> f64 {
        runtime_seconds * self.compute_rate
    }

    pub fn llm_cost(&self) -> f64 {
        self.calls.iter().map(|c| c.cost_usd).sum()
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn hardware_class(&self) -> &str {
        &self.hardware_class
    }

    pub fn calls(&self) -> &[LlmCallRecord] {
        &self.calls
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    pub fn last_model_used(&self) -> Option<&str> {
        self.last_model_used.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.state == TrackerState::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_calls_on_l4() {
        let cards = RateCards::embedded();
        let mut tracker = CostTracker::new(&cards, "l4");
        tracker.record_llm_call("gpt-4o-mini", 100, 50, 0.01).unwrap();
        tracker.record_llm_call("llama3-8b-q4", 200, 80, 0.02).unwrap();

        let breakdown = tracker.close(10.0).unwrap();
        assert!((breakdown.llm_cost_usd - 0.03).abs() < 1e-12);
        assert!((breakdown.container_cost_usd - 0.00222).abs() < 1e-12);
        assert!((breakdown.total_cost_usd - 0.03222).abs() < 1e-12);
        assert_eq!(
            breakdown.total_cost_usd,
            breakdown.container_cost_usd + breakdown.llm_cost_usd
        );
        assert_eq!(breakdown.tokens_used, 430);
        assert_eq!(breakdown.model_used.as_deref(), Some("llama3-8b-q4"));
        assert_eq!(breakdown.llm_calls, 2);
        assert_eq!(breakdown.runtime_seconds, 10.0);
    }

    #[test]
    fn zero_calls_is_container_only() {
        let cards = RateCards::embedded();
        let mut tracker = CostTracker::new(&cards, "a10g");
        let breakdown = tracker.close(4.0).unwrap();
        assert_eq!(breakdown.llm_cost_usd, 0.0);
        assert_eq!(breakdown.total_cost_usd, breakdown.container_cost_usd);
        assert_eq!(breakdown.tokens_used, 0);
        assert!(breakdown.model_used.is_none());
    }

    #[test]
    fn record_after_close_is_rejected() {
        let cards = RateCards::embedded();
        let mut tracker = CostTracker::new(&cards, "cpu");
        tracker.close(1.0).unwrap();
        assert!(tracker.is_closed());
        let err = tracker.record_llm_call("gpt-4o-mini", 1, 1, 0.1).unwrap_err();
        assert!(matches!(err, CostError::TrackerClosed { .. }));
        assert!(tracker.record_usage("gpt-4o-mini", 1, 1).is_err());
        assert!(tracker.calls().is_empty());
    }

    #[test]
    fn second_close_is_rejected() {
        let cards = RateCards::embedded();
        let mut tracker = CostTracker::new(&cards, "cpu");
        tracker.close(1.0).unwrap();
        assert!(matches!(tracker.close(1.0), Err(CostError::TrackerClosed { .. })));
    }

    #[test]
    fn record_usage_prices_from_cards() {
        let cards = RateCards::embedded();
        let mut tracker = CostTracker::new(&cards, "cpu");
        let cost = tracker.record_usage("gpt-4o-mini", 2000, 1000).unwrap();
        // 2 * 0.15 + 1 * 0.60
        assert!((cost - 0.9).abs() < 1e-12);
        assert!((tracker.llm_cost() - 0.9).abs() < 1e-12);
        assert_eq!(tracker.total_tokens(), 3000);
        assert_eq!(tracker.last_model_used(), Some("gpt-4o-mini"));
    }

    #[test]
    fn unknown_hardware_priced_as_cpu() {
        let cards = RateCards::embedded();
        let mut tracker = CostTracker::new(&cards, "mystery-gpu");
        let breakdown = tracker.close(100.0).unwrap();
        assert!((breakdown.container_cost_usd - 100.0 * 0.0000131).abs() < 1e-12);
        assert_eq!(tracker.hardware_class(), "mystery-gpu");
    }

    #[test]
    fn negative_cost_rejected_and_tracker_stays_open() {
        let cards = RateCards::embedded();
        let mut tracker = CostTracker::new(&cards, "cpu");
        assert!(matches!(
            tracker.record_llm_call("x", 1, 1, -0.5),
            Err(CostError::InvalidInput(_))
        ));
        assert!(!tracker.is_closed());
        assert!(tracker.calls().is_empty());
    }

    #[test]
    fn invalid_runtime_keeps_tracker_open() {
        let cards = RateCards::embedded();
        let mut tracker = CostTracker::new(&cards, "cpu");
        assert!(matches!(tracker.close(-1.0), Err(CostError::InvalidRuntime(_))));
        assert!(!tracker.is_closed());
        assert!(tracker.close(0.0).is_ok());
    }

    #[test]
    fn close_elapsed_uses_wall_clock() {
        let cards = RateCards::embedded();
        let mut tracker = CostTracker::new(&cards, "cpu");
        std::thread::sleep(std::time::Duration::from_millis(5));
        let breakdown = tracker.close_elapsed().unwrap();
        assert!(breakdown.runtime_seconds >= 0.005);
        assert!(breakdown.container_cost_usd > 0.0);
    }
}
