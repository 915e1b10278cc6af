use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::core::cost::pricing::{ComputeRateCard, ModelRateCard, RateCards, FALLBACK_MODEL_ID};
use crate::core::cost::source::PricingSource;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Owner of the process's rate cards.
///
/// The compute card is fixed at construction. The model card is loaded from the
/// pricing source on first access, at most once even under concurrent callers,
/// and falls back to the embedded table when the source is unavailable.
pub struct PricingRegistry {
    source: PricingSource,
    fetch_timeout: Duration,
    fallback_model: String,
    compute: ComputeRateCard,
    cards: OnceCell<RateCards>,
}

impl PricingRegistry {
    pub fn new(source: PricingSource) -> Self {
        Self {
            source,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            fallback_model: FALLBACK_MODEL_ID.to_string(),
            compute: ComputeRateCard::builtin(),
            cards: OnceCell::new(),
        }
    }

    /// A registry whose cards are already loaded; the source is never consulted.
    pub fn with_cards(cards: RateCards) -> Self {
        Self {
            source: PricingSource::Embedded,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            fallback_model: cards.models.fallback_model().to_string(),
            compute: cards.compute.clone(),
            cards: OnceCell::new_with(Some(cards)),
        }
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn fallback_model(mut self, model_id: impl Into<String>) -> Self {
        self.fallback_model = model_id.into();
        self
    }

    pub fn compute_card(mut self, compute: ComputeRateCard) -> Self {
        self.compute = compute;
        self
    }

    pub fn source(&self) -> &PricingSource {
        &self.source
    }

    pub fn is_loaded(&self) -> bool {
        self.cards.initialized()
    }

    /// The rate cards, loading the model table on first call.
    pub async fn rate_cards(&self) -> &RateCards {
        self.cards.get_or_init(|| self.load()).await
    }

    async fn load(&self) -> RateCards {
        let fetched = tokio::time::timeout(self.fetch_timeout, self.source.fetch_records()).await;
        let models = match fetched {
            Ok(Ok(Some(records))) => {
                info!(source = %self.source, count = records.len(), "loaded model pricing");
                ModelRateCard::from_records(records, &self.fallback_model)
            }
            Ok(Ok(None)) => {
                debug!("using embedded model pricing");
                ModelRateCard::from_records(Vec::new(), &self.fallback_model)
            }
            Ok(Err(e)) => {
                warn!(
                    source = %self.source,
                    error = %format!("{:#}", e),
                    "pricing source unavailable, using embedded table"
                );
                ModelRateCard::from_records(Vec::new(), &self.fallback_model)
            }
            Err(_) => {
                warn!(
                    source = %self.source,
                    timeout_secs = self.fetch_timeout.as_secs_f64(),
                    "pricing source timed out, using embedded table"
                );
                ModelRateCard::from_records(Vec::new(), &self.fallback_model)
            }
        };
        RateCards::new(self.compute.clone(), models)
    }
}
