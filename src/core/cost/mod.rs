pub mod estimator;
pub mod pricing;
pub mod registry;
pub mod source;
pub mod tracker;

pub use estimator::{CostEstimator, EstimatorSettings, OutputPolicy};
pub use pricing::{ComputeRateCard, ModelRate, ModelRateCard, RateCards};
pub use registry::PricingRegistry;
pub use source::PricingSource;
pub use tracker::CostTracker;
