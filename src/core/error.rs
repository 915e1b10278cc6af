use thiserror::Error;

/// Errors surfaced by the cost model to its callers.
///
/// Unknown model, hardware, or flow identifiers are priced with fallbacks and never
/// show up here.
#[derive(Error, Debug)]
pub enum CostError {
    #[error("Invalid input payload: {0}")]
    InvalidInput(String),
    #[error("Invalid runtime: {0} seconds (must be finite and non-negative)")]
    InvalidRuntime(f64),
    #[error("Cost tracker for '{hardware_class}' is already closed")]
    TrackerClosed { hardware_class: String },
}

impl From<serde_json::Error> for CostError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

/// Reject runtimes that cannot be priced.
pub(crate) fn check_runtime(runtime_seconds: f64) -> Result<f64, CostError> {
    if runtime_seconds.is_finite() && runtime_seconds >= 0.0 {
        Ok(runtime_seconds)
    } else {
        Err(CostError::InvalidRuntime(runtime_seconds))
    }
}
