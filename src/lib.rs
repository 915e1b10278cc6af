//! Cost estimation and tracking for LLM flows running in serverless GPU containers.
//!
//! The pricing registry holds compute and model rate cards, the estimator quotes a
//! flow before it runs, and the tracker accrues the realized cost while it runs.

pub mod core;
