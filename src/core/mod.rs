pub mod config;
pub mod cost;
pub mod error;
pub mod flow;
pub mod formatter;
pub mod llm;
pub mod models;
