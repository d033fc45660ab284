//! VnStock Agent
//!
//! Answers questions about Vietnamese-listed equities with a tool-calling
//! language model agent grounded in market data.
//!
//! QUERY → CLASSIFY → (AGENT | DECOMPOSE → AGENT × N → COMBINE) → ANSWER

pub mod agent;
pub mod api;
pub mod chains;
pub mod config;
pub mod error;
pub mod indicators;
pub mod llm;
pub mod market_data;
pub mod models;
pub mod orchestrator;
pub mod tools;

#[cfg(test)]
mod test_support;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use orchestrator::Orchestrator;
