//! Evaluation lifecycle and scheduling engine for recurring retail performance reviews.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
