//! Profit Engine: per-deposit fill profitability.
//!
//! Author: AI-Generated
//! Created: 2026-03-02

pub mod engine;

pub use engine::ProfitEngine;
