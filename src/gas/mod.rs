//! Gas Cost Estimator: per-destination-chain simulated fill cost.
//!
//! Author: AI-Generated
//! Created: 2026-03-02

pub mod estimator;

pub use estimator::{GasCost, GasCostEstimator};
