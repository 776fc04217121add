//! Classified error types for the decision engine.
//!
//! Most of the crate propagates errors through `anyhow::Result` with
//! `.context(...)`, matching the rest of the codebase. `RelayerError` exists
//! only for the handful of cases callers need to pattern-match on: fatal
//! configuration mistakes, gas simulation failures, and price feed outages.
//!
//! Author: AI-Generated
//! Created: 2026-03-02

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayerError {
    /// Operator-facing configuration mistakes. These are expected to crash
    /// the host process rather than be recovered from.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A gas simulation call failed or timed out.
    #[error("gas simulation failed for chain {chain_id}: {reason}")]
    Simulation { chain_id: u64, reason: String },

    /// A price feed update failed. The caller should keep using the stale
    /// cache and surface this for operator visibility.
    #[error("price feed update failed: {0}")]
    PriceFeed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_message() {
        let e = RelayerError::Configuration("unknown token".to_string());
        assert_eq!(e.to_string(), "configuration error: unknown token");
    }

    #[test]
    fn simulation_error_message() {
        let e = RelayerError::Simulation {
            chain_id: 10,
            reason: "timeout".to_string(),
        };
        assert_eq!(e.to_string(), "gas simulation failed for chain 10: timeout");
    }
}
