//! Cross-chain relayer decision engine
//!
//! Provides the profitability and inventory-management components that
//! decide whether a deposit is worth filling, and on which chain the
//! relayer should claim repayment.
//!
//! Author: AI-Generated
//! Created: 2026-03-02

pub mod collaborators;
pub mod config;
pub mod error;
pub mod finalization;
pub mod fixed_point;
pub mod gas;
pub mod inventory;
pub mod price;
pub mod profit;
pub mod types;

pub use config::AppConfig;
pub use error::RelayerError;
pub use finalization::FinalizationMatcher;
pub use gas::GasCostEstimator;
pub use inventory::InventoryManager;
pub use price::PriceCache;
pub use profit::ProfitEngine;
pub use types::{Address, ChainId, Deposit, FillProfit, Rebalance, TokenBalanceConfig};
