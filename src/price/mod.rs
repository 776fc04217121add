//! Price lookup for the profit engine and inventory accountant.
//!
//! Author: AI-Generated
//! Created: 2026-03-02

pub mod cache;

pub use cache::PriceCache;
