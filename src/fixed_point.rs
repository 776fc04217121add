//! 18-decimal fixed-point arithmetic helpers shared by the profit engine
//! and the inventory accountant.
//!
//! All percentages and USD values in this crate are `U256` integers scaled
//! by [`FIXED_POINT`]. Division always floors; callers add one where they
//! want ceiling semantics, mirroring the +1 adjustment in constant-product
//! AMM math.
//!
//! Author: AI-Generated
//! Created: 2026-03-02

use alloy::primitives::U256;

/// Scale factor for all 18-decimal fixed-point quantities.
pub const FIXED_POINT: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// `a * numer / denom`, using 512-bit-safe intermediate multiplication via
/// `U256` (callers are responsible for keeping `a * numer` within range for
/// realistic token/USD magnitudes; this mirrors the teacher's constant
/// product helpers, which make the same assumption).
pub fn mul_frac(a: U256, numer: U256, denom: U256) -> U256 {
    if denom.is_zero() {
        return U256::ZERO;
    }
    a.saturating_mul(numer) / denom
}

/// Scales an integer amount with `frac_digits` decimals up to 18-decimal
/// fixed point.
pub fn to_fp(amount: U256, frac_digits: u8) -> U256 {
    convert_decimals(frac_digits, 18, amount)
}

/// Converts an amount from `from` decimals to `to` decimals. Lossless only
/// when `to >= from`; otherwise floor-divides and truncates precision.
pub fn convert_decimals(from: u8, to: u8, amount: U256) -> U256 {
    if to >= from {
        let shift = (to - from) as usize;
        amount.saturating_mul(pow10(shift))
    } else {
        let shift = (from - to) as usize;
        amount / pow10(shift)
    }
}

fn pow10(exp: usize) -> U256 {
    let mut result = U256::from(1u8);
    let ten = U256::from(10u8);
    for _ in 0..exp {
        result = result.saturating_mul(ten);
    }
    result
}

/// Fraction of `numer` over `denom` expressed in 18-decimal fixed point.
/// Returns zero when `denom` is zero, matching the "0 when cumulative is 0"
/// boundary behavior used throughout the inventory accountant.
pub fn fraction(numer: U256, denom: U256) -> U256 {
    if denom.is_zero() {
        return U256::ZERO;
    }
    mul_frac(numer, FIXED_POINT, denom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_decimals_upscales() {
        // 6dp USDC amount of 100 -> 18dp: 100 * 10^12
        let amount = U256::from(100u64);
        let scaled = convert_decimals(6, 18, amount);
        assert_eq!(scaled, U256::from(100u64) * U256::from(10u64).pow(U256::from(12u8)));
    }

    #[test]
    fn convert_decimals_downscales_floors() {
        // 18dp -> 6dp, losing precision.
        let amount = U256::from(1_234_567u64); // 1.234567 * 10^-12 in 18dp terms
        let scaled = convert_decimals(18, 6, amount);
        assert_eq!(scaled, U256::ZERO);
    }

    #[test]
    fn convert_decimals_round_trip_when_upscale_then_downscale() {
        let x = U256::from(42u64);
        let up = convert_decimals(6, 18, x);
        let back = convert_decimals(18, 6, up);
        assert_eq!(back, x);
    }

    #[test]
    fn fraction_is_zero_when_denom_zero() {
        assert_eq!(fraction(U256::from(5u64), U256::ZERO), U256::ZERO);
    }

    #[test]
    fn fraction_half() {
        let f = fraction(U256::from(1u64), U256::from(2u64));
        assert_eq!(f, FIXED_POINT / U256::from(2u64));
    }

    #[test]
    fn mul_frac_zero_denom_is_zero() {
        assert_eq!(mul_frac(U256::from(10u64), U256::from(1u64), U256::ZERO), U256::ZERO);
    }
}
