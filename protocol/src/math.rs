//! # Fixed-Point Conversion Math
//!
//! Every asset/share conversion in the vault is a `x * y / d` with an explicit
//! rounding direction. The product is computed in `u128`, so two `u64`
//! operands can never overflow the intermediate; only the final quotient is
//! range-checked back into `u64`.
//!
//! Rounding always favours the vault:
//!
//! | Call site          | Direction | Effect                               |
//! |--------------------|-----------|--------------------------------------|
//! | `convert_to_shares`| Down      | depositor receives fewer shares      |
//! | `convert_to_assets`| Down      | redeemer receives fewer assets       |
//! | `preview_mint`     | Up        | minter pays at least enough assets   |
//! | `preview_withdraw` | Up        | owner burns at least enough shares   |

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from conversion arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MathError {
    /// The denominator was zero (e.g., shares outstanding against an empty pool).
    #[error("division by zero")]
    DivisionByZero,

    /// The quotient does not fit in `u64`.
    #[error("conversion result exceeds u64::MAX")]
    Overflow,
}

/// Direction of integer rounding for a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rounding {
    /// Truncate toward zero.
    Down,
    /// Round any non-zero remainder away from zero.
    Up,
}

/// Computes `x * y / denominator` with the requested rounding.
///
/// # Errors
///
/// [`MathError::DivisionByZero`] if `denominator == 0`,
/// [`MathError::Overflow`] if the result exceeds `u64::MAX`.
pub fn mul_div(x: u64, y: u64, denominator: u64, rounding: Rounding) -> Result<u64, MathError> {
    if denominator == 0 {
        return Err(MathError::DivisionByZero);
    }

    let product = u128::from(x) * u128::from(y);
    let denominator = u128::from(denominator);
    let mut quotient = product / denominator;
    if rounding == Rounding::Up && product % denominator != 0 {
        quotient += 1;
    }

    u64::try_from(quotient).map_err(|_| MathError::Overflow)
}

/// Shorthand for [`mul_div`] rounding down.
pub fn mul_div_down(x: u64, y: u64, denominator: u64) -> Result<u64, MathError> {
    mul_div(x, y, denominator, Rounding::Down)
}

/// Shorthand for [`mul_div`] rounding up.
pub fn mul_div_up(x: u64, y: u64, denominator: u64) -> Result<u64, MathError> {
    mul_div(x, y, denominator, Rounding::Up)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_division_ignores_rounding() {
        assert_eq!(mul_div_down(500, 1000, 1000), Ok(500));
        assert_eq!(mul_div_up(500, 1000, 1000), Ok(500));
    }

    #[test]
    fn remainder_rounds_in_requested_direction() {
        // 1800 * 500 / 1500 = 600 exactly; 1801 * 500 / 1500 = 600.33...
        assert_eq!(mul_div_down(1801, 500, 1500), Ok(600));
        assert_eq!(mul_div_up(1801, 500, 1500), Ok(601));
    }

    #[test]
    fn intermediate_product_does_not_overflow() {
        assert_eq!(mul_div_down(u64::MAX, u64::MAX, u64::MAX), Ok(u64::MAX));
    }

    #[test]
    fn oversized_quotient_rejected() {
        assert_eq!(mul_div_down(u64::MAX, 2, 1), Err(MathError::Overflow));
    }

    #[test]
    fn zero_denominator_rejected() {
        assert_eq!(mul_div_up(1, 1, 0), Err(MathError::DivisionByZero));
    }

    #[test]
    fn round_up_never_below_round_down() {
        for x in [1u64, 7, 999, 1_000_001] {
            for (y, d) in [(3u64, 7u64), (1000, 999), (1, 1_000_000)] {
                let down = mul_div_down(x, y, d).unwrap();
                let up = mul_div_up(x, y, d).unwrap();
                assert!(up >= down);
                assert!(up - down <= 1);
            }
        }
    }
}
