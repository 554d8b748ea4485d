//! # Vault Strategy
//!
//! A strategy decides what the pool is worth and how assets and shares
//! convert. The vault core is generic over [`VaultStrategy`]; every method
//! has a default that implements the standard proportional vault, so the
//! simplest strategy is an empty `impl`.
//!
//! Conversions are pure functions of a [`PoolState`] snapshot taken under the
//! vault lock. They must be monotonic in their input and round in the
//! vault's favour (see [`crate::math`]).

use serde::{Deserialize, Serialize};

use crate::config::UNLIMITED;
use crate::ledger::{Address, AssetLedger};
use crate::math::{mul_div_down, mul_div_up, MathError};

/// Pool totals a conversion is evaluated against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    /// Assets the vault currently claims (`total_assets()`).
    pub total_assets: u64,
    /// Shares outstanding.
    pub total_supply: u64,
}

impl PoolState {
    /// Creates a pool snapshot.
    pub fn new(total_assets: u64, total_supply: u64) -> Self {
        Self {
            total_assets,
            total_supply,
        }
    }

    /// `true` while no shares are outstanding.
    pub fn is_empty(&self) -> bool {
        self.total_supply == 0
    }
}

/// Read-only view handed to [`VaultStrategy::total_assets`].
pub struct StrategyContext<'a> {
    /// The vault's own address on the asset ledger.
    pub vault: &'a Address,
    /// The underlying asset ledger.
    pub asset: &'a dyn AssetLedger,
}

/// Valuation and conversion rules for a vault.
///
/// While the pool is empty, assets and shares convert 1:1. Afterwards:
///
/// ```text
/// convert_to_shares(a) = a * supply / total_assets   (down)
/// convert_to_assets(s) = s * total_assets / supply   (down)
/// preview_mint(s)      = s * total_assets / supply   (up)
/// preview_withdraw(a)  = a * supply / total_assets   (up)
/// ```
pub trait VaultStrategy: Send + Sync {
    /// Assets under management. Defaults to the vault's idle balance on the
    /// asset ledger; override to include assets deployed elsewhere.
    fn total_assets(&self, ctx: &StrategyContext<'_>) -> u64 {
        ctx.asset.balance_of(ctx.vault)
    }

    /// Overrides the configured share decimals offset. `None` keeps the
    /// config value.
    fn decimals_offset(&self) -> Option<u8> {
        None
    }

    /// Shares worth `assets`, rounded down.
    fn convert_to_shares(&self, pool: PoolState, assets: u64) -> Result<u64, MathError> {
        if pool.is_empty() {
            return Ok(assets);
        }
        mul_div_down(assets, pool.total_supply, pool.total_assets)
    }

    /// Assets worth `shares`, rounded down.
    fn convert_to_assets(&self, pool: PoolState, shares: u64) -> Result<u64, MathError> {
        if pool.is_empty() {
            return Ok(shares);
        }
        mul_div_down(shares, pool.total_assets, pool.total_supply)
    }

    /// Assets a minter must pay for `shares`, rounded up.
    fn preview_mint(&self, pool: PoolState, shares: u64) -> Result<u64, MathError> {
        if pool.is_empty() {
            return Ok(shares);
        }
        mul_div_up(shares, pool.total_assets, pool.total_supply)
    }

    /// Shares an owner must burn to receive `assets`, rounded up.
    fn preview_withdraw(&self, pool: PoolState, assets: u64) -> Result<u64, MathError> {
        if pool.is_empty() {
            return Ok(assets);
        }
        mul_div_up(assets, pool.total_supply, pool.total_assets)
    }

    /// Largest deposit `receiver` may make right now.
    fn max_deposit(&self, _pool: PoolState, _receiver: &Address) -> u64 {
        UNLIMITED
    }

    /// Largest mint `receiver` may make right now.
    fn max_mint(&self, _pool: PoolState, _receiver: &Address) -> u64 {
        UNLIMITED
    }
}
