//! # Virtual Offset Strategy
//!
//! Prices shares against `total_supply + 10^offset` virtual shares and
//! `total_assets + 1` virtual asset. The virtual position never redeems, so
//! a donation to an almost-empty vault mostly accrues to it instead of to
//! the attacker holding the only real shares:
//!
//! ```text
//! shares = assets * (supply + 10^offset) / (total_assets + 1)
//! assets = shares * (total_assets + 1)   / (supply + 10^offset)
//! ```
//!
//! Shares carry `offset` more decimals than the asset, so an empty vault
//! mints `10^offset` shares per unit of asset.

use serde::Serialize;

use sharevault_protocol::config::MAX_DECIMALS;
use sharevault_protocol::math::{mul_div_down, mul_div_up, MathError};
use sharevault_protocol::vault::{PoolState, VaultHooks, VaultStrategy};

use crate::StrategyError;

/// Virtual assets added to every conversion.
pub const VIRTUAL_ASSETS: u64 = 1;

/// Proportional conversion with a virtual position of `10^offset` shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OffsetStrategy {
    offset: u8,
    virtual_shares: u64,
}

impl OffsetStrategy {
    /// Creates a strategy with `10^offset` virtual shares.
    pub fn new(offset: u8) -> Result<Self, StrategyError> {
        let virtual_shares = 10u64
            .checked_pow(u32::from(offset))
            .filter(|_| offset <= MAX_DECIMALS)
            .ok_or(StrategyError::OffsetTooLarge {
                offset,
                max: MAX_DECIMALS,
            })?;
        Ok(Self {
            offset,
            virtual_shares,
        })
    }

    /// The decimals offset.
    pub fn offset(&self) -> u8 {
        self.offset
    }

    /// Shares held by the virtual position.
    pub fn virtual_shares(&self) -> u64 {
        self.virtual_shares
    }

    fn supply(&self, pool: PoolState) -> Result<u64, MathError> {
        pool.total_supply
            .checked_add(self.virtual_shares)
            .ok_or(MathError::Overflow)
    }

    fn assets(&self, pool: PoolState) -> Result<u64, MathError> {
        pool.total_assets
            .checked_add(VIRTUAL_ASSETS)
            .ok_or(MathError::Overflow)
    }
}

impl VaultStrategy for OffsetStrategy {
    fn decimals_offset(&self) -> Option<u8> {
        Some(self.offset)
    }

    fn convert_to_shares(&self, pool: PoolState, assets: u64) -> Result<u64, MathError> {
        mul_div_down(assets, self.supply(pool)?, self.assets(pool)?)
    }

    fn convert_to_assets(&self, pool: PoolState, shares: u64) -> Result<u64, MathError> {
        mul_div_down(shares, self.assets(pool)?, self.supply(pool)?)
    }

    fn preview_mint(&self, pool: PoolState, shares: u64) -> Result<u64, MathError> {
        mul_div_up(shares, self.assets(pool)?, self.supply(pool)?)
    }

    fn preview_withdraw(&self, pool: PoolState, assets: u64) -> Result<u64, MathError> {
        mul_div_up(assets, self.supply(pool)?, self.assets(pool)?)
    }
}

impl VaultHooks for OffsetStrategy {}
