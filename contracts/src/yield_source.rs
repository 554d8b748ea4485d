//! # Yield Source Strategy
//!
//! Keeps a fraction of the pool idle in the vault and deploys the rest to an
//! external yield source (any account on the asset ledger the strategy
//! controls). Gains or losses at the source show up in `total_assets` and
//! are shared by every holder.
//!
//! ```text
//! after_deposit   : idle above reserve ──► source
//! before_withdraw : source ──► vault, until idle covers the payout
//! ```
//!
//! Both movements go through the hook context, so they are rolled back with
//! the operation that caused them.

use serde::{Deserialize, Serialize};
use tracing::debug;

use sharevault_protocol::config::BPS_DENOMINATOR;
use sharevault_protocol::ledger::Address;
use sharevault_protocol::math::mul_div_down;
use sharevault_protocol::vault::{HookContext, HookError, StrategyContext, VaultHooks, VaultStrategy};

use crate::StrategyError;

/// Deploys idle assets above a reserve ratio to a yield source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldStrategy {
    source: Address,
    reserve_bps: u64,
}

impl YieldStrategy {
    /// Creates a strategy that keeps `reserve_bps` of the pool in the vault
    /// and deploys the rest to `source`.
    pub fn new(source: Address, reserve_bps: u64) -> Result<Self, StrategyError> {
        if reserve_bps > BPS_DENOMINATOR {
            return Err(StrategyError::ReserveOutOfRange { bps: reserve_bps });
        }
        Ok(Self {
            source,
            reserve_bps,
        })
    }

    /// Where deployed assets live.
    pub fn source(&self) -> &Address {
        &self.source
    }

    /// Reserve ratio in basis points.
    pub fn reserve_bps(&self) -> u64 {
        self.reserve_bps
    }

    fn reserve_target(&self, total: u64) -> Result<u64, HookError> {
        mul_div_down(total, self.reserve_bps, BPS_DENOMINATOR)
            .map_err(|e| HookError::Rejected(format!("reserve target: {e}")))
    }

    fn check_source(&self, vault: &Address) -> Result<(), HookError> {
        if &self.source == vault {
            return Err(HookError::Rejected(StrategyError::SourceIsVault.to_string()));
        }
        Ok(())
    }
}

impl VaultStrategy for YieldStrategy {
    fn total_assets(&self, ctx: &StrategyContext<'_>) -> u64 {
        let idle = ctx.asset.balance_of(ctx.vault);
        if &self.source == ctx.vault {
            return idle;
        }
        idle.saturating_add(ctx.asset.balance_of(&self.source))
    }
}

impl VaultHooks for YieldStrategy {
    fn after_deposit(&self, ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        self.check_source(ctx.vault)?;
        let idle = ctx.asset().balance_of(ctx.vault);
        let deployed = ctx.asset().balance_of(&self.source);
        let target = self.reserve_target(idle.saturating_add(deployed))?;

        if idle > target {
            let excess = idle - target;
            debug!(vault = %ctx.vault, source = %self.source, excess, "deploying idle assets");
            let (vault, source) = (ctx.vault, self.source.clone());
            ctx.transfer(vault, &source, excess)?;
        }
        Ok(())
    }

    fn before_withdraw(&self, ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        self.check_source(ctx.vault)?;
        let idle = ctx.asset().balance_of(ctx.vault);
        if idle >= ctx.assets {
            return Ok(());
        }

        let shortfall = ctx.assets - idle;
        let available = ctx.asset().balance_of(&self.source);
        let recall = shortfall.min(available);
        if recall > 0 {
            debug!(vault = %ctx.vault, source = %self.source, recall, "recalling deployed assets");
            let (vault, source) = (ctx.vault, self.source.clone());
            ctx.transfer(&source, vault, recall)?;
        }
        Ok(())
    }
}
