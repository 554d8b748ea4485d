//! # Capped Strategy
//!
//! Wraps another strategy with two deposit limits:
//!
//! - a **TVL cap** on `total_assets` across all depositors, and
//! - a **per-receiver cap** on the net assets credited to one receiver.
//!
//! Net deposits per receiver are tracked by the wrapper's own hooks: a
//! deposit or mint adds its assets, a withdrawal or redemption subtracts
//! them (never below zero). Clones share the same tracking table, so the
//! copy passed as the vault's strategy and the copy passed as its hooks see
//! the same numbers.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use sharevault_protocol::config::UNLIMITED;
use sharevault_protocol::ledger::Address;
use sharevault_protocol::math::MathError;
use sharevault_protocol::vault::{
    HookContext, HookError, PoolState, StrategyContext, VaultHooks, VaultStrategy,
};

/// Adds a TVL cap and a per-receiver cap to `S`.
#[derive(Debug, Clone)]
pub struct CappedStrategy<S> {
    inner: S,
    tvl_cap: u64,
    receiver_cap: u64,
    deposited: Arc<Mutex<BTreeMap<Address, u64>>>,
}

impl<S> CappedStrategy<S> {
    /// Caps `inner` at `tvl_cap` total assets. No per-receiver cap.
    pub fn new(inner: S, tvl_cap: u64) -> Self {
        Self {
            inner,
            tvl_cap,
            receiver_cap: UNLIMITED,
            deposited: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Also caps each receiver's net deposits at `cap`.
    pub fn with_receiver_cap(mut self, cap: u64) -> Self {
        self.receiver_cap = cap;
        self
    }

    /// The wrapped strategy.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// The TVL cap.
    pub fn tvl_cap(&self) -> u64 {
        self.tvl_cap
    }

    /// The per-receiver cap.
    pub fn receiver_cap(&self) -> u64 {
        self.receiver_cap
    }

    /// Net assets currently credited to `receiver`.
    pub fn deposited(&self, receiver: &Address) -> u64 {
        self.deposited.lock().get(receiver).copied().unwrap_or(0)
    }

    fn remaining(&self, pool: PoolState, receiver: &Address) -> u64 {
        let tvl_room = if self.tvl_cap == UNLIMITED {
            UNLIMITED
        } else {
            self.tvl_cap.saturating_sub(pool.total_assets)
        };
        let receiver_room = if self.receiver_cap == UNLIMITED {
            UNLIMITED
        } else {
            self.receiver_cap.saturating_sub(self.deposited(receiver))
        };
        tvl_room.min(receiver_room)
    }
}

impl<S: VaultStrategy> VaultStrategy for CappedStrategy<S> {
    fn total_assets(&self, ctx: &StrategyContext<'_>) -> u64 {
        self.inner.total_assets(ctx)
    }

    fn decimals_offset(&self) -> Option<u8> {
        self.inner.decimals_offset()
    }

    fn convert_to_shares(&self, pool: PoolState, assets: u64) -> Result<u64, MathError> {
        self.inner.convert_to_shares(pool, assets)
    }

    fn convert_to_assets(&self, pool: PoolState, shares: u64) -> Result<u64, MathError> {
        self.inner.convert_to_assets(pool, shares)
    }

    fn preview_mint(&self, pool: PoolState, shares: u64) -> Result<u64, MathError> {
        self.inner.preview_mint(pool, shares)
    }

    fn preview_withdraw(&self, pool: PoolState, assets: u64) -> Result<u64, MathError> {
        self.inner.preview_withdraw(pool, assets)
    }

    fn max_deposit(&self, pool: PoolState, receiver: &Address) -> u64 {
        self.remaining(pool, receiver)
            .min(self.inner.max_deposit(pool, receiver))
    }

    /// The shares `max_deposit` buys, rounded down, so minting them never
    /// costs more than the cap allows.
    fn max_mint(&self, pool: PoolState, receiver: &Address) -> u64 {
        let assets = self.max_deposit(pool, receiver);
        let shares = if assets == UNLIMITED {
            UNLIMITED
        } else {
            self.inner.convert_to_shares(pool, assets).unwrap_or(0)
        };
        shares.min(self.inner.max_mint(pool, receiver))
    }
}

impl<S: VaultHooks> VaultHooks for CappedStrategy<S> {
    fn before_deposit(&self, ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        self.inner.before_deposit(ctx)
    }

    fn after_deposit(&self, ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        self.inner.after_deposit(ctx)?;
        let mut deposited = self.deposited.lock();
        let entry = deposited.entry(ctx.receiver.clone()).or_insert(0);
        *entry = entry.saturating_add(ctx.assets);
        debug!(receiver = %ctx.receiver, deposited = *entry, "receiver deposits updated");
        Ok(())
    }

    fn before_withdraw(&self, ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        self.inner.before_withdraw(ctx)
    }

    fn after_withdraw(&self, ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        self.inner.after_withdraw(ctx)?;
        let Some(owner) = ctx.owner else {
            return Ok(());
        };
        let mut deposited = self.deposited.lock();
        if let Some(entry) = deposited.get_mut(owner) {
            *entry = entry.saturating_sub(ctx.assets);
            if *entry == 0 {
                deposited.remove(owner);
            }
        }
        Ok(())
    }
}
