//! # Operation Hooks
//!
//! Four extension points wrap the ledger mutations of every operation:
//!
//! ```text
//! deposit / mint     : before_deposit  -> pull assets -> mint  -> Deposit  -> after_deposit
//! withdraw / redeem  : (allowance) -> before_withdraw -> burn -> push assets -> Withdraw -> after_withdraw
//! ```
//!
//! Hooks run while the vault lock is held and must not call back into the
//! same vault. Asset movements made through [`HookContext::transfer`] are
//! journaled, so a hook that fails (or any step after it) rolls them back
//! together with the rest of the operation.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::events::VaultEvent;
use super::journal::{Journal, JournalEntry};
use crate::ledger::{Address, AssetLedger, LedgerError, ShareLedger};

/// Errors a hook may raise. Any of them aborts the enclosing operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    /// The hook refused the operation.
    #[error("rejected: {0}")]
    Rejected(String),

    /// An asset movement requested by the hook failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Where in an operation a hook runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    /// Before assets are pulled in.
    BeforeDeposit,
    /// After shares are minted and the event is emitted.
    AfterDeposit,
    /// Before shares are burned.
    BeforeWithdraw,
    /// After assets are pushed out and the event is emitted.
    AfterWithdraw,
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HookPoint::BeforeDeposit => "before_deposit",
            HookPoint::AfterDeposit => "after_deposit",
            HookPoint::BeforeWithdraw => "before_withdraw",
            HookPoint::AfterWithdraw => "after_withdraw",
        };
        f.write_str(label)
    }
}

/// Everything a hook can see and do.
pub struct HookContext<'a> {
    /// The hook point being executed.
    pub point: HookPoint,
    /// The vault's own address.
    pub vault: &'a Address,
    /// The operation's caller.
    pub caller: &'a Address,
    /// Receiver of shares (deposit side) or assets (withdraw side).
    pub receiver: &'a Address,
    /// Share owner; `None` on the deposit side.
    pub owner: Option<&'a Address>,
    /// The already-computed asset amount.
    pub assets: u64,
    /// The already-computed share amount.
    pub shares: u64,
    pub(crate) asset: &'a dyn AssetLedger,
    pub(crate) share_ledger: &'a dyn ShareLedger,
    pub(crate) events: &'a [VaultEvent],
    pub(crate) journal: &'a mut Journal,
}

impl<'a> HookContext<'a> {
    /// The underlying asset ledger, for balance queries.
    pub fn asset(&self) -> &dyn AssetLedger {
        self.asset
    }

    /// Current share balance of `holder`, including effects already applied
    /// by this operation.
    pub fn share_balance(&self, holder: &Address) -> u64 {
        self.share_ledger.balance_of(holder)
    }

    /// Current total share supply.
    pub fn total_supply(&self) -> u64 {
        self.share_ledger.total_supply()
    }

    /// Number of events in the vault log, including one emitted by this
    /// operation if it has already happened.
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Moves assets on the underlying ledger as part of this operation.
    ///
    /// `from` must be an account the strategy controls (the vault itself or
    /// a deployment target). The transfer is undone if the operation aborts.
    pub fn transfer(&mut self, from: &Address, to: &Address, amount: u64) -> Result<(), HookError> {
        let receipt = self.asset.transfer(from, to, amount)?;
        self.journal.record(JournalEntry::AssetTransfer(receipt));
        Ok(())
    }
}

/// Extension points around the ledger mutations. All default to no-ops.
pub trait VaultHooks: Send + Sync {
    /// Runs before the deposit's asset pull.
    fn before_deposit(&self, _ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs after the Deposit event.
    fn after_deposit(&self, _ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs before the withdrawal's burn.
    fn before_withdraw(&self, _ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs after the Withdraw event.
    fn after_withdraw(&self, _ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        Ok(())
    }
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl VaultHooks for NoHooks {}
