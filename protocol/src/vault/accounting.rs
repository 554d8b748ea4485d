//! # Vault Accounting Core
//!
//! [`Vault`] owns the share ledger and runs the four economic operations
//! against an external asset ledger. Each operation holds the vault's mutex
//! from the first read of pool state to the last hook, so no other operation
//! on the same vault can observe or interleave with a half-applied state.
//!
//! ## Operation Pipeline
//!
//! ```text
//! lock ─► snapshot pool ─► derive amount (strategy) ─► validate
//!      ─► apply steps, journaling each one
//!      ─► Ok: keep ─── Err: unwind journal ─► unlock
//! ```
//!
//! Nothing is mutated before validation passes, and everything mutated after
//! it is journaled, so the caller sees either the whole operation or none
//! of it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::error::VaultError;
use super::events::{Operation, VaultEvent};
use super::hooks::{HookContext, HookPoint, NoHooks, VaultHooks};
use super::journal::{Journal, JournalEntry};
use super::strategy::{PoolState, StrategyContext, VaultStrategy};
use crate::config::{VaultConfig, VAULT_ADDRESS_DOMAIN};
use crate::ledger::{Address, AssetLedger, ShareBook, ShareLedger};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Share token metadata, fixed at construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareMetadata {
    /// Share token name.
    pub name: String,
    /// Share token symbol.
    pub symbol: String,
    /// Share precision.
    pub decimals: u8,
    /// Precision of the underlying asset.
    pub asset_decimals: u8,
}

/// Point-in-time view of a vault's books.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSnapshot {
    /// The vault's address.
    pub address: Address,
    /// Share token metadata.
    pub metadata: ShareMetadata,
    /// Total assets and supply.
    pub pool: PoolState,
    /// Non-zero share balances, ordered by holder.
    pub holders: Vec<(Address, u64)>,
    /// Committed events so far.
    pub event_count: usize,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Internal types
// ---------------------------------------------------------------------------

struct VaultState<L> {
    shares: L,
    events: Vec<VaultEvent>,
}

/// Parties and amounts of one operation.
struct Flow<'a> {
    caller: &'a Address,
    receiver: &'a Address,
    owner: Option<&'a Address>,
    assets: u64,
    shares: u64,
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// A tokenized vault over one underlying asset.
///
/// Generic over its [`VaultStrategy`] (valuation and conversion), its
/// [`VaultHooks`] (extension points) and its [`ShareLedger`] (share
/// bookkeeping). Share it between threads behind an `Arc`.
pub struct Vault<S, H = NoHooks, L = ShareBook> {
    address: Address,
    metadata: ShareMetadata,
    asset: Arc<dyn AssetLedger>,
    strategy: S,
    hooks: H,
    state: Mutex<VaultState<L>>,
}

impl<S: VaultStrategy> Vault<S> {
    /// Creates a vault with no hooks and an empty in-memory share book.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Config`] if the config fails validation.
    pub fn new(
        config: VaultConfig,
        asset: Arc<dyn AssetLedger>,
        strategy: S,
    ) -> Result<Self, VaultError> {
        Vault::with_parts(config, asset, strategy, NoHooks, ShareBook::new())
    }
}

impl<S: VaultStrategy, H: VaultHooks> Vault<S, H> {
    /// Creates a vault with hooks and an empty in-memory share book.
    pub fn with_hooks(
        config: VaultConfig,
        asset: Arc<dyn AssetLedger>,
        strategy: S,
        hooks: H,
    ) -> Result<Self, VaultError> {
        Vault::with_parts(config, asset, strategy, hooks, ShareBook::new())
    }
}

impl<S, H, L> Vault<S, H, L>
where
    S: VaultStrategy,
    H: VaultHooks,
    L: ShareLedger,
{
    /// Creates a vault from all of its parts.
    ///
    /// Share decimals are the asset's decimals plus the strategy's offset
    /// (or the config's, if the strategy has none) and never change again.
    /// The address is derived from the share name and symbol.
    pub fn with_parts(
        config: VaultConfig,
        asset: Arc<dyn AssetLedger>,
        strategy: S,
        hooks: H,
        shares: L,
    ) -> Result<Self, VaultError> {
        let asset_decimals = asset.decimals();
        let config = VaultConfig {
            decimals_offset: strategy
                .decimals_offset()
                .unwrap_or(config.decimals_offset),
            ..config
        };
        let decimals = config.share_decimals(asset_decimals)?;
        let address = Address::derive(
            VAULT_ADDRESS_DOMAIN,
            &[config.name.as_str(), config.symbol.as_str()],
        );

        info!(
            vault = %address,
            name = %config.name,
            symbol = %config.symbol,
            decimals,
            asset_decimals,
            "vault created"
        );

        Ok(Self {
            address,
            metadata: ShareMetadata {
                name: config.name,
                symbol: config.symbol,
                decimals,
                asset_decimals,
            },
            asset,
            strategy,
            hooks,
            state: Mutex::new(VaultState {
                shares,
                events: Vec::new(),
            }),
        })
    }

    // -----------------------------------------------------------------------
    // Identity
    // -----------------------------------------------------------------------

    /// The vault's own address on the asset ledger.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The underlying asset ledger.
    pub fn asset(&self) -> &dyn AssetLedger {
        self.asset.as_ref()
    }

    /// A shared handle to the underlying asset ledger.
    pub fn asset_handle(&self) -> Arc<dyn AssetLedger> {
        Arc::clone(&self.asset)
    }

    /// Share token metadata.
    pub fn metadata(&self) -> &ShareMetadata {
        &self.metadata
    }

    /// Share precision.
    pub fn decimals(&self) -> u8 {
        self.metadata.decimals
    }

    /// The vault's strategy.
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    // -----------------------------------------------------------------------
    // Share token views
    // -----------------------------------------------------------------------

    /// Shares outstanding.
    pub fn total_supply(&self) -> u64 {
        self.state.lock().shares.total_supply()
    }

    /// Share balance of `holder`.
    pub fn balance_of(&self, holder: &Address) -> u64 {
        self.state.lock().shares.balance_of(holder)
    }

    /// Shares `spender` may still withdraw or redeem on `owner`'s behalf.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> u64 {
        self.state.lock().shares.allowance(owner, spender)
    }

    /// Sets `spender`'s allowance over `owner`'s shares. `UNLIMITED` never
    /// decreases.
    pub fn approve(&self, owner: &Address, spender: &Address, shares: u64) {
        self.state.lock().shares.approve(owner, spender, shares);
        debug!(vault = %self.address, %owner, %spender, shares, "share allowance set");
    }

    /// Moves shares between holders. Pool totals are unaffected.
    pub fn transfer_shares(
        &self,
        from: &Address,
        to: &Address,
        shares: u64,
    ) -> Result<(), VaultError> {
        self.state.lock().shares.transfer(from, to, shares)?;
        debug!(vault = %self.address, %from, %to, shares, "shares transferred");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Accounting views
    // -----------------------------------------------------------------------

    /// Assets under management, as reported by the strategy.
    pub fn total_assets(&self) -> u64 {
        self.strategy.total_assets(&self.strategy_context())
    }

    /// Current total assets and supply.
    pub fn pool_state(&self) -> PoolState {
        let state = self.state.lock();
        self.pool(&state.shares)
    }

    /// Shares worth `assets` at the current price, rounded down.
    pub fn convert_to_shares(&self, assets: u64) -> Result<u64, VaultError> {
        Ok(self.strategy.convert_to_shares(self.pool_state(), assets)?)
    }

    /// Assets worth `shares` at the current price, rounded down.
    pub fn convert_to_assets(&self, shares: u64) -> Result<u64, VaultError> {
        Ok(self.strategy.convert_to_assets(self.pool_state(), shares)?)
    }

    /// Largest deposit `receiver` may make.
    pub fn max_deposit(&self, receiver: &Address) -> u64 {
        self.strategy.max_deposit(self.pool_state(), receiver)
    }

    /// Largest mint `receiver` may make.
    pub fn max_mint(&self, receiver: &Address) -> u64 {
        self.strategy.max_mint(self.pool_state(), receiver)
    }

    /// Assets `owner` could withdraw: the value of their whole balance.
    pub fn max_withdraw(&self, owner: &Address) -> Result<u64, VaultError> {
        let state = self.state.lock();
        let pool = self.pool(&state.shares);
        Ok(self
            .strategy
            .convert_to_assets(pool, state.shares.balance_of(owner))?)
    }

    /// Shares `owner` could redeem: their whole balance.
    pub fn max_redeem(&self, owner: &Address) -> u64 {
        self.balance_of(owner)
    }

    /// Shares a deposit of `assets` would mint right now.
    pub fn preview_deposit(&self, assets: u64) -> Result<u64, VaultError> {
        self.convert_to_shares(assets)
    }

    /// Assets a mint of `shares` would cost right now (rounded up).
    pub fn preview_mint(&self, shares: u64) -> Result<u64, VaultError> {
        Ok(self.strategy.preview_mint(self.pool_state(), shares)?)
    }

    /// Shares a withdrawal of `assets` would burn right now (rounded up).
    pub fn preview_withdraw(&self, assets: u64) -> Result<u64, VaultError> {
        Ok(self.strategy.preview_withdraw(self.pool_state(), assets)?)
    }

    /// Assets a redemption of `shares` would return right now.
    pub fn preview_redeem(&self, shares: u64) -> Result<u64, VaultError> {
        self.convert_to_assets(shares)
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Pulls `assets` from `caller` and mints the corresponding shares to
    /// `receiver`. Returns the shares minted.
    ///
    /// `caller` must have approved the vault on the asset ledger.
    ///
    /// # Errors
    ///
    /// [`VaultError::ZeroShares`] if the deposit rounds to zero shares,
    /// [`VaultError::ExceedsMax`] above `max_deposit`,
    /// [`VaultError::TransferFailure`] if the asset pull fails,
    /// [`VaultError::Hook`] if a hook aborts.
    pub fn deposit(
        &self,
        caller: &Address,
        assets: u64,
        receiver: &Address,
    ) -> Result<u64, VaultError> {
        let mut state = self.state.lock();
        let pool = self.pool(&state.shares);

        check_max(
            Operation::Deposit,
            assets,
            self.strategy.max_deposit(pool, receiver),
        )?;
        let shares = self.strategy.convert_to_shares(pool, assets)?;
        if shares == 0 {
            warn!(vault = %self.address, %caller, assets, "deposit rejected: zero shares");
            return Err(VaultError::ZeroShares { assets });
        }

        let flow = Flow {
            caller,
            receiver,
            owner: None,
            assets,
            shares,
        };
        self.commit(&mut state, Operation::Deposit, &flow, |state, journal| {
            self.apply_deposit(state, journal, &flow)
        })?;
        Ok(shares)
    }

    /// Mints exactly `shares` to `receiver`, pulling the required assets
    /// (rounded up) from `caller`. Returns the assets paid.
    ///
    /// # Errors
    ///
    /// [`VaultError::ExceedsMax`] above `max_mint`,
    /// [`VaultError::TransferFailure`] if the asset pull fails,
    /// [`VaultError::Hook`] if a hook aborts.
    pub fn mint(
        &self,
        caller: &Address,
        shares: u64,
        receiver: &Address,
    ) -> Result<u64, VaultError> {
        let mut state = self.state.lock();
        let pool = self.pool(&state.shares);

        check_max(
            Operation::Mint,
            shares,
            self.strategy.max_mint(pool, receiver),
        )?;
        let assets = self.strategy.preview_mint(pool, shares)?;

        let flow = Flow {
            caller,
            receiver,
            owner: None,
            assets,
            shares,
        };
        self.commit(&mut state, Operation::Mint, &flow, |state, journal| {
            self.apply_deposit(state, journal, &flow)
        })?;
        Ok(assets)
    }

    /// Burns the shares (rounded up) worth `assets` from `owner` and sends
    /// `assets` to `receiver`. Returns the shares burned.
    ///
    /// A caller other than `owner` spends share allowance equal to the
    /// shares burned.
    ///
    /// # Errors
    ///
    /// [`VaultError::InsufficientAllowance`] for an under-approved third
    /// party, [`VaultError::ExceedsMax`] above `max_withdraw`,
    /// [`VaultError::TransferFailure`] if the asset push fails,
    /// [`VaultError::Hook`] if a hook aborts.
    pub fn withdraw(
        &self,
        caller: &Address,
        assets: u64,
        receiver: &Address,
        owner: &Address,
    ) -> Result<u64, VaultError> {
        let mut state = self.state.lock();
        let pool = self.pool(&state.shares);

        let shares = self.strategy.preview_withdraw(pool, assets)?;
        let max = self
            .strategy
            .convert_to_assets(pool, state.shares.balance_of(owner))?;

        let flow = Flow {
            caller,
            receiver,
            owner: Some(owner),
            assets,
            shares,
        };
        self.commit(&mut state, Operation::Withdraw, &flow, |state, journal| {
            self.spend_allowance(state, journal, caller, owner, shares)?;
            check_max(Operation::Withdraw, assets, max)?;
            self.apply_withdrawal(state, journal, &flow, owner)
        })?;
        Ok(shares)
    }

    /// Burns `shares` from `owner` and sends their value (rounded down) to
    /// `receiver`. Returns the assets sent.
    ///
    /// # Errors
    ///
    /// [`VaultError::InsufficientAllowance`] for an under-approved third
    /// party, [`VaultError::ZeroAssets`] if the shares are worth nothing
    /// after rounding, [`VaultError::ExceedsMax`] above `max_redeem`,
    /// [`VaultError::TransferFailure`] if the asset push fails,
    /// [`VaultError::Hook`] if a hook aborts.
    pub fn redeem(
        &self,
        caller: &Address,
        shares: u64,
        receiver: &Address,
        owner: &Address,
    ) -> Result<u64, VaultError> {
        let mut state = self.state.lock();
        let pool = self.pool(&state.shares);

        let assets = self.strategy.convert_to_assets(pool, shares)?;
        let max = state.shares.balance_of(owner);

        let flow = Flow {
            caller,
            receiver,
            owner: Some(owner),
            assets,
            shares,
        };
        self.commit(&mut state, Operation::Redeem, &flow, |state, journal| {
            self.spend_allowance(state, journal, caller, owner, shares)?;
            if assets == 0 {
                return Err(VaultError::ZeroAssets { shares });
            }
            check_max(Operation::Redeem, shares, max)?;
            self.apply_withdrawal(state, journal, &flow, owner)
        })?;
        Ok(assets)
    }

    // -----------------------------------------------------------------------
    // Event log
    // -----------------------------------------------------------------------

    /// All committed events not yet drained, oldest first.
    pub fn events(&self) -> Vec<VaultEvent> {
        self.state.lock().events.clone()
    }

    /// Removes and returns all committed events.
    pub fn drain_events(&self) -> Vec<VaultEvent> {
        std::mem::take(&mut self.state.lock().events)
    }

    /// Consistent view of pool totals and holders.
    pub fn snapshot(&self) -> VaultSnapshot {
        let state = self.state.lock();
        VaultSnapshot {
            address: self.address.clone(),
            metadata: self.metadata.clone(),
            pool: self.pool(&state.shares),
            holders: state.shares.holders(),
            event_count: state.events.len(),
            taken_at: Utc::now(),
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn strategy_context(&self) -> StrategyContext<'_> {
        StrategyContext {
            vault: &self.address,
            asset: self.asset.as_ref(),
        }
    }

    fn pool(&self, shares: &L) -> PoolState {
        PoolState::new(
            self.strategy.total_assets(&self.strategy_context()),
            shares.total_supply(),
        )
    }

    /// Runs `apply` with a fresh journal; unwinds it if `apply` fails.
    fn commit<F>(
        &self,
        state: &mut VaultState<L>,
        operation: Operation,
        flow: &Flow<'_>,
        apply: F,
    ) -> Result<(), VaultError>
    where
        F: FnOnce(&mut VaultState<L>, &mut Journal) -> Result<(), VaultError>,
    {
        let mut journal = Journal::new();
        let cause = match apply(state, &mut journal) {
            Ok(()) => {
                info!(
                    vault = %self.address,
                    %operation,
                    caller = %flow.caller,
                    receiver = %flow.receiver,
                    assets = flow.assets,
                    shares = flow.shares,
                    "operation committed"
                );
                return Ok(());
            }
            Err(cause) => cause,
        };

        warn!(
            vault = %self.address,
            %operation,
            caller = %flow.caller,
            error = %cause,
            steps = journal.len(),
            "operation aborted, rolling back"
        );

        let VaultState { shares, events } = state;
        match journal.rollback(self.asset.as_ref(), shares, events) {
            Ok(()) => Err(cause),
            Err(reason) => {
                error!(vault = %self.address, %operation, %reason, "rollback incomplete");
                Err(VaultError::RollbackFailed {
                    cause: Box::new(cause),
                    reason,
                })
            }
        }
    }

    fn spend_allowance(
        &self,
        state: &mut VaultState<L>,
        journal: &mut Journal,
        caller: &Address,
        owner: &Address,
        shares: u64,
    ) -> Result<(), VaultError> {
        if caller == owner {
            return Ok(());
        }

        let spent = state.shares.spend_allowance(owner, caller, shares)?;
        if spent > 0 {
            journal.record(JournalEntry::AllowanceSpent {
                owner: owner.clone(),
                spender: caller.clone(),
                shares: spent,
            });
        }
        Ok(())
    }

    /// before_deposit -> pull assets -> mint -> Deposit -> after_deposit
    fn apply_deposit(
        &self,
        state: &mut VaultState<L>,
        journal: &mut Journal,
        flow: &Flow<'_>,
    ) -> Result<(), VaultError> {
        self.run_hook(HookPoint::BeforeDeposit, state, journal, flow)?;

        let receipt = self
            .asset
            .transfer_from(&self.address, flow.caller, &self.address, flow.assets)
            .map_err(VaultError::TransferFailure)?;
        journal.record(JournalEntry::AssetTransfer(receipt));

        state.shares.mint(flow.receiver, flow.shares)?;
        journal.record(JournalEntry::Minted {
            to: flow.receiver.clone(),
            shares: flow.shares,
        });

        state.events.push(VaultEvent::Deposit {
            caller: flow.caller.clone(),
            receiver: flow.receiver.clone(),
            assets: flow.assets,
            shares: flow.shares,
            timestamp: Utc::now(),
        });
        journal.record(JournalEntry::EventEmitted);

        self.run_hook(HookPoint::AfterDeposit, state, journal, flow)
    }

    /// before_withdraw -> burn -> push assets -> Withdraw -> after_withdraw
    fn apply_withdrawal(
        &self,
        state: &mut VaultState<L>,
        journal: &mut Journal,
        flow: &Flow<'_>,
        owner: &Address,
    ) -> Result<(), VaultError> {
        self.run_hook(HookPoint::BeforeWithdraw, state, journal, flow)?;

        state.shares.burn(owner, flow.shares)?;
        journal.record(JournalEntry::Burned {
            from: owner.clone(),
            shares: flow.shares,
        });

        let receipt = self
            .asset
            .transfer(&self.address, flow.receiver, flow.assets)
            .map_err(VaultError::TransferFailure)?;
        journal.record(JournalEntry::AssetTransfer(receipt));

        state.events.push(VaultEvent::Withdraw {
            caller: flow.caller.clone(),
            receiver: flow.receiver.clone(),
            owner: owner.clone(),
            assets: flow.assets,
            shares: flow.shares,
            timestamp: Utc::now(),
        });
        journal.record(JournalEntry::EventEmitted);

        self.run_hook(HookPoint::AfterWithdraw, state, journal, flow)
    }

    fn run_hook(
        &self,
        point: HookPoint,
        state: &VaultState<L>,
        journal: &mut Journal,
        flow: &Flow<'_>,
    ) -> Result<(), VaultError> {
        let mut ctx = HookContext {
            point,
            vault: &self.address,
            caller: flow.caller,
            receiver: flow.receiver,
            owner: flow.owner,
            assets: flow.assets,
            shares: flow.shares,
            asset: self.asset.as_ref(),
            share_ledger: &state.shares,
            events: &state.events,
            journal,
        };

        let result = match point {
            HookPoint::BeforeDeposit => self.hooks.before_deposit(&mut ctx),
            HookPoint::AfterDeposit => self.hooks.after_deposit(&mut ctx),
            HookPoint::BeforeWithdraw => self.hooks.before_withdraw(&mut ctx),
            HookPoint::AfterWithdraw => self.hooks.after_withdraw(&mut ctx),
        };
        result.map_err(|source| VaultError::Hook { point, source })
    }
}

fn check_max(operation: Operation, requested: u64, max: u64) -> Result<(), VaultError> {
    if requested > max {
        return Err(VaultError::ExceedsMax {
            operation,
            requested,
            max,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
