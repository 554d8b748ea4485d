//! # Share Ledger
//!
//! Bookkeeping for the vault's own receipt token. The vault is the only
//! minter and burner; holders may approve spenders and move shares between
//! themselves.
//!
//! [`ShareBook`] is the in-memory implementation. It is not `Sync` by itself:
//! the owning vault keeps it behind its operation mutex.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::address::Address;
use crate::config::UNLIMITED;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during share bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShareError {
    /// Tried to burn or move more shares than the holder owns.
    #[error("insufficient shares: {holder} holds {balance}, requested {requested}")]
    InsufficientBalance {
        /// The holder being debited.
        holder: Address,
        /// Current share balance.
        balance: u64,
        /// Shares requested.
        requested: u64,
    },

    /// The spender's approval does not cover the requested shares.
    #[error("insufficient share allowance: {spender} may spend {allowance} of {owner}, requested {requested}")]
    InsufficientAllowance {
        /// Share owner.
        owner: Address,
        /// Delegated spender.
        spender: Address,
        /// Remaining approval.
        allowance: u64,
        /// Shares requested.
        requested: u64,
    },

    /// Minting would push the supply or a balance past `u64::MAX`.
    #[error("share supply overflow: minting {amount} would exceed u64::MAX")]
    SupplyOverflow {
        /// The amount that was attempted.
        amount: u64,
    },
}

// ---------------------------------------------------------------------------
// ShareLedger
// ---------------------------------------------------------------------------

/// Interface to the vault's share token bookkeeping.
///
/// Mutating methods validate first and write second; an `Err` leaves the
/// ledger untouched. `total_supply` is always the exact sum of balances.
pub trait ShareLedger: Send {
    /// Share balance of `holder`.
    fn balance_of(&self, holder: &Address) -> u64;

    /// Sum of all share balances.
    fn total_supply(&self) -> u64;

    /// Remaining shares `spender` may debit from `owner`.
    fn allowance(&self, owner: &Address, spender: &Address) -> u64;

    /// Sets `spender`'s allowance over `owner`'s shares.
    fn approve(&mut self, owner: &Address, spender: &Address, shares: u64);

    /// Debits `shares` from the allowance and returns how much was actually
    /// deducted (zero for an unlimited approval).
    fn spend_allowance(
        &mut self,
        owner: &Address,
        spender: &Address,
        shares: u64,
    ) -> Result<u64, ShareError>;

    /// Adds `shares` back onto an allowance. Saturates at unlimited.
    fn increase_allowance(&mut self, owner: &Address, spender: &Address, shares: u64);

    /// Creates `shares` in `to`'s account.
    fn mint(&mut self, to: &Address, shares: u64) -> Result<(), ShareError>;

    /// Destroys `shares` from `from`'s account.
    fn burn(&mut self, from: &Address, shares: u64) -> Result<(), ShareError>;

    /// Moves `shares` between holders.
    fn transfer(&mut self, from: &Address, to: &Address, shares: u64) -> Result<(), ShareError>;

    /// All non-zero balances, ordered by address.
    fn holders(&self) -> Vec<(Address, u64)>;
}

// ---------------------------------------------------------------------------
// ShareBook
// ---------------------------------------------------------------------------

/// In-memory share token: balances, supply and approvals.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ShareBook {
    balances: BTreeMap<Address, u64>,
    /// `owner -> (spender -> shares)`.
    allowances: BTreeMap<Address, BTreeMap<Address, u64>>,
    total_supply: u64,
}

impl ShareBook {
    /// Creates an empty share book.
    pub fn new() -> Self {
        Self::default()
    }

    fn set_balance(&mut self, holder: &Address, balance: u64) {
        if balance == 0 {
            self.balances.remove(holder);
        } else {
            self.balances.insert(holder.clone(), balance);
        }
    }

    fn set_allowance(&mut self, owner: &Address, spender: &Address, shares: u64) {
        self.allowances
            .entry(owner.clone())
            .or_default()
            .insert(spender.clone(), shares);
    }

    fn checked_debit(&self, holder: &Address, shares: u64) -> Result<u64, ShareError> {
        let balance = self.balance_of(holder);
        balance
            .checked_sub(shares)
            .ok_or_else(|| ShareError::InsufficientBalance {
                holder: holder.clone(),
                balance,
                requested: shares,
            })
    }
}

impl ShareLedger for ShareBook {
    fn balance_of(&self, holder: &Address) -> u64 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    fn total_supply(&self) -> u64 {
        self.total_supply
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> u64 {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    fn approve(&mut self, owner: &Address, spender: &Address, shares: u64) {
        self.set_allowance(owner, spender, shares);
    }

    fn spend_allowance(
        &mut self,
        owner: &Address,
        spender: &Address,
        shares: u64,
    ) -> Result<u64, ShareError> {
        let allowance = self.allowance(owner, spender);
        if allowance == UNLIMITED {
            return Ok(0);
        }
        if allowance < shares {
            return Err(ShareError::InsufficientAllowance {
                owner: owner.clone(),
                spender: spender.clone(),
                allowance,
                requested: shares,
            });
        }

        self.set_allowance(owner, spender, allowance - shares);
        Ok(shares)
    }

    fn increase_allowance(&mut self, owner: &Address, spender: &Address, shares: u64) {
        let restored = self.allowance(owner, spender).saturating_add(shares);
        self.set_allowance(owner, spender, restored);
    }

    fn mint(&mut self, to: &Address, shares: u64) -> Result<(), ShareError> {
        let overflow = ShareError::SupplyOverflow { amount: shares };
        let supply = self
            .total_supply
            .checked_add(shares)
            .ok_or_else(|| overflow.clone())?;
        let balance = self.balance_of(to).checked_add(shares).ok_or(overflow)?;

        self.total_supply = supply;
        self.set_balance(to, balance);
        Ok(())
    }

    fn burn(&mut self, from: &Address, shares: u64) -> Result<(), ShareError> {
        let remaining = self.checked_debit(from, shares)?;

        // Supply is the sum of balances, so it can't underflow here.
        self.total_supply -= shares;
        self.set_balance(from, remaining);
        Ok(())
    }

    fn transfer(&mut self, from: &Address, to: &Address, shares: u64) -> Result<(), ShareError> {
        let remaining = self.checked_debit(from, shares)?;
        if from == to {
            return Ok(());
        }
        let credited = self
            .balance_of(to)
            .checked_add(shares)
            .ok_or(ShareError::SupplyOverflow { amount: shares })?;

        self.set_balance(from, remaining);
        self.set_balance(to, credited);
        Ok(())
    }

    fn holders(&self) -> Vec<(Address, u64)> {
        self.balances
            .iter()
            .map(|(holder, balance)| (holder.clone(), *balance))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
