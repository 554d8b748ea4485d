//! # Asset Ledger
//!
//! The underlying fungible token the vault accepts. In production this is an
//! external token contract; the vault only needs balance queries, plain and
//! delegated transfers, and the host's ability to undo a transfer when an
//! enclosing vault operation aborts.
//!
//! [`InMemoryAssetLedger`] is a complete reference implementation used by the
//! tests, the benches and the simulator. It is `Sync` and meant to be shared
//! behind an `Arc` between any number of vaults and users.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::address::Address;
use crate::config::UNLIMITED;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors reported by an asset ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The source account does not hold enough of the asset.
    #[error("insufficient balance: {holder} has {available}, requested {requested}")]
    InsufficientBalance {
        /// The account being debited.
        holder: Address,
        /// Its current balance.
        available: u64,
        /// The amount requested.
        requested: u64,
    },

    /// The spender is not approved for enough of the owner's balance.
    #[error("insufficient allowance: {spender} may spend {allowance} of {owner}, requested {requested}")]
    InsufficientAllowance {
        /// The account whose funds are being moved.
        owner: Address,
        /// The account moving them.
        spender: Address,
        /// The remaining approval.
        allowance: u64,
        /// The amount requested.
        requested: u64,
    },

    /// Crediting the account would exceed `u64::MAX`.
    #[error("balance overflow crediting {amount} to {holder}")]
    Overflow {
        /// The account being credited.
        holder: Address,
        /// The amount that caused the overflow.
        amount: u64,
    },
}

// ---------------------------------------------------------------------------
// TransferReceipt
// ---------------------------------------------------------------------------

/// Proof of a completed transfer, sufficient to reverse it exactly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Debited account.
    pub from: Address,
    /// Credited account.
    pub to: Address,
    /// Amount moved.
    pub amount: u64,
    /// The delegated spender, for `transfer_from`.
    pub spender: Option<Address>,
    /// How much allowance the transfer consumed (zero for unlimited approvals).
    pub allowance_spent: u64,
}

// ---------------------------------------------------------------------------
// AssetLedger
// ---------------------------------------------------------------------------

/// Interface to the underlying asset's bookkeeping.
///
/// Every mutating method is all-or-nothing: on `Err` no balance or allowance
/// has changed.
pub trait AssetLedger: Send + Sync {
    /// Precision of the asset in decimal places.
    fn decimals(&self) -> u8;

    /// Current balance of `holder`.
    fn balance_of(&self, holder: &Address) -> u64;

    /// Remaining amount `spender` may move out of `owner`'s balance.
    fn allowance(&self, owner: &Address, spender: &Address) -> u64;

    /// Moves `amount` from `from` (the authenticated sender) to `to`.
    fn transfer(
        &self,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<TransferReceipt, LedgerError>;

    /// Moves `amount` from `from` to `to` on behalf of `spender`, consuming
    /// allowance unless it is unlimited.
    fn transfer_from(
        &self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<TransferReceipt, LedgerError>;

    /// Undoes a transfer previously returned by this ledger, restoring both
    /// balances and any allowance consumed.
    ///
    /// The ledger's own lock is not held between the transfer and its
    /// revert. The vault assumes the credited account cannot move the funds
    /// in between, i.e. the host serializes the receiver's activity with the
    /// vault operation. If it can, the revert fails with
    /// [`LedgerError::InsufficientBalance`] and the vault reports
    /// `RollbackFailed`.
    fn revert(&self, receipt: &TransferReceipt) -> Result<(), LedgerError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct AssetBook {
    balances: HashMap<Address, u64>,
    allowances: HashMap<(Address, Address), u64>,
    total_supply: u64,
}

impl AssetBook {
    fn balance(&self, holder: &Address) -> u64 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> u64 {
        self.allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Validates and applies a balance move. Nothing is written on error.
    fn move_balance(&mut self, from: &Address, to: &Address, amount: u64) -> Result<(), LedgerError> {
        let available = self.balance(from);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                holder: from.clone(),
                available,
                requested: amount,
            });
        }
        if from == to {
            return Ok(());
        }

        let credited = self
            .balance(to)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow {
                holder: to.clone(),
                amount,
            })?;

        self.balances.insert(from.clone(), available - amount);
        self.balances.insert(to.clone(), credited);
        Ok(())
    }
}

/// Thread-safe in-memory asset ledger with faucet and slashing controls.
#[derive(Debug)]
pub struct InMemoryAssetLedger {
    symbol: String,
    decimals: u8,
    book: RwLock<AssetBook>,
}

impl InMemoryAssetLedger {
    /// Creates an empty ledger for an asset.
    pub fn new(symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
            book: RwLock::new(AssetBook::default()),
        }
    }

    /// Ticker of the asset.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Total amount of the asset in existence.
    pub fn total_supply(&self) -> u64 {
        self.book.read().total_supply
    }

    /// Creates `amount` out of thin air in `to`'s account.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Overflow`] if the balance or total supply
    /// would exceed `u64::MAX`.
    pub fn mint(&self, to: &Address, amount: u64) -> Result<u64, LedgerError> {
        let mut book = self.book.write();
        let overflow = || LedgerError::Overflow {
            holder: to.clone(),
            amount,
        };
        let supply = book.total_supply.checked_add(amount).ok_or_else(overflow)?;
        let balance = book.balance(to).checked_add(amount).ok_or_else(overflow)?;

        book.total_supply = supply;
        book.balances.insert(to.clone(), balance);
        Ok(balance)
    }

    /// Destroys `amount` from `from`'s account. Models a loss in a pool's
    /// position or an administrative slash.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientBalance`] if `from` holds less.
    pub fn burn(&self, from: &Address, amount: u64) -> Result<u64, LedgerError> {
        let mut book = self.book.write();
        let available = book.balance(from);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                holder: from.clone(),
                available,
                requested: amount,
            });
        }

        book.total_supply -= amount;
        book.balances.insert(from.clone(), available - amount);
        Ok(available - amount)
    }

    /// Sets the allowance of `spender` over `owner`'s balance.
    pub fn approve(&self, owner: &Address, spender: &Address, amount: u64) {
        self.book
            .write()
            .allowances
            .insert((owner.clone(), spender.clone()), amount);
    }
}

impl AssetLedger for InMemoryAssetLedger {
    fn decimals(&self) -> u8 {
        self.decimals
    }

    fn balance_of(&self, holder: &Address) -> u64 {
        self.book.read().balance(holder)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> u64 {
        self.book.read().allowance(owner, spender)
    }

    fn transfer(
        &self,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<TransferReceipt, LedgerError> {
        self.book.write().move_balance(from, to, amount)?;
        Ok(TransferReceipt {
            from: from.clone(),
            to: to.clone(),
            amount,
            spender: None,
            allowance_spent: 0,
        })
    }

    fn transfer_from(
        &self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<TransferReceipt, LedgerError> {
        let mut book = self.book.write();
        let allowance = book.allowance(from, spender);
        if allowance < amount {
            return Err(LedgerError::InsufficientAllowance {
                owner: from.clone(),
                spender: spender.clone(),
                allowance,
                requested: amount,
            });
        }

        book.move_balance(from, to, amount)?;

        let allowance_spent = if allowance == UNLIMITED { 0 } else { amount };
        if allowance_spent > 0 {
            book.allowances
                .insert((from.clone(), spender.clone()), allowance - allowance_spent);
        }

        Ok(TransferReceipt {
            from: from.clone(),
            to: to.clone(),
            amount,
            spender: Some(spender.clone()),
            allowance_spent,
        })
    }

    fn revert(&self, receipt: &TransferReceipt) -> Result<(), LedgerError> {
        let mut book = self.book.write();
        book.move_balance(&receipt.to, &receipt.from, receipt.amount)?;

        if let Some(spender) = &receipt.spender {
            if receipt.allowance_spent > 0 {
                let key = (receipt.from.clone(), spender.clone());
                let restored = book
                    .allowances
                    .get(&key)
                    .copied()
                    .unwrap_or(0)
                    .saturating_add(receipt.allowance_spent);
                book.allowances.insert(key, restored);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
