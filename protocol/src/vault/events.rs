//! Observable vault events and the operation vocabulary shared by logs,
//! errors and metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ledger::Address;

/// The four economic operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Assets in, shares derived (rounded down).
    Deposit,
    /// Shares requested, assets derived (rounded up).
    Mint,
    /// Assets out, shares derived (rounded up).
    Withdraw,
    /// Shares in, assets derived (rounded down).
    Redeem,
}

impl Operation {
    /// Lower-case label, stable across releases (used as a metrics label).
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Deposit => "deposit",
            Operation::Mint => "mint",
            Operation::Withdraw => "withdraw",
            Operation::Redeem => "redeem",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emitted exactly once per committed operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum VaultEvent {
    /// A deposit or mint committed.
    Deposit {
        /// Who paid the assets.
        caller: Address,
        /// Who received the shares.
        receiver: Address,
        /// Assets pulled into the vault.
        assets: u64,
        /// Shares minted.
        shares: u64,
        /// Commit time.
        timestamp: DateTime<Utc>,
    },
    /// A withdraw or redeem committed.
    Withdraw {
        /// Who initiated the operation.
        caller: Address,
        /// Who received the assets.
        receiver: Address,
        /// Whose shares were burned.
        owner: Address,
        /// Assets pushed out of the vault.
        assets: u64,
        /// Shares burned.
        shares: u64,
        /// Commit time.
        timestamp: DateTime<Utc>,
    },
}

impl VaultEvent {
    /// Assets moved by the operation.
    pub fn assets(&self) -> u64 {
        match self {
            VaultEvent::Deposit { assets, .. } | VaultEvent::Withdraw { assets, .. } => *assets,
        }
    }

    /// Shares minted or burned by the operation.
    pub fn shares(&self) -> u64 {
        match self {
            VaultEvent::Deposit { shares, .. } | VaultEvent::Withdraw { shares, .. } => *shares,
        }
    }
}
