//! Vault operation errors.
//!
//! Every failure is fail-fast: the operation is rolled back before the error
//! reaches the caller, and each precondition has its own variant.

use thiserror::Error;

use super::events::Operation;
use super::hooks::{HookError, HookPoint};
use crate::config::ConfigError;
use crate::ledger::{Address, LedgerError, ShareError};
use crate::math::MathError;

/// Errors returned by vault construction and operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// A deposit would mint zero shares after rounding.
    #[error("deposit of {assets} assets would mint zero shares")]
    ZeroShares {
        /// The assets offered.
        assets: u64,
    },

    /// A redeem would return zero assets after rounding.
    #[error("redeem of {shares} shares would return zero assets")]
    ZeroAssets {
        /// The shares offered.
        shares: u64,
    },

    /// A third-party caller's share allowance does not cover the operation.
    #[error("insufficient allowance: {spender} may spend {allowance} shares of {owner}, needs {required}")]
    InsufficientAllowance {
        /// Share owner.
        owner: Address,
        /// The caller acting on the owner's behalf.
        spender: Address,
        /// Remaining allowance.
        allowance: u64,
        /// Shares the operation needs.
        required: u64,
    },

    /// The owner holds fewer shares than the operation burns or moves.
    #[error("insufficient shares: {holder} holds {balance}, needs {required}")]
    InsufficientShares {
        /// Share holder.
        holder: Address,
        /// Current balance.
        balance: u64,
        /// Shares required.
        required: u64,
    },

    /// The asset ledger rejected a pull or push of funds.
    #[error("asset transfer failed: {0}")]
    TransferFailure(#[source] LedgerError),

    /// The requested amount is above the operation's current limit.
    #[error("{operation} of {requested} exceeds the current maximum of {max}")]
    ExceedsMax {
        /// The operation being limited.
        operation: Operation,
        /// The amount requested.
        requested: u64,
        /// The limit at execution time.
        max: u64,
    },

    /// A hook aborted the operation.
    #[error("{point} hook failed: {source}")]
    Hook {
        /// Which hook failed.
        point: HookPoint,
        /// What it reported.
        #[source]
        source: HookError,
    },

    /// Conversion arithmetic failed.
    #[error("conversion error: {0}")]
    Math(#[from] MathError),

    /// Share supply would overflow.
    #[error("share ledger error: {0}")]
    Shares(#[source] ShareError),

    /// The vault configuration is invalid.
    #[error("invalid vault config: {0}")]
    Config(#[from] ConfigError),

    /// An operation failed and undoing its effects failed too. Ledger state
    /// may be inconsistent. Only reachable when something outside the vault
    /// moves funds the operation paid out before it is unwound (see
    /// [`AssetLedger::revert`](crate::ledger::AssetLedger::revert)).
    #[error("rollback after `{cause}` failed: {reason}")]
    RollbackFailed {
        /// The error that triggered the rollback.
        cause: Box<VaultError>,
        /// Which undo steps failed.
        reason: String,
    },
}

impl From<ShareError> for VaultError {
    fn from(err: ShareError) -> Self {
        match err {
            ShareError::InsufficientBalance {
                holder,
                balance,
                requested,
            } => VaultError::InsufficientShares {
                holder,
                balance,
                required: requested,
            },
            ShareError::InsufficientAllowance {
                owner,
                spender,
                allowance,
                requested,
            } => VaultError::InsufficientAllowance {
                owner,
                spender,
                allowance,
                required: requested,
            },
            other @ ShareError::SupplyOverflow { .. } => VaultError::Shares(other),
        }
    }
}
