//! # Ledger Collaborators
//!
//! The vault never stores value itself. It moves value through two
//! collaborators and only keeps the books straight between them:
//!
//! ```text
//! address.rs  — Address newtype + deterministic derivation
//! asset.rs    — AssetLedger trait (the underlying token) + in-memory ledger
//! shares.rs   — ShareLedger trait (the vault's own share token) + ShareBook
//! ```
//!
//! ## Design Principles
//!
//! 1. **All amounts are `u64` in smallest-unit denomination.** Decimals are
//!    metadata; the ledgers never divide.
//!
//! 2. **Checks before effects.** Every mutating call validates balances,
//!    allowances and overflow first, then writes. A returned error means
//!    nothing changed.
//!
//! 3. **Every asset movement is reversible by receipt.** A
//!    [`TransferReceipt`] carries enough information for the host ledger to
//!    undo the transfer exactly, which is how an aborted vault operation
//!    rolls back value it already moved.

pub mod address;
pub mod asset;
pub mod shares;

pub use address::Address;
pub use asset::{AssetLedger, InMemoryAssetLedger, LedgerError, TransferReceipt};
pub use shares::{ShareBook, ShareError, ShareLedger};
