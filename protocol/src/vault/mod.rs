//! # Vault Module — Share Accounting
//!
//! The vault is where pooled assets turn into proportional claims. Depositors
//! hand over the underlying asset and receive shares; redeemers hand shares
//! back and receive their cut of whatever the pool is worth by then.
//!
//! ## Architecture
//!
//! ```text
//! strategy.rs    — VaultStrategy: total assets, conversions, limits
//! hooks.rs       — VaultHooks + HookContext: before/after extension points
//! events.rs      — Operation vocabulary and the Deposit / Withdraw events
//! journal.rs     — undo log that makes every operation all-or-nothing
//! error.rs       — VaultError
//! accounting.rs  — Vault: the four operations, previews and limits
//! ```
//!
//! ## Design Principles
//!
//! 1. **Round against the caller.** Every derived amount rounds in the
//!    direction that protects the remaining depositors. No sequence of
//!    operations can extract value through rounding.
//!
//! 2. **Previews are the operations.** `preview_*` and the operation itself
//!    call the same strategy function on the same pool snapshot, so they
//!    always agree.
//!
//! 3. **One lock per vault, held for the whole operation.** Hooks, ledger
//!    calls and event emission all happen inside it.
//!
//! 4. **Caller identity is explicit.** There is no ambient sender; every
//!    operation takes the caller's [`Address`](crate::ledger::Address).

pub mod accounting;
pub mod error;
pub mod events;
pub mod hooks;
pub mod journal;
pub mod strategy;

pub use accounting::{ShareMetadata, Vault, VaultSnapshot};
pub use error::VaultError;
pub use events::{Operation, VaultEvent};
pub use hooks::{HookContext, HookError, HookPoint, NoHooks, VaultHooks};
pub use journal::Journal;
pub use strategy::{PoolState, StrategyContext, VaultStrategy};
