// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # ShareVault Strategies
//!
//! Concrete [`VaultStrategy`](sharevault_protocol::vault::VaultStrategy)
//! implementations for the ShareVault accounting core. The core only knows
//! how to convert between assets and shares; these decide what the pool is
//! worth, where idle funds go, and who may deposit how much:
//!
//! - **Idle** — assets sit in the vault. The standard proportional vault.
//! - **Yield Source** — keeps a reserve in the vault and deploys the rest to
//!   an external account, recalling it on withdrawal.
//! - **Capped** — wraps any strategy with a TVL cap and a per-receiver
//!   deposit cap.
//! - **Offset** — virtual shares and assets that make first-depositor
//!   inflation attacks unprofitable.
//!
//! ## Design Principles
//!
//! 1. A strategy that moves funds does it through `HookContext::transfer`,
//!    never behind the vault's back, so a failed operation undoes it.
//! 2. Limits are expressed in assets and derived for shares, always rounding
//!    so that `max_mint` never costs more than `max_deposit` allows.
//! 3. Every strategy is `Clone`: one copy prices the vault, another serves
//!    as its hooks, and they share whatever state they need.

use thiserror::Error;

pub mod capped;
pub mod idle;
pub mod offset;
pub mod yield_source;

pub use capped::CappedStrategy;
pub use idle::IdleStrategy;
pub use offset::OffsetStrategy;
pub use yield_source::YieldStrategy;

/// Errors raised while constructing a strategy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    /// A reserve ratio above 100%.
    #[error("reserve ratio of {bps} bps exceeds 10000")]
    ReserveOutOfRange {
        /// The requested ratio.
        bps: u64,
    },

    /// A decimals offset whose virtual share count does not fit in `u64`.
    #[error("decimals offset {offset} is too large (max {max})")]
    OffsetTooLarge {
        /// The requested offset.
        offset: u8,
        /// The largest accepted offset.
        max: u8,
    },

    /// The yield source is the vault itself.
    #[error("yield source must differ from the vault")]
    SourceIsVault,
}
