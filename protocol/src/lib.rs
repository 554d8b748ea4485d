// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # ShareVault Protocol — Core Library
//!
//! The accounting core of a tokenized vault: depositors exchange an
//! underlying asset for proportional shares of a pool, and later redeem
//! those shares for their proportional cut of a pool that may have grown or
//! shrunk in the meantime.
//!
//! ## Architecture
//!
//! - **config** — Constants and the construction-time [`VaultConfig`].
//! - **math** — `mul_div` with explicit rounding. The only place we divide.
//! - **ledger** — The asset ledger and share ledger collaborators, with
//!   in-memory implementations.
//! - **vault** — Strategy and hook traits, the operation journal, and the
//!   [`Vault`] itself.
//!
//! ## Design Philosophy
//!
//! 1. Rounding always favours the vault. Free shares are a bug, not a feature.
//! 2. All-or-nothing operations. A failed deposit leaves no trace.
//! 3. All money is `u64`. Intermediates are `u128`. Nothing wraps.
//! 4. If it touches money, it has tests. Plural.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use sharevault_protocol::config::{VaultConfig, UNLIMITED};
//! use sharevault_protocol::ledger::{Address, InMemoryAssetLedger};
//! use sharevault_protocol::vault::{Vault, VaultStrategy};
//!
//! struct Idle;
//! impl VaultStrategy for Idle {}
//!
//! let usdc = Arc::new(InMemoryAssetLedger::new("USDC", 6));
//! let vault = Vault::new(VaultConfig::new("Vault USDC", "vUSDC"), usdc.clone(), Idle).unwrap();
//!
//! let alice = Address::from("alice");
//! usdc.mint(&alice, 1_000).unwrap();
//! usdc.approve(&alice, vault.address(), UNLIMITED);
//!
//! let shares = vault.deposit(&alice, 1_000, &alice).unwrap();
//! assert_eq!(shares, 1_000);
//! assert_eq!(vault.redeem(&alice, shares, &alice, &alice).unwrap(), 1_000);
//! ```

pub mod config;
pub mod ledger;
pub mod math;
pub mod vault;

pub use config::VaultConfig;
pub use ledger::{Address, AssetLedger, InMemoryAssetLedger, ShareBook, ShareLedger};
pub use vault::{Vault, VaultError, VaultEvent, VaultHooks, VaultStrategy};
