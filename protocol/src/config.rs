//! # Vault Configuration & Constants
//!
//! Every magic number the accounting core relies on lives here, next to the
//! construction-time [`VaultConfig`]. Anything in this file is fixed for the
//! lifetime of a vault: share precision in particular can never change after
//! construction, because every outstanding share is priced against it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Version string reported by the simulator and embedded in snapshots.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Amount Limits
// ---------------------------------------------------------------------------

/// The largest representable amount. Used as the "unbounded" value for
/// `max_deposit` / `max_mint` and as the infinite allowance marker.
pub const UNLIMITED: u64 = u64::MAX;

/// Highest share precision we accept. 10^19 already exceeds `u64::MAX`, so
/// anything above 18 decimals can't represent even a single whole share.
pub const MAX_DECIMALS: u8 = 18;

/// Decimals assumed for an asset when the caller has no better information.
/// 6 matches the common fiat-backed stablecoins.
pub const DEFAULT_ASSET_DECIMALS: u8 = 6;

/// Denominator for basis-point ratios (reserve ratios, caps expressed in bps).
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Domain tag mixed into vault address derivation.
pub const VAULT_ADDRESS_DOMAIN: &str = "sharevault:vault";

// ---------------------------------------------------------------------------
// VaultConfig
// ---------------------------------------------------------------------------

/// Errors produced while validating a [`VaultConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The share token name is empty.
    #[error("vault name must not be empty")]
    EmptyName,

    /// The share token symbol is empty.
    #[error("vault symbol must not be empty")]
    EmptySymbol,

    /// Asset decimals plus offset exceed [`MAX_DECIMALS`].
    #[error("share decimals {decimals} exceed the maximum of {max}")]
    DecimalsTooLarge {
        /// The resulting share precision.
        decimals: u16,
        /// The configured maximum.
        max: u8,
    },
}

/// Construction-time parameters for a vault's share token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Human-readable share token name (e.g., "Vault USD Coin").
    pub name: String,
    /// Share token ticker (e.g., "vUSDC").
    pub symbol: String,
    /// Extra decimals on top of the asset's precision. Zero means shares use
    /// exactly the asset's precision.
    #[serde(default)]
    pub decimals_offset: u8,
}

impl VaultConfig {
    /// Creates a config with no decimals offset.
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals_offset: 0,
        }
    }

    /// Sets the decimals offset.
    pub fn with_decimals_offset(mut self, offset: u8) -> Self {
        self.decimals_offset = offset;
        self
    }

    /// Validates the config against the asset's precision and returns the
    /// resulting share decimals.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the name or symbol is blank, or the share
    /// precision would exceed [`MAX_DECIMALS`].
    pub fn share_decimals(&self, asset_decimals: u8) -> Result<u8, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::EmptySymbol);
        }

        let decimals = u16::from(asset_decimals) + u16::from(self.decimals_offset);
        if decimals > u16::from(MAX_DECIMALS) {
            return Err(ConfigError::DecimalsTooLarge {
                decimals,
                max: MAX_DECIMALS,
            });
        }
        Ok(decimals as u8)
    }
}
