//! The idle strategy: assets stay in the vault, conversions are the
//! standard proportional ones, and there are no limits.

use serde::{Deserialize, Serialize};
use sharevault_protocol::vault::{VaultHooks, VaultStrategy};

/// Keeps every asset in the vault's own account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleStrategy;

impl VaultStrategy for IdleStrategy {}

impl VaultHooks for IdleStrategy {}
