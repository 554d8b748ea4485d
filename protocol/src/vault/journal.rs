//! # Operation Journal
//!
//! Every effect an operation applies is recorded here as it happens. If a
//! later step fails, the journal is unwound in reverse so the vault, the
//! share ledger and the asset ledger end up exactly where they started.

use tracing::debug;

use super::events::VaultEvent;
use crate::ledger::{Address, AssetLedger, ShareLedger, TransferReceipt};

/// A single applied effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JournalEntry {
    /// Share allowance consumed from `owner` by `spender`.
    AllowanceSpent {
        owner: Address,
        spender: Address,
        shares: u64,
    },
    /// Asset transfer on the underlying ledger.
    AssetTransfer(TransferReceipt),
    /// Shares created for `to`.
    Minted { to: Address, shares: u64 },
    /// Shares destroyed from `from`.
    Burned { from: Address, shares: u64 },
    /// One event appended to the vault's log.
    EventEmitted,
}

/// Undo log for one in-flight operation.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    /// Creates an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of effects recorded so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing has been applied yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn record(&mut self, entry: JournalEntry) {
        self.entries.push(entry);
    }

    /// Reverts every recorded effect, newest first.
    ///
    /// Keeps unwinding past a failed step so as much state as possible is
    /// restored; the failures are returned joined into one message.
    pub(crate) fn rollback<L: ShareLedger + ?Sized>(
        self,
        asset: &dyn AssetLedger,
        shares: &mut L,
        events: &mut Vec<VaultEvent>,
    ) -> Result<(), String> {
        let mut failures = Vec::new();

        for entry in self.entries.into_iter().rev() {
            debug!(?entry, "reverting journal entry");
            match entry {
                JournalEntry::AllowanceSpent {
                    owner,
                    spender,
                    shares: spent,
                } => shares.increase_allowance(&owner, &spender, spent),
                JournalEntry::AssetTransfer(receipt) => {
                    if let Err(e) = asset.revert(&receipt) {
                        failures.push(format!("asset transfer {} -> {}: {e}", receipt.from, receipt.to));
                    }
                }
                JournalEntry::Minted { to, shares: minted } => {
                    if let Err(e) = shares.burn(&to, minted) {
                        failures.push(format!("unmint from {to}: {e}"));
                    }
                }
                JournalEntry::Burned { from, shares: burned } => {
                    if let Err(e) = shares.mint(&from, burned) {
                        failures.push(format!("unburn to {from}: {e}"));
                    }
                }
                JournalEntry::EventEmitted => {
                    events.pop();
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures.join("; "))
        }
    }
}
