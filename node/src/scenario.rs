//! # Scenario Runner
//!
//! A scenario is a JSON document describing one vault, the accounts that
//! interact with it, and an ordered list of steps:
//!
//! ```json
//! {
//!   "vault":    { "name": "Vault USDC", "symbol": "vUSDC" },
//!   "asset":    { "symbol": "USDC", "decimals": 6 },
//!   "strategy": { "kind": "yield", "source": "pool", "reserve_bps": 2000 },
//!   "caps":     { "tvl": 1000000 },
//!   "accounts": { "alice": 1000, "bob": 500 },
//!   "steps": [
//!     { "op": "deposit", "caller": "alice", "assets": 1000 },
//!     { "op": "yield", "assets": 300, "to": "pool" },
//!     { "op": "concurrent", "steps": [
//!         { "op": "redeem", "caller": "alice", "shares": 100 },
//!         { "op": "deposit", "caller": "bob", "assets": 500 }
//!     ] }
//!   ]
//! }
//! ```
//!
//! Steps run in order against an in-memory asset ledger. The steps of a
//! `concurrent` batch run on blocking tasks at the same time, contending for
//! the vault lock like independent callers would. A failed step is recorded
//! in the report and, unless `halt_on_error` is set, the run continues.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use sharevault_contracts::{
    CappedStrategy, IdleStrategy, OffsetStrategy, StrategyError, YieldStrategy,
};
use sharevault_protocol::config::{
    VaultConfig, DEFAULT_ASSET_DECIMALS, PROTOCOL_VERSION, UNLIMITED,
};
use sharevault_protocol::ledger::{Address, AssetLedger, InMemoryAssetLedger, LedgerError};
use sharevault_protocol::math::MathError;
use sharevault_protocol::vault::{
    HookContext, HookError, PoolState, ShareMetadata, StrategyContext, Vault, VaultError,
    VaultEvent, VaultHooks, VaultSnapshot, VaultStrategy,
};

use crate::metrics::SimMetrics;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that prevent a scenario from being loaded or run.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The scenario file could not be read.
    #[error("failed to read scenario {path}: {source}")]
    Io {
        /// The path that was read.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The scenario is not valid JSON or does not match the schema.
    #[error("invalid scenario: {0}")]
    Parse(#[from] serde_json::Error),

    /// The strategy parameters are out of range.
    #[error("invalid strategy: {0}")]
    Strategy(#[from] StrategyError),

    /// The vault could not be constructed.
    #[error("vault construction failed: {0}")]
    Vault(#[from] VaultError),

    /// An initial balance could not be minted.
    #[error("failed to fund {account}: {source}")]
    Funding {
        /// The account being funded.
        account: Address,
        /// What the ledger reported.
        #[source]
        source: LedgerError,
    },

    /// A task of a concurrent batch panicked or was cancelled.
    #[error("concurrent batch task failed: {0}")]
    Join(String),

    /// Metrics could not be encoded.
    #[error("metrics encoding failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Why a single step failed. Recorded in the report, never fatal.
#[derive(Debug, Error)]
pub enum StepError {
    /// The vault rejected the operation.
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// The asset ledger rejected a market move or approval.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A `concurrent` step inside another `concurrent` step.
    #[error("concurrent batches cannot be nested")]
    NestedBatch,
}

// ---------------------------------------------------------------------------
// Scenario Model
// ---------------------------------------------------------------------------

/// A complete scenario document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Share token configuration.
    pub vault: VaultConfig,
    /// The underlying asset.
    #[serde(default)]
    pub asset: AssetSpec,
    /// How the vault values and deploys its assets.
    #[serde(default)]
    pub strategy: StrategySpec,
    /// Deposit limits.
    #[serde(default)]
    pub caps: CapSpec,
    /// Initial asset balances.
    #[serde(default)]
    pub accounts: BTreeMap<Address, u64>,
    /// Whether funded accounts start with an unlimited asset allowance to
    /// the vault.
    #[serde(default = "default_true")]
    pub approve_vault: bool,
    /// Stop at the first failed step.
    #[serde(default)]
    pub halt_on_error: bool,
    /// What happens, in order.
    pub steps: Vec<Step>,
}

fn default_true() -> bool {
    true
}

impl Scenario {
    /// Parses a scenario from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a scenario file.
    pub fn from_path(path: &Path) -> Result<Self, ScenarioError> {
        let json = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Number of steps, counting each step of a batch.
    pub fn step_count(&self) -> usize {
        self.steps
            .iter()
            .map(|step| match step {
                Step::Concurrent { steps } => steps.len(),
                _ => 1,
            })
            .sum()
    }
}

/// The underlying asset of a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetSpec {
    /// Ticker symbol.
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Precision.
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

fn default_symbol() -> String {
    "USDC".to_string()
}

fn default_decimals() -> u8 {
    DEFAULT_ASSET_DECIMALS
}

impl Default for AssetSpec {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            decimals: default_decimals(),
        }
    }
}

/// Strategy selection and parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategySpec {
    /// Assets stay in the vault.
    #[default]
    Idle,
    /// Deploy above a reserve to `source`.
    Yield {
        /// The yield source account.
        source: Address,
        /// Reserve kept idle, in basis points.
        reserve_bps: u64,
    },
    /// Virtual shares and assets.
    Offset {
        /// Decimals offset; `10^offset` virtual shares.
        offset: u8,
    },
}

/// Deposit limits. Absent means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapSpec {
    /// Cap on total assets.
    #[serde(default)]
    pub tvl: Option<u64>,
    /// Cap on each receiver's net deposits.
    #[serde(default)]
    pub per_receiver: Option<u64>,
}

/// One scenario step. Receivers and owners default to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// `Vault::deposit`.
    Deposit {
        caller: Address,
        assets: u64,
        #[serde(default)]
        receiver: Option<Address>,
    },
    /// `Vault::mint`.
    Mint {
        caller: Address,
        shares: u64,
        #[serde(default)]
        receiver: Option<Address>,
    },
    /// `Vault::withdraw`.
    Withdraw {
        caller: Address,
        assets: u64,
        #[serde(default)]
        receiver: Option<Address>,
        #[serde(default)]
        owner: Option<Address>,
    },
    /// `Vault::redeem`.
    Redeem {
        caller: Address,
        shares: u64,
        #[serde(default)]
        receiver: Option<Address>,
        #[serde(default)]
        owner: Option<Address>,
    },
    /// Share allowance from `owner` to `spender`.
    Approve {
        owner: Address,
        spender: Address,
        shares: u64,
    },
    /// Asset allowance from `owner` to the vault. Unlimited if omitted.
    ApproveAsset {
        owner: Address,
        #[serde(default)]
        amount: Option<u64>,
    },
    /// Share transfer between holders.
    TransferShares {
        from: Address,
        to: Address,
        shares: u64,
    },
    /// New assets appear in `to` (the vault by default).
    Yield {
        assets: u64,
        #[serde(default)]
        to: Option<Address>,
    },
    /// Assets disappear from `from` (the vault by default).
    Loss {
        assets: u64,
        #[serde(default)]
        from: Option<Address>,
    },
    /// Steps run at the same time.
    Concurrent { steps: Vec<Step> },
}

impl Step {
    /// Stable label used in reports and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Step::Deposit { .. } => "deposit",
            Step::Mint { .. } => "mint",
            Step::Withdraw { .. } => "withdraw",
            Step::Redeem { .. } => "redeem",
            Step::Approve { .. } => "approve",
            Step::ApproveAsset { .. } => "approve_asset",
            Step::TransferShares { .. } => "transfer_shares",
            Step::Yield { .. } => "yield",
            Step::Loss { .. } => "loss",
            Step::Concurrent { .. } => "concurrent",
        }
    }
}

// ---------------------------------------------------------------------------
// Strategy Selection
// ---------------------------------------------------------------------------

/// The strategy chosen by a scenario.
#[derive(Debug, Clone)]
pub enum SimStrategy {
    /// See [`IdleStrategy`].
    Idle(IdleStrategy),
    /// See [`YieldStrategy`].
    Yield(YieldStrategy),
    /// See [`OffsetStrategy`].
    Offset(OffsetStrategy),
}

impl SimStrategy {
    /// Builds the strategy `spec` selects.
    pub fn from_spec(spec: &StrategySpec) -> Result<Self, StrategyError> {
        Ok(match spec {
            StrategySpec::Idle => SimStrategy::Idle(IdleStrategy),
            StrategySpec::Yield {
                source,
                reserve_bps,
            } => SimStrategy::Yield(YieldStrategy::new(source.clone(), *reserve_bps)?),
            StrategySpec::Offset { offset } => SimStrategy::Offset(OffsetStrategy::new(*offset)?),
        })
    }

    fn strategy(&self) -> &dyn VaultStrategy {
        match self {
            SimStrategy::Idle(s) => s,
            SimStrategy::Yield(s) => s,
            SimStrategy::Offset(s) => s,
        }
    }

    fn hooks(&self) -> &dyn VaultHooks {
        match self {
            SimStrategy::Idle(s) => s,
            SimStrategy::Yield(s) => s,
            SimStrategy::Offset(s) => s,
        }
    }
}

impl VaultStrategy for SimStrategy {
    fn total_assets(&self, ctx: &StrategyContext<'_>) -> u64 {
        self.strategy().total_assets(ctx)
    }

    fn decimals_offset(&self) -> Option<u8> {
        self.strategy().decimals_offset()
    }

    fn convert_to_shares(&self, pool: PoolState, assets: u64) -> Result<u64, MathError> {
        self.strategy().convert_to_shares(pool, assets)
    }

    fn convert_to_assets(&self, pool: PoolState, shares: u64) -> Result<u64, MathError> {
        self.strategy().convert_to_assets(pool, shares)
    }

    fn preview_mint(&self, pool: PoolState, shares: u64) -> Result<u64, MathError> {
        self.strategy().preview_mint(pool, shares)
    }

    fn preview_withdraw(&self, pool: PoolState, assets: u64) -> Result<u64, MathError> {
        self.strategy().preview_withdraw(pool, assets)
    }

    fn max_deposit(&self, pool: PoolState, receiver: &Address) -> u64 {
        self.strategy().max_deposit(pool, receiver)
    }

    fn max_mint(&self, pool: PoolState, receiver: &Address) -> u64 {
        self.strategy().max_mint(pool, receiver)
    }
}

impl VaultHooks for SimStrategy {
    fn before_deposit(&self, ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        self.hooks().before_deposit(ctx)
    }

    fn after_deposit(&self, ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        self.hooks().after_deposit(ctx)
    }

    fn before_withdraw(&self, ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        self.hooks().before_withdraw(ctx)
    }

    fn after_withdraw(&self, ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        self.hooks().after_withdraw(ctx)
    }
}

/// The vault type every scenario runs against. Caps default to unlimited.
pub type SimVault = Vault<CappedStrategy<SimStrategy>, CappedStrategy<SimStrategy>>;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// What happened at one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    /// Position in the scenario's step list.
    pub index: usize,
    /// Position inside a concurrent batch, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_index: Option<usize>,
    /// The step's label.
    pub op: &'static str,
    /// Whether the step succeeded.
    pub ok: bool,
    /// Shares minted or burned, or assets paid or received, for the four
    /// vault operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    /// Why the step failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The result of a full run.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    /// Protocol version that produced the report.
    pub protocol_version: &'static str,
    /// The strategy the vault ran with.
    pub strategy: StrategySpec,
    /// Final state of the vault's books.
    pub vault: VaultSnapshot,
    /// Final asset balances of every account the scenario touched.
    pub asset_balances: BTreeMap<Address, u64>,
    /// One entry per executed step.
    pub steps: Vec<StepOutcome>,
    /// Steps that succeeded.
    pub committed: usize,
    /// Steps that failed.
    pub failed: usize,
    /// `true` if `halt_on_error` cut the run short.
    pub halted: bool,
    /// Every committed vault event, in commit order.
    pub events: Vec<VaultEvent>,
    /// Prometheus text exposition, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<String>,
}

/// What `inspect` prints: the vault a scenario would build.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioSummary {
    /// The vault's derived address.
    pub address: Address,
    /// Share token metadata.
    pub metadata: ShareMetadata,
    /// The strategy.
    pub strategy: StrategySpec,
    /// The deposit limits.
    pub caps: CapSpec,
    /// Funded accounts.
    pub accounts: usize,
    /// Steps, counting each step of a batch.
    pub steps: usize,
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// A vault plus its asset ledger, ready to replay steps.
pub struct Simulator {
    asset: Arc<InMemoryAssetLedger>,
    vault: Arc<SimVault>,
    strategy: StrategySpec,
    caps: CapSpec,
    accounts: Vec<Address>,
    metrics: Option<SimMetrics>,
}

impl Simulator {
    /// Builds the vault and funds the accounts a scenario describes.
    pub fn new(scenario: &Scenario) -> Result<Self, ScenarioError> {
        let asset = Arc::new(InMemoryAssetLedger::new(
            scenario.asset.symbol.clone(),
            scenario.asset.decimals,
        ));
        let strategy = CappedStrategy::new(
            SimStrategy::from_spec(&scenario.strategy)?,
            scenario.caps.tvl.unwrap_or(UNLIMITED),
        )
        .with_receiver_cap(scenario.caps.per_receiver.unwrap_or(UNLIMITED));
        let vault = Vault::with_hooks(
            scenario.vault.clone(),
            asset.clone(),
            strategy.clone(),
            strategy,
        )?;

        for (account, &balance) in &scenario.accounts {
            asset
                .mint(account, balance)
                .map_err(|source| ScenarioError::Funding {
                    account: account.clone(),
                    source,
                })?;
            if scenario.approve_vault {
                asset.approve(account, vault.address(), UNLIMITED);
            }
        }

        info!(
            vault = %vault.address(),
            strategy = ?scenario.strategy,
            accounts = scenario.accounts.len(),
            "simulator ready"
        );

        Ok(Self {
            asset,
            vault: Arc::new(vault),
            strategy: scenario.strategy.clone(),
            caps: scenario.caps.clone(),
            accounts: scenario.accounts.keys().cloned().collect(),
            metrics: None,
        })
    }

    /// Records every step in `metrics`.
    pub fn with_metrics(mut self, metrics: SimMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Describes the vault without running anything.
    pub fn summary(&self, scenario: &Scenario) -> ScenarioSummary {
        ScenarioSummary {
            address: self.vault.address().clone(),
            metadata: self.vault.metadata().clone(),
            strategy: self.strategy.clone(),
            caps: self.caps.clone(),
            accounts: self.accounts.len(),
            steps: scenario.step_count(),
        }
    }

    /// Replays `steps` and reports the outcome.
    pub async fn run(
        &self,
        steps: &[Step],
        halt_on_error: bool,
    ) -> Result<ScenarioReport, ScenarioError> {
        let mut outcomes = Vec::with_capacity(steps.len());
        let mut touched = self.accounts.clone();
        let mut halted = false;

        for (index, step) in steps.iter().enumerate() {
            collect_accounts(step, &mut touched);

            let batch = match step {
                Step::Concurrent { steps } => self.run_batch(index, steps).await?,
                single => vec![run_step(
                    &self.vault,
                    &self.asset,
                    self.metrics.as_ref(),
                    index,
                    None,
                    single,
                )],
            };

            let failed = batch.iter().any(|outcome| !outcome.ok);
            outcomes.extend(batch);
            if failed && halt_on_error {
                warn!(index, "halting scenario after failed step");
                halted = true;
                break;
            }
        }

        let snapshot = self.vault.snapshot();
        if let Some(metrics) = &self.metrics {
            metrics.set_pool(snapshot.pool.total_assets, snapshot.pool.total_supply);
        }
        let metrics = self.metrics.as_ref().map(SimMetrics::encode).transpose()?;

        touched.sort();
        touched.dedup();
        let asset_balances = touched
            .into_iter()
            .map(|account| {
                let balance = self.asset.balance_of(&account);
                (account, balance)
            })
            .collect();

        let committed = outcomes.iter().filter(|outcome| outcome.ok).count();
        let failed = outcomes.len() - committed;
        info!(
            committed,
            failed,
            total_assets = snapshot.pool.total_assets,
            total_supply = snapshot.pool.total_supply,
            "scenario finished"
        );

        Ok(ScenarioReport {
            protocol_version: PROTOCOL_VERSION,
            strategy: self.strategy.clone(),
            vault: snapshot,
            asset_balances,
            steps: outcomes,
            committed,
            failed,
            halted,
            events: self.vault.events(),
            metrics,
        })
    }

    /// Runs every step of a batch on its own blocking task.
    async fn run_batch(
        &self,
        index: usize,
        steps: &[Step],
    ) -> Result<Vec<StepOutcome>, ScenarioError> {
        debug!(index, size = steps.len(), "running concurrent batch");

        let handles: Vec<_> = steps
            .iter()
            .cloned()
            .enumerate()
            .map(|(batch_index, step)| {
                let vault = Arc::clone(&self.vault);
                let asset = Arc::clone(&self.asset);
                let metrics = self.metrics.clone();
                tokio::task::spawn_blocking(move || {
                    run_step(
                        &vault,
                        &asset,
                        metrics.as_ref(),
                        index,
                        Some(batch_index),
                        &step,
                    )
                })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            outcomes.push(
                handle
                    .await
                    .map_err(|e| ScenarioError::Join(e.to_string()))?,
            );
        }
        Ok(outcomes)
    }
}

/// Executes one step and records it.
fn run_step(
    vault: &SimVault,
    asset: &InMemoryAssetLedger,
    metrics: Option<&SimMetrics>,
    index: usize,
    batch_index: Option<usize>,
    step: &Step,
) -> StepOutcome {
    let started = Instant::now();
    let result = execute(vault, asset, step);
    let elapsed = started.elapsed().as_secs_f64();

    if let Some(metrics) = metrics {
        metrics.record_step(step.label(), result.is_ok(), elapsed);
    }

    match result {
        Ok(amount) => {
            debug!(index, ?batch_index, op = step.label(), ?amount, "step ok");
            StepOutcome {
                index,
                batch_index,
                op: step.label(),
                ok: true,
                amount,
                error: None,
            }
        }
        Err(e) => {
            warn!(index, ?batch_index, op = step.label(), error = %e, "step failed");
            StepOutcome {
                index,
                batch_index,
                op: step.label(),
                ok: false,
                amount: None,
                error: Some(e.to_string()),
            }
        }
    }
}

fn execute(
    vault: &SimVault,
    asset: &InMemoryAssetLedger,
    step: &Step,
) -> Result<Option<u64>, StepError> {
    match step {
        Step::Deposit {
            caller,
            assets,
            receiver,
        } => Ok(Some(vault.deposit(
            caller,
            *assets,
            receiver.as_ref().unwrap_or(caller),
        )?)),
        Step::Mint {
            caller,
            shares,
            receiver,
        } => Ok(Some(vault.mint(
            caller,
            *shares,
            receiver.as_ref().unwrap_or(caller),
        )?)),
        Step::Withdraw {
            caller,
            assets,
            receiver,
            owner,
        } => Ok(Some(vault.withdraw(
            caller,
            *assets,
            receiver.as_ref().unwrap_or(caller),
            owner.as_ref().unwrap_or(caller),
        )?)),
        Step::Redeem {
            caller,
            shares,
            receiver,
            owner,
        } => Ok(Some(vault.redeem(
            caller,
            *shares,
            receiver.as_ref().unwrap_or(caller),
            owner.as_ref().unwrap_or(caller),
        )?)),
        Step::Approve {
            owner,
            spender,
            shares,
        } => {
            vault.approve(owner, spender, *shares);
            Ok(None)
        }
        Step::ApproveAsset { owner, amount } => {
            asset.approve(owner, vault.address(), amount.unwrap_or(UNLIMITED));
            Ok(None)
        }
        Step::TransferShares { from, to, shares } => {
            vault.transfer_shares(from, to, *shares)?;
            Ok(None)
        }
        Step::Yield { assets, to } => {
            asset.mint(to.as_ref().unwrap_or(vault.address()), *assets)?;
            Ok(None)
        }
        Step::Loss { assets, from } => {
            asset.burn(from.as_ref().unwrap_or(vault.address()), *assets)?;
            Ok(None)
        }
        Step::Concurrent { .. } => Err(StepError::NestedBatch),
    }
}

/// Adds every account a step names to `out`.
fn collect_accounts(step: &Step, out: &mut Vec<Address>) {
    let named: Vec<&Address> = match step {
        Step::Deposit {
            caller, receiver, ..
        }
        | Step::Mint {
            caller, receiver, ..
        } => std::iter::once(caller).chain(receiver).collect(),
        Step::Withdraw {
            caller,
            receiver,
            owner,
            ..
        }
        | Step::Redeem {
            caller,
            receiver,
            owner,
            ..
        } => std::iter::once(caller).chain(receiver).chain(owner).collect(),
        Step::Approve { owner, spender, .. } => vec![owner, spender],
        Step::ApproveAsset { owner, .. } => vec![owner],
        Step::TransferShares { from, to, .. } => vec![from, to],
        Step::Yield { to, .. } => to.iter().collect(),
        Step::Loss { from, .. } => from.iter().collect(),
        Step::Concurrent { steps } => {
            for inner in steps {
                collect_accounts(inner, out);
            }
            return;
        }
    };
    out.extend(named.into_iter().cloned());
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
