//! Integration tests for the capped strategy wrapper.
//!
//! Limits are enforced by the vault at execution time, so these tests drive
//! real deposits and mints into the caps and check that the rejected
//! operation leaves every balance untouched.

use std::sync::Arc;

use sharevault_contracts::{CappedStrategy, IdleStrategy, YieldStrategy};
use sharevault_protocol::config::{VaultConfig, UNLIMITED};
use sharevault_protocol::ledger::{Address, AssetLedger, InMemoryAssetLedger};
use sharevault_protocol::vault::{Operation, Vault, VaultError};

type Capped<S> = Vault<CappedStrategy<S>, CappedStrategy<S>>;

fn vault_with<S>(asset: &Arc<InMemoryAssetLedger>, strategy: CappedStrategy<S>) -> Capped<S>
where
    S: sharevault_protocol::vault::VaultStrategy + sharevault_protocol::vault::VaultHooks + Clone,
{
    Vault::with_hooks(
        VaultConfig::new("Capped USDC", "cUSDC"),
        asset.clone(),
        strategy.clone(),
        strategy,
    )
    .unwrap()
}

fn funded(asset: &InMemoryAssetLedger, vault: &Address, name: &str, amount: u64) -> Address {
    let who = Address::from(name);
    asset.mint(&who, amount).unwrap();
    asset.approve(&who, vault, UNLIMITED);
    who
}

// ---------------------------------------------------------------------------
// TVL Cap
// ---------------------------------------------------------------------------

#[test]
fn deposit_above_tvl_cap_rejected() {
    let asset = Arc::new(InMemoryAssetLedger::new("USDC", 6));
    let vault = vault_with(&asset, CappedStrategy::new(IdleStrategy, 5_000));
    let alice = funded(&asset, vault.address(), "alice", 10_000);

    vault.deposit(&alice, 4_000, &alice).unwrap();
    assert_eq!(vault.max_deposit(&alice), 1_000);

    let err = vault.deposit(&alice, 1_001, &alice).unwrap_err();
    assert!(matches!(
        err,
        VaultError::ExceedsMax {
            operation: Operation::Deposit,
            requested: 1_001,
            max: 1_000,
        }
    ));
    assert_eq!(asset.balance_of(&alice), 6_000);

    vault.deposit(&alice, 1_000, &alice).unwrap();
    assert_eq!(vault.max_deposit(&alice), 0);
    assert_eq!(vault.max_mint(&alice), 0);
}

#[test]
fn mint_respects_tvl_cap_in_shares() {
    let asset = Arc::new(InMemoryAssetLedger::new("USDC", 6));
    let vault = vault_with(&asset, CappedStrategy::new(IdleStrategy, 5_000));
    let alice = funded(&asset, vault.address(), "alice", 10_000);
    vault.deposit(&alice, 2_000, &alice).unwrap();
    // Price rises to 1.5 assets per share.
    asset.mint(vault.address(), 1_000).unwrap();

    let max = vault.max_mint(&alice);
    assert_eq!(max, 1_333);
    assert!(matches!(
        vault.mint(&alice, max + 1, &alice),
        Err(VaultError::ExceedsMax {
            operation: Operation::Mint,
            ..
        })
    ));

    let paid = vault.mint(&alice, max, &alice).unwrap();
    assert!(paid <= 2_000);
    assert!(vault.total_assets() <= 5_000);
}

// ---------------------------------------------------------------------------
// Per-Receiver Cap
// ---------------------------------------------------------------------------

#[test]
fn receiver_cap_tracks_net_deposits() {
    let asset = Arc::new(InMemoryAssetLedger::new("USDC", 6));
    let strategy = CappedStrategy::new(IdleStrategy, UNLIMITED).with_receiver_cap(1_000);
    let vault = vault_with(&asset, strategy.clone());
    let alice = funded(&asset, vault.address(), "alice", 5_000);
    let bob = funded(&asset, vault.address(), "bob", 5_000);

    vault.deposit(&alice, 800, &alice).unwrap();
    assert_eq!(strategy.deposited(&alice), 800);
    assert_eq!(vault.max_deposit(&alice), 200);
    assert_eq!(vault.max_deposit(&bob), 1_000);

    // Depositing for someone else counts against the receiver.
    assert!(vault.deposit(&bob, 300, &alice).is_err());
    vault.deposit(&bob, 200, &alice).unwrap();
    assert_eq!(vault.max_deposit(&alice), 0);

    // Withdrawing frees room again.
    vault.withdraw(&alice, 500, &alice, &alice).unwrap();
    assert_eq!(strategy.deposited(&alice), 500);
    assert_eq!(vault.max_deposit(&alice), 500);
}

#[test]
fn rejected_deposit_does_not_count() {
    let asset = Arc::new(InMemoryAssetLedger::new("USDC", 6));
    let strategy = CappedStrategy::new(IdleStrategy, UNLIMITED).with_receiver_cap(1_000);
    let vault = vault_with(&asset, strategy.clone());
    let alice = Address::from("alice");
    asset.mint(&alice, 500).unwrap();

    // No approval: the asset pull fails before the tracking hook runs.
    assert!(matches!(
        vault.deposit(&alice, 500, &alice),
        Err(VaultError::TransferFailure(_))
    ));
    assert_eq!(strategy.deposited(&alice), 0);
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

#[test]
fn caps_compose_with_yield_source() {
    let asset = Arc::new(InMemoryAssetLedger::new("USDC", 6));
    let source = Address::from("pool");
    let inner = YieldStrategy::new(source.clone(), 1_000).unwrap();
    let vault = vault_with(&asset, CappedStrategy::new(inner, 2_000));
    let alice = funded(&asset, vault.address(), "alice", 5_000);

    vault.deposit(&alice, 2_000, &alice).unwrap();

    // The inner hooks still deploy, and deployed assets count toward TVL.
    assert_eq!(asset.balance_of(&source), 1_800);
    assert_eq!(vault.total_assets(), 2_000);
    assert_eq!(vault.max_deposit(&alice), 0);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deposits_respect_receiver_cap() {
    let asset = Arc::new(InMemoryAssetLedger::new("USDC", 6));
    let strategy = CappedStrategy::new(IdleStrategy, UNLIMITED).with_receiver_cap(600);
    let vault = Arc::new(vault_with(&asset, strategy.clone()));
    let users: Vec<Address> = (0..8)
        .map(|i| funded(&asset, vault.address(), &format!("user-{i}"), 1_000))
        .collect();

    // Ten deposits of 100 each against a cap of 600: six land, four bounce.
    let handles: Vec<_> = users
        .iter()
        .cloned()
        .map(|user| {
            let vault = Arc::clone(&vault);
            tokio::task::spawn_blocking(move || {
                (0..10)
                    .filter(|_| match vault.deposit(&user, 100, &user) {
                        Ok(_) => true,
                        Err(VaultError::ExceedsMax { .. }) => false,
                        Err(other) => panic!("unexpected error: {other}"),
                    })
                    .count()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), 6);
    }

    for user in &users {
        assert_eq!(strategy.deposited(user), 600);
        assert_eq!(asset.balance_of(user), 400);
        assert_eq!(vault.max_deposit(user), 0);
    }
    assert_eq!(vault.total_assets(), 4_800);

    // Concurrent partial exits free the same room for everyone.
    let handles: Vec<_> = users
        .iter()
        .cloned()
        .map(|user| {
            let vault = Arc::clone(&vault);
            tokio::task::spawn_blocking(move || vault.withdraw(&user, 250, &user, &user))
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 250);
    }

    for user in &users {
        assert_eq!(strategy.deposited(user), 350);
        assert_eq!(vault.max_deposit(user), 250);
    }
    assert_eq!(vault.total_assets(), 2_800);
}
