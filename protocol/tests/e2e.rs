//! End-to-end integration tests for the ShareVault protocol.
//!
//! These tests drive a vault through whole lifecycles against the in-memory
//! asset ledger: deposits at par, yield accruing to existing holders, losses,
//! third-party withdrawals, and many threads hammering the same vault. They
//! check the properties that keep depositors whole: previews match
//! operations, rounding never pays out more than was paid in, and the books
//! always balance.

use std::sync::Arc;

use sharevault_protocol::config::{VaultConfig, UNLIMITED};
use sharevault_protocol::ledger::{Address, AssetLedger, InMemoryAssetLedger};
use sharevault_protocol::math::MathError;
use sharevault_protocol::vault::{PoolState, Vault, VaultError, VaultEvent, VaultStrategy};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

struct Idle;
impl VaultStrategy for Idle {}

fn setup() -> (Arc<InMemoryAssetLedger>, Arc<Vault<Idle>>) {
    let asset = Arc::new(InMemoryAssetLedger::new("USDC", 6));
    let vault = Vault::new(VaultConfig::new("Vault USDC", "vUSDC"), asset.clone(), Idle)
        .expect("vault construction");
    (asset, Arc::new(vault))
}

/// Mints `amount` to a fresh account and approves the vault for all of it.
fn funded(asset: &InMemoryAssetLedger, vault: &Vault<Idle>, name: &str, amount: u64) -> Address {
    let who = Address::from(name);
    asset.mint(&who, amount).unwrap();
    asset.approve(&who, vault.address(), UNLIMITED);
    who
}

// ---------------------------------------------------------------------------
// 1. Lifecycle with Yield
// ---------------------------------------------------------------------------

#[test]
fn yield_accrues_to_existing_holders() {
    let (asset, vault) = setup();
    let alice = funded(&asset, &vault, "alice", 1_000);
    let bob = funded(&asset, &vault, "bob", 500);

    // Empty pool: 1:1.
    assert_eq!(vault.deposit(&alice, 1_000, &alice).unwrap(), 1_000);
    assert_eq!(vault.pool_state(), PoolState::new(1_000, 1_000));

    // Same price for the second depositor.
    assert_eq!(vault.deposit(&bob, 500, &bob).unwrap(), 500);
    assert_eq!(vault.pool_state(), PoolState::new(1_500, 1_500));

    // 300 of yield lands directly in the vault.
    asset.mint(vault.address(), 300).unwrap();
    assert_eq!(vault.total_assets(), 1_800);

    // Each share is now worth 1.2 assets.
    assert_eq!(vault.preview_redeem(500).unwrap(), 600);
    assert_eq!(vault.redeem(&bob, 500, &bob, &bob).unwrap(), 600);
    assert_eq!(asset.balance_of(&bob), 600);
    assert_eq!(vault.pool_state(), PoolState::new(1_200, 1_000));

    // Alice keeps her full share of the gain.
    assert_eq!(vault.max_withdraw(&alice).unwrap(), 1_200);
    assert_eq!(vault.redeem(&alice, 1_000, &alice, &alice).unwrap(), 1_200);
    assert_eq!(vault.pool_state(), PoolState::new(0, 0));
}

// ---------------------------------------------------------------------------
// 2. Losses are Shared Pro Rata
// ---------------------------------------------------------------------------

#[test]
fn losses_are_shared_pro_rata() {
    let (asset, vault) = setup();
    let alice = funded(&asset, &vault, "alice", 3_000);
    let bob = funded(&asset, &vault, "bob", 1_000);

    vault.deposit(&alice, 3_000, &alice).unwrap();
    vault.deposit(&bob, 1_000, &bob).unwrap();

    // Half of the pool is lost.
    asset.burn(vault.address(), 2_000).unwrap();

    assert_eq!(vault.max_withdraw(&alice).unwrap(), 1_500);
    assert_eq!(vault.max_withdraw(&bob).unwrap(), 500);

    // New depositors buy in at the lower price.
    let carol = funded(&asset, &vault, "carol", 100);
    assert_eq!(vault.deposit(&carol, 100, &carol).unwrap(), 200);
}

// ---------------------------------------------------------------------------
// 3. Rounding Never Favours the Caller
// ---------------------------------------------------------------------------

#[test]
fn deposit_then_redeem_never_returns_more() {
    let (asset, vault) = setup();
    let whale = funded(&asset, &vault, "whale", 1_000_003);
    vault.deposit(&whale, 1_000_003, &whale).unwrap();
    // An awkward price: 1_000_003 shares backed by 1_333_337 assets.
    asset.mint(vault.address(), 333_334).unwrap();

    for amount in [1u64, 2, 3, 7, 10, 99, 101, 997, 12_345] {
        let name = format!("user-{amount}");
        let user = funded(&asset, &vault, &name, amount);
        let before = asset.balance_of(&user);

        let Ok(shares) = vault.deposit(&user, amount, &user) else {
            continue;
        };
        let back = vault.redeem(&user, shares, &user, &user).unwrap();

        assert!(back <= amount, "deposited {amount}, got back {back}");
        assert!(asset.balance_of(&user) <= before);
    }
}

#[test]
fn deposit_then_withdraw_same_assets_never_profits() {
    let (asset, vault) = setup();
    let whale = funded(&asset, &vault, "whale", 1_000);
    vault.deposit(&whale, 1_000, &whale).unwrap();
    // 1000 shares backed by 1333 assets.
    asset.mint(vault.address(), 333).unwrap();

    for amount in [1u64, 2, 3, 10, 77, 500] {
        let name = format!("saver-{amount}");
        let user = funded(&asset, &vault, &name, amount);

        let Ok(shares) = vault.deposit(&user, amount, &user) else {
            continue;
        };
        // Withdrawing the full nominal amount either fails or burns every
        // share the deposit bought, and never pays out more than came in.
        match vault.withdraw(&user, amount, &user, &user) {
            Ok(burned) => {
                assert!(burned >= shares, "burned {burned} of {shares} shares");
                assert!(asset.balance_of(&user) <= amount);
            }
            Err(err) => {
                assert!(matches!(
                    err,
                    VaultError::InsufficientShares { .. } | VaultError::ExceedsMax { .. }
                ));
                assert_eq!(vault.balance_of(&user), shares);
                assert_eq!(asset.balance_of(&user), 0);
            }
        }
    }
}

#[test]
fn mint_then_withdraw_never_profits() {
    let (asset, vault) = setup();
    let whale = funded(&asset, &vault, "whale", 999_999);
    vault.deposit(&whale, 999_999, &whale).unwrap();
    asset.mint(vault.address(), 123_457).unwrap();

    let user = funded(&asset, &vault, "user", 10_000);
    let paid = vault.mint(&user, 777, &user).unwrap();
    let value = vault.max_withdraw(&user).unwrap();
    assert!(value <= paid, "paid {paid} for shares worth {value}");

    let burned = vault.withdraw(&user, value, &user, &user).unwrap();
    assert!(burned <= 777);
    assert!(asset.balance_of(&user) <= 10_000);
}

#[test]
fn previews_match_operations() {
    let (asset, vault) = setup();
    let alice = funded(&asset, &vault, "alice", 50_000);
    vault.deposit(&alice, 10_007, &alice).unwrap();
    asset.mint(vault.address(), 3_331).unwrap();

    let expected = vault.preview_deposit(1_234).unwrap();
    assert_eq!(vault.deposit(&alice, 1_234, &alice).unwrap(), expected);

    let expected = vault.preview_mint(4_321).unwrap();
    assert_eq!(vault.mint(&alice, 4_321, &alice).unwrap(), expected);

    let expected = vault.preview_withdraw(2_222).unwrap();
    assert_eq!(vault.withdraw(&alice, 2_222, &alice, &alice).unwrap(), expected);

    let expected = vault.preview_redeem(1_111).unwrap();
    assert_eq!(vault.redeem(&alice, 1_111, &alice, &alice).unwrap(), expected);
}

// ---------------------------------------------------------------------------
// 4. Delegated Withdrawals
// ---------------------------------------------------------------------------

#[test]
fn operator_withdraws_for_owner() {
    let (asset, vault) = setup();
    let alice = funded(&asset, &vault, "alice", 1_000);
    let operator = Address::from("operator");
    let treasury = Address::from("treasury");
    vault.deposit(&alice, 1_000, &alice).unwrap();
    vault.approve(&alice, &operator, 400);

    vault.withdraw(&operator, 250, &treasury, &alice).unwrap();
    vault.redeem(&operator, 150, &treasury, &alice).unwrap();

    assert_eq!(vault.allowance(&alice, &operator), 0);
    assert_eq!(vault.balance_of(&alice), 600);
    assert_eq!(asset.balance_of(&treasury), 400);

    let err = vault.redeem(&operator, 1, &treasury, &alice).unwrap_err();
    assert!(matches!(err, VaultError::InsufficientAllowance { .. }));

    let events = vault.events();
    assert!(matches!(
        &events[1],
        VaultEvent::Withdraw { caller, owner, receiver, assets: 250, shares: 250, .. }
            if caller == &operator && owner == &alice && receiver == &treasury
    ));
}

#[test]
fn under_approved_operator_cannot_withdraw() {
    let (asset, vault) = setup();
    let alice = funded(&asset, &vault, "alice", 1_000);
    let operator = Address::from("operator");
    vault.deposit(&alice, 1_000, &alice).unwrap();
    vault.approve(&alice, &operator, 99);

    let err = vault.withdraw(&operator, 100, &operator, &alice).unwrap_err();

    assert!(matches!(
        err,
        VaultError::InsufficientAllowance { allowance: 99, .. }
    ));
    assert_eq!(vault.balance_of(&alice), 1_000);
    assert_eq!(vault.allowance(&alice, &operator), 99);
    assert_eq!(asset.balance_of(&operator), 0);
    assert_eq!(vault.events().len(), 1);
}

// ---------------------------------------------------------------------------
// 5. Degenerate Pools
// ---------------------------------------------------------------------------

#[test]
fn drained_pool_with_supply_fails_cleanly() {
    let (asset, vault) = setup();
    let alice = funded(&asset, &vault, "alice", 1_000);
    let bob = funded(&asset, &vault, "bob", 1_000);
    vault.deposit(&alice, 1_000, &alice).unwrap();
    asset.burn(vault.address(), 1_000).unwrap();

    // Shares outstanding against zero assets: pricing a deposit divides by zero.
    let err = vault.deposit(&bob, 100, &bob).unwrap_err();
    assert!(matches!(err, VaultError::Math(MathError::DivisionByZero)));
    assert_eq!(asset.balance_of(&bob), 1_000);

    // Redeeming is still well defined, and worthless.
    let err = vault.redeem(&alice, 1_000, &alice, &alice).unwrap_err();
    assert!(matches!(err, VaultError::ZeroAssets { shares: 1_000 }));
}

#[test]
fn empty_pool_with_stray_assets_mints_at_par() {
    let (asset, vault) = setup();
    asset.mint(vault.address(), 500).unwrap();
    let alice = funded(&asset, &vault, "alice", 100);

    // No supply yet, so the stray balance does not affect the price.
    assert_eq!(vault.deposit(&alice, 100, &alice).unwrap(), 100);
    assert_eq!(vault.max_withdraw(&alice).unwrap(), 600);
}

// ---------------------------------------------------------------------------
// 6. Concurrency
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_operations_keep_books_balanced() {
    let (asset, vault) = setup();
    let users: Vec<Address> = (0..16)
        .map(|i| funded(&asset, &vault, &format!("user-{i}"), 10_000))
        .collect();

    let mut handles = Vec::new();
    for (i, user) in users.iter().cloned().enumerate() {
        let vault = Arc::clone(&vault);
        let asset = Arc::clone(&asset);
        handles.push(tokio::task::spawn_blocking(move || {
            for round in 0..25u64 {
                vault.deposit(&user, 100 + round, &user).unwrap();
                if round % 5 == 0 && i % 4 == 0 {
                    // Yield lands mid-flight.
                    asset.mint(vault.address(), 7).unwrap();
                }
                let shares = vault.balance_of(&user) / 3;
                if shares > 0 {
                    let _ = vault.redeem(&user, shares, &user, &user);
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let snapshot = vault.snapshot();
    let held: u64 = snapshot.holders.iter().map(|(_, s)| s).sum();
    assert_eq!(held, snapshot.pool.total_supply);
    assert_eq!(snapshot.pool.total_assets, asset.balance_of(vault.address()));

    // Every user's asset balance plus the vault's equals what was minted.
    let outside: u64 = users.iter().map(|u| asset.balance_of(u)).sum();
    assert_eq!(outside + snapshot.pool.total_assets, asset.total_supply());

    // Once everyone exits, nothing remains owed.
    for user in &users {
        let shares = vault.balance_of(user);
        if shares > 0 {
            vault.redeem(user, shares, user, user).unwrap();
        }
    }
    assert_eq!(vault.total_supply(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deposits_emit_one_event_each() {
    let (asset, vault) = setup();
    let users: Vec<Address> = (0..8)
        .map(|i| funded(&asset, &vault, &format!("depositor-{i}"), 1_000))
        .collect();

    let handles: Vec<_> = users
        .into_iter()
        .map(|user| {
            let vault = Arc::clone(&vault);
            tokio::task::spawn_blocking(move || {
                for _ in 0..10 {
                    vault.deposit(&user, 100, &user).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let events = vault.drain_events();
    assert_eq!(events.len(), 80);
    assert_eq!(events.iter().map(VaultEvent::assets).sum::<u64>(), 8_000);
    assert_eq!(vault.total_supply(), 8_000);
}
