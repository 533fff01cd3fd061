use std::sync::Arc;

use futures::future::join_all;
use orchestrator_core::ledger::{self, Costs};
use orchestrator_core::store::memory::MemoryStore;
use orchestrator_core::store::Store;
use orchestrator_core::OrchestratorError;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[tokio::test]
async fn wallet_reports_balance_and_recent_transactions() {
    let store = MemoryStore::new();
    let principal = store.seed_principal(dec!(20.0)).await;

    ledger::charge(&store, principal, Costs::CREATE_PROJECT, "create", None)
        .await
        .unwrap();
    ledger::grant(&store, principal, dec!(2.5), "bonus").await.unwrap();

    let wallet = ledger::wallet(&store, principal).await.unwrap();
    assert_eq!(wallet.balance, dec!(17.5));
    assert_eq!(wallet.recent_transactions.len(), 2);
}

#[tokio::test]
async fn insufficient_credits_does_not_mutate_balance() {
    let store = MemoryStore::new();
    let principal = store.seed_principal(dec!(1.0)).await;

    let err = ledger::charge(&store, principal, dec!(5.0), "too much", None)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::InsufficientCredits { .. }));

    let balance = store.get_principal(principal).await.unwrap().credits;
    assert_eq!(balance, dec!(1.0));
}

// Testable property: no amount of concurrent charging against one
// principal (even across different projects, each with its own lock)
// can drive the balance negative.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_charges_never_drive_balance_negative() {
    let store = Arc::new(MemoryStore::new());
    let principal = store.seed_principal(dec!(10.0)).await;

    let charges = (0..20).map(|_| {
        let store = store.clone();
        tokio::spawn(async move { ledger::charge(&*store, principal, dec!(1.0), "charge", None).await })
    });
    let results = join_all(charges).await;
    let successes = results.into_iter().filter(|r| matches!(r, Ok(Ok(_)))).count();

    assert_eq!(successes, 10);
    let balance = store.get_principal(principal).await.unwrap().credits;
    assert_eq!(balance, dec!(0.0));
}

#[derive(Debug, Clone)]
enum Op {
    Charge(Decimal),
    Grant(Decimal),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1..500i64).prop_map(|cents| Op::Charge(Decimal::new(cents, 2))),
        (1..500i64).prop_map(|cents| Op::Grant(Decimal::new(cents, 2))),
    ]
}

proptest! {
    // Testable property: credit conservation. For any sequence of
    // charge/grant operations, balance(P) == sum(amount(txn) for txn in ledger(P)).
    #[test]
    fn balance_always_equals_sum_of_ledger_amounts(ops in proptest::collection::vec(op_strategy(), 0..30)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = MemoryStore::new();
            let principal = store.seed_principal(dec!(1000.0)).await;

            for op in &ops {
                match op {
                    Op::Charge(amount) => {
                        let _ = ledger::charge(&store, principal, *amount, "op", None).await;
                    }
                    Op::Grant(amount) => {
                        let _ = ledger::grant(&store, principal, *amount, "op").await;
                    }
                }
            }

            let balance = store.get_principal(principal).await.unwrap().credits;
            let transactions = store.list_recent_transactions(principal, usize::MAX).await.unwrap();
            let sum: Decimal = transactions.iter().map(|t| t.amount).sum();
            assert_eq!(balance, dec!(1000.0) + sum);
        });
    }
}
