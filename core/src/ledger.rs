//! Credit Ledger (C1)
//!
//! All arithmetic is fixed-point decimal (scale 2); floating point never
//! enters credit bookkeeping. Charge/grant/refund are thin wrappers that
//! delegate the actual balance mutation and transaction insert to the
//! store, which performs both in one transactional unit.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::models::{CreditTransaction, TransactionKind};
use crate::store::Store;

/// Centralized cost constants so pricing changes touch one place.
pub struct Costs;

impl Costs {
    pub const CREATE_PROJECT: Decimal = dec!(5.0);
    pub const SMALL_EDIT: Decimal = dec!(1.0);
    pub const MEDIUM_EDIT: Decimal = dec!(3.0);
    pub const LARGE_EDIT: Decimal = dec!(10.0);
    pub const REBUILD: Decimal = dec!(1.0);
    pub const ROLLBACK: Decimal = dec!(3.0);
}

/// Charges `amount` against `principal`'s balance, inserting a `charge`
/// transaction atomically with the balance update. Fails with
/// `InsufficientCredits` without mutating anything if the balance is
/// too low.
pub async fn charge(
    store: &dyn Store,
    principal_id: Uuid,
    amount: Decimal,
    description: &str,
    project_id: Option<Uuid>,
) -> Result<(Decimal, Uuid)> {
    let principal = store.get_principal(principal_id).await?;
    if principal.credits < amount {
        return Err(OrchestratorError::InsufficientCredits {
            required: amount,
            available: principal.credits,
        });
    }
    store
        .record_transaction(principal_id, -amount, TransactionKind::Charge, description, project_id)
        .await
}

pub async fn grant(
    store: &dyn Store,
    principal_id: Uuid,
    amount: Decimal,
    description: &str,
) -> Result<Decimal> {
    debug_assert!(amount > Decimal::ZERO, "grant amount must be positive");
    let (balance, _) = store
        .record_transaction(principal_id, amount, TransactionKind::Grant, description, None)
        .await?;
    Ok(balance)
}

pub async fn refund(
    store: &dyn Store,
    principal_id: Uuid,
    amount: Decimal,
    description: &str,
    project_id: Option<Uuid>,
) -> Result<Decimal> {
    debug_assert!(amount > Decimal::ZERO, "refund amount must be positive");
    let (balance, _) = store
        .record_transaction(principal_id, amount, TransactionKind::Refund, description, project_id)
        .await?;
    Ok(balance)
}

pub struct Wallet {
    pub balance: Decimal,
    pub recent_transactions: Vec<CreditTransaction>,
}

pub async fn wallet(store: &dyn Store, principal_id: Uuid) -> Result<Wallet> {
    let principal = store.get_principal(principal_id).await?;
    let recent_transactions = store.list_recent_transactions(principal_id, 50).await?;
    Ok(Wallet {
        balance: principal.credits,
        recent_transactions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn charge_debits_balance_and_records_transaction() {
        let store = MemoryStore::new();
        let principal = store.seed_principal(dec!(10.0)).await;

        let (balance, _txn_id) = charge(&store, principal, Costs::CREATE_PROJECT, "create", None)
            .await
            .unwrap();
        assert_eq!(balance, dec!(5.0));

        let w = wallet(&store, principal).await.unwrap();
        assert_eq!(w.balance, dec!(5.0));
        assert_eq!(w.recent_transactions.len(), 1);
    }

    #[tokio::test]
    async fn charge_beyond_balance_is_rejected_without_mutation() {
        let store = MemoryStore::new();
        let principal = store.seed_principal(dec!(2.0)).await;

        let err = charge(&store, principal, dec!(5.0), "too much", None)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InsufficientCredits { .. }));

        let w = wallet(&store, principal).await.unwrap();
        assert_eq!(w.balance, dec!(2.0));
        assert!(w.recent_transactions.is_empty());
    }

    #[tokio::test]
    async fn grant_then_refund_are_additive() {
        let store = MemoryStore::new();
        let principal = store.seed_principal(dec!(0.0)).await;

        grant(&store, principal, dec!(20.0), "topup").await.unwrap();
        let balance = refund(&store, principal, dec!(1.0), "goodwill", None)
            .await
            .unwrap();
        assert_eq!(balance, dec!(21.0));
    }
}
