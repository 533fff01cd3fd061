use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum TransactionKind {
    Charge,
    Grant,
    Refund,
    Bonus,
    Purchase,
}

/// Append-only ledger entry. `amount` is signed: negative for charges,
/// positive for grant/refund/bonus/purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransaction {
    pub id: Uuid,
    pub principal_id: Uuid,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub description: String,
    pub project_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
