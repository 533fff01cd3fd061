use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Subscription tier; currently informational only, but carried through
/// because downstream cost policy (future AI routing) keys off it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum Role {
    Free,
    Pro,
    Enterprise,
}

/// An authenticated user of the platform. The orchestrator never issues
/// or verifies sessions; it receives a principal id already resolved by
/// the authenticator and loads this record to check ownership and credits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub credits: Decimal,
}
