use axum::extract::State;
use axum::Json;
use orchestrator_core::ledger::{self, Costs};
use serde_json::{json, Value};

use crate::auth::Principal;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn wallet(State(state): State<AppState>, Principal(principal_id): Principal) -> Result<Json<Value>, ApiError> {
    let wallet = ledger::wallet(&*state.store, principal_id).await?;
    Ok(Json(json!({
        "credits": wallet.balance,
        "transactions": wallet.recent_transactions,
    })))
}

pub async fn costs() -> Json<Value> {
    Json(json!({
        "costs": {
            "create_project": Costs::CREATE_PROJECT,
            "small_edit": Costs::SMALL_EDIT,
            "medium_edit": Costs::MEDIUM_EDIT,
            "large_edit": Costs::LARGE_EDIT,
            "rebuild": Costs::REBUILD,
            "rollback": Costs::ROLLBACK,
        }
    }))
}
