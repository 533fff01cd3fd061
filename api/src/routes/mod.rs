pub mod credits;
pub mod health;
pub mod projects;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/projects", post(projects::create).get(projects::list))
        .route("/projects/:id", get(projects::get_one))
        .route("/projects/:id/prompt", post(projects::prompt))
        .route("/projects/:id/rebuild", post(projects::rebuild))
        .route("/projects/:id/rollback", post(projects::rollback))
        .route("/projects/:id/versions", get(projects::versions))
        .route("/projects/:id/builds", get(projects::builds))
        .route("/projects/:id/files/tree", get(projects::files_tree))
        .route("/projects/:id/files/content", get(projects::files_content))
        .route("/credits/wallet", get(credits::wallet))
        .route("/credits/costs", get(credits::costs))
        .with_state(state)
}
