use std::path::PathBuf;
use std::sync::Arc;

use orchestrator_core::store::Store;
use orchestrator_core::Orchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<dyn Store>,
    pub projects_dir: PathBuf,
}
