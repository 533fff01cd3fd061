use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::join_all;
use orchestrator_core::diff::NoopVerifier;
use orchestrator_core::orchestrator::{Orchestrator, OrchestratorConfig};
use orchestrator_core::rate_limit::InMemoryRateLimitBackend;
use orchestrator_core::runner_client::{BuildRequest, BuildResponse, RepairRequest, RunnerClient};
use orchestrator_core::store::memory::MemoryStore;
use orchestrator_core::store::Store;
use orchestrator_core::Result;
use rust_decimal_macros::dec;
use tokio::sync::Barrier;

struct AlwaysSucceeds;

#[async_trait]
impl RunnerClient for AlwaysSucceeds {
    async fn build(&self, _req: BuildRequest) -> Result<BuildResponse> {
        Ok(ok_response())
    }

    async fn repair(&self, _req: RepairRequest) -> Result<BuildResponse> {
        Ok(ok_response())
    }
}

fn ok_response() -> BuildResponse {
    BuildResponse {
        success: true,
        exit_code: 0,
        logs: "ok".to_string(),
        lint_output: String::new(),
        build_output: "done".to_string(),
        error: None,
    }
}

async fn write_template(dir: &Path) {
    tokio::fs::create_dir_all(dir.join("components/sections")).await.unwrap();
    tokio::fs::write(
        dir.join("components/sections/Hero.tsx"),
        "export default function Hero() { return <h1>Old</h1>; }\n",
    )
    .await
    .unwrap();
    tokio::fs::write(dir.join("package.json"), "{\"name\": \"{{PROJECT_NAME}}\", \"dependencies\": {}}\n")
        .await
        .unwrap();
}

// Testable property: lock serialization. Concurrent iterations on the
// same project produce strictly sequential version_numbers with no
// gaps or duplicates, mirroring a concurrent-ledger barrier test style.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_iterations_on_one_project_serialize_version_numbers() {
    let store = Arc::new(MemoryStore::new());
    let runner = Arc::new(AlwaysSucceeds);
    let rate_limiter = Arc::new(InMemoryRateLimitBackend::new());
    let verifier = Arc::new(NoopVerifier);
    let tmp = tempfile::TempDir::new().unwrap();
    write_template(&tmp.path().join("templates/default")).await;

    let config = OrchestratorConfig {
        projects_dir: tmp.path().join("projects"),
        templates_dir: tmp.path().join("templates/default"),
        max_attempts: 3,
        build_timeout_s: 300,
        rate_limit_window_s: 60,
        rate_limit_max_requests: 1000,
    };

    let orchestrator = Arc::new(Orchestrator::new(store.clone(), runner, rate_limiter, verifier, config));

    let principal = store.seed_principal(dec!(1000.0)).await;
    let created = orchestrator
        .create_project(principal, "Landing", "Landing page")
        .await
        .unwrap();
    let project_id = created.version.project_id;

    const WORKERS: usize = 8;
    let barrier = Arc::new(Barrier::new(WORKERS));
    let errors: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(VecDeque::new()));

    let tasks = (0..WORKERS).map(|i| {
        let orchestrator = orchestrator.clone();
        let barrier = barrier.clone();
        let errors = errors.clone();
        tokio::spawn(async move {
            barrier.wait().await;
            let prompt = format!("change hero title to Worker{i}");
            if let Err(e) = orchestrator.iterate(principal, project_id, &prompt).await {
                errors.lock().unwrap().push_back(e.to_string());
            }
        })
    });

    join_all(tasks).await;

    assert!(errors.lock().unwrap().is_empty(), "unexpected errors: {:?}", errors.lock().unwrap());

    let mut versions = store.list_versions(project_id).await.unwrap();
    versions.sort_by_key(|v| v.version_number);
    let numbers: Vec<i32> = versions.iter().map(|v| v.version_number).collect();
    let expected: Vec<i32> = (1..=(WORKERS as i32 + 1)).collect();
    assert_eq!(numbers, expected, "version numbers must be contiguous with no gaps or duplicates");
}
