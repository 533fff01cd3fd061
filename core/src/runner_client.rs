//! Build Runner Client (C4)
//!
//! Transport-agnostic trait over the isolated build executor; the
//! shipped implementation is an HTTP/JSON client matching the Runner
//! RPC of the Control API. Connection failure and timeout are
//! distinguished so the orchestrator can log and surface them
//! differently, even though both collapse to build-failure handling.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

pub const TIMEOUT_EXIT_CODE: i32 = 124;

#[derive(Debug, Clone, Serialize)]
pub struct BuildRequest {
    pub project_id: String,
    pub project_path: String,
    pub timeout: u64,
    pub memory_limit: String,
    pub cpu_limit: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepairRequest {
    #[serde(flatten)]
    pub build: BuildRequest,
    pub prior_logs: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildResponse {
    pub success: bool,
    pub exit_code: i32,
    pub logs: String,
    pub lint_output: String,
    pub build_output: String,
    pub error: Option<String>,
}

#[async_trait]
pub trait RunnerClient: Send + Sync {
    async fn build(&self, req: BuildRequest) -> Result<BuildResponse>;
    async fn repair(&self, req: RepairRequest) -> Result<BuildResponse>;
}

/// HTTP/JSON runner client. The wall-clock HTTP timeout is the build
/// timeout plus a 60s buffer so the runner, not the transport, decides
/// when a build has overrun.
pub struct HttpRunnerClient {
    base_url: String,
    secret: String,
    client: reqwest::Client,
}

impl HttpRunnerClient {
    pub fn new(base_url: String, secret: String) -> Self {
        HttpRunnerClient {
            base_url,
            secret,
            client: reqwest::Client::new(),
        }
    }

    async fn post(&self, path: &str, body: impl Serialize, timeout: Duration) -> Result<BuildResponse> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OrchestratorError::RunnerTimeout(timeout.as_secs())
                } else {
                    OrchestratorError::RunnerUnavailable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(OrchestratorError::RunnerUnavailable(format!(
                "runner responded with status {}",
                response.status()
            )));
        }

        response
            .json::<BuildResponse>()
            .await
            .map_err(|e| OrchestratorError::RunnerUnavailable(format!("malformed response: {e}")))
    }
}

#[async_trait]
impl RunnerClient for HttpRunnerClient {
    async fn build(&self, req: BuildRequest) -> Result<BuildResponse> {
        let timeout = Duration::from_secs(req.timeout + 60);
        self.post("/build", req, timeout).await
    }

    async fn repair(&self, req: RepairRequest) -> Result<BuildResponse> {
        let timeout = Duration::from_secs(req.build.timeout + 60);
        self.post("/repair", req, timeout).await
    }
}
