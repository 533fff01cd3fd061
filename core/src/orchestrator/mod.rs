//! Orchestrator State Machine (C7)
//!
//! Sequences: authorize -> snapshot -> diff -> apply -> build ->
//! (analyze -> repair -> rebuild)* -> commit/revert. Owns credit charge
//! timing and version creation. This module is the one place that
//! composes C1-C6 and C8 into the per-iteration algorithm of the design.

mod change_size;
mod template;

pub use change_size::ChangeSize;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::diff::{
    apply_and_verify, generate_changes_from_prompt, is_editable_path, unified_diff, FileSnapshot,
    LocalVerifier,
};
use crate::error::{OrchestratorError, Result};
use crate::ledger::{self, Costs};
use crate::models::{
    Build, BuildStatus, ChatRole, CodeDiff, Project, ProjectSpec, ProjectStatus, Version,
};
use crate::rate_limit::{self, RateLimitBackend};
use crate::repair::{self, MAX_FILES_PER_REPAIR};
use crate::runner_client::{BuildRequest, BuildResponse, RepairRequest, RunnerClient};
use crate::sanitize::sanitize;
use crate::store::Store;

const MAX_PROMPT_LEN: usize = 5000;

pub struct OrchestratorConfig {
    pub projects_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub max_attempts: u32,
    pub build_timeout_s: u64,
    pub rate_limit_window_s: u64,
    pub rate_limit_max_requests: u32,
}

pub struct Orchestrator {
    store: Arc<dyn Store>,
    runner: Arc<dyn RunnerClient>,
    rate_limiter: Arc<dyn RateLimitBackend>,
    verifier: Arc<dyn LocalVerifier>,
    config: OrchestratorConfig,
}

#[derive(Debug, Clone)]
pub struct IterationOutcome {
    pub version: Version,
    pub build: Build,
    pub change_size: ChangeSize,
    pub credits_charged: Decimal,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        runner: Arc<dyn RunnerClient>,
        rate_limiter: Arc<dyn RateLimitBackend>,
        verifier: Arc<dyn LocalVerifier>,
        config: OrchestratorConfig,
    ) -> Self {
        Orchestrator {
            store,
            runner,
            rate_limiter,
            verifier,
            config,
        }
    }

    fn project_dir(&self, project_id: Uuid) -> PathBuf {
        self.config.projects_dir.join(project_id.to_string())
    }

    async fn authorize(&self, principal_id: Uuid, project_id: Uuid) -> Result<Project> {
        let project = self.store.get_project(project_id).await?;
        if project.owner_id != principal_id {
            tracing::warn!(%project_id, %principal_id, "cross-tenant project access denied");
            return Err(OrchestratorError::forbidden_as_not_found());
        }
        Ok(project)
    }

    /// Creates a new project: materializes the template, charges
    /// `create_project`, records version 1, and runs the build loop.
    pub async fn create_project(
        &self,
        principal_id: Uuid,
        name: &str,
        prompt: &str,
    ) -> Result<IterationOutcome> {
        if prompt.trim().is_empty() {
            return Err(OrchestratorError::EmptyPrompt);
        }
        if prompt.len() > MAX_PROMPT_LEN {
            return Err(OrchestratorError::PromptTooLong { max: MAX_PROMPT_LEN });
        }

        let project_id = Uuid::new_v4();
        let spec = ProjectSpec::initial(name);
        let project = Project {
            id: project_id,
            owner_id: principal_id,
            name: name.to_string(),
            initial_prompt: prompt.to_string(),
            current_spec: spec.clone(),
            status: ProjectStatus::Draft,
            preview_url: None,
            published_url: None,
            watermark_enabled: true,
        };
        let project = self.store.insert_project(project).await?;

        let lock = self.store.acquire_project_lock(project_id).await?;
        tracing::info!(%project_id, "project lock acquired (create)");

        let result = self.create_project_inner(&project, &spec, principal_id).await;

        lock.release().await;
        tracing::info!(%project_id, "project lock released (create)");

        result
    }

    async fn create_project_inner(
        &self,
        project: &Project,
        spec: &ProjectSpec,
        principal_id: Uuid,
    ) -> Result<IterationOutcome> {
        let dir = self.project_dir(project.id);
        template::materialize(
            &self.config.templates_dir,
            &dir,
            &project.name,
            &spec.theme.primary_color,
            &spec.theme.secondary_color,
        )
        .await?;

        let (new_balance, _) =
            ledger::charge(&*self.store, principal_id, Costs::CREATE_PROJECT, "create_project", Some(project.id))
                .await?;
        tracing::info!(%project.id, %new_balance, "charged create_project");

        let version = Version {
            id: Uuid::new_v4(),
            project_id: project.id,
            version_number: 1,
            spec_snapshot: spec.clone(),
            code_diff: None,
            created_by: principal_id,
        };
        let version = self.store.insert_version(version).await?;
        tracing::info!(%project.id, version_number = version.version_number, "version created");

        self.store
            .update_project_status(project.id, ProjectStatus::Building, None)
            .await?;

        let build = self.run_build_loop(project.id, version.id).await?;

        Ok(IterationOutcome {
            version,
            build,
            change_size: ChangeSize::Small,
            credits_charged: Costs::CREATE_PROJECT,
        })
    }

    /// Runs one prompt iteration against an existing project.
    pub async fn iterate(
        &self,
        principal_id: Uuid,
        project_id: Uuid,
        message: &str,
    ) -> Result<IterationOutcome> {
        let project = self.authorize(principal_id, project_id).await?;

        if message.trim().is_empty() {
            return Err(OrchestratorError::EmptyPrompt);
        }
        if message.len() > MAX_PROMPT_LEN {
            return Err(OrchestratorError::PromptTooLong { max: MAX_PROMPT_LEN });
        }

        if !rate_limit::allow(
            &*self.rate_limiter,
            principal_id,
            "prompt",
            self.config.rate_limit_max_requests,
            self.config.rate_limit_window_s,
        )
        .await?
        {
            tracing::warn!(%principal_id, "rate limit exceeded on prompt endpoint");
            return Err(OrchestratorError::RateLimited);
        }

        let lock = self.store.acquire_project_lock(project_id).await?;
        tracing::info!(%project_id, "project lock acquired (iterate)");

        let result = self.iterate_inner(&project, principal_id, message).await;

        lock.release().await;
        tracing::info!(%project_id, "project lock released (iterate)");

        result
    }

    async fn iterate_inner(
        &self,
        project: &Project,
        principal_id: Uuid,
        message: &str,
    ) -> Result<IterationOutcome> {
        self.store
            .insert_chat_message(project.id, principal_id, ChatRole::User, message)
            .await?;

        let dir = self.project_dir(project.id);
        let old_snapshot = read_snapshot(&dir).await?;

        let updated_spec = project.current_spec.with_update(message, Utc::now());

        let changes = match generate_changes_from_prompt(message, &old_snapshot) {
            Ok(changes) => changes,
            Err(err) => {
                tracing::warn!(%project.id, error = %err, "edit generation failed");
                return Err(err);
            }
        };

        if let Err(err) = apply_and_verify(&dir, &changes, &*self.verifier).await {
            tracing::warn!(%project.id, error = %err, "apply/verify failed, reverted");
            return Err(err);
        }

        let new_snapshot = read_snapshot(&dir).await?;
        let code_diff = build_code_diff(&old_snapshot, &new_snapshot, &changes);

        let total_lines: usize = changes.values().map(|c| c.lines().count()).sum();
        let change_size = change_size::classify(message, changes.len(), total_lines);
        tracing::info!(%project.id, size = change_size.as_str(), "change classified");

        let cost = change_size.cost();
        let (new_balance, _) = match ledger::charge(&*self.store, principal_id, cost, "prompt_edit", Some(project.id)).await {
            Ok(ok) => ok,
            Err(err) => {
                tracing::warn!(%project.id, "insufficient credits, reverting file writes");
                revert_changes(&dir, &old_snapshot, &changes).await;
                return Err(err);
            }
        };
        tracing::info!(%project.id, %new_balance, "charged prompt edit");

        self.store.update_project_spec(project.id, updated_spec.clone()).await?;

        let version_number = self.store.next_version_number(project.id).await?;
        let version = Version {
            id: Uuid::new_v4(),
            project_id: project.id,
            version_number,
            spec_snapshot: updated_spec,
            code_diff: Some(code_diff),
            created_by: principal_id,
        };
        let version = self.store.insert_version(version).await?;
        tracing::info!(%project.id, version_number = version.version_number, "version created");

        self.store
            .update_project_status(project.id, ProjectStatus::Building, None)
            .await?;

        let build = self.run_build_loop(project.id, version.id).await?;

        Ok(IterationOutcome {
            version,
            build,
            change_size,
            credits_charged: cost,
        })
    }

    /// Re-enters the build loop at the current version with no new diff.
    pub async fn rebuild(&self, principal_id: Uuid, project_id: Uuid) -> Result<Build> {
        let project = self.authorize(principal_id, project_id).await?;
        let lock = self.store.acquire_project_lock(project_id).await?;

        let result = async {
            ledger::charge(&*self.store, principal_id, Costs::REBUILD, "rebuild", Some(project.id)).await?;
            let version = self.store.latest_version(project.id).await?;
            self.store
                .update_project_status(project.id, ProjectStatus::Building, None)
                .await?;
            self.run_build_loop(project.id, version.id).await
        }
        .await;

        lock.release().await;
        result
    }

    /// Creates a new version whose `spec_snapshot` equals the target
    /// version's, and whose `code_diff` is the unified diff from the
    /// current tree back to the target version's materialized files,
    /// then re-enters the build loop. Per the design note, this
    /// intentionally produces non-contiguous spec duplicates in history.
    pub async fn rollback(
        &self,
        principal_id: Uuid,
        project_id: Uuid,
        target_version_id: Uuid,
    ) -> Result<(Version, Build)> {
        let project = self.authorize(principal_id, project_id).await?;
        let target = self.store.get_version(target_version_id).await?;
        if target.project_id != project.id {
            return Err(OrchestratorError::NotFound);
        }

        let lock = self.store.acquire_project_lock(project_id).await?;

        let result = async {
            let dir = self.project_dir(project.id);
            let current_snapshot = read_snapshot(&dir).await?;

            let target_files: BTreeMap<String, String> = match &target.code_diff {
                Some(diff) => diff.modified.clone(),
                None => BTreeMap::new(),
            };

            ledger::charge(&*self.store, principal_id, Costs::ROLLBACK, "rollback", Some(project.id)).await?;

            let mut diff = CodeDiff::default();
            for (path, content) in &target_files {
                let old = current_snapshot.get(path).cloned().unwrap_or_default();
                let text = unified_diff(path, &old, content);
                if !text.is_empty() {
                    diff.modified.insert(path.clone(), text);
                }
            }

            let version_number = self.store.next_version_number(project.id).await?;
            let version = Version {
                id: Uuid::new_v4(),
                project_id: project.id,
                version_number,
                spec_snapshot: target.spec_snapshot.clone(),
                code_diff: Some(diff),
                created_by: principal_id,
            };
            let version = self.store.insert_version(version).await?;
            self.store
                .update_project_spec(project.id, target.spec_snapshot.clone())
                .await?;
            self.store
                .update_project_status(project.id, ProjectStatus::Building, None)
                .await?;

            let build = self.run_build_loop(project.id, version.id).await?;
            Ok((version, build))
        }
        .await;

        lock.release().await;
        result
    }

    /// Attempts 1..=max_attempts: the first is a plain build, subsequent
    /// ones interleave a repair analysis + patch before retrying. The
    /// build row is updated in place; `attempt_number` never resets.
    async fn run_build_loop(&self, project_id: Uuid, version_id: Uuid) -> Result<Build> {
        let dir = self.project_dir(project_id);
        let mut build = Build::new_pending(project_id, version_id);
        build = self.store.insert_build(build.clone()).await?;

        let mut prior_logs = String::new();

        for attempt in 1..=self.config.max_attempts {
            build.attempt_number = attempt as i32;
            build.status = if attempt == 1 {
                BuildStatus::Building
            } else {
                BuildStatus::Repairing
            };

            if attempt > 1 {
                let analysis = repair::analyze_failure(&prior_logs);
                if !analysis.fixable {
                    tracing::warn!(%project_id, attempt, kind = ?analysis.kind, "failure not fixable, stopping repair loop");
                    break;
                }
                let snapshot = read_snapshot(&dir).await?;
                match repair::generate_repair_patch(&analysis, &prior_logs, &snapshot) {
                    Some(patch) if patch.len() <= MAX_FILES_PER_REPAIR && patch.keys().all(|p| is_editable_path(p)) => {
                        for (path, content) in &patch {
                            let full = dir.join(path);
                            if let Some(parent) = full.parent() {
                                tokio::fs::create_dir_all(parent).await.ok();
                            }
                            tokio::fs::write(&full, content).await.map_err(|e| {
                                OrchestratorError::Internal(format!("write repair patch {path}: {e}"))
                            })?;
                        }
                    }
                    _ => {
                        tracing::warn!(%project_id, attempt, "no valid repair patch, stopping repair loop");
                        break;
                    }
                }
            }

            self.store.update_build(build.clone()).await?;
            tracing::info!(%project_id, attempt, status = ?build.status, "build attempt starting");

            let request = BuildRequest {
                project_id: project_id.to_string(),
                project_path: dir.to_string_lossy().to_string(),
                timeout: self.config.build_timeout_s,
                memory_limit: "1g".to_string(),
                cpu_limit: "1.0".to_string(),
            };

            let response = if attempt == 1 {
                self.runner.build(request).await
            } else {
                self.runner
                    .repair(RepairRequest {
                        build: request,
                        prior_logs: sanitize(&prior_logs),
                    })
                    .await
            };

            let response = match response {
                Ok(r) => r,
                Err(err) => {
                    tracing::warn!(%project_id, attempt, error = %err, "runner call failed");
                    BuildResponse {
                        success: false,
                        exit_code: -1,
                        logs: err.to_string(),
                        lint_output: String::new(),
                        build_output: String::new(),
                        error: Some(err.to_string()),
                    }
                }
            };

            let sanitized_logs = sanitize(&response.logs);
            let sanitized_lint = sanitize(&response.lint_output);
            let sanitized_build_output = sanitize(&response.build_output);
            let sanitized_error = response.error.as_deref().map(sanitize);

            build.build_logs = sanitized_logs.clone();
            build.lint_output = sanitized_lint;
            build.build_output = sanitized_build_output;
            build.error_message = sanitized_error;

            if response.success {
                build.status = BuildStatus::Success;
                build.preview_url = Some(format!("preview/{project_id}/{}", build.id));
                build.completed_at = Some(Utc::now());
                build = self.store.update_build(build.clone()).await?;

                self.store
                    .update_project_status(project_id, ProjectStatus::Ready, build.preview_url.clone())
                    .await?;
                tracing::info!(%project_id, attempt, "build succeeded");
                return Ok(build);
            }

            prior_logs = format!("{sanitized_logs}\n{}", build.lint_output);
            tracing::warn!(%project_id, attempt, "build attempt failed");
        }

        build.status = BuildStatus::Failed;
        build.completed_at = Some(Utc::now());
        let build = self.store.update_build(build).await?;
        self.store
            .update_project_status(project_id, ProjectStatus::Failed, None)
            .await?;
        tracing::error!(%project_id, attempts = build.attempt_number, "build failed terminally");
        Ok(build)
    }
}

async fn read_snapshot(dir: &Path) -> Result<FileSnapshot> {
    let mut snapshot = FileSnapshot::new();
    read_snapshot_inner(dir, dir, &mut snapshot).await?;
    Ok(snapshot)
}

fn read_snapshot_inner<'a>(
    root: &'a Path,
    current: &'a Path,
    out: &'a mut FileSnapshot,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = match tokio::fs::read_dir(current).await {
            Ok(e) => e,
            Err(_) => return Ok(()),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| OrchestratorError::Internal(format!("read_dir entry: {e}")))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| OrchestratorError::Internal(format!("file_type: {e}")))?;
            if file_type.is_dir() {
                read_snapshot_inner(root, &path, out).await?;
            } else {
                let relative = path
                    .strip_prefix(root)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .replace('\\', "/");
                if is_editable_path(&relative) {
                    if let Ok(content) = tokio::fs::read_to_string(&path).await {
                        out.insert(relative, content);
                    }
                }
            }
        }
        Ok(())
    })
}

fn build_code_diff(
    old: &FileSnapshot,
    new: &FileSnapshot,
    changes: &BTreeMap<String, String>,
) -> CodeDiff {
    let mut diff = CodeDiff::default();
    for path in changes.keys() {
        let old_content = old.get(path).cloned().unwrap_or_default();
        let new_content = new.get(path).cloned().unwrap_or_default();
        let text = unified_diff(path, &old_content, &new_content);
        if !text.is_empty() {
            diff.modified.insert(path.clone(), text);
        }
    }
    diff
}

async fn revert_changes(dir: &Path, original: &FileSnapshot, changes: &BTreeMap<String, String>) {
    for path in changes.keys() {
        let full = dir.join(path);
        match original.get(path) {
            Some(content) => {
                let _ = tokio::fs::write(&full, content).await;
            }
            None => {
                let _ = tokio::fs::remove_file(&full).await;
            }
        }
    }
}

#[cfg(test)]
mod tests;
