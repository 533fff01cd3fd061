use std::path::{Path, PathBuf};

use axum::extract::{Path as AxumPath, Query, State};
use axum::Json;
use orchestrator_core::diff::is_editable_path;
use orchestrator_core::models::{Build, Project, Version};
use orchestrator_core::store::Store;
use orchestrator_core::OrchestratorError;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::state::AppState;

/// Mirrors the orchestrator's own ownership check for the read-only
/// routes that never go through `Orchestrator::authorize` themselves;
/// cross-tenant access collapses to `NotFound` just the same.
async fn authorize_project(store: &dyn Store, principal_id: Uuid, project_id: Uuid) -> Result<Project, ApiError> {
    let project = store.get_project(project_id).await?;
    if project.owner_id != principal_id {
        return Err(ApiError(OrchestratorError::forbidden_as_not_found()));
    }
    Ok(project)
}

#[derive(Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub prompt: String,
}

pub async fn create(
    State(state): State<AppState>,
    Principal(principal_id): Principal,
    Json(req): Json<CreateProjectRequest>,
) -> Result<Json<Value>, ApiError> {
    let outcome = state
        .orchestrator
        .create_project(principal_id, &req.name, &req.prompt)
        .await?;
    let project = state.store.get_project(outcome.version.project_id).await?;
    Ok(Json(json!({
        "project": project,
        "version": outcome.version,
        "build": outcome.build,
    })))
}

pub async fn list(State(state): State<AppState>, Principal(principal_id): Principal) -> Result<Json<Value>, ApiError> {
    let projects = state.store.list_projects(principal_id).await?;
    Ok(Json(json!({ "projects": projects })))
}

pub async fn get_one(
    State(state): State<AppState>,
    Principal(principal_id): Principal,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<Project>, ApiError> {
    let project = authorize_project(&*state.store, principal_id, id).await?;
    Ok(Json(project))
}

#[derive(Deserialize)]
pub struct PromptRequest {
    pub message: String,
}

pub async fn prompt(
    State(state): State<AppState>,
    Principal(principal_id): Principal,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<PromptRequest>,
) -> Result<Json<Value>, ApiError> {
    let outcome = state.orchestrator.iterate(principal_id, id, &req.message).await?;
    let wallet = orchestrator_core::ledger::wallet(&*state.store, principal_id).await?;
    Ok(Json(json!({
        "version": outcome.version,
        "build": outcome.build,
        "change_size": outcome.change_size.as_str(),
        "credits_charged": outcome.credits_charged,
        "credit_info": { "balance": wallet.balance },
    })))
}

pub async fn rebuild(
    State(state): State<AppState>,
    Principal(principal_id): Principal,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let build: Build = state.orchestrator.rebuild(principal_id, id).await?;
    Ok(Json(json!({ "build": build })))
}

#[derive(Deserialize)]
pub struct RollbackRequest {
    pub version_id: Uuid,
}

pub async fn rollback(
    State(state): State<AppState>,
    Principal(principal_id): Principal,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<RollbackRequest>,
) -> Result<Json<Value>, ApiError> {
    let (version, build): (Version, Build) = state
        .orchestrator
        .rollback(principal_id, id, req.version_id)
        .await?;
    Ok(Json(json!({ "version": version, "build": build })))
}

pub async fn versions(
    State(state): State<AppState>,
    Principal(principal_id): Principal,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<Value>, ApiError> {
    authorize_project(&*state.store, principal_id, id).await?;
    let versions = state.store.list_versions(id).await?;
    let versions: Vec<Value> = versions
        .into_iter()
        .map(|v| {
            let unified_diff_text = v
                .code_diff
                .as_ref()
                .map(|d| d.modified.values().cloned().collect::<Vec<_>>().join("\n"))
                .unwrap_or_default();
            let mut value = serde_json::to_value(&v).unwrap();
            value["unified_diff_text"] = json!(unified_diff_text);
            value
        })
        .collect();
    Ok(Json(json!({ "versions": versions })))
}

pub async fn builds(
    State(state): State<AppState>,
    Principal(principal_id): Principal,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<Value>, ApiError> {
    authorize_project(&*state.store, principal_id, id).await?;
    let builds = state.store.list_builds(id).await?;
    Ok(Json(json!({ "builds": builds })))
}

#[derive(serde::Serialize)]
struct TreeNode {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    children: Option<Vec<TreeNode>>,
}

pub async fn files_tree(
    State(state): State<AppState>,
    Principal(principal_id): Principal,
    AxumPath(id): AxumPath<Uuid>,
) -> Result<Json<Value>, ApiError> {
    authorize_project(&*state.store, principal_id, id).await?;
    let dir = state.projects_dir.join(id.to_string());
    let nodes = read_tree(&dir, &dir).await;
    Ok(Json(json!({ "tree": nodes })))
}

fn read_tree<'a>(
    root: &'a Path,
    current: &'a Path,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Vec<TreeNode>> + Send + 'a>> {
    Box::pin(async move {
        let mut nodes = Vec::new();
        let mut entries = match tokio::fs::read_dir(current).await {
            Ok(e) => e,
            Err(_) => return nodes,
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let Ok(file_type) = entry.file_type().await else { continue };
            let relative = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().replace('\\', "/");
            let name = entry.file_name().to_string_lossy().into_owned();

            if file_type.is_dir() {
                if !is_forbidden_dir(&name) {
                    let children = read_tree(root, &path).await;
                    nodes.push(TreeNode { name, path: relative, kind: "dir", children: Some(children) });
                }
            } else if is_editable_path(&relative) {
                nodes.push(TreeNode { name, path: relative, kind: "file", children: None });
            }
        }
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        nodes
    })
}

fn is_forbidden_dir(name: &str) -> bool {
    matches!(name, "node_modules" | ".next" | ".git" | "dist" | "build")
}

#[derive(Deserialize)]
pub struct FileContentQuery {
    pub path: String,
}

pub async fn files_content(
    State(state): State<AppState>,
    Principal(principal_id): Principal,
    AxumPath(id): AxumPath<Uuid>,
    Query(query): Query<FileContentQuery>,
) -> Result<Json<Value>, ApiError> {
    authorize_project(&*state.store, principal_id, id).await?;

    if !is_editable_path(&query.path) {
        return Err(ApiError(OrchestratorError::InvalidPath(query.path)));
    }

    let full: PathBuf = state.projects_dir.join(id.to_string()).join(&query.path);
    let content = tokio::fs::read_to_string(&full)
        .await
        .map_err(|_| ApiError(OrchestratorError::NotFound))?;

    Ok(Json(json!({ "path": query.path, "content": content })))
}
