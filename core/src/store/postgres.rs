//! Postgres-backed `Store` implementation.
//!
//! Uses the runtime `sqlx::query_as::<_, T>` style throughout rather than
//! the compile-time `query!`/`query_as!` macros, so building this crate
//! never requires a live database connection. Each row type derives
//! `FromRow` and converts into its domain type via `TryFrom`, mirroring
//! the adapter pattern of a currency ledger store that uses the same
//! runtime-query + `TryFrom` shape for its Postgres-backed account table.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::models::{
    Build, BuildStatus, ChatMessage, ChatRole, CreditTransaction, Principal, Project,
    ProjectSpec, ProjectStatus, Role, TransactionKind, Version,
};
use crate::store::{ProjectLock, Store};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(PgStore { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| OrchestratorError::Internal(format!("migration failed: {e}")))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates a principal directly; used by the admin CLI's `seed`
    /// command. Signup/authentication proper is out of scope here.
    pub async fn create_user(&self, email: &str, role: Role, initial_credits: Decimal) -> Result<Principal> {
        let row = sqlx::query_as::<_, DbPrincipal>(
            "INSERT INTO users (id, email, role, credits) VALUES ($1, $2, $3, $4)
             RETURNING id, email, role, credits",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(role_str(role))
        .bind(initial_credits)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }
}

#[derive(FromRow)]
struct DbPrincipal {
    id: Uuid,
    email: String,
    role: String,
    credits: Decimal,
}

impl TryFrom<DbPrincipal> for Principal {
    type Error = OrchestratorError;

    fn try_from(row: DbPrincipal) -> Result<Self> {
        Ok(Principal {
            id: row.id,
            email: row.email,
            role: parse_role(&row.role)?,
            credits: row.credits,
        })
    }
}

fn parse_role(s: &str) -> Result<Role> {
    match s {
        "free" => Ok(Role::Free),
        "pro" => Ok(Role::Pro),
        "enterprise" => Ok(Role::Enterprise),
        other => Err(OrchestratorError::Internal(format!("unknown role: {other}"))),
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::Free => "free",
        Role::Pro => "pro",
        Role::Enterprise => "enterprise",
    }
}

#[derive(FromRow)]
struct DbTransaction {
    id: Uuid,
    principal_id: Uuid,
    amount: Decimal,
    kind: String,
    description: String,
    project_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<DbTransaction> for CreditTransaction {
    type Error = OrchestratorError;

    fn try_from(row: DbTransaction) -> Result<Self> {
        Ok(CreditTransaction {
            id: row.id,
            principal_id: row.principal_id,
            amount: row.amount,
            kind: parse_kind(&row.kind)?,
            description: row.description,
            project_id: row.project_id,
            created_at: row.created_at,
        })
    }
}

fn parse_kind(s: &str) -> Result<TransactionKind> {
    match s {
        "charge" => Ok(TransactionKind::Charge),
        "grant" => Ok(TransactionKind::Grant),
        "refund" => Ok(TransactionKind::Refund),
        "bonus" => Ok(TransactionKind::Bonus),
        "purchase" => Ok(TransactionKind::Purchase),
        other => Err(OrchestratorError::Internal(format!("unknown transaction kind: {other}"))),
    }
}

fn kind_str(kind: TransactionKind) -> &'static str {
    match kind {
        TransactionKind::Charge => "charge",
        TransactionKind::Grant => "grant",
        TransactionKind::Refund => "refund",
        TransactionKind::Bonus => "bonus",
        TransactionKind::Purchase => "purchase",
    }
}

#[derive(FromRow)]
struct DbProject {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    initial_prompt: String,
    current_spec: serde_json::Value,
    status: String,
    preview_url: Option<String>,
    published_url: Option<String>,
    watermark_enabled: bool,
}

impl TryFrom<DbProject> for Project {
    type Error = OrchestratorError;

    fn try_from(row: DbProject) -> Result<Self> {
        Ok(Project {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            initial_prompt: row.initial_prompt,
            current_spec: serde_json::from_value(row.current_spec)
                .map_err(|e| OrchestratorError::Internal(format!("bad spec json: {e}")))?,
            status: parse_project_status(&row.status)?,
            preview_url: row.preview_url,
            published_url: row.published_url,
            watermark_enabled: row.watermark_enabled,
        })
    }
}

fn parse_project_status(s: &str) -> Result<ProjectStatus> {
    match s {
        "draft" => Ok(ProjectStatus::Draft),
        "building" => Ok(ProjectStatus::Building),
        "ready" => Ok(ProjectStatus::Ready),
        "failed" => Ok(ProjectStatus::Failed),
        "published" => Ok(ProjectStatus::Published),
        other => Err(OrchestratorError::Internal(format!("unknown project status: {other}"))),
    }
}

fn project_status_str(status: ProjectStatus) -> &'static str {
    match status {
        ProjectStatus::Draft => "draft",
        ProjectStatus::Building => "building",
        ProjectStatus::Ready => "ready",
        ProjectStatus::Failed => "failed",
        ProjectStatus::Published => "published",
    }
}

#[derive(FromRow)]
struct DbVersion {
    id: Uuid,
    project_id: Uuid,
    version_number: i32,
    spec_snapshot: serde_json::Value,
    code_diff: Option<serde_json::Value>,
    created_by: Uuid,
}

impl TryFrom<DbVersion> for Version {
    type Error = OrchestratorError;

    fn try_from(row: DbVersion) -> Result<Self> {
        Ok(Version {
            id: row.id,
            project_id: row.project_id,
            version_number: row.version_number,
            spec_snapshot: serde_json::from_value(row.spec_snapshot)
                .map_err(|e| OrchestratorError::Internal(format!("bad spec json: {e}")))?,
            code_diff: row
                .code_diff
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| OrchestratorError::Internal(format!("bad diff json: {e}")))?,
            created_by: row.created_by,
        })
    }
}

#[derive(FromRow)]
struct DbBuild {
    id: Uuid,
    project_id: Uuid,
    version_id: Uuid,
    status: String,
    attempt_number: i32,
    build_logs: String,
    lint_output: String,
    build_output: String,
    error_message: Option<String>,
    preview_url: Option<String>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbBuild> for Build {
    type Error = OrchestratorError;

    fn try_from(row: DbBuild) -> Result<Self> {
        Ok(Build {
            id: row.id,
            project_id: row.project_id,
            version_id: row.version_id,
            status: parse_build_status(&row.status)?,
            attempt_number: row.attempt_number,
            build_logs: row.build_logs,
            lint_output: row.lint_output,
            build_output: row.build_output,
            error_message: row.error_message,
            preview_url: row.preview_url,
            completed_at: row.completed_at,
        })
    }
}

fn parse_build_status(s: &str) -> Result<BuildStatus> {
    match s {
        "pending" => Ok(BuildStatus::Pending),
        "building" => Ok(BuildStatus::Building),
        "repairing" => Ok(BuildStatus::Repairing),
        "success" => Ok(BuildStatus::Success),
        "failed" => Ok(BuildStatus::Failed),
        other => Err(OrchestratorError::Internal(format!("unknown build status: {other}"))),
    }
}

fn build_status_str(status: BuildStatus) -> &'static str {
    match status {
        BuildStatus::Pending => "pending",
        BuildStatus::Building => "building",
        BuildStatus::Repairing => "repairing",
        BuildStatus::Success => "success",
        BuildStatus::Failed => "failed",
    }
}

#[derive(FromRow)]
struct DbChatMessage {
    id: Uuid,
    project_id: Uuid,
    principal_id: Uuid,
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<DbChatMessage> for ChatMessage {
    type Error = OrchestratorError;

    fn try_from(row: DbChatMessage) -> Result<Self> {
        Ok(ChatMessage {
            id: row.id,
            project_id: row.project_id,
            principal_id: row.principal_id,
            role: match row.role.as_str() {
                "user" => ChatRole::User,
                "assistant" => ChatRole::Assistant,
                other => {
                    return Err(OrchestratorError::Internal(format!("unknown chat role: {other}")))
                }
            },
            content: row.content,
            created_at: row.created_at,
        })
    }
}

fn chat_role_str(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
    }
}

struct PgProjectLock {
    conn: sqlx::pool::PoolConnection<sqlx::Postgres>,
    key: i64,
}

#[async_trait]
impl ProjectLock for PgProjectLock {
    async fn release(mut self: Box<Self>) {
        let _ = sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(self.key)
            .execute(&mut *self.conn)
            .await;
    }
}

/// Advisory lock keys are signed 64-bit; fold the UUID down via its
/// low 8 bytes, which is stable for a given project for the process
/// lifetime of the lock.
fn advisory_key(project_id: Uuid) -> i64 {
    let bytes = project_id.as_bytes();
    i64::from_le_bytes(bytes[0..8].try_into().unwrap())
}

#[async_trait]
impl Store for PgStore {
    async fn get_principal(&self, id: Uuid) -> Result<Principal> {
        let row = sqlx::query_as::<_, DbPrincipal>(
            "SELECT id, email, role, credits FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(OrchestratorError::NotFound)?;
        row.try_into()
    }

    async fn record_transaction(
        &self,
        principal_id: Uuid,
        amount: Decimal,
        kind: TransactionKind,
        description: &str,
        project_id: Option<Uuid>,
    ) -> Result<(Decimal, Uuid)> {
        let mut tx = self.pool.begin().await?;

        let new_balance: Decimal = sqlx::query_scalar(
            "UPDATE users SET credits = credits + $1 WHERE id = $2 RETURNING credits",
        )
        .bind(amount)
        .bind(principal_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(OrchestratorError::NotFound)?;

        if new_balance < Decimal::ZERO {
            tx.rollback().await?;
            return Err(OrchestratorError::InsufficientCredits {
                required: -amount,
                available: new_balance - amount,
            });
        }

        let txn_id: Uuid = sqlx::query_scalar(
            "INSERT INTO credit_transactions (id, principal_id, amount, kind, description, project_id, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, now()) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(principal_id)
        .bind(amount)
        .bind(kind_str(kind))
        .bind(description)
        .bind(project_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((new_balance, txn_id))
    }

    async fn list_recent_transactions(
        &self,
        principal_id: Uuid,
        limit: usize,
    ) -> Result<Vec<CreditTransaction>> {
        let rows = sqlx::query_as::<_, DbTransaction>(
            "SELECT id, principal_id, amount, kind, description, project_id, created_at
             FROM credit_transactions WHERE principal_id = $1
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(principal_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get_project(&self, id: Uuid) -> Result<Project> {
        let row = sqlx::query_as::<_, DbProject>(
            "SELECT id, owner_id, name, initial_prompt, current_spec, status, preview_url, published_url, watermark_enabled
             FROM projects WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(OrchestratorError::NotFound)?;
        row.try_into()
    }

    async fn list_projects(&self, owner_id: Uuid) -> Result<Vec<Project>> {
        let rows = sqlx::query_as::<_, DbProject>(
            "SELECT id, owner_id, name, initial_prompt, current_spec, status, preview_url, published_url, watermark_enabled
             FROM projects WHERE owner_id = $1 ORDER BY name",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn insert_project(&self, project: Project) -> Result<Project> {
        let spec_json = serde_json::to_value(&project.current_spec)
            .map_err(|e| OrchestratorError::Internal(format!("bad spec json: {e}")))?;
        sqlx::query(
            "INSERT INTO projects (id, owner_id, name, initial_prompt, current_spec, status, preview_url, published_url, watermark_enabled)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(project.id)
        .bind(project.owner_id)
        .bind(&project.name)
        .bind(&project.initial_prompt)
        .bind(spec_json)
        .bind(project_status_str(project.status))
        .bind(&project.preview_url)
        .bind(&project.published_url)
        .bind(project.watermark_enabled)
        .execute(&self.pool)
        .await?;
        Ok(project)
    }

    async fn update_project_status(
        &self,
        id: Uuid,
        status: ProjectStatus,
        preview_url: Option<String>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE projects SET status = $1, preview_url = COALESCE($2, preview_url) WHERE id = $3",
        )
        .bind(project_status_str(status))
        .bind(preview_url)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_project_spec(&self, id: Uuid, spec: ProjectSpec) -> Result<()> {
        let spec_json = serde_json::to_value(&spec)
            .map_err(|e| OrchestratorError::Internal(format!("bad spec json: {e}")))?;
        sqlx::query("UPDATE projects SET current_spec = $1 WHERE id = $2")
            .bind(spec_json)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn acquire_project_lock(&self, project_id: Uuid) -> Result<Box<dyn ProjectLock>> {
        let mut conn = self.pool.acquire().await?;
        let key = advisory_key(project_id);
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(key)
            .execute(&mut *conn)
            .await?;
        Ok(Box::new(PgProjectLock { conn, key }))
    }

    async fn next_version_number(&self, project_id: Uuid) -> Result<i32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM project_versions WHERE project_id = $1",
        )
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as i32 + 1)
    }

    async fn insert_version(&self, version: Version) -> Result<Version> {
        let spec_json = serde_json::to_value(&version.spec_snapshot)
            .map_err(|e| OrchestratorError::Internal(format!("bad spec json: {e}")))?;
        let diff_json = version
            .code_diff
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| OrchestratorError::Internal(format!("bad diff json: {e}")))?;
        sqlx::query(
            "INSERT INTO project_versions (id, project_id, version_number, spec_snapshot, code_diff, created_by)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(version.id)
        .bind(version.project_id)
        .bind(version.version_number)
        .bind(spec_json)
        .bind(diff_json)
        .bind(version.created_by)
        .execute(&self.pool)
        .await?;
        Ok(version)
    }

    async fn get_version(&self, id: Uuid) -> Result<Version> {
        let row = sqlx::query_as::<_, DbVersion>(
            "SELECT id, project_id, version_number, spec_snapshot, code_diff, created_by
             FROM project_versions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(OrchestratorError::NotFound)?;
        row.try_into()
    }

    async fn list_versions(&self, project_id: Uuid) -> Result<Vec<Version>> {
        let rows = sqlx::query_as::<_, DbVersion>(
            "SELECT id, project_id, version_number, spec_snapshot, code_diff, created_by
             FROM project_versions WHERE project_id = $1 ORDER BY version_number DESC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn latest_version(&self, project_id: Uuid) -> Result<Version> {
        let row = sqlx::query_as::<_, DbVersion>(
            "SELECT id, project_id, version_number, spec_snapshot, code_diff, created_by
             FROM project_versions WHERE project_id = $1 ORDER BY version_number DESC LIMIT 1",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(OrchestratorError::NotFound)?;
        row.try_into()
    }

    async fn insert_build(&self, build: Build) -> Result<Build> {
        sqlx::query(
            "INSERT INTO builds (id, project_id, version_id, status, attempt_number, build_logs, lint_output, build_output, error_message, preview_url, completed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(build.id)
        .bind(build.project_id)
        .bind(build.version_id)
        .bind(build_status_str(build.status))
        .bind(build.attempt_number)
        .bind(&build.build_logs)
        .bind(&build.lint_output)
        .bind(&build.build_output)
        .bind(&build.error_message)
        .bind(&build.preview_url)
        .bind(build.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(build)
    }

    async fn update_build(&self, build: Build) -> Result<Build> {
        sqlx::query(
            "UPDATE builds SET status = $1, attempt_number = $2, build_logs = $3, lint_output = $4,
             build_output = $5, error_message = $6, preview_url = $7, completed_at = $8 WHERE id = $9",
        )
        .bind(build_status_str(build.status))
        .bind(build.attempt_number)
        .bind(&build.build_logs)
        .bind(&build.lint_output)
        .bind(&build.build_output)
        .bind(&build.error_message)
        .bind(&build.preview_url)
        .bind(build.completed_at)
        .bind(build.id)
        .execute(&self.pool)
        .await?;
        Ok(build)
    }

    async fn get_build(&self, id: Uuid) -> Result<Build> {
        let row = sqlx::query_as::<_, DbBuild>(
            "SELECT id, project_id, version_id, status, attempt_number, build_logs, lint_output, build_output, error_message, preview_url, completed_at
             FROM builds WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(OrchestratorError::NotFound)?;
        row.try_into()
    }

    async fn latest_build(&self, project_id: Uuid) -> Result<Build> {
        let row = sqlx::query_as::<_, DbBuild>(
            "SELECT id, project_id, version_id, status, attempt_number, build_logs, lint_output, build_output, error_message, preview_url, completed_at
             FROM builds WHERE project_id = $1 ORDER BY completed_at DESC NULLS FIRST LIMIT 1",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(OrchestratorError::NotFound)?;
        row.try_into()
    }

    async fn list_builds(&self, project_id: Uuid) -> Result<Vec<Build>> {
        let rows = sqlx::query_as::<_, DbBuild>(
            "SELECT id, project_id, version_id, status, attempt_number, build_logs, lint_output, build_output, error_message, preview_url, completed_at
             FROM builds WHERE project_id = $1",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn insert_chat_message(
        &self,
        project_id: Uuid,
        principal_id: Uuid,
        role: ChatRole,
        content: &str,
    ) -> Result<ChatMessage> {
        let row = sqlx::query_as::<_, DbChatMessage>(
            "INSERT INTO chat_messages (id, project_id, principal_id, role, content, created_at)
             VALUES ($1, $2, $3, $4, $5, now())
             RETURNING id, project_id, principal_id, role, content, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(project_id)
        .bind(principal_id)
        .bind(chat_role_str(role))
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn list_chat_messages(&self, project_id: Uuid) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query_as::<_, DbChatMessage>(
            "SELECT id, project_id, principal_id, role, content, created_at
             FROM chat_messages WHERE project_id = $1 ORDER BY created_at ASC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn rate_limit_try_increment(
        &self,
        principal_id: Uuid,
        endpoint: &str,
        window_start_s: i64,
        _window_s: i64,
        max: u32,
    ) -> Result<bool> {
        // The WHERE clause on the DO UPDATE makes the check and the
        // increment one atomic step: a row already at `max` is left
        // untouched and RETURNING yields nothing, so two concurrent
        // requests in the same window can't both read "under limit" and
        // both increment past it.
        let admitted: Option<i32> = sqlx::query_scalar(
            "INSERT INTO rate_limit_windows (principal_id, endpoint, window_start_s, request_count)
             VALUES ($1, $2, $3, 1)
             ON CONFLICT (principal_id, endpoint, window_start_s)
             DO UPDATE SET request_count = rate_limit_windows.request_count + 1
             WHERE rate_limit_windows.request_count < $4
             RETURNING request_count",
        )
        .bind(principal_id)
        .bind(endpoint)
        .bind(window_start_s)
        .bind(max as i32)
        .fetch_optional(&self.pool)
        .await?;

        sqlx::query("DELETE FROM rate_limit_windows WHERE endpoint = $1 AND window_start_s < $2")
            .bind(endpoint)
            .bind(window_start_s)
            .execute(&self.pool)
            .await?;

        Ok(admitted.is_some())
    }
}

#[allow(dead_code)]
fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s).map_err(|e| OrchestratorError::Internal(format!("bad decimal: {e}")))
}
