//! Version/Project Store Adapter (C8)
//!
//! A trait so the orchestrator runs identically against an in-process
//! store (fast integration tests) or the Postgres-backed production
//! store; both satisfy the same transactional and locking contract.
//! The core never assembles query strings — every access is a named
//! operation on this trait.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Build, ChatMessage, ChatRole, CreditTransaction, Principal, Project, ProjectSpec,
    ProjectStatus, TransactionKind, Version,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// An RAII-style guard representing the held per-project advisory lock.
/// Dropping it releases the lock on every exit path, including panics
/// and early returns via `?`.
#[async_trait]
pub trait ProjectLock: Send {
    async fn release(self: Box<Self>);
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_principal(&self, id: Uuid) -> Result<Principal>;

    async fn record_transaction(
        &self,
        principal_id: Uuid,
        amount: Decimal,
        kind: TransactionKind,
        description: &str,
        project_id: Option<Uuid>,
    ) -> Result<(Decimal, Uuid)>;

    async fn list_recent_transactions(
        &self,
        principal_id: Uuid,
        limit: usize,
    ) -> Result<Vec<CreditTransaction>>;

    async fn get_project(&self, id: Uuid) -> Result<Project>;

    async fn list_projects(&self, owner_id: Uuid) -> Result<Vec<Project>>;

    async fn insert_project(&self, project: Project) -> Result<Project>;

    async fn update_project_status(
        &self,
        id: Uuid,
        status: ProjectStatus,
        preview_url: Option<String>,
    ) -> Result<()>;

    async fn update_project_spec(&self, id: Uuid, spec: ProjectSpec) -> Result<()>;

    /// Acquires the per-project advisory lock, blocking with a short
    /// timeout. Releases on drop of the returned guard.
    async fn acquire_project_lock(&self, project_id: Uuid) -> Result<Box<dyn ProjectLock>>;

    async fn next_version_number(&self, project_id: Uuid) -> Result<i32>;

    async fn insert_version(&self, version: Version) -> Result<Version>;

    async fn get_version(&self, id: Uuid) -> Result<Version>;

    async fn list_versions(&self, project_id: Uuid) -> Result<Vec<Version>>;

    async fn latest_version(&self, project_id: Uuid) -> Result<Version>;

    async fn insert_build(&self, build: Build) -> Result<Build>;

    async fn update_build(&self, build: Build) -> Result<Build>;

    async fn get_build(&self, id: Uuid) -> Result<Build>;

    async fn latest_build(&self, project_id: Uuid) -> Result<Build>;

    async fn list_builds(&self, project_id: Uuid) -> Result<Vec<Build>>;

    async fn insert_chat_message(
        &self,
        project_id: Uuid,
        principal_id: Uuid,
        role: ChatRole,
        content: &str,
    ) -> Result<ChatMessage>;

    async fn list_chat_messages(&self, project_id: Uuid) -> Result<Vec<ChatMessage>>;

    /// Fixed-window rate-limit check for the durable backend: atomically
    /// checks the counter for `(principal, endpoint, window)` against
    /// `max` and increments only if still under it, garbage-collecting
    /// stale windows opportunistically. Returns `true` iff the request
    /// was admitted.
    async fn rate_limit_try_increment(
        &self,
        principal_id: Uuid,
        endpoint: &str,
        window_start_s: i64,
        window_s: i64,
        max: u32,
    ) -> Result<bool>;
}
