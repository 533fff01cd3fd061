//! In-process `Store` implementation used by the integration test suite.
//! Satisfies the same transactional and locking contract as `PgStore`:
//! balance mutation and transaction insert happen under one mutex guard,
//! and the project lock is a real mutex so concurrency tests can assert
//! strict serialization.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::models::{
    Build, ChatMessage, ChatRole, CreditTransaction, Principal, Project, ProjectSpec,
    ProjectStatus, Role, TransactionKind, Version,
};
use crate::store::{ProjectLock, Store};

#[derive(Default)]
struct Inner {
    principals: HashMap<Uuid, Principal>,
    transactions: HashMap<Uuid, Vec<CreditTransaction>>,
    projects: HashMap<Uuid, Project>,
    versions: HashMap<Uuid, Vec<Version>>,
    builds: HashMap<Uuid, Vec<Build>>,
    chat_messages: HashMap<Uuid, Vec<ChatMessage>>,
    rate_limit_counters: HashMap<(Uuid, String, i64), u32>,
    project_locks: HashMap<Uuid, Arc<Mutex<()>>>,
}

/// Fast in-memory `Store`. Not persisted; intended for tests only.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Test helper: creates a principal with the given starting balance
    /// and returns its id.
    pub async fn seed_principal(&self, credits: Decimal) -> Uuid {
        let id = Uuid::new_v4();
        let mut inner = self.inner.lock().await;
        inner.principals.insert(
            id,
            Principal {
                id,
                email: format!("{id}@example.test"),
                role: Role::Free,
                credits,
            },
        );
        inner.transactions.insert(id, Vec::new());
        id
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

struct MemoryProjectLock {
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl ProjectLock for MemoryProjectLock {
    async fn release(self: Box<Self>) {}
}

fn lock_for(inner: &mut MutexGuard<'_, Inner>, project_id: Uuid) -> Arc<Mutex<()>> {
    inner
        .project_locks
        .entry(project_id)
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_principal(&self, id: Uuid) -> Result<Principal> {
        let inner = self.inner.lock().await;
        inner.principals.get(&id).cloned().ok_or(OrchestratorError::NotFound)
    }

    async fn record_transaction(
        &self,
        principal_id: Uuid,
        amount: Decimal,
        kind: TransactionKind,
        description: &str,
        project_id: Option<Uuid>,
    ) -> Result<(Decimal, Uuid)> {
        let mut inner = self.inner.lock().await;
        let principal = inner
            .principals
            .get_mut(&principal_id)
            .ok_or(OrchestratorError::NotFound)?;
        let new_balance = principal.credits + amount;
        if new_balance < Decimal::ZERO {
            return Err(OrchestratorError::InsufficientCredits {
                required: -amount,
                available: principal.credits,
            });
        }
        principal.credits = new_balance;

        let txn = CreditTransaction {
            id: Uuid::new_v4(),
            principal_id,
            amount,
            kind,
            description: description.to_string(),
            project_id,
            created_at: Utc::now(),
        };
        let txn_id = txn.id;
        inner.transactions.entry(principal_id).or_default().push(txn);
        Ok((new_balance, txn_id))
    }

    async fn list_recent_transactions(
        &self,
        principal_id: Uuid,
        limit: usize,
    ) -> Result<Vec<CreditTransaction>> {
        let inner = self.inner.lock().await;
        let mut txns = inner
            .transactions
            .get(&principal_id)
            .cloned()
            .unwrap_or_default();
        txns.sort_by_key(|t| std::cmp::Reverse(t.created_at));
        txns.truncate(limit);
        Ok(txns)
    }

    async fn get_project(&self, id: Uuid) -> Result<Project> {
        let inner = self.inner.lock().await;
        inner.projects.get(&id).cloned().ok_or(OrchestratorError::NotFound)
    }

    async fn list_projects(&self, owner_id: Uuid) -> Result<Vec<Project>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .projects
            .values()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn insert_project(&self, project: Project) -> Result<Project> {
        let mut inner = self.inner.lock().await;
        inner.projects.insert(project.id, project.clone());
        inner.versions.entry(project.id).or_default();
        inner.builds.entry(project.id).or_default();
        inner.chat_messages.entry(project.id).or_default();
        Ok(project)
    }

    async fn update_project_status(
        &self,
        id: Uuid,
        status: ProjectStatus,
        preview_url: Option<String>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let project = inner.projects.get_mut(&id).ok_or(OrchestratorError::NotFound)?;
        project.status = status;
        if preview_url.is_some() {
            project.preview_url = preview_url;
        }
        Ok(())
    }

    async fn update_project_spec(&self, id: Uuid, spec: ProjectSpec) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let project = inner.projects.get_mut(&id).ok_or(OrchestratorError::NotFound)?;
        project.current_spec = spec;
        Ok(())
    }

    async fn acquire_project_lock(&self, project_id: Uuid) -> Result<Box<dyn ProjectLock>> {
        let mutex = {
            let mut inner = self.inner.lock().await;
            lock_for(&mut inner, project_id)
        };
        let guard = mutex.lock_owned().await;
        Ok(Box::new(MemoryProjectLock { _guard: guard }))
    }

    async fn next_version_number(&self, project_id: Uuid) -> Result<i32> {
        let inner = self.inner.lock().await;
        let count = inner.versions.get(&project_id).map(|v| v.len()).unwrap_or(0);
        Ok(count as i32 + 1)
    }

    async fn insert_version(&self, version: Version) -> Result<Version> {
        let mut inner = self.inner.lock().await;
        inner
            .versions
            .entry(version.project_id)
            .or_default()
            .push(version.clone());
        Ok(version)
    }

    async fn get_version(&self, id: Uuid) -> Result<Version> {
        let inner = self.inner.lock().await;
        inner
            .versions
            .values()
            .flatten()
            .find(|v| v.id == id)
            .cloned()
            .ok_or(OrchestratorError::NotFound)
    }

    async fn list_versions(&self, project_id: Uuid) -> Result<Vec<Version>> {
        let inner = self.inner.lock().await;
        let mut versions = inner.versions.get(&project_id).cloned().unwrap_or_default();
        versions.sort_by_key(|v| std::cmp::Reverse(v.version_number));
        Ok(versions)
    }

    async fn latest_version(&self, project_id: Uuid) -> Result<Version> {
        let inner = self.inner.lock().await;
        inner
            .versions
            .get(&project_id)
            .and_then(|vs| vs.iter().max_by_key(|v| v.version_number))
            .cloned()
            .ok_or(OrchestratorError::NotFound)
    }

    async fn insert_build(&self, build: Build) -> Result<Build> {
        let mut inner = self.inner.lock().await;
        inner.builds.entry(build.project_id).or_default().push(build.clone());
        Ok(build)
    }

    async fn update_build(&self, build: Build) -> Result<Build> {
        let mut inner = self.inner.lock().await;
        let builds = inner.builds.entry(build.project_id).or_default();
        if let Some(existing) = builds.iter_mut().find(|b| b.id == build.id) {
            *existing = build.clone();
        } else {
            builds.push(build.clone());
        }
        Ok(build)
    }

    async fn get_build(&self, id: Uuid) -> Result<Build> {
        let inner = self.inner.lock().await;
        inner
            .builds
            .values()
            .flatten()
            .find(|b| b.id == id)
            .cloned()
            .ok_or(OrchestratorError::NotFound)
    }

    async fn latest_build(&self, project_id: Uuid) -> Result<Build> {
        let inner = self.inner.lock().await;
        inner
            .builds
            .get(&project_id)
            .and_then(|bs| bs.last())
            .cloned()
            .ok_or(OrchestratorError::NotFound)
    }

    async fn list_builds(&self, project_id: Uuid) -> Result<Vec<Build>> {
        let inner = self.inner.lock().await;
        Ok(inner.builds.get(&project_id).cloned().unwrap_or_default())
    }

    async fn insert_chat_message(
        &self,
        project_id: Uuid,
        principal_id: Uuid,
        role: ChatRole,
        content: &str,
    ) -> Result<ChatMessage> {
        let mut inner = self.inner.lock().await;
        let message = ChatMessage {
            id: Uuid::new_v4(),
            project_id,
            principal_id,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        inner
            .chat_messages
            .entry(project_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn list_chat_messages(&self, project_id: Uuid) -> Result<Vec<ChatMessage>> {
        let inner = self.inner.lock().await;
        let mut messages = inner.chat_messages.get(&project_id).cloned().unwrap_or_default();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn rate_limit_try_increment(
        &self,
        principal_id: Uuid,
        endpoint: &str,
        window_start_s: i64,
        _window_s: i64,
        max: u32,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let key = (principal_id, endpoint.to_string(), window_start_s);
        inner.rate_limit_counters.retain(|(_, e, w), _| e != endpoint || *w == window_start_s);
        let counter = inner.rate_limit_counters.entry(key).or_insert(0);
        if *counter >= max {
            return Ok(false);
        }
        *counter += 1;
        Ok(true)
    }
}
