//! Rate Limiter (C2)
//!
//! Fixed-window counter keyed by `(principal, endpoint, floor(now/window))`.
//! Two backends conform to the same `RateLimitBackend` trait: a
//! process-local map for single-process/dev deployments, and the
//! durable `Store`-backed counter for multi-process production. Old
//! windows are garbage-collected opportunistically on write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::Result;
use crate::store::Store;

#[async_trait]
pub trait RateLimitBackend: Send + Sync {
    /// Checks the counter for `(principal, endpoint, window)` against
    /// `max` and increments only if still under it. Returns `true` iff
    /// the request is admitted; a denied request never grows the stored
    /// counter past `max`.
    async fn try_increment(
        &self,
        principal_id: Uuid,
        endpoint: &str,
        window_start_s: i64,
        window_s: i64,
        max: u32,
    ) -> Result<bool>;
}

/// Single-process, time-keyed counter. Acceptable for dev; a multi-process
/// deployment must use the durable backend instead.
#[derive(Default)]
pub struct InMemoryRateLimitBackend {
    counters: Mutex<HashMap<(Uuid, String, i64), u32>>,
}

impl InMemoryRateLimitBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitBackend for InMemoryRateLimitBackend {
    async fn try_increment(
        &self,
        principal_id: Uuid,
        endpoint: &str,
        window_start_s: i64,
        _window_s: i64,
        max: u32,
    ) -> Result<bool> {
        let mut counters = self.counters.lock().unwrap();
        counters.retain(|(_, e, w), _| e != endpoint || *w == window_start_s);
        let counter = counters
            .entry((principal_id, endpoint.to_string(), window_start_s))
            .or_insert(0);
        if *counter >= max {
            return Ok(false);
        }
        *counter += 1;
        Ok(true)
    }
}

/// Delegates to the durable store's atomic increment, for multi-process
/// production deployments.
pub struct StoreRateLimitBackend {
    store: Arc<dyn Store>,
}

impl StoreRateLimitBackend {
    pub fn new(store: Arc<dyn Store>) -> Self {
        StoreRateLimitBackend { store }
    }
}

#[async_trait]
impl RateLimitBackend for StoreRateLimitBackend {
    async fn try_increment(
        &self,
        principal_id: Uuid,
        endpoint: &str,
        window_start_s: i64,
        window_s: i64,
        max: u32,
    ) -> Result<bool> {
        self.store
            .rate_limit_try_increment(principal_id, endpoint, window_start_s, window_s, max)
            .await
    }
}

/// `true` iff this request is allowed under the fixed window; exceeding
/// requests are not counted against future windows, so the stored
/// counter never grows past `max`.
pub async fn allow(
    backend: &dyn RateLimitBackend,
    principal_id: Uuid,
    endpoint: &str,
    max: u32,
    window_s: u64,
) -> Result<bool> {
    let now = Utc::now().timestamp();
    let window_start = now - now.rem_euclid(window_s as i64);
    backend
        .try_increment(principal_id, endpoint, window_start, window_s as i64, max)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_max_requests_per_window() {
        let backend = InMemoryRateLimitBackend::new();
        let principal = Uuid::new_v4();

        for _ in 0..10 {
            assert!(allow(&backend, principal, "prompt", 10, 60).await.unwrap());
        }
        assert!(!allow(&backend, principal, "prompt", 10, 60).await.unwrap());
    }

    #[tokio::test]
    async fn denied_requests_do_not_grow_the_counter_past_max() {
        let backend = InMemoryRateLimitBackend::new();
        let principal = Uuid::new_v4();
        let now = Utc::now().timestamp();
        let window_start = now - now.rem_euclid(60);

        for _ in 0..10 {
            assert!(allow(&backend, principal, "prompt", 10, 60).await.unwrap());
        }
        for _ in 0..5 {
            assert!(!allow(&backend, principal, "prompt", 10, 60).await.unwrap());
        }

        let counters = backend.counters.lock().unwrap();
        assert_eq!(counters[&(principal, "prompt".to_string(), window_start)], 10);
    }

    #[tokio::test]
    async fn counters_are_isolated_per_endpoint() {
        let backend = InMemoryRateLimitBackend::new();
        let principal = Uuid::new_v4();

        for _ in 0..10 {
            assert!(allow(&backend, principal, "prompt", 10, 60).await.unwrap());
        }
        assert!(allow(&backend, principal, "rebuild", 10, 60).await.unwrap());
    }
}
