use orchestrator_core::rate_limit::{allow, InMemoryRateLimitBackend};
use uuid::Uuid;

#[tokio::test]
async fn tenth_request_allowed_eleventh_denied() {
    let backend = InMemoryRateLimitBackend::new();
    let principal = Uuid::new_v4();

    for i in 1..=10 {
        assert!(
            allow(&backend, principal, "prompt", 10, 60).await.unwrap(),
            "request {i} should be allowed"
        );
    }
    assert!(!allow(&backend, principal, "prompt", 10, 60).await.unwrap());
}

#[tokio::test]
async fn distinct_principals_do_not_share_a_counter() {
    let backend = InMemoryRateLimitBackend::new();
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    for _ in 0..10 {
        assert!(allow(&backend, a, "prompt", 10, 60).await.unwrap());
    }
    assert!(!allow(&backend, a, "prompt", 10, 60).await.unwrap());
    assert!(allow(&backend, b, "prompt", 10, 60).await.unwrap());
}
