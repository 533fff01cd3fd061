//! Apply + local verification (C3 §4.3, §9 "File operations as scoped
//! transactions"). Saves the pre-application content of every touched
//! file, writes the new contents, runs the local verifier, and restores
//! the originals atomically if verification fails.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{OrchestratorError, Result};

const MAX_VERIFIER_ERROR_LEN: usize = 500;
const LINT_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait LocalVerifier: Send + Sync {
    /// Runs the project's linter (or equivalent) against `project_dir`.
    /// `Ok(())` on a zero exit code; `Err(stderr)` otherwise.
    async fn verify(&self, project_dir: &Path) -> std::result::Result<(), String>;
}

/// A verifier that always succeeds, for environments with no linter
/// installed (unit tests, minimal templates).
pub struct NoopVerifier;

#[async_trait]
impl LocalVerifier for NoopVerifier {
    async fn verify(&self, _project_dir: &Path) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Shells out to `npm run lint` in `project_dir` with a bounded timeout.
/// A missing `npm` binary or a timeout is treated as "no linter available"
/// and passes; only a nonzero exit is a verification failure.
pub struct LintVerifier {
    timeout: Duration,
}

impl LintVerifier {
    pub fn new() -> Self {
        Self { timeout: LINT_TIMEOUT }
    }
}

impl Default for LintVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalVerifier for LintVerifier {
    async fn verify(&self, project_dir: &Path) -> std::result::Result<(), String> {
        let output = tokio::time::timeout(
            self.timeout,
            Command::new("npm").args(["run", "lint"]).current_dir(project_dir).output(),
        )
        .await;

        let output = match output {
            Ok(Ok(output)) => output,
            Ok(Err(_)) | Err(_) => return Ok(()),
        };

        if output.status.success() {
            Ok(())
        } else {
            Err(String::from_utf8_lossy(&output.stderr).into_owned())
        }
    }
}

/// Applies `changes` (path -> new content, relative to `project_dir`)
/// under a save/apply/verify/restore transaction. On verifier failure,
/// every touched file is restored to its pre-application content (or
/// removed, if it did not previously exist) before returning the error.
pub async fn apply_and_verify(
    project_dir: &Path,
    changes: &BTreeMap<String, String>,
    verifier: &dyn LocalVerifier,
) -> Result<()> {
    let mut originals: Vec<(String, Option<String>)> = Vec::new();

    for path in changes.keys() {
        let full = project_dir.join(path);
        let original = tokio::fs::read_to_string(&full).await.ok();
        originals.push((path.clone(), original));
    }

    for (path, content) in changes {
        let full = project_dir.join(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                OrchestratorError::Internal(format!("create_dir_all {}: {e}", parent.display()))
            })?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| OrchestratorError::Internal(format!("write {path}: {e}")))?;
    }

    if let Err(stderr) = verifier.verify(project_dir).await {
        restore(project_dir, &originals).await?;
        let truncated: String = stderr.chars().take(MAX_VERIFIER_ERROR_LEN).collect();
        return Err(OrchestratorError::LocalVerifyFailed(truncated));
    }

    Ok(())
}

async fn restore(project_dir: &Path, originals: &[(String, Option<String>)]) -> Result<()> {
    for (path, original) in originals {
        let full = project_dir.join(path);
        match original {
            Some(content) => {
                tokio::fs::write(&full, content).await.map_err(|e| {
                    OrchestratorError::Internal(format!("restore {path}: {e}"))
                })?;
            }
            None => {
                let _ = tokio::fs::remove_file(&full).await;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct FailingVerifier;

    #[async_trait]
    impl LocalVerifier for FailingVerifier {
        async fn verify(&self, _project_dir: &Path) -> std::result::Result<(), String> {
            Err("lint error: unexpected token".to_string())
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("orchestrator-core-test-{name}-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn successful_apply_persists_changes() {
        let dir = temp_dir("apply-ok");
        std::fs::write(dir.join("a.txt"), "before").unwrap();

        let mut changes = BTreeMap::new();
        changes.insert("a.txt".to_string(), "after".to_string());

        apply_and_verify(&dir, &changes, &NoopVerifier).await.unwrap();
        assert_eq!(std::fs::read_to_string(dir.join("a.txt")).unwrap(), "after");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn failed_verification_restores_originals() {
        let dir = temp_dir("apply-restore");
        std::fs::write(dir.join("a.txt"), "before").unwrap();

        let mut changes = BTreeMap::new();
        changes.insert("a.txt".to_string(), "after".to_string());
        changes.insert("new.txt".to_string(), "brand new".to_string());

        let err = apply_and_verify(&dir, &changes, &FailingVerifier)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::LocalVerifyFailed(_)));

        assert_eq!(std::fs::read_to_string(dir.join("a.txt")).unwrap(), "before");
        assert!(!dir.join("new.txt").exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
