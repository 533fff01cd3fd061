//! Project creation differs from a normal iteration only by a template
//! copy and placeholder substitution; this module is that seam.

use std::path::Path;

use chrono::Datelike;

use crate::error::{OrchestratorError, Result};

/// Copies `template_dir` into `project_dir` recursively, substituting
/// `{{PROJECT_NAME}}`, `{{YEAR}}`, and theme color placeholders in every
/// text file's contents along the way.
pub async fn materialize(
    template_dir: &Path,
    project_dir: &Path,
    project_name: &str,
    primary_color: &str,
    secondary_color: &str,
) -> Result<()> {
    let year = chrono::Utc::now().year();
    copy_dir_recursive(template_dir, project_dir, project_name, year, primary_color, secondary_color)
        .await
}

fn copy_dir_recursive<'a>(
    src: &'a Path,
    dst: &'a Path,
    project_name: &'a str,
    year: i32,
    primary_color: &'a str,
    secondary_color: &'a str,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        tokio::fs::create_dir_all(dst)
            .await
            .map_err(|e| OrchestratorError::Internal(format!("create_dir_all: {e}")))?;

        let mut entries = tokio::fs::read_dir(src)
            .await
            .map_err(|e| OrchestratorError::Internal(format!("read_dir: {e}")))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| OrchestratorError::Internal(format!("read_dir entry: {e}")))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| OrchestratorError::Internal(format!("file_type: {e}")))?;
            let dst_path = dst.join(entry.file_name());

            if file_type.is_dir() {
                copy_dir_recursive(
                    &entry.path(),
                    &dst_path,
                    project_name,
                    year,
                    primary_color,
                    secondary_color,
                )
                .await?;
            } else {
                let content = tokio::fs::read_to_string(entry.path()).await;
                match content {
                    Ok(text) => {
                        let replaced = replace_placeholders(
                            &text,
                            project_name,
                            year,
                            primary_color,
                            secondary_color,
                        );
                        tokio::fs::write(&dst_path, replaced)
                            .await
                            .map_err(|e| OrchestratorError::Internal(format!("write: {e}")))?;
                    }
                    Err(_) => {
                        tokio::fs::copy(entry.path(), &dst_path)
                            .await
                            .map_err(|e| OrchestratorError::Internal(format!("copy: {e}")))?;
                    }
                }
            }
        }
        Ok(())
    })
}

fn replace_placeholders(
    text: &str,
    project_name: &str,
    year: i32,
    primary_color: &str,
    secondary_color: &str,
) -> String {
    text.replace("{{PROJECT_NAME}}", project_name)
        .replace("{{YEAR}}", &year.to_string())
        .replace("{{THEME_PRIMARY}}", primary_color)
        .replace("{{THEME_SECONDARY}}", secondary_color)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_all_placeholders() {
        let out = replace_placeholders(
            "<title>{{PROJECT_NAME}}</title> <!-- {{YEAR}} --> <style>{{THEME_PRIMARY}} {{THEME_SECONDARY}}</style>",
            "Landing",
            2026,
            "#111",
            "#222",
        );
        assert_eq!(
            out,
            "<title>Landing</title> <!-- 2026 --> <style>#111 #222</style>"
        );
    }
}
