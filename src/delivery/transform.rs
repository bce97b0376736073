//! External image filter run on a downloaded file before it is pushed.
//!
//! The command template is split on whitespace; `{input}` and `{output}`
//! are replaced with the source and destination paths.

use std::path::{Path, PathBuf};

use tokio::process::Command;

use super::file::reserve_temp_path;

#[derive(Debug, Clone, Default)]
pub struct ImageTransform {
    command: Option<String>,
}

impl ImageTransform {
    pub fn new(command: Option<String>) -> Self {
        Self {
            command: command.filter(|c| !c.trim().is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.command.is_some()
    }

    /// Run the filter on `input`, writing a new file in `work_dir`.
    ///
    /// Returns the transformed file, or `None` when no command is configured
    /// or the command failed. The caller keeps using `input` in that case.
    pub async fn apply(&self, input: &Path, work_dir: &Path) -> Option<PathBuf> {
        let template = self.command.as_deref()?;
        let output = match reserve_temp_path(work_dir, "framefeed-transformed-", "jpg") {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("Could not create transform output file: {}", e);
                return None;
            }
        };
        // Empty means the command never wrote anything.
        let _ = tokio::fs::remove_file(&output).await;

        let args: Vec<String> = template
            .split_whitespace()
            .map(|part| {
                part.replace("{input}", &input.to_string_lossy())
                    .replace("{output}", &output.to_string_lossy())
            })
            .collect();
        let Some((program, rest)) = args.split_first() else {
            return None;
        };

        tracing::debug!(command = ?args, "Running image transform");
        match Command::new(program).args(rest).output().await {
            Ok(out) if out.status.success() => {
                let stdout = String::from_utf8_lossy(&out.stdout);
                if !stdout.trim().is_empty() {
                    tracing::info!("Transform output: {}", stdout.trim());
                }
            }
            Ok(out) => {
                tracing::warn!(
                    status = ?out.status.code(),
                    stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                    "Image transform exited with an error"
                );
            }
            Err(e) => tracing::warn!(program = %program, "Failed to run image transform: {}", e),
        }

        match tokio::fs::metadata(&output).await {
            Ok(meta) if meta.len() > 0 => Some(output),
            _ => {
                tracing::warn!("Image transform produced no output, using the original file");
                let _ = tokio::fs::remove_file(&output).await;
                None
            }
        }
    }
}
