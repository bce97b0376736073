//! Cross-process exclusion for display actions.
//!
//! A long-running `run` loop and one-shot commands share one state directory.
//! Every action that reads navigation state and delivers an image holds this
//! lock, so two processes never advance the same cursor or rewrite the same
//! playlist at once.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::Context;
use fs4::fs_std::FileExt;

/// Advisory lock file guarding one display.
#[derive(Debug, Clone)]
pub struct ActionLock {
    path: PathBuf,
}

/// Held for the duration of an action. The lock is released when dropped.
#[derive(Debug)]
pub struct ActionGuard {
    _file: File,
}

impl ActionLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait until no other process is acting on the display, then take the lock.
    pub async fn acquire(&self) -> anyhow::Result<ActionGuard> {
        let path = self.path.clone();
        let file = tokio::task::spawn_blocking(move || {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&path)
                .with_context(|| format!("Failed to create lock file: {}", path.display()))?;
            file.lock_exclusive()
                .with_context(|| format!("Failed to lock {}", path.display()))?;
            Ok::<File, anyhow::Error>(file)
        })
        .await??;
        tracing::debug!(path = %self.path.display(), "Display lock acquired");
        Ok(ActionGuard { _file: file })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_second_holder_waits_for_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ActionLock::new(dir.path().join("display.lock"));
        let first = lock.acquire().await.unwrap();

        let contender = lock.clone();
        let mut waiting = tokio::spawn(async move { contender.acquire().await });
        let blocked = tokio::time::timeout(Duration::from_millis(200), &mut waiting).await;
        assert!(blocked.is_err(), "lock was granted while still held");

        drop(first);
        let second = tokio::time::timeout(Duration::from_secs(5), waiting)
            .await
            .unwrap()
            .unwrap();
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_lock_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ActionLock::new(dir.path().join("display.lock"));
        let _guard = lock.acquire().await.unwrap();
        assert!(lock.path().exists());
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ActionLock::new(dir.path().join("absent").join("display.lock"));
        let err = lock.acquire().await.unwrap_err();
        assert!(err.to_string().contains("Failed to create lock file"));
    }
}
