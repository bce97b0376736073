//! Write-through integer cursors and string values backed by a [`StateStore`].

use std::sync::Arc;

use super::db::StateStore;

/// Sentinel meaning "uninitialized"; the next forward step lands on zero.
pub const UNSET: i64 = -1;

/// A persisted signed integer position.
///
/// The value is cached between calls and re-read with [`PersistedCursor::reload`]
/// before each action; every mutation is written through to the store immediately. Write failures are logged, not returned, so a
/// flaky disk never stops a source from advancing.
pub struct PersistedCursor {
    store: Arc<dyn StateStore>,
    key: &'static str,
    value: i64,
}

impl std::fmt::Debug for PersistedCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedCursor")
            .field("key", &self.key)
            .field("value", &self.value)
            .finish()
    }
}

impl PersistedCursor {
    /// Load the cursor stored under `key`, defaulting to [`UNSET`].
    pub async fn load(store: Arc<dyn StateStore>, key: &'static str) -> Self {
        let value = read_cursor(store.as_ref(), key).await.unwrap_or(UNSET);
        tracing::info!(key, value, "Cursor initialized");
        Self { store, key, value }
    }

    /// Pick up a value written by another process. A failed read keeps the cached value.
    pub async fn reload(&mut self) -> i64 {
        if let Some(value) = read_cursor(self.store.as_ref(), self.key).await {
            if value != self.value {
                tracing::debug!(key = self.key, from = self.value, to = value, "Cursor changed on disk");
            }
            self.value = value;
        }
        self.value
    }

    pub fn get(&self) -> i64 {
        self.value
    }

    pub async fn set(&mut self, value: i64) -> i64 {
        self.value = value;
        if let Err(e) = self.store.set(self.key, &value.to_string()).await {
            tracing::warn!(key = self.key, value, "Failed to persist cursor: {}", e);
        }
        self.value
    }

    pub async fn increment(&mut self) -> i64 {
        self.set(self.value.saturating_add(1)).await
    }

    /// Add `delta` (possibly negative) to the cursor.
    pub async fn step(&mut self, delta: i64) -> i64 {
        self.set(self.value.saturating_add(delta)).await
    }

    /// Return the cursor to the sentinel.
    pub async fn reset(&mut self) -> i64 {
        self.set(UNSET).await
    }
}

/// `None` when the store cannot be read; garbage and absent values read as [`UNSET`].
async fn read_cursor(store: &dyn StateStore, key: &'static str) -> Option<i64> {
    match store.get(key).await {
        Ok(Some(raw)) => match raw.trim().parse::<i64>() {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(key, raw = %raw, "Unparseable cursor value, using sentinel: {}", e);
                Some(UNSET)
            }
        },
        Ok(None) => Some(UNSET),
        Err(e) => {
            tracing::warn!(key, "Failed to read cursor: {}", e);
            None
        }
    }
}

/// A persisted text value, empty when absent.
pub struct PersistedValue {
    store: Arc<dyn StateStore>,
    key: &'static str,
    value: String,
}

impl std::fmt::Debug for PersistedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedValue")
            .field("key", &self.key)
            .field("value", &self.value)
            .finish()
    }
}

impl PersistedValue {
    pub async fn load(store: Arc<dyn StateStore>, key: &'static str) -> Self {
        let value = read_value(store.as_ref(), key).await.unwrap_or_default();
        Self { store, key, value }
    }

    /// Pick up a value written by another process. A failed read keeps the cached value.
    pub async fn reload(&mut self) -> &str {
        if let Some(value) = read_value(self.store.as_ref(), self.key).await {
            self.value = value;
        }
        &self.value
    }

    pub fn get(&self) -> &str {
        &self.value
    }

    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }

    pub async fn set(&mut self, value: &str) {
        self.value = value.to_string();
        if let Err(e) = self.store.set(self.key, value).await {
            tracing::warn!(key = self.key, "Failed to persist value: {}", e);
        }
    }
}

async fn read_value(store: &dyn StateStore, key: &'static str) -> Option<String> {
    match store.get(key).await {
        Ok(v) => Some(v.unwrap_or_default()),
        Err(e) => {
            tracing::warn!(key, "Failed to read persisted value: {}", e);
            None
        }
    }
}
