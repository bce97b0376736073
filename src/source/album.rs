//! Walk a remote photo album with a persisted linear cursor.

use std::sync::Arc;

use async_trait::async_trait;

use super::{ImageSource, SourceItem};
use crate::capability::{AlbumProvider, MediaItem};
use crate::state::{keys, PersistedCursor, PersistedValue, StateStore};

/// Appended to an item's base URL to request the original resolution.
pub const MAX_RESOLUTION_SUFFIX: &str = "=w10000-h10000";

/// Resolve the id of the album titled `title` (case-insensitive), creating it if missing.
pub(crate) async fn find_or_create_album(
    provider: &dyn AlbumProvider,
    title: &str,
    app_created_only: bool,
) -> anyhow::Result<String> {
    let albums = provider.list_albums(app_created_only).await?;
    if let Some(album) = albums
        .into_iter()
        .find(|a| a.title.eq_ignore_ascii_case(title))
    {
        return Ok(album.id);
    }
    tracing::info!(title, "Album not found, creating it");
    provider.create_album(title).await
}

pub struct AlbumCursorSource {
    provider: Arc<dyn AlbumProvider>,
    /// Configured album, used until another one is chosen.
    default_title: String,
    album_title: PersistedValue,
    album_id: Option<String>,
    cursor: PersistedCursor,
}

impl AlbumCursorSource {
    pub async fn new(
        provider: Arc<dyn AlbumProvider>,
        store: Arc<dyn StateStore>,
        album_title: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            default_title: album_title.into(),
            album_title: PersistedValue::load(store.clone(), keys::ALBUM_TITLE).await,
            album_id: None,
            cursor: PersistedCursor::load(store, keys::ALBUM_INDEX).await,
        }
    }

    pub fn album_title(&self) -> &str {
        if self.album_title.is_blank() {
            &self.default_title
        } else {
            self.album_title.get()
        }
    }

    #[cfg(test)]
    pub fn cursor(&self) -> i64 {
        self.cursor.get()
    }

    /// Point the source at a different album, starting from its first item.
    pub async fn change_album(&mut self, title: &str) {
        tracing::info!(from = %self.album_title(), to = title, "Changing album");
        self.album_title.set(title.trim()).await;
        self.album_id = None;
        self.cursor.reset().await;
    }

    /// Adopt an album or position chosen by another process since the last call.
    async fn refresh(&mut self) {
        let before = self.album_title().to_string();
        self.album_title.reload().await;
        if self.album_title() != before {
            tracing::info!(from = %before, to = %self.album_title(), "Album changed elsewhere");
            self.album_id = None;
        }
        self.cursor.reload().await;
    }

    async fn album_id(&mut self) -> anyhow::Result<String> {
        if let Some(id) = &self.album_id {
            return Ok(id.clone());
        }
        let title = self.album_title().to_string();
        let id = find_or_create_album(self.provider.as_ref(), &title, false).await?;
        self.album_id = Some(id.clone());
        Ok(id)
    }

    async fn listing(&mut self) -> anyhow::Result<Vec<MediaItem>> {
        let album_id = self.album_id().await?;
        self.provider.search_items(&album_id).await
    }

    async fn jump(&mut self, delta: i64) -> Option<SourceItem> {
        self.refresh().await;
        let mut index = self.cursor.step(delta).await;
        let items = match self.listing().await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(album = %self.album_title(), "Failed to list album: {:#}", e);
                return None;
            }
        };
        if items.is_empty() {
            tracing::warn!(album = %self.album_title(), "Album is empty");
            return None;
        }

        let len = items.len() as i64;
        if index < 0 && delta < 0 {
            tracing::info!(album = %self.album_title(), "Stepped before the first item, wrapping to the last");
            index = self.cursor.set(len - 1).await;
        } else if index < 0 || index >= len {
            tracing::info!(album = %self.album_title(), index, len, "Cursor outside album, wrapping to the first item");
            self.cursor.reset().await;
            index = self.cursor.increment().await;
        }

        let item = &items[index as usize];
        tracing::debug!(index, id = %item.id, filename = %item.filename, "Album item selected");
        Some(SourceItem::new(
            item.filename.clone(),
            format!("{}{}", item.base_url, MAX_RESOLUTION_SUFFIX),
        ))
    }
}

#[async_trait]
impl ImageSource for AlbumCursorSource {
    fn name(&self) -> &'static str {
        "album"
    }

    async fn next_item(&mut self) -> Option<SourceItem> {
        self.jump(1).await
    }

    async fn prev_item(&mut self) -> Option<SourceItem> {
        self.jump(-1).await
    }
}
