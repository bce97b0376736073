//! Getting a [`SourceItem`] onto the wall.
//!
//! Delivery is two-phase: a fast preview pushed straight to the device, then
//! a durable commit through the cloud relay (upload, attach to the playlist,
//! detach the previous items, bind the playlist to the device). Every device
//! call is wrapped in [`retry_once`] with a session reset as recovery.

pub mod error;
pub mod file;
pub mod transform;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Client;

pub use error::DeliveryError;
pub use transform::ImageTransform;

use crate::capability::{AlbumProvider, DisplayDevice, LocalImage};
use crate::retry::retry_once;
use crate::source::album::find_or_create_album;
use crate::source::SourceItem;

/// Longest item name sent to the display service.
pub const MAX_UPLOAD_NAME_CHARS: usize = 512;

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Playlist the display shows.
    pub playlist: String,
    /// Where downloaded and transformed files are written.
    pub work_dir: PathBuf,
    pub transform: ImageTransform,
    pub preview_transform: ImageTransform,
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub asset_id: String,
    /// False when the asset was already in the playlist and nothing changed.
    pub attached: bool,
}

/// Name used for the upload, truncated to [`MAX_UPLOAD_NAME_CHARS`] with the
/// extension re-appended.
pub fn upload_name(item: &SourceItem) -> String {
    let name = item.display_name();
    if name.chars().count() <= MAX_UPLOAD_NAME_CHARS {
        return name.to_string();
    }
    let truncated: String = name.chars().take(MAX_UPLOAD_NAME_CHARS).collect();
    format!("{}.{}", truncated, item.extension())
}

pub struct DeliveryPipeline {
    device: Arc<dyn DisplayDevice>,
    archive: Arc<dyn AlbumProvider>,
    client: Client,
    config: DeliveryConfig,
}

impl DeliveryPipeline {
    pub fn new(
        device: Arc<dyn DisplayDevice>,
        archive: Arc<dyn AlbumProvider>,
        config: DeliveryConfig,
    ) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .user_agent(file::USER_AGENT)
            .build()
            .map_err(DeliveryError::Client)?;
        tracing::debug!(
            playlist = %config.playlist,
            transform = config.transform.is_configured(),
            preview_transform = config.preview_transform.is_configured(),
            "Delivery pipeline ready"
        );
        Ok(Self {
            device,
            archive,
            client,
            config,
        })
    }

    /// Preview, then commit. A failed preview is logged and the commit still runs.
    pub async fn deliver(&self, item: &mut SourceItem) -> Result<Delivered, DeliveryError> {
        let cleanup = item.cleanup_temp_file;
        item.cleanup_temp_file = false;
        let preview = self.preview(item).await;
        item.cleanup_temp_file = cleanup;

        if let Err(e) = preview {
            if item.temp_file.is_none() {
                // Nothing was downloaded; the commit would fail the same way.
                return Err(e);
            }
            tracing::warn!(name = %item.display_name(), "Preview failed, continuing with commit: {}", e);
        }
        self.commit(item).await
    }

    /// Push the item straight to the device without touching the playlist.
    pub async fn preview(&self, item: &mut SourceItem) -> Result<(), DeliveryError> {
        let path = self.fetch(item).await?;
        let transformed = self
            .config
            .preview_transform
            .apply(&path, &self.config.work_dir)
            .await;
        let image = LocalImage::new(transformed.as_deref().unwrap_or(&path), upload_name(item));

        tracing::info!(name = %image.name, "Previewing directly on the display");
        let device = &self.device;
        let result = retry_once("preview", || device.reset_session(), || device.preview(&image))
            .await
            .map_err(DeliveryError::Device);

        remove_quietly(transformed.as_deref()).await;
        if item.cleanup_temp_file {
            self.discard(item).await;
        }
        result
    }

    /// Upload the item and make it the only entry of the display's playlist.
    pub async fn commit(&self, item: &mut SourceItem) -> Result<Delivered, DeliveryError> {
        let path = self.fetch(item).await?;
        let transformed = self
            .config
            .transform
            .apply(&path, &self.config.work_dir)
            .await;
        let image = LocalImage::new(transformed.as_deref().unwrap_or(&path), upload_name(item));

        let result = self.push_to_playlist(&image).await;
        if result.is_ok() {
            if let Some(album) = item.archive_album() {
                self.archive(album, &image).await;
            }
        }

        remove_quietly(transformed.as_deref()).await;
        if item.cleanup_temp_file {
            self.discard(item).await;
        }
        result
    }

    async fn fetch(&self, item: &mut SourceItem) -> Result<PathBuf, DeliveryError> {
        if let Some(path) = &item.temp_file {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                tracing::info!(name = %item.display_name(), "Item already downloaded, not re-fetching");
                return Ok(path.clone());
            }
        }
        let url = item.url.clone().ok_or(DeliveryError::NothingToFetch)?;
        if let Some(path) = file::local_path(&url) {
            tokio::fs::metadata(&path).await?;
            item.temp_file = Some(path.clone());
            return Ok(path);
        }
        tracing::info!(name = %item.display_name(), "Downloading item");
        let path = file::fetch_to_temp(&self.client, &url, &self.config.work_dir, &item.extension()).await?;
        item.temp_file = Some(path.clone());
        Ok(path)
    }

    async fn push_to_playlist(&self, image: &LocalImage) -> Result<Delivered, DeliveryError> {
        let device = &self.device;
        let playlist_name = self.config.playlist.as_str();

        tracing::info!(name = %image.name, "Uploading to the display service");
        let asset_id = retry_once("upload", || device.reset_session(), || device.upload(image)).await?;
        let playlist = retry_once(
            "get playlist",
            || device.reset_session(),
            || device.playlist(playlist_name),
        )
        .await?;

        if playlist.item_ids.contains(&asset_id) {
            tracing::info!(asset_id = %asset_id, playlist = %playlist.id, "Asset already in playlist, nothing to change");
            return Ok(Delivered {
                asset_id,
                attached: false,
            });
        }

        retry_once(
            &format!("add item {}", asset_id),
            || device.reset_session(),
            || device.add_to_playlist(&playlist.id, &asset_id),
        )
        .await?;
        for old in &playlist.item_ids {
            tracing::debug!(item = %old, "Removing previous playlist item");
            retry_once(
                &format!("delete item {}", old),
                || device.reset_session(),
                || device.delete_item(old),
            )
            .await?;
        }
        retry_once(
            &format!("bind playlist {}", playlist.id),
            || device.reset_session(),
            || device.bind_playlist(&playlist.id),
        )
        .await?;

        tracing::info!(asset_id = %asset_id, playlist = %playlist.id, "Display updated");
        Ok(Delivered {
            asset_id,
            attached: true,
        })
    }

    /// Best-effort copy into an archive album. Failures are only logged.
    async fn archive(&self, album: &str, image: &LocalImage) {
        tracing::info!(album, name = %image.name, "Archiving delivered image");
        let result: anyhow::Result<()> = async {
            let album_id = find_or_create_album(self.archive.as_ref(), album, true).await?;
            let token = self.archive.upload_item(image).await?;
            self.archive
                .attach_to_album(&album_id, &token, &image.name)
                .await
        }
        .await;
        if let Err(e) = result {
            tracing::warn!(album, "Archival upload failed: {:#}", e);
        }
    }

    async fn discard(&self, item: &mut SourceItem) {
        if let Some(path) = item.temp_file.take() {
            tracing::debug!(name = %item.display_name(), path = %path.display(), "Removing temp file");
            remove_quietly(Some(&path)).await;
        }
    }
}

async fn remove_quietly(path: Option<&Path>) {
    if let Some(path) = path {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), "Failed to remove temp file: {}", e);
            }
        }
    }
}
