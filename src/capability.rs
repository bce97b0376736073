//! Narrow interfaces to the external services the rotation core depends on.
//!
//! Concrete HTTP implementations live in `meural`, `google`, `openai` and
//! `webb`; tests substitute in-process fakes. Every method reports failure as
//! an `anyhow::Error` so the core can treat transport, auth and malformed
//! payload problems the same way.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::types::{ImageQuality, ImageStyle};

/// A downloaded image ready to push somewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalImage {
    pub path: PathBuf,
    /// Name shown to the remote service.
    pub name: String,
    pub mime: &'static str,
}

impl LocalImage {
    pub fn new(path: &Path, name: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            name: name.into(),
            mime: media_type(path),
        }
    }
}

/// Infer the media type from a file extension. Unknown extensions are sent as PNG.
pub fn media_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        _ => "image/png",
    }
}

/// A named playlist on the display's cloud relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub id: String,
    pub item_ids: Vec<String>,
}

/// The picture frame: power state, fast preview, and the durable
/// upload/playlist path.
#[async_trait]
pub trait DisplayDevice: Send + Sync {
    async fn is_asleep(&self) -> anyhow::Result<bool>;

    async fn wake(&self) -> anyhow::Result<()>;

    async fn sleep(&self) -> anyhow::Result<()>;

    /// Overlay title and details of the image currently shown.
    async fn show_info(&self) -> anyhow::Result<()>;

    async fn hide_info(&self) -> anyhow::Result<()>;

    /// Push an image straight to the device. Fast, not persisted.
    async fn preview(&self, image: &LocalImage) -> anyhow::Result<()>;

    /// Upload an image to the cloud relay and return its asset id.
    async fn upload(&self, image: &LocalImage) -> anyhow::Result<String>;

    /// Find the playlist named `name`, creating it if missing.
    async fn playlist(&self, name: &str) -> anyhow::Result<Playlist>;

    async fn add_to_playlist(&self, playlist_id: &str, item_id: &str) -> anyhow::Result<()>;

    /// Delete an uploaded item from the relay (detaching it from every playlist).
    async fn delete_item(&self, item_id: &str) -> anyhow::Result<()>;

    /// Make `playlist_id` the playlist shown by the device.
    async fn bind_playlist(&self, playlist_id: &str) -> anyhow::Result<()>;

    /// Drop cached credentials and device identity so the next call starts fresh.
    fn reset_session(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Album {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub id: String,
    pub filename: String,
    pub base_url: String,
}

/// A remote photo library organised in albums.
#[async_trait]
pub trait AlbumProvider: Send + Sync {
    /// List albums; `app_created_only` restricts to albums this program created.
    async fn list_albums(&self, app_created_only: bool) -> anyhow::Result<Vec<Album>>;

    async fn create_album(&self, title: &str) -> anyhow::Result<String>;

    /// Every item in the album, in library order.
    async fn search_items(&self, album_id: &str) -> anyhow::Result<Vec<MediaItem>>;

    /// Upload raw bytes, returning an upload token.
    async fn upload_item(&self, image: &LocalImage) -> anyhow::Result<String>;

    async fn attach_to_album(
        &self,
        album_id: &str,
        upload_token: &str,
        name: &str,
    ) -> anyhow::Result<()>;
}

/// Which text model elaborates a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextModel {
    /// Single-shot instruction completion.
    Instruct,
    Chat,
    /// Chat with the higher-capability model.
    ChatAdvanced,
}

#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    async fn complete_text(&self, prompt: &str, model: TextModel) -> anyhow::Result<String>;

    /// Generate an image and return a URL it can be downloaded from.
    async fn generate_image(
        &self,
        prompt: &str,
        style: ImageStyle,
        quality: ImageQuality,
    ) -> anyhow::Result<String>;
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Prompt suffix describing an upcoming holiday, or empty.
    async fn upcoming_holiday_text(&self) -> anyhow::Result<String>;
}

/// One entry of a gallery listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub caption: String,
    pub detail_link: String,
}

/// An outbound link on an item's detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailLink {
    pub label: String,
    pub href: String,
    /// Declared file size in bytes, when the label states one.
    pub size_hint: Option<u64>,
}

#[async_trait]
pub trait ScrapeTarget: Send + Sync {
    /// Entries on listing page `page` (1-based). Past the last page this is empty.
    async fn fetch_listing_page(&self, page: u32) -> anyhow::Result<Vec<ListingEntry>>;

    async fn fetch_detail_links(&self, detail_link: &str) -> anyhow::Result<Vec<DetailLink>>;
}

/// Calendar that never reports a holiday.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHolidays;

#[async_trait]
impl CalendarProvider for NoHolidays {
    async fn upcoming_holiday_text(&self) -> anyhow::Result<String> {
        Ok(String::new())
    }
}

/// Stand-in for a service whose credentials were not configured.
/// Every call fails with a message naming the missing setting.
#[derive(Debug, Clone)]
pub struct Unconfigured {
    pub setting: &'static str,
}

impl Unconfigured {
    fn error(&self) -> anyhow::Error {
        anyhow::anyhow!("{} is not configured", self.setting)
    }
}

#[async_trait]
impl DisplayDevice for Unconfigured {
    async fn is_asleep(&self) -> anyhow::Result<bool> {
        Err(self.error())
    }

    async fn wake(&self) -> anyhow::Result<()> {
        Err(self.error())
    }

    async fn sleep(&self) -> anyhow::Result<()> {
        Err(self.error())
    }

    async fn show_info(&self) -> anyhow::Result<()> {
        Err(self.error())
    }

    async fn hide_info(&self) -> anyhow::Result<()> {
        Err(self.error())
    }

    async fn preview(&self, _image: &LocalImage) -> anyhow::Result<()> {
        Err(self.error())
    }

    async fn upload(&self, _image: &LocalImage) -> anyhow::Result<String> {
        Err(self.error())
    }

    async fn playlist(&self, _name: &str) -> anyhow::Result<Playlist> {
        Err(self.error())
    }

    async fn add_to_playlist(&self, _playlist_id: &str, _item_id: &str) -> anyhow::Result<()> {
        Err(self.error())
    }

    async fn delete_item(&self, _item_id: &str) -> anyhow::Result<()> {
        Err(self.error())
    }

    async fn bind_playlist(&self, _playlist_id: &str) -> anyhow::Result<()> {
        Err(self.error())
    }

    fn reset_session(&self) {}
}

#[async_trait]
impl AlbumProvider for Unconfigured {
    async fn list_albums(&self, _app_created_only: bool) -> anyhow::Result<Vec<Album>> {
        Err(self.error())
    }

    async fn create_album(&self, _title: &str) -> anyhow::Result<String> {
        Err(self.error())
    }

    async fn search_items(&self, _album_id: &str) -> anyhow::Result<Vec<MediaItem>> {
        Err(self.error())
    }

    async fn upload_item(&self, _image: &LocalImage) -> anyhow::Result<String> {
        Err(self.error())
    }

    async fn attach_to_album(&self, _album_id: &str, _token: &str, _name: &str) -> anyhow::Result<()> {
        Err(self.error())
    }
}

#[async_trait]
impl GenerativeProvider for Unconfigured {
    async fn complete_text(&self, _prompt: &str, _model: TextModel) -> anyhow::Result<String> {
        Err(self.error())
    }

    async fn generate_image(
        &self,
        _prompt: &str,
        _style: ImageStyle,
        _quality: ImageQuality,
    ) -> anyhow::Result<String> {
        Err(self.error())
    }
}
