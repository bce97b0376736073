//! In-process fakes for the capability traits.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::capability::{
    Album, AlbumProvider, CalendarProvider, DetailLink, DisplayDevice, GenerativeProvider,
    ListingEntry, LocalImage, MediaItem, Playlist, ScrapeTarget, TextModel,
};
use crate::source::{ImageSource, SourceItem, SourceSelector};
use crate::types::{ImageQuality, ImageStyle};

/// Records every call as a short string, e.g. `upload:frame.png`.
#[derive(Default)]
pub struct FakeDevice {
    calls: Mutex<Vec<String>>,
    asleep: AtomicBool,
    playlist: Mutex<Vec<String>>,
    next_asset: AtomicU32,
    failures: Mutex<HashMap<String, u32>>,
    uploaded: Mutex<Vec<PathBuf>>,
}

impl FakeDevice {
    pub fn with_playlist(item_ids: &[&str]) -> Self {
        let device = Self::default();
        *device.playlist.lock().unwrap() = item_ids.iter().map(|s| s.to_string()).collect();
        device
    }

    pub fn set_asleep(&self, asleep: bool) {
        self.asleep.store(asleep, Ordering::SeqCst);
    }

    /// Make the next `times` calls to `op` fail.
    pub fn fail_next(&self, op: &str, times: u32) {
        self.failures.lock().unwrap().insert(op.to_string(), times);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn uploaded_paths(&self) -> Vec<PathBuf> {
        self.uploaded.lock().unwrap().clone()
    }

    fn record(&self, op: &str, call: String) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(call);
        let mut failures = self.failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(op) {
            if *remaining > 0 {
                *remaining -= 1;
                anyhow::bail!("{} failed", op);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DisplayDevice for FakeDevice {
    async fn is_asleep(&self) -> anyhow::Result<bool> {
        self.record("is_asleep", "is_asleep".into())?;
        Ok(self.asleep.load(Ordering::SeqCst))
    }

    async fn wake(&self) -> anyhow::Result<()> {
        self.record("wake", "wake".into())?;
        self.set_asleep(false);
        Ok(())
    }

    async fn sleep(&self) -> anyhow::Result<()> {
        self.record("sleep", "sleep".into())?;
        self.set_asleep(true);
        Ok(())
    }

    async fn show_info(&self) -> anyhow::Result<()> {
        self.record("show_info", "show_info".into())
    }

    async fn hide_info(&self) -> anyhow::Result<()> {
        self.record("hide_info", "hide_info".into())
    }

    async fn preview(&self, image: &LocalImage) -> anyhow::Result<()> {
        self.record("preview", format!("preview:{}", image.name))
    }

    async fn upload(&self, image: &LocalImage) -> anyhow::Result<String> {
        self.record("upload", format!("upload:{}", image.name))?;
        anyhow::ensure!(image.path.exists(), "upload of missing file");
        self.uploaded.lock().unwrap().push(image.path.clone());
        let n = self.next_asset.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("asset-{}", n))
    }

    async fn playlist(&self, name: &str) -> anyhow::Result<Playlist> {
        self.record("playlist", format!("playlist:{}", name))?;
        Ok(Playlist {
            id: "playlist-1".into(),
            item_ids: self.playlist.lock().unwrap().clone(),
        })
    }

    async fn add_to_playlist(&self, playlist_id: &str, item_id: &str) -> anyhow::Result<()> {
        self.record("add", format!("add:{}:{}", playlist_id, item_id))?;
        self.playlist.lock().unwrap().push(item_id.to_string());
        Ok(())
    }

    async fn delete_item(&self, item_id: &str) -> anyhow::Result<()> {
        self.record("delete", format!("delete:{}", item_id))?;
        self.playlist.lock().unwrap().retain(|id| id != item_id);
        Ok(())
    }

    async fn bind_playlist(&self, playlist_id: &str) -> anyhow::Result<()> {
        self.record("bind", format!("bind:{}", playlist_id))
    }

    fn reset_session(&self) {
        self.calls.lock().unwrap().push("reset".into());
    }
}

struct FakeAlbum {
    id: String,
    title: String,
    items: Vec<MediaItem>,
}

#[derive(Default)]
pub struct FakeAlbumProvider {
    albums: Mutex<Vec<FakeAlbum>>,
    created: Mutex<Vec<String>>,
    list_filters: Mutex<Vec<bool>>,
    attached: Mutex<Vec<(String, String)>>,
    fail_searches: AtomicBool,
    fail_uploads: AtomicBool,
}

impl FakeAlbumProvider {
    pub fn with_album(title: &str, filenames: &[String]) -> Self {
        let provider = Self::default();
        provider.add_album(title, filenames);
        provider
    }

    pub fn add_album(&self, title: &str, filenames: &[String]) {
        let mut albums = self.albums.lock().unwrap();
        let id = format!("album-{}", albums.len() + 1);
        let items = filenames
            .iter()
            .enumerate()
            .map(|(i, f)| MediaItem {
                id: format!("{}-item-{}", id, i),
                filename: f.clone(),
                base_url: format!("https://photos.example/{}", f),
            })
            .collect();
        albums.push(FakeAlbum {
            id,
            title: title.to_string(),
            items,
        });
    }

    pub fn fail_searches(&self, fail: bool) {
        self.fail_searches.store(fail, Ordering::SeqCst);
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn created_albums(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_filters.lock().unwrap().len()
    }

    /// The `app_created_only` flag of every listing call.
    pub fn list_filters(&self) -> Vec<bool> {
        self.list_filters.lock().unwrap().clone()
    }

    /// `(album_id, name)` for every attached upload.
    pub fn attached(&self) -> Vec<(String, String)> {
        self.attached.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlbumProvider for FakeAlbumProvider {
    async fn list_albums(&self, app_created_only: bool) -> anyhow::Result<Vec<Album>> {
        self.list_filters.lock().unwrap().push(app_created_only);
        Ok(self
            .albums
            .lock()
            .unwrap()
            .iter()
            .map(|a| Album {
                id: a.id.clone(),
                title: a.title.clone(),
            })
            .collect())
    }

    async fn create_album(&self, title: &str) -> anyhow::Result<String> {
        self.created.lock().unwrap().push(title.to_string());
        self.add_album(title, &[]);
        let albums = self.albums.lock().unwrap();
        Ok(albums.last().map(|a| a.id.clone()).unwrap_or_default())
    }

    async fn search_items(&self, album_id: &str) -> anyhow::Result<Vec<MediaItem>> {
        anyhow::ensure!(!self.fail_searches.load(Ordering::SeqCst), "search failed");
        let albums = self.albums.lock().unwrap();
        let album = albums
            .iter()
            .find(|a| a.id == album_id)
            .ok_or_else(|| anyhow::anyhow!("no album {}", album_id))?;
        Ok(album.items.clone())
    }

    async fn upload_item(&self, image: &LocalImage) -> anyhow::Result<String> {
        anyhow::ensure!(!self.fail_uploads.load(Ordering::SeqCst), "upload failed");
        Ok(format!("token-{}", image.name))
    }

    async fn attach_to_album(&self, album_id: &str, _upload_token: &str, name: &str) -> anyhow::Result<()> {
        self.attached
            .lock()
            .unwrap()
            .push((album_id.to_string(), name.to_string()));
        Ok(())
    }
}

/// Scripted completions; images always succeed unless told otherwise.
#[derive(Default)]
pub struct FakeGenerator {
    completions: Mutex<VecDeque<anyhow::Result<String>>>,
    completion_requests: Mutex<Vec<(String, TextModel)>>,
    image_requests: Mutex<Vec<(String, ImageStyle, ImageQuality)>>,
    fail_images: AtomicBool,
}

impl FakeGenerator {
    pub fn push_completion(&self, result: anyhow::Result<String>) {
        self.completions.lock().unwrap().push_back(result);
    }

    pub fn fail_images(&self, fail: bool) {
        self.fail_images.store(fail, Ordering::SeqCst);
    }

    pub fn completion_requests(&self) -> Vec<(String, TextModel)> {
        self.completion_requests.lock().unwrap().clone()
    }

    pub fn image_requests(&self) -> Vec<String> {
        self.image_requests
            .lock()
            .unwrap()
            .iter()
            .map(|(p, _, _)| p.clone())
            .collect()
    }

    pub fn image_settings(&self) -> Vec<(ImageStyle, ImageQuality)> {
        self.image_requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, s, q)| (*s, *q))
            .collect()
    }
}

#[async_trait]
impl GenerativeProvider for FakeGenerator {
    async fn complete_text(&self, prompt: &str, model: TextModel) -> anyhow::Result<String> {
        self.completion_requests
            .lock()
            .unwrap()
            .push((prompt.to_string(), model));
        self.completions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted completion")))
    }

    async fn generate_image(
        &self,
        prompt: &str,
        style: ImageStyle,
        quality: ImageQuality,
    ) -> anyhow::Result<String> {
        self.image_requests
            .lock()
            .unwrap()
            .push((prompt.to_string(), style, quality));
        anyhow::ensure!(!self.fail_images.load(Ordering::SeqCst), "content policy violation");
        Ok("https://images.example/generated.png".into())
    }
}

pub struct FakeCalendar {
    text: Option<String>,
}

impl FakeCalendar {
    pub fn new(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self { text: None }
    }
}

#[async_trait]
impl CalendarProvider for FakeCalendar {
    async fn upcoming_holiday_text(&self) -> anyhow::Result<String> {
        self.text
            .clone()
            .ok_or_else(|| anyhow::anyhow!("calendar unavailable"))
    }
}

/// A gallery of full pages. Entry captions are `Image p{page} s{slot}`.
pub struct FakeGallery {
    pages: Mutex<Vec<Vec<ListingEntry>>>,
    details: Mutex<HashMap<String, Vec<DetailLink>>>,
    listing_requests: Mutex<Vec<u32>>,
}

impl FakeGallery {
    pub fn with_pages(count: u32) -> Self {
        let mut pages = Vec::new();
        let mut details = HashMap::new();
        for page in 1..=count {
            let mut entries = Vec::new();
            for slot in 0..crate::source::scraper::PAGE_SIZE {
                let link = format!("https://gallery.example/p{}/s{}", page, slot);
                details.insert(
                    link.clone(),
                    vec![
                        DetailLink {
                            label: "Thumbnail, PNG (40 KB)".into(),
                            href: format!("https://cdn.example/p{}-s{}-thumb.png", page, slot),
                            size_hint: Some(40 * 1024),
                        },
                        DetailLink {
                            label: "Full Res (For Display), PNG (4 MB)".into(),
                            href: format!("https://cdn.example/p{}-s{}-full.png", page, slot),
                            size_hint: Some(4 * 1024 * 1024),
                        },
                    ],
                );
                entries.push(ListingEntry {
                    caption: format!("Image p{} s{}", page, slot),
                    detail_link: link,
                });
            }
            pages.push(entries);
        }
        Self {
            pages: Mutex::new(pages),
            details: Mutex::new(details),
            listing_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn rename(&self, page: usize, slot: usize, caption: &str) {
        self.pages.lock().unwrap()[page - 1][slot].caption = caption.to_string();
    }

    pub fn clear_details(&self, page: usize, slot: usize) {
        let link = self.pages.lock().unwrap()[page - 1][slot].detail_link.clone();
        self.details.lock().unwrap().insert(link, Vec::new());
    }

    pub fn listing_requests(&self) -> Vec<u32> {
        self.listing_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScrapeTarget for FakeGallery {
    async fn fetch_listing_page(&self, page: u32) -> anyhow::Result<Vec<ListingEntry>> {
        self.listing_requests.lock().unwrap().push(page);
        let pages = self.pages.lock().unwrap();
        Ok(pages
            .get((page as usize).wrapping_sub(1))
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_detail_links(&self, detail_link: &str) -> anyhow::Result<Vec<DetailLink>> {
        Ok(self
            .details
            .lock()
            .unwrap()
            .get(detail_link)
            .cloned()
            .unwrap_or_default())
    }
}

/// A source that writes a small local file for every item it returns.
pub struct FakeSource {
    name: &'static str,
    dir: PathBuf,
    calls: AtomicU32,
    empty: AtomicBool,
    selected: Mutex<Option<SourceSelector>>,
}

impl FakeSource {
    pub fn new(name: &'static str, dir: &Path) -> Self {
        Self {
            name,
            dir: dir.to_path_buf(),
            calls: AtomicU32::new(0),
            empty: AtomicBool::new(false),
            selected: Mutex::new(None),
        }
    }

    pub fn handle(self: &Arc<Self>) -> FakeSourceHandle {
        FakeSourceHandle(self.clone())
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_empty(&self, empty: bool) {
        self.empty.store(empty, Ordering::SeqCst);
    }

    pub fn selected(&self) -> Option<SourceSelector> {
        *self.selected.lock().unwrap()
    }

    fn produce(&self) -> Option<SourceItem> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.empty.load(Ordering::SeqCst) {
            return None;
        }
        let name = format!("{}-{}.png", self.name, n);
        let path = self.dir.join(&name);
        std::fs::write(&path, b"pixels").ok()?;
        let mut item = SourceItem::new(name, "http://127.0.0.1:1/unused.png");
        item.temp_file = Some(path);
        Some(item)
    }
}

pub struct FakeSourceHandle(Arc<FakeSource>);

#[async_trait]
impl ImageSource for FakeSourceHandle {
    fn name(&self) -> &'static str {
        self.0.name
    }

    async fn next_item(&mut self) -> Option<SourceItem> {
        self.0.produce()
    }

    async fn prev_item(&mut self) -> Option<SourceItem> {
        self.0.produce()
    }

    fn select(&mut self, selector: SourceSelector) {
        *self.0.selected.lock().unwrap() = Some(selector);
    }
}
