//! Walk a paginated web gallery with a two-level (page, slot) cursor.

use std::sync::Arc;

use async_trait::async_trait;

use super::{extension_of, ImageSource, SourceItem};
use crate::capability::{DetailLink, ListingEntry, ScrapeTarget};
use crate::state::{keys, PersistedCursor, PersistedValue, StateStore};

/// Entries per listing page.
pub const PAGE_SIZE: i64 = 15;

/// Upper bound on consecutive filtered entries skipped in one call.
const MAX_SKIPS: usize = 100;

/// Whether a detail-page link points at a full-resolution PNG or JPEG under the size limit.
/// Links that do not declare a size are accepted.
pub fn is_full_resolution(link: &DetailLink, max_bytes: u64) -> bool {
    let label = link.label.to_lowercase();
    if !label.contains("full res") {
        return false;
    }
    if !(label.contains("png") || label.contains("jpg")) {
        return false;
    }
    link.size_hint.map_or(true, |size| size < max_bytes)
}

pub struct PaginatedScraperSource {
    target: Arc<dyn ScrapeTarget>,
    page: PersistedCursor,
    slot: PersistedCursor,
    checkpoint: PersistedValue,
    increasing: bool,
    skip_keywords: Vec<String>,
    max_asset_bytes: u64,
    archive_album: Option<String>,
}

impl PaginatedScraperSource {
    pub async fn new(
        target: Arc<dyn ScrapeTarget>,
        store: Arc<dyn StateStore>,
        skip_keywords: &[String],
        max_asset_bytes: u64,
        archive_album: Option<String>,
    ) -> Self {
        Self {
            target,
            page: PersistedCursor::load(store.clone(), keys::SCRAPE_PAGE).await,
            slot: PersistedCursor::load(store.clone(), keys::SCRAPE_SLOT).await,
            checkpoint: PersistedValue::load(store, keys::SCRAPE_CHECKPOINT).await,
            increasing: true,
            skip_keywords: skip_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            max_asset_bytes,
            archive_album,
        }
    }

    pub fn position(&self) -> (i64, i64) {
        (self.page.get(), self.slot.get())
    }

    pub async fn set_position(&mut self, page: i64, slot: i64) {
        self.page.set(page).await;
        self.slot.set(slot).await;
    }

    /// Adopt a position saved by another process since the last call.
    async fn refresh(&mut self) {
        self.page.reload().await;
        self.slot.reload().await;
        self.checkpoint.reload().await;
    }

    fn should_skip(&self, caption: &str) -> bool {
        let caption = caption.to_lowercase();
        self.skip_keywords.iter().any(|k| caption.contains(k.as_str()))
    }

    /// Move one slot in the current direction, wrapping across pages.
    async fn advance(&mut self) {
        let delta = if self.increasing { 1 } else { -1 };
        let mut page = self.page.get();
        let mut slot = self.slot.get().saturating_add(delta);
        if slot < 0 {
            page = page.saturating_sub(1);
            slot = PAGE_SIZE - 1;
        } else if slot >= PAGE_SIZE {
            page = page.saturating_add(1);
            slot = 0;
        }
        if page <= 0 {
            page = 1;
        }
        self.set_position(page, slot).await;
    }

    async fn fetch_current(&mut self) -> Option<SourceItem> {
        let mut forced_reset = false;
        let mut skipped = 0;
        loop {
            let (page, slot) = self.position();
            let listing = match self.target.fetch_listing_page(page as u32).await {
                Ok(listing) => listing,
                Err(e) => {
                    tracing::warn!(page, "Failed to fetch listing page: {:#}", e);
                    return None;
                }
            };

            let Some(entry) = listing.into_iter().nth(slot as usize) else {
                if forced_reset || (page == 1 && slot == 0) {
                    tracing::warn!(page, slot, "Listing has no entry at this position, giving up");
                    return None;
                }
                tracing::info!(page, slot, "Past the end of the gallery, restarting from the first page");
                forced_reset = true;
                self.set_position(1, 0).await;
                continue;
            };

            if self.should_skip(&entry.caption) {
                skipped += 1;
                if skipped >= MAX_SKIPS {
                    tracing::warn!(skipped, "Too many filtered entries in a row, giving up");
                    return None;
                }
                tracing::debug!(caption = %entry.caption, page, slot, "Skipping filtered entry");
                self.advance().await;
                continue;
            }

            return self.resolve(entry).await;
        }
    }

    async fn resolve(&mut self, entry: ListingEntry) -> Option<SourceItem> {
        let links = match self.target.fetch_detail_links(&entry.detail_link).await {
            Ok(links) => links,
            Err(e) => {
                tracing::warn!(link = %entry.detail_link, "Failed to fetch detail page: {:#}", e);
                return None;
            }
        };
        let Some(link) = links
            .into_iter()
            .find(|l| is_full_resolution(l, self.max_asset_bytes))
        else {
            tracing::warn!(caption = %entry.caption, "No suitable full resolution download");
            return None;
        };

        let caption = entry.caption.trim();
        if self.checkpoint.get() != caption {
            tracing::info!(caption, "New gallery content");
            self.checkpoint.set(caption).await;
        }

        let extension = extension_of(&link.href).unwrap_or_else(|| "png".to_string());
        Some(
            SourceItem::new(format!("{}.{}", caption, extension), link.href)
                .with_album(self.archive_album.clone()),
        )
    }
}

#[async_trait]
impl ImageSource for PaginatedScraperSource {
    fn name(&self) -> &'static str {
        "scraper"
    }

    async fn next_item(&mut self) -> Option<SourceItem> {
        self.increasing = true;
        self.refresh().await;
        self.advance().await;
        self.fetch_current().await
    }

    async fn prev_item(&mut self) -> Option<SourceItem> {
        self.increasing = false;
        self.refresh().await;
        self.advance().await;
        self.fetch_current().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStateStore;
    use crate::testing::FakeGallery;

    const MB: u64 = 1024 * 1024;

    async fn source(gallery: Arc<FakeGallery>, skip: &[&str]) -> (PaginatedScraperSource, Arc<dyn StateStore>) {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let skip: Vec<String> = skip.iter().map(|s| s.to_string()).collect();
        let source = PaginatedScraperSource::new(
            gallery,
            store.clone(),
            &skip,
            100 * MB,
            Some("Webb".into()),
        )
        .await;
        (source, store)
    }

    fn link(label: &str, size_hint: Option<u64>) -> DetailLink {
        DetailLink {
            label: label.into(),
            href: "https://cdn.example/a.png".into(),
            size_hint,
        }
    }

    #[test]
    fn test_full_resolution_filter() {
        assert!(is_full_resolution(&link("Full Res (For Display), 2000X2000, PNG (4.2 MB)", Some(4 * MB)), 100 * MB));
        assert!(is_full_resolution(&link("Full Res, JPG", None), 100 * MB));
        assert!(!is_full_resolution(&link("Full Res, TIF (300 MB)", Some(300 * MB)), 100 * MB));
        assert!(!is_full_resolution(&link("Full Res, PNG (240 MB)", Some(240 * MB)), 100 * MB));
        assert!(!is_full_resolution(&link("Thumbnail PNG", None), 100 * MB));
    }

    #[tokio::test]
    async fn test_first_next_starts_at_first_slot() {
        let gallery = Arc::new(FakeGallery::with_pages(2));
        let (mut source, _) = source(gallery, &[]).await;
        let item = source.next_item().await.unwrap();
        assert_eq!(source.position(), (1, 0));
        assert_eq!(item.name.as_deref(), Some("Image p1 s0.png"));
        assert_eq!(item.url.as_deref(), Some("https://cdn.example/p1-s0-full.png"));
        assert_eq!(item.album_to_save_to.as_deref(), Some("Webb"));
    }

    #[tokio::test]
    async fn test_next_wraps_to_next_page() {
        let gallery = Arc::new(FakeGallery::with_pages(3));
        let (mut source, _) = source(gallery, &[]).await;
        source.set_position(1, PAGE_SIZE - 1).await;
        let item = source.next_item().await.unwrap();
        assert_eq!(source.position(), (2, 0));
        assert_eq!(item.name.as_deref(), Some("Image p2 s0.png"));
    }

    #[tokio::test]
    async fn test_position_saved_by_another_process_is_followed() {
        let gallery = Arc::new(FakeGallery::with_pages(3));
        let (mut running, store) = source(gallery.clone(), &[]).await;
        running.next_item().await.unwrap();

        store.set(keys::SCRAPE_PAGE, "2").await.unwrap();
        store.set(keys::SCRAPE_SLOT, "4").await.unwrap();
        let item = running.next_item().await.unwrap();
        assert_eq!(running.position(), (2, 5));
        assert_eq!(item.name.as_deref(), Some("Image p2 s5.png"));
    }

    #[tokio::test]
    async fn test_prev_wraps_to_previous_page() {
        let gallery = Arc::new(FakeGallery::with_pages(3));
        let (mut source, _) = source(gallery, &[]).await;
        source.set_position(3, 0).await;
        let item = source.prev_item().await.unwrap();
        assert_eq!(source.position(), (2, PAGE_SIZE - 1));
        assert_eq!(item.name.as_deref(), Some("Image p2 s14.png"));
    }

    #[tokio::test]
    async fn test_prev_from_first_slot_clamps_to_first_page() {
        let gallery = Arc::new(FakeGallery::with_pages(2));
        let (mut source, _) = source(gallery, &[]).await;
        source.set_position(1, 0).await;
        source.prev_item().await.unwrap();
        assert_eq!(source.position(), (1, PAGE_SIZE - 1));
    }

    #[tokio::test]
    async fn test_page_beyond_last_resets_to_start() {
        let gallery = Arc::new(FakeGallery::with_pages(2));
        let (mut source, _) = source(gallery, &[]).await;
        source.set_position(35, 3).await;
        let item = source.next_item().await.unwrap();
        assert_eq!(source.position(), (1, 0));
        assert_eq!(item.name.as_deref(), Some("Image p1 s0.png"));
    }

    #[tokio::test]
    async fn test_empty_gallery_returns_none_without_looping() {
        let gallery = Arc::new(FakeGallery::with_pages(0));
        let (mut source, _) = source(gallery.clone(), &[]).await;
        source.set_position(4, 2).await;
        assert!(source.next_item().await.is_none());
        assert_eq!(source.position(), (1, 0));
        // Page 4, then page 1 after the forced reset.
        assert_eq!(gallery.listing_requests(), vec![4, 1]);
    }

    #[tokio::test]
    async fn test_skip_keywords_are_never_returned() {
        let gallery = Arc::new(FakeGallery::with_pages(3));
        gallery.rename(1, 2, "Diagram of the mirror");
        gallery.rename(1, 3, "NIRSpec SPECTRUM of WASP-96b");
        gallery.rename(1, 14, "Illustration of the orbit");
        gallery.rename(2, 0, "Another DIAGRAM");
        let (mut source, _) = source(gallery, &["diagram", "spectrum", "illustration"]).await;
        source.set_position(1, 0).await;

        for _ in 0..PAGE_SIZE {
            let item = source.next_item().await.unwrap();
            let name = item.name.unwrap().to_lowercase();
            assert!(!name.contains("diagram"), "{}", name);
            assert!(!name.contains("spectrum"), "{}", name);
            assert!(!name.contains("illustration"), "{}", name);
        }
    }

    #[tokio::test]
    async fn test_skip_moves_backwards_when_going_back() {
        let gallery = Arc::new(FakeGallery::with_pages(2));
        gallery.rename(1, 4, "Diagram");
        let (mut source, _) = source(gallery, &["diagram"]).await;
        source.set_position(1, 5).await;
        let item = source.prev_item().await.unwrap();
        assert_eq!(item.name.as_deref(), Some("Image p1 s3.png"));
        assert_eq!(source.position(), (1, 3));
    }

    #[tokio::test]
    async fn test_no_full_resolution_link_yields_none_but_advances() {
        let gallery = Arc::new(FakeGallery::with_pages(1));
        gallery.clear_details(1, 1);
        let (mut source, _) = source(gallery, &[]).await;
        source.set_position(1, 0).await;
        assert!(source.next_item().await.is_none());
        assert_eq!(source.position(), (1, 1));
        let item = source.next_item().await.unwrap();
        assert_eq!(item.name.as_deref(), Some("Image p1 s2.png"));
    }

    #[tokio::test]
    async fn test_checkpoint_tracks_last_caption() {
        let gallery = Arc::new(FakeGallery::with_pages(1));
        let (mut source, store) = source(gallery, &[]).await;
        source.next_item().await.unwrap();
        source.next_item().await.unwrap();
        assert_eq!(
            store.get(keys::SCRAPE_CHECKPOINT).await.unwrap().as_deref(),
            Some("Image p1 s1")
        );
    }

    #[tokio::test]
    async fn test_position_survives_restart() {
        let gallery = Arc::new(FakeGallery::with_pages(2));
        let (mut source, store) = source(gallery.clone(), &[]).await;
        source.set_position(2, 6).await;
        let mut restarted =
            PaginatedScraperSource::new(gallery, store, &[], 100 * MB, None).await;
        assert_eq!(restarted.position(), (2, 6));
        let item = restarted.next_item().await.unwrap();
        assert_eq!(item.name.as_deref(), Some("Image p2 s7.png"));
    }
}
