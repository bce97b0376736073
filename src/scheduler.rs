//! Single entry point for display actions.
//!
//! Owns the three sources and the persisted selection between them. Every
//! action holds the display lock and checks whether the display is asleep; a
//! sleeping display short-circuits before any source or delivery work happens.
//! Otherwise the selection is re-read, since another process may have changed it.

use std::sync::Arc;

use serde::Serialize;

use crate::capability::DisplayDevice;
use crate::delivery::DeliveryPipeline;
use crate::retry::retry_once;
use crate::source::{ImageSource, SourceItem, SourceSelector};
use crate::state::{keys, ActionLock, PersistedCursor, StateStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pass,
    Fail,
}

/// Result reported to whoever triggered an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResponse {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Set when the action was skipped because the display is asleep.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asleep: Option<bool>,
}

impl ActionResponse {
    pub fn pass() -> Self {
        Self {
            status: Status::Pass,
            reason: None,
            asleep: None,
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            status: Status::Fail,
            reason: Some(reason.into()),
            asleep: None,
        }
    }

    /// The display is asleep; nothing was attempted.
    pub fn asleep() -> Self {
        Self {
            status: Status::Pass,
            reason: None,
            asleep: Some(true),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Pass
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Next,
    Prev,
}

/// The concrete sources, one per selector variant.
pub struct Sources {
    pub album: Box<dyn ImageSource>,
    pub generative: Box<dyn ImageSource>,
    pub scraper: Box<dyn ImageSource>,
}

pub struct Scheduler {
    sources: Sources,
    selector: SourceSelector,
    active: PersistedCursor,
    device: Arc<dyn DisplayDevice>,
    pipeline: DeliveryPipeline,
    lock: ActionLock,
}

impl Scheduler {
    /// Build a scheduler, resuming the persisted source selection.
    pub async fn new(
        sources: Sources,
        store: Arc<dyn StateStore>,
        device: Arc<dyn DisplayDevice>,
        pipeline: DeliveryPipeline,
        lock: ActionLock,
    ) -> Self {
        let active = PersistedCursor::load(store, keys::ACTIVE_SOURCE).await;
        let selector = SourceSelector::from_ordinal(active.get());
        let mut scheduler = Self {
            sources,
            selector,
            active,
            device,
            pipeline,
            lock,
        };
        scheduler.active_source_mut().select(selector);
        tracing::info!(source = %selector, ordinal = selector.ordinal(), "Scheduler ready");
        scheduler
    }

    pub fn pipeline(&self) -> &DeliveryPipeline {
        &self.pipeline
    }

    pub fn selector(&self) -> SourceSelector {
        self.selector
    }

    /// Persisted source ordinal; an unset selection reads as the album source.
    pub async fn get_source(&mut self) -> i64 {
        self.active.reload().await.max(0)
    }

    pub async fn change_source(&mut self, ordinal: i64) {
        self.selector = SourceSelector::from_ordinal(ordinal);
        let selector = self.selector;
        self.active_source_mut().select(selector);
        self.active.set(ordinal).await;
        tracing::info!(ordinal, source = %selector, "Active source changed");
    }

    pub async fn next_item(&mut self) -> ActionResponse {
        self.do_action(Direction::Next).await
    }

    pub async fn prev_item(&mut self) -> ActionResponse {
        self.do_action(Direction::Prev).await
    }

    /// Deliver an item not produced by any source, still gated on the display being awake.
    pub async fn show_item(&mut self, mut item: SourceItem) -> ActionResponse {
        let _guard = match self.lock.acquire().await {
            Ok(guard) => guard,
            Err(e) => return ActionResponse::fail(format!("cannot lock display: {:#}", e)),
        };
        if let Some(response) = self.asleep_check().await {
            return response;
        }
        self.deliver(&mut item).await
    }

    fn active_source_mut(&mut self) -> &mut dyn ImageSource {
        match self.selector {
            SourceSelector::Album => self.sources.album.as_mut(),
            SourceSelector::Generative(_) => self.sources.generative.as_mut(),
            SourceSelector::Scraper => self.sources.scraper.as_mut(),
        }
    }

    /// Follow a source selection made by another process.
    async fn refresh_selection(&mut self) {
        let selector = SourceSelector::from_ordinal(self.active.reload().await);
        if selector != self.selector {
            tracing::info!(from = %self.selector, to = %selector, "Source changed elsewhere");
            self.selector = selector;
            self.active_source_mut().select(selector);
        }
    }

    /// `Some(response)` when the action must not proceed.
    async fn asleep_check(&self) -> Option<ActionResponse> {
        let device = &self.device;
        match retry_once("sleep check", || device.reset_session(), || device.is_asleep()).await {
            Ok(true) => {
                tracing::info!("Display is asleep, skipping");
                Some(ActionResponse::asleep())
            }
            Ok(false) => None,
            Err(e) => Some(ActionResponse::fail(format!(
                "cannot read display sleep state: {:#}",
                e
            ))),
        }
    }

    async fn do_action(&mut self, direction: Direction) -> ActionResponse {
        let _guard = match self.lock.acquire().await {
            Ok(guard) => guard,
            Err(e) => return ActionResponse::fail(format!("cannot lock display: {:#}", e)),
        };
        if let Some(response) = self.asleep_check().await {
            return response;
        }
        self.refresh_selection().await;

        let source = self.active_source_mut();
        let name = source.name();
        let item = match direction {
            Direction::Next => source.next_item().await,
            Direction::Prev => source.prev_item().await,
        };
        let Some(mut item) = item else {
            tracing::warn!(source = name, ?direction, "Source produced no item");
            return ActionResponse::fail(format!("{} source produced no item", name));
        };
        self.deliver(&mut item).await
    }

    async fn deliver(&self, item: &mut SourceItem) -> ActionResponse {
        match self.pipeline.deliver(item).await {
            Ok(delivered) => {
                tracing::info!(
                    name = %item.display_name(),
                    asset_id = %delivered.asset_id,
                    changed = delivered.attached,
                    "Delivered"
                );
                ActionResponse::pass()
            }
            Err(e) => {
                tracing::warn!(name = %item.display_name(), transient = e.is_transient(), "Delivery failed: {}", e);
                ActionResponse::fail(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{DeliveryConfig, ImageTransform};
    use crate::source::PromptMode;
    use crate::state::MemoryStateStore;
    use crate::testing::{FakeAlbumProvider, FakeDevice, FakeSource};

    struct Harness {
        scheduler: Scheduler,
        device: Arc<FakeDevice>,
        album: Arc<FakeSource>,
        generative: Arc<FakeSource>,
        scraper: Arc<FakeSource>,
        store: Arc<dyn StateStore>,
        _dir: tempfile::TempDir,
    }

    async fn harness_with_store(store: Arc<dyn StateStore>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let device = Arc::new(FakeDevice::default());
        let album = Arc::new(FakeSource::new("album", dir.path()));
        let generative = Arc::new(FakeSource::new("generative", dir.path()));
        let scraper = Arc::new(FakeSource::new("scraper", dir.path()));
        let pipeline = DeliveryPipeline::new(
            device.clone(),
            Arc::new(FakeAlbumProvider::default()),
            DeliveryConfig {
                playlist: "framefeed".into(),
                work_dir: dir.path().to_path_buf(),
                transform: ImageTransform::default(),
                preview_transform: ImageTransform::default(),
            },
        )
        .unwrap();
        let sources = Sources {
            album: Box::new(album.handle()),
            generative: Box::new(generative.handle()),
            scraper: Box::new(scraper.handle()),
        };
        let lock = ActionLock::new(dir.path().join("display.lock"));
        let scheduler = Scheduler::new(sources, store.clone(), device.clone(), pipeline, lock).await;
        Harness {
            scheduler,
            device,
            album,
            generative,
            scraper,
            store,
            _dir: dir,
        }
    }

    async fn harness() -> Harness {
        harness_with_store(Arc::new(MemoryStateStore::new())).await
    }

    #[tokio::test]
    async fn test_asleep_short_circuits() {
        let mut h = harness().await;
        h.device.set_asleep(true);

        let response = h.scheduler.next_item().await;
        assert_eq!(response, ActionResponse::asleep());
        assert!(response.is_success());
        assert_eq!(h.album.calls(), 0);
        assert_eq!(h.device.calls(), vec!["is_asleep"]);

        h.scheduler.prev_item().await;
        assert_eq!(h.album.calls(), 0);
    }

    #[tokio::test]
    async fn test_next_delivers_from_album_by_default() {
        let mut h = harness().await;
        assert_eq!(h.scheduler.get_source().await, 0);

        let response = h.scheduler.next_item().await;
        assert_eq!(response, ActionResponse::pass());
        assert_eq!(h.album.calls(), 1);
        assert_eq!(h.device.count("upload:"), 1);
    }

    #[tokio::test]
    async fn test_empty_source_is_a_failure() {
        let mut h = harness().await;
        h.album.set_empty(true);
        let response = h.scheduler.next_item().await;
        assert_eq!(response.status, Status::Fail);
        assert_eq!(response.reason.as_deref(), Some("album source produced no item"));
        assert_eq!(h.device.count("upload:"), 0);
    }

    #[tokio::test]
    async fn test_change_source_routes_and_persists() {
        let mut h = harness().await;
        h.scheduler.change_source(3).await;
        assert_eq!(
            h.scheduler.selector(),
            SourceSelector::Generative(PromptMode::ChatAdvanced)
        );
        assert_eq!(
            h.generative.selected(),
            Some(SourceSelector::Generative(PromptMode::ChatAdvanced))
        );

        h.scheduler.prev_item().await;
        assert_eq!(h.generative.calls(), 1);
        assert_eq!(h.album.calls(), 0);
        assert_eq!(h.store.get(keys::ACTIVE_SOURCE).await.unwrap().as_deref(), Some("3"));
        assert_eq!(h.scheduler.get_source().await, 3);
    }

    #[tokio::test]
    async fn test_unknown_ordinal_selects_album() {
        let mut h = harness().await;
        h.scheduler.change_source(4).await;
        h.scheduler.next_item().await;
        assert_eq!(h.scraper.calls(), 1);

        h.scheduler.change_source(9).await;
        h.scheduler.next_item().await;
        assert_eq!(h.album.calls(), 1);
        assert_eq!(h.scheduler.get_source().await, 9);
    }

    #[tokio::test]
    async fn test_selection_survives_restart() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        store.set(keys::ACTIVE_SOURCE, "4").await.unwrap();
        let mut h = harness_with_store(store).await;
        assert_eq!(h.scheduler.selector(), SourceSelector::Scraper);
        h.scheduler.next_item().await;
        assert_eq!(h.scraper.calls(), 1);
    }

    #[tokio::test]
    async fn test_selection_from_another_process_takes_effect() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let mut running = harness_with_store(store.clone()).await;
        let mut command = harness_with_store(store.clone()).await;

        running.scheduler.next_item().await;
        assert_eq!(running.album.calls(), 1);

        command.scheduler.change_source(4).await;
        running.scheduler.next_item().await;
        assert_eq!(running.scraper.calls(), 1);
        assert_eq!(running.album.calls(), 1);
        assert_eq!(running.scheduler.selector(), SourceSelector::Scraper);

        command.scheduler.change_source(2).await;
        assert_eq!(running.scheduler.get_source().await, 2);
        running.scheduler.prev_item().await;
        assert_eq!(running.generative.calls(), 1);
        assert_eq!(
            running.generative.selected(),
            Some(SourceSelector::Generative(PromptMode::Chat))
        );
    }

    #[tokio::test]
    async fn test_held_lock_blocks_action() {
        let mut h = harness().await;
        let held = ActionLock::new(h._dir.path().join("display.lock"))
            .acquire()
            .await
            .unwrap();

        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(200),
            h.scheduler.next_item(),
        )
        .await;
        assert!(blocked.is_err());
        assert_eq!(h.album.calls(), 0);

        drop(held);
        assert_eq!(h.scheduler.next_item().await, ActionResponse::pass());
        assert_eq!(h.album.calls(), 1);
    }

    #[tokio::test]
    async fn test_sleep_check_failure_resets_and_reports() {
        let mut h = harness().await;
        h.device.fail_next("is_asleep", 2);
        let response = h.scheduler.next_item().await;
        assert_eq!(response.status, Status::Fail);
        assert_eq!(h.device.count("reset"), 1);
        assert_eq!(h.album.calls(), 0);
    }

    #[test]
    fn test_response_serialization() {
        let json = serde_json::to_string(&ActionResponse::asleep()).unwrap();
        assert_eq!(json, r#"{"status":"pass","asleep":true}"#);
        let json = serde_json::to_string(&ActionResponse::fail("no item")).unwrap();
        assert_eq!(json, r#"{"status":"fail","reason":"no item"}"#);
    }
}
