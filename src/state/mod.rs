//! Durable key/value state surviving process restarts.
//!
//! Sources keep their navigation position here (album index, scrape page and
//! slot), along with the chosen album, the last prompt, the active source ordinal, and image
//! generation preferences. Each logical key holds one independent value.

pub mod cursor;
pub mod db;
pub mod error;
pub mod lock;
pub mod schema;

pub use cursor::{PersistedCursor, PersistedValue};
#[cfg(test)]
pub use db::MemoryStateStore;
pub use db::{SqliteStateStore, StateStore};
pub use lock::ActionLock;

/// Well-known keys.
pub mod keys {
    pub const ALBUM_INDEX: &str = "album-index";
    pub const ALBUM_TITLE: &str = "album-title";
    pub const SCRAPE_PAGE: &str = "scrape-page";
    pub const SCRAPE_SLOT: &str = "scrape-slot";
    pub const SCRAPE_CHECKPOINT: &str = "scrape-checkpoint";
    pub const LAST_PROMPT: &str = "last-prompt";
    pub const ACTIVE_SOURCE: &str = "active-source";
    pub const IMAGE_STYLE: &str = "image-style";
    pub const IMAGE_QUALITY: &str = "image-quality";
}
