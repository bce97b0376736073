//! Pluggable content sources.
//!
//! Each source walks its own content with a persisted position and hands back
//! a [`SourceItem`] describing what to put on the wall. Sources never return
//! errors: failures are logged and surface as `None`.

pub mod album;
pub mod generative;
pub mod scraper;

use std::path::PathBuf;

use async_trait::async_trait;

pub use album::AlbumCursorSource;
pub use generative::GenerativeSource;
pub use scraper::PaginatedScraperSource;

/// A unit of content to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceItem {
    /// Remote location; `None` when only a local file exists.
    pub url: Option<String>,
    pub name: Option<String>,
    /// Album to archive the image into after a successful delivery.
    pub album_to_save_to: Option<String>,
    /// Local copy, set once downloaded.
    pub temp_file: Option<PathBuf>,
    /// Whether the delivery pipeline deletes `temp_file` when it is done.
    pub cleanup_temp_file: bool,
}

impl SourceItem {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            name: Some(name.into()),
            album_to_save_to: None,
            temp_file: None,
            cleanup_temp_file: true,
        }
    }

    /// An item for an ad-hoc URL with no display name.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            name: None,
            album_to_save_to: None,
            temp_file: None,
            cleanup_temp_file: true,
        }
    }

    /// An item for a file already on disk. The file is left in place afterwards.
    pub fn from_local_file(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        Self {
            url: None,
            name,
            album_to_save_to: None,
            temp_file: Some(path),
            cleanup_temp_file: false,
        }
    }

    pub fn with_album(mut self, album: Option<String>) -> Self {
        self.album_to_save_to = album;
        self
    }

    /// Name for logs and uploads: the item name, else the URL.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.url.as_deref())
            .unwrap_or("unnamed")
    }

    /// Archive album, if one is set and non-blank.
    pub fn archive_album(&self) -> Option<&str> {
        self.album_to_save_to
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }

    /// File extension inferred from the name, then the URL. Defaults to `png`.
    pub fn extension(&self) -> String {
        self.name
            .as_deref()
            .and_then(extension_of)
            .or_else(|| self.url.as_deref().and_then(extension_of))
            .unwrap_or_else(|| "png".to_string())
    }
}

/// Extension of the last path segment of a name or URL, lowercased.
/// Query strings and fragments are ignored.
pub fn extension_of(name_or_url: &str) -> Option<String> {
    let without_query = name_or_url
        .split(['?', '#'])
        .next()
        .unwrap_or(name_or_url);
    let segment = without_query.rsplit('/').next().unwrap_or(without_query);
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > 5 {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// How the generative source arrives at its prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// Reuse the current prompt as-is.
    Verbatim,
    /// Elaborate with a single-shot completion, retried once on a weak result.
    Completion,
    Chat,
    ChatAdvanced,
}

/// The active source, selected by ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSelector {
    Album,
    Generative(PromptMode),
    Scraper,
}

impl SourceSelector {
    /// Map an ordinal to a source. Unknown ordinals select the album.
    pub fn from_ordinal(ordinal: i64) -> Self {
        match ordinal {
            1 => SourceSelector::Generative(PromptMode::Completion),
            2 => SourceSelector::Generative(PromptMode::Chat),
            3 => SourceSelector::Generative(PromptMode::ChatAdvanced),
            4 => SourceSelector::Scraper,
            _ => SourceSelector::Album,
        }
    }

    pub fn ordinal(&self) -> i64 {
        match self {
            SourceSelector::Album => 0,
            SourceSelector::Generative(PromptMode::Verbatim) => 1,
            SourceSelector::Generative(PromptMode::Completion) => 1,
            SourceSelector::Generative(PromptMode::Chat) => 2,
            SourceSelector::Generative(PromptMode::ChatAdvanced) => 3,
            SourceSelector::Scraper => 4,
        }
    }
}

impl std::fmt::Display for SourceSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceSelector::Album => write!(f, "album"),
            SourceSelector::Generative(mode) => write!(f, "generative ({:?})", mode),
            SourceSelector::Scraper => write!(f, "scraper"),
        }
    }
}

/// A navigable provider of displayable content.
///
/// Each call moves the persisted position exactly once, even when the
/// resulting fetch fails, so a broken position is never retried forever.
#[async_trait]
pub trait ImageSource: Send {
    fn name(&self) -> &'static str;

    async fn next_item(&mut self) -> Option<SourceItem>;

    async fn prev_item(&mut self) -> Option<SourceItem>;

    /// Called when the scheduler makes this source active.
    fn select(&mut self, _selector: SourceSelector) {}
}
