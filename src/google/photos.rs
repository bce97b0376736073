//! Photo library client: album listing, search, upload and attach.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::auth::GoogleAuth;
use super::error::GoogleError;
use super::{check, parse};
use crate::capability::{Album, AlbumProvider, LocalImage, MediaItem};
use crate::retry::retry_once;

const API_URL: &str = "https://photoslibrary.googleapis.com/v1/";
const ALBUM_PAGE_SIZE: u32 = 50;
const SEARCH_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlbumList {
    #[serde(default)]
    albums: Vec<AlbumEntry>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlbumEntry {
    id: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    album_id: &'a str,
    page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    media_items: Vec<MediaEntry>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaEntry {
    id: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchCreateResponse {
    #[serde(default)]
    new_media_item_results: Vec<NewMediaItemResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewMediaItemResult {
    #[serde(default)]
    status: Option<ItemStatus>,
    #[serde(default)]
    media_item: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ItemStatus {
    #[serde(default)]
    code: Option<i32>,
    #[serde(default)]
    message: Option<String>,
}

impl BatchCreateResponse {
    /// Error message for the first rejected item, if any.
    fn rejection(&self) -> Option<String> {
        let Some(result) = self.new_media_item_results.first() else {
            return Some("no item result in response".to_string());
        };
        let status = result.status.as_ref();
        let code = status.and_then(|s| s.code).unwrap_or(0);
        if result.media_item.is_some() && code == 0 {
            return None;
        }
        Some(
            status
                .and_then(|s| s.message.clone())
                .unwrap_or_else(|| format!("item rejected with code {}", code)),
        )
    }
}

#[derive(Debug)]
pub struct GooglePhotos {
    http: Client,
    auth: Arc<GoogleAuth>,
}

impl GooglePhotos {
    pub fn new(http: Client, auth: Arc<GoogleAuth>) -> Self {
        Self { http, auth }
    }

    async fn authed(&self, builder: RequestBuilder) -> Result<RequestBuilder, GoogleError> {
        Ok(builder.bearer_auth(self.auth.access_token().await?))
    }

    async fn list_albums_once(&self, app_created_only: bool) -> Result<Vec<Album>, GoogleError> {
        let mut albums = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = format!(
                "{}albums?pageSize={}&excludeNonAppCreatedData={}",
                API_URL, ALBUM_PAGE_SIZE, app_created_only
            );
            if let Some(token) = &page_token {
                url.push_str("&pageToken=");
                url.push_str(&urlencoding::encode(token));
            }
            let response = self.authed(self.http.get(&url)).await?.send().await?;
            let page: AlbumList = parse(&url, response).await?;
            albums.extend(page.albums.into_iter().map(|a| Album {
                id: a.id,
                title: a.title,
            }));
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        tracing::debug!(count = albums.len(), app_created_only, "Listed albums");
        Ok(albums)
    }

    async fn create_album_once(&self, title: &str) -> Result<String, GoogleError> {
        let url = format!("{}albums", API_URL);
        let response = self
            .authed(self.http.post(&url))
            .await?
            .json(&json!({ "album": { "title": title } }))
            .send()
            .await?;
        let album: AlbumEntry = parse(&url, response).await?;
        Ok(album.id)
    }

    async fn search_items_once(&self, album_id: &str) -> Result<Vec<MediaItem>, GoogleError> {
        let url = format!("{}mediaItems:search", API_URL);
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let body = SearchRequest {
                album_id,
                page_size: SEARCH_PAGE_SIZE,
                page_token: page_token.as_deref(),
            };
            let response = self
                .authed(self.http.post(&url))
                .await?
                .json(&body)
                .send()
                .await?;
            let page: SearchResponse = parse(&url, response).await?;
            items.extend(page.media_items.into_iter().map(|m| MediaItem {
                id: m.id,
                filename: m.filename,
                base_url: m.base_url,
            }));
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(items)
    }

    async fn upload_once(&self, image: &LocalImage) -> Result<String, GoogleError> {
        let url = format!("{}uploads", API_URL);
        let bytes = tokio::fs::read(&image.path).await?;
        let response = self
            .authed(self.http.post(&url))
            .await?
            .header("Content-Type", "application/octet-stream")
            .header("X-Goog-Upload-Content-Type", image.mime)
            .header("X-Goog-Upload-Protocol", "raw")
            .body(bytes)
            .send()
            .await?;
        let token = check(&url, response).await?.text().await?;
        let token = token.trim();
        if token.is_empty() {
            return Err(GoogleError::missing(&url, "no upload token"));
        }
        Ok(token.to_string())
    }

    async fn attach_once(&self, album_id: &str, upload_token: &str, name: &str) -> Result<(), GoogleError> {
        let url = format!("{}mediaItems:batchCreate", API_URL);
        let body = json!({
            "albumId": album_id,
            "newMediaItems": [{
                "description": name,
                "simpleMediaItem": { "uploadToken": upload_token, "fileName": name },
            }],
        });
        let response = self
            .authed(self.http.post(&url))
            .await?
            .json(&body)
            .send()
            .await?;
        let created: BatchCreateResponse = parse(&url, response).await?;
        if let Some(message) = created.rejection() {
            return Err(GoogleError::Api {
                status: 200,
                endpoint: url,
                body: message,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AlbumProvider for GooglePhotos {
    async fn list_albums(&self, app_created_only: bool) -> anyhow::Result<Vec<Album>> {
        Ok(retry_once(
            "list albums",
            || self.auth.invalidate(),
            || self.list_albums_once(app_created_only),
        )
        .await?)
    }

    async fn create_album(&self, title: &str) -> anyhow::Result<String> {
        tracing::info!(title, "Creating album");
        Ok(self.create_album_once(title).await?)
    }

    async fn search_items(&self, album_id: &str) -> anyhow::Result<Vec<MediaItem>> {
        Ok(retry_once(
            "search album",
            || self.auth.invalidate(),
            || self.search_items_once(album_id),
        )
        .await?)
    }

    async fn upload_item(&self, image: &LocalImage) -> anyhow::Result<String> {
        Ok(retry_once(
            "upload to library",
            || self.auth.invalidate(),
            || self.upload_once(image),
        )
        .await?)
    }

    async fn attach_to_album(
        &self,
        album_id: &str,
        upload_token: &str,
        name: &str,
    ) -> anyhow::Result<()> {
        Ok(self.attach_once(album_id, upload_token, name).await?)
    }
}
