//! Scraper for the Webb telescope public image gallery.
//!
//! Listing pages hold `div.ad-research-box` entries; each entry links to a
//! detail page whose download anchors are labelled like
//! `Full Res (For Display), PNG (12.4 MB)`.

pub mod error;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use url::Url;

pub use error::WebbError;

use crate::capability::{DetailLink, ListingEntry, ScrapeTarget};
use crate::delivery::file::USER_AGENT;
use crate::source::scraper::PAGE_SIZE;

pub const SITE_URL: &str = "https://webbtelescope.org";

fn selector(css: &'static str) -> Result<Selector, WebbError> {
    Selector::parse(css).map_err(|_| WebbError::Selector(css))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn resolve(base: &Url, href: &str) -> Result<String, WebbError> {
    base.join(href.trim())
        .map(String::from)
        .map_err(|source| WebbError::Link {
            href: href.to_string(),
            source,
        })
}

/// Byte size from the first parenthesised `(<number> KB|MB|GB)` in a label.
pub fn parse_size_hint(label: &str) -> Option<u64> {
    label
        .split('(')
        .skip(1)
        .filter_map(|rest| rest.split(')').next())
        .find_map(|group| {
            let mut words = group.split_whitespace();
            let number: f64 = words.next()?.replace(',', "").parse().ok()?;
            let multiplier: f64 = match words.next()?.to_ascii_uppercase().as_str() {
                "KB" => 1024.0,
                "MB" => 1024.0 * 1024.0,
                "GB" => 1024.0 * 1024.0 * 1024.0,
                _ => return None,
            };
            if words.next().is_some() || number < 0.0 {
                return None;
            }
            Some((number * multiplier).round() as u64)
        })
}

/// Gallery entries on one listing page, in page order.
pub fn parse_listing(base: &Url, html: &str) -> Result<Vec<ListingEntry>, WebbError> {
    let document = Html::parse_document(html);
    let boxes = selector("div.ad-research-box")?;
    let anchor = selector("a[href]")?;
    let mut entries = Vec::new();
    for entry in document.select(&boxes) {
        let caption = element_text(entry);
        let Some(href) = entry
            .select(&anchor)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            tracing::debug!(caption, "Gallery entry without a link");
            continue;
        };
        if caption.is_empty() {
            continue;
        }
        entries.push(ListingEntry {
            caption,
            detail_link: resolve(base, href)?,
        });
    }
    Ok(entries)
}

/// Every link on a detail page. Unresolvable hrefs are skipped.
pub fn parse_detail_links(base: &Url, html: &str) -> Result<Vec<DetailLink>, WebbError> {
    let document = Html::parse_document(html);
    let anchor = selector("a[href]")?;
    Ok(document
        .select(&anchor)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            let label = element_text(a);
            let href = resolve(base, href).ok()?;
            Some(DetailLink {
                size_hint: parse_size_hint(&label),
                label,
                href,
            })
        })
        .collect())
}

#[derive(Debug)]
pub struct WebbGallery {
    http: Client,
    base: Url,
}

impl WebbGallery {
    pub fn new(http: Client) -> Result<Self, WebbError> {
        Self::with_base(http, SITE_URL)
    }

    pub fn with_base(http: Client, base: &str) -> Result<Self, WebbError> {
        let base = Url::parse(base).map_err(|source| WebbError::Link {
            href: base.to_string(),
            source,
        })?;
        Ok(Self { http, base })
    }

    fn listing_url(&self, page: u32) -> Result<String, WebbError> {
        let path = format!(
            "/resource-gallery/images?page={}&itemsPerPage={}",
            page, PAGE_SIZE
        );
        resolve(&self.base, &path)
    }

    /// Page body, or `None` when the page does not exist.
    async fn get(&self, url: &str) -> Result<Option<String>, WebbError> {
        let response = self
            .http
            .get(url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(WebbError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(Some(response.text().await?))
    }
}

#[async_trait]
impl ScrapeTarget for WebbGallery {
    async fn fetch_listing_page(&self, page: u32) -> anyhow::Result<Vec<ListingEntry>> {
        let url = self.listing_url(page)?;
        tracing::debug!(url, "Fetching gallery listing");
        match self.get(&url).await? {
            Some(html) => Ok(parse_listing(&self.base, &html)?),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_detail_links(&self, detail_link: &str) -> anyhow::Result<Vec<DetailLink>> {
        match self.get(detail_link).await? {
            Some(html) => {
                let base = Url::parse(detail_link).unwrap_or_else(|_| self.base.clone());
                Ok(parse_detail_links(&base, &html)?)
            }
            None => Ok(Vec::new()),
        }
    }
}
