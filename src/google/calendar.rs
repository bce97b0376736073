//! Holiday lookup used to theme generated images.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveDate, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::auth::GoogleAuth;
use super::error::GoogleError;
use super::parse;
use crate::capability::CalendarProvider;
use crate::retry::retry_once;

const API_URL: &str = "https://www.googleapis.com/calendar/v3/";
pub const DEFAULT_HOLIDAY_CALENDAR: &str = "en.usa#holiday@group.v.calendar.google.com";
const LOOKAHEAD_DAYS: i64 = 7;
const MAX_EVENTS: u32 = 25;

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<Event>,
}

#[derive(Debug, Deserialize)]
struct Event {
    #[serde(default)]
    summary: Option<String>,
}

/// Prompt suffix for the first event with a summary, or empty.
fn holiday_suffix(events: &EventList) -> String {
    events
        .items
        .iter()
        .filter_map(|e| e.summary.as_deref())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(|summary| format!(" with elements of {}", summary))
        .unwrap_or_default()
}

fn events_url(calendar_id: &str, now: DateTime<Utc>) -> String {
    let until = now + Duration::days(LOOKAHEAD_DAYS);
    format!(
        "{}calendars/{}/events?maxResults={}&orderBy=startTime&singleEvents=true&timeMin={}&timeMax={}",
        API_URL,
        urlencoding::encode(calendar_id),
        MAX_EVENTS,
        urlencoding::encode(&now.to_rfc3339_opts(SecondsFormat::Secs, true)),
        urlencoding::encode(&until.to_rfc3339_opts(SecondsFormat::Secs, true)),
    )
}

/// Reads upcoming events from a public holiday calendar, at most once a day.
#[derive(Debug)]
pub struct GoogleCalendar {
    http: Client,
    auth: Arc<GoogleAuth>,
    calendar_id: String,
    cache: Mutex<Option<(NaiveDate, String)>>,
}

impl GoogleCalendar {
    pub fn new(http: Client, auth: Arc<GoogleAuth>, calendar_id: String) -> Self {
        Self {
            http,
            auth,
            calendar_id,
            cache: Mutex::new(None),
        }
    }

    fn cached_for(&self, day: NaiveDate) -> Option<String> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache
            .as_ref()
            .filter(|(cached_day, _)| *cached_day == day)
            .map(|(_, text)| text.clone())
    }

    fn remember(&self, day: NaiveDate, text: String) {
        *self.cache.lock().unwrap_or_else(|e| e.into_inner()) = Some((day, text));
    }

    async fn fetch(&self) -> Result<String, GoogleError> {
        let url = events_url(&self.calendar_id, Utc::now());
        let token = self.auth.access_token().await?;
        let response = self.http.get(&url).bearer_auth(token).send().await?;
        let events: EventList = parse(&url, response).await?;
        Ok(holiday_suffix(&events))
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendar {
    async fn upcoming_holiday_text(&self) -> anyhow::Result<String> {
        let today = Local::now().date_naive();
        if let Some(text) = self.cached_for(today) {
            return Ok(text);
        }
        tracing::info!(calendar = %self.calendar_id, "Fetching holiday information");
        let text = retry_once("holiday lookup", || self.auth.invalidate(), || self.fetch()).await?;
        tracing::info!(holiday = %text, "Holiday suffix refreshed");
        self.remember(today, text.clone());
        Ok(text)
    }
}
