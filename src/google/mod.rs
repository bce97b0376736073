//! Google photo library and calendar clients sharing one OAuth token.

pub mod auth;
pub mod calendar;
pub mod error;
pub mod photos;

use reqwest::Response;
use serde::de::DeserializeOwned;

pub use auth::{GoogleAuth, GoogleCredentials};
pub use calendar::{GoogleCalendar, DEFAULT_HOLIDAY_CALENDAR};
pub use error::GoogleError;
pub use photos::GooglePhotos;

async fn check(endpoint: &str, response: Response) -> Result<Response, GoogleError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GoogleError::Api {
        status: status.as_u16(),
        endpoint: endpoint.to_string(),
        body,
    })
}

async fn parse<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T, GoogleError> {
    let response = check(endpoint, response).await?;
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Err(GoogleError::missing(endpoint, "empty body"));
    }
    Ok(serde_json::from_str(&text)?)
}
