//! HTTP client for a Meural picture frame.
//!
//! Durable changes go through the cloud relay (token auth, uploads,
//! galleries). Power state and previews go straight to the frame's local
//! HTTP interface, whose address is discovered from the relay.

pub mod error;
pub mod responses;
pub mod session;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

pub use error::MeuralError;
pub use session::{DeviceInfo, MeuralSession};

use crate::capability::{DisplayDevice, LocalImage, Playlist};
use crate::types::Orientation;
use responses::{id_string, DataResponse, Device, Gallery, Item, LocalResponse, TokenResponse};

const API_URL: &str = "https://api.meural.com/v0/";

#[derive(Clone)]
pub struct MeuralCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for MeuralCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeuralCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug)]
pub struct MeuralClient {
    http: Client,
    api_url: String,
    credentials: MeuralCredentials,
    orientation: Orientation,
    session: MeuralSession,
}

impl MeuralClient {
    pub fn new(
        credentials: MeuralCredentials,
        orientation: Orientation,
        timeout: Duration,
    ) -> Result<Self, MeuralError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_url: API_URL.to_string(),
            credentials,
            orientation,
            session: MeuralSession::new(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    async fn token(&self) -> Result<String, MeuralError> {
        if let Some(token) = self.session.token() {
            return Ok(token);
        }
        tracing::info!("Fetching display service token");
        let endpoint = self.endpoint("authenticate");
        let response = self
            .http
            .post(&endpoint)
            .form(&[
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
            ])
            .send()
            .await?;
        let body: TokenResponse = parse(&endpoint, response).await?;
        let token = body
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| MeuralError::missing(&endpoint, "no token in response"))?;
        self.session.set_token(token.clone());
        Ok(token)
    }

    async fn authed(&self, builder: RequestBuilder) -> Result<RequestBuilder, MeuralError> {
        let token = self.token().await?;
        Ok(builder.header("Authorization", format!("Token {}", token)))
    }

    async fn device(&self) -> Result<DeviceInfo, MeuralError> {
        if let Some(device) = self.session.device() {
            return Ok(device);
        }
        tracing::info!("Fetching device info from display service");
        let endpoint = self.endpoint("user/devices?count=10&page=1");
        let response = self.authed(self.http.get(&endpoint)).await?.send().await?;
        let body: DataResponse<Vec<Device>> = parse(&endpoint, response).await?;
        let device = body
            .data
            .and_then(|devices| devices.into_iter().next())
            .ok_or_else(|| MeuralError::missing(&endpoint, "account has no devices"))?;
        let info = DeviceInfo {
            id: id_string(&device.id)
                .ok_or_else(|| MeuralError::missing(&endpoint, "device without id"))?,
            alias: device.alias,
            local_ip: device
                .frame_status
                .and_then(|s| s.local_ip)
                .filter(|ip| !ip.is_empty())
                .ok_or_else(|| MeuralError::missing(&endpoint, "device has no local address"))?,
        };
        tracing::debug!(device = ?info, "Display device discovered");
        self.session.set_device(info.clone());
        Ok(info)
    }

    /// GET a command on the frame's local interface.
    async fn local_command(&self, command: &str) -> Result<LocalResponse, MeuralError> {
        let url = format!("{}{}", self.device().await?.local_url(), command);
        let response = self.http.get(&url).send().await?;
        let body: LocalResponse = parse(&url, response).await?;
        if !body.is_pass() {
            return Err(MeuralError::DeviceFailure {
                command: command.to_string(),
            });
        }
        Ok(body)
    }

    /// POST to the relay and only check the status code.
    async fn relay_post(&self, path: &str) -> Result<(), MeuralError> {
        let endpoint = self.endpoint(path);
        let response = self.authed(self.http.post(&endpoint)).await?.send().await?;
        check(&endpoint, response).await?;
        Ok(())
    }

    async fn create_playlist(&self, name: &str) -> Result<Playlist, MeuralError> {
        tracing::info!(name, "Creating playlist");
        let endpoint = self.endpoint("galleries");
        let response = self
            .authed(self.http.post(&endpoint))
            .await?
            .form(&[("name", name), ("orientation", self.orientation.as_str())])
            .send()
            .await?;
        let body: DataResponse<Gallery> = parse(&endpoint, response).await?;
        let gallery = body
            .data
            .ok_or_else(|| MeuralError::missing(&endpoint, "no playlist in response"))?;
        to_playlist(&endpoint, gallery)
    }

    async fn file_part(image: &LocalImage) -> Result<Part, MeuralError> {
        let bytes = tokio::fs::read(&image.path).await?;
        Ok(Part::bytes(bytes)
            .file_name(image.name.clone())
            .mime_str(image.mime)?)
    }
}

fn to_playlist(endpoint: &str, gallery: Gallery) -> Result<Playlist, MeuralError> {
    Ok(Playlist {
        id: id_string(&gallery.id)
            .ok_or_else(|| MeuralError::missing(endpoint, "playlist without id"))?,
        item_ids: gallery.item_ids.iter().filter_map(id_string).collect(),
    })
}

async fn check(endpoint: &str, response: Response) -> Result<Response, MeuralError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(MeuralError::Api {
        status: status.as_u16(),
        endpoint: endpoint.to_string(),
        body,
    })
}

async fn parse<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T, MeuralError> {
    let response = check(endpoint, response).await?;
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Err(MeuralError::missing(endpoint, "empty body"));
    }
    Ok(serde_json::from_str(&text)?)
}

#[async_trait]
impl DisplayDevice for MeuralClient {
    async fn is_asleep(&self) -> anyhow::Result<bool> {
        let body = self.local_command("/remote/control_check/sleep").await?;
        body.response
            .as_bool()
            .ok_or_else(|| anyhow::anyhow!("sleep check returned {}", body.response))
    }

    async fn wake(&self) -> anyhow::Result<()> {
        self.local_command("/remote/control_command/resume").await?;
        Ok(())
    }

    async fn sleep(&self) -> anyhow::Result<()> {
        self.local_command("/remote/control_command/suspend").await?;
        Ok(())
    }

    async fn show_info(&self) -> anyhow::Result<()> {
        self.local_command("/remote/control_command/set_key/up").await?;
        Ok(())
    }

    async fn hide_info(&self) -> anyhow::Result<()> {
        self.local_command("/remote/control_command/set_key/down").await?;
        Ok(())
    }

    async fn preview(&self, image: &LocalImage) -> anyhow::Result<()> {
        let url = format!("{}/remote/postcard", self.device().await?.local_url());
        let form = Form::new().part("photo", Self::file_part(image).await?);
        let response = self.http.post(&url).multipart(form).send().await?;
        let body: LocalResponse = parse(&url, response).await?;
        anyhow::ensure!(body.is_pass(), "device rejected preview");
        Ok(())
    }

    async fn upload(&self, image: &LocalImage) -> anyhow::Result<String> {
        let endpoint = self.endpoint("items");
        let form = Form::new().part("image", Self::file_part(image).await?);
        let response = self
            .authed(self.http.post(&endpoint))
            .await?
            .multipart(form)
            .send()
            .await?;
        let body: DataResponse<Item> = parse(&endpoint, response).await?;
        let id = body
            .data
            .and_then(|item| id_string(&item.id))
            .ok_or_else(|| MeuralError::missing(&endpoint, "no item in upload response"))?;
        tracing::debug!(asset_id = %id, name = %image.name, "Uploaded to display service");
        Ok(id)
    }

    async fn playlist(&self, name: &str) -> anyhow::Result<Playlist> {
        let endpoint = self.endpoint("user/galleries?count=10&page=1");
        let response = self.authed(self.http.get(&endpoint)).await?.send().await?;
        let body: DataResponse<Vec<Gallery>> = parse(&endpoint, response).await?;
        let existing = body
            .data
            .unwrap_or_default()
            .into_iter()
            .find(|g| g.name.eq_ignore_ascii_case(name));
        match existing {
            Some(gallery) => Ok(to_playlist(&endpoint, gallery)?),
            None => Ok(self.create_playlist(name).await?),
        }
    }

    async fn add_to_playlist(&self, playlist_id: &str, item_id: &str) -> anyhow::Result<()> {
        self.relay_post(&format!("galleries/{}/items/{}", playlist_id, item_id))
            .await?;
        Ok(())
    }

    async fn delete_item(&self, item_id: &str) -> anyhow::Result<()> {
        let endpoint = self.endpoint(&format!("items/{}", item_id));
        let response = self.authed(self.http.delete(&endpoint)).await?.send().await?;
        check(&endpoint, response).await?;
        Ok(())
    }

    async fn bind_playlist(&self, playlist_id: &str) -> anyhow::Result<()> {
        let device = self.device().await?;
        tracing::info!(
            device = %device.id,
            alias = device.alias.as_deref().unwrap_or(""),
            playlist = playlist_id,
            "Binding playlist to display"
        );
        self.relay_post(&format!("devices/{}/galleries/{}", device.id, playlist_id))
            .await?;
        Ok(())
    }

    fn reset_session(&self) {
        self.session.reset();
    }
}
