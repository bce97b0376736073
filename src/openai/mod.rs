//! HTTP client for OpenAI text completion and image generation.

pub mod error;
pub mod responses;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

pub use error::OpenAiError;

use crate::capability::{GenerativeProvider, TextModel};
use crate::types::{ImageQuality, ImageStyle};
use responses::{
    ChatMessage, ChatRequest, CompletionRequest, CompletionResponse, ImageRequest, ImageResponse,
};

const API_URL: &str = "https://api.openai.com/";
const INSTRUCT_MODEL: &str = "gpt-3.5-turbo-instruct";
const CHAT_MODEL: &str = "gpt-4o-mini";
const ADVANCED_CHAT_MODEL: &str = "gpt-4o";
const IMAGE_MODEL: &str = "dall-e-3";
/// Portrait, matching how the frame is usually hung.
const IMAGE_SIZE: &str = "1024x1792";
const SYSTEM_PROMPT: &str = "you are a helpful assistant that generates works of art";

/// Stable opaque end-user id derived from the account name.
pub fn end_user_id(account: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, account.as_bytes()).to_string()
}

/// Decode an inline image into `dir` and return a `file://` URL for it.
pub fn write_inline_image(dir: &Path, b64: &str) -> Result<String, OpenAiError> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(b64.trim())?;
    std::fs::create_dir_all(dir)?;
    let path: PathBuf = tempfile::Builder::new()
        .prefix("framefeed-generated-")
        .suffix(".png")
        .tempfile_in(dir)?
        .into_temp_path()
        .keep()
        .map_err(|e| OpenAiError::Io(e.error))?;
    std::fs::write(&path, bytes)?;
    let url = url::Url::from_file_path(&path).map_err(|_| {
        OpenAiError::Io(std::io::Error::other(format!(
            "cannot express {} as a URL",
            path.display()
        )))
    })?;
    Ok(url.to_string())
}

pub struct OpenAiClient {
    http: Client,
    api_key: String,
    user_id: String,
    /// Where inline (base64) images are written.
    work_dir: PathBuf,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("api_key", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("work_dir", &self.work_dir)
            .finish()
    }
}

impl OpenAiClient {
    pub fn new(
        api_key: String,
        account: &str,
        work_dir: PathBuf,
        timeout: Duration,
    ) -> Result<Self, OpenAiError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key,
            user_id: end_user_id(account),
            work_dir,
        })
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &'static str,
        body: &B,
    ) -> Result<T, OpenAiError> {
        let response = self
            .http
            .post(format!("{}{}", API_URL, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        parse(response).await
    }
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, OpenAiError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(OpenAiError::Api {
            status: status.as_u16(),
            body: text,
        });
    }
    Ok(serde_json::from_str(&text)?)
}

#[async_trait]
impl GenerativeProvider for OpenAiClient {
    async fn complete_text(&self, prompt: &str, model: TextModel) -> anyhow::Result<String> {
        tracing::info!(prompt, ?model, "Requesting generated prompt");
        let response: CompletionResponse = match model {
            TextModel::Instruct => {
                let body = CompletionRequest {
                    model: INSTRUCT_MODEL,
                    prompt,
                    max_tokens: 60,
                    temperature: 0.99,
                    user: &self.user_id,
                };
                self.post("v1/completions", &body).await?
            }
            TextModel::Chat | TextModel::ChatAdvanced => {
                let body = ChatRequest {
                    model: if model == TextModel::Chat {
                        CHAT_MODEL
                    } else {
                        ADVANCED_CHAT_MODEL
                    },
                    messages: vec![
                        ChatMessage {
                            role: "system".into(),
                            content: SYSTEM_PROMPT.into(),
                        },
                        ChatMessage {
                            role: "user".into(),
                            content: prompt.into(),
                        },
                    ],
                    user: &self.user_id,
                };
                self.post("v1/chat/completions", &body).await?
            }
        };
        let text = response.first_text().ok_or(OpenAiError::Empty {
            endpoint: "completions",
            what: "text",
        })?;
        Ok(text.to_string())
    }

    async fn generate_image(
        &self,
        prompt: &str,
        style: ImageStyle,
        quality: ImageQuality,
    ) -> anyhow::Result<String> {
        let body = ImageRequest {
            model: IMAGE_MODEL,
            prompt,
            n: 1,
            size: IMAGE_SIZE,
            style: style.as_str(),
            quality: quality.as_str(),
            user: &self.user_id,
        };
        let response: ImageResponse = self.post("v1/images/generations", &body).await?;
        let image = response.data.into_iter().next().ok_or(OpenAiError::Empty {
            endpoint: "images/generations",
            what: "image",
        })?;
        if let Some(url) = image.url.filter(|u| !u.is_empty()) {
            return Ok(url);
        }
        match image.b64_json {
            Some(b64) => Ok(write_inline_image(&self.work_dir, &b64)?),
            None => Err(OpenAiError::Empty {
                endpoint: "images/generations",
                what: "image url or data",
            }
            .into()),
        }
    }
}
