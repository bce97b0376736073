use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpenAiError {
    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Response from {endpoint} contained no {what}")]
    Empty {
        endpoint: &'static str,
        what: &'static str,
    },

    #[error("Invalid inline image data: {0}")]
    InlineImage(#[from] base64::DecodeError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
