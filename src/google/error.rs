use thiserror::Error;

#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("API error (HTTP {status}) for {endpoint}: {body}")]
    Api {
        status: u16,
        endpoint: String,
        body: String,
    },

    #[error("Token refresh rejected: {0}")]
    Auth(String),

    #[error("Unexpected response from {endpoint}: {message}")]
    MissingData {
        endpoint: String,
        message: &'static str,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl GoogleError {
    pub(crate) fn missing(endpoint: &str, message: &'static str) -> Self {
        GoogleError::MissingData {
            endpoint: endpoint.to_string(),
            message,
        }
    }
}
