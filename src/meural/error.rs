use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeuralError {
    #[error("API error (HTTP {status}) for {endpoint}: {body}")]
    Api {
        status: u16,
        endpoint: String,
        body: String,
    },

    #[error("Unexpected response from {endpoint}: {message}")]
    MissingData {
        endpoint: String,
        message: &'static str,
    },

    #[error("Device reported failure for {command}")]
    DeviceFailure { command: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl MeuralError {
    pub(crate) fn missing(endpoint: &str, message: &'static str) -> Self {
        MeuralError::MissingData {
            endpoint: endpoint.to_string(),
            message,
        }
    }
}
