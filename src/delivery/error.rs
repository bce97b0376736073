use thiserror::Error;

/// Delivery failures.
///
/// `is_transient()` only affects how failures are logged; recovery is always
/// the single session reset and retry done around each device call.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Item has neither a URL nor a local file")]
    NothingToFetch,

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("HTTP error {status} fetching {url}")]
    HttpStatus { status: u16, url: String },

    #[error("HTTP error fetching {url} (bytes_so_far={bytes_written}): {source}")]
    Http {
        source: reqwest::Error,
        url: String,
        bytes_written: u64,
    },

    #[error("Disk error: {0}")]
    Disk(#[from] std::io::Error),

    #[error("Display device error: {0:#}")]
    Device(#[from] anyhow::Error),
}

impl DeliveryError {
    /// Whether trying the same item again later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            DeliveryError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            DeliveryError::Http { .. } => true,
            DeliveryError::Device(_) => true,
            DeliveryError::Disk(_) => false,
            DeliveryError::NothingToFetch => false,
            DeliveryError::Client(_) => false,
        }
    }
}
