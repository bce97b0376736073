use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebbError {
    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Invalid link {href}: {source}")]
    Link {
        href: String,
        source: url::ParseError,
    },

    #[error("Invalid selector {0}")]
    Selector(&'static str),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
