use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Frontier is empty")]
    EmptyFrontier,

    #[error("No proxies available")]
    NoProxiesAvailable,

    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    #[error("Error {status} at url {url}")]
    BadStatus { status: u16, url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Proxy check failed for {proxy}: {reason}")]
    ProxyCheck { proxy: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Worker error: {0:#}")]
    Worker(anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors that end a whole run instead of a single item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NoProxiesAvailable)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
