// src/error.rs
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The index has no record for this name/version.
    #[error("no index record for {name} {}", .version.as_deref().unwrap_or("(latest)"))]
    NotFound {
        name: String,
        version: Option<String>,
    },

    /// Timeout, transport failure or an ambiguous version. Worth one retry.
    #[error("transient index fetch failure: {0}")]
    TransientFetch(String),

    #[error("publish failed: {0}")]
    Publish(String),

    /// A changelog row with missing or mistyped fields.
    #[error("malformed changelog event: {0}")]
    MalformedEvent(String),

    #[error("index fault {code}: {message}")]
    Fault { code: i64, message: String },

    #[error("could not decode index response: {0}")]
    Decode(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    pub fn not_found(name: &str, version: Option<&str>) -> Self {
        Error::NotFound {
            name: name.to_string(),
            version: version.map(str::to_string),
        }
    }

    /// Failures that may go away on a second attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::TransientFetch(_) => true,
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::TransientFetch(_) => "transient",
            Error::Publish(_) => "publish",
            Error::MalformedEvent(_) => "malformed",
            Error::Fault { .. } => "fault",
            Error::Decode(_) => "decode",
            Error::Config(_) => "config",
            Error::Http(_) => "http",
        }
    }
}
