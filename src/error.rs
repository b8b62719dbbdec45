use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing {0} env variable")]
    MissingCredential(&'static str),

    #[error("{source_name}: {url} responded with status {status}")]
    Transport {
        source_name: String,
        url: String,
        status: u16,
    },

    #[error("{source_name}: invalid response: {message}")]
    InvalidResponse {
        source_name: String,
        message: String,
    },

    #[error("{source_name}: unable to find the calendar download link on {url}")]
    DiscoveryFailed { source_name: String, url: String },

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Index error: {message}")]
    Index { message: String },

    #[error("Geocoding error: {message}")]
    Geocoding { message: String },
}

impl SyncError {
    pub fn invalid_response(source_name: &str, message: impl Into<String>) -> Self {
        SyncError::InvalidResponse {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
