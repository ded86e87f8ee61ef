use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("Unknown client: {0}")]
    UnknownClient(String),

    #[error("Ads API error for {ad_account_id}: {message}")]
    AdsApi {
        ad_account_id: String,
        message: String,
    },

    #[error("Commerce API error on {endpoint}: {message}")]
    CommerceApi { endpoint: String, message: String },

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
