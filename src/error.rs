use thiserror::Error;

/// Errors raised by the pipeline stages (transform, aggregate, encode, config).
#[derive(Error, Debug)]
pub enum ParcelError {
    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    #[error("Failed to parse '{value}' as number in column '{field}' at row {row}")]
    NotNumeric {
        field: String,
        row: usize,
        value: String,
    },

    #[error("Invalid bucket rules: {0}")]
    InvalidRules(String),

    #[error("Invalid color '{0}' (expected \"#rrggbb\" or [r, g, b])")]
    InvalidColor(String),

    #[error("Color ramp needs at least one stop")]
    EmptyRamp,

    #[error("No {kind} named '{name}' in style configuration")]
    UnknownConfigEntry { kind: &'static str, name: String },

    #[error("Configuration parse failed: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ParcelError>;

/// Failure of the single feature fetch. Never retried.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Server responded with status {0}")]
    Status(u16),

    #[error("Invalid query URL: {0}")]
    Url(String),

    #[error("Unexpected response body: {0}")]
    Decode(String),
}
