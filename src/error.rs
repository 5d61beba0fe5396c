//! error types for the dashboard

use thiserror::Error;

/// why a fetch cycle produced no reading
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("endpoint answered {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// database side of the telemetry endpoint
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database connection failed: {0}")]
    Connect(String),

    #[error("query failed: {0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("invalid table name `{0}`")]
    InvalidTable(String),
}

/// camera frame could not be turned into bytes
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("not a base64 data url")]
    NotDataUrl,

    #[error("base64 decode failed: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("image download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("image is empty")]
    Empty,
}
