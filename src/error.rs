//! # Error Types
//!
//! Two error families:
//!
//! - [`ApiError`]: everything the Session/Request Boundary can surface to its caller.
//! - [`IngestError`]: rejections from the image ingestion pipeline.
//!
//! Neither family is ever swallowed inside the crate; callers decide how to
//! present them.

use thiserror::Error;

/// Result alias for API operations.
pub type Result<T, E = ApiError> = std::result::Result<T, E>;

/// Errors produced by the Session/Request Boundary.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The server answered 401. The session has already been torn down.
    #[error("Unauthorized")]
    Unauthorized,

    /// Any other non-2xx answer.
    #[error("{detail} (HTTP {status})")]
    RequestFailed { status: u16, detail: String },

    #[error("login failed: {0}")]
    AuthFailed(String),

    #[error("registration failed: {0}")]
    RegistrationFailed(String),

    /// A 2xx answer whose body does not have the expected shape.
    #[error("invalid response from server: {0}")]
    InvalidResponse(String),

    /// Collected form input rejected before anything was sent.
    #[error("{0}")]
    InvalidForm(String),

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid client configuration: {0}")]
    Config(String),

    #[error("session store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl ApiError {
    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Rejections from the image ingestion pipeline.
///
/// A failure at any stage discards all work for that invocation, so there is
/// no partially built asset to recover.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("invalid file type '{mime_type}', please upload a JPG, PNG, or GIF image")]
    InvalidType { mime_type: String },

    #[error("file size too large: {size} bytes (maximum is {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("could not decode image: {0}")]
    DecodeError(String),

    #[error("could not encode image: {0}")]
    EncodeFailed(String),
}
