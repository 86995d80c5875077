/// Error types for keyword and device operations
use thiserror::Error;

#[derive(Debug, Error)]
pub enum U2Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Device is not connected, call connect_device first")]
    NotConnected,

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("UiObject not found: {0}")]
    ElementNotFound(String),

    #[error("XPath element not found: {0}")]
    XPathElementNotFound(String),

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Window hierarchy error: {0}")]
    Hierarchy(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}

impl U2Error {
    /// Build an invalid-argument error naming the keyword that rejected the call
    pub fn invalid(keyword: &str, detail: impl std::fmt::Display) -> Self {
        U2Error::InvalidArgument(format!("{}() {}", keyword, detail))
    }

    /// Shorthand for the wrong-shape error every by-locator keyword raises
    pub fn wrong_arguments(keyword: &str) -> Self {
        Self::invalid(keyword, "wrong number or type of arguments")
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, U2Error::InvalidArgument(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, U2Error::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, U2Error>;
