//! Error type for batch API calls.

use super::classify::{classify_curl_error, classify_http_status, ErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// libcurl reported a transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] curl::Error),
    /// Non-2xx response.
    #[error("HTTP {status} from {endpoint}: {body}")]
    Http {
        status: u32,
        endpoint: String,
        body: String,
    },
    /// Response body did not have the expected shape.
    #[error("invalid response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
    /// API key environment variable unset or empty.
    #[error("missing API key: set {0}")]
    MissingKey(String),
    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Transport(e) => classify_curl_error(e),
            ApiError::Http { status, .. } => classify_http_status(*status),
            ApiError::Decode { .. } | ApiError::MissingKey(_) | ApiError::Url(_) => {
                ErrorKind::Other
            }
        }
    }

    pub(crate) fn decode(endpoint: &str, message: impl Into<String>) -> Self {
        ApiError::Decode {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }
}
