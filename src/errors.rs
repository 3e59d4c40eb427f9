//! Error types for the Seq sink

use std::fmt;

pub type Result<T> = std::result::Result<T, SinkError>;

#[derive(Debug)]
pub enum SinkError {
    /// HTTP request failed at the transport level
    Http(reqwest::Error),

    /// The server rejected a delivery with a failure status code
    Delivery { status: u16, body: String },

    /// Configuration error
    Config(String),

    /// Generic error with message
    Other(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Http(err) => write!(f, "HTTP error: {}", err),
            SinkError::Delivery { status, body } => {
                write!(f, "Received failed response {} from Seq server: {}", status, body)
            }
            SinkError::Config(msg) => write!(f, "Configuration error: {}", msg),
            SinkError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SinkError {
    fn from(err: reqwest::Error) -> Self {
        SinkError::Http(err)
    }
}
