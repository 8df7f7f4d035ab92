use crate::playback::MismatchDiagnostics;
use hyper::http;
use std::{io, sync};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("A tapedeck session is already active")]
    AlreadyActive,
    #[error("No tapedeck session is active")]
    NotActive,
    #[error("The session controller is in an invalid mode")]
    InvalidMode,
    #[error("The fixture `{name}` couldn't be parsed: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    NoMatch(Box<MismatchDiagnostics>),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Transport error: {0}")]
    Transport(Box<dyn std::error::Error + Send + Sync>),
    #[error("IoError: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("The lock was poisoned")]
    PoisonedLock,
    #[error("Invalid header name")]
    InvalidHeaderName,
    #[error("Invalid header value")]
    InvalidHeaderValue,
    #[error("Invalid body")]
    InvalidBody,
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Hyper error: {0}")]
    HyperError(#[from] hyper::Error),
    #[error("Http Error: {0}")]
    HttpError(#[from] http::Error),
}

impl<T> From<sync::PoisonError<T>> for Error {
    fn from(_: sync::PoisonError<T>) -> Self {
        Error::PoisonedLock
    }
}

impl From<hyper::header::InvalidHeaderName> for Error {
    fn from(_: hyper::header::InvalidHeaderName) -> Self {
        Error::InvalidHeaderName
    }
}

impl From<hyper::header::InvalidHeaderValue> for Error {
    fn from(_: hyper::header::InvalidHeaderValue) -> Self {
        Error::InvalidHeaderValue
    }
}
