use starcall_core::{Status, StatusCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("stream closed")]
    StreamClosed,

    #[error("invalid call state: {0}")]
    InvalidState(&'static str),

    #[error("call cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("call failed: {0}")]
    Remote(Status),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Map a remote completion status onto the local failure taxonomy
    ///
    /// Cancellation, deadline and availability codes keep their dedicated
    /// variants; everything else is surfaced as-is via [`Error::Remote`].
    pub fn from_status(status: Status) -> Self {
        match status.code() {
            StatusCode::Cancelled => Error::Cancelled,
            StatusCode::DeadlineExceeded => Error::DeadlineExceeded,
            StatusCode::Unavailable => Error::TransportUnavailable(status.message().to_string()),
            _ => Error::Remote(status),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
