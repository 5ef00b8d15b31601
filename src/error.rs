//! Error types
//!
//! Only the decode session's configuration path and the accelerator seam
//! return these; the receiver reports its failures as events instead.

use std::time::Duration;

use crate::session::DecodeState;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// I/O error on the transport
    Io(std::io::Error),
    /// Connection could not be established
    Connect(ConnectError),
    /// Hardware decoder error
    Decode(DecodeError),
}

/// Connection establishment errors
#[derive(Debug)]
pub enum ConnectError {
    /// Connect did not complete within the configured timeout
    Timeout(Duration),
    /// Host name did not resolve to any address
    Resolve(String),
    /// Socket-level failure (refused, unreachable, reset)
    Io(std::io::Error),
}

/// Decode session and accelerator errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Platform has no decoder for the requested MIME type
    NoDecoder(String),
    /// Output surface could not be bound to the decoder
    SurfaceBinding(String),
    /// Decoder failed to start after configuration
    Start(String),
    /// Operation not valid in the current session state
    InvalidState(DecodeState),
    /// Runtime fault reported by the accelerator
    Accelerator(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Connect(e) => write!(f, "Connection failed: {}", e),
            Error::Decode(e) => write!(f, "Decoder error: {}", e),
        }
    }
}

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectError::Timeout(t) => write!(f, "timed out after {} ms", t.as_millis()),
            ConnectError::Resolve(host) => write!(f, "could not resolve {}", host),
            ConnectError::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::NoDecoder(mime) => write!(f, "no decoder available for {}", mime),
            DecodeError::SurfaceBinding(msg) => write!(f, "surface binding failed: {}", msg),
            DecodeError::Start(msg) => write!(f, "decoder failed to start: {}", msg),
            DecodeError::InvalidState(state) => write!(f, "invalid in state {:?}", state),
            DecodeError::Accelerator(msg) => write!(f, "accelerator fault: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Connect(ConnectError::Io(e)) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConnectError {}

impl std::error::Error for DecodeError {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ConnectError> for Error {
    fn from(e: ConnectError) -> Self {
        Error::Connect(e)
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Error::Decode(e)
    }
}
