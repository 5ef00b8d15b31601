//! Lifecycle states
//!
//! `DecodeState` tracks the decode session from creation to release;
//! `ConnectionState` tracks the receiver's transport.

/// Decode session lifecycle
///
/// ```text
/// Unconfigured ──configure(ok)──► Running ──release──► Released
///       │                                                 ▲
///       └─────────────release / configure(err)────────────┘
/// ```
///
/// There is no way back to `Unconfigured`; a new geometry or surface needs a
/// fresh session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    /// Created, no accelerator yet
    Unconfigured,
    /// Accelerator configured, started and bound to a surface
    Running,
    /// Accelerator stopped and freed
    Released,
}

/// Transport connection state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Connection or stream failure with its message
    Error(String),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Error(msg) => write!(f, "error: {}", msg),
        }
    }
}
