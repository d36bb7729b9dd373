//! Error types for the Pro Tools client

/// Result type alias for Pro Tools operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to Pro Tools
///
/// Variants carrying a `payload` hold the `response_error_json` sent by
/// Pro Tools verbatim: it is the only diagnostic the operator gets.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The PTSL endpoint could not be reached
    #[error("Cannot connect to Pro Tools at {address}: {message}")]
    Connection { address: String, message: String },

    /// Pro Tools refused the connection registration
    #[error("Pro Tools rejected registration (status {status}): {payload}")]
    Registration { status: i32, payload: String },

    /// A call was attempted before `connect()` succeeded
    #[error("Not connected to Pro Tools")]
    NotConnected,

    /// A call was attempted before registration completed
    #[error("Connection to Pro Tools is not registered")]
    NotRegistered,

    /// Pro Tools answered a command with a non-success status
    #[error("Pro Tools command {command} failed (status {status}): {payload}")]
    RemoteCommand {
        command: String,
        status: i32,
        payload: String,
    },

    /// The export (bounce) command failed
    #[error("Bounce failed (status {status}): {payload}")]
    Bounce { status: i32, payload: String },

    /// gRPC transport failure after the channel was established
    #[error("PTSL transport error: {0}")]
    Transport(#[from] tonic::Status),

    /// Response body could not be decoded
    #[error("Invalid PTSL response body: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid protocol profile or bounce settings
    #[error("Pro Tools configuration error: {0}")]
    Configuration(String),

    /// Configuration error (from bnsconfig/anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Returns the raw error payload sent by Pro Tools, if any
    pub fn remote_payload(&self) -> Option<&str> {
        match self {
            Error::Registration { payload, .. }
            | Error::RemoteCommand { payload, .. }
            | Error::Bounce { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// Whether the error leaves no usable channel to Pro Tools
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Error::Connection { .. } | Error::Registration { .. } | Error::NotConnected
        )
    }
}
