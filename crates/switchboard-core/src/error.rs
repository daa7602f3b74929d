//! Error types for switchboard.
//!
//! Errors fall into three groups that callers handle differently:
//!
//! - **Local misuse**: programming errors raised synchronously at the call site
//!   (invalid iterator state, method collisions, handle exhaustion, ...).
//! - **Call failure**: the server answered an RPC call with an error.
//! - **Transport / serialization**: the connection could not carry a message.
//!
//! Protocol anomalies (unknown channels, unknown call ids, unrecognized
//! notifications) are not represented here. They are logged and dropped.

use thiserror::Error;

/// Main error type for the switchboard library.
#[derive(Debug, Error)]
pub enum SwitchboardError {
    // Iterator misuse
    #[error("Iterator not pointing to an item (call next() first)")]
    CursorNotPositioned,

    #[error("Iterator pointing to a deleted item (call next() first)")]
    CursorOnDeletedItem,

    #[error("Iterator exhausted")]
    CursorExhausted,

    // RPC method table misuse
    #[error("Method \"{verb}\" already exists on service. Refusing to overwrite it")]
    MethodCollision { verb: String },

    #[error("Unknown method \"{verb}\" on service \"{service}\"")]
    UnknownMethod { service: String, verb: String },

    // Service registration
    #[error("Service \"{name}\" is already registered")]
    DuplicateService { name: String },

    #[error("Connection attempt already in progress or established")]
    ConnectInProgress,

    // Stateful handle protocol
    #[error("Can't update '{field}' of cursor")]
    FieldNotUpdatable { field: String },

    #[error("Too many cursors: {live} live handles (limit {limit})")]
    HandleSpaceExhausted { live: usize, limit: usize },

    #[error("Cursor {handle} has already been removed")]
    CursorRemoved { handle: u8 },

    // Canonical key encoding
    #[error("Cycles are not allowed (value nesting exceeds {depth} levels)")]
    CyclicValue { depth: usize },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Remote call errors
    #[error("{command} failed: {message}")]
    CallFailed { command: String, message: String },

    #[error("Call {call_id} ({command}) was abandoned before a reply arrived")]
    CallAbandoned { command: String, call_id: u64 },

    // Transport errors
    #[error("Transport error: {message}")]
    Transport { message: String },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },
}

/// Result type alias for switchboard operations.
pub type Result<T> = std::result::Result<T, SwitchboardError>;

impl From<serde_json::Error> for SwitchboardError {
    fn from(err: serde_json::Error) -> Self {
        SwitchboardError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl SwitchboardError {
    /// Create a transport error from any displayable cause.
    pub fn transport(cause: impl std::fmt::Display) -> Self {
        SwitchboardError::Transport {
            message: cause.to_string(),
        }
    }

    /// True for errors that indicate a programming error at the call site.
    ///
    /// These are never retried.
    pub fn is_local_misuse(&self) -> bool {
        matches!(
            self,
            SwitchboardError::CursorNotPositioned
                | SwitchboardError::CursorOnDeletedItem
                | SwitchboardError::CursorExhausted
                | SwitchboardError::MethodCollision { .. }
                | SwitchboardError::UnknownMethod { .. }
                | SwitchboardError::DuplicateService { .. }
                | SwitchboardError::ConnectInProgress
                | SwitchboardError::FieldNotUpdatable { .. }
                | SwitchboardError::HandleSpaceExhausted { .. }
                | SwitchboardError::CursorRemoved { .. }
                | SwitchboardError::CyclicValue { .. }
                | SwitchboardError::Validation { .. }
        )
    }

    /// True when the server answered the call with an error message.
    pub fn is_call_failure(&self) -> bool {
        matches!(self, SwitchboardError::CallFailed { .. })
    }

    /// Server-supplied message of a failed call, if this is one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            SwitchboardError::CallFailed { message, .. } => Some(message),
            _ => None,
        }
    }
}
