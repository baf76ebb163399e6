//! Error types for the handoff library.
//!
//! One enum covers all three transports plus the save engine. The
//! property-RPC bus reports remote failures as faults whose code is a
//! plain string (the peer's exception class name), so the mapping between
//! `HandoffError` variants and fault codes lives here too.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for handoff operations.
#[derive(Debug, Error)]
pub enum HandoffError {
    // Transport errors
    #[error("Connection to peer lost")]
    LostConnection,

    #[error("No such service: {name}")]
    NoSuchService { name: String },

    #[error("Window {window} is gone")]
    WindowGone { window: u32 },

    // Property-RPC dispatch faults
    #[error("Missing object path in call parameters")]
    NoObjectPath,

    #[error("Unknown object: {path}")]
    UnknownObject { path: String },

    #[error("Method not allowed or unknown: {method}")]
    NoSuchMethod { method: String },

    #[error("Remote fault {code}: {message}")]
    RemoteFault { code: String, message: String },

    // Save engine errors
    #[error("Save aborted: {reason}")]
    SaveAborted { reason: SaveAbortReason },

    // Wire format errors
    #[error("Frame error: {message}")]
    Frame { message: String },

    #[error("XML-RPC error: {message}")]
    Xml { message: String },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },
}

/// Why a drag-save did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveAbortReason {
    /// The user cancelled the save through the document's cancel hook.
    UserCancelled,
    /// Writing the document's bytes failed.
    WriteFailed(String),
    /// The drop target never wrote the XDS property.
    XdsPropertyMissing,
    /// The target asked us to save to a URI that is not a local path.
    RemoteTarget,
    /// The user refused to overwrite an existing file.
    OverwriteDeclined,
}

impl std::fmt::Display for SaveAbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveAbortReason::UserCancelled => write!(f, "cancelled by user"),
            SaveAbortReason::WriteFailed(msg) => write!(f, "write failed: {}", msg),
            SaveAbortReason::XdsPropertyMissing => {
                write!(f, "drop target did not set the XDS property")
            }
            SaveAbortReason::RemoteTarget => write!(f, "target URI is not a local path"),
            SaveAbortReason::OverwriteDeclined => write!(f, "overwrite declined"),
        }
    }
}

/// Result type alias for handoff operations.
pub type Result<T> = std::result::Result<T, HandoffError>;

// Conversion implementations for common error types

impl From<std::io::Error> for HandoffError {
    fn from(err: std::io::Error) -> Self {
        HandoffError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for HandoffError {
    fn from(err: serde_json::Error) -> Self {
        HandoffError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl HandoffError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        HandoffError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Convert to a property-RPC fault code.
    ///
    /// Dispatch faults keep their distinguishing codes so the caller can
    /// tell an authorization failure from a crashed method. Everything
    /// else collapses to `InternalError`.
    pub fn to_fault_code(&self) -> String {
        match self {
            HandoffError::NoObjectPath => "NoObjectPath".to_string(),
            HandoffError::UnknownObject { .. } => "UnknownObject".to_string(),
            HandoffError::NoSuchMethod { .. } => "NoSuchMethod".to_string(),
            HandoffError::RemoteFault { code, .. } => code.clone(),
            _ => "InternalError".to_string(),
        }
    }

    /// Reconstruct an error from a received fault code and message.
    ///
    /// The well-known dispatch codes map back to their variants; anything
    /// else stays a `RemoteFault` carrying the peer's code verbatim.
    pub fn from_fault(code: &str, message: &str) -> Self {
        match code {
            "NoObjectPath" => HandoffError::NoObjectPath,
            "UnknownObject" => HandoffError::UnknownObject {
                path: message.to_string(),
            },
            "NoSuchMethod" => HandoffError::NoSuchMethod {
                method: message.to_string(),
            },
            _ => HandoffError::RemoteFault {
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }

    /// True if the transport itself is dead and no further calls can be made.
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            HandoffError::LostConnection | HandoffError::WindowGone { .. }
        )
    }
}
