//! Pipe-RPC payload types.
//!
//! Each frame carries one JSON tuple. Requests are
//! `[serial, method, args]`; replies are `[serial, payload]` where the
//! payload is the externally tagged `{"Ok": value}` or
//! `{"Err": {"kind": ..., "message": ...}}`. One reply per call; the
//! protocol is serial-keyed, not FIFO.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A method call from master to slave. Serialized as a 3-tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request(pub u64, pub String, pub Vec<Value>);

impl Request {
    pub fn serial(&self) -> u64 {
        self.0
    }

    pub fn method(&self) -> &str {
        &self.1
    }

    pub fn args(&self) -> &[Value] {
        &self.2
    }
}

/// A reply from slave to master. Serialized as a 2-tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply(pub u64, pub ReplyPayload);

/// The payload half of a reply: the return value, or the exception that
/// the remote method raised, shipped back in its place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplyPayload {
    Ok(Value),
    Err(RemoteError),
}

/// An error raised by the remote method, carried across the pipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteError {
    /// Error class name, e.g. `IoError`.
    pub kind: String,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RemoteError {}

impl From<RemoteError> for crate::HandoffError {
    fn from(err: RemoteError) -> Self {
        crate::HandoffError::RemoteFault {
            code: err.kind,
            message: err.message,
        }
    }
}
