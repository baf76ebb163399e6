//! Transports for handing documents and calls between desktop processes.
//!
//! Three independent pieces that share an error type and a property
//! vocabulary:
//!
//! - [`xds`] — the source side of XDND Direct Save: drag a document out
//!   of a save dialog and write it where it lands, atomically.
//! - [`xrpc`] — XML-RPC over window properties: brokerless RPC between
//!   applications sharing a display.
//! - [`piperpc`] — length-prefixed JSON frames over a pipe pair, for
//!   talking to a spawned helper process.
//!
//! [`framing`] carries the pipe transport's wire format, [`cancel`] a
//! small cancellation token for long saves, and [`config`] the protocol
//! constants.

pub mod cancel;
pub mod config;
pub mod error;
pub mod framing;
pub mod piperpc;
pub mod xds;
pub mod xrpc;

pub use cancel::CancellationToken;
pub use error::{HandoffError, Result, SaveAbortReason};
