//! Pipe RPC: serial-keyed duplex method calls to a worker subprocess.
//!
//! The master runs inside the application's async runtime; the slave runs
//! a plain read-dispatch-reply loop with no display connection, typically
//! under a different user identity. Frames travel over a pipe pair using
//! the codec in [`crate::framing`]; payloads are the JSON tuples defined
//! in [`wire`].

pub mod master;
pub mod slave;
pub mod wire;

pub use master::{PipeMaster, ResponseHandle};
pub use slave::{PipeSlave, SlaveDispatch};
pub use wire::{RemoteError, Reply, ReplyPayload, Request};
