//! Slave side of the pipe RPC transport.
//!
//! The slave owns a single exported object and answers calls one reply
//! per request. Nothing a method does may kill the serve loop: unknown
//! methods and raised errors are packaged as the reply payload. Only
//! transport loss ends `serve` — in the privileged worker that is fatal
//! and the process exits.

use super::wire::{RemoteError, Reply, ReplyPayload, Request};
use crate::framing::{read_frame, write_frame, FrameDecoder};
use crate::Result;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

/// The exported object on the slave side.
///
/// `dispatch` plays the method lookup: return `Err` with a descriptive
/// kind for unknown methods so the master sees the name that failed.
#[async_trait::async_trait]
pub trait SlaveDispatch: Send + Sync + 'static {
    async fn dispatch(
        &self,
        method: &str,
        args: &[Value],
    ) -> std::result::Result<Value, RemoteError>;
}

/// The slave end of a pipe RPC connection.
pub struct PipeSlave;

impl PipeSlave {
    /// Serve calls until the peer closes the pipe.
    ///
    /// Returns `Ok(())` on clean EOF, `Err` if the transport itself
    /// breaks. Dispatch failures never propagate here.
    pub async fn serve<R, W, D>(mut reader: R, mut writer: W, root: Arc<D>) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
        D: SlaveDispatch,
    {
        let mut decoder = FrameDecoder::new();
        loop {
            let frame = match read_frame(&mut reader, &mut decoder).await? {
                Some(frame) => frame,
                None => {
                    debug!("Master closed the pipe, slave loop ending");
                    return Ok(());
                }
            };

            let request: Request = match serde_json::from_slice(&frame) {
                Ok(request) => request,
                Err(e) => {
                    // No serial to answer under; skip the frame.
                    warn!("Undecodable request frame: {}", e);
                    continue;
                }
            };

            let serial = request.serial();
            debug!("Dispatching {} (serial {})", request.method(), serial);
            let payload = match root.dispatch(request.method(), request.args()).await {
                Ok(value) => ReplyPayload::Ok(value),
                Err(remote) => ReplyPayload::Err(remote),
            };

            let reply = Reply(serial, payload);
            let bytes = match serde_json::to_vec(&reply) {
                Ok(bytes) => bytes,
                Err(e) => {
                    // Surface the serialization failure to the caller in
                    // place of the result; the transport survives.
                    let fallback = Reply(
                        serial,
                        ReplyPayload::Err(RemoteError::new("SerializationError", e.to_string())),
                    );
                    serde_json::to_vec(&fallback)?
                }
            };
            write_frame(&mut writer, &bytes).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing;
    use serde_json::json;
    use tokio::io::AsyncWriteExt;

    struct MathDispatch;

    #[async_trait::async_trait]
    impl SlaveDispatch for MathDispatch {
        async fn dispatch(
            &self,
            method: &str,
            args: &[Value],
        ) -> std::result::Result<Value, RemoteError> {
            match method {
                "add" => {
                    let a = args.first().and_then(Value::as_i64).unwrap_or(0);
                    let b = args.get(1).and_then(Value::as_i64).unwrap_or(0);
                    Ok(json!(a + b))
                }
                "boom" => Err(RemoteError::new("RuntimeError", "kaboom")),
                _ => Err(RemoteError::new(
                    "NoSuchMethod",
                    format!("no method {}", method),
                )),
            }
        }
    }

    async fn one_shot(request: &Request) -> Reply {
        let (mut near, far) = tokio::io::duplex(4096);
        let (far_read, far_write) = tokio::io::split(far);
        let server = tokio::spawn(async move {
            PipeSlave::serve(far_read, far_write, Arc::new(MathDispatch)).await
        });

        let payload = serde_json::to_vec(request).unwrap();
        near.write_all(&framing::encode_frame(&payload))
            .await
            .unwrap();

        let mut decoder = FrameDecoder::new();
        let frame = read_frame(&mut near, &mut decoder).await.unwrap().unwrap();
        drop(near);
        server.await.unwrap().unwrap();
        serde_json::from_slice(&frame).unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_returns_value_under_same_serial() {
        let reply = one_shot(&Request(9, "add".into(), vec![json!(2), json!(3)])).await;
        assert_eq!(reply, Reply(9, ReplyPayload::Ok(json!(5))));
    }

    #[tokio::test]
    async fn test_raised_error_is_packaged_not_fatal() {
        let reply = one_shot(&Request(1, "boom".into(), vec![])).await;
        match reply.1 {
            ReplyPayload::Err(remote) => {
                assert_eq!(remote.kind, "RuntimeError");
                assert_eq!(remote.message, "kaboom");
            }
            other => panic!("Expected Err payload, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_method_is_packaged() {
        let reply = one_shot(&Request(2, "nope".into(), vec![])).await;
        assert!(matches!(reply.1, ReplyPayload::Err(ref e) if e.kind == "NoSuchMethod"));
    }

    #[tokio::test]
    async fn test_clean_eof_ends_serve() {
        let (near, far) = tokio::io::duplex(64);
        let (far_read, far_write) = tokio::io::split(far);
        drop(near);
        let result = PipeSlave::serve(far_read, far_write, Arc::new(MathDispatch)).await;
        assert!(result.is_ok());
    }
}
