//! Master side of the pipe RPC transport.
//!
//! The master issues serial-numbered calls over the outbound pipe and
//! correlates replies by serial — never by arrival order. Outstanding
//! calls each own a oneshot slot; when the transport dies, every slot
//! resolves to `LostConnection` and no new calls can be issued.
//!
//! # Thread Safety
//!
//! `PipeMaster` is cheaply cloneable; all clones share the pending map
//! and the writer queue.

use super::wire::{Reply, ReplyPayload, Request};
use crate::framing::{read_frame, FrameDecoder};
use crate::{framing, HandoffError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

type CallSlot = oneshot::Sender<Result<Value>>;

/// Pending calls, or a tombstone once the transport is lost.
enum PendingMap {
    Open(HashMap<u64, CallSlot>),
    Lost,
}

struct MasterShared {
    next_serial: AtomicU64,
    pending: Mutex<PendingMap>,
    out_tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
}

impl MasterShared {
    /// Resolve every outstanding call to `LostConnection` and refuse new ones.
    fn fail_all(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let PendingMap::Open(map) = std::mem::replace(&mut *pending, PendingMap::Lost) {
            for (serial, slot) in map {
                debug!("Resolving serial {} to LostConnection", serial);
                let _ = slot.send(Err(HandoffError::LostConnection));
            }
        }
    }
}

/// Handle to one outstanding call.
///
/// Await `wait()` for the result; a remote exception re-raises as
/// `RemoteFault`, transport death as `LostConnection`.
pub struct ResponseHandle {
    rx: oneshot::Receiver<Result<Value>>,
    serial: u64,
}

impl ResponseHandle {
    /// The serial this call was issued under.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Wait for the reply.
    pub async fn wait(self) -> Result<Value> {
        match self.rx.await {
            Ok(outcome) => outcome,
            // Sender dropped without resolving: transport torn down.
            Err(_) => Err(HandoffError::LostConnection),
        }
    }
}

/// The master end of a pipe RPC connection.
#[derive(Clone)]
pub struct PipeMaster {
    shared: Arc<MasterShared>,
}

impl PipeMaster {
    /// Wire up a master over an established read/write pair.
    ///
    /// Spawns the reader and writer tasks on the current runtime.
    pub fn connect<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (out_tx, out_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let shared = Arc::new(MasterShared {
            next_serial: AtomicU64::new(1),
            pending: Mutex::new(PendingMap::Open(HashMap::new())),
            out_tx: Mutex::new(Some(out_tx)),
        });

        tokio::spawn(Self::writer_task(writer, out_rx, shared.clone()));
        tokio::spawn(Self::reader_task(reader, shared.clone()));

        Self { shared }
    }

    /// Spawn a helper subprocess and connect to its stdio.
    ///
    /// The command's stdin/stdout are taken over by the transport; stderr
    /// is left alone so the helper's logging reaches the parent terminal.
    pub fn spawn_helper(
        mut command: tokio::process::Command,
    ) -> Result<(Self, tokio::process::Child)> {
        command.stdin(Stdio::piped()).stdout(Stdio::piped());
        let mut child = command.spawn()?;
        let stdin = child.stdin.take().ok_or_else(|| HandoffError::Validation {
            field: "stdin".to_string(),
            message: "helper stdin not captured".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| HandoffError::Validation {
            field: "stdout".to_string(),
            message: "helper stdout not captured".to_string(),
        })?;
        Ok((Self::connect(stdout, stdin), child))
    }

    /// Issue a call. Non-blocking: the frame is queued on the writer task
    /// and a handle for the eventual reply is returned.
    ///
    /// If the transport is already lost, the handle resolves immediately
    /// to `LostConnection`.
    pub fn invoke(&self, method: &str, args: Vec<Value>) -> ResponseHandle {
        let serial = self.shared.next_serial.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let handle = ResponseHandle { rx, serial };

        {
            let mut pending = self
                .shared
                .pending
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            match &mut *pending {
                PendingMap::Open(map) => {
                    map.insert(serial, tx);
                }
                PendingMap::Lost => {
                    let _ = tx.send(Err(HandoffError::LostConnection));
                    return handle;
                }
            }
        }

        let request = Request(serial, method.to_string(), args);
        let frame = match serde_json::to_vec(&request) {
            Ok(payload) => framing::encode_frame(&payload),
            Err(e) => {
                // Serialization failure is surfaced to this call only; the
                // transport survives.
                self.resolve(serial, Err(e.into()));
                return handle;
            }
        };

        let queued = {
            let out_tx = self.shared.out_tx.lock().unwrap_or_else(|e| e.into_inner());
            match out_tx.as_ref() {
                Some(tx) => tx.send(frame).is_ok(),
                None => false,
            }
        };
        if !queued {
            self.resolve(serial, Err(HandoffError::LostConnection));
        }

        handle
    }

    /// Tear down the transport. Idempotent.
    ///
    /// Closes the outbound pipe (the slave sees EOF) and resolves every
    /// outstanding call to `LostConnection`.
    pub fn finish(&self) {
        self.shared
            .out_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        self.shared.fail_all();
    }

    /// True once the transport is dead, whether by `finish` or peer loss.
    pub fn is_lost(&self) -> bool {
        matches!(
            &*self.shared.pending.lock().unwrap_or_else(|e| e.into_inner()),
            PendingMap::Lost
        )
    }

    fn resolve(&self, serial: u64, outcome: Result<Value>) {
        let slot = {
            let mut pending = self
                .shared
                .pending
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            match &mut *pending {
                PendingMap::Open(map) => map.remove(&serial),
                PendingMap::Lost => None,
            }
        };
        match slot {
            Some(tx) => {
                let _ = tx.send(outcome);
            }
            None => {
                // Spontaneous or late reply; nothing is waiting for it.
                warn!("Dropping reply for unknown serial {}", serial);
            }
        }
    }

    async fn writer_task<W: AsyncWrite + Unpin>(
        mut writer: W,
        mut out_rx: mpsc::UnboundedReceiver<Vec<u8>>,
        shared: Arc<MasterShared>,
    ) {
        // Data is written only while the queue holds frames; an idle
        // transport parks here without waking.
        while let Some(frame) = out_rx.recv().await {
            if let Err(e) = writer.write_all(&frame).await {
                debug!("Pipe write failed: {}", e);
                shared.fail_all();
                return;
            }
            if let Err(e) = writer.flush().await {
                debug!("Pipe flush failed: {}", e);
                shared.fail_all();
                return;
            }
        }
        // Queue closed by finish(): shut down the write half cleanly.
        let _ = writer.shutdown().await;
    }

    async fn reader_task<R: AsyncRead + Unpin>(mut reader: R, shared: Arc<MasterShared>) {
        let mut decoder = FrameDecoder::new();
        loop {
            let frame = match read_frame(&mut reader, &mut decoder).await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    debug!("Pipe closed by peer");
                    break;
                }
                Err(e) => {
                    warn!("Pipe read failed: {}", e);
                    break;
                }
            };
            let reply: Reply = match serde_json::from_slice(&frame) {
                Ok(reply) => reply,
                Err(e) => {
                    warn!("Undecodable reply frame: {}", e);
                    continue;
                }
            };
            let Reply(serial, payload) = reply;
            let outcome = match payload {
                ReplyPayload::Ok(value) => Ok(value),
                ReplyPayload::Err(remote) => Err(remote.into()),
            };
            Self::deliver(&shared, serial, outcome);
        }
        shared.fail_all();
    }

    fn deliver(shared: &MasterShared, serial: u64, outcome: Result<Value>) {
        let slot = {
            let mut pending = shared.pending.lock().unwrap_or_else(|e| e.into_inner());
            match &mut *pending {
                PendingMap::Open(map) => map.remove(&serial),
                PendingMap::Lost => None,
            }
        };
        match slot {
            Some(tx) => {
                let _ = tx.send(outcome);
            }
            None => warn!("Reply for serial {} has no pending call", serial),
        }
    }
}
