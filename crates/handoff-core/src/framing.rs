//! Shared frame codec for the pipe transports.
//!
//! A stream of messages is framed as `<decimal-length>:<payload-bytes>`
//! concatenated, e.g. `5:hello3:foo`. The decoder is incremental: feed it
//! arbitrary chunks, pull out complete frames, and partial frames stay
//! buffered. Payloads are opaque; the frame boundary alone is the contract.
//!
//! A malformed length field is fatal to the stream: the decoder poisons
//! itself and refuses all further input.

use crate::config::FrameConfig;
use crate::{HandoffError, Result};
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Encode one payload as a length-prefixed frame.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 12);
    out.extend_from_slice(payload.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(payload);
    out
}

/// Incremental decoder for length-prefixed frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
    poisoned: bool,
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes from the transport.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet consumed as frames.
    pub fn pending_bytes(&self) -> usize {
        self.buf.len()
    }

    /// Pull the next complete frame out of the buffer, if any.
    ///
    /// Returns `Ok(None)` when the buffer holds only a partial frame.
    /// A malformed length prefix returns an error; after that every call
    /// errors without consuming input.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        if self.poisoned {
            return Err(self.poison("frame stream previously failed"));
        }

        let scan_limit = self.buf.len().min(FrameConfig::MAX_LENGTH_DIGITS + 1);
        let colon = match self.buf[..scan_limit].iter().position(|&b| b == b':') {
            Some(pos) => pos,
            None => {
                if self.buf.len() > FrameConfig::MAX_LENGTH_DIGITS {
                    return Err(self.poison("length prefix too long or missing ':'"));
                }
                // Still reading the length field.
                return Ok(None);
            }
        };

        if colon == 0 {
            return Err(self.poison("empty length prefix"));
        }
        // At most MAX_LENGTH_DIGITS bytes; copying sidesteps holding the
        // buffer borrow across the poison path.
        let digits = self.buf[..colon].to_vec();
        if !digits.iter().all(u8::is_ascii_digit) {
            return Err(self.poison("non-digit byte in length prefix"));
        }
        // The digit check plus the digit cap keep this within usize range.
        let len: usize = String::from_utf8_lossy(&digits)
            .parse()
            .map_err(|_| self.poison("unparsable length prefix"))?;
        if len > FrameConfig::MAX_FRAME_SIZE {
            return Err(self.poison("frame exceeds maximum size"));
        }

        if self.buf.len() < colon + 1 + len {
            return Ok(None);
        }

        self.buf.advance(colon + 1);
        let payload = self.buf.split_to(len).to_vec();
        Ok(Some(payload))
    }

    fn poison(&mut self, message: &str) -> HandoffError {
        self.poisoned = true;
        HandoffError::Frame {
            message: message.to_string(),
        }
    }
}

/// Read the next frame from an async reader, buffering through `decoder`.
///
/// Returns `Ok(None)` on clean EOF at a frame boundary. EOF in the middle
/// of a frame is an error.
pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    decoder: &mut FrameDecoder,
) -> Result<Option<Vec<u8>>> {
    let mut chunk = [0u8; FrameConfig::READ_CHUNK_SIZE];
    loop {
        if let Some(frame) = decoder.next_frame()? {
            return Ok(Some(frame));
        }
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            if decoder.pending_bytes() == 0 {
                return Ok(None);
            }
            return Err(HandoffError::Frame {
                message: "connection closed mid-frame".to_string(),
            });
        }
        decoder.extend(&chunk[..n]);
    }
}

/// Write one payload as a frame to an async writer.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    writer.write_all(&encode_frame(payload)).await?;
    writer.flush().await?;
    Ok(())
}
