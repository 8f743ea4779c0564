// Incremental STOMP 1.1 frame engine: encoding plus a streaming decoder that
// tolerates arbitrary chunk boundaries.
use bytes::{BufMut, Bytes, BytesMut};
use std::collections::VecDeque;
use std::io;
use thiserror::Error;

use crate::codec::StompItem;
use crate::frame::{Frame, Headers};

/// Heartbeat sentinel: a bare LF outside any frame.
pub const HEARTBEAT: u8 = b'\n';
/// Frame terminator.
pub const EOF: u8 = 0;

/// Errors produced while decoding a frame payload.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Frame payload is not valid UTF-8
    #[error("invalid utf8 in frame: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    /// Header line without a `:` separator
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),
    /// A terminator arrived with no frame bytes in front of it
    #[error("empty frame")]
    EmptyFrame,
    /// I/O error surfaced through the codec
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Build the wire bytes for one frame.
///
/// Produces `COMMAND\n`, one `key:value\n` line per header in ascending key
/// order, a blank line, the body bytes and a single NUL. Header values are
/// written verbatim: a value containing `:` or `\n` corrupts the header line.
pub fn build_frame(command: &str, headers: &Headers, body: Option<&[u8]>) -> Bytes {
    let body = body.unwrap_or_default();
    let mut dst = BytesMut::with_capacity(command.len() + body.len() + 64);
    dst.extend_from_slice(command.as_bytes());
    dst.put_u8(b'\n');
    for (k, v) in headers {
        dst.extend_from_slice(k.as_bytes());
        dst.put_u8(b':');
        dst.extend_from_slice(v.as_bytes());
        dst.put_u8(b'\n');
    }
    dst.put_u8(b'\n');
    dst.extend_from_slice(body);
    dst.put_u8(EOF);
    dst.freeze()
}

/// Encode a [`Frame`] with [`build_frame`].
pub fn encode_frame(frame: &Frame) -> Bytes {
    build_frame(
        &frame.command,
        &frame.headers,
        frame.body.as_deref().map(str::as_bytes),
    )
}

/// Streaming decoder state.
///
/// Bytes are pushed in with [`feed`](StompProtocol::feed). Bytes belonging to
/// a frame whose terminator has not arrived yet are kept as pending
/// fragments; completed frames and heartbeats are queued in arrival order
/// and drained with [`next_item`](StompProtocol::next_item) or
/// [`pop_items`](StompProtocol::pop_items).
#[derive(Debug, Default)]
pub struct StompProtocol {
    pending: Vec<Bytes>,
    ready: VecDeque<StompItem>,
}

impl StompProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop pending fragments and queued items.
    ///
    /// Called at the start of every connection attempt so a partial frame
    /// left over from a previous session cannot corrupt the next one.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.ready.clear();
    }

    /// Consume one chunk of bytes from the transport.
    ///
    /// The whole chunk is always consumed. A payload that cannot be decoded
    /// is dropped and the first such error is returned once the rest of the
    /// chunk has been processed, so well-formed frames in the same chunk are
    /// still queued.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), ProtocolError> {
        let mut first_err: Option<ProtocolError> = None;
        let mut pos = 0usize;

        while pos < chunk.len() {
            let rest = &chunk[pos..];

            // A LF between frames is a heartbeat, one notification per byte.
            if self.pending.is_empty() && rest[0] == HEARTBEAT {
                self.recv_heartbeat();
                pos += 1;
                continue;
            }

            match rest.iter().position(|&b| b == EOF) {
                Some(nul) => {
                    if nul > 0 {
                        self.pending.push(Bytes::copy_from_slice(&rest[..nul]));
                    }
                    pos += nul + 1;
                    if let Err(e) = self.complete_frame() {
                        first_err.get_or_insert(e);
                    }
                }
                None => {
                    self.pending.push(Bytes::copy_from_slice(rest));
                    pos = chunk.len();
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Pop the oldest queued item.
    pub fn next_item(&mut self) -> Option<StompItem> {
        self.ready.pop_front()
    }

    /// Drain every queued item in arrival order.
    pub fn pop_items(&mut self) -> Vec<StompItem> {
        self.ready.drain(..).collect()
    }

    /// Drain queued items keeping only frames.
    pub fn pop_frames(&mut self) -> Vec<Frame> {
        self.ready
            .drain(..)
            .filter_map(|item| match item {
                StompItem::Frame(f) => Some(f),
                StompItem::Heartbeat => None,
            })
            .collect()
    }

    /// Number of pending fragments awaiting a terminator.
    pub fn pending_fragments(&self) -> usize {
        self.pending.len()
    }

    /// Number of queued items.
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    fn recv_heartbeat(&mut self) {
        tracing::trace!("heartbeat received");
        self.ready.push_back(StompItem::Heartbeat);
    }

    fn complete_frame(&mut self) -> Result<(), ProtocolError> {
        let payload = match self.pending.len() {
            0 => return Err(ProtocolError::EmptyFrame),
            1 => self.pending.pop().unwrap_or_default(),
            _ => {
                let total = self.pending.iter().map(Bytes::len).sum();
                let mut joined = BytesMut::with_capacity(total);
                for part in self.pending.drain(..) {
                    joined.extend_from_slice(&part);
                }
                joined.freeze()
            }
        };
        self.pending.clear();

        let text = std::str::from_utf8(&payload).map_err(|e| {
            tracing::error!(bytes = payload.len(), "frame payload is not valid utf-8");
            ProtocolError::from(e)
        })?;
        let frame = parse_frame_text(text)?;
        self.ready.push_back(StompItem::Frame(frame));
        Ok(())
    }
}

/// Parse the text of one frame (everything before its NUL).
///
/// The command ends at the first LF. Headers end at the first blank line;
/// everything after it, blank lines included, is body. Nothing after the
/// separator means no body.
pub fn parse_frame_text(text: &str) -> Result<Frame, ProtocolError> {
    let (command, rest) = text.split_once('\n').unwrap_or((text, ""));

    let (raw_headers, body_text) = if let Some(body) = rest.strip_prefix('\n') {
        ("", body)
    } else {
        rest.split_once("\n\n").unwrap_or((rest, ""))
    };

    let mut headers = Headers::new();
    for line in raw_headers.split('\n').filter(|l| !l.is_empty()) {
        let (k, v) = line
            .split_once(':')
            .ok_or_else(|| ProtocolError::MalformedHeader(line.to_string()))?;
        headers.insert(k.to_string(), v.to_string());
    }

    Ok(Frame {
        command: command.to_string(),
        headers,
        body: if body_text.is_empty() {
            None
        } else {
            Some(body_text.to_string())
        },
    })
}
