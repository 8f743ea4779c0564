use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{Frame, OutgoingFrame};
use crate::protocol::{HEARTBEAT, ProtocolError, StompProtocol, encode_frame};

/// Items produced or consumed by the codec.
///
/// A `StompItem` is either a decoded `Frame` or a `Heartbeat` marker
/// representing a single LF received on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StompItem {
    /// A decoded STOMP frame (command + headers + body)
    Frame(Frame),
    /// A single heartbeat pulse (LF)
    Heartbeat,
}

/// `StompCodec` implements `tokio_util::codec::{Decoder, Encoder}` for the
/// STOMP wire protocol on top of [`StompProtocol`].
///
/// Responsibilities:
/// - Decode incoming bytes into `StompItem::Frame` or `StompItem::Heartbeat`.
///   Partial frames are buffered inside the engine, not in the source
///   buffer, so arbitrary chunk boundaries are fine.
/// - Encode `StompItem` back into bytes for the wire format.
#[derive(Debug, Default)]
pub struct StompCodec {
    protocol: StompProtocol,
}

impl StompCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard any partial frame and queued items.
    pub fn reset(&mut self) {
        self.protocol.reset();
    }

    /// Access the underlying engine.
    pub fn protocol(&self) -> &StompProtocol {
        &self.protocol
    }
}

impl Decoder for StompCodec {
    type Item = StompItem;
    type Error = ProtocolError;

    /// Decode bytes from `src` into a `StompItem`.
    ///
    /// Every byte in `src` is handed to the engine, leaving `src` empty.
    /// Returns the oldest completed item, or `Ok(None)` when none is ready.
    /// A decode error is returned once; items decoded from the same chunk
    /// remain available to the following calls.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if !src.is_empty() {
            let chunk = src.split();
            self.protocol.feed(&chunk)?;
        }
        Ok(self.protocol.next_item())
    }
}

impl Encoder<StompItem> for StompCodec {
    type Error = ProtocolError;

    /// Encode a `StompItem` into the provided destination buffer.
    fn encode(&mut self, item: StompItem, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            StompItem::Heartbeat => dst.put_u8(HEARTBEAT),
            StompItem::Frame(frame) => dst.extend_from_slice(&encode_frame(&frame)),
        }
        Ok(())
    }
}

impl Encoder<OutgoingFrame> for StompCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: OutgoingFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&frame.encode());
        Ok(())
    }
}

/// Decoder used by the session's `FramedRead`.
///
/// `FramedRead` stops yielding after its decoder returns `Err`, but a bad
/// frame must not end the connection. Decode errors are therefore carried
/// as items; only I/O errors surface as the stream's error.
#[derive(Debug, Default)]
pub(crate) struct SessionCodec {
    inner: StompCodec,
}

impl Decoder for SessionCodec {
    type Item = Result<StompItem, ProtocolError>;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.inner.decode(src) {
            Ok(item) => Ok(item.map(Ok)),
            Err(ProtocolError::Io(e)) => Err(ProtocolError::Io(e)),
            Err(e) => Ok(Some(Err(e))),
        }
    }
}
