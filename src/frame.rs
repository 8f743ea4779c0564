use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;

use crate::protocol::build_frame;

/// Header mapping carried by a [`Frame`].
///
/// Keys are unique. A `BTreeMap` keeps them in ascending order, which is the
/// order headers are written on the wire.
pub type Headers = BTreeMap<String, String>;

/// A single STOMP frame.
///
/// `Frame` contains the command (e.g. "SEND", "MESSAGE"), the header mapping
/// and an optional text body. A frame received with nothing after the
/// header/body separator has `body == None`, never `Some("")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// STOMP command (e.g. CONNECT, SEND, SUBSCRIBE)
    pub command: String,
    /// Headers keyed by name
    pub headers: Headers,
    /// Body text, if any
    pub body: Option<String>,
}

impl Frame {
    /// Create a new frame with the given command, no headers and no body.
    ///
    /// Parameters
    /// - `command`: the STOMP command name (for example, `"SEND"` or
    ///   `"SUBSCRIBE"`). Accepts any type convertible into `String`.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            headers: Headers::new(),
            body: None,
        }
    }

    /// Add a header (builder style). A later call with the same key replaces
    /// the earlier value.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set the frame body (builder style).
    ///
    /// An empty string clears the body, so the frame is sent without one.
    pub fn set_body(mut self, body: impl Into<String>) -> Self {
        let body = body.into();
        self.body = if body.is_empty() { None } else { Some(body) };
        self
    }

    /// Get the value of a header by name (case-sensitive).
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// Body as a string slice, if present.
    pub fn body_str(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Command: {}", self.command)?;
        for (k, v) in &self.headers {
            writeln!(f, "{}: {}", k, v)?;
        }
        match &self.body {
            Some(body) => writeln!(f, "Body ({} bytes)", body.len()),
            None => writeln!(f, "Body (none)"),
        }
    }
}

/// A frame headed for the broker.
///
/// Received frames carry text bodies; an outgoing body is raw bytes so a
/// publisher can send any payload. Every [`Frame`] converts into one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingFrame {
    pub command: String,
    pub headers: Headers,
    pub body: Option<Bytes>,
}

impl OutgoingFrame {
    /// Wire bytes for this frame.
    pub fn encode(&self) -> Bytes {
        build_frame(&self.command, &self.headers, self.body.as_deref())
    }
}

impl From<Frame> for OutgoingFrame {
    fn from(frame: Frame) -> Self {
        Self {
            command: frame.command,
            headers: frame.headers,
            body: frame.body.map(Bytes::from),
        }
    }
}

/// An error reported by the broker through an `ERROR` frame.
///
/// The `message` header becomes [`ServerError::message`] and the frame body
/// becomes [`ServerError::detail`]. The original frame is kept for callers
/// that need other headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    /// Value of the `message` header, if the broker sent one
    pub message: Option<String>,
    /// Frame body, if the broker sent one
    pub detail: Option<String>,
    /// `receipt-id` header when the error answers a receipt request
    pub receipt_id: Option<String>,
    /// The ERROR frame as received
    pub frame: Frame,
}

impl ServerError {
    /// Build a `ServerError` from a received ERROR frame.
    pub fn from_frame(frame: Frame) -> Self {
        let message = frame.get_header("message").map(str::to_string);
        let receipt_id = frame.get_header("receipt-id").map(str::to_string);
        Self {
            message,
            detail: frame.body.clone(),
            receipt_id,
            frame,
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("server error")?;
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        if let Some(detail) = &self.detail {
            write!(f, " ({})", detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for ServerError {}

/// A received frame classified by command.
///
/// Classification happens once, when the frame comes off the wire; the
/// session matches on the variant instead of comparing command strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceivedFrame {
    /// `CONNECTED`: handshake answer, carries the broker's `heart-beat`
    Connected(Frame),
    /// `MESSAGE`: a delivery for one of our subscriptions
    Message(Frame),
    /// `ERROR`: broker-reported failure
    Error(ServerError),
    /// Any other command
    Unhandled(Frame),
}

impl ReceivedFrame {
    /// Returns the underlying frame regardless of variant.
    pub fn frame(&self) -> &Frame {
        match self {
            ReceivedFrame::Connected(f)
            | ReceivedFrame::Message(f)
            | ReceivedFrame::Unhandled(f) => f,
            ReceivedFrame::Error(err) => &err.frame,
        }
    }

    /// Returns `true` for the `Error` variant.
    pub fn is_error(&self) -> bool {
        matches!(self, ReceivedFrame::Error(_))
    }
}

impl From<Frame> for ReceivedFrame {
    fn from(frame: Frame) -> Self {
        match frame.command.as_str() {
            "CONNECTED" => ReceivedFrame::Connected(frame),
            "MESSAGE" => ReceivedFrame::Message(frame),
            "ERROR" => ReceivedFrame::Error(ServerError::from_frame(frame)),
            _ => ReceivedFrame::Unhandled(frame),
        }
    }
}
