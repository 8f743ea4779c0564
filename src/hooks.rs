//! Session observer hooks.
//!
//! The session reports lifecycle and dispatch events through a
//! [`SessionObserver`]. Every method has a no-op default, so an observer
//! only implements what it cares about. [`Hooks`] is a closure-based
//! observer for the common case.
//!
//! All methods run on the session task. They must not block on the
//! [`Connection`](crate::Connection) that owns the session; spawn a task
//! instead.

use crate::frame::{Frame, ServerError};
use crate::protocol::ProtocolError;

/// Receives session events.
pub trait SessionObserver: Send + 'static {
    /// CONNECT and all re-subscriptions were written.
    fn on_connect(&mut self) {}

    /// The transport closed. `graceful` is true when the close followed
    /// [`Connection::disconnect`](crate::Connection::disconnect).
    fn on_disconnect(&mut self, graceful: bool) {
        let _ = graceful;
    }

    /// The broker sent an ERROR frame.
    fn on_error(&mut self, error: ServerError) {
        let _ = error;
    }

    /// A frame with a command the session does not handle.
    fn on_unhandled_frame(&mut self, frame: Frame) {
        let _ = frame;
    }

    /// A MESSAGE whose `subscription` header matches no subscription.
    fn on_dispatch_miss(&mut self, frame: Frame) {
        let _ = frame;
    }

    /// A heartbeat byte arrived from the broker.
    fn on_heartbeat(&mut self) {}

    /// Incoming bytes could not be decoded into a frame.
    fn on_decode_error(&mut self, error: ProtocolError) {
        let _ = error;
    }

    /// No reconnect attempts are left; the session stays disconnected.
    fn on_reconnect_exhausted(&mut self, attempts: u32) {
        let _ = attempts;
    }
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

type Hook<T> = Option<Box<dyn FnMut(T) + Send + 'static>>;

/// Closure-based observer.
///
/// ```ignore
/// let hooks = Hooks::new()
///     .on_error(|err| eprintln!("broker error: {}", err))
///     .on_disconnect(|graceful| println!("disconnected (graceful: {})", graceful));
/// ```
#[derive(Default)]
pub struct Hooks {
    connect: Hook<()>,
    disconnect: Hook<bool>,
    error: Hook<ServerError>,
    unhandled: Hook<Frame>,
    dispatch_miss: Hook<Frame>,
    heartbeat: Hook<()>,
    decode_error: Hook<ProtocolError>,
    exhausted: Hook<u32>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_connect(mut self, f: impl FnMut() + Send + 'static) -> Self {
        let mut f = f;
        self.connect = Some(Box::new(move |()| f()));
        self
    }

    pub fn on_disconnect(mut self, f: impl FnMut(bool) + Send + 'static) -> Self {
        self.disconnect = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(ServerError) + Send + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    pub fn on_unhandled_frame(mut self, f: impl FnMut(Frame) + Send + 'static) -> Self {
        self.unhandled = Some(Box::new(f));
        self
    }

    pub fn on_dispatch_miss(mut self, f: impl FnMut(Frame) + Send + 'static) -> Self {
        self.dispatch_miss = Some(Box::new(f));
        self
    }

    pub fn on_heartbeat(mut self, f: impl FnMut() + Send + 'static) -> Self {
        let mut f = f;
        self.heartbeat = Some(Box::new(move |()| f()));
        self
    }

    pub fn on_decode_error(mut self, f: impl FnMut(ProtocolError) + Send + 'static) -> Self {
        self.decode_error = Some(Box::new(f));
        self
    }

    pub fn on_reconnect_exhausted(mut self, f: impl FnMut(u32) + Send + 'static) -> Self {
        self.exhausted = Some(Box::new(f));
        self
    }
}

fn fire<T>(hook: &mut Hook<T>, value: T) {
    if let Some(f) = hook.as_mut() {
        f(value);
    }
}

impl SessionObserver for Hooks {
    fn on_connect(&mut self) {
        fire(&mut self.connect, ());
    }

    fn on_disconnect(&mut self, graceful: bool) {
        fire(&mut self.disconnect, graceful);
    }

    fn on_error(&mut self, error: ServerError) {
        fire(&mut self.error, error);
    }

    fn on_unhandled_frame(&mut self, frame: Frame) {
        fire(&mut self.unhandled, frame);
    }

    fn on_dispatch_miss(&mut self, frame: Frame) {
        fire(&mut self.dispatch_miss, frame);
    }

    fn on_heartbeat(&mut self) {
        fire(&mut self.heartbeat, ());
    }

    fn on_decode_error(&mut self, error: ProtocolError) {
        fire(&mut self.decode_error, error);
    }

    fn on_reconnect_exhausted(&mut self, attempts: u32) {
        fire(&mut self.exhausted, attempts);
    }
}
