use bytes::Bytes;
use futures::{SinkExt, Stream, StreamExt, future};
use std::io;
use std::pin::Pin;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Sleep, sleep};
use tokio_util::codec::{Encoder, FramedRead, FramedWrite};
use tracing::{debug, error, info, trace, warn};

use crate::codec::{SessionCodec, StompCodec, StompItem};
use crate::config::ClientConfig;
use crate::frame::{Frame, Headers, OutgoingFrame, ReceivedFrame};
use crate::heartbeat::parse_heartbeat_header;
use crate::hooks::{NoopObserver, SessionObserver};
use crate::protocol::ProtocolError;
use crate::retry::{ReconnectPolicy, RetryError};
use crate::subscription::{AckMode, MessageHandler, SubscriptionRegistry};
use crate::transport::{Connector, TcpConnector};

/// Protocol version sent in every CONNECT `accept-version` header.
pub const STOMP_VERSION: &str = "1.1";

/// Errors returned by `Connection` operations.
#[derive(Error, Debug)]
pub enum ConnError {
    /// I/O-level error
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// Frame could not be encoded or decoded
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    /// The operation needs an open transport
    #[error("not connected")]
    NotConnected,
    /// A frame passed to ack/nack lacks a required header
    #[error("frame has no '{0}' header")]
    MissingHeader(&'static str),
    /// The session task is no longer running
    #[error("session closed")]
    Closed,
}

/// Where the session is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Snapshot of the session's connection state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub phase: SessionPhase,
    pub connected: bool,
    /// Set by `disconnect`; a close seen while set is a clean shutdown.
    pub disconnecting: bool,
    /// Reconnect attempts since the last successful connect.
    pub reconnect_attempts: u32,
    /// Outgoing heartbeat interval negotiated from CONNECTED.
    pub heartbeat_interval: Option<Duration>,
    /// When the transport last closed.
    pub disconnected_at: Option<SystemTime>,
    /// A reconnect attempt is waiting on its timer.
    pub reconnect_pending: bool,
}

enum Command {
    Connect {
        done: oneshot::Sender<()>,
    },
    Subscribe {
        destination: String,
        ack: AckMode,
        headers: Headers,
        handler: MessageHandler,
        done: oneshot::Sender<u64>,
    },
    Write {
        frame: OutgoingFrame,
        done: oneshot::Sender<Result<(), ConnError>>,
    },
    Disconnect {
        done: oneshot::Sender<()>,
    },
    State {
        done: oneshot::Sender<ConnectionState>,
    },
}

/// Handle to a STOMP session.
///
/// Creating a `Connection` spawns the session task, which owns the
/// transport, the subscription registry and the frame engine. Handles are
/// cheap to clone and every clone talks to the same session. The task stops
/// when the last handle is dropped.
///
/// Constructors must be called from inside a tokio runtime.
#[derive(Clone)]
pub struct Connection {
    commands: mpsc::UnboundedSender<Command>,
}

impl Connection {
    /// Session over TCP with no observer.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_connector(config, TcpConnector, NoopObserver)
    }

    /// Session over TCP reporting events to `observer`.
    pub fn with_observer(config: ClientConfig, observer: impl SessionObserver) -> Self {
        Self::with_connector(config, TcpConnector, observer)
    }

    /// Session over a custom transport.
    pub fn with_connector<C: Connector>(
        config: ClientConfig,
        connector: C,
        observer: impl SessionObserver,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session::new(config, connector, Box::new(observer), rx);
        tokio::spawn(session.run());
        Self { commands: tx }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ConnError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .map_err(|_| ConnError::Closed)?;
        rx.await.map_err(|_| ConnError::Closed)
    }

    /// Run one connection attempt.
    ///
    /// Resolves once the attempt is over: either CONNECT and all
    /// subscriptions were written, or the transport failed and a reconnect
    /// was scheduled (or the attempt budget ran out). Transport failures are
    /// not returned; observe them through [`SessionObserver`]. Does nothing
    /// when already connected.
    pub async fn connect(&self) -> Result<(), ConnError> {
        self.request(|done| Command::Connect { done }).await
    }

    /// Register a subscription and return its id.
    ///
    /// When connected, the SUBSCRIBE frame is written before this resolves.
    /// Otherwise it is sent on the next successful connect. Every connect
    /// re-sends all subscriptions.
    ///
    /// `handler` runs on the session task for each MESSAGE addressed to the
    /// subscription, with the frame and its body.
    pub async fn subscribe(
        &self,
        destination: &str,
        ack: AckMode,
        extra_headers: Headers,
        handler: impl FnMut(&Frame, Option<&str>) + Send + 'static,
    ) -> Result<u64, ConnError> {
        let destination = destination.to_string();
        let handler: MessageHandler = Box::new(handler);
        self.request(|done| Command::Subscribe {
            destination,
            ack,
            headers: extra_headers,
            handler,
            done,
        })
        .await
    }

    /// Send a message with a `content-length` header.
    pub async fn send(
        &self,
        destination: &str,
        body: impl AsRef<[u8]>,
        headers: Headers,
    ) -> Result<(), ConnError> {
        self.send_with_options(destination, body, headers, true)
            .await
    }

    /// Send a message.
    ///
    /// `body` is written as given, text or binary. An empty `body` sends no
    /// body. With `send_content_length` false the `content-length` header is
    /// left out; some JMS brokers treat a message carrying it as a bytes
    /// message rather than a text message.
    pub async fn send_with_options(
        &self,
        destination: &str,
        body: impl AsRef<[u8]>,
        headers: Headers,
        send_content_length: bool,
    ) -> Result<(), ConnError> {
        let body = Bytes::copy_from_slice(body.as_ref());
        let frame = send_frame(destination, body, headers, send_content_length);
        self.send_frame(frame).await
    }

    /// Acknowledge a MESSAGE frame.
    pub async fn ack(&self, frame: &Frame) -> Result<(), ConnError> {
        self.send_frame(ack_frame("ACK", frame)?).await
    }

    /// Negative-acknowledge a MESSAGE frame.
    pub async fn nack(&self, frame: &Frame) -> Result<(), ConnError> {
        self.send_frame(ack_frame("NACK", frame)?).await
    }

    /// Write an arbitrary frame. Fails with `NotConnected` when the
    /// transport is down.
    pub async fn send_frame(&self, frame: impl Into<OutgoingFrame>) -> Result<(), ConnError> {
        let frame = frame.into();
        self.request(|done| Command::Write { frame, done }).await?
    }

    /// Close the session cleanly.
    ///
    /// Writes DISCONNECT, closes the transport and cancels any pending
    /// reconnect. The close is reported as graceful and no reconnect
    /// follows. [`connect`](Connection::connect) may be called again later.
    pub async fn disconnect(&self) -> Result<(), ConnError> {
        self.request(|done| Command::Disconnect { done }).await
    }

    /// Current connection state.
    pub async fn state(&self) -> Result<ConnectionState, ConnError> {
        self.request(|done| Command::State { done }).await
    }
}

/// Build a SEND frame. `headers` is consumed so nothing leaks between calls.
pub(crate) fn send_frame(
    destination: &str,
    body: Bytes,
    mut headers: Headers,
    send_content_length: bool,
) -> OutgoingFrame {
    headers.insert("destination".to_string(), destination.to_string());
    if !body.is_empty() && send_content_length {
        headers.insert("content-length".to_string(), body.len().to_string());
    }
    OutgoingFrame {
        command: "SEND".to_string(),
        headers,
        body: if body.is_empty() { None } else { Some(body) },
    }
}

/// Build an ACK or NACK frame answering `message`.
pub(crate) fn ack_frame(command: &str, message: &Frame) -> Result<Frame, ConnError> {
    let subscription = message
        .get_header("subscription")
        .ok_or(ConnError::MissingHeader("subscription"))?;
    let message_id = message
        .get_header("message-id")
        .ok_or(ConnError::MissingHeader("message-id"))?;
    Ok(Frame::new(command)
        .header("subscription", subscription)
        .header("message-id", message_id))
}

type Reader<S> = FramedRead<ReadHalf<S>, SessionCodec>;
type Writer<S> = FramedWrite<WriteHalf<S>, StompCodec>;

enum Event {
    Command(Command),
    /// `None` once the transport reaches EOF.
    Read(Option<Result<Result<StompItem, ProtocolError>, ProtocolError>>),
    HeartbeatDue,
    ReconnectDue,
    Shutdown,
}

/// The session actor. All connection state lives here and is only touched
/// from [`Session::run`].
struct Session<C: Connector> {
    config: ClientConfig,
    connector: C,
    observer: Box<dyn SessionObserver>,
    commands: mpsc::UnboundedReceiver<Command>,
    registry: SubscriptionRegistry,
    retry: ReconnectPolicy,
    state: ConnectionState,
    reader: Option<Reader<C::Stream>>,
    writer: Option<Writer<C::Stream>>,
    heartbeat_timer: Option<Pin<Box<Sleep>>>,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
}

async fn next_item<S: Stream + Unpin>(reader: &mut Option<S>) -> Option<S::Item> {
    match reader {
        Some(r) => r.next().await,
        None => future::pending().await,
    }
}

fn write_error(e: ProtocolError) -> ConnError {
    match e {
        ProtocolError::Io(e) => ConnError::Io(e),
        other => ConnError::Protocol(other),
    }
}

async fn wait(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(t) => t.as_mut().await,
        None => future::pending().await,
    }
}

impl<C: Connector> Session<C> {
    fn new(
        config: ClientConfig,
        connector: C,
        observer: Box<dyn SessionObserver>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        let retry = config.reconnect_policy();
        Self {
            config,
            connector,
            observer,
            commands,
            registry: SubscriptionRegistry::new(),
            retry,
            state: ConnectionState::default(),
            reader: None,
            writer: None,
            heartbeat_timer: None,
            reconnect_timer: None,
        }
    }

    async fn run(mut self) {
        loop {
            let event = tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => Event::Command(cmd),
                    None => Event::Shutdown,
                },
                item = next_item(&mut self.reader) => Event::Read(item),
                () = wait(&mut self.heartbeat_timer) => Event::HeartbeatDue,
                () = wait(&mut self.reconnect_timer) => Event::ReconnectDue,
            };

            match event {
                Event::Command(cmd) => self.handle_command(cmd).await,
                Event::Read(Some(Ok(Ok(item)))) => self.route(item).await,
                Event::Read(Some(Ok(Err(e)))) => {
                    error!(error = %e, "failed to decode frame");
                    self.observer.on_decode_error(e);
                }
                Event::Read(Some(Err(e))) => {
                    warn!(error = %e, "transport read failed");
                    self.on_transport_closed();
                }
                Event::Read(None) => self.on_transport_closed(),
                Event::HeartbeatDue => self.do_heartbeat().await,
                Event::ReconnectDue => {
                    self.reconnect_timer = None;
                    self.attempt_connect().await;
                }
                Event::Shutdown => break,
            }
        }
        debug!("all connection handles dropped, session stopped");
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect { done } => {
                if self.state.connected {
                    debug!("connect requested while connected");
                } else {
                    self.reconnect_timer = None;
                    self.attempt_connect().await;
                }
                let _ = done.send(());
            }
            Command::Subscribe {
                destination,
                ack,
                headers,
                handler,
                done,
            } => {
                let id = self
                    .registry
                    .register(destination, ack, headers, handler);
                if self.state.connected {
                    let frame = self
                        .registry
                        .get(&id.to_string())
                        .map(|sub| sub.subscribe_frame());
                    if let Some(frame) = frame {
                        if let Err(e) = self.write(OutgoingFrame::from(frame)).await {
                            warn!(id, error = %e, "SUBSCRIBE write failed");
                        }
                    }
                }
                let _ = done.send(id);
            }
            Command::Write { frame, done } => {
                let res = self.write(frame).await;
                let _ = done.send(res);
            }
            Command::Disconnect { done } => {
                self.disconnect().await;
                let _ = done.send(());
            }
            Command::State { done } => {
                let mut snapshot = self.state.clone();
                snapshot.reconnect_pending = self.reconnect_timer.is_some();
                let _ = done.send(snapshot);
            }
        }
    }

    async fn attempt_connect(&mut self) {
        self.state.phase = SessionPhase::Connecting;
        let result = self
            .connector
            .connect(&self.config.host, self.config.port)
            .await;
        match result {
            Ok(stream) => {
                info!(
                    host = %self.config.host,
                    port = self.config.port,
                    "stomp connection established"
                );
                self.establish(stream).await;
            }
            Err(e) => {
                error!(attempt = self.retry.attempts(), error = %e, "connect error");
                self.state.phase = SessionPhase::Disconnected;
                self.schedule_reconnect();
            }
        }
    }

    async fn establish(&mut self, stream: C::Stream) {
        // Fresh codecs per connection: nothing partial survives a reconnect.
        let (reader, writer) = tokio::io::split(stream);
        self.reader = Some(FramedRead::new(reader, SessionCodec::default()));
        self.writer = Some(FramedWrite::new(writer, StompCodec::new()));

        self.state.connected = true;
        self.state.disconnecting = false;
        self.state.phase = SessionPhase::Connected;
        self.retry.reset();
        self.state.reconnect_attempts = 0;

        let mut frames = vec![self.connect_frame()];
        frames.extend(self.registry.subscribe_frames());
        for frame in frames {
            if let Err(e) = self.write(OutgoingFrame::from(frame)).await {
                warn!(error = %e, "handshake write failed");
                self.on_transport_closed();
                return;
            }
        }

        self.observer.on_connect();
    }

    fn connect_frame(&self) -> Frame {
        let mut frame = Frame::new("CONNECT");
        frame.headers = self.config.connect_headers.clone();
        frame
            .headers
            .insert("accept-version".to_string(), STOMP_VERSION.to_string());
        frame
    }

    async fn write<I>(&mut self, item: I) -> Result<(), ConnError>
    where
        StompCodec: Encoder<I, Error = ProtocolError>,
    {
        let Some(writer) = self.writer.as_mut() else {
            return Err(ConnError::NotConnected);
        };
        writer.send(item).await.map_err(write_error)
    }

    async fn route(&mut self, item: StompItem) {
        let frame = match item {
            StompItem::Heartbeat => {
                self.observer.on_heartbeat();
                return;
            }
            StompItem::Frame(frame) => frame,
        };

        match ReceivedFrame::from(frame) {
            ReceivedFrame::Message(frame) => {
                if !self.registry.dispatch(&frame) {
                    error!(
                        subscription = frame.get_header("subscription").unwrap_or("<none>"),
                        "subscription not found"
                    );
                    self.observer.on_dispatch_miss(frame);
                }
            }
            ReceivedFrame::Connected(frame) => {
                debug!(
                    version = frame.get_header("version").unwrap_or("<none>"),
                    "received CONNECTED"
                );
                if let Some(header) = frame.get_header("heart-beat") {
                    let (_, sy) = parse_heartbeat_header(header);
                    if sy > 0 {
                        self.set_heartbeat(Duration::from_millis(sy)).await;
                    }
                }
            }
            ReceivedFrame::Error(err) => {
                error!(
                    message = err.message.as_deref().unwrap_or("<none>"),
                    "received error"
                );
                debug!(detail = err.detail.as_deref().unwrap_or(""), "error detail");
                self.observer.on_error(err);
            }
            ReceivedFrame::Unhandled(frame) => {
                warn!(command = %frame.command, "received unhandled frame");
                self.observer.on_unhandled_frame(frame);
            }
        }
    }

    async fn set_heartbeat(&mut self, interval: Duration) {
        self.stop_heartbeat();
        self.state.heartbeat_interval = Some(interval);
        self.do_heartbeat().await;
    }

    fn stop_heartbeat(&mut self) {
        self.heartbeat_timer = None;
    }

    async fn do_heartbeat(&mut self) {
        trace!("sending heartbeat");
        // The close path handles a dead transport; keep the schedule going.
        if let Err(e) = self.write(StompItem::Heartbeat).await {
            debug!(error = %e, "heartbeat write failed");
        }
        if let Some(interval) = self.state.heartbeat_interval {
            self.heartbeat_timer = Some(Box::pin(sleep(interval)));
        }
    }

    fn on_transport_closed(&mut self) {
        self.stop_heartbeat();
        self.state.heartbeat_interval = None;
        self.reader = None;
        self.writer = None;
        self.state.connected = false;
        self.state.phase = SessionPhase::Disconnected;
        self.state.disconnected_at = Some(SystemTime::now());

        let graceful = self.state.disconnecting;
        if graceful {
            info!("connection ended gracefully");
        } else {
            info!("connection ended unexpectedly");
            self.schedule_reconnect();
        }
        self.observer.on_disconnect(graceful);
    }

    fn schedule_reconnect(&mut self) {
        match self.retry.next_delay() {
            Ok(delay) => {
                self.state.reconnect_attempts = self.retry.attempts();
                debug!(
                    attempt = self.retry.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "reconnect scheduled"
                );
                self.reconnect_timer = Some(Box::pin(sleep(delay)));
            }
            Err(RetryError::Exhausted(max)) => {
                error!(max_attempts = max, "all connection attempts failed");
                self.observer.on_reconnect_exhausted(self.retry.attempts());
            }
        }
    }

    async fn disconnect(&mut self) {
        self.reconnect_timer = None;
        if !self.state.connected {
            return;
        }
        self.state.disconnecting = true;
        self.state.phase = SessionPhase::Disconnecting;
        if let Err(e) = self.write(OutgoingFrame::from(Frame::new("DISCONNECT"))).await {
            debug!(error = %e, "DISCONNECT write failed");
        }
        if let Some(writer) = self.writer.as_mut() {
            let _ = SinkExt::<OutgoingFrame>::close(writer).await;
        }
        self.on_transport_closed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode_frame;

    fn body(text: &str) -> Bytes {
        Bytes::copy_from_slice(text.as_bytes())
    }

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn send_frame_adds_destination_and_content_length() {
        let frame = send_frame(
            "/topic/test",
            body("{}"),
            headers(&[("my-header", "my-value")]),
            true,
        );
        assert_eq!(
            &frame.encode()[..],
            b"SEND\ncontent-length:2\ndestination:/topic/test\nmy-header:my-value\n\n{}\x00"
        );
    }

    #[test]
    fn send_frame_counts_utf8_bytes() {
        let frame = send_frame("/topic/test", body("Wilson Júnior"), Headers::new(), true);
        assert_eq!(frame.headers.get("content-length").map(String::as_str), Some("14"));
    }

    #[test]
    fn send_frame_jms_mode_omits_content_length() {
        let frame = send_frame("/topic/test", body("{}"), Headers::new(), false);
        assert!(!frame.headers.contains_key("content-length"));
        assert_eq!(frame.body.as_deref(), Some(&b"{}"[..]));
    }

    #[test]
    fn send_frame_without_body() {
        let frame = send_frame("/queue/a", Bytes::new(), Headers::new(), true);
        assert!(!frame.headers.contains_key("content-length"));
        assert_eq!(frame.body, None);
        assert_eq!(&frame.encode()[..], b"SEND\ndestination:/queue/a\n\n\x00");
    }

    #[test]
    fn send_frame_keeps_binary_body() {
        let frame = send_frame("/queue/a", Bytes::from_static(&[0xff, 0x01]), Headers::new(), true);
        assert_eq!(
            &frame.encode()[..],
            b"SEND\ncontent-length:2\ndestination:/queue/a\n\n\xff\x01\x00"
        );
    }

    #[test]
    fn ack_frame_copies_ids() {
        let msg = Frame::new("MESSAGE")
            .header("subscription", "123")
            .header("message-id", "321")
            .set_body("blah");
        let ack = ack_frame("ACK", &msg).unwrap();
        assert_eq!(
            &encode_frame(&ack)[..],
            b"ACK\nmessage-id:321\nsubscription:123\n\n\x00"
        );
        let nack = ack_frame("NACK", &msg).unwrap();
        assert_eq!(
            &encode_frame(&nack)[..],
            b"NACK\nmessage-id:321\nsubscription:123\n\n\x00"
        );
    }

    #[test]
    fn ack_frame_requires_headers() {
        let msg = Frame::new("MESSAGE").header("message-id", "1");
        assert!(matches!(
            ack_frame("ACK", &msg),
            Err(ConnError::MissingHeader("subscription"))
        ));
        let msg = Frame::new("MESSAGE").header("subscription", "1");
        assert!(matches!(
            ack_frame("ACK", &msg),
            Err(ConnError::MissingHeader("message-id"))
        ));
    }
}
