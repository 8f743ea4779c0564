//! In-memory broker harness shared by the session tests.
#![allow(dead_code)]

use cobalt_stomp::{Connector, Frame, Hooks, ServerError};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::sync::mpsc;
use tokio::time::timeout;

pub const WAIT: Duration = Duration::from_secs(2);

/// Transport that hands the far end of each new duplex pipe to the test.
pub struct DuplexConnector {
    brokers: mpsc::UnboundedSender<DuplexStream>,
    attempts: Arc<AtomicUsize>,
    refuse_first: usize,
}

impl DuplexConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DuplexStream>, Arc<AtomicUsize>) {
        Self::refusing_first(0)
    }

    /// Refuse the first `n` attempts, then connect.
    pub fn refusing_first(
        n: usize,
    ) -> (Self, mpsc::UnboundedReceiver<DuplexStream>, Arc<AtomicUsize>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let attempts = Arc::new(AtomicUsize::new(0));
        let connector = Self {
            brokers: tx,
            attempts: attempts.clone(),
            refuse_first: n,
        };
        (connector, rx, attempts)
    }
}

impl Connector for DuplexConnector {
    type Stream = DuplexStream;

    async fn connect(&self, _host: &str, _port: u16) -> io::Result<DuplexStream> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst);
        if n < self.refuse_first {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        }
        let (client, broker) = tokio::io::duplex(64 * 1024);
        self.brokers
            .send(broker)
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "test harness gone"))?;
        Ok(client)
    }
}

/// Transport whose every attempt is refused.
pub struct RefusingConnector {
    pub attempts: Arc<AtomicUsize>,
}

impl RefusingConnector {
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let attempts = Arc::new(AtomicUsize::new(0));
        (
            Self {
                attempts: attempts.clone(),
            },
            attempts,
        )
    }
}

impl Connector for RefusingConnector {
    type Stream = DuplexStream;

    async fn connect(&self, _host: &str, _port: u16) -> io::Result<DuplexStream> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
    }
}

/// Stream that replays `inbound` once, then never becomes readable again.
/// Frame writes succeed; a write made only of heartbeat LFs fails with
/// `BrokenPipe` and is counted.
pub struct HalfDeadStream {
    inbound: Vec<u8>,
    failed_heartbeats: Arc<AtomicUsize>,
}

impl AsyncRead for HalfDeadStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.inbound.is_empty() {
            return Poll::Pending;
        }
        let n = buf.remaining().min(self.inbound.len());
        let chunk: Vec<u8> = self.inbound.drain(..n).collect();
        buf.put_slice(&chunk);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for HalfDeadStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if !buf.is_empty() && buf.iter().all(|b| *b == b'\n') {
            self.failed_heartbeats.fetch_add(1, Ordering::SeqCst);
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "write side gone")));
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Transport handing out one [`HalfDeadStream`] per attempt.
pub struct HalfDeadConnector {
    inbound: Vec<u8>,
    failed_heartbeats: Arc<AtomicUsize>,
}

impl HalfDeadConnector {
    pub fn new(inbound: &[u8]) -> (Self, Arc<AtomicUsize>) {
        let failed_heartbeats = Arc::new(AtomicUsize::new(0));
        let connector = Self {
            inbound: inbound.to_vec(),
            failed_heartbeats: failed_heartbeats.clone(),
        };
        (connector, failed_heartbeats)
    }
}

impl Connector for HalfDeadConnector {
    type Stream = HalfDeadStream;

    async fn connect(&self, _host: &str, _port: u16) -> io::Result<HalfDeadStream> {
        Ok(HalfDeadStream {
            inbound: self.inbound.clone(),
            failed_heartbeats: self.failed_heartbeats.clone(),
        })
    }
}

/// Broker side of one connection.
pub struct Broker {
    stream: DuplexStream,
}

impl Broker {
    pub async fn accept(rx: &mut mpsc::UnboundedReceiver<DuplexStream>) -> Broker {
        let stream = timeout(WAIT, rx.recv())
            .await
            .expect("no connection attempt")
            .expect("connector dropped");
        Broker { stream }
    }

    /// Next byte from the client, `None` on EOF.
    pub async fn read_byte(&mut self) -> Option<u8> {
        timeout(WAIT, self.stream.read_u8())
            .await
            .expect("timed out waiting for a byte")
            .ok()
    }

    /// Next frame from the client including its NUL, skipping heartbeats.
    pub async fn read_frame(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let b = self.read_byte().await.expect("eof inside frame");
            if out.is_empty() && b == b'\n' {
                continue;
            }
            out.push(b);
            if b == 0 {
                return out;
            }
        }
    }

    pub async fn write(&mut self, data: &[u8]) {
        self.stream.write_all(data).await.expect("broker write");
    }
}

/// Observer events as seen by a test.
#[derive(Debug)]
pub enum Event {
    Connect,
    Disconnect(bool),
    Error(ServerError),
    Unhandled(Frame),
    DispatchMiss(Frame),
    Heartbeat,
    DecodeError(String),
    Exhausted(u32),
}

pub fn recording_hooks() -> (Hooks, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (t1, t2, t3, t4, t5, t6, t7, t8) = (
        tx.clone(),
        tx.clone(),
        tx.clone(),
        tx.clone(),
        tx.clone(),
        tx.clone(),
        tx.clone(),
        tx,
    );
    let hooks = Hooks::new()
        .on_connect(move || {
            let _ = t1.send(Event::Connect);
        })
        .on_disconnect(move |graceful| {
            let _ = t2.send(Event::Disconnect(graceful));
        })
        .on_error(move |err| {
            let _ = t3.send(Event::Error(err));
        })
        .on_unhandled_frame(move |frame| {
            let _ = t4.send(Event::Unhandled(frame));
        })
        .on_dispatch_miss(move |frame| {
            let _ = t5.send(Event::DispatchMiss(frame));
        })
        .on_heartbeat(move || {
            let _ = t6.send(Event::Heartbeat);
        })
        .on_decode_error(move |err| {
            let _ = t7.send(Event::DecodeError(err.to_string()));
        })
        .on_reconnect_exhausted(move |attempts| {
            let _ = t8.send(Event::Exhausted(attempts));
        });
    (hooks, rx)
}

/// Wait for the first event matching `pred`, discarding others.
pub async fn expect_event(
    rx: &mut mpsc::UnboundedReceiver<Event>,
    pred: impl Fn(&Event) -> bool,
) -> Event {
    timeout(WAIT, async {
        loop {
            let ev = rx.recv().await.expect("session dropped its observer");
            if pred(&ev) {
                return ev;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
