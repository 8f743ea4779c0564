use std::time::Duration;

use crate::frame::Headers;
use crate::heartbeat::Heartbeat;
use crate::retry::ReconnectPolicy;

/// Default STOMP port.
pub const DEFAULT_PORT: u16 = 61613;

/// Client configuration.
///
/// Built with chained setters on top of [`ClientConfig::default`]:
///
/// ```ignore
/// let config = ClientConfig::new("broker.local", 61613)
///     .login("guest")
///     .passcode("guest")
///     .heartbeat(Heartbeat::new(1000, 1000))
///     .reconnect_max_attempts(5)
///     .reconnect_timeout(Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Broker host name or address
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Extra headers sent with CONNECT. `accept-version` is always
    /// overwritten with the supported protocol version.
    pub connect_headers: Headers,
    /// Maximum reconnect attempts; `None` retries forever.
    pub reconnect_max_attempts: Option<u32>,
    /// Fixed delay between reconnect attempts.
    pub reconnect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            connect_headers: Headers::new(),
            reconnect_max_attempts: None,
            reconnect_timeout: Duration::from_millis(1000),
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Add a CONNECT header.
    pub fn connect_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.connect_headers.insert(key.into(), value.into());
        self
    }

    pub fn login(self, login: impl Into<String>) -> Self {
        self.connect_header("login", login)
    }

    pub fn passcode(self, passcode: impl Into<String>) -> Self {
        self.connect_header("passcode", passcode)
    }

    /// Virtual host sent as the CONNECT `host` header.
    pub fn vhost(self, vhost: impl Into<String>) -> Self {
        self.connect_header("host", vhost)
    }

    /// Client heartbeat offer sent as the CONNECT `heart-beat` header.
    pub fn heartbeat(self, heartbeat: Heartbeat) -> Self {
        self.connect_header("heart-beat", heartbeat.to_string())
    }

    /// Set the reconnect limit. A negative value means unlimited.
    pub fn reconnect_max_attempts(mut self, max_attempts: i64) -> Self {
        self.reconnect_max_attempts = ReconnectPolicy::from_limit(max_attempts, Duration::ZERO)
            .max_attempts();
        self
    }

    pub fn reconnect_timeout(mut self, timeout: Duration) -> Self {
        self.reconnect_timeout = timeout;
        self
    }

    /// Reconnect policy described by this configuration.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(self.reconnect_max_attempts, self.reconnect_timeout)
    }
}
