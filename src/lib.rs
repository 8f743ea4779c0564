pub mod codec;
pub mod config;
pub mod connection;
pub mod frame;
pub mod heartbeat;
pub mod hooks;
pub mod protocol;
pub mod retry;
pub mod subscription;
pub mod transport;

pub use codec::{StompCodec, StompItem};
pub use config::{ClientConfig, DEFAULT_PORT};
pub use connection::{ConnError, Connection, ConnectionState, STOMP_VERSION, SessionPhase};
pub use frame::{Frame, Headers, OutgoingFrame, ReceivedFrame, ServerError};
pub use heartbeat::{Heartbeat, parse_heartbeat_header};
pub use hooks::{Hooks, NoopObserver, SessionObserver};
pub use protocol::{ProtocolError, StompProtocol, build_frame, encode_frame};
pub use retry::{ReconnectPolicy, RetryError};
pub use subscription::{AckMode, MessageHandler, Subscription, SubscriptionRegistry};
pub use transport::{Connector, TcpConnector};
