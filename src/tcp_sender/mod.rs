//! Reliable syslog transport over TCP, optionally wrapped in TLS.
//!
//! [`TcpSyslogSender`] owns one persistent connection. Each send appends a
//! newline terminator, checks that a plain-text peer has not already hung up,
//! drives possibly partial writes against the io deadline and, on any failure,
//! reconnects and resends the whole record until the retry budget runs out.
//! Keepalive and user-timeout tuning is applied on every connect where the
//! platform supports it.

mod config;
mod connection;
mod retry;
mod sender;
mod socket_options;
mod tls;
mod writer;


pub use config::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, DEFAULT_RETRY_INTERVAL, DEFAULT_RETRY_LIMIT, Endpoint,
    KeepaliveOptions, TlsOptions, TlsProtocol, TlsVerifyMode, TransportConfig,
};
pub use connection::{ActiveConnection, ConnectionManager};
pub use retry::{RetryPolicy, RetryState};
pub use sender::TcpSyslogSender;
pub use socket_options::SocketCapabilities;
pub use writer::{Delivery, RECORD_TERMINATOR};
