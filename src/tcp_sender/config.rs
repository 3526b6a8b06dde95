//! Configuration structures consumed by the TCP sender.
//!
//! [`TcpSenderBuilder`](crate::builder::TcpSenderBuilder) validates these
//! values before handing them to
//! [`TcpSyslogSender`](super::TcpSyslogSender); they are immutable afterwards.

use std::{fmt, path::PathBuf, time::Duration};

/// Default timeout applied when establishing sockets and TLS sessions.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default number of reconnect-and-retry attempts per send.
pub const DEFAULT_RETRY_LIMIT: u32 = 3;
/// Default base sleep between retries.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(500);
/// Conventional syslog-over-TCP port.
pub const DEFAULT_PORT: u16 = 514;

/// Collector address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Peer certificate checks applied during the TLS handshake.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TlsVerifyMode {
    /// Accept any certificate and host name (intended for tests).
    None,
    /// Require a trusted certificate issued for the endpoint host.
    #[default]
    Peer,
}

/// TLS protocol version pinned for the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TlsProtocol {
    Tls10,
    Tls11,
    Tls12,
}

impl TlsProtocol {
    pub(crate) fn to_native(self) -> native_tls::Protocol {
        match self {
            Self::Tls10 => native_tls::Protocol::Tlsv10,
            Self::Tls11 => native_tls::Protocol::Tlsv11,
            Self::Tls12 => native_tls::Protocol::Tlsv12,
        }
    }
}

/// TLS connection options.
#[derive(Clone, Debug, Default)]
pub struct TlsOptions {
    /// Pin the session to one protocol version; `None` lets the platform
    /// negotiate.
    pub protocol: Option<TlsProtocol>,
    /// PEM bundle of additional trust anchors.
    pub ca_file: Option<PathBuf>,
    pub verify_mode: TlsVerifyMode,
}

/// OS-level TCP keepalive tuning. Each tunable is applied independently.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeepaliveOptions {
    /// Idle time before the first probe.
    pub idle: Option<Duration>,
    /// Unanswered probes before the connection is declared dead.
    pub count: Option<u32>,
    /// Time between probes.
    pub interval: Option<Duration>,
}

/// Everything that determines how a [`TcpSyslogSender`](super::TcpSyslogSender)
/// connects and writes.
#[derive(Clone, Debug)]
pub struct TransportConfig {
    pub endpoint: Endpoint,
    /// TLS wrapping; `None` sends in plain text.
    pub tls: Option<TlsOptions>,
    /// Keepalive tuning; `None` leaves keepalive disabled.
    pub keepalive: Option<KeepaliveOptions>,
    /// Maximum time the OS may hold unacknowledged data.
    pub user_timeout: Option<Duration>,
    /// Bound on connect plus handshake; `None` blocks indefinitely.
    pub connect_timeout: Option<Duration>,
    /// Bound on one write cycle; `None` writes in blocking mode.
    pub io_timeout: Option<Duration>,
    pub retry_limit: u32,
    pub retry_interval: Duration,
    pub exponential_backoff: bool,
    /// Raise [`WriteTimeout`](crate::TransportError::WriteTimeout) when the
    /// io timeout expires instead of returning a truncated delivery.
    pub raise_on_timeout: bool,
}

impl TransportConfig {
    /// Defaults targeting `endpoint`.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            tls: None,
            keepalive: None,
            user_timeout: None,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            io_timeout: None,
            retry_limit: DEFAULT_RETRY_LIMIT,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            exponential_backoff: false,
            raise_on_timeout: false,
        }
    }

    /// Enable TLS with the given options.
    pub fn with_tls(mut self, tls: TlsOptions) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn uses_tls(&self) -> bool {
        self.tls.is_some()
    }
}

/// Local development default (`localhost:514`, plain TCP).
impl Default for TransportConfig {
    fn default() -> Self {
        Self::new(Endpoint::new("localhost", DEFAULT_PORT))
    }
}
