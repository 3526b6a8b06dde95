//! Reliable delivery of syslog records to a remote collector.
//!
//! [`TcpSyslogSender`] keeps one TCP (optionally TLS) connection per sender,
//! frames every record with a trailing newline and retries failed sends by
//! reconnecting, with optional exponential backoff. [`UdpSyslogSender`] is the
//! fire-and-forget counterpart. Both implement [`SyslogSender`].
//!
//! ```no_run
//! use std::time::Duration;
//! use syslog_transport::TcpSenderBuilder;
//!
//! let sender = TcpSenderBuilder::new()
//!     .with_endpoint("logs.example.com", 6514)
//!     .with_tls()
//!     .with_io_timeout(Duration::from_secs(1))
//!     .with_exponential_backoff(true)
//!     .build()?;
//! sender.send(b"<134>1 2024-01-01T00:00:00Z host app - - - started")?;
//! sender.close();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod builder;
pub mod clock;
pub mod diagnostics;
mod error;
pub mod file_config;
pub mod rate_limited_warner;
mod sender;
pub mod tcp_sender;
pub mod udp_sender;

#[cfg(test)]
mod test_utils;

pub use builder::TcpSenderBuilder;
pub use clock::{Clock, MonotonicClock};
#[cfg(feature = "tracing")]
pub use diagnostics::TracingDiagnostics;
pub use diagnostics::{DiagnosticEvent, Diagnostics, LogDiagnostics, NoopDiagnostics, Phase};
pub use error::{ConfigError, TransportError};
pub use file_config::load_transport_config;
pub use sender::SyslogSender;
pub use tcp_sender::{
    Delivery, Endpoint, KeepaliveOptions, TcpSyslogSender, TlsOptions, TlsProtocol,
    TlsVerifyMode, TransportConfig,
};
pub use udp_sender::UdpSyslogSender;
