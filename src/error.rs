//! Error types surfaced by the TCP/TLS and UDP senders.
//!
//! Every [`TransportError`] names the endpoint it concerns so callers can log
//! the failure without threading extra context through their own code.

use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::tcp_sender::Endpoint;

/// Failures raised while connecting to or writing to a collector.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The TCP connect did not complete within the connect timeout.
    #[error("timed out connecting to {endpoint} after {timeout:?}")]
    ConnectTimeout { endpoint: Endpoint, timeout: Duration },

    /// Resolution or connect failed for a reason other than a timeout.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },

    /// The TLS connector could not be built from the configured options.
    #[error("invalid tls configuration for {endpoint}: {reason}")]
    TlsSetup { endpoint: Endpoint, reason: String },

    /// The TLS handshake stalled past the connect timeout.
    #[error("tls handshake with {endpoint} timed out")]
    TlsTimeout { endpoint: Endpoint },

    /// The TLS handshake failed for a reason other than certificate checks.
    #[error("tls handshake with {endpoint} failed: {source}")]
    TlsHandshake {
        endpoint: Endpoint,
        #[source]
        source: native_tls::Error,
    },

    /// The peer certificate was rejected or does not match the endpoint.
    #[error("certificate verification failed for {endpoint}: {source}")]
    CertificateVerification {
        endpoint: Endpoint,
        #[source]
        source: native_tls::Error,
    },

    /// The collector closed the connection before the write started.
    #[error("{endpoint} closed the connection")]
    PeerClosed { endpoint: Endpoint },

    /// The socket stayed unwritable until the io timeout expired.
    #[error("write to {endpoint} timed out after {timeout:?} with {unsent} bytes unsent")]
    WriteTimeout {
        endpoint: Endpoint,
        timeout: Duration,
        unsent: usize,
    },

    /// Generic reset, broken pipe or other socket failure.
    #[error("i/o error on connection to {endpoint}: {source}")]
    ConnectionIo {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },

    /// Every retry failed; `source` is the last underlying failure.
    #[error(
        "giving up on {endpoint} ({}) after {attempts} retries: {source}",
        transport_label(.tls)
    )]
    RetriesExhausted {
        endpoint: Endpoint,
        tls: bool,
        attempts: u32,
        #[source]
        source: Box<TransportError>,
    },
}

impl TransportError {
    /// Endpoint the failure relates to.
    pub fn endpoint(&self) -> &Endpoint {
        match self {
            Self::ConnectTimeout { endpoint, .. }
            | Self::Connect { endpoint, .. }
            | Self::TlsSetup { endpoint, .. }
            | Self::TlsTimeout { endpoint }
            | Self::TlsHandshake { endpoint, .. }
            | Self::CertificateVerification { endpoint, .. }
            | Self::PeerClosed { endpoint }
            | Self::WriteTimeout { endpoint, .. }
            | Self::ConnectionIo { endpoint, .. }
            | Self::RetriesExhausted { endpoint, .. } => endpoint,
        }
    }

    /// Return the failure that caused a [`TransportError::RetriesExhausted`],
    /// or `self` for every other variant.
    pub fn last_error(&self) -> &TransportError {
        match self {
            Self::RetriesExhausted { source, .. } => source.last_error(),
            other => other,
        }
    }

    /// Whether the retry budget was spent.
    pub fn is_retries_exhausted(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. })
    }

    /// Wrap an I/O error raised on an established connection.
    pub(crate) fn io(endpoint: &Endpoint, source: io::Error) -> Self {
        Self::ConnectionIo {
            endpoint: endpoint.clone(),
            source,
        }
    }
}

fn transport_label(tls: &bool) -> &'static str {
    if *tls { "tls" } else { "plain" }
}

/// Errors raised while validating or loading sender configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid user supplied configuration.
    #[error("invalid sender configuration: {0}")]
    InvalidConfig(String),
    /// A configuration file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A configuration file is not valid INI.
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ini::ParseError,
    },
    /// The requested section is absent from the configuration file.
    #[error("section [{0}] not found")]
    MissingSection(String),
    /// A key held a value that could not be interpreted.
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}
