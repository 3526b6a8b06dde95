//! Connection lifecycle for the TCP sender.
//!
//! [`ConnectionManager`] owns the single live socket (plain or TLS-wrapped).
//! It is only ever reached through the sender's lock, so connect and write
//! never interleave.

use std::{
    io::{self, Write},
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    sync::Arc,
};

use native_tls::{TlsConnector, TlsStream};

use crate::{
    clock::{Clock, Deadline},
    diagnostics::{self, Diagnostics, Phase},
    error::TransportError,
};

use super::{
    config::{Endpoint, TransportConfig},
    socket_options, tls,
};

/// Active socket connection state.
pub enum ActiveConnection {
    PlainTcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl ActiveConnection {
    /// The raw TCP socket, for timeouts and readiness checks.
    pub fn tcp(&self) -> &TcpStream {
        match self {
            ActiveConnection::PlainTcp(stream) => stream,
            ActiveConnection::Tls(stream) => stream.get_ref(),
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, ActiveConnection::Tls(_))
    }

    /// Single write call; may accept fewer bytes than offered.
    pub fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ActiveConnection::PlainTcp(stream) => stream.write(buf),
            ActiveConnection::Tls(stream) => stream.write(buf),
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        match self {
            ActiveConnection::PlainTcp(stream) => stream.flush(),
            ActiveConnection::Tls(stream) => stream.flush(),
        }
    }

    /// Send `close_notify` on TLS connections. Never blocks: a peer that
    /// stopped reading simply misses the alert.
    fn shutdown(&mut self) {
        if let ActiveConnection::Tls(stream) = self {
            if stream.get_ref().set_nonblocking(true).is_ok() {
                let _ = stream.shutdown();
            }
        }
    }
}

/// Owns the connection handle and knows how to (re)establish it.
pub struct ConnectionManager {
    config: Arc<TransportConfig>,
    diag: Arc<dyn Diagnostics>,
    clock: Arc<dyn Clock>,
    connector: Option<TlsConnector>,
    connection: Option<ActiveConnection>,
}

impl ConnectionManager {
    pub fn new(
        config: Arc<TransportConfig>,
        diag: Arc<dyn Diagnostics>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            diag,
            clock,
            connector: None,
            connection: None,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.config.endpoint
    }

    /// Whether a handle is available for writing.
    pub fn is_usable(&self) -> bool {
        self.connection.is_some()
    }

    pub(crate) fn connection_mut(&mut self) -> Option<&mut ActiveConnection> {
        self.connection.as_mut()
    }

    /// Close any existing handle and establish a fresh one.
    pub fn connect(&mut self) -> Result<(), TransportError> {
        self.close();
        let config = Arc::clone(&self.config);
        let endpoint = &config.endpoint;
        let tls = config.uses_tls();
        diagnostics::emit(
            self.diag.as_ref(),
            Phase::Connecting,
            endpoint,
            &[("tls", &tls), ("timeout", &TimeoutDisplay(config.connect_timeout))],
        );

        let connector = self.connector()?;

        // The connect and the handshake share one budget.
        let started = self.clock.now();
        let stream = self.open_stream()?;
        socket_options::apply(
            &stream,
            endpoint,
            config.user_timeout,
            config.keepalive.as_ref(),
            self.diag.as_ref(),
        )
        .map_err(|err| TransportError::io(endpoint, err))?;

        let connection = match connector {
            Some(connector) => {
                let remaining = Deadline::after(started, config.connect_timeout)
                    .remaining(self.clock.now());
                if remaining.is_some_and(|r| r.is_zero()) {
                    return Err(TransportError::TlsTimeout {
                        endpoint: endpoint.clone(),
                    });
                }
                let session = tls::handshake(
                    &connector,
                    stream,
                    endpoint,
                    remaining,
                    self.clock.as_ref(),
                )?;
                ActiveConnection::Tls(Box::new(session))
            }
            None => ActiveConnection::PlainTcp(stream),
        };

        self.connection = Some(connection);
        diagnostics::emit(self.diag.as_ref(), Phase::Connected, endpoint, &[("tls", &tls)]);
        Ok(())
    }

    /// Release the active handle. A no-op when disconnected.
    pub fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            let tls = connection.is_tls();
            connection.shutdown();
            drop(connection);
            diagnostics::emit(
                self.diag.as_ref(),
                Phase::Closed,
                &self.config.endpoint,
                &[("tls", &tls)],
            );
        }
    }

    /// The cached TLS connector, built on first use. `None` for plain TCP.
    fn connector(&mut self) -> Result<Option<TlsConnector>, TransportError> {
        let Some(options) = &self.config.tls else {
            return Ok(None);
        };
        if self.connector.is_none() {
            self.connector = Some(tls::build_connector(options, &self.config.endpoint)?);
        }
        Ok(self.connector.clone())
    }

    fn open_stream(&self) -> Result<TcpStream, TransportError> {
        let endpoint = &self.config.endpoint;
        let addrs: Vec<SocketAddr> = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Connect {
                endpoint: endpoint.clone(),
                source,
            })?
            .collect();

        let deadline = Deadline::after(self.clock.now(), self.config.connect_timeout);
        let mut last_err: Option<io::Error> = None;
        for addr in addrs {
            let attempt = match deadline.remaining(self.clock.now()) {
                None => TcpStream::connect(addr),
                Some(remaining) if remaining.is_zero() => {
                    last_err = Some(io::Error::from(io::ErrorKind::TimedOut));
                    break;
                }
                Some(remaining) => TcpStream::connect_timeout(&addr, remaining),
            };
            match attempt {
                Ok(stream) => {
                    stream.set_nonblocking(false).map_err(|source| {
                        TransportError::Connect {
                            endpoint: endpoint.clone(),
                            source,
                        }
                    })?;
                    return Ok(stream);
                }
                Err(err) => last_err = Some(err),
            }
        }

        match last_err {
            Some(err) if err.kind() == io::ErrorKind::TimedOut => {
                Err(TransportError::ConnectTimeout {
                    endpoint: endpoint.clone(),
                    timeout: self.config.connect_timeout.unwrap_or_default(),
                })
            }
            Some(source) => Err(TransportError::Connect {
                endpoint: endpoint.clone(),
                source,
            }),
            None => Err(TransportError::Connect {
                endpoint: endpoint.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses"),
            }),
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}

/// Renders `None` as `blocking`.
struct TimeoutDisplay(Option<std::time::Duration>);

impl std::fmt::Display for TimeoutDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(timeout) => write!(f, "{timeout:?}"),
            None => f.write_str("blocking"),
        }
    }
}
