//! Fire-and-forget syslog over UDP.
//!
//! Each payload becomes one datagram with no terminator. There is no retry and
//! no liveness tracking; a socket is opened lazily and reused until closed.

use std::{
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket},
    sync::Arc,
};

use parking_lot::Mutex;

use crate::{
    diagnostics::{self, Diagnostics, LogDiagnostics, Phase},
    error::TransportError,
    sender::SyslogSender,
    tcp_sender::{Delivery, Endpoint},
};

/// Sends each record as a single datagram.
pub struct UdpSyslogSender {
    endpoint: Endpoint,
    socket: Mutex<Option<UdpSocket>>,
    diag: Arc<dyn Diagnostics>,
}

impl UdpSyslogSender {
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_diagnostics(endpoint, Arc::new(LogDiagnostics))
    }

    pub fn with_diagnostics(endpoint: Endpoint, diag: Arc<dyn Diagnostics>) -> Self {
        Self {
            endpoint,
            socket: Mutex::new(None),
            diag,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn open(&self) -> Result<UdpSocket, TransportError> {
        let connect_err = |source: io::Error| TransportError::Connect {
            endpoint: self.endpoint.clone(),
            source,
        };
        let addr = (self.endpoint.host.as_str(), self.endpoint.port)
            .to_socket_addrs()
            .map_err(connect_err)?
            .next()
            .ok_or_else(|| {
                connect_err(io::Error::new(
                    io::ErrorKind::NotFound,
                    "host resolved to no addresses",
                ))
            })?;
        let local: SocketAddr = match addr {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local).map_err(connect_err)?;
        socket.connect(addr).map_err(connect_err)?;
        Ok(socket)
    }

    pub fn send(&self, payload: &[u8]) -> Result<Delivery, TransportError> {
        let mut guard = self.socket.lock();
        let socket = match guard.take() {
            Some(socket) => socket,
            None => self.open()?,
        };
        diagnostics::emit(
            self.diag.as_ref(),
            Phase::Sending,
            &self.endpoint,
            &[("bytes", &payload.len())],
        );
        let sent = socket
            .send(payload)
            .map_err(|err| TransportError::io(&self.endpoint, err))?;
        *guard = Some(socket);
        if sent < payload.len() {
            return Ok(Delivery::Truncated {
                written: sent,
                unsent: payload.len() - sent,
            });
        }
        diagnostics::emit(
            self.diag.as_ref(),
            Phase::Sent,
            &self.endpoint,
            &[("bytes", &sent)],
        );
        Ok(Delivery::Complete)
    }

    pub fn close(&self) {
        if self.socket.lock().take().is_some() {
            diagnostics::emit(self.diag.as_ref(), Phase::Closed, &self.endpoint, &[]);
        }
    }
}

impl SyslogSender for UdpSyslogSender {
    fn send(&self, payload: &[u8]) -> Result<Delivery, TransportError> {
        UdpSyslogSender::send(self, payload)
    }

    fn close(&self) {
        UdpSyslogSender::close(self);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::*;
    use crate::diagnostics::NoopDiagnostics;

    #[rstest]
    fn delivers_one_datagram_per_record() {
        let receiver = UdpSocket::bind(("127.0.0.1", 0)).expect("bind receiver");
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("set timeout");
        let port = receiver.local_addr().expect("addr").port();
        let sender =
            UdpSyslogSender::with_diagnostics(Endpoint::new("127.0.0.1", port), Arc::new(NoopDiagnostics));

        assert_eq!(sender.send(b"<14>first").expect("send"), Delivery::Complete);
        assert_eq!(sender.send(b"<14>second").expect("send"), Delivery::Complete);

        let mut buf = [0u8; 64];
        let n = receiver.recv(&mut buf).expect("first datagram");
        assert_eq!(&buf[..n], b"<14>first");
        let n = receiver.recv(&mut buf).expect("second datagram");
        assert_eq!(&buf[..n], b"<14>second");
    }

    #[rstest]
    fn close_is_idempotent_and_send_reopens() {
        let receiver = UdpSocket::bind(("127.0.0.1", 0)).expect("bind receiver");
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("set timeout");
        let port = receiver.local_addr().expect("addr").port();
        let sender =
            UdpSyslogSender::with_diagnostics(Endpoint::new("127.0.0.1", port), Arc::new(NoopDiagnostics));

        sender.close();
        sender.send(b"after close").expect("send reopens");
        sender.close();
        sender.close();

        let mut buf = [0u8; 64];
        let n = receiver.recv(&mut buf).expect("datagram");
        assert_eq!(&buf[..n], b"after close");
    }
}
