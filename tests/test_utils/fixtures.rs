//! Loopback collectors and throwaway TLS identities for integration tests.
//! A collector accepts connections on an ephemeral port and reports every
//! byte each connection delivered once the sender hangs up.

use std::{
    io::Read,
    net::{SocketAddr, TcpListener, TcpStream},
    path::PathBuf,
    sync::mpsc,
    thread,
    time::Duration,
};

use native_tls::{Identity, TlsAcceptor};
use rstest::fixture;
use tempfile::TempDir;

/// Return a listener bound to an ephemeral loopback port.
#[fixture]
pub fn tcp_listener() -> TcpListener {
    TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener")
}

/// A self-signed certificate plus the acceptor serving it.
pub struct TlsIdentity {
    pub acceptor: TlsAcceptor,
    /// PEM bundle containing only the certificate, for use as a CA file.
    pub ca_file: PathBuf,
    _dir: TempDir,
}

impl TlsIdentity {
    /// Generate a certificate valid for `names`.
    pub fn for_names(names: &[&str]) -> Self {
        let cert = rcgen::generate_simple_self_signed(
            names.iter().map(|n| (*n).to_owned()).collect::<Vec<_>>(),
        )
        .expect("generate certificate");
        let cert_pem = cert.serialize_pem().expect("serialise certificate");
        let key_pem = cert.serialize_private_key_pem();
        let identity = Identity::from_pkcs8(cert_pem.as_bytes(), key_pem.as_bytes())
            .expect("load identity");
        let acceptor = TlsAcceptor::new(identity).expect("build acceptor");

        let dir = tempfile::tempdir().expect("create temp dir");
        let ca_file = dir.path().join("ca.pem");
        std::fs::write(&ca_file, cert_pem).expect("write ca file");
        Self {
            acceptor,
            ca_file,
            _dir: dir,
        }
    }
}

/// Receiving end of a running collector.
pub struct CollectorHandle {
    pub addr: SocketAddr,
    received: mpsc::Receiver<Vec<u8>>,
}

impl CollectorHandle {
    /// Bytes delivered over the next finished connection.
    pub fn next_stream(&self) -> Vec<u8> {
        self.received
            .recv_timeout(Duration::from_secs(5))
            .expect("collector delivered a stream")
    }

    /// Like [`next_stream`](Self::next_stream) but tolerates no connection.
    pub fn try_next_stream(&self, wait: Duration) -> Option<Vec<u8>> {
        self.received.recv_timeout(wait).ok()
    }
}

/// Serve `connections` connections in turn, plain or wrapped in TLS.
/// Failed handshakes are skipped without counting.
pub fn collector(
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    connections: usize,
) -> CollectorHandle {
    let addr = listener.local_addr().expect("listener has address");
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut served = 0;
        while served < connections {
            let Ok((stream, _)) = listener.accept() else {
                return;
            };
            let Some(bytes) = drain(stream, tls.as_ref()) else {
                continue;
            };
            served += 1;
            if tx.send(bytes).is_err() {
                return;
            }
        }
    });
    CollectorHandle { addr, received: rx }
}

fn drain(stream: TcpStream, tls: Option<&TlsAcceptor>) -> Option<Vec<u8>> {
    let mut received = Vec::new();
    match tls {
        Some(acceptor) => {
            let mut stream = acceptor.accept(stream).ok()?;
            // A client dropping without close_notify surfaces as an error
            // after the data has been read.
            let _ = stream.read_to_end(&mut received);
        }
        None => {
            let mut stream = stream;
            stream.read_to_end(&mut received).ok()?;
        }
    }
    Some(received)
}
