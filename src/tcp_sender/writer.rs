//! Newline-framed writes with peer-close detection and io deadlines.

use std::{
    io::{self, ErrorKind},
    net::TcpStream,
    time::Duration,
};

use crate::{
    clock::{Clock, Deadline},
    diagnostics::{self, Diagnostics, Phase},
    error::TransportError,
};

use super::{
    config::{Endpoint, TransportConfig},
    connection::{ActiveConnection, ConnectionManager},
};

/// Byte appended to every payload.
pub const RECORD_TERMINATOR: u8 = b'\n';

/// How a send finished when it did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Every byte, terminator included, reached the transport.
    Complete,
    /// The io timeout expired with `raise_on_timeout` disabled; the rest of
    /// the record was abandoned.
    Truncated { written: usize, unsent: usize },
}

impl Delivery {
    pub fn is_complete(&self) -> bool {
        matches!(self, Delivery::Complete)
    }
}

/// Outcome of a single write call.
#[derive(Debug)]
pub(crate) enum WriteAttempt {
    /// The transport accepted this many bytes.
    Progress(usize),
    /// The socket stayed unwritable until the deadline.
    Stalled,
    /// The connection is unusable.
    Fatal(io::Error),
}

/// A framed record plus the count of bytes already written.
///
/// Built fresh for every attempt so a retry never resumes a half-sent frame.
pub(crate) struct PendingPayload {
    frame: Vec<u8>,
    written: usize,
}

impl PendingPayload {
    pub(crate) fn framed(payload: &[u8]) -> Self {
        let mut frame = Vec::with_capacity(payload.len() + 1);
        frame.extend_from_slice(payload);
        frame.push(RECORD_TERMINATOR);
        Self { frame, written: 0 }
    }

    pub(crate) fn len(&self) -> usize {
        self.frame.len()
    }

    pub(crate) fn remaining(&self) -> &[u8] {
        &self.frame[self.written..]
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.written >= self.frame.len()
    }

    pub(crate) fn advance(&mut self, n: usize) {
        self.written = (self.written + n).min(self.frame.len());
    }
}

/// Write `payload` plus the terminator over the manager's current handle.
///
/// Returns only once every byte was handed to the transport, the io timeout
/// truncated the record, or an error made the connection unusable.
pub(crate) fn send_msg(
    manager: &mut ConnectionManager,
    config: &TransportConfig,
    payload: &[u8],
    clock: &dyn Clock,
    diag: &dyn Diagnostics,
) -> Result<Delivery, TransportError> {
    let endpoint = &config.endpoint;
    let Some(connection) = manager.connection_mut() else {
        return Err(TransportError::io(
            endpoint,
            io::Error::new(ErrorKind::NotConnected, "no active connection"),
        ));
    };

    if let ActiveConnection::PlainTcp(stream) = &*connection {
        if let Err(err) = check_peer_open(stream, endpoint) {
            diagnostics::emit(diag, Phase::PeerClosed, endpoint, &[]);
            return Err(err);
        }
    }

    let mut pending = PendingPayload::framed(payload);
    let tls = connection.is_tls();
    diagnostics::emit(
        diag,
        Phase::Sending,
        endpoint,
        &[("bytes", &pending.len()), ("tls", &tls)],
    );

    let deadline = Deadline::after(clock.now(), config.io_timeout);
    while !pending.is_empty() {
        match attempt_write(connection, pending.remaining(), &deadline, clock) {
            WriteAttempt::Progress(n) => pending.advance(n),
            WriteAttempt::Stalled => {
                return stalled(config, endpoint, &pending);
            }
            WriteAttempt::Fatal(err) => return Err(TransportError::io(endpoint, err)),
        }
    }
    connection
        .flush()
        .map_err(|err| TransportError::io(endpoint, err))?;

    diagnostics::emit(diag, Phase::Sent, endpoint, &[("bytes", &pending.len())]);
    Ok(Delivery::Complete)
}

fn stalled(
    config: &TransportConfig,
    endpoint: &Endpoint,
    pending: &PendingPayload,
) -> Result<Delivery, TransportError> {
    let unsent = pending.remaining().len();
    if config.raise_on_timeout {
        return Err(TransportError::WriteTimeout {
            endpoint: endpoint.clone(),
            timeout: config.io_timeout.unwrap_or_default(),
            unsent,
        });
    }
    Ok(Delivery::Truncated {
        written: pending.len() - unsent,
        unsent,
    })
}

/// One write call bounded by whatever remains of `deadline`.
pub(crate) fn attempt_write(
    connection: &mut ActiveConnection,
    buf: &[u8],
    deadline: &Deadline,
    clock: &dyn Clock,
) -> WriteAttempt {
    let timeout = match deadline.remaining(clock.now()) {
        Some(remaining) if remaining.is_zero() => return WriteAttempt::Stalled,
        remaining => remaining,
    };
    if let Err(err) = apply_io_timeout(connection, timeout) {
        return WriteAttempt::Fatal(err);
    }
    loop {
        match connection.write(buf) {
            Ok(0) => return WriteAttempt::Fatal(io::Error::from(ErrorKind::WriteZero)),
            Ok(n) => return WriteAttempt::Progress(n),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                return WriteAttempt::Stalled;
            }
            Err(err) => return WriteAttempt::Fatal(err),
        }
    }
}

/// TLS writes may need to read (renegotiation), so both directions share
/// the budget there.
fn apply_io_timeout(connection: &ActiveConnection, timeout: Option<Duration>) -> io::Result<()> {
    let tcp = connection.tcp();
    tcp.set_write_timeout(timeout)?;
    if connection.is_tls() {
        tcp.set_read_timeout(timeout)?;
    }
    Ok(())
}

/// Non-blocking one-byte peek. An orderly shutdown or reset from the peer
/// means the next write would be wasted.
pub(crate) fn check_peer_open(stream: &TcpStream, endpoint: &Endpoint) -> Result<(), TransportError> {
    stream
        .set_nonblocking(true)
        .map_err(|err| TransportError::io(endpoint, err))?;
    let mut probe = [0u8; 1];
    let peeked = stream.peek(&mut probe);
    stream
        .set_nonblocking(false)
        .map_err(|err| TransportError::io(endpoint, err))?;

    match peeked {
        Ok(0) => Err(TransportError::PeerClosed {
            endpoint: endpoint.clone(),
        }),
        // The collector sent something; leave it unread.
        Ok(_) => Ok(()),
        Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => Ok(()),
        Err(err)
            if matches!(
                err.kind(),
                ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::NotConnected
            ) =>
        {
            Err(TransportError::PeerClosed {
                endpoint: endpoint.clone(),
            })
        }
        Err(err) => Err(TransportError::io(endpoint, err)),
    }
}
