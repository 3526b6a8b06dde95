use crate::{error::TransportError, tcp_sender::Delivery};

/// Common surface of the reliable (TCP/TLS) and unreliable (UDP) senders.
///
/// Implementations are `Send + Sync` so one sender can be shared across
/// threads behind an `Arc`.
pub trait SyslogSender: Send + Sync {
    /// Deliver one already-encoded syslog record.
    fn send(&self, payload: &[u8]) -> Result<Delivery, TransportError>;

    /// Release the underlying socket. Safe to call repeatedly.
    fn close(&self);
}
