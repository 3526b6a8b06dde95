//! Injectable diagnostics for sender lifecycle events.
//!
//! Senders never write to a process-wide sink directly. Each sender holds an
//! `Arc<dyn Diagnostics>`; the default [`LogDiagnostics`] forwards events to
//! the `log` facade so the host application decides where they end up.

use std::fmt;

use log::Level;

use crate::tcp_sender::Endpoint;

/// `log`/`tracing` target used by the bundled sinks.
pub const LOG_TARGET: &str = "syslog_transport";

/// Lifecycle phase an event was emitted from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Connecting,
    Connected,
    SocketOption,
    Sending,
    Sent,
    PeerClosed,
    Retrying,
    Exhausted,
    Truncated,
    Closed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::SocketOption => "socket_option",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::PeerClosed => "peer_closed",
            Self::Retrying => "retrying",
            Self::Exhausted => "exhausted",
            Self::Truncated => "truncated",
            Self::Closed => "closed",
        }
    }

    /// Level the senders report this phase at.
    pub fn level(&self) -> Level {
        match self {
            Self::Retrying | Self::Truncated => Level::Warn,
            Self::Exhausted => Level::Error,
            _ => Level::Debug,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured field attached to an event.
pub type Field<'a> = (&'static str, &'a dyn fmt::Display);

/// A single diagnostic event.
pub struct DiagnosticEvent<'a> {
    pub phase: Phase,
    pub level: Level,
    pub endpoint: &'a Endpoint,
    pub fields: &'a [Field<'a>],
}

impl DiagnosticEvent<'_> {
    /// Look up a field by name and render it.
    pub fn field(&self, name: &str) -> Option<String> {
        self.fields
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    }

    /// Render only the `key=value` pairs.
    pub fn fields_display(&self) -> FieldsDisplay<'_> {
        FieldsDisplay(self.fields)
    }
}

/// `key=value` rendering of an event's fields, space separated.
pub struct FieldsDisplay<'a>(&'a [Field<'a>]);

impl fmt::Display for FieldsDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (key, value)) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

impl fmt::Display for DiagnosticEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.phase, self.endpoint)?;
        if !self.fields.is_empty() {
            write!(f, " {}", self.fields_display())?;
        }
        Ok(())
    }
}

/// Sink receiving sender diagnostics.
pub trait Diagnostics: Send + Sync {
    /// Record one event.
    fn emit(&self, event: &DiagnosticEvent<'_>);

    /// Whether events at `level` would be recorded. Senders skip building
    /// events the sink would discard.
    fn enabled(&self, _level: Level) -> bool {
        true
    }
}

/// Forwards events to the `log` crate under [`LOG_TARGET`].
#[derive(Clone, Copy, Debug, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn emit(&self, event: &DiagnosticEvent<'_>) {
        log::log!(target: LOG_TARGET, event.level, "{event}");
    }

    fn enabled(&self, level: Level) -> bool {
        log::log_enabled!(target: LOG_TARGET, level)
    }
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopDiagnostics;

impl Diagnostics for NoopDiagnostics {
    fn emit(&self, _event: &DiagnosticEvent<'_>) {}

    fn enabled(&self, _level: Level) -> bool {
        false
    }
}

/// Emits events through `tracing` with `phase`, `endpoint` and `fields`
/// recorded as structured values.
#[cfg(feature = "tracing")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingDiagnostics;

#[cfg(feature = "tracing")]
impl Diagnostics for TracingDiagnostics {
    fn emit(&self, event: &DiagnosticEvent<'_>) {
        let phase = event.phase.as_str();
        let endpoint = event.endpoint;
        let fields = event.fields_display();
        match event.level {
            Level::Error => {
                tracing::error!(target: LOG_TARGET, phase, %endpoint, %fields)
            }
            Level::Warn => tracing::warn!(target: LOG_TARGET, phase, %endpoint, %fields),
            Level::Info => tracing::info!(target: LOG_TARGET, phase, %endpoint, %fields),
            Level::Debug => {
                tracing::debug!(target: LOG_TARGET, phase, %endpoint, %fields)
            }
            Level::Trace => {
                tracing::trace!(target: LOG_TARGET, phase, %endpoint, %fields)
            }
        }
    }
}

/// Build and emit an event at the phase's default level.
pub(crate) fn emit(sink: &dyn Diagnostics, phase: Phase, endpoint: &Endpoint, fields: &[Field<'_>]) {
    let level = phase.level();
    if !sink.enabled(level) {
        return;
    }
    sink.emit(&DiagnosticEvent {
        phase,
        level,
        endpoint,
        fields,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_renders_phase_endpoint_and_fields() {
        let endpoint = Endpoint::new("logs.example.com", 6514);
        let bytes = 42usize;
        let event = DiagnosticEvent {
            phase: Phase::Sending,
            level: Level::Debug,
            endpoint: &endpoint,
            fields: &[("bytes", &bytes), ("tls", &true)],
        };
        assert_eq!(
            event.to_string(),
            "sending logs.example.com:6514 bytes=42 tls=true"
        );
        assert_eq!(event.field("bytes").as_deref(), Some("42"));
        assert_eq!(event.field("missing"), None);
    }

    #[test]
    fn retry_and_exhaustion_are_not_debug_noise() {
        assert_eq!(Phase::Retrying.level(), Level::Warn);
        assert_eq!(Phase::Exhausted.level(), Level::Error);
        assert_eq!(Phase::Sent.level(), Level::Debug);
    }
}
