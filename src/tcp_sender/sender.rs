//! Public TCP/TLS sender exported by the crate.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    clock::{Clock, MonotonicClock},
    diagnostics::{self, Diagnostics, LogDiagnostics, Phase},
    error::TransportError,
    rate_limited_warner::RateLimitedWarner,
    sender::SyslogSender,
};

use super::{
    config::{Endpoint, TransportConfig},
    connection::ConnectionManager,
    retry::{RetryPolicy, RetryState},
    writer::{self, Delivery},
};

/// Delivers newline-terminated records over one persistent TCP or TLS
/// connection, reconnecting and retrying on failure.
///
/// Connecting and writing share a single lock, so concurrent callers are
/// serialised and records from one sender reach the socket in lock order.
pub struct TcpSyslogSender {
    config: Arc<TransportConfig>,
    manager: Mutex<ConnectionManager>,
    diag: Arc<dyn Diagnostics>,
    clock: Arc<dyn Clock>,
    truncations: RateLimitedWarner,
}

impl TcpSyslogSender {
    /// Sender reporting through [`LogDiagnostics`]. Does not connect.
    pub fn new(config: TransportConfig) -> Self {
        Self::with_parts(config, Arc::new(LogDiagnostics), Arc::new(MonotonicClock))
    }

    /// Sender with an explicit diagnostics sink and clock.
    pub fn with_parts(
        config: TransportConfig,
        diag: Arc<dyn Diagnostics>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = Arc::new(config);
        let manager = ConnectionManager::new(config.clone(), diag.clone(), clock.clone());
        Self {
            config,
            manager: Mutex::new(manager),
            diag,
            clock,
            truncations: RateLimitedWarner::default(),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.config.endpoint
    }

    /// Establish a fresh connection now, replacing any existing one.
    pub fn connect(&self) -> Result<(), TransportError> {
        self.manager.lock().connect()
    }

    pub fn is_connected(&self) -> bool {
        self.manager.lock().is_usable()
    }

    /// Deliver `payload` followed by a newline.
    ///
    /// Connects first when no connection is open. Any failure closes the
    /// connection, sleeps for the retry interval, reconnects and resends the
    /// whole record; once `retry_limit` retries are spent the last failure is
    /// returned wrapped in [`TransportError::RetriesExhausted`].
    ///
    /// A [`Delivery::Truncated`] result means the io timeout expired with
    /// `raise_on_timeout` disabled. The partial frame already on the wire
    /// would run into the next record, so the connection is closed and the
    /// next send starts on a fresh one.
    pub fn send(&self, payload: &[u8]) -> Result<Delivery, TransportError> {
        let mut manager = self.manager.lock();
        let mut retry = RetryState::new(RetryPolicy::from(self.config.as_ref()));
        let mut reconnect = false;
        loop {
            let err = match self.attempt(&mut manager, payload, reconnect) {
                Ok(delivery) => {
                    if let Delivery::Truncated { unsent, .. } = delivery {
                        manager.close();
                        self.report_truncation(unsent);
                    }
                    return Ok(delivery);
                }
                Err(err) => err,
            };
            manager.close();

            let Some(sleep) = retry.next_sleep() else {
                diagnostics::emit(
                    self.diag.as_ref(),
                    Phase::Exhausted,
                    self.endpoint(),
                    &[("attempts", &retry.attempts()), ("error", &err)],
                );
                return Err(TransportError::RetriesExhausted {
                    endpoint: self.config.endpoint.clone(),
                    tls: self.config.uses_tls(),
                    attempts: retry.attempts(),
                    source: Box::new(err),
                });
            };

            let sleep_ms = sleep.as_millis();
            diagnostics::emit(
                self.diag.as_ref(),
                Phase::Retrying,
                self.endpoint(),
                &[
                    ("attempt", &retry.attempts()),
                    ("sleep_ms", &sleep_ms),
                    ("error", &err),
                ],
            );
            self.clock.sleep(sleep);
            reconnect = true;
        }
    }

    fn attempt(
        &self,
        manager: &mut ConnectionManager,
        payload: &[u8],
        reconnect: bool,
    ) -> Result<Delivery, TransportError> {
        if reconnect || !manager.is_usable() {
            manager.connect()?;
        }
        writer::send_msg(
            manager,
            &self.config,
            payload,
            self.clock.as_ref(),
            self.diag.as_ref(),
        )
    }

    fn report_truncation(&self, unsent: usize) {
        self.truncations.record_drop();
        self.truncations.warn_if_due(|count| {
            diagnostics::emit(
                self.diag.as_ref(),
                Phase::Truncated,
                self.endpoint(),
                &[("unsent", &unsent), ("truncated_records", &count)],
            );
        });
    }

    /// Release the connection. A no-op when none is open.
    pub fn close(&self) {
        self.manager.lock().close();
        self.truncations.flush(|count| {
            diagnostics::emit(
                self.diag.as_ref(),
                Phase::Truncated,
                self.endpoint(),
                &[("truncated_records", &count)],
            );
        });
    }
}

impl SyslogSender for TcpSyslogSender {
    fn send(&self, payload: &[u8]) -> Result<Delivery, TransportError> {
        TcpSyslogSender::send(self, payload)
    }

    fn close(&self) {
        TcpSyslogSender::close(self);
    }
}

impl std::fmt::Debug for TcpSyslogSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpSyslogSender")
            .field("endpoint", &self.config.endpoint)
            .field("tls", &self.config.uses_tls())
            .finish()
    }
}
