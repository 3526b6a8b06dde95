//! Builder for [`TcpSyslogSender`](crate::TcpSyslogSender).
//!
//! Exposes endpoint selection, timeout tuning, TLS configuration, keepalive
//! settings and the retry policy. Validation happens once in
//! [`TcpSenderBuilder::build`]; the resulting configuration is immutable.

use std::{path::PathBuf, sync::Arc, time::Duration};

use crate::{
    clock::{Clock, MonotonicClock},
    diagnostics::{Diagnostics, LogDiagnostics},
    error::ConfigError,
    tcp_sender::{
        Endpoint, KeepaliveOptions, TcpSyslogSender, TlsOptions, TlsProtocol, TlsVerifyMode,
        TransportConfig,
    },
};

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value.is_zero() {
            Err(ConfigError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

trait IsZero {
    fn is_zero(&self) -> bool;
}

impl IsZero for Duration {
    fn is_zero(&self) -> bool {
        Duration::is_zero(self)
    }
}

impl IsZero for u32 {
    fn is_zero(&self) -> bool {
        *self == 0
    }
}

impl IsZero for u16 {
    fn is_zero(&self) -> bool {
        *self == 0
    }
}

#[derive(Clone, Debug, Default)]
struct TlsConfig {
    protocol: Option<TlsProtocol>,
    ca_file: Option<PathBuf>,
    verify_mode: TlsVerifyMode,
}

/// Builder for constructing [`TcpSyslogSender`] instances.
#[derive(Clone, Default)]
pub struct TcpSenderBuilder {
    host: Option<String>,
    port: Option<u16>,
    tls: Option<TlsConfig>,
    connect_timeout: Option<Option<Duration>>,
    io_timeout: Option<Duration>,
    retry_limit: Option<u32>,
    retry_interval: Option<Duration>,
    exponential_backoff: bool,
    raise_on_timeout: bool,
    keepalive: bool,
    keepalive_idle: Option<Duration>,
    keepalive_count: Option<u32>,
    keepalive_interval: Option<Duration>,
    user_timeout: Option<Duration>,
    diagnostics: Option<Arc<dyn Diagnostics>>,
    clock: Option<Arc<dyn Clock>>,
}

impl TcpSenderBuilder {
    /// Create a new builder with no endpoint configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a builder from an existing configuration, e.g. one loaded by
    /// [`load_transport_config`](crate::file_config::load_transport_config).
    pub fn from_config(config: TransportConfig) -> Self {
        let keepalive_enabled = config.keepalive.is_some();
        let keepalive = config.keepalive.unwrap_or_default();
        let tls = config.tls.map(|tls| TlsConfig {
            protocol: tls.protocol,
            ca_file: tls.ca_file,
            verify_mode: tls.verify_mode,
        });
        Self {
            host: Some(config.endpoint.host),
            port: Some(config.endpoint.port),
            keepalive: keepalive_enabled,
            tls,
            connect_timeout: Some(config.connect_timeout),
            io_timeout: config.io_timeout,
            retry_limit: Some(config.retry_limit),
            retry_interval: Some(config.retry_interval),
            exponential_backoff: config.exponential_backoff,
            raise_on_timeout: config.raise_on_timeout,
            keepalive_idle: keepalive.idle,
            keepalive_count: keepalive.count,
            keepalive_interval: keepalive.interval,
            user_timeout: config.user_timeout,
            diagnostics: None,
            clock: None,
        }
    }

    /// Target `host:port`.
    pub fn with_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = Some(host.into());
        self.port = Some(port);
        self
    }

    /// Wrap the connection in TLS using the platform trust store.
    pub fn with_tls(mut self) -> Self {
        self.tls.get_or_insert_with(TlsConfig::default);
        self
    }

    /// Pin the TLS protocol version. Enables TLS.
    pub fn with_tls_protocol(mut self, protocol: TlsProtocol) -> Self {
        self.tls.get_or_insert_with(TlsConfig::default).protocol = Some(protocol);
        self
    }

    /// Trust the certificates in a PEM bundle. Enables TLS.
    pub fn with_ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.tls.get_or_insert_with(TlsConfig::default).ca_file = Some(path.into());
        self
    }

    /// Choose how strictly the peer certificate is checked. Enables TLS.
    pub fn with_verify_mode(mut self, mode: TlsVerifyMode) -> Self {
        self.tls.get_or_insert_with(TlsConfig::default).verify_mode = mode;
        self
    }

    /// Bound connect plus handshake; `None` blocks indefinitely.
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    option_setter!(
        #[doc = "Bound each write cycle, switching writes to deadline mode."]
        with_io_timeout,
        io_timeout,
        Duration
    );
    option_setter!(with_retry_limit, retry_limit, u32);
    option_setter!(with_retry_interval, retry_interval, Duration);
    option_setter!(with_user_timeout, user_timeout, Duration);

    /// Double the retry interval after every retry.
    pub fn with_exponential_backoff(mut self, enabled: bool) -> Self {
        self.exponential_backoff = enabled;
        self
    }

    /// Raise `WriteTimeout` instead of truncating when the io timeout expires.
    pub fn with_raise_on_timeout(mut self, enabled: bool) -> Self {
        self.raise_on_timeout = enabled;
        self
    }

    /// Enable TCP keepalive with the OS default tunables.
    pub fn with_keepalive(mut self, enabled: bool) -> Self {
        self.keepalive = enabled;
        self
    }

    /// Keepalive tunables; setting any of them enables keepalive.
    pub fn with_keepalive_idle(mut self, idle: Duration) -> Self {
        self.keepalive = true;
        self.keepalive_idle = Some(idle);
        self
    }

    pub fn with_keepalive_count(mut self, count: u32) -> Self {
        self.keepalive = true;
        self.keepalive_count = Some(count);
        self
    }

    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive = true;
        self.keepalive_interval = Some(interval);
        self
    }

    /// Route lifecycle events to `sink` instead of the `log` facade.
    pub fn with_diagnostics(mut self, sink: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    /// Replace the monotonic clock used for deadlines and retry sleeps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_endpoint()?;
        self.validate_timeouts()?;
        self.validate_keepalive()?;
        Ok(())
    }

    fn validate_endpoint(&self) -> Result<(), ConfigError> {
        match &self.host {
            None => Err(ConfigError::InvalidConfig(
                "sender requires an endpoint".into(),
            )),
            Some(host) if host.trim().is_empty() => Err(ConfigError::InvalidConfig(
                "host must not be empty".into(),
            )),
            Some(_) => {
                if let Some(port) = self.port {
                    ensure_positive!(port, "port")?;
                }
                Ok(())
            }
        }
    }

    fn validate_timeouts(&self) -> Result<(), ConfigError> {
        if let Some(Some(timeout)) = self.connect_timeout {
            ensure_positive!(timeout, "connect_timeout")?;
        }
        if let Some(timeout) = self.io_timeout {
            ensure_positive!(timeout, "io_timeout")?;
        }
        if let Some(timeout) = self.user_timeout {
            ensure_positive!(timeout, "user_timeout")?;
        }
        Ok(())
    }

    fn validate_keepalive(&self) -> Result<(), ConfigError> {
        if let Some(idle) = self.keepalive_idle {
            ensure_positive!(idle, "keepalive_idle")?;
        }
        if let Some(count) = self.keepalive_count {
            ensure_positive!(count, "keepalive_count")?;
        }
        if let Some(interval) = self.keepalive_interval {
            ensure_positive!(interval, "keepalive_interval")?;
        }
        Ok(())
    }

    /// Validate and produce the immutable configuration.
    pub fn build_config(&self) -> Result<TransportConfig, ConfigError> {
        self.validate()?;
        let host = self.host.clone().unwrap_or_default();
        let port = self.port.unwrap_or(crate::tcp_sender::DEFAULT_PORT);
        let mut config = TransportConfig::new(Endpoint::new(host, port));
        self.apply_optional_fields(&mut config);
        config.tls = self.tls.as_ref().map(|tls| TlsOptions {
            protocol: tls.protocol,
            ca_file: tls.ca_file.clone(),
            verify_mode: tls.verify_mode,
        });
        if self.keepalive {
            config.keepalive = Some(KeepaliveOptions {
                idle: self.keepalive_idle,
                count: self.keepalive_count,
                interval: self.keepalive_interval,
            });
        }
        Ok(config)
    }

    fn apply_optional_fields(&self, config: &mut TransportConfig) {
        if let Some(timeout) = self.connect_timeout {
            config.connect_timeout = timeout;
        }
        if let Some(limit) = self.retry_limit {
            config.retry_limit = limit;
        }
        if let Some(interval) = self.retry_interval {
            config.retry_interval = interval;
        }
        config.io_timeout = self.io_timeout;
        config.user_timeout = self.user_timeout;
        config.exponential_backoff = self.exponential_backoff;
        config.raise_on_timeout = self.raise_on_timeout;
    }

    /// Validate the settings and construct the sender. Does not connect.
    pub fn build(&self) -> Result<TcpSyslogSender, ConfigError> {
        let config = self.build_config()?;
        let diag = self
            .diagnostics
            .clone()
            .unwrap_or_else(|| Arc::new(LogDiagnostics));
        let clock = self
            .clock
            .clone()
            .unwrap_or_else(|| Arc::new(MonotonicClock));
        Ok(TcpSyslogSender::with_parts(config, diag, clock))
    }
}

impl std::fmt::Debug for TcpSenderBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpSenderBuilder")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("connect_timeout", &self.connect_timeout)
            .field("io_timeout", &self.io_timeout)
            .field("retry_limit", &self.retry_limit)
            .field("retry_interval", &self.retry_interval)
            .field("exponential_backoff", &self.exponential_backoff)
            .field("raise_on_timeout", &self.raise_on_timeout)
            .field("keepalive", &self.keepalive)
            .finish_non_exhaustive()
    }
}
