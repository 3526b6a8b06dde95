//! INI configuration loader.
//!
//! Reads one section of an INI file with `rust-ini` and turns it into a
//! [`TransportConfig`]. Durations are given in (possibly fractional) seconds;
//! a negative `connect_timeout` or `io_timeout` selects blocking mode.
//!
//! ```ini
//! [syslog]
//! host = logs.example.com
//! port = 6514
//! tls = true
//! verify_mode = peer
//! io_timeout = 1.5
//! retry_limit = 5
//! exponential_backoff = true
//! ```

use std::{fs, path::Path, str::FromStr, time::Duration};

use ini::{Ini, Properties};

use crate::{
    builder::TcpSenderBuilder,
    error::ConfigError,
    tcp_sender::{TlsProtocol, TlsVerifyMode, TransportConfig},
};

const KNOWN_KEYS: &[&str] = &[
    "host",
    "port",
    "tls",
    "tls_protocol",
    "ca_file",
    "verify_mode",
    "connect_timeout",
    "io_timeout",
    "retry_limit",
    "retry_interval",
    "exponential_backoff",
    "raise_on_timeout",
    "keepalive",
    "keepalive_idle",
    "keepalive_count",
    "keepalive_interval",
    "user_timeout",
];

/// Load and validate the `[section]` of the INI file at `path`.
pub fn load_transport_config(
    path: impl AsRef<Path>,
    section: &str,
) -> Result<TransportConfig, ConfigError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let ini = Ini::load_from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    parse_section(&ini, section)
}

/// Parse an already loaded INI document.
pub fn parse_section(ini: &Ini, section: &str) -> Result<TransportConfig, ConfigError> {
    let props = ini
        .section(Some(section))
        .ok_or_else(|| ConfigError::MissingSection(section.to_owned()))?;
    reject_unknown_keys(props)?;
    builder_from_properties(props)?.build_config()
}

fn reject_unknown_keys(props: &Properties) -> Result<(), ConfigError> {
    match props.iter().find(|(key, _)| !KNOWN_KEYS.contains(key)) {
        Some((key, _)) => Err(ConfigError::InvalidConfig(format!("unknown key {key}"))),
        None => Ok(()),
    }
}

fn builder_from_properties(props: &Properties) -> Result<TcpSenderBuilder, ConfigError> {
    let host = props
        .get("host")
        .ok_or_else(|| ConfigError::InvalidConfig("host is required".into()))?;
    let port = parse::<u16>(props, "port")?.unwrap_or(crate::tcp_sender::DEFAULT_PORT);
    let mut builder = TcpSenderBuilder::new().with_endpoint(host, port);

    if parse_bool(props, "tls")?.unwrap_or(false) {
        builder = builder.with_tls();
    }
    if let Some(protocol) = get(props, "tls_protocol") {
        builder = builder.with_tls_protocol(parse_protocol(protocol)?);
    }
    if let Some(ca_file) = get(props, "ca_file") {
        builder = builder.with_ca_file(ca_file);
    }
    if let Some(mode) = get(props, "verify_mode") {
        builder = builder.with_verify_mode(parse_verify_mode(mode)?);
    }
    if let Some(timeout) = parse_timeout(props, "connect_timeout")? {
        builder = builder.with_connect_timeout(timeout);
    }
    if let Some(Some(timeout)) = parse_timeout(props, "io_timeout")? {
        builder = builder.with_io_timeout(timeout);
    }
    if let Some(limit) = parse::<u32>(props, "retry_limit")? {
        builder = builder.with_retry_limit(limit);
    }
    if let Some(interval) = parse_seconds(props, "retry_interval")? {
        builder = builder.with_retry_interval(interval);
    }
    if let Some(enabled) = parse_bool(props, "exponential_backoff")? {
        builder = builder.with_exponential_backoff(enabled);
    }
    if let Some(enabled) = parse_bool(props, "raise_on_timeout")? {
        builder = builder.with_raise_on_timeout(enabled);
    }
    if let Some(enabled) = parse_bool(props, "keepalive")? {
        builder = builder.with_keepalive(enabled);
    }
    if let Some(idle) = parse_seconds(props, "keepalive_idle")? {
        builder = builder.with_keepalive_idle(idle);
    }
    if let Some(count) = parse::<u32>(props, "keepalive_count")? {
        builder = builder.with_keepalive_count(count);
    }
    if let Some(interval) = parse_seconds(props, "keepalive_interval")? {
        builder = builder.with_keepalive_interval(interval);
    }
    if let Some(timeout) = parse_seconds(props, "user_timeout")? {
        builder = builder.with_user_timeout(timeout);
    }
    Ok(builder)
}

fn get<'a>(props: &'a Properties, key: &str) -> Option<&'a str> {
    props.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_owned(),
        value: value.to_owned(),
    }
}

fn parse<T: FromStr>(props: &Properties, key: &str) -> Result<Option<T>, ConfigError> {
    get(props, key)
        .map(|value| value.parse::<T>().map_err(|_| invalid(key, value)))
        .transpose()
}

fn parse_bool(props: &Properties, key: &str) -> Result<Option<bool>, ConfigError> {
    get(props, key)
        .map(|value| match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(invalid(key, value)),
        })
        .transpose()
}

/// Non-negative seconds.
fn parse_seconds(props: &Properties, key: &str) -> Result<Option<Duration>, ConfigError> {
    parse_timeout(props, key)?
        .map(|timeout| {
            timeout.ok_or_else(|| invalid(key, get(props, key).unwrap_or_default()))
        })
        .transpose()
}

/// Seconds where a negative value means "no timeout".
fn parse_timeout(
    props: &Properties,
    key: &str,
) -> Result<Option<Option<Duration>>, ConfigError> {
    let Some(secs) = parse::<f64>(props, key)? else {
        return Ok(None);
    };
    if secs < 0.0 {
        return Ok(Some(None));
    }
    Duration::try_from_secs_f64(secs)
        .map(|timeout| Some(Some(timeout)))
        .map_err(|_| invalid(key, get(props, key).unwrap_or_default()))
}

fn parse_protocol(value: &str) -> Result<TlsProtocol, ConfigError> {
    match value.to_ascii_lowercase().replace(['.', '_'], "").as_str() {
        "tlsv1" | "tlsv10" | "tls10" => Ok(TlsProtocol::Tls10),
        "tlsv11" | "tls11" => Ok(TlsProtocol::Tls11),
        "tlsv12" | "tls12" => Ok(TlsProtocol::Tls12),
        _ => Err(invalid("tls_protocol", value)),
    }
}

fn parse_verify_mode(value: &str) -> Result<TlsVerifyMode, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "none" => Ok(TlsVerifyMode::None),
        "peer" | "require" => Ok(TlsVerifyMode::Peer),
        _ => Err(invalid("verify_mode", value)),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn parse_text(text: &str) -> Result<TransportConfig, ConfigError> {
        let ini = Ini::load_from_str(text).expect("valid ini");
        parse_section(&ini, "syslog")
    }

    #[rstest]
    fn minimal_section_uses_defaults() {
        let config = parse_text("[syslog]\nhost = collector\n").expect("valid config");
        assert_eq!(config.endpoint.host, "collector");
        assert_eq!(config.endpoint.port, 514);
        assert_eq!(config.retry_limit, 3);
        assert!(config.tls.is_none());
    }

    #[rstest]
    #[case("tlsv1_2", TlsProtocol::Tls12)]
    #[case("TLSv1.1", TlsProtocol::Tls11)]
    #[case("tls10", TlsProtocol::Tls10)]
    fn protocol_spellings(#[case] raw: &str, #[case] expected: TlsProtocol) {
        assert_eq!(parse_protocol(raw).expect("known protocol"), expected);
    }

    #[rstest]
    fn negative_timeouts_select_blocking_mode() {
        let config = parse_text("[syslog]\nhost = c\nconnect_timeout = -1\nio_timeout = -1\n")
            .expect("valid config");
        assert_eq!(config.connect_timeout, None);
        assert_eq!(config.io_timeout, None);
    }

    #[rstest]
    fn fractional_seconds_are_honoured() {
        let config = parse_text("[syslog]\nhost = c\nio_timeout = 1.5\nretry_interval = 0.1\n")
            .expect("valid config");
        assert_eq!(config.io_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.retry_interval, Duration::from_millis(100));
    }

    #[rstest]
    #[case("[syslog]\nhost = c\nport = nope\n", "port")]
    #[case("[syslog]\nhost = c\ntls = maybe\n", "tls")]
    #[case("[syslog]\nhost = c\nretry_interval = -2\n", "retry_interval")]
    #[case("[syslog]\nhost = c\nverify_mode = strict\n", "verify_mode")]
    fn bad_values_name_the_key(#[case] text: &str, #[case] key: &str) {
        let err = parse_text(text).expect_err("invalid value must fail");
        assert!(matches!(err, ConfigError::InvalidValue { key: ref k, .. } if k == key));
    }

    #[rstest]
    fn unknown_keys_are_rejected() {
        let err = parse_text("[syslog]\nhost = c\npacket_size = 1024\n")
            .expect_err("unknown key must fail");
        assert!(matches!(err, ConfigError::InvalidConfig(msg) if msg.contains("packet_size")));
    }

    #[rstest]
    fn missing_section_is_reported() {
        let err = parse_text("[other]\nhost = c\n").expect_err("section must exist");
        assert!(matches!(err, ConfigError::MissingSection(name) if name == "syslog"));
    }
}
