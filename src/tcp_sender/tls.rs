//! TLS connector construction and deadline-bounded handshakes.

use std::{fs, net::TcpStream, time::Duration};

use native_tls::{Certificate, HandshakeError, MidHandshakeTlsStream, TlsConnector, TlsStream};

use crate::{
    clock::{Clock, Deadline},
    error::TransportError,
};

use super::config::{Endpoint, TlsOptions, TlsVerifyMode};

/// Build a connector honouring the protocol pin, CA bundle and verify mode.
pub(crate) fn build_connector(
    options: &TlsOptions,
    endpoint: &Endpoint,
) -> Result<TlsConnector, TransportError> {
    let setup_err = |reason: String| TransportError::TlsSetup {
        endpoint: endpoint.clone(),
        reason,
    };

    let mut builder = TlsConnector::builder();
    if let Some(protocol) = options.protocol {
        builder.min_protocol_version(Some(protocol.to_native()));
        builder.max_protocol_version(Some(protocol.to_native()));
    }
    if let Some(path) = &options.ca_file {
        let pem = fs::read(path)
            .map_err(|err| setup_err(format!("cannot read {}: {err}", path.display())))?;
        let cert = Certificate::from_pem(&pem)
            .map_err(|err| setup_err(format!("bad certificate in {}: {err}", path.display())))?;
        builder.add_root_certificate(cert);
    }
    if options.verify_mode == TlsVerifyMode::None {
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
    }
    builder.build().map_err(|err| setup_err(err.to_string()))
}

/// Run the handshake over `stream`, presenting the endpoint host as SNI.
///
/// The whole handshake shares one deadline: each stalled read or write
/// resumes with whatever budget remains.
pub(crate) fn handshake(
    connector: &TlsConnector,
    stream: TcpStream,
    endpoint: &Endpoint,
    timeout: Option<Duration>,
    clock: &dyn Clock,
) -> Result<TlsStream<TcpStream>, TransportError> {
    let deadline = Deadline::after(clock.now(), timeout);
    set_timeouts(&stream, timeout).map_err(|err| TransportError::io(endpoint, err))?;

    let mut result = connector.connect(&endpoint.host, stream);
    loop {
        match result {
            Ok(tls) => {
                set_timeouts(tls.get_ref(), None)
                    .map_err(|err| TransportError::io(endpoint, err))?;
                return Ok(tls);
            }
            Err(HandshakeError::Failure(err)) => return Err(classify_failure(endpoint, err)),
            Err(HandshakeError::WouldBlock(mid)) => {
                result = resume(mid, endpoint, &deadline, clock)?;
            }
        }
    }
}

type HandshakeResult = Result<TlsStream<TcpStream>, HandshakeError<TcpStream>>;

fn resume(
    mid: MidHandshakeTlsStream<TcpStream>,
    endpoint: &Endpoint,
    deadline: &Deadline,
    clock: &dyn Clock,
) -> Result<HandshakeResult, TransportError> {
    let remaining = deadline.remaining(clock.now());
    if remaining.is_some_and(|r| r.is_zero()) || !deadline.is_bounded() {
        // Blocking sockets only report WouldBlock when a timeout fired.
        return Err(TransportError::TlsTimeout {
            endpoint: endpoint.clone(),
        });
    }
    set_timeouts(mid.get_ref(), remaining).map_err(|err| TransportError::io(endpoint, err))?;
    Ok(mid.handshake())
}

fn set_timeouts(stream: &TcpStream, timeout: Option<Duration>) -> std::io::Result<()> {
    // A zero socket timeout is rejected by the OS.
    let timeout = timeout.map(|t| t.max(Duration::from_millis(1)));
    stream.set_read_timeout(timeout)?;
    stream.set_write_timeout(timeout)
}

fn classify_failure(endpoint: &Endpoint, err: native_tls::Error) -> TransportError {
    if is_verification_failure(&err) {
        TransportError::CertificateVerification {
            endpoint: endpoint.clone(),
            source: err,
        }
    } else {
        TransportError::TlsHandshake {
            endpoint: endpoint.clone(),
            source: err,
        }
    }
}

/// `native-tls` does not expose a verification error kind, so the message
/// decides. Only phrases describing our own check of the peer certificate
/// count; alerts such as "certificate required" or "bad certificate" are the
/// server rejecting us and stay handshake failures.
fn is_verification_failure(err: &native_tls::Error) -> bool {
    is_verification_message(&err.to_string())
}

const VERIFICATION_PHRASES: &[&str] = &[
    // OpenSSL
    "certificate verify failed",
    "hostname mismatch",
    // Security.framework
    "not trusted",
    // SChannel
    "issued by an authority that is not trusted",
    "principal name is incorrect",
];

fn is_verification_message(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    VERIFICATION_PHRASES
        .iter()
        .any(|phrase| message.contains(phrase))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(
        "error:0A000086:SSL routines:tls_post_process_server_certificate:certificate verify failed",
        true
    )]
    #[case("certificate verify failed: hostname mismatch", true)]
    #[case("The certificate was not trusted.", true)]
    #[case("The target principal name is incorrect.", true)]
    #[case("error:0A00045C:SSL routines::tlsv13 alert certificate required", false)]
    #[case("error:0A000412:SSL routines::sslv3 alert bad certificate", false)]
    #[case("unexpected EOF while reading", false)]
    fn only_peer_verification_messages_are_classified(
        #[case] message: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(is_verification_message(message), expected);
    }

    #[test]
    fn missing_ca_bundle_is_a_setup_error() {
        let options = TlsOptions {
            ca_file: Some(PathBuf::from("/nonexistent/ca.pem")),
            ..TlsOptions::default()
        };
        let err = build_connector(&options, &Endpoint::new("localhost", 6514))
            .expect_err("missing bundle must fail");
        assert!(matches!(err, TransportError::TlsSetup { ref reason, .. } if reason.contains("cannot read")));
    }

    #[test]
    fn garbage_ca_bundle_is_a_setup_error() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        std::fs::write(file.path(), b"not a certificate").expect("write bundle");
        let options = TlsOptions {
            ca_file: Some(file.path().to_path_buf()),
            ..TlsOptions::default()
        };
        let err = build_connector(&options, &Endpoint::new("localhost", 6514))
            .expect_err("garbage bundle must fail");
        assert!(matches!(err, TransportError::TlsSetup { .. }));
    }
}
