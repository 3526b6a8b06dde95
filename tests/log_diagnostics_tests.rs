//! The default sink reports through the `log` facade.

use std::{net::TcpListener, sync::Once, time::Duration};

use log::Level;
use logtest::Logger;
use rstest::rstest;
use serial_test::serial;
use syslog_transport::{diagnostics::LOG_TARGET, TcpSenderBuilder};

/// `log::set_logger` may only succeed once per process, so install the
/// capture logger once and drain records left over from earlier tests.
fn capture_logs() -> Logger {
    static START: Once = Once::new();
    START.call_once(|| drop(Logger::start()));
    let mut logger = Logger;
    while logger.pop().is_some() {}
    logger
}

fn unused_port() -> u16 {
    TcpListener::bind(("127.0.0.1", 0))
        .and_then(|l| l.local_addr())
        .expect("reserve port")
        .port()
}

#[rstest]
#[serial]
fn retries_and_exhaustion_are_logged() {
    let mut logger = capture_logs();
    let port = unused_port();
    let sender = TcpSenderBuilder::new()
        .with_endpoint("127.0.0.1", port)
        .with_retry_limit(1)
        .with_retry_interval(Duration::from_millis(1))
        .build()
        .expect("build sender");

    sender.send(b"dropped").expect_err("nothing listens");

    let records: Vec<_> = std::iter::from_fn(|| logger.pop())
        .filter(|r| r.target() == LOG_TARGET)
        .collect();
    let retry = records
        .iter()
        .find(|r| r.args().starts_with("retrying"))
        .expect("retry logged");
    assert_eq!(retry.level(), Level::Warn);
    assert!(retry.args().contains(&format!("127.0.0.1:{port}")));
    assert!(retry.args().contains("sleep_ms=1"));

    let exhausted = records
        .iter()
        .find(|r| r.args().starts_with("exhausted"))
        .expect("exhaustion logged");
    assert_eq!(exhausted.level(), Level::Error);
    assert!(exhausted.args().contains("attempts=1"));
}

#[rstest]
#[serial]
fn connection_lifecycle_is_logged_at_debug() {
    let mut logger = capture_logs();
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind listener");
    let port = listener.local_addr().unwrap().port();
    let sender = TcpSenderBuilder::new()
        .with_endpoint("127.0.0.1", port)
        .build()
        .expect("build sender");

    sender.connect().expect("connect");
    sender.close();
    drop(listener);

    let phases: Vec<String> = std::iter::from_fn(|| logger.pop())
        .filter(|r| r.target() == LOG_TARGET)
        .inspect(|r| assert_eq!(r.level(), Level::Debug))
        .filter_map(|r| r.args().split(' ').next().map(str::to_owned))
        .collect();
    assert_eq!(phases, ["connecting", "connected", "closed"]);
}
