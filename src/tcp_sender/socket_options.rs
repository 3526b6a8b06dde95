//! Keepalive and user-timeout tuning for freshly connected sockets.
//!
//! Which tunables exist depends on the target OS. Unsupported tunables are
//! skipped with a diagnostic instead of failing the connect.

use std::{io, net::TcpStream, time::Duration};

use socket2::{SockRef, TcpKeepalive};

use crate::diagnostics::{self, Diagnostics, Phase};

use super::config::{Endpoint, KeepaliveOptions};

/// Socket tunables available on the compilation target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SocketCapabilities {
    pub user_timeout: bool,
    pub keepalive_interval: bool,
    pub keepalive_count: bool,
}

impl SocketCapabilities {
    pub const fn detect() -> Self {
        Self {
            user_timeout: cfg!(any(
                target_os = "android",
                target_os = "fuchsia",
                target_os = "linux"
            )),
            keepalive_interval: cfg!(any(
                target_os = "android",
                target_os = "dragonfly",
                target_os = "freebsd",
                target_os = "fuchsia",
                target_os = "illumos",
                target_os = "ios",
                target_os = "linux",
                target_os = "macos",
                target_os = "netbsd",
                target_os = "windows",
            )),
            keepalive_count: cfg!(any(
                target_os = "android",
                target_os = "dragonfly",
                target_os = "freebsd",
                target_os = "fuchsia",
                target_os = "illumos",
                target_os = "ios",
                target_os = "linux",
                target_os = "macos",
                target_os = "netbsd",
            )),
        }
    }
}

/// Apply the user timeout and keepalive settings to `stream`.
///
/// Only enabling keepalive itself is fatal; individual tunables are
/// best-effort.
pub(crate) fn apply(
    stream: &TcpStream,
    endpoint: &Endpoint,
    user_timeout: Option<Duration>,
    keepalive: Option<&KeepaliveOptions>,
    diag: &dyn Diagnostics,
) -> io::Result<()> {
    let sock = SockRef::from(stream);
    let caps = SocketCapabilities::detect();

    if let Some(timeout) = user_timeout {
        best_effort(endpoint, diag, "user_timeout", caps.user_timeout, || {
            set_user_timeout(&sock, timeout)
        });
    }

    let Some(keepalive) = keepalive else {
        return Ok(());
    };
    sock.set_keepalive(true)?;

    if let Some(idle) = keepalive.idle {
        best_effort(endpoint, diag, "keepalive_idle", true, || {
            sock.set_tcp_keepalive(&TcpKeepalive::new().with_time(idle))
        });
    }
    if let Some(interval) = keepalive.interval {
        best_effort(
            endpoint,
            diag,
            "keepalive_interval",
            caps.keepalive_interval,
            || set_keepalive_interval(&sock, interval),
        );
    }
    if let Some(count) = keepalive.count {
        best_effort(
            endpoint,
            diag,
            "keepalive_count",
            caps.keepalive_count,
            || set_keepalive_count(&sock, count),
        );
    }
    Ok(())
}

fn best_effort(
    endpoint: &Endpoint,
    diag: &dyn Diagnostics,
    option: &'static str,
    supported: bool,
    set: impl FnOnce() -> io::Result<()>,
) {
    if !supported {
        diagnostics::emit(
            diag,
            Phase::SocketOption,
            endpoint,
            &[("option", &option), ("status", &"unsupported")],
        );
        return;
    }
    if let Err(err) = set() {
        diagnostics::emit(
            diag,
            Phase::SocketOption,
            endpoint,
            &[("option", &option), ("error", &err)],
        );
    }
}

#[cfg(any(target_os = "android", target_os = "fuchsia", target_os = "linux"))]
fn set_user_timeout(sock: &SockRef<'_>, timeout: Duration) -> io::Result<()> {
    sock.set_tcp_user_timeout(Some(timeout))
}

#[cfg(not(any(target_os = "android", target_os = "fuchsia", target_os = "linux")))]
fn set_user_timeout(_sock: &SockRef<'_>, _timeout: Duration) -> io::Result<()> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}

#[cfg(any(
    target_os = "android",
    target_os = "dragonfly",
    target_os = "freebsd",
    target_os = "fuchsia",
    target_os = "illumos",
    target_os = "ios",
    target_os = "linux",
    target_os = "macos",
    target_os = "netbsd",
    target_os = "windows",
))]
fn set_keepalive_interval(sock: &SockRef<'_>, interval: Duration) -> io::Result<()> {
    sock.set_tcp_keepalive(&TcpKeepalive::new().with_interval(interval))
}

#[cfg(not(any(
    target_os = "android",
    target_os = "dragonfly",
    target_os = "freebsd",
    target_os = "fuchsia",
    target_os = "illumos",
    target_os = "ios",
    target_os = "linux",
    target_os = "macos",
    target_os = "netbsd",
    target_os = "windows",
)))]
fn set_keepalive_interval(_sock: &SockRef<'_>, _interval: Duration) -> io::Result<()> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}

#[cfg(any(
    target_os = "android",
    target_os = "dragonfly",
    target_os = "freebsd",
    target_os = "fuchsia",
    target_os = "illumos",
    target_os = "ios",
    target_os = "linux",
    target_os = "macos",
    target_os = "netbsd",
))]
fn set_keepalive_count(sock: &SockRef<'_>, count: u32) -> io::Result<()> {
    sock.set_tcp_keepalive(&TcpKeepalive::new().with_retries(count))
}

#[cfg(not(any(
    target_os = "android",
    target_os = "dragonfly",
    target_os = "freebsd",
    target_os = "fuchsia",
    target_os = "illumos",
    target_os = "ios",
    target_os = "linux",
    target_os = "macos",
    target_os = "netbsd",
)))]
fn set_keepalive_count(_sock: &SockRef<'_>, _count: u32) -> io::Result<()> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use std::net::TcpListener;

    use super::*;
    use crate::diagnostics::NoopDiagnostics;

    #[test]
    fn applies_keepalive_and_user_timeout_on_linux() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind listener");
        let stream = TcpStream::connect(listener.local_addr().expect("addr")).expect("connect");
        let keepalive = KeepaliveOptions {
            idle: Some(Duration::from_secs(30)),
            count: Some(4),
            interval: Some(Duration::from_secs(5)),
        };
        apply(
            &stream,
            &Endpoint::new("127.0.0.1", 0),
            Some(Duration::from_secs(10)),
            Some(&keepalive),
            &NoopDiagnostics,
        )
        .expect("apply socket options");

        let sock = SockRef::from(&stream);
        assert!(sock.keepalive().expect("read keepalive"));
        assert_eq!(
            sock.keepalive_time().expect("read idle"),
            Duration::from_secs(30)
        );
        assert_eq!(
            sock.keepalive_interval().expect("read interval"),
            Duration::from_secs(5)
        );
        assert_eq!(sock.keepalive_retries().expect("read count"), 4);
        assert_eq!(
            sock.tcp_user_timeout().expect("read user timeout"),
            Some(Duration::from_secs(10))
        );
    }

    #[test]
    fn linux_supports_every_tunable() {
        let caps = SocketCapabilities::detect();
        assert!(caps.user_timeout && caps.keepalive_interval && caps.keepalive_count);
    }
}
