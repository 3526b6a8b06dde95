#![allow(dead_code, unused_imports)]

pub mod fixtures;

pub mod recording;

pub use fixtures::{collector, tcp_listener, CollectorHandle, TlsIdentity};
pub use recording::RecordingSink;
