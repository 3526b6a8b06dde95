//! Helpers shared by the crate's unit tests.

use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use log::Level;
use parking_lot::Mutex;

use crate::{
    clock::Clock,
    diagnostics::{DiagnosticEvent, Diagnostics, Phase},
};

/// Owned copy of a [`DiagnosticEvent`].
#[derive(Clone, Debug)]
pub(crate) struct RecordedEvent {
    pub phase: Phase,
    pub level: Level,
    pub fields: BTreeMap<&'static str, String>,
}

/// Diagnostics sink that keeps every event for later assertions.
#[derive(Default)]
pub(crate) struct RecordingDiagnostics {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingDiagnostics {
    pub(crate) fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    pub(crate) fn phases(&self) -> Vec<Phase> {
        self.events.lock().iter().map(|e| e.phase).collect()
    }

    pub(crate) fn count(&self, phase: Phase) -> usize {
        self.events.lock().iter().filter(|e| e.phase == phase).count()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn emit(&self, event: &DiagnosticEvent<'_>) {
        let fields = event
            .fields
            .iter()
            .map(|(key, value)| (*key, value.to_string()))
            .collect();
        self.events.lock().push(RecordedEvent {
            phase: event.phase,
            level: event.level,
            fields,
        });
    }
}

/// Clock whose sleeps return immediately and advance virtual time.
pub(crate) struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        *self.offset.lock() += duration;
    }
}
