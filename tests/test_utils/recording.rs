//! Diagnostics sink that keeps rendered events for assertions.

use std::sync::Mutex;

use syslog_transport::{DiagnosticEvent, Diagnostics, Phase};

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(Phase, String)>>,
}

impl RecordingSink {
    pub fn phases(&self) -> Vec<Phase> {
        self.events.lock().unwrap().iter().map(|(p, _)| *p).collect()
    }

    pub fn count(&self, phase: Phase) -> usize {
        self.phases().into_iter().filter(|p| *p == phase).count()
    }

    /// Rendered `key=value` fields of every event in `phase`.
    pub fn fields_of(&self, phase: Phase) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| *p == phase)
            .map(|(_, fields)| fields.clone())
            .collect()
    }
}

impl Diagnostics for RecordingSink {
    fn emit(&self, event: &DiagnosticEvent<'_>) {
        self.events
            .lock()
            .unwrap()
            .push((event.phase, event.fields_display().to_string()));
    }
}
