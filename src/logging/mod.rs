// Logging module - keeps log events off the terminal while the editor runs
//
// The TUI owns the alternate screen, so anything printed would garble it.
// `TuiLogLayer` diverts events into a bounded `LogBuffer` instead; the F2
// overlay reads the most recent entries from there.

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Oldest entries are dropped past this
const CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub target: String,
    /// Message followed by any structured fields as ` key=value`
    pub message: String,
}

/// Shared ring of captured entries; clones see the same buffer
#[derive(Clone, Default)]
pub struct LogBuffer {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic mid-push leaves the deque valid, so poisoning is ignored
    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, entry: LogEntry) {
        let mut entries = self.lock();
        if entries.len() == CAPACITY {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Up to `n` newest entries, oldest first
    pub fn recent(&self, n: usize) -> Vec<LogEntry> {
        let entries = self.lock();
        let skip = entries.len().saturating_sub(n);
        entries.range(skip..).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Layer that records every event it sees into a [`LogBuffer`].
/// Level filtering is left to the subscriber's `EnvFilter`.
pub struct TuiLogLayer {
    buffer: LogBuffer,
}

impl TuiLogLayer {
    pub fn new(buffer: LogBuffer) -> Self {
        Self { buffer }
    }
}

impl<S: Subscriber> Layer<S> for TuiLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = FieldText::default();
        event.record(&mut fields);

        let metadata = event.metadata();
        self.buffer.push(LogEntry {
            timestamp: Local::now(),
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: fields.into_message(),
        });
    }
}

#[derive(Default)]
struct FieldText {
    message: String,
    rest: String,
}

impl FieldText {
    fn into_message(mut self) -> String {
        self.message.push_str(&self.rest);
        self.message
    }
}

impl Visit for FieldText {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message.push_str(value),
            name => {
                let _ = write!(self.rest, " {}={}", name, value);
            }
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => {
                let _ = write!(self.message, "{:?}", value);
            }
            name => {
                let _ = write!(self.rest, " {}={:?}", name, value);
            }
        }
    }
}
