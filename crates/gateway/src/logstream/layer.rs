//! Tracing layer feeding the log broadcast queue
//!
//! Events are formatted on the emitting thread and handed to the bounded
//! queue with `try_send`; a full or closed queue drops the line.

use scholar_common::metrics;
use std::fmt::Write as _;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Targets whose events are streamed to clients
const FORWARDED_TARGETS: &[&str] = &["gateway", "scholar_common", "scholar_search"];

/// The log channel's own events would loop back into the queue
const EXCLUDED_TARGET: &str = "gateway::logstream";

pub struct BroadcastLayer {
    tx: mpsc::Sender<String>,
}

impl BroadcastLayer {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }
}

fn forwards(target: &str) -> bool {
    let within = |prefix: &str| {
        target == prefix || target.strip_prefix(prefix).is_some_and(|rest| rest.starts_with("::"))
    };
    FORWARDED_TARGETS.iter().copied().any(within) && !within(EXCLUDED_TARGET)
}

/// Collects the message and any structured fields of an event
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn push_field(&mut self, name: &str, value: &dyn std::fmt::Display) {
        let _ = write!(self.fields, " {}={}", name, value);
    }

    fn finish(self) -> String {
        if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            self.message + &self.fields
        }
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field.name(), &value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.push_field(field.name(), &format!("{:?}", value));
        }
    }
}

/// `"%Y-%m-%d %H:%M:%S - target - LEVEL - message key=value..."`
pub fn format_line(timestamp: &str, target: &str, level: &tracing::Level, message: &str) -> String {
    format!("{} - {} - {} - {}", timestamp, target, level, message)
}

impl<S: Subscriber> Layer<S> for BroadcastLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !forwards(metadata.target()) {
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let line = format_line(&timestamp, metadata.target(), metadata.level(), &visitor.finish());

        if self.tx.try_send(line).is_err() {
            metrics::record_log_dropped();
        }
    }
}
