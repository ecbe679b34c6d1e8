//! Event sinks.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, trace, warn, Level};

/// Receives lifecycle events from the poll engine, the retrier and pipelines.
///
/// Emitting never fails the caller.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event of kind `event_type` (see [`super::kinds`]).
    async fn emit(&self, event_type: &str, data: Option<Value>);

    /// Emits an event from synchronous code.
    fn try_emit(&self, event_type: &str, data: Option<Value>);
}

/// Discards every event. The default sink everywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<Value>) {}

    fn try_emit(&self, _event_type: &str, _data: Option<Value>) {}
}

/// Writes events to `tracing` under the `genflow::events` target.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a sink logging at `level`. `ERROR` is logged as `WARN`.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn record(&self, kind: &str, data: Option<&Value>) {
        let data = data.map(Value::to_string).unwrap_or_default();
        match self.level {
            Level::TRACE => trace!(target: "genflow::events", kind, data = %data, "event"),
            Level::DEBUG => debug!(target: "genflow::events", kind, data = %data, "event"),
            Level::INFO => info!(target: "genflow::events", kind, data = %data, "event"),
            _ => warn!(target: "genflow::events", kind, data = %data, "event"),
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.record(event_type, data.as_ref());
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.record(event_type, data.as_ref());
    }
}

/// One event kept by a [`CollectingEventSink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedEvent {
    /// Event kind, e.g. `job.polled`.
    pub kind: String,
    /// Payload, if any.
    pub data: Option<Value>,
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    recorded: Mutex<Vec<RecordedEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the kinds seen so far.
    #[must_use]
    pub fn kinds(&self) -> Vec<String> {
        self.recorded.lock().iter().map(|e| e.kind.clone()).collect()
    }

    /// Returns events whose kind starts with `prefix`.
    #[must_use]
    pub fn matching(&self, prefix: &str) -> Vec<RecordedEvent> {
        self.recorded
            .lock()
            .iter()
            .filter(|e| e.kind.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Counts events whose kind starts with `prefix`.
    #[must_use]
    pub fn count(&self, prefix: &str) -> usize {
        self.recorded
            .lock()
            .iter()
            .filter(|e| e.kind.starts_with(prefix))
            .count()
    }

    /// True until the first event arrives.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recorded.lock().is_empty()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.try_emit(event_type, data);
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.recorded.lock().push(RecordedEvent {
            kind: event_type.to_string(),
            data,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_logging_sink_accepts_every_level() {
        for level in [Level::TRACE, Level::DEBUG, Level::INFO, Level::ERROR] {
            let sink = LoggingEventSink::new(level);
            sink.emit("stage.started", Some(json!({"stage": "composite"}))).await;
            sink.try_emit("stage.completed", None);
        }
    }

    #[tokio::test]
    async fn test_collecting_sink_keeps_order_and_payload() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit("job.submitted", None).await;
        sink.try_emit("job.polled", Some(json!({"poll": 1})));
        sink.try_emit("stage.started", None);

        assert_eq!(sink.kinds(), vec!["job.submitted", "job.polled", "stage.started"]);
        assert_eq!(sink.count("job."), 2);
        assert_eq!(
            sink.matching("job.polled"),
            vec![RecordedEvent {
                kind: "job.polled".to_string(),
                data: Some(json!({"poll": 1})),
            }]
        );
    }
}
