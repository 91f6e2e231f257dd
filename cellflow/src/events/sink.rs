//! Progress sink trait and implementations.

use crate::core::{ProgressEvent, ProgressKind};
use async_trait::async_trait;
use tracing::{debug, info, warn, Level};

/// Receives progress notifications from the executor.
///
/// Sinks must not fail the run: `try_emit` swallows and logs its own
/// errors.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Emits an event asynchronously. Defaults to [`try_emit`](Self::try_emit).
    async fn emit(&self, event: &ProgressEvent) {
        self.try_emit(event);
    }

    /// Emits an event without blocking.
    fn try_emit(&self, event: &ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgressSink;

impl ProgressSink for NoOpProgressSink {
    fn try_emit(&self, _event: &ProgressEvent) {}
}

/// Writes events to `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingProgressSink {
    level: Level,
}

impl Default for LoggingProgressSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingProgressSink {
    /// Creates a sink logging at the given level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl ProgressSink for LoggingProgressSink {
    fn try_emit(&self, event: &ProgressEvent) {
        if matches!(event.kind, ProgressKind::Failed) {
            warn!(
                run_id = %event.run_id,
                stage = %event.stage,
                index = event.index,
                total = event.total,
                "[{}/{}] {} failed", event.index, event.total, event.label
            );
        } else if self.level == Level::DEBUG {
            debug!(
                run_id = %event.run_id,
                stage = %event.stage,
                index = event.index,
                total = event.total,
                "[{}/{}] {} {}", event.index, event.total, event.label, event.kind
            );
        } else {
            info!(
                run_id = %event.run_id,
                stage = %event.stage,
                index = event.index,
                total = event.total,
                "[{}/{}] {} {}", event.index, event.total, event.label, event.kind
            );
        }
    }
}

/// Keeps every event in memory, for tests and embedding callers.
#[derive(Debug, Default)]
pub struct CollectingProgressSink {
    events: parking_lot::RwLock<Vec<ProgressEvent>>,
}

impl CollectingProgressSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Returns the events of one kind.
    #[must_use]
    pub fn events_of_kind(&self, kind: ProgressKind) -> Vec<ProgressEvent> {
        self.events.read().iter().filter(|e| e.kind == kind).cloned().collect()
    }

    /// Clears the sink.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

impl ProgressSink for CollectingProgressSink {
    fn try_emit(&self, event: &ProgressEvent) {
        self.events.write().push(event.clone());
    }
}
