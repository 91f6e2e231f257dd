//! Progress reporting.
//!
//! The executor reports every stage transition to a [`ProgressSink`]. The
//! sink is passed to the executor explicitly; there is no global sink.

mod sink;

pub use sink::{CollectingProgressSink, LoggingProgressSink, NoOpProgressSink, ProgressSink};
