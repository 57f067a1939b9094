//! Structured event sink.
//!
//! The core never decides where events go, only what they say. Callers
//! inject a [`EventSink`] implementation at construction time; [`TracingSink`]
//! (the default) forwards to the `tracing` crate so any process embedding
//! this core gets useful output for free just by installing a subscriber.

/// Severity of a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

/// A single structured event: level, the component that raised it, and a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub level: Level,
    pub source: &'static str,
    pub message: String,
}

/// Narrow collaborator the core talks to for observability. Implementations
/// may buffer, drop, or forward events; the core never reads them back.
pub trait EventSink {
    fn log(&self, level: Level, source: &'static str, message: &str);

    fn info(&self, source: &'static str, message: &str) {
        self.log(Level::Info, source, message);
    }

    fn error(&self, source: &'static str, message: &str) {
        self.log(Level::Error, source, message);
    }
}

/// Default sink: forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn log(&self, level: Level, source: &'static str, message: &str) {
        match level {
            Level::Info => tracing::info!(source, "{message}"),
            Level::Error => tracing::error!(source, "{message}"),
        }
    }
}

/// Discards every event. Useful in tests that don't care about observability.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn log(&self, _level: Level, _source: &'static str, _message: &str) {}
}


#[cfg(test)]
mod tests {
    use super::recording::RecordingSink;
    use super::*;

    #[test]
    fn recording_sink_captures_events_in_order() {
        let sink = RecordingSink::default();
        sink.info("pmm", "block constructed");
        sink.error("vmm", "exhausted");
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].level, Level::Info);
        assert_eq!(events[1].level, Level::Error);
        assert_eq!(events[1].source, "vmm");
    }

    #[test]
    fn null_sink_drops_everything() {
        let sink = NullSink;
        sink.info("pmm", "anything");
    }
}
