//! Progress and log boundary between the pipeline and whoever drives it.

use std::fmt::Display;

/// Severity of a [`RunEvent::Log`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        })
    }
}

/// Something a run reports while it is going
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunEvent {
    Log { level: LogLevel, message: String },
    /// Percent of rows processed, 0..=100, never decreasing within a run
    Progress(u8),
}

/// Receiver of run events
pub trait EventSink {
    fn emit(&mut self, event: RunEvent);

    fn log(&mut self, level: LogLevel, message: String) {
        self.emit(RunEvent::Log { level, message });
    }

    fn progress(&mut self, percent: u8) {
        self.emit(RunEvent::Progress(percent));
    }
}

/// Keeps every event in order, for tests and embedders that render the run
/// themselves
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<RunEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log messages at `level` or above, in emission order
    pub fn messages(&self, level: LogLevel) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                RunEvent::Log { level: found, message } if *found >= level => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn progress_values(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|event| match event {
                RunEvent::Progress(percent) => Some(*percent),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: RunEvent) {
        self.events.push(event);
    }
}

/// Forwards log events to `tracing`; progress goes out at trace level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: RunEvent) {
        match event {
            RunEvent::Log { level: LogLevel::Debug, message } => tracing::debug!("{}", message),
            RunEvent::Log { level: LogLevel::Info, message } => tracing::info!("{}", message),
            RunEvent::Log { level: LogLevel::Warn, message } => tracing::warn!("{}", message),
            RunEvent::Log { level: LogLevel::Error, message } => tracing::error!("{}", message),
            RunEvent::Progress(percent) => tracing::trace!(percent, "progress"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_order_and_filters() {
        let mut sink = RecordingSink::new();
        sink.log(LogLevel::Debug, "default applied".to_string());
        sink.progress(50);
        sink.log(LogLevel::Warn, "row skipped".to_string());
        sink.log(LogLevel::Info, "processing".to_string());
        sink.progress(100);

        assert_eq!(sink.events.len(), 5);
        assert_eq!(sink.messages(LogLevel::Info), ["row skipped", "processing"]);
        assert_eq!(sink.messages(LogLevel::Warn), ["row skipped"]);
        assert_eq!(sink.progress_values(), [50, 100]);
    }

    #[test]
    fn tracing_sink_accepts_all_events() {
        let mut sink = TracingSink;
        sink.log(LogLevel::Error, "boom".to_string());
        sink.progress(10);
    }
}
