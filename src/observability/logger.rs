//! Structured JSON logger
//!
//! - One log line = one event
//! - Event first, severity second, remaining fields sorted by key
//! - Synchronous, no buffering
//!
//! The logger is an explicit value owned by the query engine. There is no
//! process-wide logger.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use super::events::QueryEvent;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Debug-level detail
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Recoverable issues
    Warn = 2,
    /// Operation failures
    Error = 3,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Destination for log lines
#[derive(Debug, Clone, Default)]
pub enum LogSink {
    /// Standard output
    #[default]
    Stdout,
    /// Standard error
    Stderr,
    /// In-memory capture, one entry per line (without trailing newline)
    Buffer(Arc<Mutex<Vec<String>>>),
    /// Discard everything
    Silent,
}

/// Structured logger
#[derive(Debug, Clone)]
pub struct Logger {
    sink: LogSink,
    min_severity: Severity,
}

impl Default for Logger {
    fn default() -> Self {
        Self {
            sink: LogSink::Stdout,
            min_severity: Severity::Info,
        }
    }
}

impl Logger {
    /// Creates a logger writing to the given sink
    pub fn new(sink: LogSink) -> Self {
        Self {
            sink,
            ..Self::default()
        }
    }

    /// Logger that drops every event
    pub fn silent() -> Self {
        Self::new(LogSink::Silent)
    }

    /// Logger capturing lines in memory, returned alongside the shared buffer
    pub fn buffered() -> (Self, Arc<Mutex<Vec<String>>>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        (Self::new(LogSink::Buffer(Arc::clone(&buffer))), buffer)
    }

    /// Sets the minimum severity that is emitted
    pub fn with_min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = severity;
        self
    }

    /// Log a typed query event at its default severity
    pub fn event(&self, event: QueryEvent, fields: &[(&str, &str)]) {
        self.log(event.severity(), event.as_str(), fields);
    }

    /// Log an event with the given severity and fields
    pub fn log(&self, severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if severity < self.min_severity {
            return;
        }

        let line = render_line(severity, event, fields);

        match &self.sink {
            LogSink::Stdout => write_line(&mut io::stdout(), &line),
            LogSink::Stderr => write_line(&mut io::stderr(), &line),
            LogSink::Buffer(buffer) => {
                if let Ok(mut lines) = buffer.lock() {
                    lines.push(line);
                }
            }
            LogSink::Silent => {}
        }
    }

    pub fn info(&self, event: &str, fields: &[(&str, &str)]) {
        self.log(Severity::Info, event, fields);
    }

    pub fn warn(&self, event: &str, fields: &[(&str, &str)]) {
        self.log(Severity::Warn, event, fields);
    }
}

fn write_line<W: Write>(writer: &mut W, line: &str) {
    // Logging failures never affect query results
    let _ = writer.write_all(line.as_bytes());
    let _ = writer.write_all(b"\n");
    let _ = writer.flush();
}

/// Renders one JSON log line. Key order is deterministic.
fn render_line(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let mut output = String::with_capacity(128);

    output.push_str("{\"event\":");
    push_json_string(&mut output, event);
    output.push_str(",\"severity\":");
    push_json_string(&mut output, severity.as_str());

    let mut sorted: Vec<_> = fields.iter().collect();
    sorted.sort_by_key(|(k, _)| *k);

    for (key, value) in sorted {
        output.push(',');
        push_json_string(&mut output, key);
        output.push(':');
        push_json_string(&mut output, value);
    }

    output.push('}');
    output
}

fn push_json_string(output: &mut String, s: &str) {
    // serde_json handles escaping of quotes, backslashes and control characters
    match serde_json::to_string(s) {
        Ok(quoted) => output.push_str(&quoted),
        Err(_) => output.push_str("\"\""),
    }
}
