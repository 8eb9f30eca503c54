//! Structured JSON logger
//!
//! One event per line: `{"event":..,"severity":..,<fields sorted by key>}`.
//! Errors go to stderr, everything else to stdout. Output below the
//! process-wide threshold (`Warn` by default) is dropped, so an embedded
//! table stays silent unless the host asks for more.
//!
//! `Logger::capture` redirects the current thread's lines into memory,
//! regardless of threshold, for assertions in tests.

use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU8, Ordering};

static MIN_SEVERITY: AtomicU8 = AtomicU8::new(Severity::Warn as u8);

thread_local! {
    static CAPTURED: RefCell<Option<Vec<String>>> = RefCell::new(None);
}

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Per-operation detail
    Debug = 0,
    /// Lifecycle events
    Info = 1,
    /// Recoverable issues
    Warn = 2,
    /// Operation failures
    Error = 3,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Severity::Debug,
            1 => Severity::Info,
            2 => Severity::Warn,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Process-wide structured logger
pub struct Logger;

impl Logger {
    /// Sets the lowest severity written to stdout/stderr.
    pub fn set_min_severity(severity: Severity) {
        MIN_SEVERITY.store(severity as u8, Ordering::Relaxed);
    }

    pub fn min_severity() -> Severity {
        Severity::from_u8(MIN_SEVERITY.load(Ordering::Relaxed))
    }

    /// Returns whether events at `severity` reach stdout/stderr.
    pub fn enabled(severity: Severity) -> bool {
        severity >= Self::min_severity()
    }

    /// Logs one event.
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        let captured = CAPTURED.with(|slot| match slot.borrow_mut().as_mut() {
            Some(lines) => {
                lines.push(render_line(severity, event, fields));
                true
            }
            None => false,
        });
        if captured || !Self::enabled(severity) {
            return;
        }

        let line = render_line(severity, event, fields);
        // A failed log write must never fail the table operation.
        let _ = if severity >= Severity::Error {
            io::stderr().lock().write_all(line.as_bytes())
        } else {
            io::stdout().lock().write_all(line.as_bytes())
        };
    }

    pub fn debug(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Debug, event, fields);
    }

    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }

    /// Runs `f`, collecting every line this thread logs meanwhile.
    ///
    /// Captures nest: an inner capture takes the lines of its own scope and
    /// the outer one resumes afterwards.
    pub fn capture<R>(f: impl FnOnce() -> R) -> (R, Vec<String>) {
        let outer = CAPTURED.with(|slot| slot.borrow_mut().replace(Vec::new()));
        let result = f();
        let lines = CAPTURED.with(|slot| {
            let mut slot = slot.borrow_mut();
            let lines = slot.take().unwrap_or_default();
            *slot = outer;
            lines
        });
        (result, lines)
    }
}

/// Renders one JSON line, newline included.
pub(crate) fn render_line(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let mut line = String::with_capacity(64 + fields.len() * 24);
    line.push_str("{\"event\":");
    push_json_str(&mut line, event);
    line.push_str(",\"severity\":\"");
    line.push_str(severity.as_str());
    line.push('"');

    let mut sorted: Vec<&(&str, &str)> = fields.iter().collect();
    sorted.sort_by_key(|(key, _)| *key);
    for (key, value) in sorted {
        line.push(',');
        push_json_str(&mut line, key);
        line.push(':');
        push_json_str(&mut line, value);
    }

    line.push_str("}\n");
    line
}

fn push_json_str(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}
