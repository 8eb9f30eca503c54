//! Observability subsystem
//!
//! - Structured logging (JSON), quiet below `Warn` by default
//! - Per-table counters
//! - Lifecycle event tracing
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on table state
//! 3. No background threads
//! 4. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use spillsst::observability::{Logger, Severity};
//!
//! Logger::set_min_severity(Severity::Info);
//! Logger::info("TABLE_OPEN", &[("table_id", "42")]);
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    if event.is_failure() {
        Logger::error(event.as_str(), fields);
    } else {
        Logger::info(event.as_str(), fields);
    }
}
