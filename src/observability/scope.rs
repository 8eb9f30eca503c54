//! Begin/complete logging around one operation
//!
//! - `{name}_BEGIN` on creation
//! - `{name}_COMPLETE` with `elapsed_ms` on success
//! - `{name}_FAILED` with a reason on failure
//! - `{name}_INCOMPLETE` if dropped without either, e.g. on panic

use std::time::Instant;

use super::logger::Logger;

/// Logs the lifecycle of a single operation.
///
/// ```ignore
/// let scope = ObservationScope::with_fields("COMMIT", &[("table_id", id)]);
/// let bytes = write()?;
/// scope.complete_with_fields(&[("bytes", &bytes.to_string())]);
/// ```
pub struct ObservationScope<'a> {
    name: &'a str,
    fields: Vec<(&'a str, String)>,
    started: Instant,
    finished: bool,
}

impl<'a> ObservationScope<'a> {
    pub fn new(name: &'a str) -> Self {
        Self::with_fields(name, &[])
    }

    /// Opens a scope whose fields are repeated on every event it logs.
    pub fn with_fields(name: &'a str, fields: &[(&'a str, &str)]) -> Self {
        Logger::info(&format!("{}_BEGIN", name), fields);

        Self {
            name,
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            started: Instant::now(),
            finished: false,
        }
    }

    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    pub fn complete_with_fields(mut self, extra: &[(&str, &str)]) {
        let elapsed_ms = self.started.elapsed().as_millis().to_string();
        let mut fields = self.field_refs();
        fields.extend_from_slice(extra);
        fields.push(("elapsed_ms", elapsed_ms.as_str()));

        Logger::info(&format!("{}_COMPLETE", self.name), &fields);
        self.finished = true;
    }

    pub fn fail(mut self, reason: &str) {
        let mut fields = self.field_refs();
        fields.push(("reason", reason));

        Logger::error(&format!("{}_FAILED", self.name), &fields);
        self.finished = true;
    }

    fn field_refs(&self) -> Vec<(&str, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect()
    }
}

impl Drop for ObservationScope<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let mut fields = self.field_refs();
            fields.push(("reason", "scope dropped before completion"));
            Logger::warn(&format!("{}_INCOMPLETE", self.name), &fields);
        }
    }
}
