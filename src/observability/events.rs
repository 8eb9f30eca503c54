//! Lifecycle events of a shared strings table
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable table events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Backing stores and staged file allocated
    TableOpen,
    /// Backing stores released by `close`
    TableClose,
    /// A backing store directory was removed
    StoreReleased,
    /// A backing store directory could not be removed
    StoreReleaseFailed,
    /// Forward index doubled its slot file
    ForwardIndexGrow,
    /// Table dropped without an explicit `close`
    DropWithoutClose,
    /// Implicit close on drop failed
    TableCloseFailed,
    /// A key could not be removed from the reverse store after a failed insert
    ReverseRollbackFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::TableOpen => "TABLE_OPEN",
            Event::TableClose => "TABLE_CLOSE",
            Event::StoreReleased => "STORE_RELEASED",
            Event::StoreReleaseFailed => "STORE_RELEASE_FAILED",
            Event::ForwardIndexGrow => "FORWARD_INDEX_GROW",
            Event::DropWithoutClose => "DROP_WITHOUT_CLOSE",
            Event::TableCloseFailed => "TABLE_CLOSE_FAILED",
            Event::ReverseRollbackFailed => "REVERSE_ROLLBACK_FAILED",
        }
    }

    /// Returns whether this event reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::StoreReleaseFailed | Event::TableCloseFailed | Event::ReverseRollbackFailed
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(Event::TableOpen.as_str(), "TABLE_OPEN");
        assert_eq!(Event::ForwardIndexGrow.to_string(), "FORWARD_INDEX_GROW");
    }

    #[test]
    fn test_failure_events() {
        assert!(Event::StoreReleaseFailed.is_failure());
        assert!(Event::TableCloseFailed.is_failure());
        assert!(Event::ReverseRollbackFailed.is_failure());
        assert_eq!(Event::ReverseRollbackFailed.as_str(), "REVERSE_ROLLBACK_FAILED");
        assert!(!Event::StoreReleased.is_failure());
    }
}
