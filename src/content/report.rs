//! Failure channel for content load and persist errors.
//!
//! Neither failure reaches visitors: a failed load falls back to seed copy and
//! a failed persist leaves the local edit in place. Both are reported here.

use crate::log;
use std::{fmt, time::Duration};

/// A reported content failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureEvent {
    /// Loading all rows failed; seed content is being served.
    Load { reason: String },
    /// Writing one section failed; the local tree keeps the edit.
    Persist {
        section: String,
        revision: u64,
        reason: String,
    },
    /// Writing one section overran its deadline; the row may or may not land.
    PersistUnconfirmed {
        section: String,
        revision: u64,
        after: Duration,
    },
}

impl fmt::Display for FailureEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load { reason } => write!(f, "error loading content: {reason}"),
            Self::Persist {
                section,
                revision,
                reason,
            } => write!(f, "error saving `{section}` (rev {revision}): {reason}"),
            Self::PersistUnconfirmed {
                section,
                revision,
                after,
            } => write!(
                f,
                "saving `{section}` (rev {revision}) unconfirmed after {after:?}, it may still land"
            ),
        }
    }
}

pub trait FailureSink: Send + Sync {
    fn report(&self, event: FailureEvent);
}

/// Writes failures to the terminal log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl FailureSink for LogSink {
    fn report(&self, event: FailureEvent) {
        log!("error"; "{event}");
    }
}

/// Keeps every reported failure in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: parking_lot::Mutex<Vec<FailureEvent>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<FailureEvent> {
        self.events.lock().clone()
    }
}

#[cfg(test)]
impl FailureSink for RecordingSink {
    fn report(&self, event: FailureEvent) {
        self.events.lock().push(event);
    }
}
