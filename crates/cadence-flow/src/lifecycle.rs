//! Lifecycle vocabulary shared by every element kind.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal lifecycle state of an element.
///
/// States only ever advance; comparisons like `status < Status::Done` are the
/// idiom for "is this element still active". An element that was aborted early
/// still reports [`Status::Done`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Status {
    /// Constructed, not yet prepared.
    Uninitialized,
    /// Prepared (directly or by a parent composite), ready to run.
    Prepared,
    /// Currently running.
    Running,
    /// Finished, either naturally or through a cascading abort.
    Done,
}

/// Why an element ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// A sequence exhausted its content.
    Complete,
    /// A composite ended of its own accord: its completion policy resolved,
    /// or a child it tried to start could not run.
    Natural,
    /// A leaf element timed itself out.
    Timeout,
    /// An enclosing sequence ended while this element was still active.
    SequenceAbort,
    /// An enclosing parallel composite ended while this element was still active.
    ParallelAbort,
    /// Application-defined reason.
    Other(String),
}

impl EndReason {
    /// Stable string form, matching the reasons carried on end events.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Complete => "complete",
            Self::Natural => "natural",
            Self::Timeout => "timeout",
            Self::SequenceAbort => "abort by sequence",
            Self::ParallelAbort => "abort by parallel",
            Self::Other(reason) => reason,
        }
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
