//! Error type for flow composition.

use crate::lifecycle::Status;

/// Errors surfaced by the flow composition engine.
///
/// Structural misuse that can occur during a normal cascading abort (ending
/// an already-done element, stepping past exhausted content) is deliberately
/// *not* an error; these variants mark genuine programming errors in the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    /// A step trigger was invoked after its sequence ended. A finished
    /// sequence must never resume stepping.
    #[error("step trigger invoked after its sequence ended")]
    TriggerRevoked,

    /// `run` was called on an element that is not in the `Prepared` state.
    #[error("element {id:?} cannot run from status {status:?}")]
    NotRunnable {
        /// Id of the offending element, if one was assigned.
        id: Option<String>,
        /// Status the element was in when `run` was called.
        status: Status,
    },
}

/// Convenience result alias used throughout the crate.
pub type FlowResult<T> = Result<T, FlowError>;
