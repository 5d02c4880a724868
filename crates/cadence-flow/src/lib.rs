//! Cadence flow: hierarchical composition of stateful elements.
//!
//! This crate arranges async "elements" into trees and executes them with
//! defined timing: strictly in order ([`Sequence`]), concurrently under a
//! completion policy ([`Parallel`]), or generated from a data collection
//! ([`Sequence::from_data`]). It is domain-agnostic: it knows nothing about
//! what an element does while running, only how to prepare, run, and end
//! collections of elements while propagating identity and configuration down
//! the tree.
//!
//! # Lifecycle
//!
//! Every element moves monotonically through
//! `uninitialized -> prepared -> running -> done`. Composites prepare their
//! children during their own prepare stage (parent linkage, hierarchical id
//! assignment, hand-me-down attribute inheritance), start them according to
//! their own policy during `run`, and cascade an abort-`end` to any child
//! still active when they end. An element's `run` future is its completion
//! signal: it resolves once the element is done.
//!
//! # Concurrency model
//!
//! Scheduling is cooperative and single-threaded in spirit: state mutation
//! happens synchronously between awaits, and "parallel" means
//! concurrently-pending lifecycles combined with [`futures`] combinators,
//! not CPU parallelism. Cancellation is purely hierarchical: an ancestor's
//! `end` is the only cancellation trigger, and leaf elements are responsible
//! for any time-based self-termination.
//!
//! # Example
//!
//! ```no_run
//! use cadence_flow::{Element, ElementRef, Sequence};
//!
//! async fn run_block(trials: Vec<ElementRef>) -> Result<(), cadence_flow::FlowError> {
//!     let block = Sequence::new(trials);
//!     block.prepare(true).await?;
//!     block.run().await?;
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod element;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod nested;
pub mod parallel;
pub mod sequence;

pub use element::{
    Element, ElementOptions, ElementRef, Node, WeakElementRef, DEFAULT_HAND_ME_DOWNS,
};
pub use error::{FlowError, FlowResult};
pub use events::{EventBus, EventKind, LifecycleEvent, Subscription};
pub use lifecycle::{EndReason, Status};
pub use nested::prepare_children;
pub use parallel::{CompletionMode, Parallel, ParallelOptions};
pub use sequence::{Sequence, SequenceOptions, StepTrigger};
