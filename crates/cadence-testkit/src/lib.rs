//! Instrumented leaf elements for exercising cadence-flow composites.
//!
//! Composites only orchestrate; they never end on their own unless their
//! children do. The leaves here stand in for real application elements:
//! [`Probe`] is externally ended and records everything that happens to it,
//! [`Timed`] ends itself after a duration the way rendering leaves time
//! themselves out in a real presentation framework.

pub mod probe;
pub mod timed;

pub use probe::Probe;
pub use timed::Timed;

/// Yield to the scheduler a few times so concurrently-driven lifecycles can
/// observe each other's transitions inside a single-threaded test.
pub async fn breathe() {
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
}
