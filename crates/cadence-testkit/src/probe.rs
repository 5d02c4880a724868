//! A leaf element that records its own lifecycle.

use async_trait::async_trait;
use cadence_flow::{
    Element, ElementOptions, EndReason, FlowResult, Node, Status, WeakElementRef,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Leaf element that counts `run` invocations and records every `end`
/// reason. It never ends on its own: tests (or a cascading abort) end it.
pub struct Probe {
    node: Node,
    runs: AtomicUsize,
    reasons: Mutex<Vec<EndReason>>,
}

impl Probe {
    /// A probe with default options.
    pub fn new() -> Arc<Self> {
        Self::with_options(ElementOptions::default())
    }

    /// A probe with explicit element options.
    pub fn with_options(options: ElementOptions) -> Arc<Self> {
        Arc::new_cyclic(|me: &std::sync::Weak<Self>| {
            let me: WeakElementRef = me.clone();
            Self {
                node: Node::new(me, options),
                runs: AtomicUsize::new(0),
                reasons: Mutex::new(Vec::new()),
            }
        })
    }

    /// How many times `run` has started.
    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Every reason this probe was ended with, in order.
    pub fn end_reasons(&self) -> Vec<EndReason> {
        self.reasons.lock().clone()
    }

    /// Resolves once the probe has started running.
    pub async fn started(&self) {
        self.node.wait_for(Status::Running).await;
    }
}

#[async_trait]
impl Element for Probe {
    fn node(&self) -> &Node {
        &self.node
    }

    async fn prepare(&self, direct: bool) -> FlowResult<()> {
        self.node.mark_prepared(direct);
        Ok(())
    }

    async fn run(&self) -> FlowResult<()> {
        self.node.begin_run()?;
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.node.completed().await;
        Ok(())
    }

    async fn end(&self, reason: EndReason) -> FlowResult<()> {
        if self.node.finish(reason.clone()) {
            self.reasons.lock().push(reason);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn probe_records_runs_and_reasons() {
        let probe = Probe::new();
        probe.prepare(true).await.unwrap();

        let run = probe.run();
        let driver = async {
            probe.started().await;
            assert_eq!(probe.run_count(), 1);
            probe.end(EndReason::Complete).await.unwrap();
        };
        let (run_result, ()) = tokio::join!(run, driver);
        run_result.unwrap();

        assert_eq!(probe.status(), Status::Done);
        assert_eq!(probe.end_reasons(), vec![EndReason::Complete]);
    }

    #[tokio::test]
    async fn second_end_is_not_recorded() {
        let probe = Probe::new();
        probe.prepare(true).await.unwrap();
        probe.end(EndReason::Complete).await.unwrap();
        probe.end(EndReason::SequenceAbort).await.unwrap();
        assert_eq!(probe.end_reasons(), vec![EndReason::Complete]);
    }
}
