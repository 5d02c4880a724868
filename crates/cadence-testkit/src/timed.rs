//! A leaf element that ends itself after a fixed duration.

use async_trait::async_trait;
use cadence_flow::{
    Element, ElementOptions, EndReason, FlowResult, Node, WeakElementRef,
};
use std::sync::Arc;
use std::time::Duration;

/// Leaf element that times itself out: once running, it ends with
/// [`EndReason::Timeout`] after `duration` unless something ends it first.
pub struct Timed {
    node: Node,
    duration: Duration,
}

impl Timed {
    /// A timed leaf with default options.
    pub fn new(duration: Duration) -> Arc<Self> {
        Self::with_options(duration, ElementOptions::default())
    }

    /// A timed leaf with explicit element options.
    pub fn with_options(duration: Duration, options: ElementOptions) -> Arc<Self> {
        Arc::new_cyclic(|me: &std::sync::Weak<Self>| {
            let me: WeakElementRef = me.clone();
            Self {
                node: Node::new(me, options),
                duration,
            }
        })
    }
}

#[async_trait]
impl Element for Timed {
    fn node(&self) -> &Node {
        &self.node
    }

    async fn prepare(&self, direct: bool) -> FlowResult<()> {
        self.node.mark_prepared(direct);
        Ok(())
    }

    async fn run(&self) -> FlowResult<()> {
        self.node.begin_run()?;
        tokio::select! {
            _ = tokio::time::sleep(self.duration) => {
                self.node.finish(EndReason::Timeout);
            }
            _ = self.node.completed() => {}
        }
        Ok(())
    }

    async fn end(&self, reason: EndReason) -> FlowResult<()> {
        self.node.finish(reason);
        Ok(())
    }
}
