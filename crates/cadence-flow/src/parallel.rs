//! Concurrent execution of child elements under a completion policy.

use crate::element::{Element, ElementOptions, ElementRef, Node, WeakElementRef};
use crate::error::FlowResult;
use crate::lifecycle::{EndReason, Status};
use crate::nested::prepare_children;
use async_trait::async_trait;
use futures::future::{join_all, select_all, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// When a [`Parallel`] composite considers itself finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompletionMode {
    /// Finish as soon as any one child finishes.
    #[default]
    Race,
    /// Finish only once every child has finished.
    All,
}

/// Options recognized by [`Parallel`] constructors.
#[derive(Debug, Clone, Default)]
pub struct ParallelOptions {
    /// Completion policy; fixed for the lifetime of the element.
    pub mode: CompletionMode,
    /// Base element options (hand-me-down override, plain attributes).
    pub element: ElementOptions,
}

/// Composite that runs all of its children concurrently.
///
/// "Concurrently" means concurrently-pending lifecycles on the driving task,
/// not parallel threads: all children are started in the same run turn and
/// their completion signals are combined under the configured policy. Child
/// order is preserved for inspection but carries no execution dependency.
pub struct Parallel {
    node: Node,
    content: Vec<ElementRef>,
    mode: CompletionMode,
}

impl Parallel {
    /// A parallel composite over `content` with default options (race mode).
    pub fn new(content: Vec<ElementRef>) -> Arc<Self> {
        Self::with_options(content, ParallelOptions::default())
    }

    /// A parallel composite over `content`.
    pub fn with_options(content: Vec<ElementRef>, options: ParallelOptions) -> Arc<Self> {
        Arc::new_cyclic(|me: &std::sync::Weak<Self>| {
            let me: WeakElementRef = me.clone();
            Self {
                node: Node::new(me, options.element),
                content,
                mode: options.mode,
            }
        })
    }

    /// Snapshot of the content list, in construction order.
    pub fn content(&self) -> Vec<ElementRef> {
        self.content.clone()
    }

    /// The completion policy this composite runs under.
    pub fn mode(&self) -> CompletionMode {
        self.mode
    }
}

#[async_trait]
impl Element for Parallel {
    fn node(&self) -> &Node {
        &self.node
    }

    async fn prepare(&self, direct: bool) -> FlowResult<()> {
        if !self.node.mark_prepared(direct) {
            return Ok(());
        }
        prepare_children(&self.node, &self.content).await
    }

    async fn run(&self) -> FlowResult<()> {
        self.node.begin_run()?;

        let completions: Vec<BoxFuture<'_, FlowResult<()>>> = self
            .content
            .iter()
            .map(|child| {
                let child = Arc::clone(child);
                async move { child.run().await }.boxed()
            })
            .collect();

        let result = if completions.is_empty() {
            Ok(())
        } else {
            match self.mode {
                CompletionMode::Race => {
                    // Losing children keep their state; the cascade below
                    // ends them explicitly once the winner settles.
                    let (first, _index, _losers) = select_all(completions).await;
                    first
                }
                CompletionMode::All => join_all(completions)
                    .await
                    .into_iter()
                    .collect::<FlowResult<()>>(),
            }
        };

        // The cascade runs even when a child failed to run, so its siblings
        // are cancelled before the error propagates.
        Element::end(self, EndReason::Natural).await?;
        self.node.completed().await;
        result
    }

    async fn end(&self, reason: EndReason) -> FlowResult<()> {
        if self.node.status() >= Status::Done {
            return Ok(());
        }

        // Cancel every child that has not finished, regardless of mode, so
        // race-mode losers are always ended.
        for child in &self.content {
            if child.status() < Status::Done {
                child.end(EndReason::ParallelAbort).await?;
            }
        }

        self.node.finish(reason);
        Ok(())
    }
}
