//! Ordered, step-wise execution of child elements.
//!
//! A [`Sequence`] owns an ordered content list and runs it one child at a
//! time, advancing only after the active child ends. Content can be supplied
//! directly or generated once at construction from a data collection
//! ([`Sequence::from_data`], the loop construction strategy).

use crate::element::{Element, ElementOptions, ElementRef, Node, WeakElementRef};
use crate::error::{FlowError, FlowResult};
use crate::events::LifecycleEvent;
use crate::lifecycle::{EndReason, Status};
use crate::nested::prepare_children;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Options recognized by [`Sequence`] constructors.
#[derive(Debug, Clone, Default)]
pub struct SequenceOptions {
    /// Shuffle the content uniformly, in place, during preparation.
    pub shuffle: bool,
    /// Base element options (hand-me-down override, plain attributes).
    pub element: ElementOptions,
}

/// Revocation flag shared between a sequence and its step triggers.
///
/// Revoked exactly once, when the sequence ends; auto-advance stops and any
/// outstanding [`StepTrigger`] becomes an error to invoke.
pub(crate) struct StepGuard {
    revoked: AtomicBool,
}

impl StepGuard {
    fn armed() -> Arc<Self> {
        Arc::new(Self {
            revoked: AtomicBool::new(false),
        })
    }

    pub(crate) fn revoke(&self) {
        self.revoked.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::SeqCst)
    }
}

/// Handle that advances a sequence by one step with auto-advance.
///
/// The handle is invalidated when its sequence ends; invoking it afterwards
/// returns [`FlowError::TriggerRevoked`] instead of silently resuming the
/// sequence.
#[derive(Clone)]
pub struct StepTrigger {
    sequence: Weak<Sequence>,
    guard: Arc<StepGuard>,
}

impl StepTrigger {
    /// Step the sequence forward by one, continuing to auto-advance.
    pub async fn invoke(&self) -> FlowResult<()> {
        if self.guard.is_revoked() {
            return Err(FlowError::TriggerRevoked);
        }
        let sequence = self.sequence.upgrade().ok_or(FlowError::TriggerRevoked)?;
        sequence.step(1, true).await
    }

    /// Whether the owning sequence has ended and revoked this trigger.
    pub fn is_revoked(&self) -> bool {
        self.guard.is_revoked() || self.sequence.upgrade().is_none()
    }
}

struct SequenceState {
    content: Vec<ElementRef>,
    /// Starts one before the first valid index; equals `content.len()` once
    /// the sequence has exhausted its content.
    position: isize,
    current: Option<ElementRef>,
}

enum StepOutcome {
    Advanced(ElementRef),
    Exhausted,
}

/// Composite that runs its children strictly one at a time.
pub struct Sequence {
    node: Node,
    me: Weak<Sequence>,
    state: Mutex<SequenceState>,
    shuffle: bool,
    step_guard: Arc<StepGuard>,
}

impl Sequence {
    /// A sequence over `content` with default options.
    pub fn new(content: Vec<ElementRef>) -> Arc<Self> {
        Self::with_options(content, SequenceOptions::default())
    }

    /// A sequence over `content`.
    pub fn with_options(content: Vec<ElementRef>, options: SequenceOptions) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Self>| {
            let weak: WeakElementRef = me.clone();
            Self {
                node: Node::new(weak, options.element),
                me: me.clone(),
                state: Mutex::new(SequenceState {
                    content,
                    position: -1,
                    current: None,
                }),
                shuffle: options.shuffle,
                step_guard: StepGuard::armed(),
            }
        })
    }

    /// Loop construction: derive content by applying `factory` to every item
    /// of `data`, in order, exactly once, at construction time.
    ///
    /// The resulting sequence behaves exactly like one built from an explicit
    /// content list; re-running it never regenerates content.
    pub fn from_data<T, F>(
        mut factory: F,
        data: impl IntoIterator<Item = T>,
        options: SequenceOptions,
    ) -> Arc<Self>
    where
        F: FnMut(T) -> ElementRef,
    {
        let content = data.into_iter().map(&mut factory).collect();
        Self::with_options(content, options)
    }

    /// Snapshot of the content list, in execution order.
    pub fn content(&self) -> Vec<ElementRef> {
        self.state.lock().content.clone()
    }

    /// Current position; `-1` before the first step.
    pub fn position(&self) -> isize {
        self.state.lock().position
    }

    /// The active child, if the sequence is mid-content.
    pub fn current(&self) -> Option<ElementRef> {
        self.state.lock().current.clone()
    }

    /// Handle that advances this sequence, valid until the sequence ends.
    pub fn step_trigger(&self) -> StepTrigger {
        StepTrigger {
            sequence: self.me.clone(),
            guard: Arc::clone(&self.step_guard),
        }
    }

    /// Advance through the content, starting with a step of `increment`
    /// (subsequent auto-advance steps use the default forward increment).
    ///
    /// Each step dispatches a step event, moves the position, and runs the
    /// child at the new position, waiting for it to end. A position outside
    /// the content bounds exhausts the sequence, which then ends with
    /// [`EndReason::Complete`]. With `keep_going` false the sequence stops
    /// advancing after one child completes.
    pub async fn step(&self, increment: isize, keep_going: bool) -> FlowResult<()> {
        let mut increment = increment;
        loop {
            let position = self.state.lock().position;
            self.node.emit(&LifecycleEvent::Step { position });

            let outcome = {
                let mut state = self.state.lock();
                state.position += increment;
                let index = state.position;
                if index >= 0 && (index as usize) < state.content.len() {
                    let child = Arc::clone(&state.content[index as usize]);
                    state.current = Some(Arc::clone(&child));
                    StepOutcome::Advanced(child)
                } else {
                    state.current = None;
                    StepOutcome::Exhausted
                }
            };

            match outcome {
                StepOutcome::Advanced(child) => {
                    tracing::debug!(
                        id = ?self.node.id(),
                        child = ?child.id(),
                        "sequence advanced"
                    );
                    if let Err(err) = child.run().await {
                        // End the sequence before surfacing the child's
                        // failure so it is not left running forever.
                        Element::end(self, EndReason::Natural).await?;
                        return Err(err);
                    }
                    if !keep_going || self.step_guard.is_revoked() {
                        return Ok(());
                    }
                    increment = 1;
                }
                StepOutcome::Exhausted => {
                    return Element::end(self, EndReason::Complete).await;
                }
            }
        }
    }
}

#[async_trait]
impl Element for Sequence {
    fn node(&self) -> &Node {
        &self.node
    }

    async fn prepare(&self, direct: bool) -> FlowResult<()> {
        if !self.node.mark_prepared(direct) {
            return Ok(());
        }
        let content = {
            let mut state = self.state.lock();
            if self.shuffle {
                state.content.shuffle(&mut rand::thread_rng());
            }
            state.content.clone()
        };
        prepare_children(&self.node, &content).await
    }

    async fn run(&self) -> FlowResult<()> {
        self.node.begin_run()?;
        self.step(1, true).await?;
        self.node.completed().await;
        Ok(())
    }

    async fn end(&self, reason: EndReason) -> FlowResult<()> {
        if self.node.status() >= Status::Done {
            return Ok(());
        }

        // Stop auto-advance before touching the active child, so the child's
        // own end events cannot trigger a further step.
        self.step_guard.revoke();

        let current = self.state.lock().current.take();
        if let Some(child) = current {
            if child.status() < Status::Done {
                child.end(EndReason::SequenceAbort).await?;
            }
        }

        self.node.finish(reason);
        Ok(())
    }
}
