//! Base element machinery shared by every element kind.
//!
//! [`Node`] carries the lifecycle state every element embeds: identity,
//! parent back-reference, status, arbitrary named attributes, the
//! hand-me-down list, and the event bus. The [`Element`] trait is the shared
//! lifecycle interface implemented by composites and leaf kinds alike.

use crate::error::{FlowError, FlowResult};
use crate::events::{EventBus, LifecycleEvent};
use crate::lifecycle::{EndReason, Status};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tokio::sync::watch;

/// Shared reference to any element.
pub type ElementRef = Arc<dyn Element>;

/// Weak reference used for parent back-links; never ownership.
pub type WeakElementRef = Weak<dyn Element>;

/// Attribute names copied from a composite to its children during
/// preparation, unless a child already defines them.
///
/// Every node copies this set into an instance-local list at construction;
/// mutating one element's list never affects any other element.
pub const DEFAULT_HAND_ME_DOWNS: &[&str] = &["debug", "datastore"];

/// Configuration accepted by every element constructor.
///
/// Recognized options are explicit fields; anything else belongs in
/// `attributes` and is preserved as a plain attribute, subject to
/// hand-me-down propagation.
#[derive(Debug, Clone, Default)]
pub struct ElementOptions {
    /// Override for the attribute-propagation list. `None` seeds the
    /// instance list from [`DEFAULT_HAND_ME_DOWNS`].
    pub hand_me_downs: Option<Vec<String>>,
    /// Arbitrary named attributes set on the element at construction.
    pub attributes: BTreeMap<String, Value>,
}

impl ElementOptions {
    /// Builder-style attribute insertion.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Builder-style hand-me-down override.
    pub fn with_hand_me_downs(mut self, names: Vec<String>) -> Self {
        self.hand_me_downs = Some(names);
        self
    }
}

struct NodeState {
    id: Option<String>,
    parent: Option<WeakElementRef>,
    attributes: BTreeMap<String, Value>,
    hand_me_downs: Vec<String>,
}

/// Lifecycle state embedded in every element.
pub struct Node {
    me: WeakElementRef,
    state: Mutex<NodeState>,
    status_tx: watch::Sender<Status>,
    events: EventBus,
}

impl Node {
    /// Create a node for the element `me` points back to.
    ///
    /// Constructors use [`Arc::new_cyclic`] so the node can hand out the
    /// owning element's reference for parent linkage.
    pub fn new(me: WeakElementRef, options: ElementOptions) -> Self {
        let hand_me_downs = options.hand_me_downs.unwrap_or_else(|| {
            DEFAULT_HAND_ME_DOWNS
                .iter()
                .map(|name| (*name).to_string())
                .collect()
        });
        let (status_tx, _) = watch::channel(Status::Uninitialized);
        Self {
            me,
            state: Mutex::new(NodeState {
                id: None,
                parent: None,
                attributes: options.attributes,
                hand_me_downs,
            }),
            status_tx,
            events: EventBus::new(),
        }
    }

    /// Strong reference to the element this node belongs to.
    pub(crate) fn element(&self) -> Option<ElementRef> {
        self.me.upgrade()
    }

    /// Hierarchical id assigned by the owning composite; `None` for a root.
    pub fn id(&self) -> Option<String> {
        self.state.lock().id.clone()
    }

    pub(crate) fn set_id(&self, id: String) {
        self.state.lock().id = Some(id);
    }

    /// The owning composite, if this element has been prepared as a child.
    pub fn parent(&self) -> Option<ElementRef> {
        self.state.lock().parent.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn set_parent(&self, parent: WeakElementRef) {
        self.state.lock().parent = Some(parent);
    }

    /// Current lifecycle status.
    pub fn status(&self) -> Status {
        *self.status_tx.borrow()
    }

    /// Resolve once the element's status has reached `target`.
    pub async fn wait_for(&self, target: Status) {
        let mut rx = self.status_tx.subscribe();
        let _ = rx.wait_for(|status| *status >= target).await;
    }

    /// Resolve once the element is done.
    pub async fn completed(&self) {
        self.wait_for(Status::Done).await;
    }

    /// Value of a named attribute, if set.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.state.lock().attributes.get(name).cloned()
    }

    /// Set a named attribute.
    pub fn set_attribute(&self, name: impl Into<String>, value: Value) {
        self.state.lock().attributes.insert(name.into(), value);
    }

    /// Fill an attribute from a parent unless this element already carries a
    /// non-empty value for it.
    pub(crate) fn fill_attribute(&self, name: &str, value: Value) {
        let mut state = self.state.lock();
        let absent = match state.attributes.get(name) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        };
        if absent {
            state.attributes.insert(name.to_string(), value);
        }
    }

    /// Instance-local list of attribute names propagated to children.
    pub fn hand_me_downs(&self) -> Vec<String> {
        self.state.lock().hand_me_downs.clone()
    }

    /// Append a name to this element's propagation list.
    pub fn add_hand_me_down(&self, name: impl Into<String>) {
        self.state.lock().hand_me_downs.push(name.into());
    }

    /// Event subscriptions for this element.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Dispatch an event to this element's subscribers.
    pub fn emit(&self, event: &LifecycleEvent) {
        self.events.emit(event);
    }

    /// Transition `Uninitialized -> Prepared` and dispatch the prepare event.
    ///
    /// Returns `false` without dispatching if the element is already
    /// prepared; preparation is idempotent per run cycle.
    pub fn mark_prepared(&self, direct: bool) -> bool {
        if self.status() >= Status::Prepared {
            return false;
        }
        self.status_tx.send_replace(Status::Prepared);
        tracing::trace!(id = ?self.id(), direct, "element prepared");
        self.emit(&LifecycleEvent::Prepare { direct });
        true
    }

    /// Transition `Prepared -> Running` and dispatch the run event.
    pub fn begin_run(&self) -> FlowResult<()> {
        let status = self.status();
        if status != Status::Prepared {
            return Err(FlowError::NotRunnable {
                id: self.id(),
                status,
            });
        }
        self.status_tx.send_replace(Status::Running);
        tracing::debug!(id = ?self.id(), "element running");
        self.emit(&LifecycleEvent::Run);
        Ok(())
    }

    /// Transition to `Done` and dispatch end events, carrying `reason`.
    ///
    /// Returns `false` without dispatching if the element is already done,
    /// so a second `end` never re-notifies observers.
    pub fn finish(&self, reason: EndReason) -> bool {
        if self.status() >= Status::Done {
            return false;
        }
        self.status_tx.send_replace(Status::Done);
        tracing::debug!(id = ?self.id(), reason = %reason, "element ended");
        self.emit(&LifecycleEvent::End {
            reason: reason.clone(),
        });
        self.emit(&LifecycleEvent::AfterEnd { reason });
        true
    }
}

/// Shared lifecycle interface implemented by every element kind.
///
/// Elements are constructed, prepared once, run once, and ended once; no
/// element is reused after `end`. Composites own their children through
/// their content lists and are the only party that establishes parent links.
#[async_trait]
pub trait Element: Send + Sync {
    /// The lifecycle state embedded in this element.
    fn node(&self) -> &Node;

    /// Move the element (and, for composites, its children) to `Prepared`.
    ///
    /// `direct` is `false` when a parent composite triggers the preparation
    /// as part of its own prepare stage.
    async fn prepare(&self, direct: bool) -> FlowResult<()>;

    /// Run the element. The returned future is the element's completion
    /// signal: it resolves once the element reaches [`Status::Done`],
    /// whether it completed naturally or was aborted by an ancestor.
    async fn run(&self) -> FlowResult<()>;

    /// End the element, cascading an abort to any child that has not yet
    /// finished. Ending an already-done element is a no-op.
    async fn end(&self, reason: EndReason) -> FlowResult<()>;

    /// Current lifecycle status.
    fn status(&self) -> Status {
        self.node().status()
    }

    /// Hierarchical id, assigned by the owning composite.
    fn id(&self) -> Option<String> {
        self.node().id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Inert {
        node: Node,
    }

    impl Inert {
        fn new(options: ElementOptions) -> Arc<Self> {
            Arc::new_cyclic(|me: &std::sync::Weak<Self>| {
                let me: WeakElementRef = me.clone();
                Self {
                    node: Node::new(me, options),
                }
            })
        }
    }

    #[async_trait]
    impl Element for Inert {
        fn node(&self) -> &Node {
            &self.node
        }

        async fn prepare(&self, direct: bool) -> FlowResult<()> {
            self.node.mark_prepared(direct);
            Ok(())
        }

        async fn run(&self) -> FlowResult<()> {
            self.node.begin_run()?;
            self.node.completed().await;
            Ok(())
        }

        async fn end(&self, reason: EndReason) -> FlowResult<()> {
            self.node.finish(reason);
            Ok(())
        }
    }

    #[test]
    fn hand_me_down_lists_are_instance_local() {
        let a = Inert::new(ElementOptions::default());
        let b = Inert::new(ElementOptions::default());

        a.node().add_hand_me_down("correct_response");

        assert_eq!(
            a.node().hand_me_downs(),
            vec!["debug", "datastore", "correct_response"]
        );
        assert_eq!(b.node().hand_me_downs(), vec!["debug", "datastore"]);
    }

    #[test]
    fn fill_attribute_never_overwrites_explicit_values() {
        let element = Inert::new(ElementOptions::default().with_attribute("debug", true));

        element.node().fill_attribute("debug", json!(false));
        element.node().fill_attribute("datastore", json!("store-1"));

        assert_eq!(element.node().attribute("debug"), Some(json!(true)));
        assert_eq!(element.node().attribute("datastore"), Some(json!("store-1")));
    }

    #[test]
    fn empty_attribute_values_count_as_absent() {
        let element = Inert::new(ElementOptions::default().with_attribute("datastore", ""));

        element.node().fill_attribute("datastore", json!("store-1"));

        assert_eq!(element.node().attribute("datastore"), Some(json!("store-1")));
    }

    #[test]
    fn finish_dispatches_end_events_exactly_once() {
        let element = Inert::new(ElementOptions::default());
        let ends = Arc::new(AtomicUsize::new(0));
        {
            let ends = Arc::clone(&ends);
            element.node().events().on(EventKind::End, move |_| {
                ends.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert!(element.node().finish(EndReason::Complete));
        assert!(!element.node().finish(EndReason::Complete));
        assert_eq!(ends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn run_from_uninitialized_is_rejected() {
        let element = Inert::new(ElementOptions::default());
        let err = element.run().await.unwrap_err();
        assert_eq!(
            err,
            FlowError::NotRunnable {
                id: None,
                status: Status::Uninitialized,
            }
        );
    }
}
