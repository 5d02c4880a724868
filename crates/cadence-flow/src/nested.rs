//! Preparation protocol for nested elements.
//!
//! Invoked by every composite during its own prepare stage. The protocol is
//! stateless and idempotent with respect to ids and parent links: re-running
//! it over the same unchanged list assigns the same ids and the same parent.

use crate::element::{ElementRef, Node};
use crate::error::FlowResult;

/// Link, identify, configure, and prepare a composite's children, in order:
///
/// 1. each child's parent reference is set to the owning composite;
/// 2. each child is assigned `"<i>"` (root parent) or `"<parentId>_<i>"`;
/// 3. every attribute named in the parent's hand-me-down list is copied to
///    each child unless the child already carries a non-empty value for it;
/// 4. each child's own prepare stage runs, flagged as an indirect call.
pub async fn prepare_children(parent: &Node, children: &[ElementRef]) -> FlowResult<()> {
    let parent_id = parent.id();
    let hand_me_downs = parent.hand_me_downs();
    let parent_ref = parent.element();

    for (index, child) in children.iter().enumerate() {
        if let Some(parent_ref) = &parent_ref {
            child.node().set_parent(std::sync::Arc::downgrade(parent_ref));
        }

        let id = match &parent_id {
            Some(parent_id) => format!("{parent_id}_{index}"),
            None => index.to_string(),
        };
        child.node().set_id(id);

        for name in &hand_me_downs {
            if let Some(value) = parent.attribute(name) {
                child.node().fill_attribute(name, value);
            }
        }
    }

    // Preparation runs after all siblings are linked and identified, so a
    // child observing the tree during its prepare event sees final ids.
    for child in children {
        child.prepare(false).await?;
    }

    Ok(())
}
