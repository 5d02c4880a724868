//! Preparation-pass behavior: ids, parent links, hand-me-downs, shuffle.

use cadence_flow::{
    Element, ElementOptions, ElementRef, EventKind, Parallel, Sequence, SequenceOptions, Status,
};
use cadence_testkit::Probe;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn probes(n: usize) -> (Vec<Arc<Probe>>, Vec<ElementRef>) {
    let probes: Vec<Arc<Probe>> = (0..n).map(|_| Probe::new()).collect();
    let content = probes
        .iter()
        .map(|p| Arc::clone(p) as ElementRef)
        .collect();
    (probes, content)
}

#[tokio::test]
async fn root_children_get_bare_index_ids() {
    let (probes, content) = probes(3);
    let sequence = Sequence::new(content);

    sequence.prepare(true).await.unwrap();

    assert_eq!(sequence.id(), None);
    let ids: Vec<_> = probes.iter().map(|p| p.id().unwrap()).collect();
    assert_eq!(ids, ["0", "1", "2"]);
}

#[tokio::test]
async fn nested_children_join_parent_id_with_underscore() {
    let (inner_probes, inner_content) = probes(2);
    let inner = Sequence::new(inner_content);
    let outer = Sequence::new(vec![
        Probe::new() as ElementRef,
        Arc::clone(&inner) as ElementRef,
    ]);

    outer.prepare(true).await.unwrap();

    assert_eq!(inner.id(), Some("1".into()));
    assert_eq!(inner_probes[0].id(), Some("1_0".into()));
    assert_eq!(inner_probes[1].id(), Some("1_1".into()));
    assert!(Arc::ptr_eq(
        &inner.node().parent().unwrap(),
        &(Arc::clone(&outer) as ElementRef),
    ));
}

#[tokio::test]
async fn hand_me_downs_reach_grandchildren_through_the_middle_layer() {
    let leaf = Probe::new();
    let middle = Sequence::new(vec![Arc::clone(&leaf) as ElementRef]);
    let root = Sequence::with_options(
        vec![Arc::clone(&middle) as ElementRef],
        SequenceOptions {
            shuffle: false,
            element: ElementOptions::default().with_attribute("datastore", "session-store"),
        },
    );

    root.prepare(true).await.unwrap();

    assert_eq!(
        middle.node().attribute("datastore"),
        Some(json!("session-store"))
    );
    assert_eq!(
        leaf.node().attribute("datastore"),
        Some(json!("session-store"))
    );
}

#[tokio::test]
async fn a_childs_own_attribute_survives_propagation() {
    let child = Probe::with_options(ElementOptions::default().with_attribute("debug", false));
    let parent = Sequence::with_options(
        vec![Arc::clone(&child) as ElementRef],
        SequenceOptions {
            shuffle: false,
            element: ElementOptions::default().with_attribute("debug", true),
        },
    );

    parent.prepare(true).await.unwrap();

    assert_eq!(child.node().attribute("debug"), Some(json!(false)));
}

#[tokio::test]
async fn hand_me_down_lists_never_leak_across_composites() {
    let a = Sequence::new(Vec::new());
    a.node().add_hand_me_down("correct_response");

    let b = Sequence::new(Vec::new());
    let c = Parallel::new(Vec::new());

    assert_eq!(
        a.node().hand_me_downs(),
        vec!["debug", "datastore", "correct_response"]
    );
    assert_eq!(b.node().hand_me_downs(), vec!["debug", "datastore"]);
    assert_eq!(c.node().hand_me_downs(), vec!["debug", "datastore"]);
}

#[tokio::test]
async fn preparing_twice_dispatches_one_prepare_pass() {
    let (probes, content) = probes(2);
    let sequence = Sequence::new(content);

    let prepares = Arc::new(AtomicUsize::new(0));
    {
        let prepares = Arc::clone(&prepares);
        probes[0].node().events().on(EventKind::Prepare, move |_| {
            prepares.fetch_add(1, Ordering::SeqCst);
        });
    }

    sequence.prepare(true).await.unwrap();
    sequence.prepare(true).await.unwrap();

    assert_eq!(prepares.load(Ordering::SeqCst), 1);
    assert_eq!(probes[0].id(), Some("0".into()));
    assert_eq!(probes[0].status(), Status::Prepared);
}

#[tokio::test]
async fn shuffle_permutes_without_losing_children() {
    let (_, content) = probes(100);
    let original = content.clone();
    let sequence = Sequence::with_options(
        content,
        SequenceOptions {
            shuffle: true,
            element: ElementOptions::default(),
        },
    );

    sequence.prepare(true).await.unwrap();
    let shuffled = sequence.content();

    assert_eq!(shuffled.len(), original.len());
    for child in &original {
        assert!(shuffled.iter().any(|other| Arc::ptr_eq(child, other)));
    }
    // A uniform permutation of 100 elements lands back on the identity with
    // probability 1/100!, so a stable order means the shuffle did not happen.
    let same_order = original
        .iter()
        .zip(shuffled.iter())
        .all(|(a, b)| Arc::ptr_eq(a, b));
    assert!(!same_order);

    // Ids follow the shuffled order, not construction order.
    for (index, child) in shuffled.iter().enumerate() {
        assert_eq!(child.id(), Some(index.to_string()));
    }
}
