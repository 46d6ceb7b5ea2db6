//! Incremental updates checked against full encodes of the same graph

use bundler_codec::compare::diff_graphs;
use bundler_codec::{
    check_ownership, external_refs, Change, Decoder, EncodeError, Encoder, IncrementalEncoder, RefSlot, WalkError,
};
use bundler_model::{DependencySet, Document, Graph, Iid, Instance, InstanceId, Uuid, Value, VersionId};
use bundler_test_utils::{self as fixtures, SampleSite};
use pretty_assertions::assert_eq;

/// Sample site without transient fields, so decoded graphs compare equal
fn site() -> (Graph, SampleSite) {
    let (mut graph, ids) = fixtures::sample_site();
    if let Some(span) = graph.get_mut(ids.span) {
        span.remove_field("renderCache");
    }
    (graph, ids)
}

fn assert_mirrors(graph: &Graph, root: InstanceId, doc: &Document) {
    let catalog = fixtures::catalog();
    let decoded = Decoder::new(&catalog).decode(doc, &DependencySet::new()).unwrap();
    let diff = diff_graphs(graph, root, &decoded.graph, decoded.root);
    assert!(diff.is_none(), "document drifted: {}", diff.map(|d| d.to_string()).unwrap_or_default());

    let full = Encoder::new(&catalog).encode(graph, root, "m3").unwrap();
    assert_eq!(doc.len(), full.len());
    assert_eq!(doc.deps, full.deps);
}

fn iid(encoder: &IncrementalEncoder<'_>, id: InstanceId) -> Iid {
    encoder.iid_of(id).unwrap()
}

#[test]
fn fresh_encoder_matches_full_encode() {
    let (graph, ids) = site();
    let catalog = fixtures::catalog();
    let encoder = IncrementalEncoder::new(&catalog, &graph, ids.root, "m3").unwrap();

    let full = Encoder::new(&catalog).encode(&graph, ids.root, "m3").unwrap();
    assert_eq!(encoder.document(), &full);
    assert_eq!(encoder.check_invariants(), Ok(()));
    assert_eq!(
        encoder.owners(iid(&encoder, ids.span)).cloned().collect::<Vec<_>>(),
        vec![RefSlot { owner: iid(&encoder, ids.header_tree), field: "children".into() }]
    );
}

#[test]
fn field_edit_touches_only_that_entry() {
    let (mut graph, ids) = site();
    let catalog = fixtures::catalog();
    let mut encoder = IncrementalEncoder::new(&catalog, &graph, ids.root, "m3").unwrap();
    let before = encoder.document().clone();

    graph.set_field(ids.primary, "value", "#000000");
    let doc = encoder.update(&graph, &[Change::field(ids.primary, "value")]).unwrap().clone();

    let primary = iid(&encoder, ids.primary);
    for (key, entry) in &doc.map {
        if *key != primary {
            assert_eq!(Some(entry), before.map.get(key));
        }
    }
    assert_eq!(
        doc.map[&primary].field("value"),
        Some(&bundler_model::EncodedValue::String("#000000".into()))
    );
    assert_mirrors(&graph, ids.root, &doc);
}

#[test]
fn detached_component_is_pruned_with_its_subtree() {
    let (mut graph, ids) = site();
    let catalog = fixtures::catalog();
    let mut encoder = IncrementalEncoder::new(&catalog, &graph, ids.root, "m3").unwrap();
    let header_tree = iid(&encoder, ids.header_tree);

    graph.set_field(ids.root, "components", Value::List(vec![Value::Ref(ids.button)]));
    let doc = encoder.update(&graph, &[Change::field(ids.root, "components")]).unwrap().clone();

    assert_eq!(doc.len(), 4);
    assert!(!doc.map.contains_key(&header_tree));
    assert!(external_refs(&doc).is_empty());
    assert_eq!(encoder.owners(header_tree).count(), 0);
    assert_eq!(encoder.check_invariants(), Ok(()));
    assert_mirrors(&graph, ids.root, &doc);
}

#[test]
fn new_child_enters_through_its_owner() {
    let (mut graph, ids) = site();
    let catalog = fixtures::catalog();
    let mut encoder = IncrementalEncoder::new(&catalog, &graph, ids.root, "m3").unwrap();
    let before = encoder.document().clone();

    let em = fixtures::tpl_node(&mut graph, "em");
    graph.set_field(em, "component", ids.header);
    fixtures::append_child(&mut graph, ids.header_tree, em);
    // Edits to instances not yet in the document are ignored
    let changes = [Change::instance(em), Change::field(ids.header_tree, "children")];
    let doc = encoder.update(&graph, &changes).unwrap().clone();

    let em_iid = iid(&encoder, em);
    assert_eq!(em_iid, Iid(8));
    assert_eq!(doc.len(), 9);
    for (key, entry) in &before.map {
        if *key != iid(&encoder, ids.header_tree) {
            assert_eq!(Some(entry), doc.map.get(key));
        }
    }
    assert_eq!(
        encoder.weak_referrers(iid(&encoder, ids.header)).cloned().collect::<Vec<_>>(),
        vec![RefSlot { owner: em_iid, field: "component".into() }]
    );
    assert_eq!(encoder.check_invariants(), Ok(()));
    assert_mirrors(&graph, ids.root, &doc);
}

#[test]
fn moved_subtree_keeps_its_iids() {
    let (mut graph, ids) = site();
    let catalog = fixtures::catalog();
    let mut encoder = IncrementalEncoder::new(&catalog, &graph, ids.root, "m3").unwrap();
    let span = iid(&encoder, ids.span);

    // Move the span from the tree root under the header component's
    // second tree node
    let children = graph.field(ids.header_tree, "children").and_then(Value::as_list).unwrap().to_vec();
    let p = children[1].as_ref_id().unwrap();
    graph.set_field(ids.header_tree, "children", Value::List(vec![Value::Ref(p)]));
    fixtures::append_child(&mut graph, p, ids.span);
    let changes = [Change::field(ids.header_tree, "children"), Change::field(p, "children")];
    let doc = encoder.update(&graph, &changes).unwrap().clone();

    assert_eq!(doc.len(), 8);
    assert_eq!(iid(&encoder, ids.span), span);
    assert_eq!(
        encoder.owners(span).cloned().collect::<Vec<_>>(),
        vec![RefSlot { owner: iid(&encoder, p), field: "children".into() }]
    );
    assert_eq!(encoder.check_invariants(), Ok(()));
    assert_mirrors(&graph, ids.root, &doc);
}

#[test]
fn indexes_agree_with_an_encoder_resumed_from_the_output() {
    let (mut graph, ids) = site();
    let catalog = fixtures::catalog();
    let mut encoder = IncrementalEncoder::new(&catalog, &graph, ids.root, "m3").unwrap();

    let extra = fixtures::token(&mut graph, ids.root, "muted", "#999999");
    let em = fixtures::tpl_node(&mut graph, "em");
    graph.set_field(em, "component", ids.button);
    graph.set_field(ids.header_tree, "children", Value::List(vec![Value::Ref(em)]));
    graph.set_field(ids.span, "component", ids.header);
    let changes = [
        Change::field(ids.root, "tokens"),
        Change::field(ids.header_tree, "children"),
        Change::instance(ids.span),
        Change::instance(extra),
    ];
    let doc = encoder.update(&graph, &changes).unwrap().clone();
    assert_mirrors(&graph, ids.root, &doc);

    let decoded = Decoder::new(&catalog).decode(&doc, &DependencySet::new()).unwrap();
    let resumed = IncrementalEncoder::from_decoded(&catalog, doc.clone(), &decoded);
    assert_eq!(resumed.document(), &doc);
    assert_eq!(resumed.check_invariants(), Ok(()));
    for key in doc.map.keys() {
        assert_eq!(
            resumed.owners(*key).collect::<Vec<_>>(),
            encoder.owners(*key).collect::<Vec<_>>(),
            "owners of {key}"
        );
        assert_eq!(
            resumed.weak_referrers(*key).collect::<Vec<_>>(),
            encoder.weak_referrers(*key).collect::<Vec<_>>(),
            "weak referrers of {key}"
        );
    }
}

#[test]
fn resumed_encoder_keeps_updating() {
    let (graph, ids) = site();
    let catalog = fixtures::catalog();
    let doc = Encoder::new(&catalog).encode(&graph, ids.root, "m3").unwrap();
    let decoded = Decoder::new(&catalog).decode(&doc, &DependencySet::new()).unwrap();
    let mut resumed = IncrementalEncoder::from_decoded(&catalog, doc, &decoded);
    assert_eq!(resumed.root(), decoded.root);

    let mut graph = decoded.graph;
    let card = fixtures::component(&mut graph, decoded.root, "Card");
    let doc = resumed.update(&graph, &[Change::field(decoded.root, "components")]).unwrap().clone();

    assert_eq!(resumed.iid_of(card), Some(Iid(8)));
    assert_eq!(resumed.check_invariants(), Ok(()));
    assert_mirrors(&graph, decoded.root, &doc);
    assert!(check_ownership(&resumed.into_document()).is_empty());
}

#[test]
fn external_target_origin_tracks_the_deps() {
    let (mut graph, ids) = site();
    let catalog = fixtures::catalog();
    let mut encoder = IncrementalEncoder::new(&catalog, &graph, ids.root, "m3").unwrap();

    let shared = fixtures::foreign_stub(&mut graph, "Component", Uuid::new_v4(), "kit@2");
    graph.set_field(ids.span, "component", shared);
    let doc = encoder.update(&graph, &[Change::field(ids.span, "component")]).unwrap().clone();
    assert_eq!(doc.deps, vec![VersionId::new("kit@2")]);
    assert_eq!(external_refs(&doc).len(), 1);

    graph.set_field(ids.span, "component", ids.button);
    let doc = encoder.update(&graph, &[Change::field(ids.span, "component")]).unwrap().clone();
    assert!(doc.deps.is_empty());
    assert!(external_refs(&doc).is_empty());
    assert_mirrors(&graph, ids.root, &doc);
}

#[test]
fn weak_target_outside_the_document_needs_a_uuid() {
    let (mut graph, ids) = site();
    let catalog = fixtures::catalog();
    let mut encoder = IncrementalEncoder::new(&catalog, &graph, ids.root, "m3").unwrap();

    let loose = graph.insert(
        Instance::new("Component")
            .with_field("name", "Loose")
            .with_field("site", ids.root),
    );
    graph.set_field(ids.span, "component", loose);
    let err = encoder.update(&graph, &[Change::field(ids.span, "component")]).unwrap_err();
    assert_eq!(
        err,
        EncodeError::UnaddressableWeakTarget { owner: ids.span, field: "component".into(), target: loose }
    );
}

#[test]
fn edited_instance_is_validated_against_its_class() {
    let (mut graph, ids) = site();
    let catalog = fixtures::catalog();
    let mut encoder = IncrementalEncoder::new(&catalog, &graph, ids.root, "m3").unwrap();

    graph.set_field(ids.primary, "shade", "dark");
    let err = encoder.update(&graph, &[Change::field(ids.primary, "shade")]).unwrap_err();
    assert!(
        matches!(err, EncodeError::Schema(WalkError::UnknownField { ref field, .. }) if field == "shade"),
        "{err}"
    );
}
