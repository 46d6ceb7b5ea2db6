//! Weak references that cross into dependency documents

use bundler_codec::{external_refs, DecodeError, DecodeOptions, Decoder, Encoder};
use bundler_model::{
    DependencySet, Document, EncodedValue, Graph, Iid, Instance, Uuid, Value, VersionId,
};
use bundler_test_utils as fixtures;
use std::collections::BTreeMap;

const PKG: &str = "design-system@3";

/// Dependency document with one token, plus that token's uuid
fn package() -> (Document, Uuid) {
    let catalog = fixtures::catalog();
    let mut graph = Graph::new();
    let root = fixtures::site(&mut graph, "design-system");
    let brand = fixtures::token(&mut graph, root, "brand", "#123456");
    let uuid = graph.get(brand).and_then(Instance::uuid).unwrap();
    let doc = Encoder::new(&catalog).encode(&graph, root, "m3").unwrap();
    (doc, uuid)
}

/// Project whose template styles point at the dependency's token
fn project(token_uuid: Uuid) -> Document {
    let catalog = fixtures::catalog();
    let mut graph = Graph::new();
    let root = fixtures::site(&mut graph, "app");
    let page = fixtures::component(&mut graph, root, "Page");
    let node = fixtures::tpl_node(&mut graph, "main");
    fixtures::set_tree(&mut graph, page, node);

    let brand = fixtures::foreign_stub(&mut graph, "StyleToken", token_uuid, PKG);
    let mut styles = BTreeMap::new();
    styles.insert("color".to_string(), Value::Ref(brand));
    graph.set_field(node, "styles", Value::Map(styles));

    Encoder::new(&catalog).encode(&graph, root, "m3").unwrap()
}

fn styled_target(decoded: &bundler_codec::Decoded) -> Value {
    let g = &decoded.graph;
    let page = g.field(decoded.root, "components").and_then(Value::as_list).unwrap()[0]
        .as_ref_id()
        .unwrap();
    let node = g.follow(page, "tree").unwrap();
    match g.field(node, "styles") {
        Some(Value::Map(styles)) => styles["color"].clone(),
        other => panic!("unexpected styles: {other:?}"),
    }
}

#[test]
fn encoder_records_dependency_and_leaves_target_out() {
    let (_, uuid) = package();
    let doc = project(uuid);

    assert_eq!(doc.deps, vec![VersionId::new(PKG)]);
    assert_eq!(doc.len(), 3);
    let external = external_refs(&doc);
    assert_eq!(external.len(), 1);
    assert_eq!(external[0].address.uuid, Some(uuid));
    assert_eq!(external[0].field, "styles");
}

#[test]
fn foreign_reference_resolves_into_the_dependency() {
    let (pkg, uuid) = package();
    let doc = project(uuid);
    let deps: DependencySet = [(VersionId::new(PKG), pkg)].into_iter().collect();

    let catalog = fixtures::catalog();
    let decoded = Decoder::new(&catalog).decode(&doc, &deps).unwrap();
    let target = styled_target(&decoded).as_ref_id().unwrap();
    let token = decoded.graph.get(target).unwrap();

    assert_eq!(token.class().as_str(), "StyleToken");
    assert_eq!(token.uuid(), Some(uuid));
    assert_eq!(token.origin(), Some(&VersionId::new(PKG)));
    assert_eq!(token.field("name").and_then(Value::as_str), Some("brand"));

    let dep_root = decoded.dependency_root(&VersionId::new(PKG)).unwrap();
    assert_eq!(decoded.graph.get(dep_root).map(|i| i.class().as_str()), Some("Site"));
}

#[test]
fn missing_dependency_is_unresolved_not_corrupt() {
    let (_, uuid) = package();
    let doc = project(uuid);

    let catalog = fixtures::catalog();
    let err = Decoder::new(&catalog).decode(&doc, &DependencySet::new()).unwrap_err();
    assert!(err.is_retryable());
    assert!(!err.is_corruption());
    match err {
        DecodeError::UnresolvedDependency { uuid: missing, field, document, .. } => {
            assert_eq!(missing, uuid);
            assert_eq!(field, "styles");
            assert_eq!(document, None);
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// Appends a second component at `iid`, owned by the site
fn append_component_at(doc: &mut Document, iid: Iid) {
    let mut extra = doc.map[&Iid(1)].clone();
    extra.iid = iid;
    extra.uuid = Some(Uuid::new_v4());
    extra.fields.remove("tree");
    doc.map.insert(iid, extra);
    match doc.map.get_mut(&Iid::ROOT).and_then(|e| e.fields.get_mut("components")) {
        Some(EncodedValue::List(items)) => items.push(EncodedValue::owned(iid)),
        other => panic!("unexpected components: {other:?}"),
    }
}

#[test]
fn local_entry_at_the_external_iid_does_not_capture_the_reference() {
    let (pkg, uuid) = package();
    let mut doc = project(uuid);
    let external = external_refs(&doc);
    let iid_ref = external[0].address.iid_ref;
    append_component_at(&mut doc, iid_ref);
    assert!(bundler_codec::check_ownership(&doc).is_empty());

    let catalog = fixtures::catalog();
    let err = Decoder::new(&catalog).decode(&doc, &DependencySet::new()).unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(err, DecodeError::UnresolvedDependency { uuid: missing, .. } if missing == uuid));

    let deps: DependencySet = [(VersionId::new(PKG), pkg)].into_iter().collect();
    let decoded = Decoder::new(&catalog).decode(&doc, &deps).unwrap();
    let target = styled_target(&decoded).as_ref_id().unwrap();
    let token = decoded.graph.get(target).unwrap();
    assert_eq!(token.class().as_str(), "StyleToken");
    assert_eq!(token.origin(), Some(&VersionId::new(PKG)));
}

#[test]
fn loose_mode_keeps_the_address() {
    let (_, uuid) = package();
    let doc = project(uuid);

    let catalog = fixtures::catalog();
    let decoded = Decoder::new(&catalog)
        .with_options(DecodeOptions::default().with_loose(true))
        .decode(&doc, &DependencySet::new())
        .unwrap();
    match styled_target(&decoded) {
        Value::Unresolved(addr) => assert_eq!(addr.uuid, Some(uuid)),
        other => panic!("expected unresolved, got {other:?}"),
    }

    // unresolved values re-encode verbatim
    let again = Encoder::new(&catalog).encode(&decoded.graph, decoded.root, "m3").unwrap();
    assert_eq!(external_refs(&again), external_refs(&doc));
}
