//! Testing utilities for the bundler workspace
//!
//! A small design-model catalog (sites, components, template trees, style
//! tokens, project dependencies) plus graph builders over it.

#![allow(missing_docs)]

use bundler_catalog::{FieldDescriptor, ModelClass, TypeCatalog};
use bundler_model::{Graph, Instance, InstanceId, Uuid, Value, VersionId};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct Named;

impl ModelClass for Named {
    const NAME: &'static str = "Named";

    fn fields() -> Vec<FieldDescriptor> {
        vec![FieldDescriptor::scalar("name")]
    }
}

pub struct Site;

impl ModelClass for Site {
    const NAME: &'static str = "Site";
    const PARENT: Option<&'static str> = Some("Named");

    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::list("components"),
            FieldDescriptor::list("tokens").optional(),
            FieldDescriptor::plain_map("settings").optional(),
            FieldDescriptor::list("projectDeps").optional(),
        ]
    }
}

pub struct Component;

impl ModelClass for Component {
    const NAME: &'static str = "Component";
    const PARENT: Option<&'static str> = Some("Named");

    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::owned("tree").optional(),
            FieldDescriptor::weak("site"),
            FieldDescriptor::list("params").optional(),
        ]
    }
}

pub struct TplNode;

impl ModelClass for TplNode {
    const NAME: &'static str = "TplNode";

    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::scalar("tag"),
            FieldDescriptor::list("children").optional(),
            FieldDescriptor::weak("component").optional(),
            FieldDescriptor::weak_map("styles").optional(),
            FieldDescriptor::scalar("renderCache").transient().optional(),
        ]
    }
}

pub struct StyleToken;

impl ModelClass for StyleToken {
    const NAME: &'static str = "StyleToken";
    const PARENT: Option<&'static str> = Some("Named");

    fn fields() -> Vec<FieldDescriptor> {
        vec![FieldDescriptor::scalar("value")]
    }
}

pub struct ProjectDependency;

impl ModelClass for ProjectDependency {
    const NAME: &'static str = "ProjectDependency";

    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::scalar("pkgId"),
            FieldDescriptor::scalar("version"),
            FieldDescriptor::weak("site").optional(),
        ]
    }
}

/// The fixture catalog
pub fn catalog() -> TypeCatalog {
    TypeCatalog::builder()
        .register::<Named>()
        .register::<Site>()
        .register::<Component>()
        .register::<TplNode>()
        .register::<StyleToken>()
        .register::<ProjectDependency>()
        .build()
        .expect("fixture catalog is valid")
}

pub fn shared_catalog() -> Arc<TypeCatalog> {
    Arc::new(catalog())
}

/// Empty site with a fresh uuid
pub fn site(graph: &mut Graph, name: &str) -> InstanceId {
    graph.insert(
        Instance::new(Site::NAME)
            .with_new_uuid()
            .with_field("name", name)
            .with_field("components", Value::List(Vec::new())),
    )
}

/// Component owned by `site`, weakly pointing back at it
pub fn component(graph: &mut Graph, site: InstanceId, name: &str) -> InstanceId {
    let id = graph.insert(
        Instance::new(Component::NAME)
            .with_new_uuid()
            .with_field("name", name)
            .with_field("site", site),
    );
    graph.push_to_list(site, "components", id);
    id
}

/// Detached template node
pub fn tpl_node(graph: &mut Graph, tag: &str) -> InstanceId {
    graph.insert(
        Instance::new(TplNode::NAME)
            .with_new_uuid()
            .with_field("tag", tag),
    )
}

/// Make `node` the template tree of `component`
pub fn set_tree(graph: &mut Graph, component: InstanceId, node: InstanceId) {
    graph.set_field(component, "tree", node);
}

/// Append `child` to `parent`'s children
pub fn append_child(graph: &mut Graph, parent: InstanceId, child: InstanceId) {
    graph.push_to_list(parent, "children", child);
}

/// Style token owned by `site`
pub fn token(graph: &mut Graph, site: InstanceId, name: &str, value: &str) -> InstanceId {
    let id = graph.insert(
        Instance::new(StyleToken::NAME)
            .with_new_uuid()
            .with_field("name", name)
            .with_field("value", value),
    );
    graph.push_to_list(site, "tokens", id);
    id
}

/// Placeholder for an instance that lives in a dependency document
///
/// Only its identity matters: it is never inlined, so it carries no fields.
pub fn foreign_stub(graph: &mut Graph, class: &str, uuid: Uuid, origin: &str) -> InstanceId {
    graph.insert(
        Instance::new(class)
            .with_uuid(uuid)
            .with_origin(VersionId::new(origin)),
    )
}

/// Handles into [`sample_site`]
#[derive(Debug, Clone, Copy)]
pub struct SampleSite {
    pub root: InstanceId,
    pub header: InstanceId,
    pub button: InstanceId,
    pub primary: InstanceId,
    pub accent: InstanceId,
    pub header_tree: InstanceId,
    pub span: InstanceId,
}

/// A site exercising every field kind
///
/// - components `Header` (with a template tree) and `Button`
/// - a template node instancing `Button` through a weak reference
/// - styles pointing at tokens through a weak plain map
/// - nested plain settings and scalar params
pub fn sample_site() -> (Graph, SampleSite) {
    let mut graph = Graph::new();
    let root = site(&mut graph, "home");
    let header = component(&mut graph, root, "Header");
    let button = component(&mut graph, root, "Button");
    let primary = token(&mut graph, root, "primary", "#0050ff");
    let accent = token(&mut graph, root, "accent", "#ff4081");

    let div = tpl_node(&mut graph, "div");
    let span = tpl_node(&mut graph, "span");
    let p = tpl_node(&mut graph, "p");
    set_tree(&mut graph, header, div);
    append_child(&mut graph, div, span);
    append_child(&mut graph, div, p);
    graph.set_field(span, "component", button);
    graph.set_field(span, "renderCache", "<span/>");

    let mut styles = BTreeMap::new();
    styles.insert("color".to_string(), Value::Ref(primary));
    styles.insert("border".to_string(), Value::List(vec![Value::Ref(accent), Value::Int(1)]));
    graph.set_field(p, "styles", Value::Map(styles));

    let mut settings = BTreeMap::new();
    settings.insert("theme".to_string(), Value::from("dark"));
    settings.insert("grid".to_string(), Value::from(vec![8i64, 16]));
    settings.insert("ratio".to_string(), Value::Float(1.5));
    graph.set_field(root, "settings", Value::Map(settings));
    graph.set_field(header, "params", vec!["title", "subtitle"]);

    (
        graph,
        SampleSite {
            root,
            header,
            button,
            primary,
            accent,
            header_tree: div,
            span,
        },
    )
}
