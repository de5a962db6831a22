//! Static analysis.
//!
//! Classifies every IR node as static, mixed or dynamic, picks hoist roots,
//! and serializes each hoist root into the [`StaticFragmentTable`]. A hoisted
//! subtree is created once at module load and cloned per render; its mixed
//! bindings are patched in through parts.

use indexmap::IndexMap;
use serde::Serialize;

use crate::config::{CompilerConfig, RenderMode};
use crate::fragment_table::{FragmentDescriptor, PartKind, PartSlot, StaticFragmentTable};
use crate::ir::{
    Attribute, AttributeValue, ElementData, IrKind, IrTree, Namespace, NodeId, TextPart,
};
use crate::visitor::{walk_children, IrVisitor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeClass {
    /// No bindings anywhere in the subtree.
    Static,
    /// Static structure with attribute, text or listener bindings.
    Mixed,
    Dynamic,
}

impl NodeClass {
    fn join(self, other: NodeClass) -> NodeClass {
        match (self, other) {
            (NodeClass::Dynamic, _) | (_, NodeClass::Dynamic) => NodeClass::Dynamic,
            (NodeClass::Mixed, _) | (_, NodeClass::Mixed) => NodeClass::Mixed,
            _ => NodeClass::Static,
        }
    }

    pub fn is_hoistable(self) -> bool {
        self != NodeClass::Dynamic
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SitePart {
    pub slot: PartSlot,
    pub node: NodeId,
}

/// A hoist root: the fragment it instantiates and where its parts come from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoistSite {
    pub digest: String,
    pub parts: Vec<SitePart>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticAnalysis {
    classes: Vec<NodeClass>,
    sites: IndexMap<NodeId, HoistSite>,
    table: StaticFragmentTable,
}

impl StaticAnalysis {
    pub fn class_of(&self, id: NodeId) -> NodeClass {
        self.classes
            .get(id.index())
            .copied()
            .unwrap_or(NodeClass::Dynamic)
    }

    pub fn hoist_site(&self, id: NodeId) -> Option<&HoistSite> {
        self.sites.get(&id)
    }

    pub fn hoist_roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.sites.keys().copied()
    }

    pub fn table(&self) -> &StaticFragmentTable {
        &self.table
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLASSIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

/// `id` and `href="#..."` are rewritten per instance under synthetic shadow.
pub(crate) fn is_scoped_attribute(attr: &Attribute, scoped_ids: bool) -> bool {
    if !scoped_ids {
        return false;
    }
    match (&attr.value, attr.name.as_str()) {
        (AttributeValue::Static(_), "id") => true,
        (AttributeValue::Static(value), "href") => value.starts_with('#'),
        _ => false,
    }
}

fn element_class(data: &ElementData, scoped_ids: bool) -> NodeClass {
    let directives = &data.directives;
    if directives.lwc_ref.is_some() || directives.spread.is_some() || directives.inner_html.is_some()
    {
        return NodeClass::Dynamic;
    }
    let scoped = data
        .attributes
        .iter()
        .any(|attr| is_scoped_attribute(attr, scoped_ids));
    if data.has_bindings() || scoped {
        NodeClass::Mixed
    } else {
        NodeClass::Static
    }
}

fn classify(tree: &IrTree, id: NodeId, scoped_ids: bool, classes: &mut [NodeClass]) -> NodeClass {
    let mut children = NodeClass::Static;
    for &child in tree.children(id) {
        children = children.join(classify(tree, child, scoped_ids, classes));
    }
    if let Some(alternate) = tree.alternate(id) {
        classify(tree, alternate, scoped_ids, classes);
    }

    let class = match tree.kind(id) {
        IrKind::Text { parts } => {
            if parts.iter().any(|p| matches!(p, TextPart::Expression(_))) {
                NodeClass::Mixed
            } else {
                NodeClass::Static
            }
        }
        IrKind::Comment { .. } => NodeClass::Static,
        IrKind::Element(data) => element_class(data, scoped_ids).join(children),
        _ => NodeClass::Dynamic,
    };
    classes[id.index()] = class;
    class
}

struct HoistCollector<'a> {
    classes: &'a [NodeClass],
    roots: Vec<NodeId>,
}

impl<'a> IrVisitor for HoistCollector<'a> {
    fn visit_element(&mut self, tree: &IrTree, id: NodeId, _data: &ElementData) {
        if self.classes[id.index()].is_hoistable() {
            self.roots.push(id);
        } else {
            walk_children(self, tree, id);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERIALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

pub(crate) fn escape_template_literal(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${")
}

/// Text arrives entity-decoded from the parser and is re-encoded on output.
pub(crate) fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub(crate) fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

struct FragmentSerializer<'a> {
    tree: &'a IrTree,
    scoped_ids: bool,
    html: String,
    parts: Vec<SitePart>,
    next: u32,
}

impl<'a> FragmentSerializer<'a> {
    fn push_literal(&mut self, text: &str) {
        self.html.push_str(&escape_template_literal(text));
    }

    fn part(&mut self, id: u32, kind: PartKind, node: NodeId) {
        self.parts.push(SitePart {
            slot: PartSlot { id, kind },
            node,
        });
    }

    fn serialize(&mut self, node: NodeId) {
        let tree = self.tree;
        let part_id = self.next;
        self.next += 1;

        match tree.kind(node) {
            IrKind::Element(data) => {
                self.push_literal(&format!("<{}", data.name));
                for attr in &data.attributes {
                    match &attr.value {
                        AttributeValue::Static(_) if is_scoped_attribute(attr, self.scoped_ids) => {
                            let kind = PartKind::Attribute {
                                name: attr.name.clone(),
                            };
                            self.part(part_id, kind, node);
                        }
                        AttributeValue::Static(value) => {
                            self.push_literal(&format!(
                                " {}=\"{}\"",
                                attr.name,
                                escape_attribute(value)
                            ));
                        }
                        AttributeValue::Boolean => self.push_literal(&format!(" {}", attr.name)),
                        AttributeValue::Dynamic(_) => {
                            let kind = PartKind::Attribute {
                                name: attr.name.clone(),
                            };
                            self.part(part_id, kind, node);
                        }
                    }
                }
                if let Some(slot) = &data.directives.slot {
                    self.push_literal(&format!(" slot=\"{}\"", escape_attribute(slot)));
                }
                for listener in &data.listeners {
                    let kind = PartKind::Listener {
                        event: listener.event.clone(),
                    };
                    self.part(part_id, kind, node);
                }
                self.html.push('>');
                for &child in tree.children(node) {
                    self.serialize(child);
                }
                if !data.is_void() {
                    self.push_literal(&format!("</{}>", data.name));
                }
            }
            IrKind::Text { parts } => {
                if parts.iter().all(|p| matches!(p, TextPart::Literal(_))) {
                    for part in parts {
                        if let TextPart::Literal(text) = part {
                            self.push_literal(&escape_text(text));
                        }
                    }
                } else {
                    self.html.push_str(&format!("${{\"t{}\"}}", part_id));
                    self.part(part_id, PartKind::Text, node);
                }
            }
            IrKind::Comment { value } => self.push_literal(&format!("<!--{}-->", value)),
            other => {
                log::error!(
                    target: "template_compiler::internal",
                    "{} node inside a hoisted fragment",
                    other.name()
                );
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

pub fn analyze(tree: &IrTree, config: &CompilerConfig) -> StaticAnalysis {
    let mut classes = vec![NodeClass::Dynamic; tree.len()];
    let mut sites = IndexMap::new();
    let mut table = StaticFragmentTable::new();

    if config.enable_static_content_optimization {
        let scoped_ids =
            tree.render_mode == RenderMode::Shadow && !config.disable_synthetic_shadow_support;
        classify(tree, tree.root(), scoped_ids, &mut classes);
        // The root fragment itself is never hoisted.
        classes[tree.root().index()] = NodeClass::Dynamic;

        let mut collector = HoistCollector {
            classes: &classes,
            roots: Vec::new(),
        };
        collector.visit_node(tree, tree.root());

        for root in collector.roots {
            let mut serializer = FragmentSerializer {
                tree,
                scoped_ids,
                html: String::new(),
                parts: Vec::new(),
                next: 0,
            };
            serializer.serialize(root);
            let parts = serializer.parts;
            let descriptor = FragmentDescriptor {
                html: serializer.html,
                parts: parts.iter().map(|p| p.slot.clone()).collect(),
                namespace: tree
                    .kind(root)
                    .element_data()
                    .map_or(Namespace::Html, |data| data.namespace),
            };
            match table.insert(descriptor) {
                Ok(digest) => {
                    sites.insert(root, HoistSite { digest, parts });
                }
                Err(message) => log::error!(target: "template_compiler::internal", "{}", message),
            }
        }
    }
    table.freeze();

    log::debug!(
        "static analysis: {} hoist root(s), {} unique fragment(s)",
        sites.len(),
        table.len()
    );
    StaticAnalysis {
        classes,
        sites,
        table,
    }
}
