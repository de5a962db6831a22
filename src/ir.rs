//! Template IR.
//!
//! Nodes live in an arena ([`IrTree`]) and refer to each other by [`NodeId`].
//! Children are owned and ordered; the parent link is a plain back-reference.
//! The `alternate` of an if-chain branch is owned by that branch: the next
//! branch's parent is the previous branch, but it is not one of its children.

use serde::{Deserialize, Serialize};

use crate::config::RenderMode;
use crate::diagnostics::SourceLocation;
use crate::expression::Expr;
use crate::parse::is_void_element;
use crate::visitor::preorder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    #[default]
    Html,
    Svg,
    MathMl,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ELEMENT DATA
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum AttributeValue {
    Static(String),
    Boolean,
    Dynamic(Expr),
}

impl AttributeValue {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, AttributeValue::Dynamic(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listener {
    pub event: String,
    pub handler: Expr,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ElementDirectives {
    pub key: Option<Expr>,
    pub lwc_ref: Option<String>,
    pub spread: Option<Expr>,
    pub inner_html: Option<Expr>,
    /// Static `slot="..."` assignment.
    pub slot: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementData {
    pub name: String,
    pub namespace: Namespace,
    /// Static and dynamic attributes in source order.
    pub attributes: Vec<Attribute>,
    pub listeners: Vec<Listener>,
    pub directives: ElementDirectives,
}

impl ElementData {
    pub fn new(name: &str, namespace: Namespace) -> Self {
        ElementData {
            name: name.to_string(),
            namespace,
            attributes: Vec::new(),
            listeners: Vec::new(),
            directives: ElementDirectives::default(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn is_void(&self) -> bool {
        self.namespace == Namespace::Html && is_void_element(&self.name)
    }

    pub fn has_bindings(&self) -> bool {
        !self.listeners.is_empty() || self.attributes.iter().any(|a| a.value.is_dynamic())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum TextPart {
    Literal(String),
    Expression(Expr),
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IrKind {
    /// Root `<template>`.
    Fragment,
    Element(ElementData),
    Text {
        parts: Vec<TextPart>,
    },
    Comment {
        value: String,
    },
    /// `if:true` / `if:false`.
    If {
        condition: Expr,
        negated: bool,
    },
    IfBlock {
        condition: Expr,
        alternate: Option<NodeId>,
    },
    ElseIfBlock {
        condition: Expr,
        alternate: Option<NodeId>,
    },
    ElseBlock,
    ForEach {
        iterable: Expr,
        item: String,
        index: Option<String>,
    },
    ForOf {
        iterable: Expr,
        iterator: String,
    },
    Slot {
        name: String,
        slot_bind: Option<Expr>,
    },
    ScopedSlot {
        name: String,
        binding: String,
    },
    Component {
        data: ElementData,
        import: String,
    },
    DynamicComponent {
        data: ElementData,
        constructor: Expr,
        legacy: bool,
    },
}

impl IrKind {
    pub fn element_data(&self) -> Option<&ElementData> {
        match self {
            IrKind::Element(data)
            | IrKind::Component { data, .. }
            | IrKind::DynamicComponent { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn is_component(&self) -> bool {
        matches!(self, IrKind::Component { .. } | IrKind::DynamicComponent { .. })
    }

    pub fn is_conditional(&self) -> bool {
        matches!(
            self,
            IrKind::If { .. } | IrKind::IfBlock { .. } | IrKind::ElseIfBlock { .. } | IrKind::ElseBlock
        )
    }

    pub fn is_loop(&self) -> bool {
        matches!(self, IrKind::ForEach { .. } | IrKind::ForOf { .. })
    }

    pub fn alternate(&self) -> Option<NodeId> {
        match self {
            IrKind::IfBlock { alternate, .. } | IrKind::ElseIfBlock { alternate, .. } => *alternate,
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IrKind::Fragment => "fragment",
            IrKind::Element(_) => "element",
            IrKind::Text { .. } => "text",
            IrKind::Comment { .. } => "comment",
            IrKind::If { .. } => "if",
            IrKind::IfBlock { .. } => "if-block",
            IrKind::ElseIfBlock { .. } => "else-if-block",
            IrKind::ElseBlock => "else-block",
            IrKind::ForEach { .. } => "for-each",
            IrKind::ForOf { .. } => "for-of",
            IrKind::Slot { .. } => "slot",
            IrKind::ScopedSlot { .. } => "scoped-slot",
            IrKind::Component { .. } => "component",
            IrKind::DynamicComponent { .. } => "dynamic-component",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrNode {
    pub id: NodeId,
    key: Option<u32>,
    pub parent: Option<NodeId>,
    pub location: SourceLocation,
    pub children: Vec<NodeId>,
    pub kind: IrKind,
}

impl IrNode {
    pub fn key(&self) -> Option<u32> {
        self.key
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ARENA
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrTree {
    nodes: Vec<IrNode>,
    pub render_mode: RenderMode,
}

impl IrTree {
    pub fn new(location: SourceLocation, render_mode: RenderMode) -> Self {
        IrTree {
            nodes: vec![IrNode {
                id: NodeId(0),
                key: None,
                parent: None,
                location,
                children: Vec::new(),
                kind: IrKind::Fragment,
            }],
            render_mode,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn push(&mut self, parent: NodeId, kind: IrKind, location: SourceLocation) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(IrNode {
            id,
            key: None,
            parent: Some(parent),
            location,
            children: Vec::new(),
            kind,
        });
        id
    }

    /// Appends a new node as the last child of `parent`.
    pub fn add(&mut self, parent: NodeId, kind: IrKind, location: SourceLocation) -> NodeId {
        let id = self.push(parent, kind, location);
        self.nodes[parent.index()].children.push(id);
        id
    }

    /// Creates the next branch of an if-chain and links it as `owner`'s alternate.
    /// Returns `None` when `owner` cannot carry an alternate.
    pub fn add_alternate(
        &mut self,
        owner: NodeId,
        kind: IrKind,
        location: SourceLocation,
    ) -> Option<NodeId> {
        if !matches!(
            self.nodes[owner.index()].kind,
            IrKind::IfBlock { .. } | IrKind::ElseIfBlock { .. }
        ) {
            return None;
        }
        let id = self.push(owner, kind, location);
        match &mut self.nodes[owner.index()].kind {
            IrKind::IfBlock { alternate, .. } | IrKind::ElseIfBlock { alternate, .. } => {
                *alternate = Some(id);
            }
            _ => {}
        }
        Some(id)
    }

    pub fn node(&self, id: NodeId) -> &IrNode {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &IrKind {
        &self.nodes[id.index()].kind
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn alternate(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].kind.alternate()
    }

    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.parent(id),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IrNode> {
        self.nodes.iter()
    }

    /// Numbers every node `0..n` in pre-order. Runs once per tree.
    pub fn assign_keys(&mut self) {
        let order = preorder(self);
        for (key, id) in order.into_iter().enumerate() {
            let node = &mut self.nodes[id.index()];
            debug_assert!(node.key.is_none(), "key assigned twice");
            node.key = Some(key as u32);
        }
    }
}

pub struct Ancestors<'a> {
    tree: &'a IrTree,
    next: Option<NodeId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation::new(1, 1)
    }

    fn text(value: &str) -> IrKind {
        IrKind::Text {
            parts: vec![TextPart::Literal(value.to_string())],
        }
    }

    #[test]
    fn test_add_links_parent_and_children() {
        let mut tree = IrTree::new(loc(), RenderMode::Shadow);
        let div = tree.add(
            tree.root(),
            IrKind::Element(ElementData::new("div", Namespace::Html)),
            loc(),
        );
        let t = tree.add(div, text("hi"), loc());
        assert_eq!(tree.children(tree.root()), &[div]);
        assert_eq!(tree.parent(t), Some(div));
        assert_eq!(tree.ancestors(t).collect::<Vec<_>>(), vec![div, tree.root()]);
    }

    #[test]
    fn test_alternate_is_owned_not_child() {
        let mut tree = IrTree::new(loc(), RenderMode::Shadow);
        let branch = tree.add(
            tree.root(),
            IrKind::IfBlock {
                condition: Expr::identifier("a"),
                alternate: None,
            },
            loc(),
        );
        let other = tree.add_alternate(branch, IrKind::ElseBlock, loc()).unwrap();
        assert_eq!(tree.alternate(branch), Some(other));
        assert_eq!(tree.parent(other), Some(branch));
        assert!(tree.children(branch).is_empty());
        assert!(tree.add_alternate(other, IrKind::ElseBlock, loc()).is_none());
    }

    #[test]
    fn test_keys_are_preorder_and_unique() {
        let mut tree = IrTree::new(loc(), RenderMode::Shadow);
        let first = tree.add(
            tree.root(),
            IrKind::IfBlock {
                condition: Expr::identifier("a"),
                alternate: None,
            },
            loc(),
        );
        let other = tree.add_alternate(first, IrKind::ElseBlock, loc()).unwrap();
        let inside = tree.add(first, text("a"), loc());
        let after = tree.add(tree.root(), text("b"), loc());
        let in_else = tree.add(other, text("c"), loc());
        tree.assign_keys();

        let key = |id: NodeId| tree.node(id).key().unwrap();
        assert_eq!(key(tree.root()), 0);
        assert_eq!(key(first), 1);
        assert_eq!(key(inside), 2);
        assert_eq!(key(other), 3);
        assert_eq!(key(in_else), 4);
        assert_eq!(key(after), 5);

        let mut keys: Vec<u32> = tree.iter().filter_map(|n| n.key()).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), tree.len());
    }
}
