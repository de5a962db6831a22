use crate::ir::{ElementData, IrKind, IrTree, NodeId};

/// The IrVisitor trait defines the single authoritative traversal of an [`IrTree`].
///
/// Rules:
/// 1. Order is fixed: a node, then its children, then its if-chain alternate.
/// 2. Implementers override `visit_*` methods to add behavior.
/// 3. Implementers call `walk_*` functions to continue traversal unless pruning is intended.
pub trait IrVisitor {
    fn visit_node(&mut self, tree: &IrTree, id: NodeId) {
        walk_node(self, tree, id);
    }

    fn visit_element(&mut self, tree: &IrTree, id: NodeId, _data: &ElementData) {
        walk_children(self, tree, id);
    }

    fn visit_component(&mut self, tree: &IrTree, id: NodeId, _data: &ElementData) {
        walk_children(self, tree, id);
    }

    fn visit_slot(&mut self, tree: &IrTree, id: NodeId, _name: &str) {
        walk_children(self, tree, id);
    }

    fn visit_scoped_slot(&mut self, tree: &IrTree, id: NodeId) {
        walk_children(self, tree, id);
    }

    fn visit_control_flow(&mut self, tree: &IrTree, id: NodeId) {
        walk_children(self, tree, id);
        walk_alternate(self, tree, id);
    }

    fn visit_leaf(&mut self, _tree: &IrTree, _id: NodeId) {
        // Text and comments have nothing to walk
    }
}

pub fn walk_node<V: IrVisitor + ?Sized>(visitor: &mut V, tree: &IrTree, id: NodeId) {
    match tree.kind(id) {
        IrKind::Fragment => walk_children(visitor, tree, id),
        IrKind::Element(data) => visitor.visit_element(tree, id, data),
        IrKind::Component { data, .. } | IrKind::DynamicComponent { data, .. } => {
            visitor.visit_component(tree, id, data)
        }
        IrKind::Slot { name, .. } => visitor.visit_slot(tree, id, name),
        IrKind::ScopedSlot { .. } => visitor.visit_scoped_slot(tree, id),
        IrKind::Text { .. } | IrKind::Comment { .. } => visitor.visit_leaf(tree, id),
        IrKind::If { .. }
        | IrKind::IfBlock { .. }
        | IrKind::ElseIfBlock { .. }
        | IrKind::ElseBlock
        | IrKind::ForEach { .. }
        | IrKind::ForOf { .. } => visitor.visit_control_flow(tree, id),
    }
}

pub fn walk_children<V: IrVisitor + ?Sized>(visitor: &mut V, tree: &IrTree, id: NodeId) {
    for &child in tree.children(id) {
        visitor.visit_node(tree, child);
    }
}

pub fn walk_alternate<V: IrVisitor + ?Sized>(visitor: &mut V, tree: &IrTree, id: NodeId) {
    if let Some(alternate) = tree.alternate(id) {
        visitor.visit_node(tree, alternate);
    }
}

struct Preorder(Vec<NodeId>);

impl IrVisitor for Preorder {
    fn visit_node(&mut self, tree: &IrTree, id: NodeId) {
        self.0.push(id);
        walk_node(self, tree, id);
    }
}

/// Every node reachable from the root, in traversal order.
pub fn preorder(tree: &IrTree) -> Vec<NodeId> {
    let mut collector = Preorder(Vec::with_capacity(tree.len()));
    collector.visit_node(tree, tree.root());
    collector.0
}
