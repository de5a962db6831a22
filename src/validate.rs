//! Tree-level validation.
//!
//! Runs over the built arena and checks rules that need parent context:
//! scoped slot placement, duplicate `<slot>` declarations, mixed slot content
//! under a component, and `key` directives outside of iteration.

use indexmap::{IndexMap, IndexSet};

use crate::diagnostics::{
    Diagnostics, SourceLocation, Step, VAL_DUPLICATE_SLOT, VAL_MIXED_SLOT_CONTENT,
    VAL_SCOPED_SLOT_PLACEMENT, W_KEY_OUTSIDE_ITERATION,
};
use crate::ir::{ElementData, IrKind, IrTree, NodeId};
use crate::visitor::{walk_children, IrVisitor};

struct TreeValidator<'d> {
    diag: &'d mut Diagnostics,
    slots: IndexMap<String, Vec<NodeId>>,
    outcome: Step<()>,
}

impl<'d> TreeValidator<'d> {
    fn report(&mut self, code: &str, message: &str, location: SourceLocation) {
        if self.outcome.is_ok() {
            self.outcome = self.diag.error(code, message, location);
        }
    }

    fn check_key_placement(&mut self, tree: &IrTree, id: NodeId, data: &ElementData) {
        if data.directives.key.is_none() {
            return;
        }
        let in_loop = tree
            .ancestors(id)
            .find(|&ancestor| !tree.kind(ancestor).is_conditional())
            .map_or(false, |ancestor| tree.kind(ancestor).is_loop());
        if !in_loop {
            self.diag.warn(
                W_KEY_OUTSIDE_ITERATION,
                &format!("key on <{}> has no effect outside of an iteration", data.name),
                tree.node(id).location,
            );
        }
    }

    fn check_slot_content(&mut self, tree: &IrTree, component: NodeId, data: &ElementData) {
        let mut scoped: IndexSet<&str> = IndexSet::new();
        let mut regular: IndexSet<String> = IndexSet::new();
        for &child in tree.children(component) {
            match tree.kind(child) {
                IrKind::ScopedSlot { name, .. } => {
                    scoped.insert(name.as_str());
                }
                IrKind::Comment { .. } => {}
                _ => {
                    regular.insert(slot_name_of(tree, child));
                }
            }
        }
        if let Some(name) = scoped.iter().find(|name| regular.contains(**name)) {
            let label = if name.is_empty() { "default" } else { *name };
            self.report(
                VAL_MIXED_SLOT_CONTENT,
                &format!(
                    "<{}> mixes scoped and regular content for the {} slot",
                    data.name, label
                ),
                tree.node(component).location,
            );
        }
    }
}

/// Slot a child of a component projects into.
pub(crate) fn slot_name_of(tree: &IrTree, id: NodeId) -> String {
    let kind = tree.kind(id);
    if let Some(data) = kind.element_data() {
        return data.directives.slot.clone().unwrap_or_default();
    }
    match kind {
        IrKind::ScopedSlot { name, .. } => name.clone(),
        _ if kind.is_conditional() || kind.is_loop() => tree
            .children(id)
            .first()
            .map(|&child| slot_name_of(tree, child))
            .unwrap_or_default(),
        _ => String::new(),
    }
}

fn inside_conditional(tree: &IrTree, id: NodeId) -> bool {
    tree.ancestors(id)
        .any(|ancestor| tree.kind(ancestor).is_conditional())
}

impl<'d> IrVisitor for TreeValidator<'d> {
    fn visit_element(&mut self, tree: &IrTree, id: NodeId, data: &ElementData) {
        self.check_key_placement(tree, id, data);
        walk_children(self, tree, id);
    }

    fn visit_component(&mut self, tree: &IrTree, id: NodeId, data: &ElementData) {
        self.check_key_placement(tree, id, data);
        self.check_slot_content(tree, id, data);
        walk_children(self, tree, id);
    }

    fn visit_slot(&mut self, tree: &IrTree, id: NodeId, name: &str) {
        self.slots.entry(name.to_string()).or_default().push(id);
        walk_children(self, tree, id);
    }

    fn visit_scoped_slot(&mut self, tree: &IrTree, id: NodeId) {
        let placed = tree
            .parent(id)
            .map_or(false, |parent| tree.kind(parent).is_component());
        if !placed {
            self.report(
                VAL_SCOPED_SLOT_PLACEMENT,
                "<template lwc:slot-data> must be a direct child of a component",
                tree.node(id).location,
            );
        }
        walk_children(self, tree, id);
    }
}

/// Validates the tree. Duplicate slots are allowed when one of them is conditional.
pub fn validate_ir(tree: &IrTree, diag: &mut Diagnostics) -> Step<()> {
    let mut validator = TreeValidator {
        diag,
        slots: IndexMap::new(),
        outcome: Ok(()),
    };
    validator.visit_node(tree, tree.root());

    let slots = std::mem::take(&mut validator.slots);
    for (name, ids) in &slots {
        if ids.len() < 2 || ids.iter().any(|&id| inside_conditional(tree, id)) {
            continue;
        }
        let label = if name.is_empty() {
            "default slot".to_string()
        } else {
            format!("slot \"{}\"", name)
        };
        validator.report(
            VAL_DUPLICATE_SLOT,
            &format!("Duplicate {} declaration", label),
            tree.node(ids[1]).location,
        );
    }

    log::trace!("validated {} slot name(s)", slots.len());
    validator.outcome
}
