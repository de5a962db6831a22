//! Transformer set.
//!
//! One transformer per IR node kind, dispatched by an exhaustive match. Each
//! produces a list of [`Stmt`]: "emit markup" and "yield node" operations the
//! code emitter turns into the render function body.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::config::{CompilerConfig, RenderMode};
use crate::diagnostics::{
    CompilerError, CompilerWarning, INT_MISSING_KEY, INT_UNEXPECTED_NODE, W_MISSING_LOOP_KEY,
};
use crate::expression::Expr;
use crate::fragment_table::PartKind;
use crate::ir::{AttributeValue, ElementData, IrKind, IrTree, NodeId, TextPart};
use crate::static_analysis::{
    escape_attribute, escape_text, is_scoped_attribute, HoistSite, StaticAnalysis,
};
use crate::validate::slot_name_of;

// ═══════════════════════════════════════════════════════════════════════════════
// STATEMENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum KeyRef {
    Static(u32),
    /// Element repeated by a loop: its node key combined with its own `key` value.
    Iteration { node: u32, value: LoopKey },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LoopBinding {
    Each { item: String, index: Option<String> },
    Iterator { name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum LoopKey {
    Expr(Expr),
    /// Index fallback for an unkeyed element, named as the loop binds it.
    Index(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PartBindingKind {
    Text { parts: Vec<TextPart> },
    Attribute { name: String, value: Expr },
    ScopedId { name: String, value: String },
    Listener { event: String, handler: Expr },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBinding {
    pub id: u32,
    #[serde(flatten)]
    pub binding: PartBindingKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum PropValue {
    Static(String),
    Boolean,
    Dynamic(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropBinding {
    pub name: String,
    pub value: PropValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerBinding {
    pub event: String,
    pub handler: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Props {
    /// Fully static props, emitted once as a module-level object literal.
    Hoisted { name: String },
    Inline {
        attributes: Vec<PropBinding>,
        listeners: Vec<ListenerBinding>,
        spread: Option<Expr>,
        lwc_ref: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotContent {
    pub name: String,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Stmt {
    Markup {
        value: String,
    },
    Text {
        value: Expr,
    },
    Attribute {
        name: String,
        value: Expr,
    },
    ScopedAttribute {
        name: String,
        value: String,
    },
    Spread {
        value: Expr,
    },
    Listener {
        event: String,
        handler: Expr,
    },
    Ref {
        name: String,
    },
    InnerHtml {
        value: Expr,
    },
    /// `<!---->` delimiting a conditionally rendered region.
    Boundary,
    Fragment {
        name: String,
        key: KeyRef,
        parts: Vec<PartBinding>,
    },
    If {
        test: Expr,
        /// Legacy directives compare strictly against a boolean.
        compare: Option<bool>,
        consequent: Vec<Stmt>,
        alternate: Vec<Stmt>,
    },
    Loop {
        iterable: Expr,
        binding: LoopBinding,
        body: Vec<Stmt>,
    },
    Slot {
        name: String,
        data: Option<Expr>,
        fallback: Vec<Stmt>,
    },
    Component {
        tag: String,
        import: String,
        key: KeyRef,
        props: Props,
        slots: Vec<SlotContent>,
    },
    DynamicComponent {
        tag: String,
        constructor: Expr,
        key: KeyRef,
        props: Props,
        slots: Vec<SlotContent>,
    },
    ScopedSlotFactory {
        slot: String,
        param: String,
        captures: Vec<String>,
        body: Vec<Stmt>,
    },
}

impl Stmt {
    pub fn markup(value: impl Into<String>) -> Self {
        Stmt::Markup {
            value: value.into(),
        }
    }
}

/// Merges consecutive markup statements, keeping order.
pub fn optimize_adjacent_markup(stmts: Vec<Stmt>) -> Vec<Stmt> {
    let mut out: Vec<Stmt> = Vec::with_capacity(stmts.len());
    for stmt in stmts {
        if let Stmt::Markup { value } = &stmt {
            if let Some(Stmt::Markup { value: previous }) = out.last_mut() {
                previous.push_str(value);
                continue;
            }
        }
        out.push(stmt);
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Read-mostly traversal context. Derived copies carry scope changes downward.
#[derive(Debug, Clone)]
pub struct TransformerContext<'a> {
    tree: &'a IrTree,
    analysis: &'a StaticAnalysis,
    pub render_mode: RenderMode,
    pub in_slotted: bool,
    /// Index name of the enclosing loop while transforming its direct body.
    pub iteration: Option<String>,
    scoped_ids: bool,
    hoist_literals: bool,
    scope: Vec<String>,
}

impl<'a> TransformerContext<'a> {
    pub fn new(tree: &'a IrTree, analysis: &'a StaticAnalysis, config: &CompilerConfig) -> Self {
        TransformerContext {
            tree,
            analysis,
            render_mode: tree.render_mode,
            in_slotted: false,
            iteration: None,
            scoped_ids: tree.render_mode == RenderMode::Shadow
                && !config.disable_synthetic_shadow_support,
            hoist_literals: config.enable_static_content_optimization,
            scope: Vec::new(),
        }
    }

    fn child(&self) -> Self {
        TransformerContext {
            iteration: None,
            ..self.clone()
        }
    }

    fn slotted(&self) -> Self {
        TransformerContext {
            in_slotted: true,
            iteration: None,
            ..self.clone()
        }
    }

    fn with_locals(&self, locals: &[&str], iteration: Option<String>) -> Self {
        let mut scope = self.scope.clone();
        scope.extend(locals.iter().map(|l| l.to_string()));
        TransformerContext {
            scope,
            iteration,
            ..self.clone()
        }
    }

    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    fn resolve(&self, expr: &Expr) -> Expr {
        expr.resolve(&self.scope)
    }
}

/// Mutable state threaded through one transformation.
#[derive(Debug, Default)]
pub struct TransformState {
    file: String,
    next_id: u32,
    fragments: IndexMap<String, String>,
    literals: IndexMap<String, Vec<PropBinding>>,
    components: IndexMap<String, String>,
    slots: IndexSet<String>,
    warnings: Vec<CompilerWarning>,
}

impl TransformState {
    pub fn new(file: &str) -> Self {
        TransformState {
            file: file.to_string(),
            next_id: 1,
            ..Default::default()
        }
    }

    fn next_identifier(&mut self, prefix: &str) -> String {
        let id = self.next_id;
        self.next_id += 1;
        format!("{}{}", prefix, id)
    }

    /// Variable name for a fragment digest, assigned on first use.
    fn fragment_name(&mut self, digest: &str) -> String {
        if let Some(name) = self.fragments.get(digest) {
            return name.clone();
        }
        let name = self.next_identifier("$fragment");
        self.fragments.insert(digest.to_string(), name.clone());
        name
    }

    pub fn warnings(&self) -> &[CompilerWarning] {
        &self.warnings
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentRef {
    pub name: String,
    pub digest: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoistedLiteral {
    pub name: String,
    pub props: Vec<PropBinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentImport {
    pub tag: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOutput {
    pub render_mode: RenderMode,
    pub body: Vec<Stmt>,
    pub fragments: Vec<FragmentRef>,
    pub literals: Vec<HoistedLiteral>,
    pub components: Vec<ComponentImport>,
    pub slots: Vec<String>,
    pub warnings: Vec<CompilerWarning>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISPATCH
// ═══════════════════════════════════════════════════════════════════════════════

fn unexpected(ctx: &TransformerContext<'_>, state: &TransformState, id: NodeId, message: &str) -> CompilerError {
    CompilerError::internal(
        INT_UNEXPECTED_NODE,
        message,
        &state.file,
        ctx.tree.node(id).location,
    )
}

fn node_key(ctx: &TransformerContext<'_>, state: &TransformState, id: NodeId) -> Result<u32, CompilerError> {
    let node = ctx.tree.node(id);
    node.key().ok_or_else(|| {
        CompilerError::internal(
            INT_MISSING_KEY,
            &format!("{} node has no key", node.kind.name()),
            &state.file,
            node.location,
        )
    })
}

/// Per-iteration key value of an element in a loop body; `None` outside of one.
/// Unkeyed elements fall back to the index and get a warning each.
fn iteration_key(
    id: NodeId,
    ctx: &TransformerContext<'_>,
    state: &mut TransformState,
) -> Option<LoopKey> {
    let index = ctx.iteration.as_ref()?;
    let node = ctx.tree.node(id);
    let Some(data) = node.kind.element_data() else {
        return Some(LoopKey::Index(index.clone()));
    };
    match &data.directives.key {
        Some(expr) => Some(LoopKey::Expr(ctx.resolve(expr))),
        None => {
            state.warnings.push(CompilerWarning::at(
                W_MISSING_LOOP_KEY,
                &format!(
                    "<{}> is repeated without a key directive; falling back to the index",
                    data.name
                ),
                &state.file,
                node.location,
            ));
            Some(LoopKey::Index(index.clone()))
        }
    }
}

fn key_ref(
    ctx: &TransformerContext<'_>,
    state: &mut TransformState,
    id: NodeId,
) -> Result<KeyRef, CompilerError> {
    let node = node_key(ctx, state, id)?;
    Ok(match iteration_key(id, ctx, state) {
        Some(value) => KeyRef::Iteration { node, value },
        None => KeyRef::Static(node),
    })
}

pub fn transform_node(
    id: NodeId,
    ctx: &TransformerContext<'_>,
    state: &mut TransformState,
) -> Result<Vec<Stmt>, CompilerError> {
    let tree = ctx.tree;
    match tree.kind(id) {
        IrKind::Fragment => transform_children(id, ctx, state),
        IrKind::Element(data) => transform_element(id, data, ctx, state),
        IrKind::Text { parts } => Ok(transform_text(parts, ctx)),
        IrKind::Comment { value } => Ok(vec![Stmt::markup(format!("<!--{}-->", value))]),
        IrKind::If { condition, negated } => Ok(vec![Stmt::If {
            test: ctx.resolve(condition),
            compare: Some(!negated),
            consequent: transform_children(id, ctx, state)?,
            alternate: Vec::new(),
        }]),
        IrKind::IfBlock { condition, .. } => Ok(vec![transform_if_chain(id, condition, ctx, state)?]),
        IrKind::ElseIfBlock { .. } | IrKind::ElseBlock => Err(unexpected(
            ctx,
            state,
            id,
            "else branch reached outside of its if-chain",
        )),
        IrKind::ForEach { .. } | IrKind::ForOf { .. } => transform_loop(id, ctx, state),
        IrKind::Slot { name, slot_bind } => transform_slot(id, name, slot_bind.as_ref(), ctx, state),
        IrKind::ScopedSlot { .. } => Err(unexpected(
            ctx,
            state,
            id,
            "scoped slot reached outside of a component",
        )),
        IrKind::Component { data, import } => {
            state
                .components
                .entry(data.name.clone())
                .or_insert_with(|| import.clone());
            let props = component_props(data, ctx, state);
            Ok(vec![Stmt::Component {
                tag: data.name.clone(),
                import: import.clone(),
                key: key_ref(ctx, state, id)?,
                props,
                slots: slot_contents(id, ctx, state)?,
            }])
        }
        IrKind::DynamicComponent {
            data, constructor, ..
        } => {
            let props = component_props(data, ctx, state);
            Ok(vec![Stmt::DynamicComponent {
                tag: data.name.clone(),
                constructor: ctx.resolve(constructor),
                key: key_ref(ctx, state, id)?,
                props,
                slots: slot_contents(id, ctx, state)?,
            }])
        }
    }
}

fn transform_children(
    id: NodeId,
    ctx: &TransformerContext<'_>,
    state: &mut TransformState,
) -> Result<Vec<Stmt>, CompilerError> {
    let mut out = Vec::new();
    for &child in ctx.tree.children(id) {
        out.extend(transform_node(child, ctx, state)?);
    }
    Ok(optimize_adjacent_markup(out))
}

// ═══════════════════════════════════════════════════════════════════════════════
// ELEMENTS AND TEXT
// ═══════════════════════════════════════════════════════════════════════════════

fn transform_element(
    id: NodeId,
    data: &ElementData,
    ctx: &TransformerContext<'_>,
    state: &mut TransformState,
) -> Result<Vec<Stmt>, CompilerError> {
    if let Some(site) = ctx.analysis.hoist_site(id) {
        return Ok(vec![fragment_stmt(id, site, ctx, state)?]);
    }

    // Not hoisted, so no keyed node is emitted, but a missing key is still reported.
    iteration_key(id, ctx, state);

    let mut out = vec![Stmt::markup(format!("<{}", data.name))];
    for attr in &data.attributes {
        match &attr.value {
            AttributeValue::Static(value) if is_scoped_attribute(attr, ctx.scoped_ids) => {
                out.push(Stmt::ScopedAttribute {
                    name: attr.name.clone(),
                    value: value.clone(),
                });
            }
            AttributeValue::Static(value) => {
                out.push(Stmt::markup(format!(
                    " {}=\"{}\"",
                    attr.name,
                    escape_attribute(value)
                )));
            }
            AttributeValue::Boolean => out.push(Stmt::markup(format!(" {}", attr.name))),
            AttributeValue::Dynamic(expr) => out.push(Stmt::Attribute {
                name: attr.name.clone(),
                value: ctx.resolve(expr),
            }),
        }
    }
    let directives = &data.directives;
    if let Some(slot) = &directives.slot {
        out.push(Stmt::markup(format!(" slot=\"{}\"", escape_attribute(slot))));
    }
    if let Some(spread) = &directives.spread {
        out.push(Stmt::Spread {
            value: ctx.resolve(spread),
        });
    }
    if let Some(name) = &directives.lwc_ref {
        out.push(Stmt::Ref { name: name.clone() });
    }
    for listener in &data.listeners {
        out.push(Stmt::Listener {
            event: listener.event.clone(),
            handler: ctx.resolve(&listener.handler),
        });
    }
    out.push(Stmt::markup(">"));

    match &directives.inner_html {
        Some(html) => out.push(Stmt::InnerHtml {
            value: ctx.resolve(html),
        }),
        None => out.extend(transform_children(id, &ctx.child(), state)?),
    }
    if !data.is_void() {
        out.push(Stmt::markup(format!("</{}>", data.name)));
    }
    Ok(optimize_adjacent_markup(out))
}

fn fragment_stmt(
    id: NodeId,
    site: &HoistSite,
    ctx: &TransformerContext<'_>,
    state: &mut TransformState,
) -> Result<Stmt, CompilerError> {
    let key = key_ref(ctx, state, id)?;
    let mut parts = Vec::with_capacity(site.parts.len());
    for part in &site.parts {
        let kind = ctx.tree.kind(part.node);
        let binding = match (&part.slot.kind, kind) {
            (PartKind::Text, IrKind::Text { parts: text }) => PartBindingKind::Text {
                parts: text.iter().map(|p| resolve_text_part(p, ctx)).collect(),
            },
            (PartKind::Attribute { name }, IrKind::Element(data)) => {
                match data.attribute(name).map(|a| &a.value) {
                    Some(AttributeValue::Dynamic(expr)) => PartBindingKind::Attribute {
                        name: name.clone(),
                        value: ctx.resolve(expr),
                    },
                    Some(AttributeValue::Static(value)) => PartBindingKind::ScopedId {
                        name: name.clone(),
                        value: value.clone(),
                    },
                    _ => {
                        return Err(unexpected(
                            ctx,
                            state,
                            part.node,
                            &format!("attribute part \"{}\" has no binding", name),
                        ))
                    }
                }
            }
            (PartKind::Listener { event }, IrKind::Element(data)) => {
                match data.listeners.iter().find(|l| &l.event == event) {
                    Some(listener) => PartBindingKind::Listener {
                        event: event.clone(),
                        handler: ctx.resolve(&listener.handler),
                    },
                    None => {
                        return Err(unexpected(
                            ctx,
                            state,
                            part.node,
                            &format!("listener part \"{}\" has no handler", event),
                        ))
                    }
                }
            }
            _ => {
                return Err(unexpected(
                    ctx,
                    state,
                    part.node,
                    &format!("part does not match a {} node", kind.name()),
                ))
            }
        };
        parts.push(PartBinding {
            id: part.slot.id,
            binding,
        });
    }
    Ok(Stmt::Fragment {
        name: state.fragment_name(&site.digest),
        key,
        parts,
    })
}

fn resolve_text_part(part: &TextPart, ctx: &TransformerContext<'_>) -> TextPart {
    match part {
        TextPart::Literal(text) => TextPart::Literal(text.clone()),
        TextPart::Expression(expr) => TextPart::Expression(ctx.resolve(expr)),
    }
}

fn transform_text(parts: &[TextPart], ctx: &TransformerContext<'_>) -> Vec<Stmt> {
    let stmts = parts
        .iter()
        .map(|part| match part {
            TextPart::Literal(text) => Stmt::markup(escape_text(text)),
            TextPart::Expression(expr) => Stmt::Text {
                value: ctx.resolve(expr),
            },
        })
        .collect();
    optimize_adjacent_markup(stmts)
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTROL FLOW
// ═══════════════════════════════════════════════════════════════════════════════

fn branch_body(
    id: NodeId,
    ctx: &TransformerContext<'_>,
    state: &mut TransformState,
) -> Result<Vec<Stmt>, CompilerError> {
    let mut body = transform_children(id, ctx, state)?;
    if !ctx.in_slotted {
        body.insert(0, Stmt::Boundary);
        body.push(Stmt::Boundary);
    }
    Ok(body)
}

fn transform_if_chain(
    id: NodeId,
    condition: &Expr,
    ctx: &TransformerContext<'_>,
    state: &mut TransformState,
) -> Result<Stmt, CompilerError> {
    let consequent = branch_body(id, ctx, state)?;
    let alternate = match ctx.tree.alternate(id) {
        None => Vec::new(),
        Some(next) => match ctx.tree.kind(next) {
            IrKind::ElseIfBlock { condition, .. } => {
                vec![transform_if_chain(next, condition, ctx, state)?]
            }
            IrKind::ElseBlock => branch_body(next, ctx, state)?,
            other => {
                return Err(unexpected(
                    ctx,
                    state,
                    next,
                    &format!("{} node linked as an if-chain alternate", other.name()),
                ))
            }
        },
    };
    Ok(Stmt::If {
        test: ctx.resolve(condition),
        compare: None,
        consequent,
        alternate,
    })
}

fn transform_loop(
    id: NodeId,
    ctx: &TransformerContext<'_>,
    state: &mut TransformState,
) -> Result<Vec<Stmt>, CompilerError> {
    let node = ctx.tree.node(id);
    let (iterable, binding, body_ctx) = match &node.kind {
        IrKind::ForEach {
            iterable,
            item,
            index,
        } => {
            let mut locals = vec![item.as_str()];
            if let Some(index) = index {
                locals.push(index.as_str());
            }
            let binding = LoopBinding::Each {
                item: item.clone(),
                index: index.clone(),
            };
            let fallback = index.clone().unwrap_or_else(|| "$index".to_string());
            (iterable, binding, ctx.with_locals(&locals, Some(fallback)))
        }
        IrKind::ForOf { iterable, iterator } => {
            let binding = LoopBinding::Iterator {
                name: iterator.clone(),
            };
            let fallback = format!("{}.index", iterator);
            (iterable, binding, ctx.with_locals(&[iterator.as_str()], Some(fallback)))
        }
        _ => return Err(unexpected(ctx, state, id, "loop transformer on a non-loop node")),
    };

    let stmt = Stmt::Loop {
        iterable: ctx.resolve(iterable),
        binding,
        body: transform_children(id, &body_ctx, state)?,
    };
    if ctx.in_slotted {
        Ok(vec![stmt])
    } else {
        Ok(vec![Stmt::Boundary, stmt, Stmt::Boundary])
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SLOTS AND COMPONENTS
// ═══════════════════════════════════════════════════════════════════════════════

fn transform_slot(
    id: NodeId,
    name: &str,
    slot_bind: Option<&Expr>,
    ctx: &TransformerContext<'_>,
    state: &mut TransformState,
) -> Result<Vec<Stmt>, CompilerError> {
    state.slots.insert(name.to_string());
    let stmt = Stmt::Slot {
        name: name.to_string(),
        data: slot_bind.map(|expr| ctx.resolve(expr)),
        fallback: transform_children(id, &ctx.child(), state)?,
    };
    Ok(match ctx.render_mode {
        RenderMode::Shadow => {
            let open = if name.is_empty() {
                "<slot>".to_string()
            } else {
                format!("<slot name=\"{}\">", escape_attribute(name))
            };
            vec![Stmt::markup(open), stmt, Stmt::markup("</slot>")]
        }
        RenderMode::Light => vec![Stmt::Boundary, stmt, Stmt::Boundary],
    })
}

fn component_props(
    data: &ElementData,
    ctx: &TransformerContext<'_>,
    state: &mut TransformState,
) -> Props {
    let mut attributes: Vec<PropBinding> = data
        .attributes
        .iter()
        .map(|attr| PropBinding {
            name: attr.name.clone(),
            value: match &attr.value {
                AttributeValue::Static(value) => PropValue::Static(value.clone()),
                AttributeValue::Boolean => PropValue::Boolean,
                AttributeValue::Dynamic(expr) => PropValue::Dynamic(ctx.resolve(expr)),
            },
        })
        .collect();
    if let Some(slot) = &data.directives.slot {
        attributes.push(PropBinding {
            name: "slot".to_string(),
            value: PropValue::Static(slot.clone()),
        });
    }
    let listeners: Vec<ListenerBinding> = data
        .listeners
        .iter()
        .map(|l| ListenerBinding {
            event: l.event.clone(),
            handler: ctx.resolve(&l.handler),
        })
        .collect();
    let spread = data.directives.spread.as_ref().map(|e| ctx.resolve(e));
    let lwc_ref = data.directives.lwc_ref.clone();

    let fully_static = listeners.is_empty()
        && spread.is_none()
        && lwc_ref.is_none()
        && attributes
            .iter()
            .all(|p| !matches!(p.value, PropValue::Dynamic(_)));
    if ctx.hoist_literals && fully_static && !attributes.is_empty() {
        let name = state.next_identifier("stc");
        state.literals.insert(name.clone(), attributes);
        return Props::Hoisted { name };
    }
    Props::Inline {
        attributes,
        listeners,
        spread,
        lwc_ref,
    }
}

fn slot_contents(
    id: NodeId,
    ctx: &TransformerContext<'_>,
    state: &mut TransformState,
) -> Result<Vec<SlotContent>, CompilerError> {
    let slotted = ctx.slotted();
    let mut groups: IndexMap<String, Vec<Stmt>> = IndexMap::new();
    for &child in ctx.tree.children(id) {
        let name = slot_name_of(ctx.tree, child);
        let stmts = match ctx.tree.kind(child) {
            IrKind::ScopedSlot { binding, .. } => {
                vec![scoped_slot_factory(child, &name, binding, &slotted, state)?]
            }
            _ => transform_node(child, &slotted, state)?,
        };
        groups.entry(name).or_default().extend(stmts);
    }
    Ok(groups
        .into_iter()
        .filter(|(_, body)| !body.is_empty())
        .map(|(name, body)| SlotContent {
            name,
            body: optimize_adjacent_markup(body),
        })
        .collect())
}

fn scoped_slot_factory(
    id: NodeId,
    slot: &str,
    binding: &str,
    ctx: &TransformerContext<'_>,
    state: &mut TransformState,
) -> Result<Stmt, CompilerError> {
    let body_ctx = ctx.with_locals(&[binding], None);
    Ok(Stmt::ScopedSlotFactory {
        slot: slot.to_string(),
        param: binding.to_string(),
        captures: ctx.scope().to_vec(),
        body: transform_children(id, &body_ctx, state)?,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

pub fn transform(
    tree: &IrTree,
    analysis: &StaticAnalysis,
    config: &CompilerConfig,
    file: &str,
) -> Result<TransformOutput, CompilerError> {
    let ctx = TransformerContext::new(tree, analysis, config);
    let mut state = TransformState::new(file);
    let body = transform_node(tree.root(), &ctx, &mut state)?;

    log::debug!(
        "transformed {} top-level statement(s), {} fragment reference(s)",
        body.len(),
        state.fragments.len()
    );
    Ok(TransformOutput {
        render_mode: tree.render_mode,
        body,
        fragments: state
            .fragments
            .into_iter()
            .map(|(digest, name)| FragmentRef { name, digest })
            .collect(),
        literals: state
            .literals
            .into_iter()
            .map(|(name, props)| HoistedLiteral { name, props })
            .collect(),
        components: state
            .components
            .into_iter()
            .map(|(tag, source)| ComponentImport { tag, source })
            .collect(),
        slots: state.slots.into_iter().collect(),
        warnings: state.warnings,
    })
}
