//! IR builder.
//!
//! Turns the parsed syntax tree into an [`IrTree`]: resolves directives,
//! binds `{...}` expressions, resolves custom element tags, and assigns
//! node keys once construction is done.
//!
//! Errors go through [`Diagnostics`]. In collect-all mode a failing attribute
//! is replaced by a placeholder so the walk can continue and report more.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

use crate::config::{CompilerConfig, RenderMode};
use crate::diagnostics::{
    Diagnostics, SourceLocation, Step, CFG_DYNAMIC_COMPONENTS_DISABLED,
    CFG_DYNAMIC_DIRECTIVE_DISABLED, VAL_ATTRIBUTE_CASE, VAL_DIRECTIVE_VALUE,
    VAL_DISALLOWED_EXPRESSION, VAL_DYNAMIC_SLOT_NAME, VAL_ELSE_WITHOUT_IF,
    VAL_FORBIDDEN_ATTRIBUTE, VAL_FORBIDDEN_TAG, VAL_FOR_EACH_MISSING_ITEM,
    VAL_FOR_ITEM_WITHOUT_EACH, VAL_INVALID_EXPRESSION, VAL_INVALID_IDENTIFIER,
    VAL_INVALID_TABINDEX, VAL_LISTENER_NOT_EXPRESSION, VAL_LWC_IS_PLACEMENT, VAL_MISSING_LWC_IS,
    VAL_MULTIPLE_CONTROL_DIRECTIVES, VAL_ROOT_ATTRIBUTE, VAL_SLOT_BIND_REQUIRES_LIGHT_DOM,
    VAL_SLOT_DATA_PLACEMENT, VAL_TEMPLATE_WITHOUT_DIRECTIVE, VAL_UNKNOWN_COMPONENT,
    VAL_UNKNOWN_DIRECTIVE, W_DEPRECATED_DIRECTIVE,
};
use crate::expression::{parse_expression, Expr, ExpressionError, Literal};
use crate::ir::{
    Attribute, AttributeValue, ElementData, ElementDirectives, IrKind, IrTree, Listener,
    Namespace, NodeId, TextPart,
};
use crate::parse::{find_balanced_brace_end, SyntaxAttribute, SyntaxElement, SyntaxNode, SyntaxText, SyntaxValue};
use crate::resolver::TagResolver;

lazy_static! {
    static ref IDENTIFIER_RE: Regex = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap();

    static ref FORBIDDEN_TAGS: HashSet<&'static str> = ["script", "style"].into_iter().collect();

    /// `lwc:` attributes only valid on the root `<template>`.
    static ref ROOT_DIRECTIVES: HashSet<&'static str> =
        ["lwc:render-mode", "lwc:preserve-comments"].into_iter().collect();
}

fn placeholder() -> Expr {
    Expr::Literal {
        value: Literal::Null,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIRECTIVES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
enum IfDirective {
    If(Expr),
    ElseIf(Expr),
    Else,
    IfTrue(Expr),
    IfFalse(Expr),
}

#[derive(Debug, Clone)]
enum Control {
    If(IfDirective),
    ForEach {
        iterable: Expr,
        item: String,
        index: Option<String>,
    },
    ForOf {
        iterable: Expr,
        iterator: String,
    },
}

#[derive(Default)]
struct Directives<'s> {
    control: Option<Control>,
    key: Option<Expr>,
    lwc_ref: Option<String>,
    spread: Option<Expr>,
    inner_html: Option<Expr>,
    slot: Option<String>,
    slot_data: Option<String>,
    slot_bind: Option<Expr>,
    lwc_is: Option<Expr>,
    lwc_dynamic: Option<Expr>,
    rest: Vec<&'s SyntaxAttribute>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

struct IrBuilder<'a> {
    tree: IrTree,
    config: &'a CompilerConfig,
    resolver: &'a dyn TagResolver,
    diag: &'a mut Diagnostics,
    preserve_comments: bool,
}

impl<'a> IrBuilder<'a> {
    fn error(&mut self, code: &str, message: &str, location: SourceLocation) -> Step<()> {
        self.diag.error(code, message, location)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Attribute values
    // ───────────────────────────────────────────────────────────────────────────

    fn bind_expression(&mut self, source: &str, location: SourceLocation) -> Step<Expr> {
        match parse_expression(source) {
            Ok(expr) => Ok(expr),
            Err(ExpressionError::Syntax(message)) => {
                self.error(
                    VAL_INVALID_EXPRESSION,
                    &format!("Invalid expression {{{}}}: {}", source.trim(), message),
                    location,
                )?;
                Ok(placeholder())
            }
            Err(ExpressionError::Disallowed(message)) => {
                self.error(
                    VAL_DISALLOWED_EXPRESSION,
                    &format!("{{{}}}: {}", source.trim(), message),
                    location,
                )?;
                Ok(placeholder())
            }
        }
    }

    fn expression_value(&mut self, attr: &SyntaxAttribute) -> Step<Expr> {
        match &attr.value {
            SyntaxValue::Expression(source) => self.bind_expression(source, attr.location),
            _ => {
                self.error(
                    VAL_DIRECTIVE_VALUE,
                    &format!("{} expects an expression value", attr.name),
                    attr.location,
                )?;
                Ok(placeholder())
            }
        }
    }

    fn identifier_value(&mut self, attr: &SyntaxAttribute) -> Step<String> {
        match &attr.value {
            SyntaxValue::Literal(value) if IDENTIFIER_RE.is_match(value) => Ok(value.clone()),
            SyntaxValue::Literal(value) => {
                self.error(
                    VAL_INVALID_IDENTIFIER,
                    &format!("{} value \"{}\" is not a valid identifier", attr.name, value),
                    attr.location,
                )?;
                Ok(value.clone())
            }
            _ => {
                self.error(
                    VAL_INVALID_IDENTIFIER,
                    &format!("{} expects an identifier string", attr.name),
                    attr.location,
                )?;
                Ok(String::new())
            }
        }
    }

    fn collect_directives<'s>(&mut self, el: &'s SyntaxElement) -> Step<Directives<'s>> {
        let mut d = Directives::default();
        let mut controls: Vec<(&'s SyntaxAttribute, Control)> = Vec::new();
        let mut for_item: Option<String> = None;
        let mut for_index: Option<String> = None;
        let mut for_attr: Option<&'s SyntaxAttribute> = None;

        for attr in &el.attributes {
            let name = attr.name.as_str();
            match name {
                "lwc:if" => {
                    let cond = self.expression_value(attr)?;
                    controls.push((attr, Control::If(IfDirective::If(cond))));
                }
                "lwc:elseif" => {
                    let cond = self.expression_value(attr)?;
                    controls.push((attr, Control::If(IfDirective::ElseIf(cond))));
                }
                "lwc:else" => {
                    if attr.value != SyntaxValue::Boolean {
                        self.error(
                            VAL_DIRECTIVE_VALUE,
                            "lwc:else does not take a value",
                            attr.location,
                        )?;
                    }
                    controls.push((attr, Control::If(IfDirective::Else)));
                }
                "if:true" | "if:false" => {
                    self.diag.warn(
                        W_DEPRECATED_DIRECTIVE,
                        &format!("{} is deprecated, use lwc:if instead", name),
                        attr.location,
                    );
                    let cond = self.expression_value(attr)?;
                    let directive = if name == "if:true" {
                        IfDirective::IfTrue(cond)
                    } else {
                        IfDirective::IfFalse(cond)
                    };
                    controls.push((attr, Control::If(directive)));
                }
                "for:each" => {
                    let iterable = self.expression_value(attr)?;
                    for_attr = Some(attr);
                    controls.push((
                        attr,
                        Control::ForEach {
                            iterable,
                            item: String::new(),
                            index: None,
                        },
                    ));
                }
                "for:item" => for_item = Some(self.identifier_value(attr)?),
                "for:index" => for_index = Some(self.identifier_value(attr)?),
                _ if name.starts_with("iterator:") => {
                    let iterator = &name["iterator:".len()..];
                    if !IDENTIFIER_RE.is_match(iterator) {
                        self.error(
                            VAL_INVALID_IDENTIFIER,
                            &format!("\"{}\" is not a valid iterator name", iterator),
                            attr.location,
                        )?;
                    }
                    let iterable = self.expression_value(attr)?;
                    controls.push((
                        attr,
                        Control::ForOf {
                            iterable,
                            iterator: iterator.to_string(),
                        },
                    ));
                }
                "key" => d.key = Some(self.expression_value(attr)?),
                "lwc:ref" => match &attr.value {
                    SyntaxValue::Literal(value) if !value.is_empty() => {
                        d.lwc_ref = Some(value.clone())
                    }
                    _ => self.error(
                        VAL_DIRECTIVE_VALUE,
                        "lwc:ref expects a non-empty string",
                        attr.location,
                    )?,
                },
                "lwc:spread" => d.spread = Some(self.expression_value(attr)?),
                "lwc:inner-html" => {
                    let value = match &attr.value {
                        SyntaxValue::Literal(html) => Expr::Literal {
                            value: Literal::String(html.clone()),
                        },
                        _ => self.expression_value(attr)?,
                    };
                    d.inner_html = Some(value);
                }
                "lwc:slot-data" => d.slot_data = Some(self.identifier_value(attr)?),
                "lwc:slot-bind" => d.slot_bind = Some(self.expression_value(attr)?),
                "lwc:is" => d.lwc_is = Some(self.expression_value(attr)?),
                "lwc:dynamic" => d.lwc_dynamic = Some(self.expression_value(attr)?),
                "slot" => match &attr.value {
                    SyntaxValue::Literal(value) => d.slot = Some(value.clone()),
                    SyntaxValue::Boolean => d.slot = Some(String::new()),
                    SyntaxValue::Expression(_) => self.error(
                        VAL_DYNAMIC_SLOT_NAME,
                        "The slot attribute must be a static string",
                        attr.location,
                    )?,
                },
                _ if ROOT_DIRECTIVES.contains(name) => self.error(
                    VAL_DIRECTIVE_VALUE,
                    &format!("{} is only allowed on the root <template>", name),
                    attr.location,
                )?,
                _ if name.starts_with("lwc:") || name.starts_with("for:") => self.error(
                    VAL_UNKNOWN_DIRECTIVE,
                    &format!("Unknown directive {}", name),
                    attr.location,
                )?,
                _ => d.rest.push(attr),
            }
        }

        match for_attr {
            Some(attr) => {
                let item = match for_item {
                    Some(item) => item,
                    None => {
                        self.error(
                            VAL_FOR_EACH_MISSING_ITEM,
                            "for:each requires a for:item directive",
                            attr.location,
                        )?;
                        String::new()
                    }
                };
                for (_, control) in controls.iter_mut() {
                    if let Control::ForEach {
                        item: slot_item,
                        index: slot_index,
                        ..
                    } = control
                    {
                        *slot_item = item.clone();
                        *slot_index = for_index.clone();
                    }
                }
            }
            None if for_item.is_some() || for_index.is_some() => self.error(
                VAL_FOR_ITEM_WITHOUT_EACH,
                "for:item and for:index require a for:each directive",
                el.location,
            )?,
            None => {}
        }

        if controls.len() > 1 {
            self.error(
                VAL_MULTIPLE_CONTROL_DIRECTIVES,
                &format!(
                    "<{}> cannot carry both {} and {}",
                    el.name, controls[0].0.name, controls[1].0.name
                ),
                controls[1].0.location,
            )?;
        }
        d.control = controls.into_iter().next().map(|(_, control)| control);
        Ok(d)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Nodes
    // ───────────────────────────────────────────────────────────────────────────

    fn build_children(
        &mut self,
        children: &[SyntaxNode],
        parent: NodeId,
        ns: Namespace,
    ) -> Step<()> {
        let mut chain: Option<NodeId> = None;
        for child in children {
            match child {
                SyntaxNode::Text(text) => {
                    chain = None;
                    self.build_text(text, parent)?;
                }
                SyntaxNode::Comment(comment) => {
                    if self.preserve_comments {
                        self.tree.add(
                            parent,
                            IrKind::Comment {
                                value: comment.value.clone(),
                            },
                            comment.location,
                        );
                    }
                }
                SyntaxNode::Element(el) => {
                    chain = self.build_element(el, parent, ns, chain)?;
                }
            }
        }
        Ok(())
    }

    fn build_text(&mut self, text: &SyntaxText, parent: NodeId) -> Step<()> {
        let chars: Vec<char> = text.raw.chars().collect();
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut i = 0;
        while i < chars.len() {
            if chars[i] == '{' {
                if let Some(end) = find_balanced_brace_end(&chars, i) {
                    if !literal.is_empty() {
                        parts.push(TextPart::Literal(std::mem::take(&mut literal)));
                    }
                    let source: String = chars[i + 1..end].iter().collect();
                    let expr = self.bind_expression(&source, text.location)?;
                    parts.push(TextPart::Expression(expr));
                    i = end + 1;
                    continue;
                }
            }
            literal.push(chars[i]);
            i += 1;
        }
        if !literal.is_empty() {
            parts.push(TextPart::Literal(literal));
        }
        self.tree.add(parent, IrKind::Text { parts }, text.location);
        Ok(())
    }

    /// Builds one element and returns the if-chain tail its next sibling may extend.
    fn build_element(
        &mut self,
        el: &SyntaxElement,
        parent: NodeId,
        ns: Namespace,
        chain: Option<NodeId>,
    ) -> Step<Option<NodeId>> {
        let mut d = self.collect_directives(el)?;
        let is_template = el.name == "template";

        if d.slot_data.is_some() && !is_template {
            self.error(
                VAL_SLOT_DATA_PLACEMENT,
                "lwc:slot-data is only allowed on a <template> element",
                el.location,
            )?;
        }

        if is_template {
            if d.control.is_none() && d.slot_data.is_none() {
                self.error(
                    VAL_TEMPLATE_WITHOUT_DIRECTIVE,
                    "Nested <template> elements must carry a directive",
                    el.location,
                )?;
                self.build_children(&el.children, parent, ns)?;
                return Ok(None);
            }
            if let Some(attr) = d.rest.first() {
                self.error(
                    VAL_FORBIDDEN_ATTRIBUTE,
                    &format!("<template> only accepts directives, found \"{}\"", attr.name),
                    attr.location,
                )?;
            }
            // `slot` names a scoped slot; under a control directive it would be lost.
            let dropped = [
                ("key", d.key.is_some()),
                ("slot", d.slot.is_some() && d.slot_data.is_none()),
            ];
            for (name, present) in dropped {
                if !present {
                    continue;
                }
                let location = el.attribute(name).map_or(el.location, |attr| attr.location);
                self.error(
                    VAL_FORBIDDEN_ATTRIBUTE,
                    &format!("\"{}\" is not allowed on a <template> with a control directive", name),
                    location,
                )?;
            }
        }

        let (container, next_chain) = match d.control.take() {
            None => (parent, None),
            Some(Control::If(IfDirective::If(condition))) => {
                let id = self.tree.add(
                    parent,
                    IrKind::IfBlock {
                        condition,
                        alternate: None,
                    },
                    el.location,
                );
                (id, Some(id))
            }
            Some(Control::If(IfDirective::ElseIf(condition))) => {
                let kind = IrKind::ElseIfBlock {
                    condition,
                    alternate: None,
                };
                match chain.and_then(|prev| self.tree.add_alternate(prev, kind, el.location)) {
                    Some(id) => (id, Some(id)),
                    None => return self.orphan_branch("lwc:elseif", el.location),
                }
            }
            Some(Control::If(IfDirective::Else)) => {
                match chain.and_then(|prev| self.tree.add_alternate(prev, IrKind::ElseBlock, el.location)) {
                    Some(id) => (id, None),
                    None => return self.orphan_branch("lwc:else", el.location),
                }
            }
            Some(Control::If(IfDirective::IfTrue(condition))) => {
                let id = self.tree.add(
                    parent,
                    IrKind::If {
                        condition,
                        negated: false,
                    },
                    el.location,
                );
                (id, None)
            }
            Some(Control::If(IfDirective::IfFalse(condition))) => {
                let id = self.tree.add(
                    parent,
                    IrKind::If {
                        condition,
                        negated: true,
                    },
                    el.location,
                );
                (id, None)
            }
            Some(Control::ForEach {
                iterable,
                item,
                index,
            }) => {
                let id = self.tree.add(
                    parent,
                    IrKind::ForEach {
                        iterable,
                        item,
                        index,
                    },
                    el.location,
                );
                (id, None)
            }
            Some(Control::ForOf { iterable, iterator }) => {
                let id = self.tree.add(
                    parent,
                    IrKind::ForOf { iterable, iterator },
                    el.location,
                );
                (id, None)
            }
        };

        if is_template {
            match d.slot_data.take() {
                Some(binding) => {
                    let scoped = self.tree.add(
                        container,
                        IrKind::ScopedSlot {
                            name: d.slot.take().unwrap_or_default(),
                            binding,
                        },
                        el.location,
                    );
                    self.build_children(&el.children, scoped, ns)?;
                }
                None => self.build_children(&el.children, container, ns)?,
            }
        } else {
            self.build_tag(el, d, container, ns)?;
        }
        Ok(next_chain)
    }

    fn orphan_branch(&mut self, directive: &str, location: SourceLocation) -> Step<Option<NodeId>> {
        self.error(
            VAL_ELSE_WITHOUT_IF,
            &format!(
                "{} must directly follow an element with lwc:if or lwc:elseif",
                directive
            ),
            location,
        )?;
        Ok(None)
    }

    fn build_tag(
        &mut self,
        el: &SyntaxElement,
        mut d: Directives<'_>,
        parent: NodeId,
        ns: Namespace,
    ) -> Step<()> {
        let name = el.name.as_str();
        if FORBIDDEN_TAGS.contains(name) {
            return self.error(
                VAL_FORBIDDEN_TAG,
                &format!("<{}> is not allowed in templates", name),
                el.location,
            );
        }

        let own_ns = match name {
            "svg" => Namespace::Svg,
            "math" => Namespace::MathMl,
            _ => ns,
        };
        let children_ns = if name == "foreignObject" {
            Namespace::Html
        } else {
            own_ns
        };

        if d.lwc_is.is_some() && name != "lwc:component" {
            self.error(
                VAL_LWC_IS_PLACEMENT,
                "lwc:is is only allowed on <lwc:component>",
                el.location,
            )?;
        }
        if d.slot_bind.is_some() && name != "slot" {
            self.error(
                VAL_DIRECTIVE_VALUE,
                "lwc:slot-bind is only allowed on <slot>",
                el.location,
            )?;
        }
        if d.inner_html.is_some() && !el.children.is_empty() {
            self.error(
                VAL_DIRECTIVE_VALUE,
                "An element with lwc:inner-html must be empty",
                el.location,
            )?;
        }

        let lwc_is = d.lwc_is.take();
        let lwc_dynamic = d.lwc_dynamic.take();
        let slot_bind = d.slot_bind.take();
        let data = self.element_data(el, d, own_ns)?;

        let kind = if name == "slot" {
            let slot_name = match data.attribute("name").map(|a| &a.value) {
                Some(AttributeValue::Static(value)) => value.clone(),
                Some(AttributeValue::Dynamic(_)) => {
                    self.error(
                        VAL_DYNAMIC_SLOT_NAME,
                        "<slot> names must be static strings",
                        el.location,
                    )?;
                    String::new()
                }
                Some(AttributeValue::Boolean) | None => String::new(),
            };
            if slot_bind.is_some() && self.tree.render_mode != RenderMode::Light {
                self.error(
                    VAL_SLOT_BIND_REQUIRES_LIGHT_DOM,
                    "lwc:slot-bind is only supported in light DOM templates",
                    el.location,
                )?;
            }
            IrKind::Slot {
                name: slot_name,
                slot_bind,
            }
        } else if name == "lwc:component" {
            if !self.config.enable_dynamic_components {
                self.error(
                    CFG_DYNAMIC_COMPONENTS_DISABLED,
                    "<lwc:component> requires dynamic components to be enabled",
                    el.location,
                )?;
            }
            let constructor = match lwc_is {
                Some(expr) => expr,
                None => {
                    self.error(
                        VAL_MISSING_LWC_IS,
                        "<lwc:component> requires an lwc:is directive",
                        el.location,
                    )?;
                    placeholder()
                }
            };
            IrKind::DynamicComponent {
                data,
                constructor,
                legacy: false,
            }
        } else if let Some(constructor) = lwc_dynamic {
            if !self.config.experimental_dynamic_directive {
                self.error(
                    CFG_DYNAMIC_DIRECTIVE_DISABLED,
                    "lwc:dynamic requires the experimental dynamic directive to be enabled",
                    el.location,
                )?;
            }
            if !name.contains('-') {
                self.error(
                    VAL_DIRECTIVE_VALUE,
                    "lwc:dynamic is only allowed on custom elements",
                    el.location,
                )?;
            }
            IrKind::DynamicComponent {
                data,
                constructor,
                legacy: true,
            }
        } else if name.contains('-') && own_ns == Namespace::Html {
            match self.resolver.resolve(name) {
                Some(import) => IrKind::Component { data, import },
                None => {
                    self.error(
                        VAL_UNKNOWN_COMPONENT,
                        &format!("Unknown component <{}>", name),
                        el.location,
                    )?;
                    IrKind::Element(data)
                }
            }
        } else {
            IrKind::Element(data)
        };

        let id = self.tree.add(parent, kind, el.location);
        self.build_children(&el.children, id, children_ns)
    }

    fn element_data(
        &mut self,
        el: &SyntaxElement,
        d: Directives<'_>,
        ns: Namespace,
    ) -> Step<ElementData> {
        let mut data = ElementData::new(&el.name, ns);
        data.directives = ElementDirectives {
            key: d.key,
            lwc_ref: d.lwc_ref,
            spread: d.spread,
            inner_html: d.inner_html,
            slot: d.slot,
        };

        for attr in d.rest {
            let name = attr.name.as_str();

            if name.len() > 2 && name.starts_with("on") {
                let event = &name[2..];
                let SyntaxValue::Expression(source) = &attr.value else {
                    self.error(
                        VAL_LISTENER_NOT_EXPRESSION,
                        &format!("Event listener {} must be an expression", name),
                        attr.location,
                    )?;
                    continue;
                };
                if event.chars().any(|c| c.is_ascii_uppercase()) {
                    self.error(
                        VAL_ATTRIBUTE_CASE,
                        &format!("Event name \"{}\" must be lower case", event),
                        attr.location,
                    )?;
                }
                let handler = self.bind_expression(source, attr.location)?;
                data.listeners.push(Listener {
                    event: event.to_string(),
                    handler,
                    location: attr.location,
                });
                continue;
            }

            if name == "is" {
                self.error(
                    VAL_FORBIDDEN_ATTRIBUTE,
                    "The \"is\" attribute is not allowed",
                    attr.location,
                )?;
                continue;
            }
            if ns == Namespace::Html && name.chars().any(|c| c.is_ascii_uppercase()) {
                self.error(
                    VAL_ATTRIBUTE_CASE,
                    &format!("Attribute \"{}\" must be lower case", name),
                    attr.location,
                )?;
                continue;
            }
            if name == "tabindex" {
                if let SyntaxValue::Literal(value) = &attr.value {
                    if value != "0" && value != "-1" {
                        self.error(
                            VAL_INVALID_TABINDEX,
                            "tabindex must be 0 or -1",
                            attr.location,
                        )?;
                    }
                }
            }

            let value = match &attr.value {
                SyntaxValue::Literal(value) => AttributeValue::Static(value.clone()),
                SyntaxValue::Boolean => AttributeValue::Boolean,
                SyntaxValue::Expression(source) => {
                    AttributeValue::Dynamic(self.bind_expression(source, attr.location)?)
                }
            };
            data.attributes.push(Attribute {
                name: name.to_string(),
                value,
                location: attr.location,
            });
        }

        Ok(data)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

/// Builds the IR for a parsed root `<template>`. Keys are assigned before returning.
pub fn build_ir(
    root: &SyntaxElement,
    config: &CompilerConfig,
    resolver: &dyn TagResolver,
    diag: &mut Diagnostics,
) -> Step<IrTree> {
    let mut render_mode = RenderMode::Shadow;
    let mut preserve_comments = config.preserve_html_comments;

    for attr in &root.attributes {
        match (attr.name.as_str(), &attr.value) {
            ("lwc:render-mode", SyntaxValue::Literal(value)) => {
                match RenderMode::from_attribute(value) {
                    Some(mode) => render_mode = mode,
                    None => diag.error(
                        VAL_DIRECTIVE_VALUE,
                        &format!(
                            "lwc:render-mode must be \"shadow\" or \"light\", found \"{}\"",
                            value
                        ),
                        attr.location,
                    )?,
                }
            }
            ("lwc:render-mode", _) => diag.error(
                VAL_DIRECTIVE_VALUE,
                "lwc:render-mode expects a string value",
                attr.location,
            )?,
            ("lwc:preserve-comments", _) => preserve_comments = true,
            (name, _) => diag.error(
                VAL_ROOT_ATTRIBUTE,
                &format!("Attribute \"{}\" is not allowed on the root <template>", name),
                attr.location,
            )?,
        }
    }

    let mut builder = IrBuilder {
        tree: IrTree::new(root.location, render_mode),
        config,
        resolver,
        diag,
        preserve_comments,
    };
    let root_id = builder.tree.root();
    builder.build_children(&root.children, root_id, Namespace::Html)?;

    let mut tree = builder.tree;
    tree.assign_keys();
    log::debug!(
        "built IR with {} node(s) in {} mode",
        tree.len(),
        render_mode.as_str()
    );
    Ok(tree)
}
