//! Code emitter.
//!
//! Turns the transformer output into the render module: imports, hoisted
//! fragment and literal declarations, the `tmpl` generator and its metadata.
//! Every table consulted here is insertion-ordered, so identical input
//! always produces byte-identical JavaScript.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::{CompilerConfig, RenderMode};
use crate::diagnostics::{CompilerError, SourceLocation, INT_UNEXPECTED_NODE};
use crate::expression::{Expr, Literal, MemberProperty};
use crate::ir::{Namespace, TextPart};
use crate::static_analysis::StaticAnalysis;
use crate::transform::{
    HoistedLiteral, KeyRef, LoopBinding, LoopKey, PartBinding, PartBindingKind, PropBinding,
    PropValue, Props, SlotContent, Stmt, TransformOutput,
};

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoistedFragment {
    pub name: String,
    pub digest: String,
    pub html: String,
    pub part_count: usize,
    pub namespace: Namespace,
}

impl HoistedFragment {
    /// Runtime parser for the fragment; foreign roots need an SVG parse context.
    fn parser(&self) -> &'static str {
        match self.namespace {
            Namespace::Html => "parseFragment",
            Namespace::Svg | Namespace::MathMl => "parseSVGFragment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderMetadata {
    pub api_version: u32,
    pub slots: Vec<String>,
    pub render_mode: RenderMode,
    pub stylesheet_token: String,
    pub legacy_stylesheet_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderModule {
    pub code: String,
    pub fragments: Vec<HoistedFragment>,
    pub hoisted_literals: Vec<HoistedLiteral>,
    pub metadata: RenderMetadata,
    pub statements: Vec<Stmt>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// RUNTIME HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Short runtime API keys and the local names the generated body calls them by.
const HELPERS: &[(&str, &str)] = &[
    ("st", "api_static_fragment"),
    ("sp", "api_static_part"),
    ("d", "api_dynamic_text"),
    ("da", "api_dynamic_attribute"),
    ("gid", "api_scoped_id"),
    ("fid", "api_scoped_frag_id"),
    ("spr", "api_spread"),
    ("b", "api_bind"),
    ("rf", "api_ref"),
    ("ih", "api_inner_html"),
    ("s", "api_slot"),
    ("c", "api_custom_element"),
    ("dc", "api_dynamic_component"),
    ("ssf", "api_scoped_slot_factory"),
    ("i", "api_iterator"),
    ("k", "api_key"),
];

fn helper_name(alias: &str) -> &'static str {
    HELPERS
        .iter()
        .find(|(short, _)| *short == alias)
        .map(|(_, name)| *name)
        .unwrap_or("api_unknown")
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSIONS
// ═══════════════════════════════════════════════════════════════════════════════

pub(crate) fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn render_literal(literal: &Literal) -> String {
    match literal {
        Literal::String(value) => js_string(value),
        Literal::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
            format!("{}", *n as i64)
        }
        Literal::Number(n) => format!("{}", n),
        Literal::Boolean(b) => b.to_string(),
        Literal::Null => "null".to_string(),
    }
}

/// JavaScript source for `expr`. Unresolved identifiers read from the component.
pub fn render_expr(expr: &Expr) -> String {
    match expr {
        Expr::Identifier { name } => format!("$cmp.{}", name),
        Expr::Scoped { name } => name.clone(),
        Expr::Member {
            object,
            property,
            optional,
        } => {
            let object = render_operand(object);
            match (property, optional) {
                (MemberProperty::Name(name), false) => format!("{}.{}", object, name),
                (MemberProperty::Name(name), true) => format!("{}?.{}", object, name),
                (MemberProperty::Index(index), false) => {
                    format!("{}[{}]", object, render_literal(index))
                }
                (MemberProperty::Index(index), true) => {
                    format!("{}?.[{}]", object, render_literal(index))
                }
            }
        }
        Expr::Literal { value } => render_literal(value),
        Expr::Not { argument } => format!("!{}", render_operand(argument)),
        Expr::Logical {
            operator,
            left,
            right,
        } => format!(
            "{} {} {}",
            render_operand(left),
            operator.as_str(),
            render_operand(right)
        ),
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => format!(
            "{} ? {} : {}",
            render_operand(test),
            render_operand(consequent),
            render_operand(alternate)
        ),
        Expr::Concat { parts } => parts
            .iter()
            .map(render_operand)
            .collect::<Vec<_>>()
            .join(" + "),
    }
}

fn render_operand(expr: &Expr) -> String {
    match expr {
        Expr::Logical { .. } | Expr::Conditional { .. } | Expr::Concat { .. } => {
            format!("({})", render_expr(expr))
        }
        _ => render_expr(expr),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAMING
// ═══════════════════════════════════════════════════════════════════════════════

/// `x-foo-bar` → `_xFooBar`.
fn component_local(tag: &str) -> String {
    let mut local = String::from("_");
    for (i, segment) in tag.split('-').filter(|s| !s.is_empty()).enumerate() {
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            if i == 0 {
                local.push(first);
            } else {
                local.extend(first.to_uppercase());
            }
            local.push_str(chars.as_str());
        }
    }
    local
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Scoping token for the component's stylesheets, stable per namespace and name.
pub fn stylesheet_token(namespace: &str, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}-{}", namespace, name).as_bytes());
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    format!("lwc-{}", to_base36(u64::from_be_bytes(head)))
}

pub fn legacy_stylesheet_token(namespace: &str, name: &str) -> String {
    format!("{}-{}_{}", namespace, name, name)
}

// ═══════════════════════════════════════════════════════════════════════════════
// BODY WRITER
// ═══════════════════════════════════════════════════════════════════════════════

struct BodyWriter<'a> {
    out: String,
    depth: usize,
    helpers: IndexSet<&'static str>,
    components: &'a IndexMap<String, String>,
}

impl<'a> BodyWriter<'a> {
    fn use_helper(&mut self, alias: &'static str) -> &'static str {
        self.helpers.insert(alias);
        helper_name(alias)
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn block<F: FnOnce(&mut Self)>(&mut self, open: &str, close: &str, body: F) {
        self.line(open);
        self.depth += 1;
        body(self);
        self.depth -= 1;
        self.line(close);
    }

    fn key(&mut self, key: &KeyRef) -> String {
        match key {
            KeyRef::Static(key) => key.to_string(),
            KeyRef::Iteration { node, value } => {
                let k = self.use_helper("k");
                let value = match value {
                    LoopKey::Expr(expr) => render_expr(expr),
                    LoopKey::Index(index) => index.clone(),
                };
                format!("{}({}, {})", k, node, value)
            }
        }
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Markup { value } => self.line(&format!("yield {};", js_string(value))),
            Stmt::Boundary => self.line("yield \"<!---->\";"),
            Stmt::Text { value } => {
                let d = self.use_helper("d");
                self.line(&format!("yield {}({});", d, render_expr(value)));
            }
            Stmt::Attribute { name, value } => {
                let da = self.use_helper("da");
                self.line(&format!(
                    "yield {}({}, {});",
                    da,
                    js_string(name),
                    render_expr(value)
                ));
            }
            Stmt::ScopedAttribute { name, value } => {
                let scoped = self.scoped_value(name, value);
                let open = js_string(&format!(" {}=\"", name));
                self.line(&format!("yield {} + {} + \"\\\"\";", open, scoped));
            }
            Stmt::Spread { value } => {
                let spr = self.use_helper("spr");
                self.line(&format!("yield {}({});", spr, render_expr(value)));
            }
            Stmt::Listener { event, handler } => {
                let b = self.use_helper("b");
                self.line(&format!(
                    "yield {}({}, {});",
                    b,
                    js_string(event),
                    render_expr(handler)
                ));
            }
            Stmt::Ref { name } => {
                let rf = self.use_helper("rf");
                self.line(&format!("yield {}({});", rf, js_string(name)));
            }
            Stmt::InnerHtml { value } => {
                let ih = self.use_helper("ih");
                self.line(&format!("yield {}({});", ih, render_expr(value)));
            }
            Stmt::Fragment { name, key, parts } => {
                let st = self.use_helper("st");
                let parts = self.parts(parts);
                let key = self.key(key);
                self.line(&format!("yield {}({}, {}, {});", st, name, key, parts));
            }
            Stmt::If {
                test,
                compare,
                consequent,
                alternate,
            } => self.if_chain(test, *compare, consequent, alternate, "if"),
            Stmt::Loop {
                iterable,
                binding,
                body,
            } => self.loop_stmt(iterable, binding, body),
            Stmt::Slot {
                name,
                data,
                fallback,
            } => {
                let s = self.use_helper("s");
                let data = data.as_ref().map_or("null".to_string(), render_expr);
                self.block(
                    &format!("yield* {}({}, {}, function* () {{", s, js_string(name), data),
                    "}, $slotset);",
                    |w| w.stmts(fallback),
                );
            }
            Stmt::Component {
                tag,
                key,
                props,
                slots,
                ..
            } => {
                let c = self.use_helper("c");
                let local = self
                    .components
                    .get(tag)
                    .cloned()
                    .unwrap_or_else(|| component_local(tag));
                let props = self.props(props);
                let key = self.key(key);
                let head = format!(
                    "yield* {}({}, {}, {}, {}",
                    c,
                    js_string(tag),
                    local,
                    key,
                    props
                );
                self.component_slots(&head, slots);
            }
            Stmt::DynamicComponent {
                tag,
                constructor,
                key,
                props,
                slots,
            } => {
                let dc = self.use_helper("dc");
                let props = self.props(props);
                let key = self.key(key);
                let head = format!(
                    "yield* {}({}, {}, {}, {}",
                    dc,
                    js_string(tag),
                    render_expr(constructor),
                    key,
                    props
                );
                self.component_slots(&head, slots);
            }
            Stmt::ScopedSlotFactory {
                slot, param, body, ..
            } => {
                let ssf = self.use_helper("ssf");
                self.block(
                    &format!("yield {}({}, function* ({}) {{", ssf, js_string(slot), param),
                    "});",
                    |w| w.stmts(body),
                );
            }
        }
    }

    fn scoped_value(&mut self, name: &str, value: &str) -> String {
        if name == "href" {
            let fid = self.use_helper("fid");
            format!("{}({})", fid, js_string(value))
        } else {
            let gid = self.use_helper("gid");
            format!("{}({})", gid, js_string(value))
        }
    }

    fn if_chain(
        &mut self,
        test: &Expr,
        compare: Option<bool>,
        consequent: &[Stmt],
        alternate: &[Stmt],
        keyword: &str,
    ) {
        let test = match compare {
            Some(expected) => format!("{} === {}", expected, render_operand(test)),
            None => render_expr(test),
        };
        self.line(&format!("{} ({}) {{", keyword, test));
        self.depth += 1;
        self.stmts(consequent);
        self.depth -= 1;

        match alternate {
            [] => self.line("}"),
            [Stmt::If {
                test,
                compare,
                consequent,
                alternate,
            }] => self.if_chain(test, *compare, consequent, alternate, "} else if"),
            _ => self.block("} else {", "}", |w| w.stmts(alternate)),
        }
    }

    fn loop_stmt(&mut self, iterable: &Expr, binding: &LoopBinding, body: &[Stmt]) {
        let i = self.use_helper("i");
        let head = match binding {
            LoopBinding::Each { item, index } => format!(
                "for (const [{}, {}] of {}({}, false)) {{",
                item,
                index.as_deref().unwrap_or("$index"),
                i,
                render_expr(iterable)
            ),
            LoopBinding::Iterator { name } => {
                format!("for (const {} of {}({}, true)) {{", name, i, render_expr(iterable))
            }
        };
        self.block(&head, "}", |w| w.stmts(body));
    }

    fn parts(&mut self, parts: &[PartBinding]) -> String {
        if parts.is_empty() {
            return "null".to_string();
        }
        let mut grouped: IndexMap<u32, (Vec<String>, Vec<String>, Option<String>)> =
            IndexMap::new();
        for part in parts {
            let entry = grouped.entry(part.id).or_default();
            match &part.binding {
                PartBindingKind::Text { parts } => {
                    entry.2 = Some(self.text_value(parts));
                }
                PartBindingKind::Attribute { name, value } => {
                    entry
                        .0
                        .push(format!("{}: {}", js_string(name), render_expr(value)));
                }
                PartBindingKind::ScopedId { name, value } => {
                    let scoped = self.scoped_value(name, value);
                    entry.0.push(format!("{}: {}", js_string(name), scoped));
                }
                PartBindingKind::Listener { event, handler } => {
                    entry
                        .1
                        .push(format!("{}: {}", js_string(event), render_expr(handler)));
                }
            }
        }
        let sp = self.use_helper("sp");
        let rendered: Vec<String> = grouped
            .into_iter()
            .map(|(id, (attrs, on, text))| {
                format!(
                    "{}({}, {{ attrs: {{{}}}, on: {{{}}} }}, {})",
                    sp,
                    id,
                    attrs.join(", "),
                    on.join(", "),
                    text.unwrap_or_else(|| "null".to_string())
                )
            })
            .collect();
        format!("[{}]", rendered.join(", "))
    }

    fn text_value(&mut self, parts: &[TextPart]) -> String {
        let d = self.use_helper("d");
        parts
            .iter()
            .map(|part| match part {
                TextPart::Literal(text) => js_string(text),
                TextPart::Expression(expr) => format!("{}({})", d, render_expr(expr)),
            })
            .collect::<Vec<_>>()
            .join(" + ")
    }

    fn props(&mut self, props: &Props) -> String {
        match props {
            Props::Hoisted { name } => name.clone(),
            Props::Inline {
                attributes,
                listeners,
                spread,
                lwc_ref,
            } => {
                let mut fields = vec![format!("props: {}", prop_object(attributes))];
                if !listeners.is_empty() {
                    let on: Vec<String> = listeners
                        .iter()
                        .map(|l| format!("{}: {}", js_string(&l.event), render_expr(&l.handler)))
                        .collect();
                    fields.push(format!("on: {{{}}}", on.join(", ")));
                }
                if let Some(spread) = spread {
                    fields.push(format!("spread: {}", render_expr(spread)));
                }
                if let Some(name) = lwc_ref {
                    fields.push(format!("ref: {}", js_string(name)));
                }
                format!("{{ {} }}", fields.join(", "))
            }
        }
    }

    fn component_slots(&mut self, head: &str, slots: &[SlotContent]) {
        if slots.is_empty() {
            self.line(&format!("{}, null);", head));
            return;
        }
        self.line(&format!("{}, {{", head));
        self.depth += 1;
        for slot in slots {
            self.block(
                &format!("{}: function* () {{", js_string(&slot.name)),
                "},",
                |w| w.stmts(&slot.body),
            );
        }
        self.depth -= 1;
        self.line("});");
    }
}

fn prop_object(props: &[PropBinding]) -> String {
    let fields: Vec<String> = props
        .iter()
        .map(|p| {
            let value = match &p.value {
                PropValue::Static(value) => js_string(value),
                PropValue::Boolean => "true".to_string(),
                PropValue::Dynamic(expr) => render_expr(expr),
            };
            format!("{}: {}", js_string(&p.name), value)
        })
        .collect();
    format!("{{{}}}", fields.join(", "))
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

pub fn emit(
    output: TransformOutput,
    analysis: &StaticAnalysis,
    config: &CompilerConfig,
    file: &str,
) -> Result<RenderModule, CompilerError> {
    let namespace = config.namespace.as_str();
    let name = config.component_name.as_str();

    let mut fragments = Vec::with_capacity(output.fragments.len());
    for fragment in &output.fragments {
        let descriptor = analysis.table().get(&fragment.digest).ok_or_else(|| {
            CompilerError::internal(
                INT_UNEXPECTED_NODE,
                &format!("fragment {} is missing from the fragment table", fragment.name),
                file,
                SourceLocation::new(1, 1),
            )
        })?;
        fragments.push(HoistedFragment {
            name: fragment.name.clone(),
            digest: fragment.digest.clone(),
            html: descriptor.html.clone(),
            part_count: descriptor.parts.len(),
            namespace: descriptor.namespace,
        });
    }

    let components: IndexMap<String, String> = output
        .components
        .iter()
        .map(|c| (c.tag.clone(), component_local(&c.tag)))
        .collect();

    let mut writer = BodyWriter {
        out: String::new(),
        depth: 1,
        helpers: IndexSet::new(),
        components: &components,
    };
    writer.stmts(&output.body);
    let body = writer.out;
    let helpers = writer.helpers;

    let metadata = RenderMetadata {
        api_version: config.api_version().get(),
        slots: output.slots.clone(),
        render_mode: output.render_mode,
        stylesheet_token: stylesheet_token(namespace, name),
        legacy_stylesheet_token: legacy_stylesheet_token(namespace, name),
    };

    let mut code = String::new();
    code.push_str(&format!(
        "// Generated by template-compiler-native v{}\n",
        env!("CARGO_PKG_VERSION")
    ));
    for component in &output.components {
        code.push_str(&format!(
            "import {} from {};\n",
            components[&component.tag],
            js_string(&component.source)
        ));
    }
    code.push_str(&format!(
        "import _implicitStylesheets from {};\n",
        js_string(&format!("./{}.css", name))
    ));
    code.push_str(&format!(
        "import _implicitScopedStylesheets from {};\n",
        js_string(&format!("./{}.scoped.css?scoped=true", name))
    ));
    let mut runtime: Vec<&str> = vec!["freezeTemplate"];
    for parser in ["parseFragment", "parseSVGFragment"] {
        if fragments.iter().any(|f| f.parser() == parser) {
            runtime.push(parser);
        }
    }
    runtime.push("registerTemplate");
    code.push_str(&format!(
        "import {{ {} }} from \"lwc\";\n",
        runtime.join(", ")
    ));

    for fragment in &fragments {
        code.push_str(&format!(
            "const {} = {}`{}`;\n",
            fragment.name,
            fragment.parser(),
            fragment.html
        ));
    }
    for literal in &output.literals {
        code.push_str(&format!(
            "const {} = {{ props: {} }};\n",
            literal.name,
            prop_object(&literal.props)
        ));
    }

    code.push_str("function* tmpl($api, $cmp, $slotset, $ctx) {\n");
    if !helpers.is_empty() {
        let bindings: Vec<String> = helpers
            .iter()
            .map(|alias| format!("{}: {}", alias, helper_name(alias)))
            .collect();
        code.push_str(&format!("  const {{ {} }} = $api;\n", bindings.join(", ")));
    }
    code.push_str(&body);
    code.push_str("}\n");

    code.push_str(&format!("tmpl.apiVersion = {};\n", metadata.api_version));
    if !metadata.slots.is_empty() {
        let slots: Vec<String> = metadata.slots.iter().map(|s| js_string(s)).collect();
        code.push_str(&format!("tmpl.slots = [{}];\n", slots.join(", ")));
    }
    if metadata.render_mode == RenderMode::Light {
        code.push_str("tmpl.renderMode = \"light\";\n");
    }
    code.push_str("tmpl.stylesheets = [];\n");
    code.push_str(&format!(
        "tmpl.stylesheetToken = {};\n",
        js_string(&metadata.stylesheet_token)
    ));
    code.push_str(&format!(
        "tmpl.legacyStylesheetToken = {};\n",
        js_string(&metadata.legacy_stylesheet_token)
    ));
    for sheet in ["_implicitStylesheets", "_implicitScopedStylesheets"] {
        code.push_str(&format!(
            "if ({sheet}) {{\n  tmpl.stylesheets.push.apply(tmpl.stylesheets, {sheet});\n}}\n"
        ));
    }
    code.push_str("freezeTemplate(tmpl);\n");
    code.push_str("export default registerTemplate(tmpl);\n");

    log::debug!(
        "emitted {} byte(s), {} fragment(s), {} helper(s)",
        code.len(),
        fragments.len(),
        helpers.len()
    );
    Ok(RenderModule {
        code,
        fragments,
        hoisted_literals: output.literals,
        metadata,
        statements: output.body,
    })
}
