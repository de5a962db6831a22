#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::builder::build_ir;
    use crate::diagnostics::{
        Diagnostics, ErrorCategory, CFG_DYNAMIC_COMPONENTS_DISABLED, VAL_DISALLOWED_EXPRESSION,
        VAL_DUPLICATE_SLOT, VAL_ELSE_WITHOUT_IF, VAL_FORBIDDEN_ATTRIBUTE, VAL_FOR_EACH_MISSING_ITEM,
        VAL_MULTIPLE_CONTROL_DIRECTIVES, VAL_UNKNOWN_COMPONENT, W_DEPRECATED_DIRECTIVE,
        W_KEY_OUTSIDE_ITERATION, W_MISSING_LOOP_KEY,
    };
    use crate::expression::Expr;
    use crate::ir::{IrTree, Namespace, TextPart};
    use crate::parse::{parse_template, ParseOptions};
    use crate::resolver::{NamespaceResolver, TagTable};
    use crate::transform::{KeyRef, PartBindingKind, Stmt};
    use crate::{compile, CompileFailure, CompileOutput, CompilerConfig, RenderMode};

    fn config() -> CompilerConfig {
        CompilerConfig {
            namespace: "x".to_string(),
            component_name: "foo".to_string(),
            ..Default::default()
        }
    }

    fn ok(source: &str) -> CompileOutput {
        ok_with(source, &config())
    }

    fn ok_with(source: &str, config: &CompilerConfig) -> CompileOutput {
        match compile(source, config, &NamespaceResolver) {
            Ok(output) => output,
            Err(failure) => panic!("compilation failed: {:?}", failure.errors),
        }
    }

    fn fail(source: &str) -> CompileFailure {
        fail_with(source, &config())
    }

    fn fail_with(source: &str, config: &CompilerConfig) -> CompileFailure {
        match compile(source, config, &NamespaceResolver) {
            Ok(output) => panic!("expected failure, got:\n{}", output.code()),
            Err(failure) => failure,
        }
    }

    fn build(source: &str) -> IrTree {
        let config = config();
        let options = ParseOptions {
            file: "x/foo.html",
            legacy_quirks: false,
        };
        let parsed = parse_template(source, &options).unwrap();
        let mut diag = Diagnostics::new("x/foo.html", false);
        build_ir(&parsed.root, &config, &NamespaceResolver, &mut diag).unwrap()
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // HOISTING
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_static_paragraph_is_one_hoisted_fragment() {
        let output = ok("<template><p>Hello</p></template>");
        let module = &output.module;

        assert_eq!(module.fragments.len(), 1);
        assert_eq!(module.fragments[0].name, "$fragment1");
        assert_eq!(module.fragments[0].html, "<p>Hello</p>");
        assert_eq!(module.fragments[0].part_count, 0);
        assert_eq!(
            module.statements,
            vec![Stmt::Fragment {
                name: "$fragment1".to_string(),
                key: KeyRef::Static(1),
                parts: vec![],
            }]
        );
        assert!(output
            .code()
            .contains("const $fragment1 = parseFragment`<p>Hello</p>`;"));
        assert!(output.code().contains("yield api_static_fragment($fragment1, 1, null);"));
    }

    #[test]
    fn test_dynamic_text_is_one_part() {
        let output = ok("<template><p>{greeting}</p></template>");
        let module = &output.module;

        assert_eq!(module.fragments.len(), 1);
        assert_eq!(module.fragments[0].html, "<p>${\"t1\"}</p>");
        assert_eq!(module.fragments[0].part_count, 1);

        let Stmt::Fragment { parts, .. } = &module.statements[0] else {
            panic!("expected a fragment, got {:?}", module.statements);
        };
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].id, 1);
        assert_eq!(
            parts[0].binding,
            PartBindingKind::Text {
                parts: vec![TextPart::Expression(Expr::identifier("greeting"))],
            }
        );
        assert!(output.code().contains("api_dynamic_text($cmp.greeting)"));
    }

    #[test]
    fn test_svg_hoist_root_uses_svg_parser() {
        let output = ok(r#"<template><svg><template lwc:if={x}><path d="M0"></path></template></svg></template>"#);
        let module = &output.module;
        assert_eq!(module.fragments.len(), 1);
        assert_eq!(module.fragments[0].namespace, Namespace::Svg);
        assert!(output
            .code()
            .contains("const $fragment1 = parseSVGFragment`<path d=\"M0\"></path>`;"));
        assert!(output
            .code()
            .contains("import { freezeTemplate, parseSVGFragment, registerTemplate } from \"lwc\";"));
    }

    #[test]
    fn test_same_markup_in_different_namespaces_is_not_shared() {
        let output = ok(
            r#"<template><a>x</a><svg><template lwc:if={x}><a>x</a></template></svg></template>"#,
        );
        let module = &output.module;
        assert_eq!(module.fragments.len(), 2);
        assert_ne!(module.fragments[0].digest, module.fragments[1].digest);
        assert!(output.code().contains("const $fragment1 = parseFragment`<a>x</a>`;"));
        assert!(output.code().contains("const $fragment2 = parseSVGFragment`<a>x</a>`;"));
    }

    #[test]
    fn test_identical_markup_shares_one_fragment() {
        let once = ok("<template><p>Hi</p></template>");
        let thrice = ok("<template><p>Hi</p><p>Hi</p><p>Hi</p></template>");
        assert_eq!(once.module.fragments.len(), 1);
        assert_eq!(thrice.module.fragments.len(), 1);

        let names: Vec<&str> = thrice
            .module
            .statements
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::Fragment { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["$fragment1", "$fragment1", "$fragment1"]);
    }

    #[test]
    fn test_static_optimization_toggle() {
        let config = CompilerConfig {
            enable_static_content_optimization: false,
            ..config()
        };
        let output = ok_with("<template><p>{greeting}</p></template>", &config);
        assert!(output.module.fragments.is_empty());
        assert!(!output.code().contains("parseFragment"));
        assert_eq!(
            output.module.statements,
            vec![
                Stmt::markup("<p>"),
                Stmt::Text {
                    value: Expr::identifier("greeting")
                },
                Stmt::markup("</p>"),
            ]
        );
    }

    #[test]
    fn test_adjacent_markup_merges_when_not_hoisted() {
        let config = CompilerConfig {
            enable_static_content_optimization: false,
            ..config()
        };
        let output = ok_with("<template><p>Hello</p><hr></template>", &config);
        assert_eq!(output.module.statements, vec![Stmt::markup("<p>Hello</p><hr>")]);
    }

    #[test]
    fn test_scoped_ids_become_parts() {
        let output = ok(r#"<template><div id="main"></div></template>"#);
        assert_eq!(output.module.fragments[0].html, "<div></div>");
        assert!(output.code().contains("api_scoped_id(\"main\")"));

        let config = CompilerConfig {
            disable_synthetic_shadow_support: true,
            ..config()
        };
        let output = ok_with(r#"<template><div id="main"></div></template>"#, &config);
        assert_eq!(output.module.fragments[0].html, "<div id=\"main\"></div>");
        assert_eq!(output.module.fragments[0].part_count, 0);
    }

    #[test]
    fn test_template_literal_characters_are_escaped() {
        let output = ok("<template><p>cost: `5` \\ $</p></template>");
        assert_eq!(output.module.fragments[0].html, "<p>cost: \\`5\\` \\\\ $</p>");
    }

    #[test]
    fn test_character_references_decode_into_props_and_reencode_into_markup() {
        let output = ok(r#"<template><x-child title="a &amp; b"></x-child></template>"#);
        assert!(output
            .code()
            .contains("const stc1 = { props: {\"title\": \"a & b\"} };"));

        let output = ok(r#"<template><p title="a &amp; b">a &lt; b</p></template>"#);
        assert_eq!(
            output.module.fragments[0].html,
            "<p title=\"a &amp; b\">a &lt; b</p>"
        );
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // KEYS AND DETERMINISM
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_keys_are_unique_and_preorder() {
        let tree = build(
            "<template><div lwc:if={a}><span>a</span></div><p lwc:else>b</p><ul><li>c</li></ul></template>",
        );
        let mut keys: Vec<u32> = tree.iter().map(|node| node.key().unwrap()).collect();
        let total = keys.len();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), total);
        assert_eq!(keys, (0..total as u32).collect::<Vec<_>>());
        assert_eq!(tree.node(tree.root()).key(), Some(0));
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let source = r#"<template>
            <x-child title="hi" onclick={handle}></x-child>
            <template for:each={items} for:item="item">
                <li key={item.id}>{item.label}</li>
            </template>
            <p lwc:if={show}>{message}</p>
            <p lwc:else>Nothing</p>
        </template>"#;
        let first = ok(source);
        let second = ok(source);
        assert_eq!(first.code(), second.code());
        assert_eq!(first.module, second.module);
    }

    #[test]
    fn test_api_version_is_clamped_in_output() {
        let cases = [
            (Some(0.0), 58),
            (Some(9007199254740991.0), 65),
            (Some(61.7), 61),
            (None, 65),
        ];
        for (requested, expected) in cases {
            let config = CompilerConfig {
                api_version: requested,
                ..config()
            };
            let output = ok_with("<template></template>", &config);
            assert_eq!(output.module.metadata.api_version, expected);
            assert!(output
                .code()
                .contains(&format!("tmpl.apiVersion = {};", expected)));
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // DIRECTIVES
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_control_directives_are_exclusive() {
        let failure = fail(
            r#"<template><div lwc:if={a} for:each={items} for:item="item"></div></template>"#,
        );
        let err = failure.first().unwrap();
        assert_eq!(err.code, VAL_MULTIPLE_CONTROL_DIRECTIVES);
        assert!(err.message.contains("lwc:if"));
        assert!(err.message.contains("for:each"));
    }

    #[test]
    fn test_else_without_if() {
        let failure = fail("<template>\n  <p lwc:else>no</p>\n</template>");
        let err = failure.first().unwrap();
        assert_eq!(err.code, VAL_ELSE_WITHOUT_IF);
        assert_eq!(err.category, ErrorCategory::Validation);
        assert_eq!(err.location.file, "x/foo.html");
        assert_eq!((err.location.line, err.location.column), (2, 3));

        let failure = fail("<template><p lwc:if={a}>a</p>text<p lwc:else>b</p></template>");
        assert!(failure.has_code(VAL_ELSE_WITHOUT_IF));
    }

    #[test]
    fn test_if_chain_compiles_to_nested_branches() {
        let output = ok(
            "<template><p lwc:if={a}>a</p><p lwc:elseif={b}>b</p><p lwc:else>c</p></template>",
        );
        let Stmt::If {
            consequent,
            alternate,
            ..
        } = &output.module.statements[0]
        else {
            panic!("expected if, got {:?}", output.module.statements);
        };
        assert_eq!(consequent.first(), Some(&Stmt::Boundary));
        assert_eq!(consequent.last(), Some(&Stmt::Boundary));
        assert!(matches!(&alternate[0], Stmt::If { .. }));
        assert!(output.code().contains("} else if ($cmp.b) {"));
    }

    #[test]
    fn test_template_control_rejects_key_and_slot() {
        let failure = fail("<template><template lwc:if={a} key={b}><p>x</p></template></template>");
        let err = failure.first().unwrap();
        assert_eq!(err.code, VAL_FORBIDDEN_ATTRIBUTE);
        assert_eq!((err.location.line, err.location.column), (1, 32));

        let failure = fail(r#"<template><template lwc:if={a} slot="s"><p>x</p></template></template>"#);
        let err = failure.first().unwrap();
        assert_eq!(err.code, VAL_FORBIDDEN_ATTRIBUTE);
        assert_eq!((err.location.line, err.location.column), (1, 32));

        ok(r#"<template><x-child><template lwc:slot-data="row" slot="s">{row.name}</template></x-child></template>"#);
    }

    #[test]
    fn test_for_each_requires_item() {
        let failure = fail("<template><template for:each={items}><li>x</li></template></template>");
        assert!(failure.has_code(VAL_FOR_EACH_MISSING_ITEM));
    }

    #[test]
    fn test_loop_without_key_warns_and_uses_index() {
        let output = ok(
            r#"<template><template for:each={items} for:item="item"><li>{item.name}</li></template></template>"#,
        );
        let missing: Vec<_> = output
            .warnings
            .iter()
            .filter(|w| w.code == W_MISSING_LOOP_KEY)
            .collect();
        assert_eq!(missing.len(), 1);
        assert_eq!((missing[0].location.line, missing[0].location.column), (1, 54));
        let code = output.code();
        assert!(code.contains("for (const [item, $index] of api_iterator($cmp.items, false)) {"));
        assert!(code.contains("yield api_static_fragment($fragment1, api_key(2, $index), "));
        assert!(code.contains("api_dynamic_text(item.name)"));
    }

    #[test]
    fn test_keyed_loop_uses_key_expression() {
        let output = ok(
            r#"<template><ul><template for:each={items} for:item="item"><li key={item.id}>{item.name}</li></template></ul></template>"#,
        );
        assert!(output.warnings.is_empty());
        assert!(!output.code().contains("$key"));
        assert!(output
            .code()
            .contains("yield api_static_fragment($fragment1, api_key(3, item.id), "));
    }

    #[test]
    fn test_each_repeated_element_uses_its_own_key() {
        let output = ok(
            r#"<template><template for:each={items} for:item="it"><p key={it.id}>a</p><span key={it.other}>b</span></template></template>"#,
        );
        assert!(output.warnings.is_empty(), "{:?}", output.warnings);
        let code = output.code();
        assert!(code.contains("yield api_static_fragment($fragment1, api_key(2, it.id), null);"));
        assert!(code.contains("yield api_static_fragment($fragment2, api_key(4, it.other), null);"));
    }

    #[test]
    fn test_unkeyed_sibling_in_loop_warns_on_its_own() {
        let output = ok(
            r#"<template><template for:each={items} for:item="it"><p key={it.id}>a</p><span>b</span></template></template>"#,
        );
        let missing: Vec<_> = output
            .warnings
            .iter()
            .filter(|w| w.code == W_MISSING_LOOP_KEY)
            .collect();
        assert_eq!(missing.len(), 1);
        assert!(missing[0].message.contains("<span>"));
        let code = output.code();
        assert!(code.contains("api_key(2, it.id)"));
        assert!(code.contains("api_key(4, $index)"));
    }

    #[test]
    fn test_conditional_children_in_loop_keep_distinct_keys() {
        let output = ok(
            r#"<template><template for:each={items} for:item="it"><template lwc:if={it.ok}><p key={it.id}>a</p><span key={it.other}>b</span></template></template></template>"#,
        );
        assert!(output.warnings.is_empty(), "{:?}", output.warnings);
        let code = output.code();
        assert!(code.contains("api_key(3, it.id)"));
        assert!(code.contains("api_key(5, it.other)"));
    }

    #[test]
    fn test_loop_key_seen_through_conditional() {
        let output = ok(
            r#"<template><template for:each={items} for:item="item"><li key={item.id} lwc:if={item.ok}>x</li></template></template>"#,
        );
        assert!(output.warnings.is_empty(), "{:?}", output.warnings);
        assert!(output.code().contains("api_key(3, item.id)"));

        let output = ok(r#"<template><p key={id}>x</p></template>"#);
        assert!(output.warnings.iter().any(|w| w.code == W_KEY_OUTSIDE_ITERATION));
    }

    #[test]
    fn test_iterator_directive() {
        let output = ok(
            r#"<template><template iterator:it={items}><p key={it.value.id}>{it.value.label}</p></template></template>"#,
        );
        assert!(output.code().contains("for (const it of api_iterator($cmp.items, true)) {"));
        assert!(output.code().contains("it.value.label"));
    }

    #[test]
    fn test_legacy_if_compares_strictly() {
        let output = ok("<template><p if:true={visible}>x</p><p if:false={visible}>y</p></template>");
        assert!(output.warnings.iter().any(|w| w.code == W_DEPRECATED_DIRECTIVE));
        assert!(output.code().contains("if (true === $cmp.visible) {"));
        assert!(output.code().contains("if (false === $cmp.visible) {"));
        let Stmt::If { consequent, .. } = &output.module.statements[0] else {
            panic!("expected if");
        };
        assert!(!consequent.contains(&Stmt::Boundary));
    }

    #[test]
    fn test_disallowed_expression() {
        let failure = fail("<template><p>{format(value)}</p></template>");
        assert!(failure.has_code(VAL_DISALLOWED_EXPRESSION));
    }

    #[test]
    fn test_collect_all_reports_every_error() {
        let source = "<template><p lwc:else>a</p><div title={a()}></div></template>";
        let failure = fail(source);
        assert_eq!(failure.errors.len(), 1);

        let config = CompilerConfig {
            collect_all_errors: true,
            ..config()
        };
        let failure = fail_with(source, &config);
        assert_eq!(failure.errors.len(), 2);
        assert!(failure.has_code(VAL_ELSE_WITHOUT_IF));
        assert!(failure.has_code(VAL_DISALLOWED_EXPRESSION));
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // COMPONENTS AND SLOTS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_component_import_and_hoisted_props() {
        let output = ok(r#"<template><x-child title="hi"></x-child></template>"#);
        let code = output.code();
        assert!(code.contains("import _xChild from \"x/child\";"));
        assert!(code.contains("const stc1 = { props: {\"title\": \"hi\"} };"));
        assert!(code.contains("yield* api_custom_element(\"x-child\", _xChild, 1, stc1, null);"));
        assert_eq!(output.module.hoisted_literals.len(), 1);
    }

    #[test]
    fn test_unknown_component_with_tag_table() {
        let table: TagTable = [("x-known", "x/known")].into_iter().collect();
        let failure = compile("<template><x-other></x-other></template>", &config(), &table)
            .unwrap_err();
        assert!(failure.has_code(VAL_UNKNOWN_COMPONENT));
        assert!(compile("<template><x-known></x-known></template>", &config(), &table).is_ok());
    }

    #[test]
    fn test_slotted_content_has_no_boundaries() {
        let output = ok("<template><x-child><p lwc:if={show}>yes</p></x-child></template>");
        let Stmt::Component { slots, .. } = &output.module.statements[0] else {
            panic!("expected a component, got {:?}", output.module.statements);
        };
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].name, "");
        let Stmt::If { consequent, .. } = &slots[0].body[0] else {
            panic!("expected if");
        };
        assert!(!consequent.contains(&Stmt::Boundary));
    }

    #[test]
    fn test_named_slot_content_is_grouped() {
        let output = ok(
            r#"<template><x-child><span slot="header">h</span><p>body</p><span slot="header">h2</span></x-child></template>"#,
        );
        let Stmt::Component { slots, .. } = &output.module.statements[0] else {
            panic!("expected a component");
        };
        let names: Vec<&str> = slots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["header", ""]);
        assert_eq!(slots[0].body.len(), 2);
    }

    #[test]
    fn test_shadow_slot_markup_and_metadata() {
        let output = ok(r#"<template><slot name="header"></slot><slot></slot></template>"#);
        assert_eq!(output.module.metadata.slots, vec!["header".to_string(), String::new()]);
        assert_eq!(output.module.statements[0], Stmt::markup("<slot name=\"header\">"));
        assert!(output.code().contains("tmpl.slots = [\"header\", \"\"];"));
        assert!(!output.code().contains("tmpl.renderMode"));
    }

    #[test]
    fn test_light_dom_slot_uses_boundaries() {
        let output = ok(r#"<template lwc:render-mode="light"><slot></slot></template>"#);
        assert_eq!(output.module.metadata.render_mode, RenderMode::Light);
        assert_eq!(output.module.statements[0], Stmt::Boundary);
        assert!(matches!(output.module.statements[1], Stmt::Slot { .. }));
        assert!(output.code().contains("tmpl.renderMode = \"light\";"));
    }

    #[test]
    fn test_duplicate_slots() {
        let failure = fail("<template><slot></slot><slot></slot></template>");
        assert!(failure.has_code(VAL_DUPLICATE_SLOT));

        ok("<template><slot lwc:if={a}></slot><slot lwc:else></slot></template>");
    }

    #[test]
    fn test_scoped_slot_becomes_factory() {
        let output = ok(
            r#"<template><x-list><template lwc:slot-data="row"><span>{row.name}</span></template></x-list></template>"#,
        );
        let Stmt::Component { slots, .. } = &output.module.statements[0] else {
            panic!("expected a component");
        };
        assert!(matches!(
            &slots[0].body[0],
            Stmt::ScopedSlotFactory { param, .. } if param == "row"
        ));
        assert!(output.code().contains("yield api_scoped_slot_factory(\"\", function* (row) {"));
        assert!(output.code().contains("api_dynamic_text(row.name)"));
    }

    #[test]
    fn test_element_directives_keep_element_dynamic() {
        let output = ok(
            r#"<template><div lwc:ref="box" lwc:spread={attrs}></div><div lwc:inner-html={html}></div></template>"#,
        );
        assert!(output.module.fragments.is_empty());
        let code = output.code();
        assert!(code.contains("api_spread($cmp.attrs)"));
        assert!(code.contains("api_ref(\"box\")"));
        assert!(code.contains("api_inner_html($cmp.html)"));
    }

    #[test]
    fn test_dynamic_components_are_feature_gated() {
        let source = "<template><lwc:component lwc:is={ctor}></lwc:component></template>";
        let failure = fail(source);
        let err = failure.first().unwrap();
        assert_eq!(err.code, CFG_DYNAMIC_COMPONENTS_DISABLED);
        assert_eq!(err.category, ErrorCategory::Configuration);

        let config = CompilerConfig {
            enable_dynamic_components: true,
            ..config()
        };
        let output = ok_with(source, &config);
        assert!(output.code().contains("const { dc: api_dynamic_component } = $api;"));
        assert!(output.code().contains("$cmp.ctor"));
    }

    #[test]
    fn test_stylesheet_metadata() {
        let output = ok("<template></template>");
        let code = output.code();
        assert!(code.contains("import _implicitStylesheets from \"./foo.css\";"));
        assert!(code.contains("tmpl.legacyStylesheetToken = \"x-foo_foo\";"));
        assert!(code.contains(&format!(
            "tmpl.stylesheetToken = \"{}\";",
            output.module.metadata.stylesheet_token
        )));
        assert!(code.trim_end().ends_with("export default registerTemplate(tmpl);"));
    }
}
