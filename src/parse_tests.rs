#[cfg(test)]
mod tests {
    use crate::diagnostics::{
        PARSE_AMBIGUOUS_ATTRIBUTE_VALUE, PARSE_CONTENT_OUTSIDE_ROOT, PARSE_INVALID_ATTRIBUTE,
        PARSE_MALFORMED_TAG, PARSE_MISMATCHED_CLOSING_TAG, PARSE_MISSING_ROOT, PARSE_SELF_CLOSING_NON_VOID,
        PARSE_UNCLOSED_ELEMENT, PARSE_UNCLOSED_EXPRESSION, W_HTML_QUIRK,
    };
    use crate::parse::{parse_template, ParseOptions, SyntaxElement, SyntaxNode, SyntaxValue};

    const FILE: &str = "x/foo.html";

    fn strict() -> ParseOptions<'static> {
        ParseOptions {
            file: FILE,
            legacy_quirks: false,
        }
    }

    fn legacy() -> ParseOptions<'static> {
        ParseOptions {
            file: FILE,
            legacy_quirks: true,
        }
    }

    fn element(node: &SyntaxNode) -> &SyntaxElement {
        match node {
            SyntaxNode::Element(el) => el,
            other => panic!("expected an element, got {:?}", other),
        }
    }

    #[test]
    fn test_root_template_with_text() {
        let parsed = parse_template("<template><p>Hello</p></template>", &strict()).unwrap();
        assert_eq!(parsed.root.name, "template");
        assert!(parsed.warnings.is_empty());

        let p = element(&parsed.root.children[0]);
        assert_eq!(p.name, "p");
        match &p.children[0] {
            SyntaxNode::Text(text) => assert_eq!(text.raw, "Hello"),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_locations_are_one_based() {
        let source = "<template>\n  <div>\n    <span>hi</span>\n  </div>\n</template>";
        let parsed = parse_template(source, &strict()).unwrap();
        assert_eq!(parsed.root.location.line, 1);
        assert_eq!(parsed.root.location.column, 1);

        let div = element(&parsed.root.children[0]);
        assert_eq!((div.location.line, div.location.column), (2, 3));
        let span = element(&div.children[0]);
        assert_eq!((span.location.line, span.location.column), (3, 5));
    }

    #[test]
    fn test_whitespace_only_text_is_dropped() {
        let parsed = parse_template("<template>\n  <p>a</p>\n</template>\n", &strict()).unwrap();
        assert_eq!(parsed.root.children.len(), 1);
    }

    #[test]
    fn test_attribute_value_kinds() {
        let parsed = parse_template(
            r#"<template><input title="Hi" value={greeting} disabled></template>"#,
            &strict(),
        )
        .unwrap();
        let input = element(&parsed.root.children[0]);
        assert_eq!(
            input.attribute("title").map(|a| &a.value),
            Some(&SyntaxValue::Literal("Hi".to_string()))
        );
        assert_eq!(
            input.attribute("value").map(|a| &a.value),
            Some(&SyntaxValue::Expression("greeting".to_string()))
        );
        assert_eq!(
            input.attribute("disabled").map(|a| &a.value),
            Some(&SyntaxValue::Boolean)
        );
    }

    #[test]
    fn test_expression_braces_do_not_open_tags() {
        let parsed =
            parse_template("<template><p>{a ? '<b>' : '}'}</p></template>", &strict()).unwrap();
        let p = element(&parsed.root.children[0]);
        assert_eq!(p.children.len(), 1);
    }

    #[test]
    fn test_foreign_elements_keep_case() {
        let parsed = parse_template(
            r#"<template><svg viewBox="0 0 1 1"><foreignObject></foreignObject></svg></template>"#,
            &strict(),
        )
        .unwrap();
        let svg = element(&parsed.root.children[0]);
        assert!(svg.attribute("viewBox").is_some());
        assert_eq!(element(&svg.children[0]).name, "foreignObject");
    }

    #[test]
    fn test_missing_root() {
        let err = parse_template("<div></div>", &strict()).unwrap_err();
        assert_eq!(err.code, PARSE_MISSING_ROOT);

        let err = parse_template("", &strict()).unwrap_err();
        assert_eq!(err.code, PARSE_MISSING_ROOT);
        assert_eq!(err.location.file, FILE);
    }

    #[test]
    fn test_content_outside_root() {
        let err = parse_template("<template></template><p></p>", &strict()).unwrap_err();
        assert_eq!(err.code, PARSE_CONTENT_OUTSIDE_ROOT);

        let err = parse_template("<template></template>trailing", &strict()).unwrap_err();
        assert_eq!(err.code, PARSE_CONTENT_OUTSIDE_ROOT);
    }

    #[test]
    fn test_comments_around_root_are_ignored() {
        let parsed =
            parse_template("<!-- header --><template></template><!-- footer -->", &strict());
        assert!(parsed.is_ok());
    }

    #[test]
    fn test_quoted_expression_is_ambiguous() {
        let err = parse_template(r#"<template><p title="{x}"></p></template>"#, &strict())
            .unwrap_err();
        assert_eq!(err.code, PARSE_AMBIGUOUS_ATTRIBUTE_VALUE);
        assert!(!err.hints.is_empty());
    }

    #[test]
    fn test_duplicate_attribute() {
        let err = parse_template(r#"<template><p a="1" a="2"></p></template>"#, &strict())
            .unwrap_err();
        assert_eq!(err.code, PARSE_INVALID_ATTRIBUTE);
        assert_eq!((err.location.line, err.location.column), (1, 20));
    }

    #[test]
    fn test_unterminated_expression() {
        let err = parse_template("<template><p>{a</p></template>", &strict()).unwrap_err();
        assert_eq!(err.code, PARSE_UNCLOSED_EXPRESSION);
    }

    #[test]
    fn test_unclosed_element_strict() {
        let err = parse_template("<template><div>", &strict()).unwrap_err();
        assert_eq!(err.code, PARSE_UNCLOSED_ELEMENT);
        assert_eq!((err.location.line, err.location.column), (1, 11));
    }

    #[test]
    fn test_mismatched_closing_tag_strict() {
        let err =
            parse_template("<template><div><p>a</div></template>", &strict()).unwrap_err();
        assert_eq!(err.code, PARSE_MISMATCHED_CLOSING_TAG);
        assert_eq!((err.location.line, err.location.column), (1, 20));

        let err = parse_template("<template></span></template>", &strict()).unwrap_err();
        assert_eq!(err.code, PARSE_MISMATCHED_CLOSING_TAG);
    }

    #[test]
    fn test_legacy_repairs_implicitly_closed_elements() {
        let parsed =
            parse_template("<template><div><p>a</div></template>", &legacy()).unwrap();
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].code, W_HTML_QUIRK);

        let div = element(&parsed.root.children[0]);
        assert_eq!(div.name, "div");
        assert_eq!(element(&div.children[0]).name, "p");
    }

    #[test]
    fn test_legacy_ignores_stray_closing_tag() {
        let parsed = parse_template("<template><p></p></span></template>", &legacy()).unwrap();
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.root.children.len(), 1);
    }

    #[test]
    fn test_self_closing_non_void() {
        let err = parse_template("<template><div/></template>", &strict()).unwrap_err();
        assert_eq!(err.code, PARSE_SELF_CLOSING_NON_VOID);

        let parsed = parse_template("<template><div/></template>", &legacy()).unwrap();
        assert_eq!(parsed.warnings[0].code, W_HTML_QUIRK);
        assert!(element(&parsed.root.children[0]).self_closing);
    }

    #[test]
    fn test_void_elements_need_no_closing_tag() {
        let parsed =
            parse_template("<template><br><input value={v}><hr/></template>", &strict()).unwrap();
        assert_eq!(parsed.root.children.len(), 3);
    }

    #[test]
    fn test_raw_text_element_keeps_markup_as_text() {
        let parsed = parse_template(
            "<template><textarea><b>bold</b></textarea></template>",
            &strict(),
        )
        .unwrap();
        let textarea = element(&parsed.root.children[0]);
        match &textarea.children[0] {
            SyntaxNode::Text(text) => assert_eq!(text.raw, "<b>bold</b>"),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_character_references_are_decoded() {
        let parsed = parse_template(
            r#"<template><p title="a &amp; b">a &lt; b &#38; c</p></template>"#,
            &strict(),
        )
        .unwrap();
        let p = element(&parsed.root.children[0]);
        assert_eq!(
            p.attribute("title").map(|a| &a.value),
            Some(&SyntaxValue::Literal("a & b".to_string()))
        );
        match &p.children[0] {
            SyntaxNode::Text(text) => assert_eq!(text.raw, "a < b & c"),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_text_with_expression_and_reference() {
        let parsed =
            parse_template("<template><p>{a} &gt; {b}</p></template>", &strict()).unwrap();
        let p = element(&parsed.root.children[0]);
        match &p.children[0] {
            SyntaxNode::Text(text) => assert_eq!(text.raw, "{a} > {b}"),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_lowercase_foreign_names_are_corrected() {
        let parsed = parse_template(
            r#"<template><svg viewbox="0 0 1 1"><clippath></clippath></svg></template>"#,
            &strict(),
        )
        .unwrap();
        let svg = element(&parsed.root.children[0]);
        assert!(svg.attribute("viewBox").is_some());
        assert_eq!(element(&svg.children[0]).name, "clipPath");
    }

    #[test]
    fn test_expression_value_before_self_close() {
        let parsed =
            parse_template("<template><input value={v}/></template>", &strict()).unwrap();
        let input = element(&parsed.root.children[0]);
        assert!(input.self_closing);
        assert_eq!(
            input.attribute("value").map(|a| &a.value),
            Some(&SyntaxValue::Expression("v".to_string()))
        );
    }

    #[test]
    fn test_locations_after_multiline_expression() {
        let source = "<template>\n<p title={a\n  || b}>\n  <i>x</i></p></template>";
        let parsed = parse_template(source, &strict()).unwrap();
        let p = element(&parsed.root.children[0]);
        assert_eq!(
            p.attribute("title").map(|a| (a.location.line, a.location.column)),
            Some((2, 4))
        );
        let i = element(&p.children[0]);
        assert_eq!((i.location.line, i.location.column), (4, 3));
    }

    #[test]
    fn test_tokenizer_errors_fail_strict_and_warn_legacy() {
        let source = r#"<template><p a="1"b="2"></p></template>"#;
        let err = parse_template(source, &strict()).unwrap_err();
        assert_eq!(err.code, PARSE_MALFORMED_TAG);
        assert_eq!((err.location.line, err.location.column), (1, 19));

        let parsed = parse_template(source, &legacy()).unwrap();
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].code, W_HTML_QUIRK);
        assert_eq!(element(&parsed.root.children[0]).attributes.len(), 2);
    }

    #[test]
    fn test_doctype_is_rejected() {
        let err = parse_template("<!DOCTYPE html><template></template>", &strict()).unwrap_err();
        assert_eq!(err.code, PARSE_MALFORMED_TAG);
    }
}
