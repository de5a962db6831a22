//! Parse Module for the template compiler
//!
//! Two passes, like the rest of the markup pipeline:
//! 1. `normalize_all_expressions` lifts every `{...}` binding out of the source
//!    and leaves a `__TPL_EXPR_n__` placeholder, so markup characters inside an
//!    expression never reach the tokenizer.
//! 2. html5ever's tokenizer runs over the normalized text and [`TemplateSink`]
//!    builds the [`SyntaxNode`] tree from its tokens. The tokenizer decodes
//!    character references and handles raw-text elements; the sink restores
//!    placeholders, authored attribute case and 1-based source locations.
//!
//! Strict mode runs the tokenizer with `exact_errors` and fails on any
//! tokenizer error or HTML quirk. Legacy mode turns both into `W_HTML_QUIRK`
//! warnings and repairs the tree the way a browser would.

use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use tendril::StrTendril;

use crate::diagnostics::{
    CompilerError, CompilerWarning, SourceLocation, PARSE_AMBIGUOUS_ATTRIBUTE_VALUE,
    PARSE_CONTENT_OUTSIDE_ROOT, PARSE_INVALID_ATTRIBUTE, PARSE_MALFORMED_TAG,
    PARSE_MISMATCHED_CLOSING_TAG, PARSE_MISSING_ROOT, PARSE_SELF_CLOSING_NON_VOID,
    PARSE_UNCLOSED_ELEMENT, PARSE_UNCLOSED_EXPRESSION, W_HTML_QUIRK,
};

// ═══════════════════════════════════════════════════════════════════════════════
// ELEMENT TABLES
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    static ref TAG_NAME_RE: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9:._-]*$").unwrap();

    /// Tag name as written, at the start of a tag's source text.
    static ref TAG_HEAD_RE: Regex = Regex::new(r"^</?([^\s/>]+)").unwrap();

    /// One attribute inside a tag's source text, after the tag name.
    static ref ATTRIBUTE_RE: Regex =
        Regex::new(r#"([^\s/>=]+)(\s*=\s*("[^"]*"|'[^']*'|[^\s>]*))?"#).unwrap();

    static ref EXPR_PLACEHOLDER_RE: Regex = Regex::new(r"__TPL_EXPR_(\d+)__").unwrap();
    static ref WHOLE_PLACEHOLDER_RE: Regex = Regex::new(r"^__TPL_EXPR_(\d+)__$").unwrap();

    pub(crate) static ref VOID_ELEMENTS: HashSet<&'static str> = [
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
        "track", "wbr",
    ]
    .into_iter()
    .collect();

    /// Content of these elements is text up to the matching closing tag.
    static ref RAW_TEXT_ELEMENTS: HashMap<&'static str, RawKind> = [
        ("script", RawKind::ScriptData),
        ("style", RawKind::Rawtext),
        ("textarea", RawKind::Rcdata),
        ("title", RawKind::Rcdata),
    ]
    .into_iter()
    .collect();

    static ref FOREIGN_ROOTS: HashSet<&'static str> = ["svg", "math"].into_iter().collect();

    /// The tokenizer lowercases names; SVG needs these back in camelCase.
    static ref SVG_TAG_CASE_MAP: HashMap<&'static str, &'static str> = [
        ("animatemotion", "animateMotion"),
        ("animatetransform", "animateTransform"),
        ("clippath", "clipPath"),
        ("feblend", "feBlend"),
        ("fecolormatrix", "feColorMatrix"),
        ("fecomponenttransfer", "feComponentTransfer"),
        ("fecomposite", "feComposite"),
        ("feconvolvematrix", "feConvolveMatrix"),
        ("fediffuselighting", "feDiffuseLighting"),
        ("fedisplacementmap", "feDisplacementMap"),
        ("fedistantlight", "feDistantLight"),
        ("fedropshadow", "feDropShadow"),
        ("feflood", "feFlood"),
        ("fefunca", "feFuncA"),
        ("fefuncb", "feFuncB"),
        ("fefuncg", "feFuncG"),
        ("fefuncr", "feFuncR"),
        ("fegaussianblur", "feGaussianBlur"),
        ("feimage", "feImage"),
        ("femerge", "feMerge"),
        ("femergenode", "feMergeNode"),
        ("femorphology", "feMorphology"),
        ("feoffset", "feOffset"),
        ("fepointlight", "fePointLight"),
        ("fespecularlighting", "feSpecularLighting"),
        ("fespotlight", "feSpotLight"),
        ("fetile", "feTile"),
        ("feturbulence", "feTurbulence"),
        ("foreignobject", "foreignObject"),
        ("lineargradient", "linearGradient"),
        ("radialgradient", "radialGradient"),
        ("textpath", "textPath"),
    ]
    .into_iter()
    .collect();

    static ref SVG_ATTR_CASE_MAP: HashMap<&'static str, &'static str> = [
        ("attributename", "attributeName"),
        ("attributetype", "attributeType"),
        ("basefrequency", "baseFrequency"),
        ("baseprofile", "baseProfile"),
        ("calcmode", "calcMode"),
        ("clippathunits", "clipPathUnits"),
        ("diffuseconstant", "diffuseConstant"),
        ("edgemode", "edgeMode"),
        ("filterunits", "filterUnits"),
        ("glyphref", "glyphRef"),
        ("gradienttransform", "gradientTransform"),
        ("gradientunits", "gradientUnits"),
        ("kernelmatrix", "kernelMatrix"),
        ("kernelunitlength", "kernelUnitLength"),
        ("keypoints", "keyPoints"),
        ("keysplines", "keySplines"),
        ("keytimes", "keyTimes"),
        ("lengthadjust", "lengthAdjust"),
        ("limitingconeangle", "limitingConeAngle"),
        ("markerheight", "markerHeight"),
        ("markerunits", "markerUnits"),
        ("markerwidth", "markerWidth"),
        ("maskcontentunits", "maskContentUnits"),
        ("maskunits", "maskUnits"),
        ("numoctaves", "numOctaves"),
        ("pathlength", "pathLength"),
        ("patterncontentunits", "patternContentUnits"),
        ("patterntransform", "patternTransform"),
        ("patternunits", "patternUnits"),
        ("pointsatx", "pointsAtX"),
        ("pointsaty", "pointsAtY"),
        ("pointsatz", "pointsAtZ"),
        ("preserveaspectratio", "preserveAspectRatio"),
        ("primitiveunits", "primitiveUnits"),
        ("refx", "refX"),
        ("refy", "refY"),
        ("repeatcount", "repeatCount"),
        ("repeatdur", "repeatDur"),
        ("specularconstant", "specularConstant"),
        ("specularexponent", "specularExponent"),
        ("spreadmethod", "spreadMethod"),
        ("startoffset", "startOffset"),
        ("stddeviation", "stdDeviation"),
        ("stitchtiles", "stitchTiles"),
        ("surfacescale", "surfaceScale"),
        ("systemlanguage", "systemLanguage"),
        ("tablevalues", "tableValues"),
        ("targetx", "targetX"),
        ("targety", "targetY"),
        ("textlength", "textLength"),
        ("viewbox", "viewBox"),
        ("xchannelselector", "xChannelSelector"),
        ("ychannelselector", "yChannelSelector"),
        ("zoomandpan", "zoomAndPan"),
    ]
    .into_iter()
    .collect();
}

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(name)
}

/// Canonical case of a foreign tag or attribute name.
fn correct_foreign_case(name: &str, table: &HashMap<&'static str, &'static str>) -> String {
    table
        .get(name.to_ascii_lowercase().as_str())
        .map_or_else(|| name.to_string(), |canonical| canonical.to_string())
}


// ═══════════════════════════════════════════════════════════════════════════════
// SYNTAX TREE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
pub struct ParseOptions<'a> {
    pub file: &'a str,
    pub legacy_quirks: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyntaxNode {
    Element(SyntaxElement),
    Text(SyntaxText),
    Comment(SyntaxComment),
}

impl SyntaxNode {
    pub fn location(&self) -> SourceLocation {
        match self {
            SyntaxNode::Element(el) => el.location,
            SyntaxNode::Text(text) => text.location,
            SyntaxNode::Comment(comment) => comment.location,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntaxElement {
    pub name: String,
    pub attributes: Vec<SyntaxAttribute>,
    pub children: Vec<SyntaxNode>,
    pub self_closing: bool,
    pub location: SourceLocation,
}

impl SyntaxElement {
    pub fn attribute(&self, name: &str) -> Option<&SyntaxAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntaxText {
    pub raw: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntaxComment {
    pub value: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntaxAttribute {
    pub name: String,
    pub value: SyntaxValue,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum SyntaxValue {
    Literal(String),
    /// Source between the braces of an unquoted `{...}` value.
    Expression(String),
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTemplate {
    pub root: SyntaxElement,
    pub warnings: Vec<CompilerWarning>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// BRACE SCANNING
// ═══════════════════════════════════════════════════════════════════════════════

/// Index of the `}` closing the `{` at `start_index`, skipping braces inside
/// string and template literals.
pub(crate) fn find_balanced_brace_end(chars: &[char], start_index: usize) -> Option<usize> {
    let mut depth = 0;
    let mut i = start_index;
    let mut in_string: Option<char> = None;
    let mut in_template_literal = false;
    let mut template_brace_depth = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\\' && i + 1 < chars.len() {
            i += 2;
            continue;
        }

        if let Some(quote) = in_string {
            if c == quote {
                in_string = None;
            }
            i += 1;
            continue;
        }

        if in_template_literal {
            if c == '`' && template_brace_depth == 0 {
                in_template_literal = false;
            } else if c == '$' && i + 1 < chars.len() && chars[i + 1] == '{' {
                template_brace_depth += 1;
                i += 2;
                continue;
            } else if c == '}' && template_brace_depth > 0 {
                template_brace_depth -= 1;
            }
            i += 1;
            continue;
        }

        match c {
            '"' | '\'' => in_string = Some(c),
            '`' => in_template_literal = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSION NORMALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

struct PlaceholderSpan {
    normalized: Range<usize>,
    original: Range<usize>,
}

/// Source with every `{...}` binding replaced by a placeholder.
struct NormalizedSource {
    text: String,
    expressions: Vec<String>,
    spans: Vec<PlaceholderSpan>,
}

impl NormalizedSource {
    /// Maps a byte offset in the normalized text back to the authored source.
    fn original_offset(&self, offset: usize) -> usize {
        let index = self
            .spans
            .partition_point(|span| span.normalized.start <= offset);
        match index.checked_sub(1).map(|i| &self.spans[i]) {
            None => offset,
            Some(span) if offset < span.normalized.end => span.original.start,
            Some(span) => span.original.end + (offset - span.normalized.end),
        }
    }

    /// Puts the authored `{...}` back in place of each placeholder.
    fn restore(&self, text: &str) -> String {
        EXPR_PLACEHOLDER_RE
            .replace_all(text, |caps: &regex::Captures| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| self.expressions.get(index))
                    .map_or_else(|| caps[0].to_string(), |expr| format!("{{{}}}", expr))
            })
            .into_owned()
    }

    /// Expression source when `value` is exactly one placeholder.
    fn expression(&self, value: &str) -> Option<&str> {
        let caps = WHOLE_PLACEHOLDER_RE.captures(value)?;
        let index = caps[1].parse::<usize>().ok()?;
        self.expressions.get(index).map(String::as_str)
    }
}

fn normalize_all_expressions(source: &str) -> NormalizedSource {
    let indexed: Vec<(usize, char)> = source.char_indices().collect();
    let chars: Vec<char> = indexed.iter().map(|&(_, c)| c).collect();
    let mut out = NormalizedSource {
        text: String::with_capacity(source.len()),
        expressions: Vec::new(),
        spans: Vec::new(),
    };
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = indexed[i];

        // Comments are copied verbatim; braces inside them are not bindings.
        if source[offset..].starts_with("<!--") {
            let end = source[offset + 4..]
                .find("-->")
                .map_or(source.len(), |found| offset + 4 + found + 3);
            out.text.push_str(&source[offset..end]);
            while i < indexed.len() && indexed[i].0 < end {
                i += 1;
            }
            continue;
        }

        if c == '{' {
            if let Some(end) = find_balanced_brace_end(&chars, i) {
                let original_end = indexed.get(end + 1).map_or(source.len(), |&(o, _)| o);
                let mut placeholder = format!("__TPL_EXPR_{}__", out.expressions.len());
                // An unquoted value followed by `/>` would otherwise absorb the slash.
                let in_attribute = out.text.trim_end().ends_with('=');
                if in_attribute && source[original_end..].starts_with("/>") {
                    placeholder.push(' ');
                }
                let start = out.text.len();
                out.spans.push(PlaceholderSpan {
                    normalized: start..start + placeholder.len(),
                    original: offset..original_end,
                });
                out.expressions.push(chars[i + 1..end].iter().collect());
                out.text.push_str(&placeholder);
                i = end + 1;
                continue;
            }
        }

        out.text.push(c);
        i += 1;
    }

    out
}

/// Byte offset to 1-based line and column.
struct LineIndex<'a> {
    source: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(source: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        LineIndex { source, starts }
    }

    fn location(&self, offset: usize) -> SourceLocation {
        let offset = offset.min(self.source.len());
        let line = self.starts.partition_point(|&start| start <= offset);
        let start = self.starts[line - 1];
        let column = self.source[start..offset].chars().count() + 1;
        SourceLocation::new(line as u32, column as u32)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN SINK
// ═══════════════════════════════════════════════════════════════════════════════

struct OpenElement {
    element: SyntaxElement,
    foreign: bool,
}

struct PendingText {
    text: String,
    location: SourceLocation,
}

/// Attribute as written in the tag's source text.
struct RawAttribute<'s> {
    name: &'s str,
    offset: usize,
    has_value: bool,
    quoted: bool,
}

/// Builds the syntax tree from tokenizer output.
///
/// The driver feeds one character at a time and records its offset, so every
/// token is attributed to the first character fed after the previous one.
struct TemplateSink<'a> {
    file: &'a str,
    legacy: bool,
    normalized: &'a NormalizedSource,
    lines: LineIndex<'a>,
    offset: usize,
    token_start: Option<usize>,
    stack: Vec<OpenElement>,
    top: Vec<SyntaxNode>,
    text: Option<PendingText>,
    warnings: Vec<CompilerWarning>,
    error: Option<CompilerError>,
}

impl<'a> TemplateSink<'a> {
    fn new(source: &'a str, normalized: &'a NormalizedSource, options: &ParseOptions<'a>) -> Self {
        TemplateSink {
            file: options.file,
            legacy: options.legacy_quirks,
            normalized,
            lines: LineIndex::new(source),
            offset: 0,
            token_start: None,
            stack: Vec::new(),
            top: Vec::new(),
            text: None,
            warnings: Vec::new(),
            error: None,
        }
    }

    fn begin_char(&mut self, offset: usize) {
        self.offset = offset;
        self.token_start.get_or_insert(offset);
    }

    fn location(&self, offset: usize) -> SourceLocation {
        self.lines.location(self.normalized.original_offset(offset))
    }

    fn fail(&self, code: &str, message: &str, location: SourceLocation) -> CompilerError {
        CompilerError::at(code, message, self.file, location)
    }

    fn quirk(&mut self, message: &str, location: SourceLocation) {
        self.warnings
            .push(CompilerWarning::at(W_HTML_QUIRK, message, self.file, location));
    }

    fn append(&mut self, node: SyntaxNode) {
        match self.stack.last_mut() {
            Some(parent) => parent.element.children.push(node),
            None => self.top.push(node),
        }
    }

    fn in_raw_text(&self) -> bool {
        self.stack.last().map_or(false, |open| {
            !open.foreign && RAW_TEXT_ELEMENTS.contains_key(open.element.name.as_str())
        })
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Tokens
    // ───────────────────────────────────────────────────────────────────────────

    fn handle(&mut self, token: Token, start: usize) -> Result<TokenSinkResult<()>, CompilerError> {
        match token {
            Token::CharacterTokens(text) => self.push_text(&text, start)?,
            Token::NullCharacterToken => self.push_text("\u{FFFD}", start)?,
            Token::TagToken(tag) => {
                if tag.kind == TagKind::StartTag {
                    return self.start_tag(tag, start);
                }
                self.end_tag(&tag, start)?;
            }
            Token::CommentToken(value) => {
                self.flush_text();
                let location = self.location(start);
                self.append(SyntaxNode::Comment(SyntaxComment {
                    value: String::from(&*value),
                    location,
                }));
            }
            Token::DoctypeToken(_) => {
                return Err(self.fail(
                    PARSE_MALFORMED_TAG,
                    "Markup declarations and processing instructions are not supported",
                    self.location(start),
                ));
            }
            Token::EOFToken | Token::ParseError(_) => {}
        }
        Ok(TokenSinkResult::Continue)
    }

    fn tokenizer_error(&mut self, message: &str, line_number: u64) {
        // Reported with the attribute's own location once the tag completes.
        if message == "Duplicate attribute" {
            return;
        }
        log::debug!("tokenizer error on normalized line {}: {}", line_number, message);
        let location = self.location(self.offset);
        let message = format!("Malformed markup: {}", message);
        if self.legacy {
            self.quirk(&message, location);
        } else {
            self.error = Some(self.fail(PARSE_MALFORMED_TAG, &message, location));
        }
    }

    fn push_text(&mut self, text: &str, start: usize) -> Result<(), CompilerError> {
        let location = self.location(start);
        // Balanced braces were lifted out; one left in the source never closed.
        if self.normalized.text[start..].starts_with('{') && !self.in_raw_text() {
            return Err(self.fail(
                PARSE_UNCLOSED_EXPRESSION,
                "Unterminated expression in text",
                location,
            ));
        }
        match &mut self.text {
            Some(pending) => pending.text.push_str(text),
            None => {
                self.text = Some(PendingText {
                    text: text.to_string(),
                    location,
                })
            }
        }
        Ok(())
    }

    fn flush_text(&mut self) {
        let Some(pending) = self.text.take() else {
            return;
        };
        if pending.text.trim().is_empty() {
            return;
        }
        let raw = self.normalized.restore(&pending.text);
        self.append(SyntaxNode::Text(SyntaxText {
            raw,
            location: pending.location,
        }));
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Tags
    // ───────────────────────────────────────────────────────────────────────────

    fn start_tag(&mut self, tag: Tag, start: usize) -> Result<TokenSinkResult<()>, CompilerError> {
        self.flush_text();
        let location = self.location(start);
        let normalized = self.normalized;
        let end = (self.offset + 1).min(normalized.text.len());
        let source = &normalized.text[start..end];

        let head = TAG_HEAD_RE.captures(source);
        let raw_name = head.as_ref().and_then(|caps| caps.get(1)).map_or(&*tag.name, |m| m.as_str());
        if !TAG_NAME_RE.is_match(raw_name) {
            return Err(self.fail(PARSE_MALFORMED_TAG, "Invalid tag name", location));
        }
        let head_len = head.and_then(|caps| caps.get(0)).map_or(0, |m| m.end());

        let lowered: &str = &tag.name;
        let parent_foreign = self.stack.last().map_or(false, |open| open.foreign);
        let foreign = parent_foreign || FOREIGN_ROOTS.contains(lowered);
        let name = if foreign {
            correct_foreign_case(raw_name, &SVG_TAG_CASE_MAP)
        } else {
            lowered.to_string()
        };

        let raw_attributes: Vec<RawAttribute<'_>> = ATTRIBUTE_RE
            .captures_iter(&source[head_len..])
            .filter_map(|caps| {
                let name = caps.get(1)?;
                let value = caps.get(3);
                Some(RawAttribute {
                    name: name.as_str(),
                    offset: start + head_len + name.start(),
                    has_value: caps.get(2).is_some(),
                    quoted: value.map_or(false, |v| v.as_str().starts_with(['"', '\''])),
                })
            })
            .collect();
        for (index, raw) in raw_attributes.iter().enumerate() {
            let duplicate = raw_attributes[..index]
                .iter()
                .any(|earlier| earlier.name.eq_ignore_ascii_case(raw.name));
            if duplicate {
                return Err(self.fail(
                    PARSE_INVALID_ATTRIBUTE,
                    &format!("Duplicate attribute \"{}\"", raw.name),
                    self.location(raw.offset),
                ));
            }
        }

        let mut attributes = Vec::with_capacity(tag.attrs.len());
        for attr in &tag.attrs {
            let local: &str = &attr.name.local;
            let raw = raw_attributes
                .iter()
                .find(|raw| raw.name.eq_ignore_ascii_case(local));
            let attr_location = raw.map_or(location, |raw| self.location(raw.offset));
            let authored = raw.map_or(local, |raw| raw.name);
            let attr_name = if foreign {
                correct_foreign_case(authored, &SVG_ATTR_CASE_MAP)
            } else {
                authored.to_string()
            };
            let value = match raw {
                Some(raw) if !raw.has_value => SyntaxValue::Boolean,
                None if attr.value.is_empty() => SyntaxValue::Boolean,
                _ => {
                    let quoted = raw.map_or(false, |raw| raw.quoted);
                    self.attribute_value(&attr_name, &attr.value, quoted, attr_location)?
                }
            };
            attributes.push(SyntaxAttribute {
                name: attr_name,
                value,
                location: attr_location,
            });
        }

        if tag.self_closing && !foreign && !is_void_element(&name) {
            let message = format!("<{}> is not a void element and cannot self-close", name);
            if self.legacy {
                self.quirk(&message, location);
            } else {
                return Err(self.fail(PARSE_SELF_CLOSING_NON_VOID, &message, location));
            }
        }

        let element = SyntaxElement {
            name,
            attributes,
            children: Vec::new(),
            self_closing: tag.self_closing,
            location,
        };
        if tag.self_closing || (!foreign && is_void_element(&element.name)) {
            self.append(SyntaxNode::Element(element));
            return Ok(TokenSinkResult::Continue);
        }
        let raw_kind = if foreign {
            None
        } else {
            RAW_TEXT_ELEMENTS.get(element.name.as_str()).copied()
        };
        self.stack.push(OpenElement { element, foreign });
        Ok(match raw_kind {
            Some(kind) => TokenSinkResult::RawData(kind),
            None => TokenSinkResult::Continue,
        })
    }

    fn attribute_value(
        &self,
        name: &str,
        value: &str,
        quoted: bool,
        location: SourceLocation,
    ) -> Result<SyntaxValue, CompilerError> {
        if quoted {
            let restored = self.normalized.restore(value);
            if restored.starts_with('{') && restored.ends_with('}') {
                return Err(self.fail(
                    PARSE_AMBIGUOUS_ATTRIBUTE_VALUE,
                    &format!("Ambiguous attribute value {}=\"{}\"", name, restored),
                    location,
                ));
            }
            return Ok(SyntaxValue::Literal(restored));
        }
        if let Some(expr) = self.normalized.expression(value) {
            return Ok(SyntaxValue::Expression(expr.to_string()));
        }
        if EXPR_PLACEHOLDER_RE.is_match(value) {
            return Err(self.fail(
                PARSE_AMBIGUOUS_ATTRIBUTE_VALUE,
                &format!("Unexpected characters after expression in \"{}\"", name),
                location,
            ));
        }
        if value.starts_with('{') {
            return Err(self.fail(
                PARSE_UNCLOSED_EXPRESSION,
                &format!("Unterminated expression in attribute \"{}\"", name),
                location,
            ));
        }
        Ok(SyntaxValue::Literal(value.to_string()))
    }

    fn end_tag(&mut self, tag: &Tag, start: usize) -> Result<(), CompilerError> {
        self.flush_text();
        let location = self.location(start);
        let name: &str = &tag.name;

        let matched = self
            .stack
            .iter()
            .rposition(|open| open.element.name.eq_ignore_ascii_case(name));

        match matched {
            Some(index) if index + 1 == self.stack.len() => {
                if let Some(open) = self.stack.pop() {
                    self.append(SyntaxNode::Element(open.element));
                }
            }
            Some(index) => {
                if !self.legacy {
                    let expected = self
                        .stack
                        .last()
                        .map(|open| open.element.name.clone())
                        .unwrap_or_default();
                    return Err(self.fail(
                        PARSE_MISMATCHED_CLOSING_TAG,
                        &format!("Expected </{}> but found </{}>", expected, name),
                        location,
                    ));
                }
                while self.stack.len() > index {
                    if let Some(open) = self.stack.pop() {
                        if self.stack.len() > index {
                            self.quirk(
                                &format!(
                                    "Element <{}> implicitly closed by </{}>",
                                    open.element.name, name
                                ),
                                open.element.location,
                            );
                        }
                        self.append(SyntaxNode::Element(open.element));
                    }
                }
            }
            None => {
                let message = format!("Unexpected closing tag </{}>", name);
                if !self.legacy {
                    return Err(self.fail(PARSE_MISMATCHED_CLOSING_TAG, &message, location));
                }
                self.quirk(&message, location);
            }
        }
        Ok(())
    }

    /// Closes what is still open and hands back the top-level nodes.
    fn finish(mut self) -> Result<(Vec<SyntaxNode>, Vec<CompilerWarning>), CompilerError> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.flush_text();

        if let Some(open) = self.stack.last() {
            if !self.legacy {
                return Err(self.fail(
                    PARSE_UNCLOSED_ELEMENT,
                    &format!("Unclosed element <{}>", open.element.name),
                    open.element.location,
                ));
            }
        }
        while let Some(open) = self.stack.pop() {
            self.quirk(
                &format!("Element <{}> is never closed", open.element.name),
                open.element.location,
            );
            self.append(SyntaxNode::Element(open.element));
        }
        Ok((self.top, self.warnings))
    }
}

impl<'a> TokenSink for TemplateSink<'a> {
    type Handle = ();

    fn process_token(&mut self, token: Token, line_number: u64) -> TokenSinkResult<()> {
        if self.error.is_some() {
            return TokenSinkResult::Continue;
        }
        if let Token::ParseError(message) = &token {
            self.tokenizer_error(message, line_number);
            return TokenSinkResult::Continue;
        }
        let start = self.token_start.take().unwrap_or(self.offset);
        match self.handle(token, start) {
            Ok(result) => result,
            Err(err) => {
                self.error = Some(err);
                TokenSinkResult::Continue
            }
        }
    }

    fn adjusted_current_node_present_but_not_in_html_namespace(&self) -> bool {
        self.stack.last().map_or(false, |open| open.foreign)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

fn select_root(nodes: Vec<SyntaxNode>, file: &str) -> Result<SyntaxElement, CompilerError> {
    let mut root: Option<SyntaxElement> = None;
    for node in nodes {
        match node {
            SyntaxNode::Comment(_) => {}
            SyntaxNode::Element(el) if root.is_none() && el.name == "template" => {
                root = Some(el);
            }
            SyntaxNode::Element(el) if root.is_none() => {
                return Err(CompilerError::at(
                    PARSE_MISSING_ROOT,
                    &format!("Expected a root <template> element, found <{}>", el.name),
                    file,
                    el.location,
                ));
            }
            other => {
                return Err(CompilerError::at(
                    PARSE_CONTENT_OUTSIDE_ROOT,
                    "Content is not allowed outside the root <template> element",
                    file,
                    other.location(),
                ));
            }
        }
    }
    root.ok_or_else(|| {
        CompilerError::at(
            PARSE_MISSING_ROOT,
            "Missing root <template> element",
            file,
            SourceLocation::new(1, 1),
        )
    })
}

/// Parse template source into a syntax tree rooted at `<template>`.
pub fn parse_template(
    source: &str,
    options: &ParseOptions<'_>,
) -> Result<ParsedTemplate, CompilerError> {
    let normalized = normalize_all_expressions(source);
    let sink = TemplateSink::new(source, &normalized, options);
    let opts = TokenizerOpts {
        exact_errors: !options.legacy_quirks,
        ..Default::default()
    };
    let mut tokenizer = Tokenizer::new(sink, opts);
    let mut queue = BufferQueue::default();

    let text = normalized.text.as_str();
    let mut chars = text.char_indices().peekable();
    while let Some((offset, c)) = chars.next() {
        let mut end = offset + c.len_utf8();
        // CRLF goes in as one unit so the tokenizer folds it into a single newline.
        if c == '\r' {
            if let Some(&(next, '\n')) = chars.peek() {
                end = next + 1;
                chars.next();
            }
        }
        tokenizer.sink.begin_char(offset);
        queue.push_back(StrTendril::from_slice(&text[offset..end]));
        let _ = tokenizer.feed(&mut queue);
        if tokenizer.sink.error.is_some() {
            break;
        }
    }
    if tokenizer.sink.error.is_none() {
        tokenizer.sink.begin_char(text.len());
        tokenizer.end();
    }

    let (nodes, warnings) = tokenizer.sink.finish()?;
    let root = select_root(nodes, options.file)?;
    log::trace!(
        "parsed {} with {} expression(s) and {} quirk warning(s)",
        options.file,
        normalized.expressions.len(),
        warnings.len()
    );
    Ok(ParsedTemplate { root, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_balanced_brace() {
        let chars: Vec<char> = "{a + {b}} rest".chars().collect();
        assert_eq!(find_balanced_brace_end(&chars, 0), Some(8));

        let chars: Vec<char> = "{ '}' + x }".chars().collect();
        assert_eq!(find_balanced_brace_end(&chars, 0), Some(10));

        let chars: Vec<char> = "{ open".chars().collect();
        assert_eq!(find_balanced_brace_end(&chars, 0), None);
    }

    #[test]
    fn test_void_elements() {
        assert!(is_void_element("br"));
        assert!(is_void_element("input"));
        assert!(!is_void_element("div"));
    }

    #[test]
    fn test_normalize_lifts_bindings_and_maps_offsets() {
        let normalized = normalize_all_expressions("<p a={x}>{y} z</p><!-- {c} -->");
        assert_eq!(
            normalized.text,
            "<p a=__TPL_EXPR_0__>__TPL_EXPR_1__ z</p><!-- {c} -->"
        );
        assert_eq!(normalized.expressions, vec!["x", "y"]);

        let z = normalized.text.find(" z").unwrap();
        assert_eq!(normalized.original_offset(z), "<p a={x}>{y}".len());
        assert_eq!(normalized.restore("__TPL_EXPR_1__ z"), "{y} z");
        assert_eq!(normalized.expression("__TPL_EXPR_0__"), Some("x"));
        assert_eq!(normalized.expression("__TPL_EXPR_0__/"), None);
    }

    #[test]
    fn test_expression_before_self_close_keeps_slash_out_of_value() {
        let normalized = normalize_all_expressions("<input value={v}/>");
        assert_eq!(normalized.text, "<input value=__TPL_EXPR_0__ />");
        assert_eq!(normalized.original_offset(normalized.text.len() - 2), 16);
    }

    #[test]
    fn test_line_index_counts_characters() {
        let lines = LineIndex::new("ab\n  é<p>");
        assert_eq!(lines.location(0), SourceLocation::new(1, 1));
        assert_eq!(lines.location(5), SourceLocation::new(2, 3));
        assert_eq!(lines.location(7), SourceLocation::new(2, 4));
    }

    #[test]
    fn test_foreign_case_table() {
        assert_eq!(correct_foreign_case("viewbox", &SVG_ATTR_CASE_MAP), "viewBox");
        assert_eq!(correct_foreign_case("fill", &SVG_ATTR_CASE_MAP), "fill");
        assert_eq!(correct_foreign_case("clippath", &SVG_TAG_CASE_MAP), "clipPath");
    }
}
