//! Structural equality for embedded markup fragments.
//!
//! Two fragments are equal when their element trees are equal: attribute
//! order, the XML declaration, comments, processing instructions and
//! whitespace-only text are ignored. Child element order is significant.
//! Fragments that fail to parse compare as trimmed text.

use std::collections::BTreeMap;

use quick_xml::encoding::Decoder;
use quick_xml::escape::{escape, partial_escape, resolve_predefined_entity};
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::Reader;

use crate::textdiff;

pub trait MarkupComparator: Send + Sync {
    fn structurally_equal(&self, expected: &str, actual: &str) -> bool;

    /// Line diff of the two fragments, for failure output.
    fn render_diff(&self, expected: &str, actual: &str) -> String;
}

/// Default comparator backed by `quick-xml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlComparator;

impl MarkupComparator for XmlComparator {
    fn structurally_equal(&self, expected: &str, actual: &str) -> bool {
        match (parse_tree(expected), parse_tree(actual)) {
            (Ok(e), Ok(a)) => e == a,
            _ => expected.trim() == actual.trim(),
        }
    }

    fn render_diff(&self, expected: &str, actual: &str) -> String {
        let left = canonical_or_raw(expected);
        let right = canonical_or_raw(actual);
        textdiff::unified(&left, &right)
    }
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Element {
    name: String,
    attributes: BTreeMap<String, String>,
    children: Vec<Node>,
}

impl Element {
    fn from_start(e: &BytesStart, decoder: Decoder) -> Result<Self, String> {
        let mut attributes = BTreeMap::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|e| e.to_string())?;
            let value = attr
                .decode_and_unescape_value(decoder)
                .map_err(|e| e.to_string())?;
            attributes.insert(
                String::from_utf8_lossy(attr.key.as_ref()).to_string(),
                value.into_owned(),
            );
        }
        Ok(Self {
            name: String::from_utf8_lossy(e.name().as_ref()).to_string(),
            attributes,
            children: Vec::new(),
        })
    }
}

/// Parse a fragment into a synthetic document element holding the top-level nodes.
fn parse_tree(xml: &str) -> Result<Element, String> {
    let mut reader = Reader::from_str(xml);
    let decoder = reader.decoder();
    let mut buf = Vec::new();
    let mut stack: Vec<Element> = vec![Element::default()];
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                flush_text(&mut stack, &mut text);
                stack.push(Element::from_start(e, decoder)?);
            }
            Ok(Event::Empty(ref e)) => {
                flush_text(&mut stack, &mut text);
                let element = Element::from_start(e, decoder)?;
                push_child(&mut stack, Node::Element(element));
            }
            Ok(Event::End(_)) => {
                flush_text(&mut stack, &mut text);
                if stack.len() < 2 {
                    return Err("unbalanced end tag".into());
                }
                if let Some(done) = stack.pop() {
                    push_child(&mut stack, Node::Element(done));
                }
            }
            Ok(Event::Text(ref e)) => {
                text.push_str(&e.decode().map_err(|e| e.to_string())?);
            }
            Ok(Event::GeneralRef(ref e)) => push_reference(e, &mut text)?,
            Ok(Event::CData(ref e)) => {
                text.push_str(&e.decode().map_err(|e| e.to_string())?);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            // Declaration, comments, processing instructions, doctype
            _ => {}
        }
        buf.clear();
    }

    flush_text(&mut stack, &mut text);
    if stack.len() != 1 {
        return Err("unclosed element".into());
    }
    stack.pop().ok_or_else(|| "empty document".to_string())
}

/// Character references and the predefined entities resolve; any other
/// entity is kept as written.
fn push_reference(e: &BytesRef, text: &mut String) -> Result<(), String> {
    if let Some(ch) = e.resolve_char_ref().map_err(|e| e.to_string())? {
        text.push(ch);
        return Ok(());
    }
    let name = e.decode().map_err(|e| e.to_string())?;
    match resolve_predefined_entity(&name) {
        Some(resolved) => text.push_str(resolved),
        None => {
            text.push('&');
            text.push_str(&name);
            text.push(';');
        }
    }
    Ok(())
}

fn push_child(stack: &mut [Element], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

fn flush_text(stack: &mut [Element], text: &mut String) {
    let trimmed = text.trim().to_string();
    text.clear();
    if !trimmed.is_empty() {
        push_child(stack, Node::Text(trimmed));
    }
}

// ---------------------------------------------------------------------------
// Canonical rendering
// ---------------------------------------------------------------------------

fn canonical_or_raw(xml: &str) -> String {
    match parse_tree(xml) {
        Ok(root) => {
            let mut out = String::new();
            for child in &root.children {
                write_node(child, 0, &mut out);
            }
            out
        }
        Err(_) => xml.trim().to_string(),
    }
}

fn write_node(node: &Node, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match node {
        Node::Text(t) => {
            out.push_str(&indent);
            out.push_str(&partial_escape(t.as_str()));
            out.push('\n');
        }
        Node::Element(e) => {
            out.push_str(&indent);
            out.push('<');
            out.push_str(&e.name);
            for (k, v) in &e.attributes {
                out.push_str(&format!(" {k}=\"{}\"", escape(v.as_str())));
            }
            if e.children.is_empty() {
                out.push_str("/>\n");
                return;
            }
            // Single text child stays on one line.
            if let [Node::Text(t)] = e.children.as_slice() {
                out.push_str(&format!(">{}</{}>\n", partial_escape(t.as_str()), e.name));
                return;
            }
            out.push_str(">\n");
            for child in &e.children {
                write_node(child, depth + 1, out);
            }
            out.push_str(&format!("{indent}</{}>\n", e.name));
        }
    }
}
