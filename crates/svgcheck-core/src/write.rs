//! Serializes a [`Document`] back to XML text.
//!
//! The tree is written verbatim: whitespace text is kept as loaded and nothing is re-indented,
//! so the output of an unchanged tree differs from its input only in the XML declaration,
//! attribute quoting and escaping.

use crate::dom::{Document, Element, ExpandedName, NodeId, NodeKind, XLINK_NS, XML_NS};
use std::io;

pub const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>";

pub fn serialize(doc: &Document) -> String {
    let mut out = String::new();
    out.push_str(XML_DECLARATION);
    out.push('\n');
    if let Some(doctype) = &doc.doctype {
        out.push_str(doctype);
        out.push('\n');
    }
    for &child in doc.children(doc.document_node()) {
        write_node(doc, child, &mut out);
        out.push('\n');
    }
    out
}

pub fn write_to(doc: &Document, w: &mut impl io::Write) -> io::Result<()> {
    w.write_all(serialize(doc).as_bytes())
}

fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    match doc.kind(id) {
        NodeKind::Document => {}
        NodeKind::Element(el) => write_element(doc, id, el, out),
        NodeKind::Text(t) => escape_text_into(out, t),
        NodeKind::Comment(c) => {
            out.push_str("<!--");
            out.push_str(c);
            out.push_str("-->");
        }
        NodeKind::ProcessingInstruction { target, value } => {
            out.push_str("<?");
            out.push_str(target);
            if let Some(v) = value {
                out.push(' ');
                out.push_str(v);
            }
            out.push_str("?>");
        }
    }
}

fn write_element(doc: &Document, id: NodeId, el: &Element, out: &mut String) {
    let tag = qualified(el.prefix.as_deref(), &el.name.local);
    out.push('<');
    out.push_str(&tag);

    for ns in &el.namespaces {
        match &ns.prefix {
            Some(p) => {
                out.push_str(" xmlns:");
                out.push_str(p);
            }
            None => out.push_str(" xmlns"),
        }
        out.push_str("=\"");
        escape_attr_into(out, &ns.uri);
        out.push('"');
    }

    let mut extra_decls: Vec<(String, String)> = Vec::new();
    for (name, value) in &el.attributes {
        let qname = attribute_qname(doc, id, name, &mut extra_decls);
        out.push(' ');
        out.push_str(&qname);
        out.push_str("=\"");
        escape_attr_into(out, value);
        out.push('"');
    }
    for (prefix, uri) in &extra_decls {
        out.push_str(" xmlns:");
        out.push_str(prefix);
        out.push_str("=\"");
        escape_attr_into(out, uri);
        out.push('"');
    }

    let children = doc.children(id);
    if children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for &child in children {
        write_node(doc, child, out);
    }
    out.push_str("</");
    out.push_str(&tag);
    out.push('>');
}

fn qualified(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{p}:{local}"),
        None => local.to_string(),
    }
}

/// Prefix for a namespaced attribute. A namespace with no prefix in scope gets a declaration
/// on this element.
fn attribute_qname(
    doc: &Document,
    id: NodeId,
    name: &ExpandedName,
    extra_decls: &mut Vec<(String, String)>,
) -> String {
    let Some(uri) = name.ns.as_deref() else {
        return name.local.clone();
    };
    if uri == XML_NS {
        return qualified(Some("xml"), &name.local);
    }
    if let Some(Some(prefix)) = doc.lookup_prefix(id, uri) {
        return qualified(Some(prefix), &name.local);
    }
    if let Some((prefix, _)) = extra_decls.iter().find(|(_, u)| u == uri) {
        return qualified(Some(prefix), &name.local);
    }
    let prefix = if uri == XLINK_NS {
        "xlink".to_string()
    } else {
        format!("ns{}", extra_decls.len())
    };
    extra_decls.push((prefix.clone(), uri.to_string()));
    qualified(Some(&prefix), &name.local)
}

fn escape_into(out: &mut String, text: &str, attr: bool) {
    let mut start = 0usize;
    for (i, b) in text.bytes().enumerate() {
        let esc = match b {
            b'&' => "&amp;",
            b'<' => "&lt;",
            b'>' => "&gt;",
            b'"' if attr => "&quot;",
            b'\t' if attr => "&#9;",
            b'\n' if attr => "&#10;",
            b'\r' => "&#13;",
            _ => continue,
        };
        out.push_str(&text[start..i]);
        out.push_str(esc);
        start = i + 1;
    }
    out.push_str(&text[start..]);
}

fn escape_text_into(out: &mut String, text: &str) {
    escape_into(out, text, false);
}

fn escape_attr_into(out: &mut String, text: &str) {
    escape_into(out, text, true);
}
