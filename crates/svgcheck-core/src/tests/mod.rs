use crate::dom::{Document, NodeId, SVG_NS};
use crate::loader::{LoadOptions, load_str};
use crate::*;

mod modes;
mod structure;

fn load(text: &str) -> Document {
    load_str(text, "test.svg", LoadOptions::default()).unwrap()
}

/// Wraps `body` in a namespaced root with a valid viewBox.
fn drawing(body: &str) -> String {
    format!("<svg xmlns=\"{SVG_NS}\" viewBox=\"0 0 100 100\">\n{body}\n</svg>")
}

fn repair(text: &str) -> (Document, CheckReport) {
    let mut doc = load(text);
    let report = check_tree(&mut doc, &CheckOptions::repair());
    (doc, report)
}

fn findings(report: &CheckReport) -> Vec<(Severity, Code)> {
    report
        .diagnostics
        .all()
        .iter()
        .map(|d| (d.severity, d.code))
        .collect()
}

/// First element (document order) with the given local name.
fn find(doc: &Document, local: &str) -> Option<NodeId> {
    doc.descendants(doc.document_node())
        .into_iter()
        .find(|&n| doc.element(n).is_some_and(|el| el.name.local == local))
}

fn attr<'d>(doc: &'d Document, local: &str, name: &str) -> Option<&'d str> {
    doc.element(find(doc, local)?)?.attr(name)
}
