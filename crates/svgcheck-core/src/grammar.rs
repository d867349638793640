//! Formal conformance check of a (possibly repaired) tree against the profile grammar.
//!
//! This is independent of the engine: it never edits and it checks datatypes the engine lets
//! through, so a tree the engine considers repaired can still fail here.

use crate::colors::{Classification, ColorTable};
use crate::diagnostics::{Code, Diagnostic, Severity};
use crate::dom::{Document, Element, NodeId, NodeKind, SVG_NS, XLINK_NS, XML_NS};
use crate::geom::{self, ViewBox};
use crate::profile::{self, ElementKind, PropertyKind};
use std::str::FromStr;
use svgtypes::{NumberListParser, PathParser};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaSelector {
    /// The document root must be the drawing.
    #[default]
    Standalone,
    /// Drawings are embedded in a host document; every `svg` subtree is validated.
    Embedded,
}

impl SchemaSelector {
    /// Standalone when the root element is `svg`, embedded otherwise.
    pub fn for_document(doc: &Document) -> Self {
        let root_is_svg = doc
            .root_element()
            .and_then(|r| doc.element(r))
            .is_some_and(|el| el.name.local == "svg");
        if root_is_svg {
            SchemaSelector::Standalone
        } else {
            SchemaSelector::Embedded
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Copy)]
enum Datatype {
    Any,
    Number,
    Length,
    Coordinates,
    LengthOrAuto,
    DashArray,
    Path,
    Points,
    Transform,
    ViewBox,
    Id,
    Fixed(&'static [&'static str]),
}

fn datatype(name: &str) -> Datatype {
    match name {
        "id" | "xml:id" => Datatype::Id,
        "d" => Datatype::Path,
        "points" => Datatype::Points,
        "transform" => Datatype::Transform,
        "viewBox" => Datatype::ViewBox,
        "version" => Datatype::Fixed(&["1.2"]),
        "baseProfile" => Datatype::Fixed(&["tiny"]),
        "xml:space" => Datatype::Fixed(&["default", "preserve"]),
        "editable" => Datatype::Fixed(&["none", "simple"]),
        "focusable" => Datatype::Fixed(&["true", "false", "auto"]),
        "zoomAndPan" => Datatype::Fixed(&["disable", "magnify"]),
        "x" | "y" => Datatype::Coordinates,
        "width" | "height" => Datatype::LengthOrAuto,
        "cx" | "cy" | "r" | "rx" | "ry" | "x1" | "y1" | "x2" | "y2" | "stroke-width"
        | "stroke-dashoffset" | "font-size" => Datatype::Length,
        "pathLength" | "opacity" | "fill-opacity" | "stroke-opacity" | "solid-opacity"
        | "viewport-fill-opacity" | "stroke-miterlimit" | "line-increment" => Datatype::Number,
        "stroke-dasharray" => Datatype::DashArray,
        _ => Datatype::Any,
    }
}

fn is_number(text: &str) -> bool {
    svgtypes::Number::from_str(text.trim()).is_ok()
}

fn is_length(text: &str) -> bool {
    svgtypes::Length::from_str(text.trim()).is_ok()
}

fn is_number_list(text: &str, min: usize) -> Option<usize> {
    let mut count = 0;
    for n in NumberListParser::from(text) {
        n.ok()?;
        count += 1;
    }
    (count >= min).then_some(count)
}

fn is_ncname(text: &str) -> bool {
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '\u{B7}'))
}

fn conforms(kind: Datatype, value: &str) -> bool {
    let inherit = value.trim() == "inherit";
    match kind {
        Datatype::Any => true,
        Datatype::Number => inherit || is_number(value),
        Datatype::Length => inherit || is_length(value),
        Datatype::Coordinates => is_number_list(value, 1).is_some(),
        Datatype::LengthOrAuto => value.trim() == "auto" || is_length(value),
        Datatype::DashArray => {
            matches!(value.trim(), "none" | "inherit") || is_number_list(value, 1).is_some()
        }
        Datatype::Path => {
            !value.trim().is_empty() && PathParser::from(value).all(|seg| seg.is_ok())
        }
        Datatype::Points => is_number_list(value, 0).is_some_and(|n| n % 2 == 0),
        Datatype::Transform => geom::parse_transform(value).is_some(),
        Datatype::ViewBox => ViewBox::parse(value).is_some_and(|vb| vb.is_valid()),
        Datatype::Id => is_ncname(value),
        Datatype::Fixed(allowed) => allowed.contains(&value),
    }
}

struct Validator<'a> {
    doc: &'a Document,
    errors: Vec<Diagnostic>,
}

impl Validator<'_> {
    fn error(&mut self, id: NodeId, message: String) {
        self.errors.push(Diagnostic {
            severity: Severity::Warning,
            code: Code::SchemaViolation,
            message,
            location: self.doc.location(id).clone(),
        });
    }

    fn drawing(&mut self, root: NodeId) {
        let doc = self.doc;
        let Some(el) = doc.element(root) else {
            return;
        };
        if el.attr("viewBox").is_none() {
            self.error(root, "svg root is missing the required 'viewBox'".to_string());
        }
        self.element(root, None);
    }

    fn element(&mut self, id: NodeId, parent: Option<ElementKind>) {
        let doc = self.doc;
        let Some(el) = doc.element(id) else {
            return;
        };
        if el.name.ns.as_deref() != Some(SVG_NS) {
            self.error(
                id,
                format!("element '{}' is not in the SVG namespace", el.name),
            );
            return;
        }
        let Some(kind) = ElementKind::from_local(&el.name.local) else {
            self.error(id, format!("element '{}' is not part of the profile", el.name));
            return;
        };
        if let Some(parent) = parent {
            if !parent.allows_child(kind) {
                self.error(
                    id,
                    format!(
                        "element '{}' not allowed as a child of '{}'",
                        kind.name(),
                        parent.name()
                    ),
                );
            }
        }
        self.attributes(id, kind, el);

        for &child in doc.children(id) {
            match doc.kind(child) {
                NodeKind::Element(_) => self.element(child, Some(kind)),
                NodeKind::Text(t) if !kind.rule().text && !t.trim().is_empty() => {
                    self.error(
                        child,
                        format!("character data not allowed in '{}'", kind.name()),
                    );
                }
                _ => {}
            }
        }
    }

    fn attributes(&mut self, id: NodeId, kind: ElementKind, el: &Element) {
        for (name, value) in &el.attributes {
            let display = name.display_name();
            if !matches!(name.ns.as_deref(), None | Some(XLINK_NS) | Some(XML_NS))
                || !kind.allows_attribute(&display)
            {
                self.error(
                    id,
                    format!("attribute '{display}' not allowed on '{}'", kind.name()),
                );
                continue;
            }
            let ok = match profile::property(&display) {
                Some(PropertyKind::Color) => {
                    ColorTable::profile().classify(value) == Classification::Permitted
                }
                Some(PropertyKind::Keywords(allowed)) => allowed.contains(&value.as_str()),
                Some(PropertyKind::FontFamily) => {
                    profile::generic_font_family(value) == Some(value.as_str())
                }
                Some(PropertyKind::Free) | None => conforms(datatype(&display), value),
            };
            if !ok {
                self.error(
                    id,
                    format!("invalid value '{value}' for attribute '{display}'"),
                );
            }
        }
    }
}

/// Validates `doc` against the profile grammar. The report is valid when no error was found.
pub fn validate(doc: &Document, selector: SchemaSelector) -> ValidationReport {
    let mut v = Validator {
        doc,
        errors: Vec::new(),
    };
    let top = doc.document_node();
    match selector {
        SchemaSelector::Standalone => match doc.root_element() {
            Some(root) if doc.element(root).is_some_and(|el| el.name.local == "svg") => {
                v.drawing(root)
            }
            Some(root) => v.error(root, "document root is not an svg element".to_string()),
            None => v.error(top, "document has no root element".to_string()),
        },
        SchemaSelector::Embedded => {
            for n in doc.descendants(top) {
                let is_drawing = doc.element(n).is_some_and(|el| el.name.local == "svg")
                    && !doc
                        .ancestors(n)
                        .filter_map(|a| doc.element(a))
                        .any(|a| a.name.local == "svg");
                if is_drawing {
                    v.drawing(n);
                }
            }
        }
    }
    tracing::debug!(errors = v.errors.len(), ?selector, "grammar validation finished");
    ValidationReport {
        valid: v.errors.is_empty(),
        errors: v.errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datatypes_accept_profile_values() {
        assert!(conforms(Datatype::Path, "M0 0 L10 10z"));
        assert!(!conforms(Datatype::Path, "M0 0 Q"));
        assert!(conforms(Datatype::Points, "0,0 10,0 10,10"));
        assert!(!conforms(Datatype::Points, "0,0 10"));
        assert!(conforms(Datatype::Transform, "translate(10) rotate(45)"));
        assert!(conforms(Datatype::LengthOrAuto, "auto"));
        assert!(conforms(Datatype::Length, "2.5mm"));
        assert!(!conforms(Datatype::ViewBox, "0 0 -1 5"));
    }

    #[test]
    fn ids_must_be_ncnames() {
        assert!(is_ncname("fig-1"));
        assert!(is_ncname("_x.y"));
        assert!(!is_ncname("1abc"));
        assert!(!is_ncname("a:b"));
        assert!(!is_ncname(""));
    }
}
