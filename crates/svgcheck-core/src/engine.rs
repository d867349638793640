//! The repair/validation pass.
//!
//! [`check_tree`] walks the document once in document order. Every rule first works out the
//! state the node *should* have and reports the difference; the difference is written back to
//! the tree only in [`Mode::Repair`](crate::config::Mode::Repair). A check-only run therefore
//! reports exactly what a repair run would do.

use crate::colors::{Classification, ColorTable};
use crate::config::CheckOptions;
use crate::diagnostics::{Code, DiagnosticSink};
use crate::dom::{
    Document, Element, ExpandedName, Location, Namespace, NodeId, NodeKind, SVG_NS, XLINK_NS,
    XML_NS,
};
use crate::geom::{self, GeometryEvaluator, Synthesis, ViewBox};
use crate::profile::{self, ElementKind, PropertyKind};
use indexmap::IndexMap;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};

/// Outcome of one engine run.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub diagnostics: DiagnosticSink,
    /// Edits the run decided on. They were applied only when repairing.
    pub edits: usize,
    pub svg_roots: usize,
}

impl CheckReport {
    /// At least one fatal finding.
    pub fn is_fatal(&self) -> bool {
        self.diagnostics.has_fatal()
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_clean()
    }
}

/// Checks (and in repair mode, fixes) every svg drawing in `doc`.
///
/// A document whose root element is `svg` is checked as a standalone drawing. Otherwise the
/// document is treated as a host: its own elements only contribute identifiers, and each `svg`
/// element found inside it is checked as an embedded drawing.
pub fn check_tree(doc: &mut Document, options: &CheckOptions) -> CheckReport {
    let mut engine = Engine {
        doc,
        options,
        sink: DiagnosticSink::new(),
        ids: FxHashMap::default(),
        references: Vec::new(),
        removed: FxHashSet::default(),
        edits: 0,
        svg_roots: 0,
    };
    let top = engine.doc.document_node();
    engine.visit_host(top);
    engine.cross_check_references();

    tracing::debug!(
        edits = engine.edits,
        findings = engine.sink.all().len(),
        repairing = options.repairing(),
        "check complete"
    );
    CheckReport {
        diagnostics: engine.sink,
        edits: engine.edits,
        svg_roots: engine.svg_roots,
    }
}

#[derive(Debug)]
struct Reference {
    target: String,
    attribute: String,
    location: Location,
}

#[derive(Debug, Clone, Copy)]
struct Scope {
    /// The drawing's root `svg` carries no namespace, so unqualified children are in scope.
    unqualified: bool,
}

enum Verdict {
    Keep,
    Replace(String),
    Remove,
}

struct Engine<'a> {
    doc: &'a mut Document,
    options: &'a CheckOptions,
    sink: DiagnosticSink,
    ids: FxHashMap<String, Location>,
    references: Vec<Reference>,
    removed: FxHashSet<NodeId>,
    edits: usize,
    svg_roots: usize,
}

fn url_reference_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"url\(\s*#([^)\s]+)\s*\)").expect("valid regex"))
}

fn is_svg_root_candidate(el: &Element) -> bool {
    el.name.local == "svg" && matches!(el.name.ns.as_deref(), None | Some(SVG_NS))
}

fn is_disallowed_control(c: char) -> bool {
    c.is_control() && !matches!(c, '\t' | '\n' | '\r')
}

impl Engine<'_> {
    fn repairing(&self) -> bool {
        self.options.repairing()
    }

    fn visit_host(&mut self, id: NodeId) {
        if let Some(el) = self.doc.element(id) {
            if is_svg_root_candidate(el) {
                self.check_svg_root(id);
                return;
            }
            let ids = id_values(el);
            let loc = self.doc.location(id).clone();
            for value in ids {
                self.register_id(&value, &loc);
            }
        }
        for child in self.doc.children(id).to_vec() {
            if matches!(self.doc.kind(child), NodeKind::Element(_)) {
                self.visit_host(child);
            }
        }
    }

    fn check_svg_root(&mut self, root: NodeId) {
        self.svg_roots += 1;
        let loc = self.doc.location(root).clone();
        tracing::info!(location = %loc, "checking svg drawing");

        let unqualified = self
            .doc
            .element(root)
            .is_some_and(|el| el.name.ns.is_none());
        let scope = Scope { unqualified };
        if unqualified {
            self.sink.info(
                Code::NamespaceAssigned,
                &loc,
                format!("svg root has no namespace; assigning {SVG_NS}"),
            );
        }

        self.check_element(root, None, scope);
        self.check_use_cycles(root);

        if unqualified {
            self.edits += 1;
            if self.repairing() {
                self.assign_svg_namespace(root);
            }
        }
        self.check_view_box(root);
    }

    /// Applies the per-element rules to `id`, then to its children. Returns without descending
    /// when the element itself is removed.
    fn check_element(&mut self, id: NodeId, parent: Option<ElementKind>, scope: Scope) {
        let Some(el) = self.doc.element(id) else {
            return;
        };
        let loc = self.doc.location(id).clone();
        let name = el.name.clone();
        tracing::trace!(element = %name, location = %loc, "visit");

        let in_scope = match name.ns.as_deref() {
            Some(SVG_NS) => true,
            None => scope.unqualified,
            Some(_) => false,
        };
        if !in_scope {
            self.sink.warn(
                Code::ForeignNamespace,
                &loc,
                format!("element '{name}' is in a foreign namespace; removed"),
            );
            self.remove_node(id);
            return;
        }
        let Some(kind) = ElementKind::from_local(&name.local) else {
            self.sink.warn(
                Code::ForbiddenElement,
                &loc,
                format!("element '{}' is not allowed; removed", name.local),
            );
            self.remove_node(id);
            return;
        };
        if let Some(parent) = parent {
            if !parent.allows_child(kind) {
                self.sink.warn(
                    Code::MisplacedElement,
                    &loc,
                    format!(
                        "element '{}' is not allowed inside '{}'; removed",
                        kind.name(),
                        parent.name()
                    ),
                );
                self.remove_node(id);
                return;
            }
        }

        self.check_attributes(id, kind, &loc);

        for child in self.doc.children(id).to_vec() {
            match self.doc.kind(child) {
                NodeKind::Element(_) => self.check_element(child, Some(kind), scope),
                NodeKind::Text(_) => self.check_text(child, kind),
                _ => {}
            }
        }
    }

    fn check_attributes(&mut self, id: NodeId, kind: ElementKind, loc: &Location) {
        let Some(el) = self.doc.element(id) else {
            return;
        };
        let original = el.attributes.clone();
        let mut planned = self.promote_style(kind, &original, loc);
        let mut element_ids: Vec<String> = Vec::new();

        let names: Vec<ExpandedName> = planned.keys().cloned().collect();
        for attr in names {
            let Some(value) = planned.get(&attr).cloned() else {
                continue;
            };
            match self.attribute_verdict(kind, &attr, &value, loc) {
                Verdict::Keep => {}
                Verdict::Replace(new) => {
                    planned.insert(attr.clone(), new);
                }
                Verdict::Remove => {
                    planned.shift_remove(&attr);
                    continue;
                }
            }
            let kept = planned.get(&attr).map(String::as_str).unwrap_or_default();
            let display = attr.display_name();
            if (display == "id" || display == "xml:id") && !element_ids.iter().any(|v| v == kept) {
                element_ids.push(kept.to_string());
            }
            self.collect_references(&display, kept, loc);
        }

        for value in element_ids {
            self.register_id(&value, loc);
        }

        if planned != original {
            self.edits += changed_attributes(&original, &planned);
            if self.repairing() {
                tracing::debug!(location = %loc, element = kind.name(), "attributes rewritten");
                if let Some(el) = self.doc.element_mut(id) {
                    el.attributes = planned;
                }
            }
        }
    }

    /// Splits `style` into presentation attributes, in place of the `style` attribute.
    fn promote_style(
        &mut self,
        kind: ElementKind,
        attributes: &IndexMap<ExpandedName, String>,
        loc: &Location,
    ) -> IndexMap<ExpandedName, String> {
        let style_name = ExpandedName::local("style");
        if !attributes.contains_key(&style_name) {
            return attributes.clone();
        }
        let mut out = IndexMap::with_capacity(attributes.len());
        for (name, value) in attributes {
            if *name != style_name {
                out.insert(name.clone(), value.clone());
                continue;
            }
            for decl in value.split(';') {
                let Some((prop, val)) = decl.split_once(':') else {
                    if !decl.trim().is_empty() {
                        self.sink.warn(
                            Code::StyleDropped,
                            loc,
                            format!("malformed style declaration '{}'; dropped", decl.trim()),
                        );
                    }
                    continue;
                };
                let prop = prop.trim();
                let val = val.trim().trim_end_matches("!important").trim_end();
                let key = ExpandedName::local(prop);
                if profile::property(prop).is_none() || !kind.allows_attribute(prop) {
                    self.sink.warn(
                        Code::StyleDropped,
                        loc,
                        format!("style property '{prop}' is not allowed; dropped"),
                    );
                } else if attributes.contains_key(&key) || out.contains_key(&key) {
                    self.sink.warn(
                        Code::StyleDropped,
                        loc,
                        format!("style property '{prop}' conflicts with an existing attribute; dropped"),
                    );
                } else {
                    self.sink.info(
                        Code::StylePromoted,
                        loc,
                        format!("style property '{prop}' promoted to an attribute"),
                    );
                    out.insert(key, val.to_string());
                }
            }
        }
        out
    }

    fn attribute_verdict(
        &mut self,
        kind: ElementKind,
        attr: &ExpandedName,
        value: &str,
        loc: &Location,
    ) -> Verdict {
        let display = attr.display_name();
        if !matches!(attr.ns.as_deref(), None | Some(XLINK_NS) | Some(XML_NS)) {
            self.sink.warn(
                Code::ForeignNamespace,
                loc,
                format!("attribute '{display}' is in a foreign namespace; removed"),
            );
            return Verdict::Remove;
        }
        if !kind.allows_attribute(&display) {
            self.sink.warn(
                Code::UnknownAttribute,
                loc,
                format!(
                    "attribute '{display}' is not allowed on '{}'; removed",
                    kind.name()
                ),
            );
            return Verdict::Remove;
        }

        match profile::property(&display) {
            Some(PropertyKind::Keywords(allowed)) => {
                let trimmed = value.trim();
                if allowed.contains(&trimmed) {
                    if trimmed == value {
                        Verdict::Keep
                    } else {
                        self.sink.info(
                            Code::ValueNormalized,
                            loc,
                            format!("{display} '{value}' trimmed to '{trimmed}'"),
                        );
                        Verdict::Replace(trimmed.to_string())
                    }
                } else {
                    self.sink.warn(
                        Code::InvalidValue,
                        loc,
                        format!("'{value}' is not a permitted value for '{display}'; removed"),
                    );
                    Verdict::Remove
                }
            }
            Some(PropertyKind::Color) => self.color_verdict(&display, value, loc),
            Some(PropertyKind::FontFamily) => match profile::generic_font_family(value) {
                Some(generic) if generic == value => Verdict::Keep,
                Some(generic) => {
                    self.sink.warn(
                        Code::FontFamilySubstituted,
                        loc,
                        format!("font-family '{value}' reduced to '{generic}'"),
                    );
                    Verdict::Replace(generic.to_string())
                }
                None => {
                    self.sink.warn(
                        Code::InvalidValue,
                        loc,
                        format!("font-family '{value}' names no generic family; removed"),
                    );
                    Verdict::Remove
                }
            },
            Some(PropertyKind::Free) | None => Verdict::Keep,
        }
    }

    fn color_verdict(&mut self, attr: &str, value: &str, loc: &Location) -> Verdict {
        let table = ColorTable::profile();
        match table.classify(value) {
            Classification::Permitted => Verdict::Keep,
            Classification::EquivalentOf(canonical) => {
                self.sink.info(
                    Code::ColorCanonicalized,
                    loc,
                    format!("{attr} '{value}' canonicalized to '{canonical}'"),
                );
                Verdict::Replace(canonical.to_string())
            }
            Classification::RecognizedButDisallowed(parsed) => {
                let nearest = table.nearest_permitted(&parsed);
                let action = if self.repairing() {
                    "replaced with"
                } else {
                    "would be replaced with"
                };
                self.sink.warn(
                    Code::ColorDisallowed,
                    loc,
                    format!("{attr} '{value}' is not a permitted color; {action} '{nearest}'"),
                );
                Verdict::Replace(nearest.to_string())
            }
            Classification::Unparseable => {
                self.sink.fatal(
                    Code::ColorUnparseable,
                    loc,
                    format!("{attr} '{value}' is not a color"),
                );
                Verdict::Keep
            }
        }
    }

    fn collect_references(&mut self, attr: &str, value: &str, loc: &Location) {
        if attr == "href" || attr == "xlink:href" {
            if let Some(target) = value.trim().strip_prefix('#') {
                self.references.push(Reference {
                    target: target.to_string(),
                    attribute: attr.to_string(),
                    location: loc.clone(),
                });
            }
            return;
        }
        for caps in url_reference_regex().captures_iter(value) {
            self.references.push(Reference {
                target: caps[1].to_string(),
                attribute: attr.to_string(),
                location: loc.clone(),
            });
        }
    }

    fn register_id(&mut self, value: &str, loc: &Location) {
        match self.ids.get(value) {
            Some(first) => {
                let message = format!("duplicate id '{value}' (first defined at {first})");
                self.sink.fatal(Code::DuplicateId, loc, message);
            }
            None => {
                self.ids.insert(value.to_string(), loc.clone());
            }
        }
    }

    fn check_text(&mut self, id: NodeId, parent: ElementKind) {
        let Some(text) = self.doc.text(id) else {
            return;
        };
        let loc = self.doc.location(id).clone();
        let has_content = !text.trim().is_empty();
        let bad_char = text.chars().find(|&c| is_disallowed_control(c));

        if has_content && !parent.rule().text {
            let shown: String = text.trim().chars().take(24).collect();
            self.sink.warn(
                Code::UnexpectedText,
                &loc,
                format!("text '{shown}' is not allowed inside '{}'; removed", parent.name()),
            );
            self.remove_node(id);
            return;
        }
        if let Some(c) = bad_char {
            self.sink.fatal(
                Code::InvalidCharacter,
                &loc,
                format!(
                    "character U+{:04X} is not allowed in '{}' text",
                    u32::from(c),
                    parent.name()
                ),
            );
        }
    }

    /// A `use` whose expansion contains itself cannot be resolved; it is left in place.
    fn check_use_cycles(&mut self, root: NodeId) {
        for id in geom::circular_uses(&*self.doc, root, &self.removed) {
            let href = self.doc.element(id).and_then(|el| el.href()).unwrap_or_default();
            let loc = self.doc.location(id).clone();
            self.sink.fatal(
                Code::CircularReference,
                &loc,
                format!("use reference '{href}' is circular"),
            );
        }
    }

    fn check_view_box(&mut self, root: NodeId) {
        let Some(el) = self.doc.element(root) else {
            return;
        };
        let loc = self.doc.location(root).clone();
        if let Some(raw) = el.attr("viewBox") {
            if ViewBox::parse(raw).is_some_and(|vb| vb.is_valid()) {
                return;
            }
            self.sink.warn(
                Code::ViewBoxDegenerate,
                &loc,
                format!("viewBox '{raw}' is degenerate; replacing it"),
            );
        }

        let declared = self.doc.element(root).and_then(geom::declared_size);
        let extent = GeometryEvaluator::new(&*self.doc, &self.options.policy)
            .excluding(&self.removed)
            .evaluate(root);
        let synthesis = geom::synthesize_view_box(extent, declared, &self.options.policy);
        let view_box = synthesis.view_box();
        match &synthesis {
            Synthesis::Measured(_) | Synthesis::Declared(_) => self.sink.info(
                Code::ViewBoxSynthesized,
                &loc,
                format!("viewBox synthesized as '{view_box}'"),
            ),
            Synthesis::Default(_) => self.sink.warn(
                Code::ViewBoxDefaulted,
                &loc,
                format!("no drawable content; viewBox defaulted to '{view_box}'"),
            ),
            Synthesis::Overflow(_) => self.sink.warn(
                Code::ViewBoxDefaulted,
                &loc,
                format!("content extent is not finite; viewBox defaulted to '{view_box}'"),
            ),
        }

        self.edits += 1;
        if self.repairing() {
            tracing::debug!(location = %loc, %view_box, "viewBox set");
            if let Some(el) = self.doc.element_mut(root) {
                el.set_attr(ExpandedName::local("viewBox"), view_box.to_string());
            }
        }
    }

    fn assign_svg_namespace(&mut self, root: NodeId) {
        for n in self.doc.descendants(root) {
            if let Some(el) = self.doc.element_mut(n) {
                if el.name.ns.is_none() {
                    el.name.ns = Some(SVG_NS.to_string());
                }
            }
        }
        if self.doc.lookup_prefix(root, SVG_NS) != Some(None) {
            if let Some(el) = self.doc.element_mut(root) {
                el.prefix = None;
                el.namespaces.retain(|ns| ns.prefix.is_some());
                el.namespaces.insert(
                    0,
                    Namespace {
                        prefix: None,
                        uri: SVG_NS.to_string(),
                    },
                );
            }
        }
        tracing::debug!("svg namespace assigned");
    }

    fn remove_node(&mut self, id: NodeId) {
        self.edits += 1;
        self.removed.insert(id);
        if self.repairing() {
            tracing::debug!(location = %self.doc.location(id), "node removed");
            self.doc.detach(id);
        }
    }

    fn cross_check_references(&mut self) {
        for r in std::mem::take(&mut self.references) {
            if !self.ids.contains_key(&r.target) {
                self.sink.fatal(
                    Code::DanglingReference,
                    &r.location,
                    format!("{} refers to undefined id '{}'", r.attribute, r.target),
                );
            }
        }
    }
}

fn id_values(el: &Element) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for v in [el.attr("id"), el.attr_ns(XML_NS, "id")].into_iter().flatten() {
        if !out.iter().any(|o| o == v) {
            out.push(v.to_string());
        }
    }
    out
}

fn changed_attributes(
    before: &IndexMap<ExpandedName, String>,
    after: &IndexMap<ExpandedName, String>,
) -> usize {
    let removed_or_changed = before
        .iter()
        .filter(|(k, v)| after.get(*k) != Some(*v))
        .count();
    let added = after.keys().filter(|k| !before.contains_key(*k)).count();
    removed_or_changed + added
}
