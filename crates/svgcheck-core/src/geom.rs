//! Content bounds of a drawing and viewBox synthesis.
//!
//! Measurement is conservative: curves are bounded by their control polygons, arcs by their
//! full ellipse and text by an average-advance approximation. The result may be larger than
//! the painted area, never smaller.

use crate::config::RepairPolicy;
use crate::dom::{Document, Element, NodeId, SVG_NS, XML_NS};
use crate::profile::ElementKind;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::str::FromStr;
use svgtypes::{Length, LengthUnit, NumberListParser, PathParser, PathSegment};
use unicode_width::UnicodeWidthStr;

pub type Unit = euclid::UnknownUnit;
pub type Point = euclid::Point2D<f64, Unit>;
pub type Transform = euclid::Transform2D<f64, Unit, Unit>;

pub fn point(x: f64, y: f64) -> Point {
    euclid::point2(x, y)
}

const MAX_USE_DEPTH: usize = 8;
const MAX_USE_EXPANSIONS: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn from_points(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        let mut it = points.into_iter();
        let p0 = it.next()?;
        let mut b = Self {
            min_x: p0.x,
            min_y: p0.y,
            max_x: p0.x,
            max_y: p0.y,
        };
        for p in it {
            b.include(p);
        }
        Some(b)
    }

    pub fn include(&mut self, p: Point) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }

    pub fn union(self, other: Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn contains(&self, other: &Bounds) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && self.max_x >= other.max_x
            && self.max_y >= other.max_y
    }
}

/// Axis-aligned extent of drawable content; `Empty` when nothing drawable was found.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Extent {
    #[default]
    Empty,
    Bounded(Bounds),
}

impl Extent {
    pub fn include(&mut self, p: Point) {
        if !(p.x.is_finite() && p.y.is_finite()) {
            return;
        }
        match self {
            Extent::Empty => {
                *self = Extent::Bounded(Bounds {
                    min_x: p.x,
                    min_y: p.y,
                    max_x: p.x,
                    max_y: p.y,
                })
            }
            Extent::Bounded(b) => b.include(p),
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        match self {
            Extent::Empty => None,
            Extent::Bounded(b) => Some(*b),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Extent::Empty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBox {
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewBox {
    /// Parses the four numbers of a `viewBox` attribute. Degenerate boxes parse; use
    /// [`ViewBox::is_valid`] to check them.
    pub fn parse(text: &str) -> Option<Self> {
        let mut numbers = Vec::with_capacity(4);
        for n in NumberListParser::from(text) {
            numbers.push(n.ok()?);
        }
        let [min_x, min_y, width, height] = numbers.as_slice() else {
            return None;
        };
        Some(Self {
            min_x: *min_x,
            min_y: *min_y,
            width: *width,
            height: *height,
        })
    }

    pub fn is_valid(&self) -> bool {
        [self.min_x, self.min_y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width > 0.0
            && self.height > 0.0
    }

    pub fn as_bounds(&self) -> Bounds {
        Bounds {
            min_x: self.min_x,
            min_y: self.min_y,
            max_x: self.min_x + self.width,
            max_y: self.min_y + self.height,
        }
    }
}

impl fmt::Display for ViewBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            fmt_number(self.min_x),
            fmt_number(self.min_y),
            fmt_number(self.width),
            fmt_number(self.height)
        )
    }
}

pub fn fmt_number(v: f64) -> String {
    // Normalizes -0 to 0.
    format!("{}", v + 0.0)
}

/// Converts an absolute length to user units (96 dpi). Relative units have no fixed size and
/// yield `None`.
pub fn length_to_user_units(text: &str) -> Option<f64> {
    let len = Length::from_str(text.trim()).ok()?;
    let n = len.number;
    let v = match len.unit {
        LengthUnit::None | LengthUnit::Px => n,
        LengthUnit::In => n * 96.0,
        LengthUnit::Cm => n * 96.0 / 2.54,
        LengthUnit::Mm => n * 96.0 / 25.4,
        LengthUnit::Pt => n * 4.0 / 3.0,
        LengthUnit::Pc => n * 16.0,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

pub fn parse_transform(text: &str) -> Option<Transform> {
    let ts = svgtypes::Transform::from_str(text).ok()?;
    Some(Transform::new(ts.a, ts.b, ts.c, ts.d, ts.e, ts.f))
}

/// `width`/`height` of an svg element, when both are absolute and positive.
pub fn declared_size(el: &Element) -> Option<(f64, f64)> {
    let w = length_to_user_units(el.attr("width")?)?;
    let h = length_to_user_units(el.attr("height")?)?;
    (w > 0.0 && h > 0.0).then_some((w, h))
}

#[derive(Debug, Clone, PartialEq)]
pub enum Synthesis {
    /// Built from measured content (and the declared size, if any).
    Measured(ViewBox),
    /// Built from the declared `width`/`height` alone; nothing drawable was found.
    Declared(ViewBox),
    /// Nothing to measure and no declared size.
    Default(ViewBox),
    /// Content was measured but its padded box is not finite; the policy default is used.
    Overflow(ViewBox),
}

impl Synthesis {
    pub fn view_box(&self) -> ViewBox {
        match self {
            Synthesis::Measured(vb)
            | Synthesis::Declared(vb)
            | Synthesis::Default(vb)
            | Synthesis::Overflow(vb) => *vb,
        }
    }
}

/// Builds a viewBox covering `extent` plus the policy margin, snapped outward to whole units.
pub fn synthesize_view_box(
    extent: Extent,
    declared: Option<(f64, f64)>,
    policy: &RepairPolicy,
) -> Synthesis {
    let declared_bounds = declared.map(|(w, h)| Bounds {
        min_x: 0.0,
        min_y: 0.0,
        max_x: w,
        max_y: h,
    });
    let Some(content) = extent.bounds() else {
        return match declared_bounds {
            Some(b) => Synthesis::Declared(ViewBox {
                min_x: 0.0,
                min_y: 0.0,
                width: b.max_x,
                height: b.max_y,
            }),
            None => Synthesis::Default(policy_default(policy)),
        };
    };

    let margin = (policy.viewbox_margin_ratio * content.width().max(content.height()))
        .max(policy.viewbox_min_margin);
    let padded = Bounds {
        min_x: (content.min_x - margin).floor(),
        min_y: (content.min_y - margin).floor(),
        max_x: (content.max_x + margin).ceil(),
        max_y: (content.max_y + margin).ceil(),
    };
    let b = match declared_bounds {
        Some(d) => padded.union(d),
        None => padded,
    };
    let vb = ViewBox {
        min_x: b.min_x,
        min_y: b.min_y,
        width: b.width(),
        height: b.height(),
    };
    if vb.is_valid() {
        Synthesis::Measured(vb)
    } else {
        Synthesis::Overflow(policy_default(policy))
    }
}

fn policy_default(policy: &RepairPolicy) -> ViewBox {
    let [min_x, min_y, width, height] = policy.default_viewbox;
    ViewBox {
        min_x,
        min_y,
        width,
        height,
    }
}

#[derive(Debug, Clone, Copy)]
struct TextStyle {
    font_size: f64,
    anchor: Anchor,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Anchor {
    Start,
    Middle,
    End,
}

/// Measures drawable content beneath an svg element.
pub struct GeometryEvaluator<'a> {
    doc: &'a Document,
    policy: &'a RepairPolicy,
    excluded: Option<&'a FxHashSet<NodeId>>,
    ids: FxHashMap<&'a str, NodeId>,
}

struct Walk {
    extent: Extent,
    /// `use` targets currently being expanded, innermost last.
    expanding: Vec<NodeId>,
    expansions: usize,
}

impl<'a> GeometryEvaluator<'a> {
    pub fn new(doc: &'a Document, policy: &'a RepairPolicy) -> Self {
        Self {
            doc,
            policy,
            excluded: None,
            ids: id_index(doc),
        }
    }

    /// Skips these subtrees, e.g. nodes a check-only run would have removed.
    pub fn excluding(mut self, nodes: &'a FxHashSet<NodeId>) -> Self {
        self.excluded = Some(nodes);
        self
    }

    pub fn evaluate(&self, root: NodeId) -> Extent {
        let mut walk = Walk {
            extent: Extent::Empty,
            expanding: Vec::new(),
            expansions: 0,
        };
        let style = TextStyle {
            font_size: self.policy.default_font_size,
            anchor: Anchor::Start,
        };
        for &child in self.doc.children(root) {
            self.visit(child, Transform::identity(), style, &mut walk);
        }
        walk.extent
    }

    fn visit(&self, id: NodeId, parent_ctm: Transform, parent_style: TextStyle, walk: &mut Walk) {
        if self.excluded.is_some_and(|set| set.contains(&id)) {
            return;
        }
        let Some(el) = self.doc.element(id) else {
            return;
        };
        let Some(kind) = profile_kind(el) else {
            return;
        };
        if matches!(kind, ElementKind::Defs | ElementKind::Desc | ElementKind::Title) {
            return;
        }

        let ctm = if kind.accepts_transform() {
            match el.attr("transform").and_then(parse_transform) {
                Some(own) => own.then(&parent_ctm),
                None => parent_ctm,
            }
        } else {
            parent_ctm
        };
        let style = self.text_style(el, parent_style);
        let mut add = |x: f64, y: f64| walk.extent.include(ctm.transform_point(point(x, y)));

        match kind {
            ElementKind::Path => {
                if let Some(d) = el.attr("d") {
                    for p in path_points(d) {
                        add(p.x, p.y);
                    }
                }
            }
            ElementKind::Rect | ElementKind::TextArea => {
                let x = num(el, "x").unwrap_or(0.0);
                let y = num(el, "y").unwrap_or(0.0);
                add(x, y);
                if let (Some(w), Some(h)) = (num(el, "width"), num(el, "height")) {
                    add(x + w, y);
                    add(x, y + h);
                    add(x + w, y + h);
                }
            }
            ElementKind::Circle => {
                let r = num(el, "r").unwrap_or(0.0);
                ellipse_box(num(el, "cx"), num(el, "cy"), r, r, &mut add);
            }
            ElementKind::Ellipse => {
                let rx = num(el, "rx").unwrap_or(0.0);
                let ry = num(el, "ry").unwrap_or(0.0);
                ellipse_box(num(el, "cx"), num(el, "cy"), rx, ry, &mut add);
            }
            ElementKind::Line => {
                add(num(el, "x1").unwrap_or(0.0), num(el, "y1").unwrap_or(0.0));
                add(num(el, "x2").unwrap_or(0.0), num(el, "y2").unwrap_or(0.0));
            }
            ElementKind::Polyline | ElementKind::Polygon => {
                if let Some(points) = el.attr("points") {
                    for (x, y) in point_pairs(points) {
                        add(x, y);
                    }
                }
            }
            ElementKind::Text => self.measure_text(id, el, style, &mut add),
            ElementKind::Tspan => {
                if el.attr("x").is_some() || el.attr("y").is_some() {
                    self.measure_text(id, el, style, &mut add);
                }
            }
            ElementKind::Use => {
                let x = num(el, "x").unwrap_or(0.0);
                let y = num(el, "y").unwrap_or(0.0);
                add(x, y);
                if let Some(target) = self.use_target(id, el, walk) {
                    let shifted = Transform::translation(x, y).then(&ctm);
                    walk.expanding.push(target);
                    walk.expansions += 1;
                    self.visit(target, shifted, style, walk);
                    walk.expanding.pop();
                }
                return;
            }
            _ => {}
        }

        for &child in self.doc.children(id) {
            self.visit(child, ctm, style, walk);
        }
    }

    fn text_style(&self, el: &Element, parent: TextStyle) -> TextStyle {
        let font_size = el
            .attr("font-size")
            .and_then(length_to_user_units)
            .filter(|v| *v > 0.0)
            .unwrap_or(parent.font_size);
        let anchor = match el.attr("text-anchor").map(str::trim) {
            Some("start") => Anchor::Start,
            Some("middle") => Anchor::Middle,
            Some("end") => Anchor::End,
            _ => parent.anchor,
        };
        TextStyle { font_size, anchor }
    }

    fn measure_text(
        &self,
        id: NodeId,
        el: &Element,
        style: TextStyle,
        add: &mut impl FnMut(f64, f64),
    ) {
        let x = first_number(el, "x").unwrap_or(0.0);
        let y = first_number(el, "y").unwrap_or(0.0);
        let content: String = self
            .doc
            .descendants(id)
            .into_iter()
            .filter_map(|n| self.doc.text(n))
            .collect();
        let columns = content.split_whitespace().collect::<Vec<_>>().join(" ").width();
        let advance = columns as f64 * style.font_size * self.policy.glyph_advance_ratio;
        let left = match style.anchor {
            Anchor::Start => x,
            Anchor::Middle => x - advance / 2.0,
            Anchor::End => x - advance,
        };
        let ascent = style.font_size;
        let descent = style.font_size * 0.25;
        add(left, y - ascent);
        add(left + advance, y + descent);
    }

    /// Element a `use` expands to, unless expanding it would re-enter the current walk.
    fn use_target(&self, use_id: NodeId, el: &Element, walk: &Walk) -> Option<NodeId> {
        if walk.expanding.len() >= MAX_USE_DEPTH || walk.expansions >= MAX_USE_EXPANSIONS {
            return None;
        }
        let target = fragment_target(&self.ids, el.href()?)?;
        let reentrant = target == use_id
            || walk.expanding.contains(&target)
            || self.doc.ancestors(use_id).any(|a| a == target);
        (!reentrant).then_some(target)
    }
}

/// Elements by `id` and `xml:id`; the first in document order wins.
fn id_index(doc: &Document) -> FxHashMap<&str, NodeId> {
    let mut ids = FxHashMap::default();
    for n in doc.descendants(doc.document_node()) {
        let Some(el) = doc.element(n) else {
            continue;
        };
        for value in [el.attr("id"), el.attr_ns(XML_NS, "id")].into_iter().flatten() {
            ids.entry(value).or_insert(n);
        }
    }
    ids
}

fn fragment_target(ids: &FxHashMap<&str, NodeId>, href: &str) -> Option<NodeId> {
    ids.get(href.trim().strip_prefix('#')?).copied()
}

/// Pre-order walk of `top` that skips excluded subtrees.
fn live_subtree(doc: &Document, top: NodeId, excluded: &FxHashSet<NodeId>) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![top];
    while let Some(n) = stack.pop() {
        if excluded.contains(&n) {
            continue;
        }
        out.push(n);
        stack.extend(doc.children(n).iter().rev().copied());
    }
    out
}

fn is_use(doc: &Document, n: NodeId) -> bool {
    doc.element(n).and_then(profile_kind) == Some(ElementKind::Use)
}

/// `use` elements beneath `root` whose expansion, followed through further `use` elements,
/// reaches the same `use` again.
pub fn circular_uses(doc: &Document, root: NodeId, excluded: &FxHashSet<NodeId>) -> Vec<NodeId> {
    let ids = id_index(doc);
    // use -> `use` elements inside its target
    let mut edges: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
    let successors = |u: NodeId| -> Vec<NodeId> {
        let Some(target) = doc
            .element(u)
            .and_then(Element::href)
            .and_then(|h| fragment_target(&ids, h))
        else {
            return Vec::new();
        };
        live_subtree(doc, target, excluded)
            .into_iter()
            .filter(|&n| is_use(doc, n))
            .collect()
    };

    let mut circular = Vec::new();
    for start in live_subtree(doc, root, excluded) {
        if !is_use(doc, start) {
            continue;
        }
        let mut seen = FxHashSet::default();
        let mut pending = vec![start];
        let mut found = false;
        while let Some(u) = pending.pop() {
            let next = edges.entry(u).or_insert_with(|| successors(u));
            if next.contains(&start) {
                found = true;
                break;
            }
            pending.extend(next.iter().copied().filter(|&v| seen.insert(v)));
        }
        if found {
            circular.push(start);
        }
    }
    circular
}

/// Profile element kind for an element in the SVG namespace (or in no namespace, which
/// unqualified standalone drawings use).
pub fn profile_kind(el: &Element) -> Option<ElementKind> {
    match el.name.ns.as_deref() {
        None | Some(SVG_NS) => ElementKind::from_local(&el.name.local),
        Some(_) => None,
    }
}

fn num(el: &Element, name: &str) -> Option<f64> {
    el.attr(name).and_then(length_to_user_units)
}

fn first_number(el: &Element, name: &str) -> Option<f64> {
    let raw = el.attr(name)?;
    NumberListParser::from(raw).next()?.ok()
}

fn ellipse_box(
    cx: Option<f64>,
    cy: Option<f64>,
    rx: f64,
    ry: f64,
    add: &mut impl FnMut(f64, f64),
) {
    let cx = cx.unwrap_or(0.0);
    let cy = cy.unwrap_or(0.0);
    add(cx - rx, cy - ry);
    add(cx + rx, cy - ry);
    add(cx - rx, cy + ry);
    add(cx + rx, cy + ry);
}

pub fn point_pairs(text: &str) -> Vec<(f64, f64)> {
    let numbers: Vec<f64> = NumberListParser::from(text)
        .map_while(|n| n.ok())
        .collect();
    numbers.chunks_exact(2).map(|c| (c[0], c[1])).collect()
}

/// Absolute points whose hull contains the path. Parsing stops at the first error, as
/// renderers do.
pub fn path_points(d: &str) -> Vec<Point> {
    let mut out = Vec::new();
    let mut cur = point(0.0, 0.0);
    let mut start = cur;
    let mut last_ctrl: Option<Point> = None;

    for seg in PathParser::from(d) {
        let Ok(seg) = seg else {
            break;
        };
        let base = cur;
        let abs_pt = |abs: bool, x: f64, y: f64| {
            if abs {
                point(x, y)
            } else {
                point(base.x + x, base.y + y)
            }
        };
        let mut ctrl = None;
        match seg {
            PathSegment::MoveTo { abs, x, y } => {
                cur = abs_pt(abs, x, y);
                start = cur;
                out.push(cur);
            }
            PathSegment::LineTo { abs, x, y } => {
                cur = abs_pt(abs, x, y);
                out.push(cur);
            }
            PathSegment::HorizontalLineTo { abs, x } => {
                cur = point(if abs { x } else { cur.x + x }, cur.y);
                out.push(cur);
            }
            PathSegment::VerticalLineTo { abs, y } => {
                cur = point(cur.x, if abs { y } else { cur.y + y });
                out.push(cur);
            }
            PathSegment::CurveTo {
                abs,
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                let c1 = abs_pt(abs, x1, y1);
                let c2 = abs_pt(abs, x2, y2);
                cur = abs_pt(abs, x, y);
                out.extend([c1, c2, cur]);
                ctrl = Some(c2);
            }
            PathSegment::SmoothCurveTo { abs, x2, y2, x, y } => {
                let c1 = reflect(last_ctrl, cur);
                let c2 = abs_pt(abs, x2, y2);
                cur = abs_pt(abs, x, y);
                out.extend([c1, c2, cur]);
                ctrl = Some(c2);
            }
            PathSegment::Quadratic { abs, x1, y1, x, y } => {
                let c = abs_pt(abs, x1, y1);
                cur = abs_pt(abs, x, y);
                out.extend([c, cur]);
                ctrl = Some(c);
            }
            PathSegment::SmoothQuadratic { abs, x, y } => {
                let c = reflect(last_ctrl, cur);
                cur = abs_pt(abs, x, y);
                out.extend([c, cur]);
                ctrl = Some(c);
            }
            PathSegment::EllipticalArc {
                abs,
                rx,
                ry,
                x_axis_rotation,
                large_arc,
                sweep,
                x,
                y,
            } => {
                let end = abs_pt(abs, x, y);
                out.extend(arc_box(cur, end, rx, ry, x_axis_rotation, large_arc, sweep));
                cur = end;
                out.push(cur);
            }
            PathSegment::ClosePath { .. } => {
                cur = start;
            }
        }
        last_ctrl = ctrl;
    }
    out
}

fn reflect(ctrl: Option<Point>, about: Point) -> Point {
    match ctrl {
        Some(c) => point(2.0 * about.x - c.x, 2.0 * about.y - c.y),
        None => about,
    }
}

/// Corners of the bounding box of the full ellipse an arc segment lies on.
fn arc_box(
    from: Point,
    to: Point,
    rx: f64,
    ry: f64,
    rotation_deg: f64,
    large_arc: bool,
    sweep: bool,
) -> Vec<Point> {
    let (mut rx, mut ry) = (rx.abs(), ry.abs());
    if rx == 0.0 || ry == 0.0 || from == to {
        return Vec::new();
    }
    let phi = rotation_deg.to_radians();
    let (sin, cos) = phi.sin_cos();

    // Endpoint to center parameterization.
    let dx2 = (from.x - to.x) / 2.0;
    let dy2 = (from.y - to.y) / 2.0;
    let x1p = cos * dx2 + sin * dy2;
    let y1p = -sin * dx2 + cos * dy2;

    let lambda = (x1p * x1p) / (rx * rx) + (y1p * y1p) / (ry * ry);
    if lambda > 1.0 {
        let s = lambda.sqrt();
        rx *= s;
        ry *= s;
    }
    let num = rx * rx * ry * ry - rx * rx * y1p * y1p - ry * ry * x1p * x1p;
    let den = rx * rx * y1p * y1p + ry * ry * x1p * x1p;
    let mut coef = if den == 0.0 { 0.0 } else { (num / den).max(0.0).sqrt() };
    if large_arc == sweep {
        coef = -coef;
    }
    let cxp = coef * rx * y1p / ry;
    let cyp = -coef * ry * x1p / rx;
    let cx = cos * cxp - sin * cyp + (from.x + to.x) / 2.0;
    let cy = sin * cxp + cos * cyp + (from.y + to.y) / 2.0;

    let hx = (rx * rx * cos * cos + ry * ry * sin * sin).sqrt();
    let hy = (rx * rx * sin * sin + ry * ry * cos * cos).sqrt();
    vec![point(cx - hx, cy - hy), point(cx + hx, cy + hy)]
}
