//! RFC 7996 vocabulary: the elements, attributes, property values and content model that a
//! drawing may use.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    Svg,
    Desc,
    Title,
    Path,
    Rect,
    Circle,
    Line,
    Ellipse,
    Polyline,
    Polygon,
    SolidColor,
    TextArea,
    Text,
    G,
    Defs,
    Use,
    A,
    Tspan,
    Tbreak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// Any value; the grammar check owns the datatype.
    Free,
    Keywords(&'static [&'static str]),
    Color,
    FontFamily,
}

#[derive(Debug)]
pub struct ElementRule {
    /// Attributes specific to this element, beyond [`CORE_ATTRIBUTES`] and the properties.
    pub attributes: &'static [&'static str],
    pub children: &'static [ElementKind],
    /// Whether non-whitespace character data may appear directly inside.
    pub text: bool,
}

pub const CORE_ATTRIBUTES: &[&str] = &[
    "id",
    "xml:id",
    "xml:base",
    "xml:lang",
    "xml:space",
    "class",
    "role",
    "rel",
    "rev",
    "typeof",
    "content",
    "datatype",
    "resource",
    "about",
    "property",
    "requiredFeatures",
    "requiredExtensions",
    "requiredFormats",
    "requiredFonts",
    "systemLanguage",
];

pub const GENERIC_FONT_FAMILIES: &[&str] = &["serif", "sans-serif", "monospace"];

const GRAPHICS: &[ElementKind] = &[
    ElementKind::Desc,
    ElementKind::Title,
    ElementKind::Path,
    ElementKind::Rect,
    ElementKind::Circle,
    ElementKind::Line,
    ElementKind::Ellipse,
    ElementKind::Polyline,
    ElementKind::Polygon,
    ElementKind::SolidColor,
    ElementKind::TextArea,
    ElementKind::Text,
    ElementKind::G,
    ElementKind::Defs,
    ElementKind::Use,
    ElementKind::A,
];

const LINK: &[ElementKind] = &[
    ElementKind::Desc,
    ElementKind::Title,
    ElementKind::Path,
    ElementKind::Rect,
    ElementKind::Circle,
    ElementKind::Line,
    ElementKind::Ellipse,
    ElementKind::Polyline,
    ElementKind::Polygon,
    ElementKind::SolidColor,
    ElementKind::TextArea,
    ElementKind::Text,
    ElementKind::G,
    ElementKind::Defs,
    ElementKind::Use,
    ElementKind::Tspan,
];

const DESCRIPTIVE: &[ElementKind] = &[ElementKind::Desc, ElementKind::Title];

const TEXT_CONTENT: &[ElementKind] = &[
    ElementKind::Desc,
    ElementKind::Title,
    ElementKind::Tspan,
    ElementKind::A,
];

const TSPAN_CONTENT: &[ElementKind] = &[ElementKind::Tspan, ElementKind::A];

const TEXT_AREA_CONTENT: &[ElementKind] = &[
    ElementKind::Desc,
    ElementKind::Title,
    ElementKind::Tspan,
    ElementKind::Tbreak,
    ElementKind::A,
];

impl ElementKind {
    pub const ALL: [ElementKind; 19] = [
        ElementKind::Svg,
        ElementKind::Desc,
        ElementKind::Title,
        ElementKind::Path,
        ElementKind::Rect,
        ElementKind::Circle,
        ElementKind::Line,
        ElementKind::Ellipse,
        ElementKind::Polyline,
        ElementKind::Polygon,
        ElementKind::SolidColor,
        ElementKind::TextArea,
        ElementKind::Text,
        ElementKind::G,
        ElementKind::Defs,
        ElementKind::Use,
        ElementKind::A,
        ElementKind::Tspan,
        ElementKind::Tbreak,
    ];

    pub fn from_local(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementKind::Svg => "svg",
            ElementKind::Desc => "desc",
            ElementKind::Title => "title",
            ElementKind::Path => "path",
            ElementKind::Rect => "rect",
            ElementKind::Circle => "circle",
            ElementKind::Line => "line",
            ElementKind::Ellipse => "ellipse",
            ElementKind::Polyline => "polyline",
            ElementKind::Polygon => "polygon",
            ElementKind::SolidColor => "solidColor",
            ElementKind::TextArea => "textArea",
            ElementKind::Text => "text",
            ElementKind::G => "g",
            ElementKind::Defs => "defs",
            ElementKind::Use => "use",
            ElementKind::A => "a",
            ElementKind::Tspan => "tspan",
            ElementKind::Tbreak => "tbreak",
        }
    }

    pub fn rule(self) -> &'static ElementRule {
        match self {
            ElementKind::Svg => &ElementRule {
                attributes: &[
                    "version",
                    "baseProfile",
                    "width",
                    "height",
                    "viewBox",
                    "preserveAspectRatio",
                    "snapshotTime",
                    "playbackOrder",
                    "timelineBegin",
                    "zoomAndPan",
                    "focusable",
                ],
                children: GRAPHICS,
                text: false,
            },
            ElementKind::Desc | ElementKind::Title => &ElementRule {
                attributes: &[],
                children: &[],
                text: true,
            },
            ElementKind::Path => &ElementRule {
                attributes: &["d", "pathLength", "transform"],
                children: DESCRIPTIVE,
                text: false,
            },
            ElementKind::Rect => &ElementRule {
                attributes: &["x", "y", "width", "height", "rx", "ry", "transform"],
                children: DESCRIPTIVE,
                text: false,
            },
            ElementKind::Circle => &ElementRule {
                attributes: &["cx", "cy", "r", "transform"],
                children: DESCRIPTIVE,
                text: false,
            },
            ElementKind::Line => &ElementRule {
                attributes: &["x1", "y1", "x2", "y2", "transform"],
                children: DESCRIPTIVE,
                text: false,
            },
            ElementKind::Ellipse => &ElementRule {
                attributes: &["cx", "cy", "rx", "ry", "transform"],
                children: DESCRIPTIVE,
                text: false,
            },
            ElementKind::Polyline | ElementKind::Polygon => &ElementRule {
                attributes: &["points", "transform"],
                children: DESCRIPTIVE,
                text: false,
            },
            ElementKind::SolidColor => &ElementRule {
                attributes: &[],
                children: DESCRIPTIVE,
                text: false,
            },
            ElementKind::TextArea => &ElementRule {
                attributes: &["x", "y", "width", "height", "editable", "focusable", "transform"],
                children: TEXT_AREA_CONTENT,
                text: true,
            },
            ElementKind::Text => &ElementRule {
                attributes: &["x", "y", "rotate", "editable", "focusable", "transform"],
                children: TEXT_CONTENT,
                text: true,
            },
            ElementKind::G => &ElementRule {
                attributes: &["focusable", "transform"],
                children: GRAPHICS,
                text: false,
            },
            ElementKind::Defs => &ElementRule {
                attributes: &[],
                children: GRAPHICS,
                text: false,
            },
            ElementKind::Use => &ElementRule {
                attributes: &["x", "y", "href", "xlink:href", "focusable", "transform"],
                children: DESCRIPTIVE,
                text: false,
            },
            ElementKind::A => &ElementRule {
                attributes: &["href", "xlink:href", "target", "focusable", "transform"],
                children: LINK,
                text: true,
            },
            ElementKind::Tspan => &ElementRule {
                attributes: &["x", "y", "focusable"],
                children: TSPAN_CONTENT,
                text: true,
            },
            ElementKind::Tbreak => &ElementRule {
                attributes: &[],
                children: &[],
                text: false,
            },
        }
    }

    pub fn allows_child(self, child: ElementKind) -> bool {
        self.rule().children.contains(&child)
    }

    pub fn allows_attribute(self, name: &str) -> bool {
        CORE_ATTRIBUTES.contains(&name)
            || property(name).is_some()
            || self.rule().attributes.contains(&name)
    }

    pub fn accepts_transform(self) -> bool {
        self.rule().attributes.contains(&"transform")
    }
}

/// Presentation properties permitted on every element, with their value rules.
pub fn property(name: &str) -> Option<PropertyKind> {
    const INHERIT: &str = "inherit";
    let kind = match name {
        "fill" | "stroke" | "color" | "solid-color" | "stop-color" | "viewport-fill" => {
            PropertyKind::Color
        }
        "font-family" => PropertyKind::FontFamily,
        "fill-opacity" | "stroke-opacity" | "solid-opacity" | "viewport-fill-opacity"
        | "opacity" | "stroke-width" | "stroke-dasharray" | "stroke-dashoffset"
        | "stroke-miterlimit" | "font-size" | "line-increment" => PropertyKind::Free,
        "fill-rule" => PropertyKind::Keywords(&["nonzero", "evenodd", INHERIT]),
        "stroke-linecap" => PropertyKind::Keywords(&["butt", "round", "square", INHERIT]),
        "stroke-linejoin" => PropertyKind::Keywords(&["miter", "round", "bevel", INHERIT]),
        "font-style" => PropertyKind::Keywords(&["normal", "italic", "oblique", INHERIT]),
        "font-variant" => PropertyKind::Keywords(&["normal", "small-caps", INHERIT]),
        "font-weight" => PropertyKind::Keywords(&[
            "normal", "bold", "bolder", "lighter", "100", "200", "300", "400", "500", "600",
            "700", "800", "900", INHERIT,
        ]),
        "text-anchor" => PropertyKind::Keywords(&["start", "middle", "end", INHERIT]),
        "text-align" => PropertyKind::Keywords(&["start", "center", "end", INHERIT]),
        "display-align" => {
            PropertyKind::Keywords(&["auto", "before", "center", "after", INHERIT])
        }
        "direction" => PropertyKind::Keywords(&["ltr", "rtl", INHERIT]),
        "unicode-bidi" => {
            PropertyKind::Keywords(&["normal", "embed", "bidi-override", INHERIT])
        }
        "display" => PropertyKind::Keywords(&[
            "inline",
            "block",
            "list-item",
            "run-in",
            "compact",
            "marker",
            "table",
            "inline-table",
            "table-row-group",
            "table-header-group",
            "table-footer-group",
            "table-row",
            "table-column-group",
            "table-column",
            "table-cell",
            "table-caption",
            "none",
            INHERIT,
        ]),
        "visibility" => PropertyKind::Keywords(&["visible", "hidden", "collapse", INHERIT]),
        "vector-effect" => PropertyKind::Keywords(&["non-scaling-stroke", "none", INHERIT]),
        "color-rendering" => {
            PropertyKind::Keywords(&["auto", "optimizeSpeed", "optimizeQuality", INHERIT])
        }
        "shape-rendering" => PropertyKind::Keywords(&[
            "auto",
            "optimizeSpeed",
            "crispEdges",
            "geometricPrecision",
            INHERIT,
        ]),
        "text-rendering" => PropertyKind::Keywords(&[
            "auto",
            "optimizeSpeed",
            "optimizeLegibility",
            "geometricPrecision",
            INHERIT,
        ]),
        "buffered-rendering" => {
            PropertyKind::Keywords(&["auto", "dynamic", "static", INHERIT])
        }
        "pointer-events" => PropertyKind::Keywords(&[
            "visiblePainted",
            "visibleFill",
            "visibleStroke",
            "visible",
            "painted",
            "fill",
            "stroke",
            "all",
            "none",
            INHERIT,
        ]),
        _ => return None,
    };
    Some(kind)
}

/// Reduces a `font-family` list to the first generic family it names.
pub fn generic_font_family(value: &str) -> Option<&'static str> {
    value
        .split(',')
        .map(|f| f.trim().trim_matches(|c| c == '\'' || c == '"').trim())
        .find_map(|f| {
            GENERIC_FONT_FAMILIES
                .iter()
                .copied()
                .find(|g| g.eq_ignore_ascii_case(f))
        })
        .or_else(|| (value.trim() == "inherit").then_some("inherit"))
}
