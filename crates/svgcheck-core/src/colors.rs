//! The permitted color palette and the rules that map arbitrary color expressions onto it.
//!
//! The palette is what survives black-and-white reproduction: `black` and `white`, plus the
//! `none` / `inherit` / `currentColor` keywords, which carry no color of their own.

use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    None,
    Inherit,
    CurrentColor,
}

impl Sentinel {
    pub fn canonical(self) -> &'static str {
        match self {
            Sentinel::None => "none",
            Sentinel::Inherit => "inherit",
            Sentinel::CurrentColor => "currentColor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedColor {
    Sentinel(Sentinel),
    Rgb { rgb: Rgb, alpha: u8 },
    /// `url(...)` paint server reference.
    PaintServer(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteEntry {
    pub name: &'static str,
    pub rgb: Rgb,
}

/// Declaration order is the tie-break order for nearest-entry substitution.
const PALETTE: [PaletteEntry; 2] = [
    PaletteEntry {
        name: "black",
        rgb: Rgb::new(0, 0, 0),
    },
    PaletteEntry {
        name: "white",
        rgb: Rgb::new(255, 255, 255),
    },
];

const SENTINELS: [Sentinel; 3] = [Sentinel::None, Sentinel::Inherit, Sentinel::CurrentColor];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Already spelled exactly as the palette spells it.
    Permitted,
    /// Denotes a palette value but is spelled differently; carries the canonical spelling.
    EquivalentOf(&'static str),
    RecognizedButDisallowed(ParsedColor),
    Unparseable,
}

#[derive(Debug, Clone, Copy)]
pub struct ColorTable {
    entries: &'static [PaletteEntry],
}

impl ColorTable {
    pub fn profile() -> &'static ColorTable {
        static TABLE: ColorTable = ColorTable { entries: &PALETTE };
        &TABLE
    }

    pub fn entries(&self) -> &'static [PaletteEntry] {
        self.entries
    }

    pub fn is_canonical(&self, value: &str) -> bool {
        self.entries.iter().any(|e| e.name == value)
            || SENTINELS.iter().any(|s| s.canonical() == value)
    }

    pub fn classify(&self, value: &str) -> Classification {
        if self.is_canonical(value) {
            return Classification::Permitted;
        }
        let Some(parsed) = parse_color(value) else {
            return Classification::Unparseable;
        };
        match parsed {
            ParsedColor::Sentinel(s) => Classification::EquivalentOf(s.canonical()),
            ParsedColor::Rgb { rgb, alpha } => {
                match self.entries.iter().find(|e| alpha == 255 && e.rgb == rgb) {
                    Some(entry) => Classification::EquivalentOf(entry.name),
                    None => Classification::RecognizedButDisallowed(ParsedColor::Rgb { rgb, alpha }),
                }
            }
            other => Classification::RecognizedButDisallowed(other),
        }
    }

    /// Nearest palette entry under [`distance`]; ties go to the earlier entry. Paint servers
    /// have no color of their own and map to the first entry.
    pub fn nearest_permitted(&self, color: &ParsedColor) -> &'static str {
        match color {
            ParsedColor::Sentinel(s) => s.canonical(),
            ParsedColor::PaintServer(_) => self.entries[0].name,
            ParsedColor::Rgb { rgb, .. } => {
                let mut best = &self.entries[0];
                let mut best_d = distance(*rgb, best.rgb);
                for entry in &self.entries[1..] {
                    let d = distance(*rgb, entry.rgb);
                    if d < best_d {
                        best = entry;
                        best_d = d;
                    }
                }
                best.name
            }
        }
    }
}

/// Luma-weighted squared sRGB distance: `299·Δr² + 587·Δg² + 114·Δb²`.
pub fn distance(a: Rgb, b: Rgb) -> u64 {
    fn sq(x: u8, y: u8) -> u64 {
        let d = (i64::from(x) - i64::from(y)).unsigned_abs();
        d * d
    }
    299 * sq(a.r, b.r) + 587 * sq(a.g, b.g) + 114 * sq(a.b, b.b)
}

/// Parses any CSS/SVG color expression. Case and surrounding whitespace are ignored.
pub fn parse_color(value: &str) -> Option<ParsedColor> {
    let t = value.trim();
    if t.is_empty() {
        return None;
    }
    let lower = t.to_ascii_lowercase();
    match lower.as_str() {
        "none" | "transparent" => return Some(ParsedColor::Sentinel(Sentinel::None)),
        "inherit" => return Some(ParsedColor::Sentinel(Sentinel::Inherit)),
        "currentcolor" => return Some(ParsedColor::Sentinel(Sentinel::CurrentColor)),
        _ => {}
    }
    if lower.starts_with("url(") {
        return lower
            .ends_with(')')
            .then(|| ParsedColor::PaintServer(t.to_string()));
    }
    let color = svgtypes::Color::from_str(&lower).ok()?;
    Some(ParsedColor::Rgb {
        rgb: Rgb::new(color.red, color.green, color.blue),
        alpha: color.alpha,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> &'static ColorTable {
        ColorTable::profile()
    }

    #[test]
    fn canonical_spellings_are_permitted() {
        for v in ["black", "white", "none", "inherit", "currentColor"] {
            assert_eq!(table().classify(v), Classification::Permitted, "{v}");
        }
    }

    #[test]
    fn equivalent_spellings_map_to_canonical() {
        assert_eq!(
            table().classify(" BLACK "),
            Classification::EquivalentOf("black")
        );
        assert_eq!(table().classify("#fff"), Classification::EquivalentOf("white"));
        assert_eq!(
            table().classify("#FFFFFF"),
            Classification::EquivalentOf("white")
        );
        assert_eq!(
            table().classify("rgb(0, 0, 0)"),
            Classification::EquivalentOf("black")
        );
        assert_eq!(
            table().classify("currentcolor"),
            Classification::EquivalentOf("currentColor")
        );
        assert_eq!(
            table().classify("transparent"),
            Classification::EquivalentOf("none")
        );
    }

    #[test]
    fn other_colors_are_disallowed_or_unparseable() {
        assert!(matches!(
            table().classify("red"),
            Classification::RecognizedButDisallowed(_)
        ));
        assert!(matches!(
            table().classify("url(#grad)"),
            Classification::RecognizedButDisallowed(ParsedColor::PaintServer(_))
        ));
        assert_eq!(table().classify("#12"), Classification::Unparseable);
        assert_eq!(table().classify("blurple"), Classification::Unparseable);
        assert_eq!(table().classify(""), Classification::Unparseable);
    }

    #[test]
    fn nearest_uses_luma_weighted_distance() {
        let near = |v: &str| table().nearest_permitted(&parse_color(v).unwrap());
        assert_eq!(near("red"), "black");
        assert_eq!(near("yellow"), "white");
        assert_eq!(near("#808080"), "white");
        assert_eq!(near("#7f7f7f"), "black");
        assert_eq!(near("navy"), "black");
        assert_eq!(near("url(#g)"), "black");
    }

    #[test]
    fn ties_go_to_the_earlier_entry() {
        static TIED: [PaletteEntry; 2] = [
            PaletteEntry {
                name: "dark",
                rgb: Rgb::new(0, 0, 0),
            },
            PaletteEntry {
                name: "light",
                rgb: Rgb::new(0, 0, 200),
            },
        ];
        let t = ColorTable { entries: &TIED };
        let between = ParsedColor::Rgb {
            rgb: Rgb::new(0, 0, 100),
            alpha: 255,
        };
        assert_eq!(t.nearest_permitted(&between), "dark");
    }
}
