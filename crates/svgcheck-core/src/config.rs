use crate::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Report every finding a repair run would produce, without touching the tree.
    #[default]
    CheckOnly,
    /// Apply every fix the policy allows.
    Repair,
}

/// Numeric policy constants used by the automatic fixes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RepairPolicy {
    /// Margin added on every side of synthesized viewBoxes, as a fraction of the larger side
    /// of the content bounds.
    pub viewbox_margin_ratio: f64,
    /// Lower bound on that margin, in user units.
    pub viewbox_min_margin: f64,
    /// `[min-x, min-y, width, height]` used when there is no drawable content at all.
    pub default_viewbox: [f64; 4],
    /// Font size assumed for text without an explicit `font-size`.
    pub default_font_size: f64,
    /// Average glyph advance as a fraction of the font size.
    pub glyph_advance_ratio: f64,
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self {
            viewbox_margin_ratio: 0.05,
            viewbox_min_margin: 1.0,
            default_viewbox: [0.0, 0.0, 100.0, 100.0],
            default_font_size: 16.0,
            glyph_advance_ratio: 0.6,
        }
    }
}

impl RepairPolicy {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckOptions {
    pub mode: Mode,
    pub policy: RepairPolicy,
}

impl CheckOptions {
    pub fn repair() -> Self {
        Self {
            mode: Mode::Repair,
            ..Default::default()
        }
    }

    pub fn check_only() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: RepairPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn repairing(&self) -> bool {
        self.mode == Mode::Repair
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_json_overrides_only_named_fields() {
        let policy = RepairPolicy::from_json(r#"{ "viewboxMarginRatio": 0.1 }"#).unwrap();
        assert_eq!(policy.viewbox_margin_ratio, 0.1);
        assert_eq!(policy.default_viewbox, [0.0, 0.0, 100.0, 100.0]);
    }

    #[test]
    fn policy_json_rejects_wrong_types() {
        assert!(RepairPolicy::from_json(r#"{ "defaultFontSize": "big" }"#).is_err());
    }
}
