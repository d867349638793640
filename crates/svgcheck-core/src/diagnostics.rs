//! Severity-tagged findings and the per-run sink that collects them.

use crate::dom::Location;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Fatal,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Structural,
    Referential,
    Geometric,
    Chromatic,
    Textual,
    Grammar,
}

/// Stable message codes. The string forms are part of the output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Code {
    ForbiddenElement,
    ForeignNamespace,
    MisplacedElement,
    UnexpectedText,
    UnknownAttribute,
    InvalidValue,
    ValueNormalized,
    FontFamilySubstituted,
    StylePromoted,
    StyleDropped,
    NamespaceAssigned,
    DuplicateId,
    DanglingReference,
    CircularReference,
    ViewBoxSynthesized,
    ViewBoxDegenerate,
    ViewBoxDefaulted,
    ColorCanonicalized,
    ColorDisallowed,
    ColorUnparseable,
    InvalidCharacter,
    SchemaViolation,
}

impl Code {
    pub fn as_str(self) -> &'static str {
        match self {
            Code::ForbiddenElement => "forbidden-element",
            Code::ForeignNamespace => "foreign-namespace",
            Code::MisplacedElement => "misplaced-element",
            Code::UnexpectedText => "unexpected-text",
            Code::UnknownAttribute => "unknown-attribute",
            Code::InvalidValue => "invalid-value",
            Code::ValueNormalized => "value-normalized",
            Code::FontFamilySubstituted => "font-family-substituted",
            Code::StylePromoted => "style-promoted",
            Code::StyleDropped => "style-dropped",
            Code::NamespaceAssigned => "namespace-assigned",
            Code::DuplicateId => "duplicate-id",
            Code::DanglingReference => "dangling-reference",
            Code::CircularReference => "circular-reference",
            Code::ViewBoxSynthesized => "viewbox-synthesized",
            Code::ViewBoxDegenerate => "viewbox-degenerate",
            Code::ViewBoxDefaulted => "viewbox-defaulted",
            Code::ColorCanonicalized => "color-canonicalized",
            Code::ColorDisallowed => "color-disallowed",
            Code::ColorUnparseable => "color-unparseable",
            Code::InvalidCharacter => "invalid-character",
            Code::SchemaViolation => "schema-violation",
        }
    }

    pub fn category(self) -> Category {
        match self {
            Code::ForbiddenElement
            | Code::ForeignNamespace
            | Code::MisplacedElement
            | Code::UnexpectedText
            | Code::UnknownAttribute
            | Code::InvalidValue
            | Code::ValueNormalized
            | Code::FontFamilySubstituted
            | Code::StylePromoted
            | Code::StyleDropped
            | Code::NamespaceAssigned => Category::Structural,
            Code::DuplicateId | Code::DanglingReference | Code::CircularReference => {
                Category::Referential
            }
            Code::ViewBoxSynthesized | Code::ViewBoxDegenerate | Code::ViewBoxDefaulted => {
                Category::Geometric
            }
            Code::ColorCanonicalized | Code::ColorDisallowed | Code::ColorUnparseable => {
                Category::Chromatic
            }
            Code::InvalidCharacter => Category::Textual,
            Code::SchemaViolation => Category::Grammar,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Code,
    pub message: String,
    pub location: Location,
}

impl Diagnostic {
    pub fn stream(&self) -> Stream {
        match self.severity {
            Severity::Info => Stream::General,
            Severity::Warning | Severity::Fatal => Stream::Error,
        }
    }
}

/// One line per finding: `file:line: severity: message [code]`.
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}: {} [{}]",
            self.location, self.severity, self.message, self.code
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    General,
    Error,
}

/// Which findings a presentation layer should show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputPolicy {
    /// Hide informational findings. Never hides warnings or fatal findings.
    pub quiet: bool,
    /// Show informational findings even when the run is otherwise clean.
    pub always_emit: bool,
}

/// Append-only, ordered record of one run's findings.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSink {
    entries: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::trace!(code = %diagnostic.code, "{}", diagnostic.message);
        self.entries.push(diagnostic);
    }

    pub fn emit(
        &mut self,
        severity: Severity,
        code: Code,
        location: &Location,
        message: impl Into<String>,
    ) {
        self.push(Diagnostic {
            severity,
            code,
            message: message.into(),
            location: location.clone(),
        });
    }

    pub fn info(&mut self, code: Code, location: &Location, message: impl Into<String>) {
        self.emit(Severity::Info, code, location, message);
    }

    pub fn warn(&mut self, code: Code, location: &Location, message: impl Into<String>) {
        self.emit(Severity::Warning, code, location, message);
    }

    pub fn fatal(&mut self, code: Code, location: &Location, message: impl Into<String>) {
        self.emit(Severity::Fatal, code, location, message);
    }

    pub fn extend(&mut self, other: DiagnosticSink) {
        self.entries.extend(other.entries);
    }

    pub fn all(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn stream(&self, stream: Stream) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.entries.iter().filter(move |d| d.stream() == stream)
    }

    pub fn general(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.stream(Stream::General)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.stream(Stream::Error)
    }

    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.entries.clone()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|d| d.severity == severity).count()
    }

    pub fn has_fatal(&self) -> bool {
        self.count(Severity::Fatal) > 0
    }

    /// No warnings and no fatal findings.
    pub fn is_clean(&self) -> bool {
        self.entries.iter().all(|d| d.severity == Severity::Info)
    }

    pub fn visible(&self, policy: OutputPolicy) -> Vec<&Diagnostic> {
        let show_info = !policy.quiet && (policy.always_emit || !self.is_clean());
        self.entries
            .iter()
            .filter(|d| d.severity != Severity::Info || show_info)
            .collect()
    }

    pub fn render(&self, policy: OutputPolicy) -> String {
        let mut out = String::new();
        for d in self.visible(policy) {
            out.push_str(&d.to_string());
            out.push('\n');
        }
        out
    }
}
