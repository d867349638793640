#![forbid(unsafe_code)]

//! Validation and repair of SVG drawings against the RFC 7996 archival profile.
//!
//! The pipeline is:
//! - [`loader`] parses a file (resolving XInclude) into a [`Document`] arena,
//! - [`check_tree`] walks it once, reporting findings and, in repair mode, fixing the tree,
//! - [`write::serialize`] writes the result back out,
//! - [`grammar::validate`] checks the result against the profile grammar.
//!
//! Findings are data ([`Diagnostic`]); only unreadable input is an [`Error`].

pub mod cache;
pub mod colors;
pub mod config;
pub mod diagnostics;
pub mod dom;
pub mod engine;
pub mod error;
pub mod geom;
pub mod grammar;
pub mod loader;
pub mod profile;
pub mod write;

pub use cache::{DirCache, IncludeCache, MemoryCache};
pub use colors::{Classification, ColorTable};
pub use config::{CheckOptions, Mode, RepairPolicy};
pub use diagnostics::{Category, Code, Diagnostic, DiagnosticSink, OutputPolicy, Severity, Stream};
pub use dom::{Document, NodeId};
pub use engine::{CheckReport, check_tree};
pub use error::{Error, Result};
pub use grammar::{SchemaSelector, ValidationReport};
pub use loader::{LoadOptions, Loader};

/// Result of [`run`]: the engine report plus the grammar verdict for the resulting tree.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub report: CheckReport,
    pub validation: ValidationReport,
}

impl Outcome {
    /// No warning, no fatal finding and a grammar-valid tree.
    pub fn passed(&self) -> bool {
        self.report.is_clean() && self.validation.valid
    }

    /// Engine findings followed by grammar errors, in emission order.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.report
            .diagnostics
            .all()
            .iter()
            .chain(self.validation.errors.iter())
    }
}

/// Runs the engine over `doc` and validates the result.
pub fn run(doc: &mut Document, options: &CheckOptions) -> Outcome {
    let report = check_tree(doc, options);
    let validation = grammar::validate(doc, SchemaSelector::for_document(doc));
    Outcome { report, validation }
}

#[cfg(test)]
mod tests;
