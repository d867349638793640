use std::path::{Path, PathBuf};
use svgcheck_core::colors::ColorTable;
use svgcheck_core::dom::Document;
use svgcheck_core::loader::{LoadOptions, load_file};
use svgcheck_core::{CheckOptions, Code, Error, Severity, check_tree, run, write};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("fixtures")
        .join(name)
}

fn load(name: &str) -> Document {
    let path = fixture(name);
    load_file(&path, LoadOptions::default())
        .unwrap_or_else(|e| panic!("failed to load {}: {e}", path.display()))
}

fn colors_in(doc: &Document) -> Vec<String> {
    doc.descendants(doc.document_node())
        .into_iter()
        .filter_map(|n| doc.element(n))
        .flat_map(|el| {
            ["fill", "stroke"]
                .into_iter()
                .filter_map(|a| el.attr(a).map(str::to_string))
        })
        .collect()
}

#[test]
fn conforming_drawing_passes_untouched() {
    let mut doc = load("circle.svg");
    let before = write::serialize(&doc);
    let outcome = run(&mut doc, &CheckOptions::repair());

    assert!(outcome.passed(), "{:?}", outcome.validation.errors);
    assert!(outcome.report.diagnostics.all().is_empty());
    assert_eq!(outcome.report.edits, 0);
    assert_eq!(write::serialize(&doc), before);
}

#[test]
fn colors_fixture_repairs_to_the_palette() {
    let mut doc = load("colors.svg");
    let outcome = run(&mut doc, &CheckOptions::repair());

    let table = ColorTable::profile();
    for value in colors_in(&doc) {
        assert!(table.is_canonical(&value), "{value} left in output");
    }
    assert_eq!(outcome.report.diagnostics.count(Severity::Warning), 3);
    assert!(!outcome.report.is_fatal());
    assert!(outcome.validation.valid, "{:?}", outcome.validation.errors);
}

#[test]
fn missing_viewbox_fixture_gets_one() {
    let mut doc = load("no-viewbox.svg");
    let outcome = run(&mut doc, &CheckOptions::repair());

    let codes: Vec<_> = outcome
        .report
        .diagnostics
        .all()
        .iter()
        .map(|d| d.code)
        .collect();
    assert_eq!(codes, [Code::ViewBoxSynthesized]);
    assert!(write::serialize(&doc).contains("viewBox=\"-1 -1 12 7\""));
    assert!(outcome.passed());
}

#[test]
fn unparseable_color_fixture_is_fatal() {
    let mut doc = load("unparseable-color.svg");
    let outcome = run(&mut doc, &CheckOptions::repair());
    assert!(outcome.report.is_fatal());
    assert!(write::serialize(&doc).contains("fill=\"not-a-color\""));
    assert!(!outcome.passed());
}

#[test]
fn malformed_xml_is_a_load_error() {
    let err = load_file(&fixture("malformed.svg"), LoadOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Xml { .. }), "{err}");
    assert!(err.to_string().contains("malformed.svg"));
}

#[test]
fn utf8_text_survives_two_repair_passes() {
    let mut doc = load("utf8.svg");
    check_tree(&mut doc, &CheckOptions::repair());
    let once = write::serialize(&doc);
    assert!(once.contains("Grüße, 世界 &amp; ∑"));

    let mut again = svgcheck_core::loader::load_str(&once, "utf8.svg", LoadOptions::default())
        .unwrap();
    let second = check_tree(&mut again, &CheckOptions::repair());
    assert_eq!(second.edits, 0);
    assert_eq!(write::serialize(&again), once);
}

#[test]
fn host_document_includes_and_checks_every_drawing() {
    let mut doc = load("rfc.xml");
    let report = check_tree(&mut doc, &CheckOptions::repair());
    assert_eq!(report.svg_roots, 2);

    let out = write::serialize(&doc);
    assert!(out.contains("<!DOCTYPE rfc SYSTEM \"rfc2629-xhtml.ent\">"));
    assert!(out.contains("id=\"dot\""), "included drawing missing");
    assert!(out.contains("stroke=\"black\""));
    assert!(!out.contains("xi:include"));
}

#[test]
fn host_document_without_xinclude_keeps_the_directive() {
    let options = LoadOptions {
        xinclude: false,
        ..LoadOptions::default()
    };
    let mut doc = load_file(&fixture("rfc.xml"), options).unwrap();
    let report = check_tree(&mut doc, &CheckOptions::check_only());
    assert_eq!(report.svg_roots, 1);
    assert!(write::serialize(&doc).contains("<xi:include href=\"circle.svg\"/>"));
    assert!(
        report
            .diagnostics
            .all()
            .iter()
            .all(|d| d.severity != Severity::Fatal)
    );
}
