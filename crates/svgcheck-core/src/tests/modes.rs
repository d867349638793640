use super::*;

const MESSY: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="200" height="100">
  <title>messy</title>
  <image href="x.png" width="10" height="10"/>
  <g style="fill: RED; stroke:#000; filter: blur(2px)" onclick="x()">
    <rect id="r" x="10" y="10" width="20" height="20" fill="#FFF" font-family="Helvetica, sans-serif"/>
    <text x="5" y="50" text-anchor="bogus">Hi<rect/></text>
    <use xlink:href="#r" x="30"/>
  </g>
  stray
</svg>"##;

#[test]
fn repair_is_idempotent() {
    let (mut doc, first) = repair(MESSY);
    assert!(first.edits > 0);
    assert!(!first.is_fatal());
    let once = write::serialize(&doc);

    let second = check_tree(&mut doc, &CheckOptions::repair());
    assert_eq!(second.edits, 0);
    assert!(second.is_clean(), "{}", second.diagnostics.render(OutputPolicy::default()));
    assert_eq!(write::serialize(&doc), once);
}

#[test]
fn serialized_repair_round_trips() {
    let (doc, _) = repair(MESSY);
    let once = write::serialize(&doc);

    let mut reparsed = load(&once);
    let outcome = run(&mut reparsed, &CheckOptions::repair());
    assert_eq!(outcome.report.edits, 0);
    assert!(outcome.passed(), "{:?}", outcome.validation.errors);
    assert_eq!(write::serialize(&reparsed), once);
}

#[test]
fn check_only_reports_the_same_findings_without_editing() {
    let (_, repaired) = repair(MESSY);

    let mut doc = load(MESSY);
    let before = write::serialize(&doc);
    let checked = check_tree(&mut doc, &CheckOptions::check_only());

    assert_eq!(write::serialize(&doc), before);
    assert_eq!(checked.edits, repaired.edits);
    assert_eq!(findings(&checked), findings(&repaired));
}

#[test]
fn check_only_viewbox_ignores_content_a_repair_would_remove() {
    let text = format!(
        "<svg xmlns=\"{SVG_NS}\"><rect width=\"10\" height=\"10\"/><text x=\"0\" y=\"0\"><rect x=\"500\" width=\"1\" height=\"1\"/></text></svg>"
    );
    let (repaired_doc, _) = repair(&text);
    let mut doc = load(&text);
    let report = check_tree(&mut doc, &CheckOptions::check_only());

    let synthesized = report
        .diagnostics
        .all()
        .iter()
        .find(|d| d.code == Code::ViewBoxSynthesized)
        .unwrap();
    let expected = attr(&repaired_doc, "svg", "viewBox").unwrap();
    assert!(synthesized.message.contains(expected), "{}", synthesized.message);
}

#[test]
fn quiet_and_always_emit_filter_informational_findings() {
    let (_, report) = repair(&drawing(
        "<rect width=\"1\" height=\"1\" fill=\"#000\" stroke=\"red\"/>",
    ));
    let sink = &report.diagnostics;

    let quiet = OutputPolicy {
        quiet: true,
        always_emit: false,
    };
    let shown: Vec<_> = sink.visible(quiet).iter().map(|d| d.severity).collect();
    assert_eq!(shown, [Severity::Warning]);

    let normal: Vec<_> = sink
        .visible(OutputPolicy::default())
        .iter()
        .map(|d| d.code)
        .collect();
    assert_eq!(normal, [Code::ColorCanonicalized, Code::ColorDisallowed]);

    assert_eq!(sink.general().count(), 1);
    assert_eq!(sink.errors().count(), 1);
}

#[test]
fn clean_runs_hide_info_unless_always_emit() {
    let (_, report) = repair(&drawing("<rect width=\"1\" height=\"1\" fill=\"#000\"/>"));
    assert!(report.is_clean());
    assert!(report.diagnostics.visible(OutputPolicy::default()).is_empty());

    let always = OutputPolicy {
        quiet: false,
        always_emit: true,
    };
    assert_eq!(report.diagnostics.visible(always).len(), 1);
}

#[test]
fn runs_do_not_share_state() {
    let text = drawing("<rect id=\"a\" width=\"1\" height=\"1\"/>");
    let (_, first) = repair(&text);
    let (_, second) = repair(&text);
    assert!(findings(&first).is_empty());
    assert!(findings(&second).is_empty());
}
