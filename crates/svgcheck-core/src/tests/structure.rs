use super::*;
use crate::dom::XLINK_NS;

#[test]
fn forbidden_elements_are_removed_with_their_subtree() {
    let (doc, report) = repair(&drawing(
        "<image href=\"x.png\" width=\"1\" height=\"1\"/><foreignObject><rect/></foreignObject><rect width=\"1\" height=\"1\"/>",
    ));
    assert_eq!(
        findings(&report),
        [
            (Severity::Warning, Code::ForbiddenElement),
            (Severity::Warning, Code::ForbiddenElement)
        ]
    );
    assert!(find(&doc, "image").is_none());
    assert!(find(&doc, "foreignObject").is_none());
    assert!(find(&doc, "rect").is_some());
    assert_eq!(report.edits, 2);
    assert!(doc.links_are_consistent());
}

#[test]
fn misplaced_profile_elements_are_removed() {
    let (doc, report) = repair(&drawing("<text x=\"1\" y=\"1\">a<rect/><tspan>b</tspan></text>"));
    assert_eq!(findings(&report), [(Severity::Warning, Code::MisplacedElement)]);
    assert!(find(&doc, "rect").is_none());
    assert!(find(&doc, "tspan").is_some());
}

#[test]
fn unknown_attributes_and_bad_keywords_are_dropped() {
    let (doc, report) = repair(&drawing(
        "<path d=\"M0 0L1 1\" onclick=\"go()\" stroke-linecap=\"pointy\" fill-rule=\"evenodd\" x=\"3\"/>",
    ));
    assert_eq!(
        findings(&report),
        [
            (Severity::Warning, Code::UnknownAttribute),
            (Severity::Warning, Code::InvalidValue),
            (Severity::Warning, Code::UnknownAttribute)
        ]
    );
    let path = doc.element(find(&doc, "path").unwrap()).unwrap();
    let names: Vec<_> = path.attributes.keys().map(|k| k.local.as_str()).collect();
    assert_eq!(names, ["d", "fill-rule"]);
}

#[test]
fn foreign_namespaces_are_removed() {
    let (doc, report) = repair(&format!(
        "<svg xmlns=\"{SVG_NS}\" xmlns:ink=\"urn:inkscape\" viewBox=\"0 0 1 1\" ink:version=\"1\">\
         <ink:layer/><rect width=\"1\" height=\"1\"/></svg>"
    ));
    assert_eq!(
        findings(&report),
        [
            (Severity::Warning, Code::ForeignNamespace),
            (Severity::Warning, Code::ForeignNamespace)
        ]
    );
    assert!(find(&doc, "layer").is_none());
    assert_eq!(doc.element(doc.root_element().unwrap()).unwrap().attributes.len(), 1);
}

#[test]
fn xlink_attributes_are_in_scope() {
    let (_, report) = repair(&format!(
        "<svg xmlns=\"{SVG_NS}\" xmlns:xlink=\"{XLINK_NS}\" viewBox=\"0 0 1 1\">\
         <rect id=\"a\" width=\"1\" height=\"1\"/><use xlink:href=\"#a\"/></svg>"
    ));
    assert!(findings(&report).is_empty());
}

#[test]
fn font_families_reduce_to_generic_names() {
    let (doc, report) = repair(&drawing(
        "<text x=\"0\" y=\"0\" font-family=\"Helvetica, Arial, sans-serif\">a</text>\
         <text x=\"0\" y=\"0\" font-family=\"Comic Sans\">b</text>",
    ));
    assert_eq!(
        findings(&report),
        [
            (Severity::Warning, Code::FontFamilySubstituted),
            (Severity::Warning, Code::InvalidValue)
        ]
    );
    assert_eq!(attr(&doc, "text", "font-family"), Some("sans-serif"));
}

#[test]
fn style_declarations_that_cannot_be_promoted_are_dropped() {
    let (doc, report) = repair(&drawing(
        "<rect width=\"1\" height=\"1\" fill=\"black\" style=\"fill:white; filter:url(#f); garbage\"/>",
    ));
    assert_eq!(
        findings(&report),
        [
            (Severity::Warning, Code::StyleDropped),
            (Severity::Warning, Code::StyleDropped),
            (Severity::Warning, Code::StyleDropped)
        ]
    );
    assert_eq!(attr(&doc, "rect", "fill"), Some("black"));
    assert_eq!(attr(&doc, "rect", "style"), None);
}

#[test]
fn stray_text_is_removed_where_no_text_is_allowed() {
    let (doc, report) = repair(&drawing("stray<g>  </g><text x=\"0\" y=\"0\">kept</text>"));
    assert_eq!(findings(&report), [(Severity::Warning, Code::UnexpectedText)]);
    let root = doc.root_element().unwrap();
    let texts: Vec<_> = doc
        .children(root)
        .iter()
        .filter_map(|&c| doc.text(c))
        .collect();
    assert!(texts.iter().all(|t| t.trim().is_empty()), "{texts:?}");
}

#[test]
fn control_characters_in_text_are_fatal() {
    let (_, report) = repair(&drawing("<text x=\"0\" y=\"0\">a&#x85;b</text>"));
    assert_eq!(findings(&report), [(Severity::Fatal, Code::InvalidCharacter)]);
    assert!(report.diagnostics.all()[0].message.contains("U+0085"));
}

#[test]
fn unqualified_root_gets_the_svg_namespace() {
    let mut doc = load("<svg viewBox=\"0 0 10 10\"><g><rect width=\"1\" height=\"1\"/></g></svg>");
    let outcome = run(&mut doc, &CheckOptions::repair());

    assert_eq!(
        findings(&outcome.report),
        [(Severity::Info, Code::NamespaceAssigned)]
    );
    assert!(outcome.validation.valid, "{:?}", outcome.validation.errors);
    for local in ["svg", "g", "rect"] {
        let el = doc.element(find(&doc, local).unwrap()).unwrap();
        assert!(el.is_svg(local), "{local}");
    }
    let out = write::serialize(&doc);
    assert!(out.contains(&format!("<svg xmlns=\"{SVG_NS}\" viewBox=\"0 0 10 10\">")), "{out}");
}

#[test]
fn keyword_whitespace_trim_is_reported() {
    let text = drawing("<path d=\"M0 0 L10 10\" fill-rule=\" evenodd\"/>");
    let mut doc = load(&text);
    let report = check_tree(&mut doc, &CheckOptions::check_only());
    assert_eq!(findings(&report), [(Severity::Info, Code::ValueNormalized)]);
    assert_eq!(report.edits, 1);
    assert_eq!(attr(&doc, "path", "fill-rule"), Some(" evenodd"));

    let (doc, report) = repair(&text);
    assert_eq!(findings(&report), [(Severity::Info, Code::ValueNormalized)]);
    assert_eq!(attr(&doc, "path", "fill-rule"), Some("evenodd"));
}
