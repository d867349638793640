//! Parses XML into a [`Document`] and resolves XInclude directives.

use crate::cache::IncludeCache;
use crate::dom::{Document, Element, ExpandedName, Location, Namespace, NodeId, NodeKind};
use crate::dom::XINCLUDE_NS;
use crate::error::{Error, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Resolve `xi:include` elements. When off they stay in the tree untouched.
    pub xinclude: bool,
    pub strip_comments: bool,
    pub strip_processing_instructions: bool,
    /// Allow remote (`http`/`https`) include targets. They are served from the include cache.
    pub network: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            xinclude: true,
            strip_comments: false,
            strip_processing_instructions: false,
            network: true,
        }
    }
}

fn doctype_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!DOCTYPE[^\[>]*(\[.*?\])?\s*>").expect("valid regex"))
}

pub struct Loader<'c> {
    options: LoadOptions,
    cache: Option<&'c dyn IncludeCache>,
}

impl<'c> Loader<'c> {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: &'c dyn IncludeCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn load_file(&self, path: &Path) -> Result<Document> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut stack = vec![include_key(path)];
        self.build(&text, Arc::from(path.display().to_string()), &base, &mut stack)
    }

    /// Parses `text`. Relative include targets resolve against the current directory.
    pub fn load_str(&self, text: &str, name: &str) -> Result<Document> {
        let mut stack = Vec::new();
        self.build(text, Arc::from(name), Path::new(""), &mut stack)
    }

    fn build(
        &self,
        text: &str,
        file: Arc<str>,
        base: &Path,
        stack: &mut Vec<String>,
    ) -> Result<Document> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let opts = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..roxmltree::ParsingOptions::default()
        };
        let input = roxmltree::Document::parse_with_options(text, opts).map_err(|e| Error::Xml {
            file: file.to_string(),
            message: e.to_string(),
        })?;

        let mut doc = Document::new(file.clone());
        let root_start = input.root_element().range().start;
        doc.doctype = doctype_regex()
            .find(&text[..root_start])
            .map(|m| m.as_str().to_string());

        let top = doc.document_node();
        for child in input.root().children() {
            self.convert(&input, text, child, top, &mut doc, &file);
        }
        tracing::debug!(%file, nodes = doc.descendants(top).len(), "parsed");

        if self.options.xinclude {
            self.resolve_includes(&mut doc, base, stack)?;
        }
        Ok(doc)
    }

    fn convert(
        &self,
        input: &roxmltree::Document<'_>,
        text: &str,
        node: roxmltree::Node<'_, '_>,
        parent: NodeId,
        doc: &mut Document,
        file: &Arc<str>,
    ) {
        let pos = input.text_pos_at(node.range().start);
        let loc = Location::new(file.clone(), pos.row, pos.col);
        let kind = match node.node_type() {
            roxmltree::NodeType::Element => NodeKind::Element(element_from(node, text)),
            roxmltree::NodeType::Text => NodeKind::Text(node.text().unwrap_or_default().to_string()),
            roxmltree::NodeType::Comment => {
                if self.options.strip_comments {
                    return;
                }
                NodeKind::Comment(node.text().unwrap_or_default().to_string())
            }
            roxmltree::NodeType::PI => {
                if self.options.strip_processing_instructions {
                    return;
                }
                let Some(pi) = node.pi() else {
                    return;
                };
                NodeKind::ProcessingInstruction {
                    target: pi.target.to_string(),
                    value: pi.value.map(str::to_string),
                }
            }
            roxmltree::NodeType::Root => return,
        };
        let id = doc.append(parent, kind, loc);
        for child in node.children() {
            self.convert(input, text, child, id, doc, file);
        }
    }

    fn resolve_includes(
        &self,
        doc: &mut Document,
        base: &Path,
        stack: &mut Vec<String>,
    ) -> Result<()> {
        let top = doc.document_node();
        let includes: Vec<NodeId> = doc
            .descendants(top)
            .into_iter()
            .filter(|&n| is_xinclude(doc, n, "include"))
            .collect();

        for include in includes {
            // Includes inside a fallback that was not needed are gone by now.
            if !doc.is_attached(include) {
                continue;
            }
            let Some(el) = doc.element(include) else {
                continue;
            };
            let href = el.attr("href").unwrap_or_default().to_string();
            let parse_text = el.attr("parse") == Some("text");
            let loc = doc.location(include).clone();

            match self.fetch(&href, base, parse_text, stack, &loc) {
                Ok(Fetched::Text(t)) => {
                    let node = doc.append(top, NodeKind::Text(t), loc.clone());
                    doc.replace_with(include, &[node]);
                }
                Ok(Fetched::Xml(sub)) => {
                    let Some(sub_root) = sub.root_element() else {
                        continue;
                    };
                    let node = doc.import(&sub, sub_root);
                    doc.replace_with(include, &[node]);
                }
                Err(e @ Error::IncludeLoop { .. }) => return Err(e),
                Err(e) => {
                    let fallback = doc
                        .children(include)
                        .iter()
                        .copied()
                        .find(|&c| is_xinclude(doc, c, "fallback"));
                    let Some(fallback) = fallback else {
                        return Err(e);
                    };
                    tracing::debug!(%href, error = %e, "include failed; using fallback");
                    let content = doc.children(fallback).to_vec();
                    doc.replace_with(include, &content);
                }
            }
        }
        Ok(())
    }

    fn fetch(
        &self,
        href: &str,
        base: &Path,
        parse_text: bool,
        stack: &mut Vec<String>,
        loc: &Location,
    ) -> Result<Fetched> {
        let fail = |reason: String| Error::Include {
            file: loc.file.to_string(),
            line: loc.line,
            href: href.to_string(),
            reason,
        };
        if href.is_empty() {
            return Err(fail("missing href".to_string()));
        }

        let remote = href.starts_with("http://") || href.starts_with("https://");
        let (key, text, file_name, sub_base) = if remote {
            if !self.options.network {
                return Err(fail("network access is disabled".to_string()));
            }
            let Some(bytes) = self.cache.map(|c| c.get(href)).transpose()?.flatten() else {
                return Err(fail("not available in the include cache".to_string()));
            };
            let text = String::from_utf8(bytes).map_err(|_| fail("not UTF-8".to_string()))?;
            (href.to_string(), text, href.to_string(), PathBuf::new())
        } else {
            let path = base.join(href);
            let text = std::fs::read_to_string(&path).map_err(|e| fail(e.to_string()))?;
            let sub_base = path.parent().map(Path::to_path_buf).unwrap_or_default();
            (include_key(&path), text, path.display().to_string(), sub_base)
        };

        if parse_text {
            return Ok(Fetched::Text(text));
        }
        if stack.contains(&key) {
            return Err(Error::IncludeLoop {
                file: loc.file.to_string(),
                line: loc.line,
                href: href.to_string(),
            });
        }
        tracing::debug!(%href, depth = stack.len(), "including");
        stack.push(key);
        let sub = self.build(&text, Arc::from(file_name), &sub_base, stack);
        stack.pop();
        Ok(Fetched::Xml(sub?))
    }
}

enum Fetched {
    Text(String),
    Xml(Document),
}

fn is_xinclude(doc: &Document, id: NodeId, local: &str) -> bool {
    doc.element(id)
        .is_some_and(|el| el.name.is(Some(XINCLUDE_NS), local))
}

fn include_key(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

fn element_from(node: roxmltree::Node<'_, '_>, text: &str) -> Element {
    let tag = node.tag_name();
    let mut el = Element::new(ExpandedName::new(tag.namespace(), tag.name()));

    // The prefix as written in the start tag.
    let start = node.range().start + 1;
    let qname: &str = text[start..]
        .split(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .next()
        .unwrap_or_default();
    el.prefix = qname.split_once(':').map(|(p, _)| p.to_string());

    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|p| p.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();
    for ns in node.namespaces() {
        if ns.name() == Some("xml") || inherited.contains(&(ns.name(), ns.uri())) {
            continue;
        }
        el.namespaces.push(Namespace {
            prefix: ns.name().map(str::to_string),
            uri: ns.uri().to_string(),
        });
    }

    for attr in node.attributes() {
        el.attributes.insert(
            ExpandedName::new(attr.namespace(), attr.name()),
            attr.value().to_string(),
        );
    }
    el
}

/// Loads a file with the given options and no include cache.
pub fn load_file(path: &Path, options: LoadOptions) -> Result<Document> {
    Loader::new(options).load_file(path)
}

pub fn load_str(text: &str, name: &str, options: LoadOptions) -> Result<Document> {
    Loader::new(options).load_str(text, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::dom::{SVG_NS, XLINK_NS, XML_NS};

    fn opts() -> LoadOptions {
        LoadOptions::default()
    }

    #[test]
    fn keeps_whitespace_locations_and_declarations() {
        let doc = load_str(
            "<svg xmlns=\"http://www.w3.org/2000/svg\"\n     xmlns:xlink=\"http://www.w3.org/1999/xlink\">\n  <use xlink:href=\"#a\"/>\n</svg>",
            "t.svg",
            opts(),
        )
        .unwrap();
        let root = doc.root_element().unwrap();
        let el = doc.element(root).unwrap();
        assert!(el.is_svg("svg"));
        assert_eq!(el.namespaces.len(), 2);

        let children = doc.children(root);
        assert_eq!(children.len(), 3);
        assert_eq!(doc.text(children[0]), Some("\n  "));
        let use_el = doc.element(children[1]).unwrap();
        assert_eq!(use_el.attr_ns(XLINK_NS, "href"), Some("#a"));
        assert!(use_el.namespaces.is_empty());
        assert_eq!(doc.location(children[1]).line, 3);
    }

    #[test]
    fn captures_doctype_and_strips_comments_on_request() {
        let text = "<?xml version=\"1.0\"?>\n<!DOCTYPE rfc [\n <!ENTITY x \"y\">\n]>\n<!-- c --><rfc>&x;</rfc>";
        let doc = load_str(
            text,
            "rfc.xml",
            LoadOptions {
                strip_comments: true,
                ..opts()
            },
        )
        .unwrap();
        assert_eq!(
            doc.doctype.as_deref(),
            Some("<!DOCTYPE rfc [\n <!ENTITY x \"y\">\n]>")
        );
        let top = doc.children(doc.document_node());
        assert_eq!(top.len(), 1);
        let root = doc.root_element().unwrap();
        assert_eq!(doc.text(doc.children(root)[0]), Some("y"));
    }

    #[test]
    fn records_prefixed_element_names() {
        let doc = load_str(
            &format!("<s:svg xmlns:s=\"{SVG_NS}\"><s:rect/></s:svg>"),
            "p.svg",
            opts(),
        )
        .unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.element(root).unwrap().prefix.as_deref(), Some("s"));
    }

    #[test]
    fn remote_includes_come_from_the_cache() {
        let mut cache = MemoryCache::new();
        cache
            .put(
                "https://example.org/fig.svg",
                format!("<svg xmlns=\"{SVG_NS}\"/>").as_bytes(),
            )
            .unwrap();
        let text = format!(
            "<doc xmlns:xi=\"{XINCLUDE_NS}\"><xi:include href=\"https://example.org/fig.svg\"/></doc>"
        );

        let doc = Loader::new(opts())
            .with_cache(&cache)
            .load_str(&text, "d.xml")
            .unwrap();
        let root = doc.root_element().unwrap();
        let child = doc.children(root)[0];
        assert!(doc.element(child).unwrap().is_svg("svg"));

        let offline = LoadOptions {
            network: false,
            ..opts()
        };
        let err = Loader::new(offline)
            .with_cache(&cache)
            .load_str(&text, "d.xml")
            .unwrap_err();
        assert!(matches!(err, Error::Include { .. }), "{err}");
    }

    #[test]
    fn failed_include_uses_fallback() {
        let text = format!(
            "<doc xmlns:xi=\"{XINCLUDE_NS}\"><xi:include href=\"missing.xml\"><xi:fallback><p>gone</p></xi:fallback></xi:include></doc>"
        );
        let doc = load_str(&text, "d.xml", opts()).unwrap();
        let root = doc.root_element().unwrap();
        let p = doc.children(root)[0];
        assert_eq!(doc.element(p).unwrap().name.local, "p");
        assert!(doc.links_are_consistent());
    }

    #[test]
    fn include_cycles_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.xml");
        let b = dir.path().join("b.xml");
        std::fs::write(
            &a,
            format!("<a xmlns:xi=\"{XINCLUDE_NS}\"><xi:include href=\"b.xml\"/></a>"),
        )
        .unwrap();
        std::fs::write(
            &b,
            format!("<b xmlns:xi=\"{XINCLUDE_NS}\"><xi:include href=\"a.xml\"/></b>"),
        )
        .unwrap();

        let err = load_file(&a, opts()).unwrap_err();
        assert!(matches!(err, Error::IncludeLoop { .. }), "{err}");
    }

    #[test]
    fn text_includes_become_text_nodes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("note.txt"), "hello <world>").unwrap();
        let host = dir.path().join("host.xml");
        std::fs::write(
            &host,
            format!("<a xmlns:xi=\"{XINCLUDE_NS}\"><xi:include href=\"note.txt\" parse=\"text\"/></a>"),
        )
        .unwrap();

        let doc = load_file(&host, opts()).unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.text(doc.children(root)[0]), Some("hello <world>"));
    }

    #[test]
    fn xml_namespace_is_never_redeclared() {
        let doc = load_str("<svg xml:space=\"preserve\"/>", "x.svg", opts()).unwrap();
        let el = doc.element(doc.root_element().unwrap()).unwrap();
        assert!(el.namespaces.is_empty());
        assert_eq!(el.attr_ns(XML_NS, "space"), Some("preserve"));
    }
}
