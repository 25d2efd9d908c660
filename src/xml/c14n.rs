//! Canonical XML 1.0 (inclusive, without comments) serialization.
//!
//! Covers what the request documents use: default and prefixed namespace
//! declarations, attributes, text. Empty elements are written as start/end
//! pairs, attributes are sorted by namespace URI then local name, and the
//! apex of a canonicalized subtree carries every namespace in scope.
//!
//! roxmltree does not keep prefixes, so each name is written with the first
//! in-scope prefix bound to its namespace (the default one when it matches).

use std::collections::BTreeMap;

use roxmltree::Node;

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Prefix (`""` for the default namespace) to URI.
type Scope<'a> = BTreeMap<&'a str, &'a str>;

/// Canonical form of `element`, with the namespace context inherited from
/// its ancestors.
pub fn canonicalize(element: Node<'_, '_>) -> String {
    let mut out = String::new();
    write_element(element, &Scope::new(), &mut out);
    out
}

fn in_scope<'a>(el: Node<'a, '_>) -> Scope<'a> {
    el.namespaces()
        .filter(|ns| ns.name() != Some("xml"))
        .filter_map(|ns| {
            let uri = el.lookup_namespace_uri(ns.name())?;
            Some((ns.name().unwrap_or(""), uri))
        })
        .collect()
}

fn prefix_for<'a>(scope: &Scope<'a>, uri: &str, allow_default: bool) -> Option<&'a str> {
    if uri == XML_NAMESPACE {
        return Some("xml");
    }
    if allow_default && scope.get("").is_some_and(|u| *u == uri) {
        return None;
    }
    scope
        .iter()
        .find(|(prefix, u)| !prefix.is_empty() && **u == uri)
        .map(|(prefix, _)| *prefix)
}

fn push_qualified(prefix: Option<&str>, local: &str, out: &mut String) {
    if let Some(prefix) = prefix {
        out.push_str(prefix);
        out.push(':');
    }
    out.push_str(local);
}

fn write_element<'a>(el: Node<'a, '_>, rendered: &Scope<'a>, out: &mut String) {
    let scope = in_scope(el);
    let tag = el.tag_name();
    let prefix = tag.namespace().and_then(|ns| prefix_for(&scope, ns, true));

    out.push('<');
    push_qualified(prefix, tag.name(), out);

    let mut now_rendered = rendered.clone();
    let default = scope.get("").copied().unwrap_or("");
    if default != rendered.get("").copied().unwrap_or("") {
        out.push_str(" xmlns=\"");
        escape_attr(default, out);
        out.push('"');
        now_rendered.insert("", default);
    }
    for (&ns_prefix, &uri) in scope.iter().filter(|(p, _)| !p.is_empty()) {
        if rendered.get(ns_prefix) == Some(&uri) {
            continue;
        }
        out.push_str(" xmlns:");
        out.push_str(ns_prefix);
        out.push_str("=\"");
        escape_attr(uri, out);
        out.push('"');
        now_rendered.insert(ns_prefix, uri);
    }

    let mut attrs: Vec<_> = el.attributes().collect();
    attrs.sort_by(|a, b| {
        (a.namespace().unwrap_or(""), a.name()).cmp(&(b.namespace().unwrap_or(""), b.name()))
    });
    for attr in attrs {
        out.push(' ');
        let attr_prefix = attr.namespace().and_then(|ns| prefix_for(&scope, ns, false));
        push_qualified(attr_prefix, attr.name(), out);
        out.push_str("=\"");
        escape_attr(attr.value(), out);
        out.push('"');
    }
    out.push('>');

    for child in el.children() {
        if child.is_element() {
            write_element(child, &now_rendered, out);
        } else if let Some(text) = child.text().filter(|_| child.is_text()) {
            escape_text(text, out);
        }
    }

    out.push_str("</");
    push_qualified(prefix, tag.name(), out);
    out.push('>');
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}
