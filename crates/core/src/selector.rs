//! Selector resolver: derive a CSS selector that relocates an element on a
//! future, possibly regenerated, copy of the page.
//!
//! Priority (first applicable wins): `#id`, image source/alt, unique anchor
//! href, then a bounded structural path joined with `" > "`.

use crate::dom::{Document, NodeId};

/// Ancestor levels walked above the element for a structural path.
pub const MAX_ANCESTOR_LEVELS: usize = 4;

/// Class prefixes that are never used as anchors: the editor's own overlay
/// classes and generated CSS-in-JS hashes.
pub const SKIPPED_CLASS_PREFIXES: &[&str] = &["navlens-", "css-", "jsx-", "sc-"];

/// ARIA roles stable enough to anchor on.
pub const ROLE_WHITELIST: &[&str] = &["button", "link", "navigation", "main", "header", "footer"];

/// Derive a selector for `node`. Deterministic for a given document shape.
pub fn resolve(doc: &Document, node: NodeId) -> String {
    if let Some(id) = non_empty_attr(doc, node, "id") {
        return format!("#{}", css_escape(id));
    }

    match doc.tag_name(node) {
        Some("img") => {
            if let Some(selector) = image_selector(doc, node) {
                return selector;
            }
        }
        Some("a") => {
            if let Some(selector) = unique_href_selector(doc, node) {
                return selector;
            }
        }
        _ => {}
    }

    structural_path(doc, node)
}

fn non_empty_attr<'a>(doc: &'a Document, node: NodeId, name: &str) -> Option<&'a str> {
    doc.attr(node, name).filter(|value| !value.trim().is_empty())
}

fn image_selector(doc: &Document, node: NodeId) -> Option<String> {
    if let Some(name) = doc.attr(node, "src").and_then(image_filename) {
        return Some(format!("img[src*=\"{}\"]", escape_attr_value(&name)));
    }
    non_empty_attr(doc, node, "alt").map(|alt| format!("img[alt=\"{}\"]", escape_attr_value(alt)))
}

/// Trailing filename of an image source. Image-proxy URLs carrying the
/// original path in a `url=` query parameter are unwrapped first.
pub fn image_filename(src: &str) -> Option<String> {
    let src = src.trim();
    if src.is_empty() || src.starts_with("data:") {
        return None;
    }

    let proxied = src.split_once('?').and_then(|(_, query)| {
        query
            .split(['&', '#'])
            .find_map(|pair| pair.strip_prefix("url="))
            .and_then(|raw| urlencoding::decode(raw).ok())
            .map(|decoded| decoded.into_owned())
    });
    let path = proxied.as_deref().unwrap_or(src);
    let path = path.split(['?', '#']).next().unwrap_or_default();

    path.rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

fn meaningful_href(href: &str) -> bool {
    let href = href.trim();
    !href.is_empty() && href != "#" && href != "/"
}

fn unique_href_selector(doc: &Document, node: NodeId) -> Option<String> {
    let href = doc.attr(node, "href").filter(|href| meaningful_href(href))?;
    let selector = format!("a[href=\"{}\"]", escape_attr_value(href));
    let matches = doc.query_selector_all(&selector).ok()?;
    (matches.len() == 1).then_some(selector)
}

fn structural_path(doc: &Document, node: NodeId) -> String {
    let mut segments = Vec::new();
    let mut current = Some(node);
    let mut levels = 0usize;

    while let Some(cursor) = current {
        let Some(tag) = doc.tag_name(cursor) else {
            break;
        };
        if tag == "body" && cursor != node {
            break;
        }
        if cursor != node {
            if let Some(id) = non_empty_attr(doc, cursor, "id") {
                segments.push(format!("#{}", css_escape(id)));
                break;
            }
        }

        segments.push(segment(doc, cursor, tag));
        if levels == MAX_ANCESTOR_LEVELS {
            break;
        }
        levels += 1;
        current = doc.parent(cursor);
    }

    segments.reverse();
    segments.join(" > ")
}

fn segment(doc: &Document, node: NodeId, tag: &str) -> String {
    let mut out = tag.to_string();

    if tag == "a" {
        if let Some(href) = doc.attr(node, "href").filter(|href| meaningful_href(href)) {
            out.push_str(&format!("[href=\"{}\"]", escape_attr_value(href)));
        }
    }

    if let Some(class) = doc.element(node).and_then(|el| {
        el.classes()
            .into_iter()
            .find(|class| !SKIPPED_CLASS_PREFIXES.iter().any(|p| class.starts_with(p)))
    }) {
        out.push('.');
        out.push_str(&css_escape(class));
    }

    if let Some(test_id) = non_empty_attr(doc, node, "data-testid") {
        out.push_str(&format!("[data-testid=\"{}\"]", escape_attr_value(test_id)));
    } else if let Some(role) = doc
        .attr(node, "role")
        .filter(|role| ROLE_WHITELIST.contains(role))
    {
        out.push_str(&format!("[role=\"{role}\"]"));
    }

    let siblings = doc.same_tag_siblings(node);
    if siblings.len() > 1 {
        if let Some(pos) = siblings.iter().position(|s| *s == node) {
            out.push_str(&format!(":nth-of-type({})", pos + 1));
        }
    }

    out
}

/// Escape an identifier for use after `#` or `.` (CSS.escape semantics).
pub fn css_escape(ident: &str) -> String {
    let chars: Vec<char> = ident.chars().collect();
    let mut out = String::with_capacity(ident.len() + 4);

    if chars == ['-'] {
        return "\\-".to_string();
    }

    for (i, &ch) in chars.iter().enumerate() {
        let code = ch as u32;
        if ch == '\0' {
            out.push('\u{fffd}');
        } else if (0x01..=0x1f).contains(&code)
            || code == 0x7f
            || (i == 0 && ch.is_ascii_digit())
            || (i == 1 && ch.is_ascii_digit() && chars[0] == '-')
        {
            out.push_str(&format!("\\{code:x} "));
        } else if code >= 0x80 || ch == '-' || ch == '_' || ch.is_ascii_alphanumeric() {
            out.push(ch);
        } else {
            out.push('\\');
            out.push(ch);
        }
    }
    out
}

/// Escape a value for a double-quoted attribute selector.
pub fn escape_attr_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
