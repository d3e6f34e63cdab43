//! Tolerant HTML parsing and serialization for [`Document`].
//!
//! This is a tag-soup parser, not an HTML5 tree builder: it never fails, it
//! closes elements by matching end tags against the open-element stack, and
//! anything it cannot make sense of becomes text.

use super::document::{Document, Element, NodeId, NodeKind};

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_TAGS: &[&str] = &["script", "style", "textarea", "title"];

fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

fn is_raw_text_tag(tag: &str) -> bool {
    RAW_TEXT_TAGS.contains(&tag)
}

impl Document {
    /// Parse a full document.
    pub fn parse(html: &str) -> Self {
        let mut doc = Document::new();
        let root = doc.root();
        doc.parse_into(root, html);
        doc
    }

    /// Parse `html` into detached top-level nodes owned by this document.
    pub fn parse_fragment(&mut self, html: &str) -> Vec<NodeId> {
        let holder = self.create_element(Element::new("template"));
        self.parse_into(holder, html);
        let nodes = self.children(holder).to_vec();
        for node in &nodes {
            self.detach(*node);
        }
        nodes
    }

    fn parse_into(&mut self, parent: NodeId, html: &str) {
        let bytes = html.as_bytes();
        let mut stack = vec![parent];
        let mut i = 0usize;

        while i < bytes.len() {
            let top = *stack.last().unwrap_or(&parent);

            if bytes[i] == b'<' {
                if html[i..].starts_with("<!--") {
                    i = html[i + 4..].find("-->").map_or(bytes.len(), |end| i + 4 + end + 3);
                    continue;
                }
                if matches!(bytes.get(i + 1), Some(b'!' | b'?')) {
                    i = html[i..].find('>').map_or(bytes.len(), |end| i + end + 1);
                    continue;
                }
                if bytes.get(i + 1) == Some(&b'/')
                    && bytes.get(i + 2).is_some_and(u8::is_ascii_alphabetic)
                {
                    let (tag, next) = parse_end_tag(html, i);
                    i = next;
                    if let Some(pos) = stack
                        .iter()
                        .rposition(|open| self.tag_name(*open) == Some(tag.as_str()))
                    {
                        if pos > 0 {
                            stack.truncate(pos);
                        }
                    }
                    continue;
                }
                if bytes.get(i + 1).is_some_and(u8::is_ascii_alphabetic) {
                    if let Some(start) = parse_start_tag(html, i) {
                        let mut element = Element::new(&start.tag);
                        for (name, value) in start.attrs {
                            if element.attr(&name).is_none() {
                                element.set_attr(&name, value);
                            }
                        }
                        let node = self.create_element(element);
                        self.append_child(top, node);
                        i = start.next;

                        if is_raw_text_tag(&start.tag) && !start.self_closing {
                            let close = find_end_tag(html, i, &start.tag).unwrap_or(bytes.len());
                            let body = &html[i..close];
                            if !body.is_empty() {
                                let text = if start.tag == "textarea" || start.tag == "title" {
                                    decode_entities(body)
                                } else {
                                    body.to_string()
                                };
                                let text_node = self.create_text(text);
                                self.append_child(node, text_node);
                            }
                            i = if close < bytes.len() {
                                parse_end_tag(html, close).1
                            } else {
                                close
                            };
                            continue;
                        }

                        if !start.self_closing && !is_void_tag(&start.tag) {
                            stack.push(node);
                        }
                        continue;
                    }
                }
            }

            // Text run up to the next '<' (a stray '<' is kept as text).
            let text_start = i;
            i += 1;
            while i < bytes.len() && bytes[i] != b'<' {
                i += 1;
            }
            let text = decode_entities(&html[text_start..i]);
            self.append_text(top, &text);
        }
    }

    fn append_text(&mut self, parent: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(last) = self.children(parent).last().copied() {
            if let Some(NodeKind::Text(existing)) = self.kind(last) {
                let merged = format!("{existing}{text}");
                self.set_text_content(last, &merged);
                return;
            }
        }
        let node = self.create_text(text);
        self.append_child(parent, node);
    }

    // -- Serialization ------------------------------------------------------

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, false, &mut out);
        out
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let raw = self.tag_name(id).is_some_and(is_raw_text_tag);
        let mut out = String::new();
        for child in self.children(id) {
            self.write_node(*child, raw, &mut out);
        }
        out
    }

    /// Serialize the whole document.
    pub fn to_html(&self) -> String {
        self.inner_html(self.root())
    }

    fn write_node(&self, id: NodeId, raw_text: bool, out: &mut String) {
        match self.kind(id) {
            Some(NodeKind::Text(text)) => {
                if raw_text {
                    out.push_str(text);
                } else {
                    out.push_str(&escape_text(text));
                }
            }
            Some(NodeKind::Element(element)) => {
                out.push('<');
                out.push_str(&element.tag);
                for (name, value) in element.attrs() {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(value));
                    out.push('"');
                }
                out.push('>');
                if is_void_tag(&element.tag) {
                    return;
                }
                let raw = is_raw_text_tag(&element.tag);
                for child in self.children(id) {
                    self.write_node(*child, raw, out);
                }
                out.push_str("</");
                out.push_str(&element.tag);
                out.push('>');
            }
            Some(NodeKind::Document) => {
                for child in self.children(id) {
                    self.write_node(*child, false, out);
                }
            }
            None => {}
        }
    }
}

struct StartTag {
    tag: String,
    attrs: Vec<(String, String)>,
    self_closing: bool,
    next: usize,
}

fn is_tag_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':')
}

fn is_attr_name_char(b: u8) -> bool {
    !b.is_ascii_whitespace() && !matches!(b, b'>' | b'/' | b'=' | b'"' | b'\'' | b'<')
}

fn skip_ws(bytes: &[u8], i: &mut usize) {
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
}

/// Returns `None` when the tag never closes, in which case the caller treats
/// the `<` as text.
fn parse_start_tag(html: &str, at: usize) -> Option<StartTag> {
    let bytes = html.as_bytes();
    let mut i = at + 1;
    let tag_start = i;
    while i < bytes.len() && is_tag_char(bytes[i]) {
        i += 1;
    }
    let tag = html[tag_start..i].to_ascii_lowercase();

    let mut attrs = Vec::new();
    loop {
        skip_ws(bytes, &mut i);
        match bytes.get(i) {
            None => return None,
            Some(b'>') => {
                return Some(StartTag {
                    tag,
                    attrs,
                    self_closing: false,
                    next: i + 1,
                })
            }
            Some(b'/') if bytes.get(i + 1) == Some(&b'>') => {
                return Some(StartTag {
                    tag,
                    attrs,
                    self_closing: true,
                    next: i + 2,
                })
            }
            Some(b) if !is_attr_name_char(*b) => {
                i += 1;
                continue;
            }
            Some(_) => {}
        }

        let name_start = i;
        while i < bytes.len() && is_attr_name_char(bytes[i]) {
            i += 1;
        }
        let name = html[name_start..i].to_ascii_lowercase();

        skip_ws(bytes, &mut i);
        let value = if bytes.get(i) == Some(&b'=') {
            i += 1;
            skip_ws(bytes, &mut i);
            match bytes.get(i).copied() {
                Some(quote) if quote == b'"' || quote == b'\'' => {
                    let start = i + 1;
                    let end = start + html[start..].find(quote as char)?;
                    i = end + 1;
                    decode_entities(&html[start..end])
                }
                Some(_) => {
                    let start = i;
                    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                        i += 1;
                    }
                    decode_entities(&html[start..i])
                }
                None => return None,
            }
        } else {
            String::new()
        };
        attrs.push((name, value));
    }
}

fn parse_end_tag(html: &str, at: usize) -> (String, usize) {
    let bytes = html.as_bytes();
    let mut i = at + 2;
    let tag_start = i;
    while i < bytes.len() && is_tag_char(bytes[i]) {
        i += 1;
    }
    let tag = html[tag_start..i].to_ascii_lowercase();
    let next = html[i..].find('>').map_or(bytes.len(), |end| i + end + 1);
    (tag, next)
}

fn find_end_tag(html: &str, from: usize, tag: &str) -> Option<usize> {
    let needle = format!("</{tag}");
    let haystack = html[from..].to_ascii_lowercase();
    let mut offset = 0;
    while let Some(pos) = haystack[offset..].find(&needle) {
        let at = offset + pos;
        let after = haystack.as_bytes().get(at + needle.len());
        if after.map_or(true, |b| !is_tag_char(*b)) {
            return Some(from + at);
        }
        offset = at + needle.len();
    }
    None
}

/// Decode the character references the editor and typical CMS markup emit.
pub fn decode_entities(src: &str) -> String {
    if !src.contains('&') {
        return src.to_string();
    }
    let mut out = String::with_capacity(src.len());
    let mut rest = src;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let Some(semi) = rest
            .char_indices()
            .take(12)
            .find(|(_, c)| *c == ';')
            .map(|(pos, _)| pos)
        else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
