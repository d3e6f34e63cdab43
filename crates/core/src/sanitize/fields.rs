//! Field-level sanitizers. Each one is total and idempotent.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::dom::{decode_entities, style};

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

pub const MAX_ID_LEN: usize = 100;
pub const MAX_SELECTOR_LEN: usize = 1000;
pub const MAX_CSS_VALUE_LEN: usize = 500;
pub const MAX_TEXT_LEN: usize = 5000;
pub const MAX_PLACEHOLDER_LEN: usize = 500;
pub const MAX_TOOLTIP_LEN: usize = 500;
pub const MAX_HTML_LEN: usize = 10_000;
pub const MAX_URL_LEN: usize = 2000;
pub const MAX_CLASS_NAME_LEN: usize = 100;
pub const MAX_CLASS_COUNT: usize = 20;
pub const MAX_ATTRIBUTE_VALUE_LEN: usize = 2000;
pub const MAX_ANIMATION_NAME_LEN: usize = 100;

/// CSS properties that may be set by a `css` modification.
pub const CSS_ALLOWLIST: &[&str] = &[
    "color",
    "background-color",
    "font-size",
    "font-weight",
    "font-family",
    "font-style",
    "line-height",
    "letter-spacing",
    "text-align",
    "text-decoration",
    "text-transform",
    "width",
    "height",
    "min-width",
    "min-height",
    "max-width",
    "max-height",
    "margin",
    "margin-top",
    "margin-right",
    "margin-bottom",
    "margin-left",
    "padding",
    "padding-top",
    "padding-right",
    "padding-bottom",
    "padding-left",
    "border",
    "border-radius",
    "border-color",
    "border-width",
    "border-style",
    "display",
    "opacity",
    "visibility",
    "box-shadow",
    "z-index",
    "position",
    "top",
    "left",
    "right",
    "bottom",
    "transform",
    "cursor",
    "overflow",
    "gap",
    "justify-content",
    "align-items",
    "flex-direction",
];

/// Property prefixes additionally accepted inside a custom animation block.
pub const ANIMATION_PROPERTY_PREFIXES: &[&str] = &["animation", "transition"];

/// URL schemes that execute or embed content and are never stored.
pub const BLOCKED_URL_SCHEMES: &[&str] = &["javascript:", "vbscript:", "data:"];

/// Attributes whose values are URLs.
pub const URL_ATTRIBUTES: &[&str] = &[
    "href",
    "src",
    "action",
    "formaction",
    "xlink:href",
    "poster",
    "data",
    "background",
    "codebase",
];

/// Attributes dropped outright in addition to event handlers.
pub const BLOCKED_ATTRIBUTES: &[&str] = &["srcdoc"];

static CSS_DANGEROUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)expression\s*\(|javascript\s*:|url\s*\([^)]*\)?|behavior\s*:|-moz-binding|[;{}<>]",
    )
    .expect("valid regex")
});

static EVENT_HANDLER_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^on\w+$").expect("valid regex"));

static SCRIPT_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("valid regex")
});

static UNTERMINATED_SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*$").expect("valid regex"));

static EVENT_HANDLER_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(^|[\s/"'])on([a-z0-9_-]+)\s*="#).expect("valid regex")
});

static URL_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    let names = URL_ATTRIBUTES
        .iter()
        .map(|name| regex::escape(name))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(
        r#"(?i)(^|[\s/"'])({names})(\s*=\s*)("[^"]*"|'[^']*'|[^\s>"']*)"#
    ))
    .expect("valid regex")
});

static CSS_PROPERTY_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z-]+$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Strings
// ---------------------------------------------------------------------------

/// Truncate to at most `max` characters (never splits a character).
pub fn cap(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((byte, _)) => value[..byte].to_string(),
        None => value.to_string(),
    }
}

pub fn sanitize_plain(value: &str, max: usize) -> String {
    cap(value, max)
}

pub fn sanitize_id(value: &str) -> String {
    cap(value.trim(), MAX_ID_LEN).trim().to_string()
}

pub fn sanitize_selector(value: &str) -> String {
    cap(value.trim(), MAX_SELECTOR_LEN).trim().to_string()
}

// ---------------------------------------------------------------------------
// CSS
// ---------------------------------------------------------------------------

fn strip_to_fixpoint(re: &Regex, value: &str) -> String {
    let mut current = value.to_string();
    loop {
        let next = re.replace_all(&current, "").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Strip dangerous constructs and declaration breakers, then cap.
pub fn sanitize_css_value(value: &str) -> String {
    let stripped = strip_to_fixpoint(&CSS_DANGEROUS_RE, value);
    cap(stripped.trim(), MAX_CSS_VALUE_LEN).trim().to_string()
}

pub fn is_allowed_css_property(property: &str) -> bool {
    CSS_ALLOWLIST.contains(&property)
}

/// Keep only allowlisted properties (normalised to kebab-case) with
/// non-empty sanitized values.
pub fn sanitize_css_map(css: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (property, value) in css {
        let property = style::normalize_property(property);
        if !is_allowed_css_property(&property) {
            tracing::debug!(%property, "Dropping non-allowlisted CSS property");
            continue;
        }
        let value = sanitize_css_value(value);
        if !value.is_empty() {
            out.insert(property, value);
        }
    }
    out
}

/// Sanitize a raw declaration block used for custom animations.
pub fn sanitize_declaration_block(css_text: &str) -> String {
    let decls: Vec<(String, String)> = style::parse_declarations(css_text)
        .into_iter()
        .filter(|(property, _)| {
            is_allowed_css_property(property)
                || (CSS_PROPERTY_NAME_RE.is_match(property)
                    && ANIMATION_PROPERTY_PREFIXES
                        .iter()
                        .any(|prefix| property.starts_with(prefix)))
        })
        .map(|(property, value)| (property, sanitize_css_value(&value)))
        .filter(|(_, value)| !value.is_empty())
        .collect();
    style::serialize_declarations(&decls)
}

/// Animation names are plain identifiers.
pub fn sanitize_animation_name(value: &str) -> String {
    let name: String = value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect();
    cap(&name, MAX_ANIMATION_NAME_LEN)
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

fn neutralize_html_once(html: &str) -> String {
    let html = SCRIPT_BLOCK_RE.replace_all(html, "");
    let html = UNTERMINATED_SCRIPT_RE.replace_all(&html, "");
    let html = EVENT_HANDLER_ATTR_RE.replace_all(&html, "${1}data-blocked-${2}=");
    URL_ATTR_RE
        .replace_all(&html, |caps: &regex::Captures| {
            let raw = &caps[4];
            let value = raw
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| raw.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(raw);
            if is_blocked_markup_url(value) {
                format!(r#"{}{}{}"blocked:""#, &caps[1], &caps[2], &caps[3])
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// A URL attribute value as the browser will read it: character references
/// are decoded before the scheme is checked. A scheme position that still
/// holds a `&` is a reference the decoder did not resolve and is blocked.
fn is_blocked_markup_url(raw: &str) -> bool {
    if has_blocked_scheme(&decode_entities(raw)) {
        return true;
    }
    raw.split_once(':').is_some_and(|(scheme, _)| {
        scheme.contains('&') && !scheme.contains(['/', '?', '#'])
    })
}

/// Remove scripts, rewrite event-handler attributes to inert `data-blocked-*`
/// ones and URL attributes with a blocked scheme to `"blocked:"`, then cap.
pub fn sanitize_html(html: &str) -> String {
    let mut current = html.to_string();
    loop {
        loop {
            let next = neutralize_html_once(&current);
            if next == current {
                break;
            }
            current = next;
        }
        let capped = cap(&current, MAX_HTML_LEN);
        if capped == current {
            return current;
        }
        current = capped;
    }
}

// ---------------------------------------------------------------------------
// URLs
// ---------------------------------------------------------------------------

/// `true` if the URL uses a blocked scheme once control characters and
/// whitespace are ignored (`java\tscript:` is caught).
pub fn has_blocked_scheme(url: &str) -> bool {
    let compact: String = url
        .chars()
        .filter(|c| !c.is_control() && !c.is_whitespace())
        .take(16)
        .collect::<String>()
        .to_ascii_lowercase();
    BLOCKED_URL_SCHEMES
        .iter()
        .any(|scheme| compact.starts_with(scheme))
}

/// Empty string for blocked schemes; otherwise trimmed and capped.
pub fn sanitize_url(url: &str) -> String {
    let trimmed = url.trim();
    if has_blocked_scheme(trimmed) {
        tracing::debug!("Rejecting URL with blocked scheme");
        return String::new();
    }
    cap(trimmed, MAX_URL_LEN).trim().to_string()
}

// ---------------------------------------------------------------------------
// Classes and attributes
// ---------------------------------------------------------------------------

pub fn sanitize_class_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        .collect();
    cap(&cleaned, MAX_CLASS_NAME_LEN)
}

pub fn sanitize_class_list(classes: &[String]) -> Vec<String> {
    classes
        .iter()
        .map(|name| sanitize_class_name(name))
        .filter(|name| !name.is_empty())
        .take(MAX_CLASS_COUNT)
        .collect()
}

pub fn is_event_handler_attribute(name: &str) -> bool {
    EVENT_HANDLER_NAME_RE.is_match(name)
}

/// Drop event-handler and blocked attributes; URL-valued attributes go
/// through the URL sanitizer and `style` through the CSS value sanitizer.
pub fn sanitize_attributes(attributes: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (name, value) in attributes {
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty()
            || is_event_handler_attribute(&name)
            || BLOCKED_ATTRIBUTES.contains(&name.as_str())
        {
            tracing::debug!(attribute = %name, "Dropping blocked attribute");
            continue;
        }
        let value = if URL_ATTRIBUTES.contains(&name.as_str()) {
            sanitize_url(value)
        } else if name == "style" {
            sanitize_declaration_block(value)
        } else {
            cap(value, MAX_ATTRIBUTE_VALUE_LEN)
        };
        out.insert(name, value);
    }
    out
}
