//! Inline `style` attribute parsing and serialization.

/// Convert a camelCase property (`fontSize`) to kebab-case (`font-size`).
/// Already-hyphenated names are only lower-cased; custom properties (`--x`)
/// are kept verbatim.
pub fn normalize_property(property: &str) -> String {
    let property = property.trim();
    if property.starts_with("--") {
        return property.to_string();
    }
    if property.contains('-') || !property.chars().any(|c| c.is_ascii_lowercase()) {
        return property.to_ascii_lowercase();
    }
    let mut out = String::with_capacity(property.len() + 4);
    for (i, ch) in property.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Split `a: b; c: d(e;f)` into ordered `(name, value)` pairs.
///
/// Semicolons inside parentheses or quotes do not terminate a declaration.
/// Later duplicates overwrite earlier ones but keep the earlier position.
pub fn parse_declarations(style: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut paren_depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, ch) in style.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, ch) {
            (_, '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '(') => paren_depth += 1,
            (None, ')') => paren_depth = paren_depth.saturating_sub(1),
            (None, ';') if paren_depth == 0 => {
                push_declaration(&style[start..i], &mut out);
                start = i + 1;
            }
            _ => {}
        }
    }
    push_declaration(&style[start..], &mut out);
    out
}

fn push_declaration(raw: &str, out: &mut Vec<(String, String)>) {
    let Some((name, value)) = raw.split_once(':') else {
        return;
    };
    let name = normalize_property(name);
    let value = value.trim();
    if name.is_empty() || value.is_empty() {
        return;
    }
    match out.iter_mut().find(|(existing, _)| *existing == name) {
        Some(slot) => slot.1 = value.to_string(),
        None => out.push((name, value.to_string())),
    }
}

pub fn serialize_declarations(decls: &[(String, String)]) -> String {
    decls
        .iter()
        .map(|(name, value)| format!("{name}: {value};"))
        .collect::<Vec<_>>()
        .join(" ")
}
