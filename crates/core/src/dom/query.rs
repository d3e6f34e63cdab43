//! CSS selector parsing and matching against a [`Document`].
//!
//! Supports selector groups, the four combinators, compound steps (tag, `*`,
//! `#id`, `.class`, attribute conditions) and the structural pseudo-classes
//! the selector resolver emits. Identifiers honour CSS backslash escapes, so
//! `#nav\:main` matches `id="nav:main"`.

use std::collections::{HashMap, HashSet};

use super::document::{Document, NodeId};

/// The selector could not be parsed (the analogue of `querySelectorAll`
/// throwing a `SyntaxError` in a browser).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported selector: {0}")]
pub struct SelectorError(pub String);

type Result<T> = std::result::Result<T, SelectorError>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
    StartsWith { key: String, value: String },
    EndsWith { key: String, value: String },
    Contains { key: String, value: String },
    Includes { key: String, value: String },
    DashMatch { key: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nth {
    Exact(usize),
    Odd,
    Even,
    AnPlusB(i64, i64),
}

impl Nth {
    fn matches(self, position: usize) -> bool {
        let position = position as i64;
        match self {
            Nth::Exact(n) => position == n as i64,
            Nth::Odd => position % 2 == 1,
            Nth::Even => position % 2 == 0,
            Nth::AnPlusB(a, b) => {
                if a == 0 {
                    return position == b;
                }
                // Out-of-range offsets match nothing.
                let Some(diff) = position.checked_sub(b) else {
                    return false;
                };
                diff.checked_rem(a) == Some(0) && diff.checked_div(a).is_some_and(|n| n >= 0)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pseudo {
    FirstChild,
    LastChild,
    FirstOfType,
    LastOfType,
    NthChild(Nth),
    NthOfType(Nth),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Step {
    tag: Option<String>,
    universal: bool,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrCondition>,
    pseudos: Vec<Pseudo>,
}

impl Step {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && !self.universal
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && self.pseudos.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    AdjacentSibling,
    GeneralSibling,
}

/// Match results keyed by node and chain prefix length, so descendant
/// backtracking visits each pair once.
type ChainMemo = HashMap<(NodeId, usize), bool>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Part {
    step: Step,
    // Relation to the previous (left) part.
    combinator: Option<Combinator>,
}

impl Document {
    /// All connected elements matching `selector`, in document order.
    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let groups = parse_groups(selector)?;
        let mut memos: Vec<ChainMemo> = groups.iter().map(|_| ChainMemo::new()).collect();
        let mut seen = HashSet::new();
        Ok(self
            .all_elements()
            .into_iter()
            .filter(|node| {
                groups
                    .iter()
                    .zip(memos.iter_mut())
                    .any(|(parts, memo)| self.matches_prefix(*node, parts, parts.len(), memo))
            })
            .filter(|node| seen.insert(*node))
            .collect())
    }

    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    pub fn matches(&self, node: NodeId, selector: &str) -> Result<bool> {
        let groups = parse_groups(selector)?;
        Ok(groups
            .iter()
            .any(|parts| self.matches_prefix(node, parts, parts.len(), &mut ChainMemo::new())))
    }

    /// Whether `node` matches the chain `parts[..len]`.
    fn matches_prefix(&self, node: NodeId, parts: &[Part], len: usize, memo: &mut ChainMemo) -> bool {
        if let Some(&hit) = memo.get(&(node, len)) {
            return hit;
        }
        let matched = self.matches_prefix_uncached(node, parts, len, memo);
        memo.insert((node, len), matched);
        matched
    }

    fn matches_prefix_uncached(
        &self,
        node: NodeId,
        parts: &[Part],
        len: usize,
        memo: &mut ChainMemo,
    ) -> bool {
        let Some(last) = len.checked_sub(1).map(|i| &parts[i]) else {
            return false;
        };
        if !self.matches_step(node, &last.step) {
            return false;
        }
        let rest_len = len - 1;
        if rest_len == 0 {
            return true;
        }

        // Candidates for the part to the left, nearest first; each is tried
        // so that descendant and sibling combinators backtrack.
        let candidates: Vec<NodeId> = match last.combinator.unwrap_or(Combinator::Descendant) {
            Combinator::Child => self.parent_element(node).into_iter().collect(),
            Combinator::Descendant => self
                .ancestors(node)
                .into_iter()
                .filter(|ancestor| self.is_element(*ancestor))
                .collect(),
            Combinator::AdjacentSibling => self.previous_element_sibling(node).into_iter().collect(),
            Combinator::GeneralSibling => {
                let mut out = Vec::new();
                let mut cursor = self.previous_element_sibling(node);
                while let Some(sibling) = cursor {
                    out.push(sibling);
                    cursor = self.previous_element_sibling(sibling);
                }
                out
            }
        };
        candidates
            .into_iter()
            .any(|candidate| self.matches_prefix(candidate, parts, rest_len, memo))
    }

    fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.parent(node).filter(|parent| self.is_element(*parent))
    }

    fn previous_element_sibling(&self, node: NodeId) -> Option<NodeId> {
        let siblings = self.element_children(self.parent(node)?);
        let pos = siblings.iter().position(|s| *s == node)?;
        pos.checked_sub(1).map(|prev| siblings[prev])
    }

    fn matches_step(&self, node: NodeId, step: &Step) -> bool {
        let Some(element) = self.element(node) else {
            return false;
        };

        if let Some(tag) = &step.tag {
            if !element.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &step.id {
            if element.attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        if step.classes.iter().any(|class| !element.has_class(class)) {
            return false;
        }

        for cond in &step.attrs {
            let matched = match cond {
                AttrCondition::Exists { key } => element.attr(key).is_some(),
                AttrCondition::Eq { key, value } => element.attr(key) == Some(value.as_str()),
                AttrCondition::StartsWith { key, value } => element
                    .attr(key)
                    .is_some_and(|attr| !value.is_empty() && attr.starts_with(value.as_str())),
                AttrCondition::EndsWith { key, value } => element
                    .attr(key)
                    .is_some_and(|attr| !value.is_empty() && attr.ends_with(value.as_str())),
                AttrCondition::Contains { key, value } => element
                    .attr(key)
                    .is_some_and(|attr| !value.is_empty() && attr.contains(value.as_str())),
                AttrCondition::Includes { key, value } => element
                    .attr(key)
                    .is_some_and(|attr| attr.split_whitespace().any(|token| token == value)),
                AttrCondition::DashMatch { key, value } => element.attr(key).is_some_and(|attr| {
                    attr == value || attr.starts_with(&format!("{value}-"))
                }),
            };
            if !matched {
                return false;
            }
        }

        step.pseudos.iter().all(|pseudo| self.matches_pseudo(node, *pseudo))
    }

    fn matches_pseudo(&self, node: NodeId, pseudo: Pseudo) -> bool {
        let Some(parent) = self.parent(node) else {
            return false;
        };
        let siblings = self.element_children(parent);
        let of_type: Vec<NodeId> = siblings
            .iter()
            .copied()
            .filter(|s| self.tag_name(*s) == self.tag_name(node))
            .collect();
        let position_in = |list: &[NodeId]| list.iter().position(|s| *s == node).map(|p| p + 1);

        match pseudo {
            Pseudo::FirstChild => siblings.first() == Some(&node),
            Pseudo::LastChild => siblings.last() == Some(&node),
            Pseudo::FirstOfType => of_type.first() == Some(&node),
            Pseudo::LastOfType => of_type.last() == Some(&node),
            Pseudo::NthChild(nth) => position_in(&siblings).is_some_and(|p| nth.matches(p)),
            Pseudo::NthOfType(nth) => position_in(&of_type).is_some_and(|p| nth.matches(p)),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Length in bytes of the escape sequence starting at `at` (which must be a
/// backslash), covering hex escapes and their optional trailing space.
fn escape_len(src: &str, at: usize) -> usize {
    let rest = &src[at + 1..];
    let hex_digits = rest
        .chars()
        .take(6)
        .take_while(char::is_ascii_hexdigit)
        .count();
    if hex_digits > 0 {
        let mut len = 1 + hex_digits;
        if rest[hex_digits..].starts_with(|c: char| c.is_ascii_whitespace()) {
            len += 1;
        }
        len
    } else {
        1 + rest.chars().next().map_or(0, char::len_utf8)
    }
}

/// Split on top-level `,` and return parsed chains.
fn parse_groups(selector: &str) -> Result<Vec<Vec<Part>>> {
    let mut groups = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0usize;
    let mut i = 0usize;

    while i < selector.len() {
        let Some(ch) = selector[i..].chars().next() else {
            break;
        };
        if ch == '\\' {
            i += escape_len(selector, i);
            continue;
        }
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| SelectorError(selector.to_string()))?;
            }
            (None, ',') if depth == 0 => {
                groups.push(parse_chain(&selector[start..i])?);
                start = i + 1;
            }
            _ => {}
        }
        i += ch.len_utf8();
    }
    if depth != 0 || quote.is_some() {
        return Err(SelectorError(selector.to_string()));
    }
    groups.push(parse_chain(&selector[start..])?);
    Ok(groups)
}

fn tokenize(selector: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut i = 0usize;

    let flush = |current: &mut String, tokens: &mut Vec<String>| {
        if !current.is_empty() {
            tokens.push(std::mem::take(current));
        }
    };

    while i < selector.len() {
        let Some(ch) = selector[i..].chars().next() else {
            break;
        };
        if ch == '\\' {
            let len = escape_len(selector, i);
            current.push_str(&selector[i..i + len]);
            i += len;
            continue;
        }
        match (quote, ch) {
            (Some(q), c) if c == q => {
                quote = None;
                current.push(ch);
            }
            (Some(_), _) => current.push(ch),
            (None, '"' | '\'') => {
                quote = Some(ch);
                current.push(ch);
            }
            (None, '[' | '(') => {
                depth += 1;
                current.push(ch);
            }
            (None, ']' | ')') => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            (None, '>' | '+' | '~') if depth == 0 => {
                flush(&mut current, &mut tokens);
                tokens.push(ch.to_string());
            }
            (None, c) if c.is_whitespace() && depth == 0 => {
                flush(&mut current, &mut tokens);
            }
            _ => current.push(ch),
        }
        i += ch.len_utf8();
    }
    flush(&mut current, &mut tokens);
    Ok(tokens)
}

fn parse_chain(selector: &str) -> Result<Vec<Part>> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(SelectorError(selector.to_string()));
    }

    let mut parts = Vec::new();
    let mut pending: Option<Combinator> = None;
    for token in tokenize(selector)? {
        let combinator = match token.as_str() {
            ">" => Some(Combinator::Child),
            "+" => Some(Combinator::AdjacentSibling),
            "~" => Some(Combinator::GeneralSibling),
            _ => None,
        };
        if let Some(combinator) = combinator {
            if pending.is_some() || parts.is_empty() {
                return Err(SelectorError(selector.to_string()));
            }
            pending = Some(combinator);
            continue;
        }

        let step = parse_step(&token)?;
        let combinator = if parts.is_empty() {
            None
        } else {
            Some(pending.take().unwrap_or(Combinator::Descendant))
        };
        parts.push(Part { step, combinator });
    }

    if parts.is_empty() || pending.is_some() {
        return Err(SelectorError(selector.to_string()));
    }
    Ok(parts)
}

fn parse_step(token: &str) -> Result<Step> {
    let err = || SelectorError(token.to_string());
    let mut step = Step::default();
    let mut i = 0usize;

    while i < token.len() {
        let Some(ch) = token[i..].chars().next() else {
            break;
        };
        match ch {
            '*' => {
                if step.universal || step.tag.is_some() {
                    return Err(err());
                }
                step.universal = true;
                i += 1;
            }
            '#' => {
                let (id, next) = parse_ident(token, i + 1).ok_or_else(err)?;
                if step.id.replace(id).is_some() {
                    return Err(err());
                }
                i = next;
            }
            '.' => {
                let (class, next) = parse_ident(token, i + 1).ok_or_else(err)?;
                step.classes.push(class);
                i = next;
            }
            '[' => {
                let (cond, next) = parse_attr_condition(token, i).ok_or_else(err)?;
                step.attrs.push(cond);
                i = next;
            }
            ':' => {
                let (pseudo, next) = parse_pseudo(token, i + 1).ok_or_else(err)?;
                step.pseudos.push(pseudo);
                i = next;
            }
            _ => {
                if !step.is_empty() {
                    return Err(err());
                }
                let (tag, next) = parse_ident(token, i).ok_or_else(err)?;
                step.tag = Some(tag.to_ascii_lowercase());
                i = next;
            }
        }
    }

    if step.is_empty() {
        return Err(err());
    }
    Ok(step)
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || !ch.is_ascii()
}

/// Parse an identifier starting at `start`, resolving backslash escapes.
fn parse_ident(src: &str, start: usize) -> Option<(String, usize)> {
    let mut out = String::new();
    let mut i = start;
    while i < src.len() {
        let ch = src[i..].chars().next()?;
        if ch == '\\' {
            let len = escape_len(src, i);
            let body = src[i + 1..i + len].trim_end();
            let decoded = if !body.is_empty() && body.chars().all(|c| c.is_ascii_hexdigit()) {
                u32::from_str_radix(body, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .unwrap_or('\u{fffd}')
            } else {
                body.chars().next()?
            };
            out.push(decoded);
            i += len;
            continue;
        }
        if !is_ident_char(ch) {
            break;
        }
        out.push(ch);
        i += ch.len_utf8();
    }
    if out.is_empty() {
        None
    } else {
        Some((out, i))
    }
}

fn parse_attr_condition(src: &str, open: usize) -> Option<(AttrCondition, usize)> {
    let close = open + find_attr_close(&src[open..])?;
    let inner = src[open + 1..close].trim();

    let op_pos = inner.find(['=', '^', '$', '*', '~', '|']);
    let Some(op_pos) = op_pos else {
        let key = parse_attr_name(inner)?;
        return Some((AttrCondition::Exists { key }, close + 1));
    };

    let key = parse_attr_name(inner[..op_pos].trim())?;
    let rest = &inner[op_pos..];
    let (op, value_src) = if let Some(v) = rest.strip_prefix('=') {
        ('=', v)
    } else {
        let op = rest.chars().next()?;
        (op, rest[op.len_utf8()..].strip_prefix('=')?)
    };
    let value = parse_attr_value(value_src.trim())?;

    let cond = match op {
        '=' => AttrCondition::Eq { key, value },
        '^' => AttrCondition::StartsWith { key, value },
        '$' => AttrCondition::EndsWith { key, value },
        '*' => AttrCondition::Contains { key, value },
        '~' => AttrCondition::Includes { key, value },
        '|' => AttrCondition::DashMatch { key, value },
        _ => return None,
    };
    Some((cond, close + 1))
}

/// Offset of the `]` closing the bracket at the start of `src`, skipping
/// quoted strings and escapes.
fn find_attr_close(src: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut i = 1usize;
    while i < src.len() {
        let ch = src[i..].chars().next()?;
        if ch == '\\' {
            i += escape_len(src, i);
            continue;
        }
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, ']') => return Some(i),
            _ => {}
        }
        i += ch.len_utf8();
    }
    None
}

fn parse_attr_name(src: &str) -> Option<String> {
    let valid = !src.is_empty()
        && src
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'));
    valid.then(|| src.to_ascii_lowercase())
}

fn parse_attr_value(src: &str) -> Option<String> {
    let quoted = src
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| src.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')));
    match quoted {
        Some(inner) => Some(unescape(inner)),
        None if src.is_empty() => None,
        None => parse_ident(src, 0)
            .filter(|(_, end)| *end == src.len())
            .map(|(value, _)| value),
    }
}

fn unescape(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

fn parse_pseudo(src: &str, start: usize) -> Option<(Pseudo, usize)> {
    let tail = &src[start..];
    for (name, pseudo) in [
        ("first-child", Pseudo::FirstChild),
        ("last-child", Pseudo::LastChild),
        ("first-of-type", Pseudo::FirstOfType),
        ("last-of-type", Pseudo::LastOfType),
    ] {
        if let Some(rest) = tail.strip_prefix(name) {
            if !rest.starts_with(|c: char| is_ident_char(c) || c == '(') {
                return Some((pseudo, start + name.len()));
            }
        }
    }
    for (prefix, of_type) in [("nth-child(", false), ("nth-of-type(", true)] {
        if let Some(rest) = tail.strip_prefix(prefix) {
            let close = rest.find(')')?;
            let nth = parse_nth(rest[..close].trim())?;
            let pseudo = if of_type {
                Pseudo::NthOfType(nth)
            } else {
                Pseudo::NthChild(nth)
            };
            return Some((pseudo, start + prefix.len() + close + 1));
        }
    }
    None
}

fn parse_nth(raw: &str) -> Option<Nth> {
    let raw = raw.to_ascii_lowercase().replace(' ', "");
    match raw.as_str() {
        "odd" => return Some(Nth::Odd),
        "even" => return Some(Nth::Even),
        _ => {}
    }
    if let Ok(n) = raw.parse::<usize>() {
        return (n > 0).then_some(Nth::Exact(n));
    }
    let (a_raw, b_raw) = raw.split_once('n')?;
    let a = match a_raw {
        "" | "+" => 1,
        "-" => -1,
        other => other.parse().ok()?,
    };
    let b = if b_raw.is_empty() { 0 } else { b_raw.parse().ok()? };
    Some(Nth::AnPlusB(a, b))
}
