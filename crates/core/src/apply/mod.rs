//! Apply engine: performs a modification against every element its selector
//! matches.
//!
//! Each kind is handled by one [`MutationStrategy`], chosen through a static
//! lookup table. Applying never fails: a selector matching nothing is the
//! normal case on pages that do not contain the target, and an unparseable
//! selector is retried once with identifier characters escaped before being
//! given up on.

mod strategies;

use crate::dom::{Document, NodeId};
use crate::modification::{Changes, Modification, ModificationKind};

pub use strategies::{
    CLONE_COUNT_MAX, CLONE_COUNT_MIN, DEFAULT_ANIMATION_DURATION_SECS, DEFAULT_STICKY_TOP,
    DEFAULT_STICKY_Z_INDEX, REDIRECT_ATTR, REDIRECT_TARGET_ATTR, STRATEGIES,
};

/// One implementation per [`ModificationKind`].
pub trait MutationStrategy: Send + Sync {
    fn kind(&self) -> ModificationKind;

    /// Perform the edit on a single matched element.
    fn apply(&self, doc: &mut Document, node: NodeId, changes: &Changes);
}

/// Look up the strategy registered for `kind`.
pub fn strategy_for(kind: ModificationKind) -> &'static dyn MutationStrategy {
    STRATEGIES
        .iter()
        .copied()
        .find(|strategy| strategy.kind() == kind)
        .unwrap_or(STRATEGIES[0])
}

/// What happened when a modification was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyOutcome {
    /// Elements the selector matched (and the edit was performed on).
    pub matched: usize,
    /// The selector only parsed after escaping.
    pub retried: bool,
}

/// Apply one modification. Never fails.
pub fn apply(doc: &mut Document, modification: &Modification) -> ApplyOutcome {
    let Some((nodes, retried)) = select(doc, &modification.selector) else {
        tracing::debug!(
            selector = %modification.selector,
            kind = %modification.kind,
            "Selector could not be parsed, skipping modification"
        );
        return ApplyOutcome::default();
    };

    if nodes.is_empty() {
        tracing::debug!(
            selector = %modification.selector,
            kind = %modification.kind,
            "Selector matched no elements"
        );
        return ApplyOutcome { matched: 0, retried };
    }

    let strategy = strategy_for(modification.kind);
    let mut matched = 0;
    for node in nodes {
        // An earlier match may have removed this one (nested matches).
        if !doc.is_connected(node) {
            continue;
        }
        strategy.apply(doc, node, &modification.changes);
        matched += 1;
    }
    ApplyOutcome { matched, retried }
}

/// Apply modifications in array order.
pub fn apply_all(doc: &mut Document, modifications: &[Modification]) -> Vec<ApplyOutcome> {
    modifications.iter().map(|m| apply(doc, m)).collect()
}

/// Replay-from-clean: a fresh copy of `base` with every modification applied.
pub fn render_document(base: &Document, modifications: &[Modification]) -> Document {
    let mut doc = base.clone();
    apply_all(&mut doc, modifications);
    doc
}

/// Query with a single escaped retry. Returns `None` if neither form parses.
pub(crate) fn select(doc: &Document, selector: &str) -> Option<(Vec<NodeId>, bool)> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Some((Vec::new(), false));
    }
    match doc.query_selector_all(selector) {
        Ok(nodes) => Some((nodes, false)),
        Err(_) => {
            let escaped = escape_selector(selector);
            if escaped == selector {
                return None;
            }
            tracing::debug!(%selector, %escaped, "Retrying selector with escaped identifiers");
            doc.query_selector_all(&escaped)
                .ok()
                .map(|nodes| (nodes, true))
        }
    }
}

/// Escape special characters inside `#id` and `.class` tokens, e.g.
/// `#nav:main > a` becomes `#nav\:main > a`.
pub fn escape_selector(selector: &str) -> String {
    let mut out = String::with_capacity(selector.len() + 8);
    let mut in_ident = false;
    let mut bracket_depth = 0usize;
    let mut quote: Option<char> = None;
    let mut chars = selector.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            out.push(ch);
            if let Some(next) = chars.next() {
                out.push(next);
            }
            continue;
        }
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            out.push(ch);
            continue;
        }
        if bracket_depth > 0 {
            match ch {
                '"' | '\'' => quote = Some(ch),
                '[' => bracket_depth += 1,
                ']' => bracket_depth -= 1,
                _ => {}
            }
            out.push(ch);
            continue;
        }

        match ch {
            '#' | '.' => {
                in_ident = true;
                out.push(ch);
            }
            '[' => {
                in_ident = false;
                bracket_depth += 1;
                out.push(ch);
            }
            c if c.is_whitespace() || matches!(c, '>' | '+' | '~' | ',') => {
                in_ident = false;
                out.push(c);
            }
            c if in_ident && !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::modification::{InsertPosition, SiblingPosition};

    fn modification(selector: &str, kind: ModificationKind, changes: Changes) -> Modification {
        Modification::new("m1", "v1", selector, kind, changes)
    }

    fn texts(doc: &Document, selector: &str) -> Vec<String> {
        doc.query_selector_all(selector)
            .unwrap()
            .into_iter()
            .map(|n| doc.text_content(n))
            .collect()
    }

    // -- Dispatch -----------------------------------------------------------

    #[test]
    fn test_every_kind_has_a_strategy() {
        for kind in ModificationKind::ALL {
            assert_eq!(strategy_for(kind).kind(), kind);
        }
        assert_eq!(STRATEGIES.len(), ModificationKind::ALL.len());
    }

    #[test]
    fn test_zero_matches_is_a_silent_no_op() {
        let mut doc = Document::parse("<body><p>x</p></body>");
        let before = doc.to_html();
        let outcome = apply(
            &mut doc,
            &modification("#missing", ModificationKind::Remove, Changes::default()),
        );
        assert_eq!(outcome.matched, 0);
        assert_eq!(doc.to_html(), before);
    }

    #[test]
    fn test_garbage_selector_is_a_silent_no_op() {
        let mut doc = Document::parse("<body><p>x</p></body>");
        let outcome = apply(
            &mut doc,
            &modification("div[[", ModificationKind::Hide, Changes::default()),
        );
        assert_eq!(outcome, ApplyOutcome::default());
    }

    #[test]
    fn test_unescaped_colon_selector_is_retried_escaped() {
        let mut doc = Document::parse(r#"<body><div id="nav:main">a</div></body>"#);
        let changes = Changes {
            text: Some("b".into()),
            ..Default::default()
        };
        let outcome = apply(
            &mut doc,
            &modification("#nav:main", ModificationKind::Text, changes),
        );
        assert_eq!(outcome, ApplyOutcome { matched: 1, retried: true });
        assert_eq!(texts(&doc, "div"), vec!["b"]);
    }

    #[test]
    fn test_escape_selector() {
        assert_eq!(escape_selector("#nav:main > a"), r"#nav\:main > a");
        assert_eq!(escape_selector(".md:flex.w-1/2"), r".md\:flex.w-1\/2");
        assert_eq!(escape_selector(r#"a[href="x:y"]"#), r#"a[href="x:y"]"#);
        assert_eq!(escape_selector("div:nth-of-type(2)"), "div:nth-of-type(2)");
    }

    // -- End-to-end -----------------------------------------------------------

    #[test]
    fn test_text_replaces_button_label() {
        let mut doc = Document::parse(r#"<body><button id="hero-cta">Sign Up</button></body>"#);
        let changes = Changes {
            text: Some("Buy Now".into()),
            ..Default::default()
        };
        apply(&mut doc, &modification("#hero-cta", ModificationKind::Text, changes));
        assert_eq!(texts(&doc, "#hero-cta"), vec!["Buy Now"]);
    }

    #[test]
    fn test_clone_three_yields_four_cards_original_first() {
        let mut doc = Document::parse(r#"<body><div class="card" id="c">Card</div></body>"#);
        let original = doc.query_selector("#c").unwrap().unwrap();
        let changes = Changes {
            clone_count: Some(3),
            ..Default::default()
        };
        let outcome = apply(&mut doc, &modification(".card", ModificationKind::Clone, changes));
        assert_eq!(outcome.matched, 1);

        let cards = doc.query_selector_all(".card").unwrap();
        assert_eq!(cards.len(), 4);
        assert_eq!(cards[0], original);
        for clone in &cards[1..] {
            assert_eq!(doc.attr(*clone, "id"), None);
        }
    }

    #[test]
    fn test_clone_is_idempotent_under_replay_from_clean() {
        let base = Document::parse(r#"<body><div class="card">Card</div></body>"#);
        let mods = vec![modification(
            ".card",
            ModificationKind::Clone,
            Changes {
                clone_count: Some(3),
                ..Default::default()
            },
        )];
        let first = render_document(&base, &mods);
        let second = render_document(&base, &mods);
        assert_eq!(first.query_selector_all(".card").unwrap().len(), 4);
        assert_eq!(first.to_html(), second.to_html());
    }

    #[test]
    fn test_clone_count_is_clamped_and_before_position() {
        let mut doc = Document::parse(r#"<body><ul><li class="x">a</li></ul></body>"#);
        let changes = Changes {
            clone_count: Some(50),
            clone_position: Some(SiblingPosition::Before),
            ..Default::default()
        };
        let original = doc.query_selector(".x").unwrap().unwrap();
        apply(&mut doc, &modification(".x", ModificationKind::Clone, changes));
        let items = doc.query_selector_all(".x").unwrap();
        assert_eq!(items.len(), 11);
        assert_eq!(items.last(), Some(&original));
    }

    #[test]
    fn test_render_document_leaves_base_untouched() {
        let base = Document::parse(r#"<body><p id="a">x</p></body>"#);
        let before = base.to_html();
        let rendered = render_document(
            &base,
            &[modification("#a", ModificationKind::Remove, Changes::default())],
        );
        assert_eq!(base.to_html(), before);
        assert!(rendered.query_selector("#a").unwrap().is_none());
    }

    #[test]
    fn test_apply_all_runs_in_order() {
        let mut doc = Document::parse(r#"<body><h1 id="t">Old</h1></body>"#);
        let mods = vec![
            modification(
                "#t",
                ModificationKind::Text,
                Changes {
                    text: Some("First".into()),
                    ..Default::default()
                },
            ),
            modification(
                "#t",
                ModificationKind::InsertHtml,
                Changes {
                    html: Some("<em>!</em>".into()),
                    insert_position: Some(InsertPosition::Append),
                    ..Default::default()
                },
            ),
        ];
        let outcomes = apply_all(&mut doc, &mods);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(texts(&doc, "#t"), vec!["First!"]);
    }

    #[test]
    fn test_css_applies_to_every_match() {
        let mut doc = Document::parse(r#"<body><p>a</p><p>b</p></body>"#);
        let changes = Changes {
            css: Some(BTreeMap::from([("color".to_string(), "red".to_string())])),
            ..Default::default()
        };
        let outcome = apply(&mut doc, &modification("p", ModificationKind::Css, changes));
        assert_eq!(outcome.matched, 2);
        for p in doc.query_selector_all("p").unwrap() {
            assert_eq!(doc.style_property(p, "color").as_deref(), Some("red"));
        }
    }

    #[test]
    fn test_nested_removal_counts_only_connected_matches() {
        let mut doc = Document::parse("<body><div><div>inner</div></div></body>");
        let outcome = apply(
            &mut doc,
            &modification("div", ModificationKind::Remove, Changes::default()),
        );
        assert_eq!(outcome.matched, 1);
        assert!(doc.query_selector_all("div").unwrap().is_empty());
    }
}
