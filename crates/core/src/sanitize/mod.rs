//! Sanitization pipeline: rewrites client-submitted modifications into ones
//! that are safe to persist and replay in arbitrary visitors' browsers.
//!
//! Sanitization is total (never drops an entry, never fails), length
//! preserving and idempotent. Each kind keeps only the fields it owns; every
//! kept field goes through its field-level sanitizer in [`fields`].

pub mod fields;
mod untrusted;

use crate::apply::{CLONE_COUNT_MAX, CLONE_COUNT_MIN};
use crate::modification::{Changes, IterationCount, Modification, ModificationKind};

pub use fields::{sanitize_html, sanitize_url, CSS_ALLOWLIST};
pub use untrusted::{decode_modification, sanitize_untrusted};

pub const STICKY_Z_INDEX_MIN: i64 = 0;
pub const STICKY_Z_INDEX_MAX: i64 = 9999;
pub const NEW_INDEX_MAX: u32 = 1000;
pub const TRANSLATE_LIMIT_PX: f64 = 5000.0;
pub const ANIMATION_DURATION_MIN_SECS: f64 = 0.1;
pub const ANIMATION_DURATION_MAX_SECS: f64 = 10.0;
pub const ANIMATION_ITERATIONS_MIN: u32 = 1;
pub const ANIMATION_ITERATIONS_MAX: u32 = 100;

/// Sanitize a batch. Output has the same length and order as the input.
pub fn sanitize(modifications: &[Modification]) -> Vec<Modification> {
    modifications.iter().map(sanitize_modification).collect()
}

pub fn sanitize_modification(modification: &Modification) -> Modification {
    Modification {
        id: fields::sanitize_id(&modification.id),
        variant_id: fields::sanitize_id(&modification.variant_id),
        selector: fields::sanitize_selector(&modification.selector),
        kind: modification.kind,
        changes: sanitize_changes(modification.kind, &modification.changes),
    }
}

fn text(value: &Option<String>, max: usize) -> Option<String> {
    value.as_deref().map(|v| fields::sanitize_plain(v, max))
}

fn url(value: &Option<String>) -> Option<String> {
    value.as_deref().map(fields::sanitize_url)
}

fn css_value(value: &Option<String>) -> Option<String> {
    value.as_deref().map(fields::sanitize_css_value)
}

fn clamp_f64(value: Option<f64>, min: f64, max: f64, fallback: f64) -> Option<f64> {
    value.map(|v| if v.is_finite() { v.clamp(min, max) } else { fallback })
}

/// Keep only the fields owned by `kind`, each sanitized.
pub fn sanitize_changes(kind: ModificationKind, changes: &Changes) -> Changes {
    let c = changes;
    match kind {
        ModificationKind::Css => Changes {
            css: c.css.as_ref().map(fields::sanitize_css_map),
            ..Default::default()
        },
        ModificationKind::Text => Changes {
            text: text(&c.text, fields::MAX_TEXT_LEN),
            ..Default::default()
        },
        ModificationKind::Hide | ModificationKind::Remove => Changes::default(),
        ModificationKind::Clone => Changes {
            clone_count: c
                .clone_count
                .map(|n| n.clamp(CLONE_COUNT_MIN, CLONE_COUNT_MAX)),
            clone_position: c.clone_position,
            ..Default::default()
        },
        ModificationKind::Image => Changes {
            image_url: url(&c.image_url),
            ..Default::default()
        },
        ModificationKind::Link => Changes {
            link_url: url(&c.link_url),
            link_target: c.link_target,
            ..Default::default()
        },
        ModificationKind::InsertHtml => Changes {
            html: c.html.as_deref().map(fields::sanitize_html),
            insert_position: c.insert_position,
            ..Default::default()
        },
        ModificationKind::ReplaceHtml => Changes {
            html: c.html.as_deref().map(fields::sanitize_html),
            ..Default::default()
        },
        ModificationKind::Resize => Changes {
            width: css_value(&c.width),
            height: css_value(&c.height),
            ..Default::default()
        },
        ModificationKind::Reorder => Changes {
            new_index: c.new_index.map(|n| n.min(NEW_INDEX_MAX)),
            ..Default::default()
        },
        ModificationKind::Move => Changes {
            translate_x: clamp_f64(c.translate_x, -TRANSLATE_LIMIT_PX, TRANSLATE_LIMIT_PX, 0.0),
            translate_y: clamp_f64(c.translate_y, -TRANSLATE_LIMIT_PX, TRANSLATE_LIMIT_PX, 0.0),
            ..Default::default()
        },
        ModificationKind::Attribute => Changes {
            attributes: c.attributes.as_ref().map(fields::sanitize_attributes),
            ..Default::default()
        },
        ModificationKind::Class => Changes {
            add_class: c.add_class.as_deref().map(fields::sanitize_class_list),
            remove_class: c.remove_class.as_deref().map(fields::sanitize_class_list),
            ..Default::default()
        },
        ModificationKind::ClickRedirect => Changes {
            redirect_url: url(&c.redirect_url),
            open_in_new_tab: c.open_in_new_tab,
            ..Default::default()
        },
        ModificationKind::Tooltip => Changes {
            tooltip_text: text(&c.tooltip_text, fields::MAX_TOOLTIP_LEN),
            ..Default::default()
        },
        ModificationKind::Sticky => Changes {
            sticky_top: css_value(&c.sticky_top),
            sticky_z_index: c
                .sticky_z_index
                .map(|z| z.clamp(STICKY_Z_INDEX_MIN, STICKY_Z_INDEX_MAX)),
            ..Default::default()
        },
        ModificationKind::Placeholder => Changes {
            placeholder: text(&c.placeholder, fields::MAX_PLACEHOLDER_LEN),
            ..Default::default()
        },
        ModificationKind::FormAction => Changes {
            form_action: url(&c.form_action),
            form_method: c.form_method,
            ..Default::default()
        },
        ModificationKind::Animation => Changes {
            animation_name: c
                .animation_name
                .as_deref()
                .map(fields::sanitize_animation_name),
            animation_duration: clamp_f64(
                c.animation_duration,
                ANIMATION_DURATION_MIN_SECS,
                ANIMATION_DURATION_MAX_SECS,
                crate::apply::DEFAULT_ANIMATION_DURATION_SECS,
            ),
            animation_iteration_count: c.animation_iteration_count.map(|count| match count {
                IterationCount::Count(n) => {
                    IterationCount::Count(n.clamp(ANIMATION_ITERATIONS_MIN, ANIMATION_ITERATIONS_MAX))
                }
                infinite => infinite,
            }),
            custom_animation: c
                .custom_animation
                .as_deref()
                .map(fields::sanitize_declaration_block),
            ..Default::default()
        },
        ModificationKind::DragMove => Changes {
            target_selector: c.target_selector.as_deref().map(fields::sanitize_selector),
            drop_position: c.drop_position,
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::modification::{Infinite, InsertPosition};

    fn modification(kind: ModificationKind, changes: Changes) -> Modification {
        Modification::new("m1", "v1", "#target", kind, changes)
    }

    /// A hostile payload for every kind, with fields from other kinds mixed in.
    fn hostile_batch() -> Vec<Modification> {
        let everything = Changes {
            css: Some(BTreeMap::from([
                ("color".to_string(), "red; x: expression(alert(1))".to_string()),
                ("backgroundImage".to_string(), "url(javascript:alert(1))".to_string()),
            ])),
            text: Some("t".repeat(6000)),
            clone_count: Some(99),
            image_url: Some("javascript:alert(1)".into()),
            link_url: Some(" https://example.com ".into()),
            html: Some(r#"<img src=x onerror=alert(1)><script>alert(2)</script>"#.into()),
            insert_position: Some(InsertPosition::Prepend),
            width: Some("url(x) 10px".into()),
            new_index: Some(5000),
            translate_x: Some(f64::INFINITY),
            translate_y: Some(-9000.0),
            attributes: Some(BTreeMap::from([
                ("onclick".to_string(), "x()".to_string()),
                ("title".to_string(), "ok".to_string()),
            ])),
            add_class: Some(vec!["a b".into(), "<c>".into()]),
            redirect_url: Some("vbscript:x".into()),
            tooltip_text: Some("q".repeat(900)),
            sticky_z_index: Some(-4),
            placeholder: Some("p".repeat(900)),
            form_action: Some("data:text/html,x".into()),
            animation_name: Some("spin;}".into()),
            animation_duration: Some(0.0),
            animation_iteration_count: Some(IterationCount::Count(1000)),
            custom_animation: Some("animation: a 1s; behavior: url(x)".into()),
            target_selector: Some(format!(" {} ", "d".repeat(1200))),
            ..Default::default()
        };
        ModificationKind::ALL
            .into_iter()
            .map(|kind| modification(kind, everything.clone()))
            .collect()
    }

    #[test]
    fn test_sanitize_is_length_preserving() {
        let batch = hostile_batch();
        assert_eq!(sanitize(&batch).len(), batch.len());
        assert!(sanitize(&[]).is_empty());
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let once = sanitize(&hostile_batch());
        let twice = sanitize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_each_kind_keeps_only_its_fields() {
        let out = sanitize(&hostile_batch());
        let text = out
            .iter()
            .find(|m| m.kind == ModificationKind::Text)
            .unwrap();
        assert_eq!(
            text.changes,
            Changes {
                text: Some("t".repeat(fields::MAX_TEXT_LEN)),
                ..Default::default()
            }
        );
        let hide = out
            .iter()
            .find(|m| m.kind == ModificationKind::Hide)
            .unwrap();
        assert_eq!(hide.changes, Changes::default());
    }

    #[test]
    fn test_css_keys_are_allowlisted() {
        let out = sanitize(&hostile_batch());
        let css = out[0].changes.css.as_ref().unwrap();
        assert_eq!(css.len(), 1);
        assert!(css.keys().all(|k| CSS_ALLOWLIST.contains(&k.as_str())));
        assert_eq!(css["color"], "red x: alert(1))");
    }

    #[test]
    fn test_numeric_fields_are_clamped() {
        let out = sanitize(&hostile_batch());
        let by_kind = |kind| &out.iter().find(|m| m.kind == kind).unwrap().changes;

        assert_eq!(by_kind(ModificationKind::Clone).clone_count, Some(10));
        assert_eq!(by_kind(ModificationKind::Reorder).new_index, Some(1000));
        assert_eq!(by_kind(ModificationKind::Sticky).sticky_z_index, Some(0));
        let mv = by_kind(ModificationKind::Move);
        assert_eq!(mv.translate_x, Some(0.0));
        assert_eq!(mv.translate_y, Some(-5000.0));
        let anim = by_kind(ModificationKind::Animation);
        assert_eq!(anim.animation_duration, Some(0.1));
        assert_eq!(anim.animation_iteration_count, Some(IterationCount::Count(100)));
        assert_eq!(anim.animation_name.as_deref(), Some("spin"));
        assert_eq!(anim.custom_animation.as_deref(), Some("animation: a 1s;"));
    }

    #[test]
    fn test_url_fields_reject_blocked_schemes() {
        let out = sanitize(&hostile_batch());
        let by_kind = |kind| &out.iter().find(|m| m.kind == kind).unwrap().changes;
        assert_eq!(by_kind(ModificationKind::Image).image_url.as_deref(), Some(""));
        assert_eq!(by_kind(ModificationKind::ClickRedirect).redirect_url.as_deref(), Some(""));
        assert_eq!(by_kind(ModificationKind::FormAction).form_action.as_deref(), Some(""));
        assert_eq!(
            by_kind(ModificationKind::Link).link_url.as_deref(),
            Some("https://example.com")
        );
    }

    #[test]
    fn test_html_is_neutralized() {
        let out = sanitize(&hostile_batch());
        let insert = &out
            .iter()
            .find(|m| m.kind == ModificationKind::InsertHtml)
            .unwrap()
            .changes;
        assert_eq!(insert.html.as_deref(), Some("<img src=x data-blocked-error=alert(1)>"));
        assert_eq!(insert.insert_position, Some(InsertPosition::Prepend));
    }

    #[test]
    fn test_onclick_attribute_is_dropped() {
        let m = modification(
            ModificationKind::Attribute,
            Changes {
                attributes: Some(BTreeMap::from([
                    ("onclick".to_string(), "steal()".to_string()),
                    ("data-variant".to_string(), "b".to_string()),
                ])),
                ..Default::default()
            },
        );
        let out = sanitize_modification(&m);
        let attrs = out.changes.attributes.unwrap();
        assert!(!attrs.contains_key("onclick"));
        assert_eq!(attrs.len(), 1);
    }

    #[test]
    fn test_selector_and_ids_are_capped() {
        let m = Modification::new(
            "i".repeat(300),
            "v",
            format!("  {}  ", "s".repeat(2000)),
            ModificationKind::Hide,
            Changes::default(),
        );
        let out = sanitize_modification(&m);
        assert_eq!(out.id.chars().count(), fields::MAX_ID_LEN);
        assert_eq!(out.selector.chars().count(), fields::MAX_SELECTOR_LEN);
    }

    #[test]
    fn test_infinite_iterations_survive() {
        let m = modification(
            ModificationKind::Animation,
            Changes {
                animation_name: Some("pulse".into()),
                animation_iteration_count: Some(IterationCount::Infinite(Infinite::Infinite)),
                ..Default::default()
            },
        );
        assert_eq!(sanitize_modification(&m), m);
    }
}
