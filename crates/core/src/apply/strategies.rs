use crate::dom::{Document, NodeId};
use crate::modification::{Changes, InsertPosition, LinkTarget, ModificationKind, SiblingPosition};

use super::{select, MutationStrategy};

pub const CLONE_COUNT_MIN: u32 = 1;
pub const CLONE_COUNT_MAX: u32 = 10;
pub const DEFAULT_STICKY_TOP: &str = "0px";
pub const DEFAULT_STICKY_Z_INDEX: i64 = 1000;
pub const DEFAULT_ANIMATION_DURATION_SECS: f64 = 1.0;

/// Attributes read by the embedded runtime to bind click redirects.
pub const REDIRECT_ATTR: &str = "data-navlens-redirect";
pub const REDIRECT_TARGET_ATTR: &str = "data-navlens-redirect-target";

/// Lookup table, one entry per kind.
pub static STRATEGIES: [&dyn MutationStrategy; 21] = [
    &CssStrategy,
    &TextStrategy,
    &HideStrategy,
    &RemoveStrategy,
    &CloneStrategy,
    &ImageStrategy,
    &LinkStrategy,
    &InsertHtmlStrategy,
    &ReplaceHtmlStrategy,
    &ResizeStrategy,
    &ReorderStrategy,
    &MoveStrategy,
    &AttributeStrategy,
    &ClassStrategy,
    &ClickRedirectStrategy,
    &TooltipStrategy,
    &StickyStrategy,
    &PlaceholderStrategy,
    &FormActionStrategy,
    &AnimationStrategy,
    &DragMoveStrategy,
];

macro_rules! strategy {
    ($name:ident, $kind:ident, |$doc:ident, $node:ident, $changes:ident| $body:block) => {
        pub struct $name;

        impl MutationStrategy for $name {
            fn kind(&self) -> ModificationKind {
                ModificationKind::$kind
            }

            fn apply(&self, $doc: &mut Document, $node: NodeId, $changes: &Changes) $body
        }
    };
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// `node` itself if it has tag `tag`, otherwise its nearest such ancestor.
fn self_or_ancestor(doc: &Document, node: NodeId, tag: &str) -> Option<NodeId> {
    if doc.tag_name(node) == Some(tag) {
        return Some(node);
    }
    doc.ancestors(node)
        .into_iter()
        .find(|a| doc.tag_name(*a) == Some(tag))
}

/// `node` itself if it has tag `tag`, otherwise its only such descendant.
fn self_or_unique_descendant(doc: &Document, node: NodeId, tags: &[&str]) -> Option<NodeId> {
    if doc.tag_name(node).is_some_and(|t| tags.contains(&t)) {
        return Some(node);
    }
    let found: Vec<NodeId> = doc
        .elements_under(node)
        .into_iter()
        .filter(|n| doc.tag_name(*n).is_some_and(|t| tags.contains(&t)))
        .collect();
    match found.as_slice() {
        [only] => Some(*only),
        _ => None,
    }
}

fn is_valid_attr_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
}

fn format_px(value: f64) -> String {
    format!("{value}px")
}

// ---------------------------------------------------------------------------
// Style and content
// ---------------------------------------------------------------------------

strategy!(CssStrategy, Css, |doc, node, changes| {
    for (property, value) in changes.css.iter().flatten() {
        doc.set_style_property(node, property, value);
    }
});

strategy!(TextStrategy, Text, |doc, node, changes| {
    if let Some(text) = &changes.text {
        doc.set_text_content(node, text);
    }
});

strategy!(HideStrategy, Hide, |doc, node, _changes| {
    doc.set_style_property(node, "display", "none");
});

strategy!(RemoveStrategy, Remove, |doc, node, _changes| {
    doc.detach(node);
});

strategy!(ResizeStrategy, Resize, |doc, node, changes| {
    if let Some(width) = non_empty(&changes.width) {
        doc.set_style_property(node, "width", width);
    }
    if let Some(height) = non_empty(&changes.height) {
        doc.set_style_property(node, "height", height);
    }
});

strategy!(MoveStrategy, Move, |doc, node, changes| {
    let x = changes.translate_x.unwrap_or(0.0);
    let y = changes.translate_y.unwrap_or(0.0);
    doc.set_style_property(
        node,
        "transform",
        &format!("translate({}, {})", format_px(x), format_px(y)),
    );
});

strategy!(StickyStrategy, Sticky, |doc, node, changes| {
    let top = non_empty(&changes.sticky_top).unwrap_or(DEFAULT_STICKY_TOP);
    let z_index = changes.sticky_z_index.unwrap_or(DEFAULT_STICKY_Z_INDEX);
    doc.set_style_property(node, "position", "sticky");
    doc.set_style_property(node, "top", top);
    doc.set_style_property(node, "z-index", &z_index.to_string());
});

strategy!(AnimationStrategy, Animation, |doc, node, changes| {
    let Some(name) = non_empty(&changes.animation_name) else {
        return;
    };
    if name == "custom" {
        if let Some(custom) = non_empty(&changes.custom_animation) {
            doc.merge_style_text(node, custom);
        }
        return;
    }
    let duration = changes
        .animation_duration
        .unwrap_or(DEFAULT_ANIMATION_DURATION_SECS);
    let iterations = changes.animation_iteration_count.unwrap_or_default();
    doc.set_style_property(
        node,
        "animation",
        &format!("{name} {duration}s ease {iterations}"),
    );
});

// ---------------------------------------------------------------------------
// Structure
// ---------------------------------------------------------------------------

strategy!(CloneStrategy, Clone, |doc, node, changes| {
    let count = changes
        .clone_count
        .unwrap_or(CLONE_COUNT_MIN)
        .clamp(CLONE_COUNT_MIN, CLONE_COUNT_MAX);
    let position = changes.clone_position.unwrap_or_default();

    let mut anchor = node;
    for _ in 0..count {
        let copy = doc.deep_clone(node);
        doc.remove_attr(copy, "id");
        for descendant in doc.elements_under(copy) {
            doc.remove_attr(descendant, "id");
        }
        match position {
            SiblingPosition::After => {
                doc.insert_after(anchor, copy);
                anchor = copy;
            }
            SiblingPosition::Before => doc.insert_before(node, copy),
        }
    }
});

strategy!(InsertHtmlStrategy, InsertHtml, |doc, node, changes| {
    // Inserted verbatim; surrounding whitespace is part of the markup.
    let Some(html) = changes.html.as_deref().filter(|h| !h.trim().is_empty()) else {
        return;
    };
    let nodes = doc.parse_fragment(html);
    match changes.insert_position.unwrap_or_default() {
        InsertPosition::Before => {
            for new in nodes {
                doc.insert_before(node, new);
            }
        }
        InsertPosition::After => {
            let mut anchor = node;
            for new in nodes {
                doc.insert_after(anchor, new);
                anchor = new;
            }
        }
        InsertPosition::Prepend => {
            for new in nodes.into_iter().rev() {
                doc.prepend_child(node, new);
            }
        }
        InsertPosition::Append => {
            for new in nodes {
                doc.append_child(node, new);
            }
        }
    }
});

strategy!(ReplaceHtmlStrategy, ReplaceHtml, |doc, node, changes| {
    let Some(html) = changes.html.as_deref() else {
        return;
    };
    for new in doc.parse_fragment(html) {
        doc.insert_before(node, new);
    }
    doc.detach(node);
});

strategy!(ReorderStrategy, Reorder, |doc, node, changes| {
    let Some(parent) = doc.parent(node) else {
        return;
    };
    let siblings: Vec<NodeId> = doc
        .element_children(parent)
        .into_iter()
        .filter(|s| *s != node)
        .collect();
    let Some(last) = siblings.last().copied() else {
        return;
    };
    let index = changes.new_index.unwrap_or(0) as usize;
    match siblings.get(index) {
        Some(reference) => doc.insert_before(*reference, node),
        None => doc.insert_after(last, node),
    }
});

strategy!(DragMoveStrategy, DragMove, |doc, node, changes| {
    let Some(target_selector) = non_empty(&changes.target_selector) else {
        return;
    };
    let Some(target) = select(doc, target_selector).and_then(|(nodes, _)| nodes.first().copied())
    else {
        tracing::debug!(target = %target_selector, "Drop target not found");
        return;
    };
    if doc.contains(node, target) {
        return;
    }
    match changes.drop_position.unwrap_or_default() {
        SiblingPosition::Before => doc.insert_before(target, node),
        SiblingPosition::After => doc.insert_after(target, node),
    }
});

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

strategy!(ImageStrategy, Image, |doc, node, changes| {
    let Some(url) = non_empty(&changes.image_url) else {
        return;
    };
    let Some(img) = self_or_unique_descendant(doc, node, &["img"]) else {
        return;
    };
    doc.set_attr(img, "src", url);
    doc.remove_attr(img, "srcset");

    if let Some(picture) = doc.parent(img).filter(|p| doc.tag_name(*p) == Some("picture")) {
        for source in doc.element_children(picture) {
            if doc.tag_name(source) == Some("source") {
                doc.remove_attr(source, "srcset");
            }
        }
    }
});

strategy!(LinkStrategy, Link, |doc, node, changes| {
    let Some(anchor) = self_or_ancestor(doc, node, "a") else {
        return;
    };
    if let Some(url) = non_empty(&changes.link_url) {
        doc.set_attr(anchor, "href", url);
    }
    if let Some(target) = changes.link_target {
        doc.set_attr(anchor, "target", target.as_str());
        if target == LinkTarget::NewTab {
            doc.set_attr(anchor, "rel", "noopener noreferrer");
        }
    }
});

strategy!(AttributeStrategy, Attribute, |doc, node, changes| {
    for (name, value) in changes.attributes.iter().flatten() {
        if is_valid_attr_name(name) {
            doc.set_attr(node, &name.to_ascii_lowercase(), value.as_str());
        }
    }
});

strategy!(ClassStrategy, Class, |doc, node, changes| {
    for class in changes.add_class.iter().flatten() {
        doc.add_class(node, class);
    }
    for class in changes.remove_class.iter().flatten() {
        doc.remove_class(node, class);
    }
});

strategy!(ClickRedirectStrategy, ClickRedirect, |doc, node, changes| {
    match non_empty(&changes.redirect_url) {
        Some(url) => {
            let target = if changes.open_in_new_tab.unwrap_or(false) {
                LinkTarget::NewTab
            } else {
                LinkTarget::SameTab
            };
            doc.set_attr(node, REDIRECT_ATTR, url);
            doc.set_attr(node, REDIRECT_TARGET_ATTR, target.as_str());
            doc.set_style_property(node, "cursor", "pointer");
        }
        None => {
            doc.remove_attr(node, REDIRECT_ATTR);
            doc.remove_attr(node, REDIRECT_TARGET_ATTR);
            doc.set_style_property(node, "cursor", "");
        }
    }
});

strategy!(TooltipStrategy, Tooltip, |doc, node, changes| {
    if let Some(text) = &changes.tooltip_text {
        doc.set_attr(node, "title", text.as_str());
    }
});

strategy!(PlaceholderStrategy, Placeholder, |doc, node, changes| {
    let Some(placeholder) = &changes.placeholder else {
        return;
    };
    if let Some(field) = self_or_unique_descendant(doc, node, &["input", "textarea"]) {
        doc.set_attr(field, "placeholder", placeholder.as_str());
    }
});

strategy!(FormActionStrategy, FormAction, |doc, node, changes| {
    let Some(form) = self_or_ancestor(doc, node, "form") else {
        return;
    };
    if let Some(action) = non_empty(&changes.form_action) {
        doc.set_attr(form, "action", action);
    }
    if let Some(method) = changes.form_method {
        doc.set_attr(form, "method", method.as_str());
    }
});
