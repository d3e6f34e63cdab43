//! Lenient decoding of client JSON into typed modifications.
//!
//! Browsers send whatever the overlay produced: numbers as strings, class
//! lists as space-separated strings, unknown kinds, stray fields. Decoding
//! never fails; anything it cannot interpret is dropped or replaced by the
//! field's default, and an unknown kind becomes `css` with empty changes.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::modification::{
    Changes, FormMethod, Infinite, InsertPosition, IterationCount, LinkTarget, Modification,
    ModificationKind, SiblingPosition,
};

use super::sanitize_modification;

/// Decode and sanitize an untrusted batch. Length preserving.
pub fn sanitize_untrusted(values: &[Value]) -> Vec<Modification> {
    values
        .iter()
        .map(|value| sanitize_modification(&decode_modification(value)))
        .collect()
}

/// Best-effort decoding of one entry.
pub fn decode_modification(value: &Value) -> Modification {
    let Some(obj) = value.as_object() else {
        return Modification::new("", "", "", ModificationKind::Css, Changes::default());
    };

    let id = string_like(obj.get("id")).unwrap_or_default();
    let variant_id = string_like(obj.get("variantId")).unwrap_or_default();
    let selector = obj
        .get("selector")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .and_then(ModificationKind::parse);
    let Some(kind) = kind else {
        tracing::debug!(
            kind = ?obj.get("type"),
            "Coercing unknown modification type to css"
        );
        return Modification::new(id, variant_id, selector, ModificationKind::Css, Changes::default());
    };

    let changes = obj
        .get("changes")
        .and_then(Value::as_object)
        .map(decode_changes)
        .unwrap_or_default();

    Modification::new(id, variant_id, selector, kind, changes)
}

fn decode_changes(obj: &Map<String, Value>) -> Changes {
    let get = |key: &str| obj.get(key);
    Changes {
        css: get("css").and_then(string_map),
        text: get("text").and_then(string),
        clone_count: get("cloneCount").and_then(unsigned),
        clone_position: get("clonePosition").map(sibling_position),
        image_url: get("imageUrl").and_then(string),
        link_url: get("linkUrl").and_then(string),
        link_target: get("linkTarget").map(link_target),
        html: get("html").and_then(string),
        insert_position: get("insertPosition").map(insert_position),
        width: get("width").and_then(|v| string_like(Some(v))),
        height: get("height").and_then(|v| string_like(Some(v))),
        new_index: get("newIndex").and_then(unsigned),
        translate_x: get("translateX").and_then(float),
        translate_y: get("translateY").and_then(float),
        attributes: get("attributes").and_then(string_map),
        add_class: get("addClass").and_then(string_list),
        remove_class: get("removeClass").and_then(string_list),
        redirect_url: get("redirectUrl").and_then(string),
        open_in_new_tab: get("openInNewTab").and_then(boolean),
        tooltip_text: get("tooltipText").and_then(string),
        sticky_top: get("stickyTop").and_then(|v| string_like(Some(v))),
        sticky_z_index: get("stickyZIndex").and_then(integer),
        placeholder: get("placeholder").and_then(string),
        form_action: get("formAction").and_then(string),
        form_method: get("formMethod").map(form_method),
        animation_name: get("animationName").and_then(string),
        animation_duration: get("animationDuration").and_then(float),
        animation_iteration_count: get("animationIterationCount").map(iteration_count),
        custom_animation: get("customAnimation").and_then(string),
        target_selector: get("targetSelector").and_then(string),
        drop_position: get("dropPosition").map(sibling_position),
    }
}

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

fn string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

/// Strings pass through; numbers and booleans are stringified.
fn string_like(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| s.trim().parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        _ => None,
    }
}

/// Negative values saturate to zero; later clamping applies the real range.
fn unsigned(value: &Value) -> Option<u32> {
    integer(value).map(|n| n.clamp(0, i64::from(u32::MAX)) as u32)
}

fn float(value: &Value) -> Option<f64> {
    let f = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    f.is_finite().then_some(f)
}

fn boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

fn string_map(value: &Value) -> Option<BTreeMap<String, String>> {
    let obj = value.as_object()?;
    Some(
        obj.iter()
            .filter_map(|(k, v)| string_like(Some(v)).map(|v| (k.clone(), v)))
            .collect(),
    )
}

/// An array of strings, or a single whitespace/comma separated string.
fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        ),
        Value::String(s) => Some(
            s.split(|c: char| c.is_whitespace() || c == ',')
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Enumerations (out-of-range values fall back to the default)
// ---------------------------------------------------------------------------

fn lowercase(value: &Value) -> String {
    value.as_str().unwrap_or_default().trim().to_ascii_lowercase()
}

fn sibling_position(value: &Value) -> SiblingPosition {
    match lowercase(value).as_str() {
        "before" => SiblingPosition::Before,
        _ => SiblingPosition::After,
    }
}

fn insert_position(value: &Value) -> InsertPosition {
    match lowercase(value).as_str() {
        "before" => InsertPosition::Before,
        "prepend" => InsertPosition::Prepend,
        "append" => InsertPosition::Append,
        _ => InsertPosition::After,
    }
}

fn link_target(value: &Value) -> LinkTarget {
    match lowercase(value).as_str() {
        "_blank" => LinkTarget::NewTab,
        _ => LinkTarget::SameTab,
    }
}

fn form_method(value: &Value) -> FormMethod {
    match lowercase(value).as_str() {
        "post" => FormMethod::Post,
        _ => FormMethod::Get,
    }
}

fn iteration_count(value: &Value) -> IterationCount {
    if lowercase(value) == "infinite" {
        return IterationCount::Infinite(Infinite::Infinite);
    }
    unsigned(value)
        .map(IterationCount::Count)
        .unwrap_or_default()
}
