//! The modification vocabulary: a declarative, replayable DOM edit keyed by
//! selector and kind.
//!
//! Every kind owns a disjoint subset of the optional fields on [`Changes`].
//! The wire format is camelCase JSON, e.g.
//! `{"id":"m1","variantId":"v1","selector":"#cta","type":"text","changes":{"text":"Buy"}}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// Closed set of edit kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModificationKind {
    Css,
    Text,
    Hide,
    Remove,
    Clone,
    Image,
    Link,
    InsertHtml,
    ReplaceHtml,
    Resize,
    Reorder,
    Move,
    Attribute,
    Class,
    ClickRedirect,
    Tooltip,
    Sticky,
    Placeholder,
    FormAction,
    Animation,
    DragMove,
}

impl ModificationKind {
    pub const ALL: [ModificationKind; 21] = [
        Self::Css,
        Self::Text,
        Self::Hide,
        Self::Remove,
        Self::Clone,
        Self::Image,
        Self::Link,
        Self::InsertHtml,
        Self::ReplaceHtml,
        Self::Resize,
        Self::Reorder,
        Self::Move,
        Self::Attribute,
        Self::Class,
        Self::ClickRedirect,
        Self::Tooltip,
        Self::Sticky,
        Self::Placeholder,
        Self::FormAction,
        Self::Animation,
        Self::DragMove,
    ];

    /// Wire name, as used in the `type` field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::Text => "text",
            Self::Hide => "hide",
            Self::Remove => "remove",
            Self::Clone => "clone",
            Self::Image => "image",
            Self::Link => "link",
            Self::InsertHtml => "insertHtml",
            Self::ReplaceHtml => "replaceHtml",
            Self::Resize => "resize",
            Self::Reorder => "reorder",
            Self::Move => "move",
            Self::Attribute => "attribute",
            Self::Class => "class",
            Self::ClickRedirect => "clickRedirect",
            Self::Tooltip => "tooltip",
            Self::Sticky => "sticky",
            Self::Placeholder => "placeholder",
            Self::FormAction => "formAction",
            Self::Animation => "animation",
            Self::DragMove => "dragMove",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl std::fmt::Display for ModificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Enumerated field values
// ---------------------------------------------------------------------------

/// Placement of a new or moved node relative to a reference sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiblingPosition {
    Before,
    #[default]
    After,
}

/// Placement for `insertHtml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertPosition {
    Before,
    #[default]
    After,
    Prepend,
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinkTarget {
    #[default]
    #[serde(rename = "_self")]
    SameTab,
    #[serde(rename = "_blank")]
    NewTab,
}

impl LinkTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SameTab => "_self",
            Self::NewTab => "_blank",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormMethod {
    #[default]
    Get,
    Post,
}

impl FormMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
        }
    }
}

/// `animationIterationCount`: a bounded count or the `infinite` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IterationCount {
    Count(u32),
    Infinite(Infinite),
}

/// The literal string `"infinite"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Infinite {
    Infinite,
}

impl Default for IterationCount {
    fn default() -> Self {
        Self::Count(1)
    }
}

impl std::fmt::Display for IterationCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Infinite(_) => f.write_str("infinite"),
        }
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Kind-specific payload. Fields not owned by the modification's kind are
/// ignored by the apply engine and dropped by sanitization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Changes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub clone_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clone_position: Option<SiblingPosition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_target: Option<LinkTarget>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_position: Option<InsertPosition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_index: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub translate_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translate_y: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_class: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_class: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_in_new_tab: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip_text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticky_top: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticky_z_index: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_method: Option<FormMethod>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation_duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation_iteration_count: Option<IterationCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_animation: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drop_position: Option<SiblingPosition>,
}

/// A single declarative DOM edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modification {
    pub id: String,
    pub variant_id: String,
    pub selector: String,
    #[serde(rename = "type")]
    pub kind: ModificationKind,
    #[serde(default)]
    pub changes: Changes,
}

impl Modification {
    pub fn new(
        id: impl Into<String>,
        variant_id: impl Into<String>,
        selector: impl Into<String>,
        kind: ModificationKind,
        changes: Changes,
    ) -> Self {
        Self {
            id: id.into(),
            variant_id: variant_id.into(),
            selector: selector.into(),
            kind,
            changes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names_round_trip() {
        for kind in ModificationKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::json!(kind.as_str()));
            assert_eq!(ModificationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ModificationKind::parse("explode"), None);
    }

    #[test]
    fn test_modification_wire_shape() {
        let json = serde_json::json!({
            "id": "m1",
            "variantId": "v1",
            "selector": "#hero-cta",
            "type": "insertHtml",
            "changes": { "html": "<b>hi</b>", "insertPosition": "prepend" }
        });
        let m: Modification = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(m.kind, ModificationKind::InsertHtml);
        assert_eq!(m.changes.insert_position, Some(InsertPosition::Prepend));
        assert_eq!(serde_json::to_value(&m).unwrap(), json);
    }

    #[test]
    fn test_iteration_count_accepts_number_or_infinite() {
        let c: Changes =
            serde_json::from_value(serde_json::json!({"animationIterationCount": "infinite"}))
                .unwrap();
        assert_eq!(
            c.animation_iteration_count,
            Some(IterationCount::Infinite(Infinite::Infinite))
        );
        let c: Changes =
            serde_json::from_value(serde_json::json!({"animationIterationCount": 3})).unwrap();
        assert_eq!(c.animation_iteration_count, Some(IterationCount::Count(3)));
        assert_eq!(IterationCount::Count(3).to_string(), "3");
    }

    #[test]
    fn test_link_target_wire_names() {
        assert_eq!(
            serde_json::to_value(LinkTarget::NewTab).unwrap(),
            serde_json::json!("_blank")
        );
    }

    #[test]
    fn test_missing_changes_defaults_to_empty() {
        let m: Modification = serde_json::from_value(serde_json::json!({
            "id": "m1", "variantId": "v1", "selector": "p", "type": "hide"
        }))
        .unwrap();
        assert_eq!(m.changes, Changes::default());
    }
}
