//! Editor session: a pure reducer from editor events to effects.
//!
//! The live document is always `render_document(base, modifications)`; a thin
//! adapter translates browser events into [`EditorEvent`]s and performs the
//! returned [`EditorEffect`]s (repaint, network save, prompts).

use crate::apply::render_document;
use crate::dom::{Document, NodeId};
use crate::modification::{Changes, Modification, ModificationKind, SiblingPosition};
use crate::selector::resolve;
use crate::types::now_millis;

use super::history::History;

/// Interaction mode. Replaces a page-global mode flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorMode {
    /// Clicking selects elements.
    #[default]
    Edit,
    /// Elements can be dragged onto a drop target.
    Drag,
    /// The page behaves normally; editor input is ignored.
    Navigate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveState {
    #[default]
    Idle,
    InFlight,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    ElementSelected(NodeId),
    ModificationAdded(Modification),
    /// Replaces the modification with the same id, in place.
    ModificationUpdated(Modification),
    ModificationRemoved(String),
    UndoRequested,
    RedoRequested,
    ModeChanged(EditorMode),
    DragStarted(NodeId),
    DropTargetEvaluated {
        target: NodeId,
        position: SiblingPosition,
    },
    SaveRequested,
    SaveCompleted,
    SaveFailed(String),
    CloseRequested,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorEffect {
    /// The live document was recomputed.
    Rendered,
    SelectionChanged { selector: Option<String> },
    /// Send this array to the save endpoint.
    SaveDispatched(Vec<Modification>),
    Notice(String),
    /// Unsaved changes exist; ask before closing.
    ConfirmDiscard,
    Closed,
    Ignored(&'static str),
}

#[derive(Debug, Clone)]
pub struct EditorSession {
    variant_id: String,
    base: Document,
    live: Document,
    modifications: Vec<Modification>,
    history: History,
    mode: EditorMode,
    selected: Option<NodeId>,
    dragging: Option<NodeId>,
    save_state: SaveState,
    dirty: bool,
    // Bumped on every change to `modifications`.
    revision: u64,
    // Revision carried by the save in flight.
    dispatched_revision: u64,
    next_seq: u64,
}

impl EditorSession {
    /// Start a session over the pristine page with the variant's stored
    /// modifications already applied.
    pub fn new(variant_id: impl Into<String>, base: Document, modifications: Vec<Modification>) -> Self {
        let live = render_document(&base, &modifications);
        Self {
            variant_id: variant_id.into(),
            base,
            live,
            modifications,
            history: History::new(),
            mode: EditorMode::default(),
            selected: None,
            dragging: None,
            save_state: SaveState::default(),
            dirty: false,
            revision: 0,
            dispatched_revision: 0,
            next_seq: 0,
        }
    }

    pub fn document(&self) -> &Document {
        &self.live
    }

    pub fn modifications(&self) -> &[Modification] {
        &self.modifications
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    pub fn save_state(&self) -> SaveState {
        self.save_state
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Fresh id for a modification created by the session itself.
    pub fn next_modification_id(&mut self) -> String {
        self.next_seq += 1;
        format!("mod_{}_{}", now_millis(), self.next_seq)
    }

    pub fn dispatch(&mut self, event: EditorEvent) -> Vec<EditorEffect> {
        match event {
            EditorEvent::ElementSelected(node) => self.select(node),
            EditorEvent::ModificationAdded(modification) => self.add(modification),
            EditorEvent::ModificationUpdated(modification) => self.update(modification),
            EditorEvent::ModificationRemoved(id) => self.remove(&id),
            EditorEvent::UndoRequested => self.undo(),
            EditorEvent::RedoRequested => self.redo(),
            EditorEvent::ModeChanged(mode) => self.change_mode(mode),
            EditorEvent::DragStarted(node) => self.start_drag(node),
            EditorEvent::DropTargetEvaluated { target, position } => self.drop_on(target, position),
            EditorEvent::SaveRequested => self.request_save(),
            EditorEvent::SaveCompleted => {
                self.save_state = SaveState::Idle;
                // Edits made while the save was in flight are still unsaved.
                self.dirty = self.revision != self.dispatched_revision;
                vec![EditorEffect::Notice("Changes saved".into())]
            }
            EditorEvent::SaveFailed(message) => {
                tracing::warn!(variant_id = %self.variant_id, error = %message, "Save failed");
                self.save_state = SaveState::Idle;
                vec![EditorEffect::Notice(format!("Save failed: {message}"))]
            }
            EditorEvent::CloseRequested => {
                if self.dirty {
                    vec![EditorEffect::ConfirmDiscard]
                } else {
                    vec![EditorEffect::Closed]
                }
            }
        }
    }

    // ---------------------------------------------------------------------------
    // Selection and drag
    // ---------------------------------------------------------------------------

    fn select(&mut self, node: NodeId) -> Vec<EditorEffect> {
        if self.mode != EditorMode::Edit {
            return vec![EditorEffect::Ignored("selection is only available in edit mode")];
        }
        if !self.live.is_element(node) || !self.live.is_connected(node) {
            return vec![EditorEffect::Ignored("not an element on the page")];
        }
        self.selected = Some(node);
        vec![EditorEffect::SelectionChanged {
            selector: Some(resolve(&self.live, node)),
        }]
    }

    fn change_mode(&mut self, mode: EditorMode) -> Vec<EditorEffect> {
        self.mode = mode;
        self.dragging = None;
        let mut effects = Vec::new();
        if mode != EditorMode::Edit && self.selected.take().is_some() {
            effects.push(EditorEffect::SelectionChanged { selector: None });
        }
        effects
    }

    fn start_drag(&mut self, node: NodeId) -> Vec<EditorEffect> {
        if self.mode != EditorMode::Drag {
            return vec![EditorEffect::Ignored("dragging is only available in drag mode")];
        }
        if !self.live.is_element(node) || !self.live.is_connected(node) {
            return vec![EditorEffect::Ignored("not an element on the page")];
        }
        self.dragging = Some(node);
        Vec::new()
    }

    fn drop_on(&mut self, target: NodeId, position: SiblingPosition) -> Vec<EditorEffect> {
        if self.mode != EditorMode::Drag {
            return vec![EditorEffect::Ignored("dragging is only available in drag mode")];
        }
        let Some(dragged) = self.dragging.take() else {
            return vec![EditorEffect::Ignored("no drag in progress")];
        };
        if !self.live.is_element(target) || self.live.contains(dragged, target) {
            return vec![EditorEffect::Ignored("cannot drop an element onto itself")];
        }

        let changes = Changes {
            target_selector: Some(resolve(&self.live, target)),
            drop_position: Some(position),
            ..Default::default()
        };
        let id = self.next_modification_id();
        let modification = Modification::new(
            id,
            self.variant_id.clone(),
            resolve(&self.live, dragged),
            ModificationKind::DragMove,
            changes,
        );
        self.add(modification)
    }

    // ---------------------------------------------------------------------------
    // Modification array
    // ---------------------------------------------------------------------------

    fn add(&mut self, modification: Modification) -> Vec<EditorEffect> {
        self.history.record(&self.modifications);
        self.modifications.push(modification);
        self.rerender()
    }

    fn update(&mut self, modification: Modification) -> Vec<EditorEffect> {
        let Some(index) = self.position_of(&modification.id) else {
            return vec![EditorEffect::Ignored("unknown modification")];
        };
        self.history.record(&self.modifications);
        self.modifications[index] = modification;
        self.rerender()
    }

    fn remove(&mut self, id: &str) -> Vec<EditorEffect> {
        let Some(index) = self.position_of(id) else {
            return vec![EditorEffect::Ignored("unknown modification")];
        };
        self.history.record(&self.modifications);
        self.modifications.remove(index);
        self.rerender()
    }

    fn undo(&mut self) -> Vec<EditorEffect> {
        match self.history.undo(&self.modifications) {
            Some(previous) => {
                self.modifications = previous;
                self.rerender()
            }
            None => vec![EditorEffect::Ignored("nothing to undo")],
        }
    }

    fn redo(&mut self) -> Vec<EditorEffect> {
        match self.history.redo(&self.modifications) {
            Some(next) => {
                self.modifications = next;
                self.rerender()
            }
            None => vec![EditorEffect::Ignored("nothing to redo")],
        }
    }

    fn position_of(&self, id: &str) -> Option<usize> {
        self.modifications.iter().position(|m| m.id == id)
    }

    fn rerender(&mut self) -> Vec<EditorEffect> {
        self.live = render_document(&self.base, &self.modifications);
        self.dirty = true;
        self.revision += 1;

        let mut effects = vec![EditorEffect::Rendered];
        if let Some(node) = self.selected {
            if !self.live.is_connected(node) {
                self.selected = None;
                effects.push(EditorEffect::SelectionChanged { selector: None });
            }
        }
        effects
    }

    // ---------------------------------------------------------------------------
    // Saving
    // ---------------------------------------------------------------------------

    fn request_save(&mut self) -> Vec<EditorEffect> {
        if self.save_state == SaveState::InFlight {
            return vec![EditorEffect::Ignored("a save is already in progress")];
        }
        self.save_state = SaveState::InFlight;
        self.dispatched_revision = self.revision;
        tracing::info!(
            variant_id = %self.variant_id,
            count = self.modifications.len(),
            "Dispatching save"
        );
        vec![EditorEffect::SaveDispatched(self.modifications.clone())]
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const PAGE: &str = r#"<html><body><section id="hero"><h1 style="color: black">Welcome</h1><button id="hero-cta">Sign Up</button></section><ul id="list"><li id="a">A</li><li id="b">B</li></ul></body></html>"#;

    fn session() -> EditorSession {
        EditorSession::new("var-1", Document::parse(PAGE), Vec::new())
    }

    fn node(session: &EditorSession, selector: &str) -> NodeId {
        session.document().query_selector(selector).unwrap().unwrap()
    }

    fn text_mod(id: &str, selector: &str, text: &str) -> Modification {
        Modification::new(
            id,
            "var-1",
            selector,
            ModificationKind::Text,
            Changes {
                text: Some(text.into()),
                ..Default::default()
            },
        )
    }

    // -- Undo / redo --

    #[test]
    fn test_undo_after_add_restores_text_and_style() {
        let mut session = session();
        let cta = node(&session, "#hero-cta");
        let h1 = node(&session, "h1");
        let text_before = session.document().text_content(cta);
        let style_before = session.document().attr(h1, "style").map(str::to_string);

        session.dispatch(EditorEvent::ModificationAdded(text_mod("m1", "#hero-cta", "Buy Now")));
        let css = Modification::new(
            "m2",
            "var-1",
            "h1",
            ModificationKind::Css,
            Changes {
                css: Some([("color".to_string(), "red".to_string())].into()),
                ..Default::default()
            },
        );
        session.dispatch(EditorEvent::ModificationAdded(css));
        assert_eq!(session.document().text_content(cta), "Buy Now");
        assert_eq!(session.document().style_property(h1, "color").as_deref(), Some("red"));

        session.dispatch(EditorEvent::UndoRequested);
        session.dispatch(EditorEvent::UndoRequested);
        assert_eq!(session.document().text_content(cta), text_before);
        assert_eq!(
            session.document().attr(h1, "style").map(str::to_string),
            style_before
        );
        assert!(session.modifications().is_empty());
    }

    #[test]
    fn test_redo_replays_undone_state() {
        let mut session = session();
        session.dispatch(EditorEvent::ModificationAdded(text_mod("m1", "#hero-cta", "Buy Now")));
        session.dispatch(EditorEvent::UndoRequested);
        assert!(session.can_redo());

        let effects = session.dispatch(EditorEvent::RedoRequested);
        assert_eq!(effects, vec![EditorEffect::Rendered]);
        let cta = node(&session, "#hero-cta");
        assert_eq!(session.document().text_content(cta), "Buy Now");
    }

    #[test]
    fn test_new_edit_after_undo_clears_redo() {
        let mut session = session();
        session.dispatch(EditorEvent::ModificationAdded(text_mod("m1", "#hero-cta", "One")));
        session.dispatch(EditorEvent::UndoRequested);
        session.dispatch(EditorEvent::ModificationAdded(text_mod("m2", "#hero-cta", "Two")));
        assert!(!session.can_redo());
        assert_matches!(
            session.dispatch(EditorEvent::RedoRequested).as_slice(),
            [EditorEffect::Ignored(_)]
        );
    }

    #[test]
    fn test_undo_removal_restores_node() {
        let mut session = session();
        let remove = Modification::new("m1", "var-1", "#b", ModificationKind::Remove, Changes::default());
        session.dispatch(EditorEvent::ModificationAdded(remove));
        assert!(session.document().query_selector("#b").unwrap().is_none());

        session.dispatch(EditorEvent::UndoRequested);
        assert!(session.document().query_selector("#b").unwrap().is_some());
    }

    // -- Update / remove --

    #[test]
    fn test_update_replaces_in_place_and_remove_drops() {
        let mut session = session();
        session.dispatch(EditorEvent::ModificationAdded(text_mod("m1", "#a", "first")));
        session.dispatch(EditorEvent::ModificationAdded(text_mod("m2", "#b", "second")));
        session.dispatch(EditorEvent::ModificationUpdated(text_mod("m1", "#a", "changed")));

        let ids: Vec<&str> = session.modifications().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m1", "m2"]);
        assert_eq!(session.modifications()[0].changes.text.as_deref(), Some("changed"));

        session.dispatch(EditorEvent::ModificationRemoved("m2".into()));
        assert_eq!(session.modifications().len(), 1);
        assert_matches!(
            session.dispatch(EditorEvent::ModificationRemoved("nope".into())).as_slice(),
            [EditorEffect::Ignored(_)]
        );
    }

    // -- Modes --

    #[test]
    fn test_selection_only_in_edit_mode() {
        let mut session = session();
        let cta = node(&session, "#hero-cta");
        assert_eq!(
            session.dispatch(EditorEvent::ElementSelected(cta)),
            vec![EditorEffect::SelectionChanged {
                selector: Some("#hero-cta".into())
            }]
        );

        let effects = session.dispatch(EditorEvent::ModeChanged(EditorMode::Navigate));
        assert_eq!(effects, vec![EditorEffect::SelectionChanged { selector: None }]);
        assert_matches!(
            session.dispatch(EditorEvent::ElementSelected(cta)).as_slice(),
            [EditorEffect::Ignored(_)]
        );
        assert_matches!(
            session.dispatch(EditorEvent::DragStarted(cta)).as_slice(),
            [EditorEffect::Ignored(_)]
        );
    }

    #[test]
    fn test_drop_creates_drag_move() {
        let mut session = session();
        session.dispatch(EditorEvent::ModeChanged(EditorMode::Drag));
        let b = node(&session, "#b");
        let a = node(&session, "#a");
        session.dispatch(EditorEvent::DragStarted(b));
        let effects = session.dispatch(EditorEvent::DropTargetEvaluated {
            target: a,
            position: SiblingPosition::Before,
        });
        assert_eq!(effects, vec![EditorEffect::Rendered]);

        let added = &session.modifications()[0];
        assert_eq!(added.kind, ModificationKind::DragMove);
        assert_eq!(added.selector, "#b");
        assert_eq!(added.changes.target_selector.as_deref(), Some("#a"));
        let list = node(&session, "#list");
        assert_eq!(session.document().text_content(list), "BA");
        assert!(session.can_undo());
    }

    #[test]
    fn test_drop_onto_self_or_descendant_is_rejected() {
        let mut session = session();
        session.dispatch(EditorEvent::ModeChanged(EditorMode::Drag));
        let hero = node(&session, "#hero");
        let cta = node(&session, "#hero-cta");

        session.dispatch(EditorEvent::DragStarted(hero));
        assert_matches!(
            session
                .dispatch(EditorEvent::DropTargetEvaluated {
                    target: cta,
                    position: SiblingPosition::After,
                })
                .as_slice(),
            [EditorEffect::Ignored(_)]
        );

        session.dispatch(EditorEvent::DragStarted(hero));
        assert_matches!(
            session
                .dispatch(EditorEvent::DropTargetEvaluated {
                    target: hero,
                    position: SiblingPosition::After,
                })
                .as_slice(),
            [EditorEffect::Ignored(_)]
        );
        assert!(session.modifications().is_empty());
    }

    // -- Saving and closing --

    #[test]
    fn test_at_most_one_save_in_flight() {
        let mut session = session();
        session.dispatch(EditorEvent::ModificationAdded(text_mod("m1", "#a", "x")));

        assert_matches!(
            session.dispatch(EditorEvent::SaveRequested).as_slice(),
            [EditorEffect::SaveDispatched(mods)] if mods.len() == 1
        );
        assert_eq!(session.save_state(), SaveState::InFlight);
        assert_matches!(
            session.dispatch(EditorEvent::SaveRequested).as_slice(),
            [EditorEffect::Ignored(_)]
        );
    }

    #[test]
    fn test_failed_save_keeps_edits_and_allows_retry() {
        let mut session = session();
        session.dispatch(EditorEvent::ModificationAdded(text_mod("m1", "#a", "x")));
        session.dispatch(EditorEvent::SaveRequested);
        session.dispatch(EditorEvent::SaveFailed("network".into()));

        assert_eq!(session.modifications().len(), 1);
        assert!(session.is_dirty());
        assert_matches!(
            session.dispatch(EditorEvent::SaveRequested).as_slice(),
            [EditorEffect::SaveDispatched(_)]
        );
    }

    #[test]
    fn test_edits_during_save_stay_dirty() {
        let mut session = session();
        session.dispatch(EditorEvent::ModificationAdded(text_mod("m1", "#a", "x")));
        session.dispatch(EditorEvent::SaveRequested);
        session.dispatch(EditorEvent::ModificationAdded(text_mod("m2", "#b", "y")));
        session.dispatch(EditorEvent::SaveCompleted);

        assert_eq!(session.save_state(), SaveState::Idle);
        assert!(session.is_dirty());
        assert_eq!(
            session.dispatch(EditorEvent::CloseRequested),
            vec![EditorEffect::ConfirmDiscard]
        );

        assert_matches!(
            session.dispatch(EditorEvent::SaveRequested).as_slice(),
            [EditorEffect::SaveDispatched(mods)] if mods.len() == 2
        );
        session.dispatch(EditorEvent::SaveCompleted);
        assert!(!session.is_dirty());
        assert_eq!(session.dispatch(EditorEvent::CloseRequested), vec![EditorEffect::Closed]);
    }

    #[test]
    fn test_close_with_unsaved_changes_confirms() {
        let mut session = session();
        assert_eq!(session.dispatch(EditorEvent::CloseRequested), vec![EditorEffect::Closed]);

        session.dispatch(EditorEvent::ModificationAdded(text_mod("m1", "#a", "x")));
        assert_eq!(
            session.dispatch(EditorEvent::CloseRequested),
            vec![EditorEffect::ConfirmDiscard]
        );

        session.dispatch(EditorEvent::SaveRequested);
        session.dispatch(EditorEvent::SaveCompleted);
        assert!(!session.is_dirty());
        assert_eq!(session.dispatch(EditorEvent::CloseRequested), vec![EditorEffect::Closed]);
    }

    #[test]
    fn test_session_starts_with_stored_modifications_applied() {
        let stored = vec![text_mod("m1", "#hero-cta", "Buy Now")];
        let session = EditorSession::new("var-1", Document::parse(PAGE), stored);
        let cta = node(&session, "#hero-cta");
        assert_eq!(session.document().text_content(cta), "Buy Now");
        assert!(!session.is_dirty());
        assert!(!session.can_undo());
    }
}
