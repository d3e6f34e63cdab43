//! Visual editor state: snapshot-based undo/redo and the event reducer that
//! drives the overlay.

pub mod history;
mod session;

pub use history::History;
pub use session::{EditorEffect, EditorEvent, EditorMode, EditorSession, SaveState};
