//! Headless document model the modification engine operates on.

mod document;
mod parse;
mod query;
pub mod style;

pub use document::{Document, Element, NodeId, NodeKind};
pub use parse::{decode_entities, escape_attr, escape_text};
pub use query::SelectorError;
