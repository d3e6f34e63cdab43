//! Row structs for the editor tables.
//!
//! Each submodule holds a `FromRow` entity matching its table and a
//! conversion into the core record type where the engine consumes it.

pub mod editor_token;
pub mod experiment;
pub mod variant;
