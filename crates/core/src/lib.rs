//! Navlens variant modification engine.
//!
//! Domain logic shared by the API server and the editor: the headless
//! document model, selector resolution, the modification vocabulary and its
//! apply engine, sanitization, editor authorization and the editor session.

pub mod activation;
pub mod apply;
pub mod auth;
pub mod dom;
pub mod editor;
pub mod editor_token;
pub mod error;
pub mod modification;
pub mod sanitize;
pub mod selector;
pub mod signature;
pub mod store;
pub mod types;
