//! Navlens editor API server library.
//!
//! Exposes config, state, error handling and routes so integration tests and
//! the binary entrypoint build the same application.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod publisher;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
