//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that accept
//! `&PgPool` as the first argument.

pub mod editor_token_repo;
pub mod experiment_repo;
pub mod site_repo;
pub mod variant_repo;

pub use editor_token_repo::EditorTokenRepo;
pub use experiment_repo::ExperimentRepo;
pub use site_repo::SiteRepo;
pub use variant_repo::VariantRepo;
