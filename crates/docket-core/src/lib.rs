//! # Docket Core
//!
//! Shared, runtime-free logic for Docket: entity models, the error
//! taxonomy, store abstraction, embedding trait, query normalization,
//! and the hybrid rank-fusion algorithm.
//!
//! This crate contains no tokio, sqlx, network, or filesystem
//! dependencies. Concurrency, deadlines, and concrete backends live in
//! the `docket` app crate.

pub mod embedding;
pub mod error;
pub mod fusion;
pub mod models;
pub mod query;
pub mod store;

pub use error::{EngineError, ErrorKind, Result};
pub use models::{Client, Document, EntityKind, NewClient, NewDocument, SearchResult};
pub use query::{SearchQuery, Thesaurus};
pub use store::{Ranked, Store};
