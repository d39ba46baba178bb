//! Storage abstraction for Docket.
//!
//! The [`Store`] trait defines every storage operation the hybrid engine
//! needs: client and document creation, client lookup, lexical retrieval
//! for both entity types, and nearest-neighbour retrieval over document
//! embeddings. Backends (SQLite in the app crate, [`memory::InMemoryStore`]
//! here) translate their native failures into [`EngineError`] kinds.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! [`EngineError`]: crate::error::EngineError

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Client, Document, NewClient, NewDocument};
use crate::query::SearchQuery;

/// An item returned by a retriever with its raw relevance score.
///
/// Higher is better. Scores are only comparable within one list.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked<T> {
    pub item: T,
    pub score: f64,
}

impl<T> Ranked<T> {
    pub fn new(item: T, score: f64) -> Self {
        Self { item, score }
    }
}

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`create_client`](Store::create_client) | Insert a client; `DuplicateEmail` on conflict |
/// | [`get_client`](Store::get_client) | Fetch a client; `ClientNotFound` if absent |
/// | [`create_document`](Store::create_document) | Insert a document with an optional embedding |
/// | [`search_clients`](Store::search_clients) | Lexical ranking over client text |
/// | [`search_documents`](Store::search_documents) | Lexical ranking over document text |
/// | [`nearest_documents`](Store::nearest_documents) | Cosine ranking over stored embeddings |
///
/// Every write is a single atomic row insert. Lexical methods apply the
/// store's own thesaurus; rows matching no term are excluded.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a client, assigning its id and creation timestamp.
    async fn create_client(&self, fields: &NewClient) -> Result<Client>;

    /// Fetch a client by id.
    async fn get_client(&self, id: Uuid) -> Result<Client>;

    /// Insert a document. `embedding` is stored as null when `None`.
    ///
    /// Fails with `ClientNotFound` if `fields.client_id` does not exist.
    async fn create_document(
        &self,
        fields: &NewDocument,
        embedding: Option<&[f32]>,
    ) -> Result<Document>;

    /// Lexical search over clients, best first, at most `limit` entries.
    async fn search_clients(&self, query: &SearchQuery, limit: usize)
        -> Result<Vec<Ranked<Client>>>;

    /// Lexical search over documents, best first, at most `limit` entries.
    async fn search_documents(
        &self,
        query: &SearchQuery,
        limit: usize,
    ) -> Result<Vec<Ranked<Document>>>;

    /// Documents with a stored embedding, ordered by ascending cosine
    /// distance to `query_vec`. The score is cosine similarity.
    async fn nearest_documents(
        &self,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<Ranked<Document>>>;
}
