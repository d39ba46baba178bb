//! Hybrid search engine and ingestion coordinator.
//!
//! [`HybridEngine`] is what every frontend (CLI, HTTP) calls. It owns a
//! [`Store`] and an [`EmbeddingProvider`] and adds the orchestration the
//! core crate leaves out: concurrent retrieval, the document ingestion
//! pipeline, and per-call deadlines.
//!
//! # Search
//!
//! ```text
//!            ┌─ search_clients ──┐
//! query ─────┤─ search_documents ├──▶ fuse ──▶ ranked results
//!            └─ embed ─▶ nearest ┘
//! ```
//!
//! The lexical pair and the embed→nearest chain run concurrently. Nearest
//! neighbours below [`SEMANTIC_MIN_SIMILARITY`] are dropped. If the
//! query cannot be embedded the whole search fails with
//! `EmbeddingUnavailable`; lexical-only results are never returned.
//!
//! # Ingestion
//!
//! `create_document` checks the owning client first, then embeds, then
//! persists. Embedding is best-effort: on `EmbeddingUnavailable` the
//! document is stored without a vector and the call still succeeds.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use docket_core::embedding::{embed_one, EmbeddingProvider};
use docket_core::error::{EngineError, Result};
use docket_core::fusion;
use docket_core::models::{Client, Document, NewClient, NewDocument, SearchResult};
use docket_core::query::SearchQuery;
use docket_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::embedding::create_provider;
use crate::sqlite_store::SqliteStore;

/// Maximum clients taken from lexical retrieval.
pub const LEXICAL_CLIENT_CAP: usize = 20;
/// Maximum documents taken from lexical retrieval.
pub const LEXICAL_DOCUMENT_CAP: usize = 20;
/// Maximum documents taken from semantic retrieval.
pub const SEMANTIC_CAP: usize = 20;
/// Cosine similarity below which a nearest neighbour is not a semantic hit.
pub const SEMANTIC_MIN_SIMILARITY: f64 = 0.3;

pub struct HybridEngine<S: Store> {
    store: Arc<S>,
    embedder: Arc<dyn EmbeddingProvider>,
    deadline: Option<Duration>,
}

impl<S: Store> Clone for HybridEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            embedder: Arc::clone(&self.embedder),
            deadline: self.deadline,
        }
    }
}

impl<S: Store> HybridEngine<S> {
    pub fn new(store: Arc<S>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            embedder,
            deadline: None,
        }
    }

    /// Apply `deadline` to every public operation.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.deadline {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| EngineError::Timeout)?,
            None => fut.await,
        }
    }

    pub async fn create_client(&self, fields: &NewClient) -> Result<Client> {
        self.bounded(self.store.create_client(fields)).await
    }

    pub async fn get_client(&self, id: Uuid) -> Result<Client> {
        self.bounded(self.store.get_client(id)).await
    }

    /// Run a hybrid search for a raw query string.
    ///
    /// Fails with `InvalidQuery` for blank input. A query without
    /// alphanumeric terms skips lexical retrieval and ranks semantically.
    pub async fn search_hybrid(&self, raw_query: &str) -> Result<Vec<SearchResult>> {
        let query = SearchQuery::parse(raw_query)?;
        self.bounded(self.search(&query)).await
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        let lexical = async {
            if !query.has_terms() {
                return Ok::<_, EngineError>((Vec::new(), Vec::new()));
            }
            tokio::try_join!(
                self.store.search_clients(query, LEXICAL_CLIENT_CAP),
                self.store.search_documents(query, LEXICAL_DOCUMENT_CAP),
            )
        };
        let semantic = async {
            let query_vec = embed_one(self.embedder.as_ref(), query.text()).await?;
            let nearest = self.store.nearest_documents(&query_vec, SEMANTIC_CAP).await?;
            Ok::<_, EngineError>(
                nearest
                    .into_iter()
                    .filter(|hit| hit.score >= SEMANTIC_MIN_SIMILARITY)
                    .collect::<Vec<_>>(),
            )
        };

        let ((clients, lexical_docs), semantic_docs) = tokio::try_join!(lexical, semantic)?;

        debug!(
            query = query.text(),
            clients = clients.len(),
            lexical_documents = lexical_docs.len(),
            semantic_documents = semantic_docs.len(),
            "retrieval complete"
        );

        Ok(fusion::fuse(clients, lexical_docs, semantic_docs))
    }

    /// Ingest a document for an existing client.
    pub async fn create_document(
        &self,
        client_id: Uuid,
        title: &str,
        content: &str,
    ) -> Result<Document> {
        let fields = NewDocument {
            client_id,
            title: title.to_string(),
            content: content.to_string(),
        };
        self.bounded(self.ingest(fields)).await
    }

    async fn ingest(&self, fields: NewDocument) -> Result<Document> {
        // Fail fast before spending an embedding call.
        self.store.get_client(fields.client_id).await?;

        let embedding = match embed_one(self.embedder.as_ref(), &fields.embedding_input()).await {
            Ok(vector) => Some(vector),
            Err(EngineError::EmbeddingUnavailable(reason)) => {
                warn!(
                    client_id = %fields.client_id,
                    title = %fields.title,
                    %reason,
                    "embedding unavailable; storing document without vector"
                );
                None
            }
            Err(e) => return Err(e),
        };

        let document = self
            .store
            .create_document(&fields, embedding.as_deref())
            .await?;
        debug!(document_id = %document.id, embedded = document.has_embedding(), "document stored");
        Ok(document)
    }
}

/// Build the SQLite-backed engine described by `config`.
///
/// Expects the schema to exist (`docket init`).
pub async fn open(config: &Config) -> anyhow::Result<HybridEngine<SqliteStore>> {
    let pool = db::connect(config).await?;
    let embedder = create_provider(&config.embedding)?;
    let deadline = config.engine.request_timeout_ms.map(Duration::from_millis);
    let store = SqliteStore::load(pool).await?;
    Ok(HybridEngine::new(Arc::new(store), embedder).with_deadline(deadline))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docket_core::models::EntityKind;
    use docket_core::store::memory::InMemoryStore;
    use docket_core::query::Thesaurus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns the same vector for every text and counts calls.
    struct ConstantProvider {
        vector: Vec<f32>,
        calls: AtomicUsize,
    }

    impl ConstantProvider {
        fn new(vector: Vec<f32>) -> Self {
            Self {
                vector,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for ConstantProvider {
        fn model_name(&self) -> &str {
            "constant"
        }
        fn dims(&self) -> usize {
            self.vector.len()
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|_| self.vector.clone()).collect())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(EngineError::embedding_unavailable("connection refused"))
        }
    }

    struct SlowProvider(Duration);

    #[async_trait]
    impl EmbeddingProvider for SlowProvider {
        fn model_name(&self) -> &str {
            "slow"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            tokio::time::sleep(self.0).await;
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    fn engine_with(provider: Arc<dyn EmbeddingProvider>) -> HybridEngine<InMemoryStore> {
        let store = InMemoryStore::with_thesaurus(Thesaurus::new(vec![vec![
            "address proof",
            "utility bill",
        ]]));
        HybridEngine::new(Arc::new(store), provider)
    }

    fn new_client(email: &str) -> NewClient {
        NewClient {
            first_name: "Chandler".to_string(),
            last_name: "Bing".to_string(),
            email: email.to_string(),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_document_roundtrip_found_by_search() {
        let engine = engine_with(Arc::new(ConstantProvider::new(vec![1.0, 0.0])));
        let client = engine.create_client(&new_client("c@neviswealth.com")).await.unwrap();
        let doc = engine
            .create_document(client.id, "Utility Bill Statement", "March electricity")
            .await
            .unwrap();
        assert!(doc.has_embedding());

        let results = engine.search_hybrid("utility bill").await.unwrap();
        let hit = results.iter().find(|r| r.id() == doc.id).unwrap();
        assert!(hit.score() > 0.0);
    }

    #[tokio::test]
    async fn test_fusion_rewards_documents_found_both_ways() {
        let engine = engine_with(Arc::new(ConstantProvider::new(vec![1.0, 0.0])));
        let store = engine.store();
        let client = store.create_client(&new_client("m@example.com")).await.unwrap();
        let fields = |title: &str, content: &str| NewDocument {
            client_id: client.id,
            title: title.to_string(),
            content: content.to_string(),
        };

        let keyword_only = store
            .create_document(&fields("Invoice archive", "paper copies"), None)
            .await
            .unwrap();
        let semantic_only = store
            .create_document(&fields("Receipts", "payment record"), Some(&[1.0, 0.0]))
            .await
            .unwrap();
        let both = store
            .create_document(&fields("Invoice 2024", "payment summary"), Some(&[1.0, 0.0]))
            .await
            .unwrap();

        let results = engine.search_hybrid("invoice").await.unwrap();
        let score = |id: Uuid| results.iter().find(|r| r.id() == id).unwrap().score();

        assert!(score(both.id) >= score(keyword_only.id));
        assert!(score(both.id) >= score(semantic_only.id));
        assert_eq!(results[0].id(), both.id);
    }

    #[tokio::test]
    async fn test_results_are_non_increasing() {
        let engine = engine_with(Arc::new(ConstantProvider::new(vec![0.6, 0.8])));
        let a = engine.create_client(&new_client("a@neviswealth.com")).await.unwrap();
        let mut b_fields = new_client("b@neviswealth.com");
        b_fields.first_name = "Monica".to_string();
        engine.create_client(&b_fields).await.unwrap();
        engine
            .create_document(a.id, "Chandler contract", "signed by chandler")
            .await
            .unwrap();
        engine
            .create_document(a.id, "Notes", "awkwardness at the meeting")
            .await
            .unwrap();

        let results = engine.search_hybrid("Chandler").await.unwrap();
        assert!(results.len() >= 2);
        assert!(results.iter().any(|r| r.kind() == EntityKind::Client));
        assert!(results.iter().any(|r| r.kind() == EntityKind::Document));
        for pair in results.windows(2) {
            assert!(pair[0].score() >= pair[1].score());
        }
    }

    #[tokio::test]
    async fn test_no_match_returns_empty() {
        let engine = engine_with(Arc::new(ConstantProvider::new(vec![1.0, 0.0])));
        let client = engine.create_client(&new_client("e@example.com")).await.unwrap();
        // Stored without a vector so semantic retrieval has nothing to return.
        engine
            .store()
            .create_document(
                &NewDocument {
                    client_id: client.id,
                    title: "Passport".to_string(),
                    content: "scan".to_string(),
                },
                None,
            )
            .await
            .unwrap();

        let results = engine.search_hybrid("xyznonexistent123456").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_blank_query_rejected() {
        let engine = engine_with(Arc::new(ConstantProvider::new(vec![1.0, 0.0])));
        let err = engine.search_hybrid("   ").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_gateway_failure_fails_search_closed() {
        let engine = engine_with(Arc::new(FailingProvider));
        engine.create_client(&new_client("f@example.com")).await.unwrap();

        let err = engine.search_hybrid("chandler").await.unwrap_err();
        assert!(matches!(err, EngineError::EmbeddingUnavailable(_)));
    }

    #[tokio::test]
    async fn test_gateway_failure_still_ingests_without_vector() {
        let engine = engine_with(Arc::new(FailingProvider));
        let client = engine.create_client(&new_client("g@example.com")).await.unwrap();

        let doc = engine
            .create_document(client.id, "Utility Bill", "April")
            .await
            .unwrap();
        assert!(doc.embedding.is_none());
        assert_eq!(engine.store().document_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_client_checked_before_embedding() {
        let provider = Arc::new(ConstantProvider::new(vec![1.0, 0.0]));
        let engine = engine_with(provider.clone());

        let err = engine
            .create_document(Uuid::new_v4(), "Orphan", "nobody owns this")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ClientNotFound { .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(engine.store().document_count(), 0);
    }

    #[tokio::test]
    async fn test_deadline_elapses_as_timeout() {
        let engine = engine_with(Arc::new(SlowProvider(Duration::from_millis(500))))
            .with_deadline(Some(Duration::from_millis(20)));

        let err = engine.search_hybrid("anything").await.unwrap_err();
        assert_eq!(err, EngineError::Timeout);
    }

    #[tokio::test]
    async fn test_deadline_applies_to_document_creation() {
        let engine = engine_with(Arc::new(SlowProvider(Duration::from_millis(500))))
            .with_deadline(Some(Duration::from_millis(20)));
        let client = engine.create_client(&new_client("d@example.com")).await.unwrap();

        let err = engine
            .create_document(client.id, "Utility Bill", "May")
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::Timeout);
        assert_eq!(engine.store().document_count(), 0);
    }

    #[tokio::test]
    async fn test_symbol_only_query_ranks_semantically() {
        let engine = engine_with(Arc::new(ConstantProvider::new(vec![1.0, 0.0])));
        let client = engine.create_client(&new_client("s@example.com")).await.unwrap();
        let doc = engine
            .create_document(client.id, "Feedback", "Customer left a smiley")
            .await
            .unwrap();

        for raw in ["?!", "🙂", "---"] {
            let results = engine.search_hybrid(raw).await.unwrap();
            assert_eq!(results.len(), 1, "query {:?}", raw);
            assert_eq!(results[0].id(), doc.id);
            assert_eq!(results[0].kind(), EntityKind::Document);
        }
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_email_exactly_one_wins() {
        let engine = engine_with(Arc::new(ConstantProvider::new(vec![1.0, 0.0])));

        for trial in 0..25 {
            let email = format!("race{}@example.com", trial);
            let (a, b) = (engine.clone(), engine.clone());
            let (fa, fb) = (new_client(&email), new_client(&email));
            let (ra, rb) = tokio::join!(
                tokio::spawn(async move { a.create_client(&fa).await }),
                tokio::spawn(async move { b.create_client(&fb).await }),
            );
            let outcomes = [ra.unwrap(), rb.unwrap()];
            assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
            assert_eq!(
                outcomes
                    .iter()
                    .filter(|r| matches!(r, Err(EngineError::DuplicateEmail { .. })))
                    .count(),
                1
            );
        }
    }
}
