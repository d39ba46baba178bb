//! In-memory [`Store`] implementation for testing.
//!
//! Uses `Vec`s behind `std::sync::RwLock` for thread safety. Lexical
//! search is term-overlap counting (a stored token matches a query term
//! when it starts with it, a rough stand-in for stemming). Vector search is
//! brute-force cosine similarity over all stored embeddings.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::embedding::cosine_similarity;
use crate::error::{EngineError, Result};
use crate::models::{Client, Document, NewClient, NewDocument};
use crate::query::{contains_run, tokenize, SearchQuery, Thesaurus};

use super::{Ranked, Store};

/// In-memory store for tests.
pub struct InMemoryStore {
    clients: RwLock<Vec<Client>>,
    documents: RwLock<Vec<Document>>,
    thesaurus: Thesaurus,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_thesaurus(Thesaurus::default())
    }

    pub fn with_thesaurus(thesaurus: Thesaurus) -> Self {
        Self {
            clients: RwLock::new(Vec::new()),
            documents: RwLock::new(Vec::new()),
            thesaurus,
        }
    }

    /// Number of stored documents.
    pub fn document_count(&self) -> usize {
        self.documents.read().map(|d| d.len()).unwrap_or(0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| EngineError::internal("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| EngineError::internal("in-memory store lock poisoned"))
}

/// Millisecond precision, matching what the SQLite backend round-trips.
fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Count query terms (and thesaurus phrases) present in `text`.
fn overlap_score(text: &str, query: &SearchQuery, expansions: &[String]) -> f64 {
    let lower = text.to_lowercase();
    let tokens: Vec<&str> = tokenize(&lower).collect();

    let mut score = query
        .terms()
        .iter()
        .filter(|term| tokens.iter().any(|t| t.starts_with(term.as_str())))
        .count() as f64;

    for phrase in expansions {
        let words: Vec<&str> = phrase.split(' ').collect();
        if contains_run(&tokens, &words) {
            score += words.len() as f64;
        }
    }
    score
}

fn top_n<T>(mut hits: Vec<Ranked<T>>, limit: usize) -> Vec<Ranked<T>> {
    // Stable: equal scores keep insertion order.
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(limit);
    hits
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_client(&self, fields: &NewClient) -> Result<Client> {
        let mut clients = write(&self.clients)?;
        if clients.iter().any(|c| c.email == fields.email) {
            return Err(EngineError::DuplicateEmail {
                email: fields.email.clone(),
            });
        }
        let client = Client {
            id: Uuid::new_v4(),
            created_at: now_millis(),
            first_name: fields.first_name.clone(),
            last_name: fields.last_name.clone(),
            email: fields.email.clone(),
            description: fields.description.clone(),
        };
        clients.push(client.clone());
        Ok(client)
    }

    async fn get_client(&self, id: Uuid) -> Result<Client> {
        read(&self.clients)?
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(EngineError::ClientNotFound { id })
    }

    async fn create_document(
        &self,
        fields: &NewDocument,
        embedding: Option<&[f32]>,
    ) -> Result<Document> {
        let client_exists = read(&self.clients)?
            .iter()
            .any(|c| c.id == fields.client_id);
        if !client_exists {
            return Err(EngineError::ClientNotFound {
                id: fields.client_id,
            });
        }

        let document = Document {
            id: Uuid::new_v4(),
            created_at: now_millis(),
            client_id: fields.client_id,
            title: fields.title.clone(),
            content: fields.content.clone(),
            embedding: embedding.map(<[f32]>::to_vec),
        };
        write(&self.documents)?.push(document.clone());
        Ok(document)
    }

    async fn search_clients(
        &self,
        query: &SearchQuery,
        limit: usize,
    ) -> Result<Vec<Ranked<Client>>> {
        let expansions = self.thesaurus.expansions(query);
        let hits = read(&self.clients)?
            .iter()
            .filter_map(|c| {
                let score = overlap_score(&c.searchable_text(), query, &expansions);
                (score > 0.0).then(|| Ranked::new(c.clone(), score))
            })
            .collect();
        Ok(top_n(hits, limit))
    }

    async fn search_documents(
        &self,
        query: &SearchQuery,
        limit: usize,
    ) -> Result<Vec<Ranked<Document>>> {
        let expansions = self.thesaurus.expansions(query);
        let hits = read(&self.documents)?
            .iter()
            .filter_map(|d| {
                let score = overlap_score(&d.searchable_text(), query, &expansions);
                (score > 0.0).then(|| Ranked::new(d.clone(), score))
            })
            .collect();
        Ok(top_n(hits, limit))
    }

    async fn nearest_documents(
        &self,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<Ranked<Document>>> {
        let hits = read(&self.documents)?
            .iter()
            .filter_map(|d| {
                let embedding = d.embedding.as_deref()?;
                let similarity = cosine_similarity(query_vec, embedding) as f64;
                Some(Ranked::new(d.clone(), similarity))
            })
            .collect();
        Ok(top_n(hits, limit))
    }
}
