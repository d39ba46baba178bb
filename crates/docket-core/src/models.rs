//! Core data models used throughout Docket.
//!
//! Clients and documents are created once and never updated by the engine.
//! A [`SearchResult`] is an owned copy of the matched entity plus its fused
//! score; it never aliases stored state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fields supplied by the caller when creating a client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewClient {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A persisted client. `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Client {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub description: Option<String>,
}

impl Client {
    /// Text indexed for lexical search: name, email, and description.
    pub fn searchable_text(&self) -> String {
        let mut text = format!("{} {} {}", self.first_name, self.last_name, self.email);
        if let Some(ref description) = self.description {
            text.push(' ');
            text.push_str(description);
        }
        text
    }
}

/// Fields supplied by the caller when creating a document.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub client_id: Uuid,
    pub title: String,
    pub content: String,
}

impl NewDocument {
    /// Text sent to the embedding provider during ingestion.
    pub fn embedding_input(&self) -> String {
        format!("{}\n\n{}", self.title, self.content)
    }
}

/// A persisted document.
///
/// `embedding` is `None` when ingestion could not obtain a vector; such
/// documents stay lexically searchable but never appear in semantic results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub client_id: Uuid,
    pub title: String,
    pub content: String,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    /// Text indexed for lexical search: title and content.
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.title, self.content)
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}

/// Entity discriminant for [`SearchResult`].
///
/// The declaration order is the tie-break order when two results share a
/// score: documents sort ahead of clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Document,
    Client,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Document => "document",
            EntityKind::Client => "client",
        }
    }
}

/// One entry of a hybrid search response.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchResult {
    Client { client: Client, score: f64 },
    Document { document: Document, score: f64 },
}

impl SearchResult {
    pub fn kind(&self) -> EntityKind {
        match self {
            SearchResult::Client { .. } => EntityKind::Client,
            SearchResult::Document { .. } => EntityKind::Document,
        }
    }

    /// Fused relevance score; higher is more relevant.
    pub fn score(&self) -> f64 {
        match self {
            SearchResult::Client { score, .. } | SearchResult::Document { score, .. } => *score,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            SearchResult::Client { client, .. } => client.id,
            SearchResult::Document { document, .. } => document.id,
        }
    }

    /// Short human-readable label (client full name or document title).
    pub fn label(&self) -> String {
        match self {
            SearchResult::Client { client, .. } => {
                format!("{} {}", client.first_name, client.last_name)
            }
            SearchResult::Document { document, .. } => document.title.clone(),
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            SearchResult::Document { document, .. } => Some(document),
            SearchResult::Client { .. } => None,
        }
    }

    pub fn as_client(&self) -> Option<&Client> {
        match self {
            SearchResult::Client { client, .. } => Some(client),
            SearchResult::Document { .. } => None,
        }
    }
}
