//! SQLite-backed [`Store`] implementation.
//!
//! Lexical retrieval runs FTS5 `MATCH` queries ranked by `bm25`; semantic
//! retrieval loads every stored embedding and ranks by cosine similarity in
//! Rust. Native sqlx failures are translated into [`EngineError`] kinds at
//! this boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use docket_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use docket_core::error::{EngineError, Result};
use docket_core::models::{Client, Document, NewClient, NewDocument};
use docket_core::query::{SearchQuery, Thesaurus};
use docket_core::store::{Ranked, Store};

/// SQLite implementation of the [`Store`] trait.
///
/// Wraps a [`SqlitePool`]; the schema is created by
/// [`migrate::apply_schema`](crate::migrate::apply_schema). The thesaurus is
/// read once when the store is opened; it only changes on `init`/`serve`.
pub struct SqliteStore {
    pool: SqlitePool,
    thesaurus: Thesaurus,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, thesaurus: Thesaurus) -> Self {
        Self { pool, thesaurus }
    }

    /// Open a store over `pool`, loading the thesaurus table.
    pub async fn load(pool: SqlitePool) -> Result<Self> {
        let thesaurus = load_thesaurus(&pool).await?;
        Ok(Self::new(pool, thesaurus))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn thesaurus(&self) -> &Thesaurus {
        &self.thesaurus
    }

    /// Fetch a document by id, including its stored embedding.
    pub async fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, created_at, client_id, title, content, embedding FROM documents WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.as_ref().map(document_from_row).transpose()
    }

    pub async fn count_documents(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)
    }

    /// FTS5 match expression: every term and every thesaurus alternative,
    /// each quoted, joined with `OR`. `None` when the query has no terms.
    fn match_expression(&self, query: &SearchQuery) -> Option<String> {
        if !query.has_terms() {
            return None;
        }
        let alternatives = self.thesaurus.expansions(query);
        Some(match_expression(query.terms(), &alternatives))
    }
}

async fn load_thesaurus(pool: &SqlitePool) -> Result<Thesaurus> {
    let rows = sqlx::query("SELECT phrase, group_key FROM thesaurus ORDER BY group_key, rowid")
        .fetch_all(pool)
        .await
        .map_err(storage_error)?;

    let mut groups: Vec<Vec<String>> = Vec::new();
    let mut current_key: Option<String> = None;
    for row in &rows {
        let phrase: String = row.try_get("phrase").map_err(storage_error)?;
        let key: String = row.try_get("group_key").map_err(storage_error)?;
        if current_key.as_deref() != Some(key.as_str()) {
            groups.push(Vec::new());
            current_key = Some(key);
        }
        if let Some(group) = groups.last_mut() {
            group.push(phrase);
        }
    }
    Ok(Thesaurus::new(groups))
}

fn match_expression(terms: &[String], phrases: &[String]) -> String {
    terms
        .iter()
        .chain(phrases)
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Translate a sqlx error into the engine's error taxonomy.
///
/// Constraint violations are mapped by the calling operation, which knows
/// which constraint it can hit; everything reaching here is `Internal`.
fn storage_error(err: sqlx::Error) -> EngineError {
    EngineError::internal(format!("storage: {}", err))
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| EngineError::internal(format!("corrupt id {:?}: {}", raw, e)))
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| EngineError::internal(format!("corrupt timestamp: {}", ms)))
}

/// Current time truncated to the stored (millisecond) precision.
fn now_millis() -> Result<DateTime<Utc>> {
    from_millis(Utc::now().timestamp_millis())
}

fn client_from_row(row: &SqliteRow) -> Result<Client> {
    let id: String = row.try_get("id").map_err(storage_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(storage_error)?;
    Ok(Client {
        id: parse_uuid(&id)?,
        created_at: from_millis(created_at)?,
        first_name: row.try_get("first_name").map_err(storage_error)?,
        last_name: row.try_get("last_name").map_err(storage_error)?,
        email: row.try_get("email").map_err(storage_error)?,
        description: row.try_get("description").map_err(storage_error)?,
    })
}

fn document_from_row(row: &SqliteRow) -> Result<Document> {
    let id: String = row.try_get("id").map_err(storage_error)?;
    let client_id: String = row.try_get("client_id").map_err(storage_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(storage_error)?;
    let embedding: Option<Vec<u8>> = row.try_get("embedding").map_err(storage_error)?;
    Ok(Document {
        id: parse_uuid(&id)?,
        created_at: from_millis(created_at)?,
        client_id: parse_uuid(&client_id)?,
        title: row.try_get("title").map_err(storage_error)?,
        content: row.try_get("content").map_err(storage_error)?,
        embedding: embedding.map(|blob| blob_to_vec(&blob)),
    })
}

fn score_from_row(row: &SqliteRow) -> Result<f64> {
    row.try_get("score").map_err(storage_error)
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_client(&self, fields: &NewClient) -> Result<Client> {
        let client = Client {
            id: Uuid::new_v4(),
            created_at: now_millis()?,
            first_name: fields.first_name.clone(),
            last_name: fields.last_name.clone(),
            email: fields.email.clone(),
            description: fields.description.clone(),
        };

        sqlx::query(
            r#"
            INSERT INTO clients (id, created_at, first_name, last_name, email, description)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(client.id.to_string())
        .bind(client.created_at.timestamp_millis())
        .bind(&client.first_name)
        .bind(&client.last_name)
        .bind(&client.email)
        .bind(&client.description)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => EngineError::DuplicateEmail {
                email: fields.email.clone(),
            },
            _ => storage_error(e),
        })?;

        Ok(client)
    }

    async fn get_client(&self, id: Uuid) -> Result<Client> {
        let row = sqlx::query(
            "SELECT id, created_at, first_name, last_name, email, description FROM clients WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        match row {
            Some(row) => client_from_row(&row),
            None => Err(EngineError::ClientNotFound { id }),
        }
    }

    async fn create_document(
        &self,
        fields: &NewDocument,
        embedding: Option<&[f32]>,
    ) -> Result<Document> {
        let document = Document {
            id: Uuid::new_v4(),
            created_at: now_millis()?,
            client_id: fields.client_id,
            title: fields.title.clone(),
            content: fields.content.clone(),
            embedding: embedding.map(<[f32]>::to_vec),
        };

        sqlx::query(
            r#"
            INSERT INTO documents (id, created_at, client_id, title, content, embedding)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(document.id.to_string())
        .bind(document.created_at.timestamp_millis())
        .bind(document.client_id.to_string())
        .bind(&document.title)
        .bind(&document.content)
        .bind(embedding.map(vec_to_blob))
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                EngineError::ClientNotFound {
                    id: fields.client_id,
                }
            }
            _ => storage_error(e),
        })?;

        Ok(document)
    }

    async fn search_clients(
        &self,
        query: &SearchQuery,
        limit: usize,
    ) -> Result<Vec<Ranked<Client>>> {
        let Some(expression) = self.match_expression(query) else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.created_at, c.first_name, c.last_name, c.email, c.description,
                   -bm25(clients_fts, 0.0, 1.0, 1.0, 1.0, 1.0) AS score
            FROM clients_fts
            JOIN clients c ON c.id = clients_fts.client_id
            WHERE clients_fts MATCH ?
            ORDER BY score DESC
            LIMIT ?
            "#,
        )
        .bind(&expression)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        rows.iter()
            .map(|row| Ok(Ranked::new(client_from_row(row)?, score_from_row(row)?)))
            .collect()
    }

    async fn search_documents(
        &self,
        query: &SearchQuery,
        limit: usize,
    ) -> Result<Vec<Ranked<Document>>> {
        let Some(expression) = self.match_expression(query) else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query(
            r#"
            SELECT d.id, d.created_at, d.client_id, d.title, d.content, d.embedding,
                   -bm25(documents_fts, 0.0, 2.0, 1.0) AS score
            FROM documents_fts
            JOIN documents d ON d.id = documents_fts.document_id
            WHERE documents_fts MATCH ?
            ORDER BY score DESC
            LIMIT ?
            "#,
        )
        .bind(&expression)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        rows.iter()
            .map(|row| Ok(Ranked::new(document_from_row(row)?, score_from_row(row)?)))
            .collect()
    }

    async fn nearest_documents(
        &self,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<Ranked<Document>>> {
        let rows = sqlx::query(
            r#"
            SELECT id, created_at, client_id, title, content, embedding
            FROM documents
            WHERE embedding IS NOT NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        let mut candidates: Vec<Ranked<Document>> = Vec::with_capacity(rows.len());
        for row in &rows {
            let document = document_from_row(row)?;
            let similarity = document
                .embedding
                .as_deref()
                .map(|v| cosine_similarity(query_vec, v) as f64)
                .unwrap_or(0.0);
            candidates.push(Ranked::new(document, similarity));
        }

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(limit);

        Ok(candidates)
    }
}
