//! Schema migrations and thesaurus sync.
//!
//! Every statement is idempotent, so `docket init` and `docket serve` can
//! both run them on startup.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use docket_core::query::normalize_phrase;

use crate::config::{Config, ThesaurusGroup};
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    sync_thesaurus(&pool, &config.thesaurus).await?;
    pool.close().await;
    Ok(())
}

/// Create tables, full-text indexes, and the triggers that keep them in step.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clients (
            id TEXT PRIMARY KEY,
            created_at INTEGER NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            description TEXT
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create clients table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            created_at INTEGER NOT NULL,
            client_id TEXT NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            embedding BLOB,
            FOREIGN KEY (client_id) REFERENCES clients(id)
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create documents table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS thesaurus (
            phrase TEXT PRIMARY KEY,
            group_key TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create thesaurus table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_client_id ON documents(client_id)")
        .execute(pool)
        .await?;

    // FTS5 CREATE is not idempotent natively, so we check first
    if !table_exists(pool, "clients_fts").await? {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE clients_fts USING fts5(
                client_id UNINDEXED,
                first_name,
                last_name,
                email,
                description,
                tokenize = 'porter unicode61'
            )
            "#,
        )
        .execute(pool)
        .await
        .context("Failed to create clients_fts")?;
    }

    if !table_exists(pool, "documents_fts").await? {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE documents_fts USING fts5(
                document_id UNINDEXED,
                title,
                content,
                tokenize = 'porter unicode61'
            )
            "#,
        )
        .execute(pool)
        .await
        .context("Failed to create documents_fts")?;
    }

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS clients_fts_insert AFTER INSERT ON clients
        BEGIN
            INSERT INTO clients_fts (client_id, first_name, last_name, email, description)
            VALUES (new.id, new.first_name, new.last_name, new.email, COALESCE(new.description, ''));
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS documents_fts_insert AFTER INSERT ON documents
        BEGIN
            INSERT INTO documents_fts (document_id, title, content)
            VALUES (new.id, new.title, new.content);
        END
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn table_exists(pool: &SqlitePool, name: &str) -> Result<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?")
            .bind(name)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}

/// Replace the stored thesaurus with the configured phrase groups.
///
/// Phrases are normalized before storage. A phrase listed in more than one
/// group keeps its first group.
pub async fn sync_thesaurus(pool: &SqlitePool, groups: &[ThesaurusGroup]) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM thesaurus").execute(&mut *tx).await?;

    for (i, group) in groups.iter().enumerate() {
        let group_key = format!("g{:04}", i);
        for phrase in &group.phrases {
            let phrase = normalize_phrase(phrase);
            if phrase.is_empty() {
                continue;
            }
            sqlx::query("INSERT OR IGNORE INTO thesaurus (phrase, group_key) VALUES (?, ?)")
                .bind(&phrase)
                .bind(&group_key)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await.context("Failed to sync thesaurus")?;
    Ok(())
}
