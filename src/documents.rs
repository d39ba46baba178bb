//! `docket document` commands.

use anyhow::{bail, Context, Result};
use uuid::Uuid;

use crate::config::Config;
use crate::engine;

pub async fn run_document_create(
    config: &Config,
    client_id: &str,
    title: &str,
    content: &str,
) -> Result<()> {
    let client_id =
        Uuid::parse_str(client_id).with_context(|| format!("invalid client id: {}", client_id))?;
    if title.trim().is_empty() {
        bail!("title must not be empty");
    }
    if content.trim().is_empty() {
        bail!("content must not be empty");
    }

    let engine = engine::open(config).await?;
    let document = engine.create_document(client_id, title, content).await?;

    println!("created document {}", document.id);
    println!("client_id:  {}", document.client_id);
    println!("title:      {}", document.title);
    println!(
        "embedding:  {}",
        if document.has_embedding() {
            "stored"
        } else {
            "none (lexical only)"
        }
    );
    Ok(())
}
