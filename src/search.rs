//! `docket search` command.

use anyhow::Result;

use docket_core::models::SearchResult;

use crate::config::Config;
use crate::engine;

pub async fn run_search(config: &Config, query: &str) -> Result<()> {
    let engine = engine::open(config).await?;
    let results = engine.search_hybrid(query).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.4}] {} / {}",
            i + 1,
            result.score(),
            result.kind().as_str(),
            result.label()
        );
        match result {
            SearchResult::Client { client, .. } => {
                println!("    email: {}", client.email);
            }
            SearchResult::Document { document, .. } => {
                println!("    client: {}", document.client_id);
                println!(
                    "    excerpt: \"{}\"",
                    excerpt(&document.content, 160).replace('\n', " ").trim()
                );
            }
        }
        println!("    id: {}", result.id());
        println!();
    }

    Ok(())
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
