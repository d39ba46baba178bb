//! Reciprocal Rank Fusion over heterogeneous search results.
//!
//! Lexical and semantic retrievers score on incompatible scales (bm25 vs.
//! cosine), so only the rank position within each list is used:
//!
//! ```text
//! score(d) = Σ_r 1 / (RRF_K + rank_r(d))
//! ```
//!
//! A retriever that did not return `d` contributes zero. Clients come from
//! a single (lexical) ranking and are scored with the same formula so both
//! entity types share one scale.
//!
//! Items with equal raw scores share a rank (competition ranking: 1, 1, 3),
//! so a higher raw score within one list always yields a strictly higher
//! contribution.

use std::cmp::Ordering;
use std::collections::HashMap;

use uuid::Uuid;

use crate::models::{Client, Document, SearchResult};
use crate::store::Ranked;

/// Fusion constant. Fixed, not user-configurable.
pub const RRF_K: f64 = 60.0;

/// Contribution of a hit at 1-based `rank`.
pub fn rrf_contribution(rank: usize) -> f64 {
    1.0 / (RRF_K + rank as f64)
}

/// Sort a ranking by raw score (descending, stable) and return each item
/// with its 1-based competition rank.
fn ranked_positions<T>(list: Vec<Ranked<T>>) -> Vec<(T, usize)> {
    let mut list = list;
    list.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut out = Vec::with_capacity(list.len());
    let mut prev: Option<f64> = None;
    let mut rank = 0;
    for (i, ranked) in list.into_iter().enumerate() {
        if prev != Some(ranked.score) {
            rank = i + 1;
            prev = Some(ranked.score);
        }
        out.push((ranked.item, rank));
    }
    out
}

/// Fuse lexical and semantic document rankings into one deduplicated list.
///
/// Full outer union over document ids: a document found by only one
/// retriever is still returned. Output is in first-seen order (lexical
/// first); [`merge`] does the final sort.
pub fn fuse_documents(
    lexical: Vec<Ranked<Document>>,
    semantic: Vec<Ranked<Document>>,
) -> Vec<(Document, f64)> {
    let mut fused: Vec<(Document, f64)> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();

    for list in [lexical, semantic] {
        for (doc, rank) in ranked_positions(list) {
            let contribution = rrf_contribution(rank);
            match index.get(&doc.id) {
                Some(&i) => fused[i].1 += contribution,
                None => {
                    index.insert(doc.id, fused.len());
                    fused.push((doc, contribution));
                }
            }
        }
    }

    fused
}

/// Score a client ranking with the same reciprocal-rank formula.
pub fn rank_clients(lexical: Vec<Ranked<Client>>) -> Vec<(Client, f64)> {
    ranked_positions(lexical)
        .into_iter()
        .map(|(client, rank)| (client, rrf_contribution(rank)))
        .collect()
}

/// Concatenate fused documents and clients and order them.
///
/// Ordering: score descending, then documents before clients, then
/// insertion order.
pub fn merge(documents: Vec<(Document, f64)>, clients: Vec<(Client, f64)>) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = documents
        .into_iter()
        .map(|(document, score)| SearchResult::Document { document, score })
        .chain(
            clients
                .into_iter()
                .map(|(client, score)| SearchResult::Client { client, score }),
        )
        .collect();

    results.sort_by(|a, b| {
        b.score()
            .partial_cmp(&a.score())
            .unwrap_or(Ordering::Equal)
            .then(a.kind().cmp(&b.kind()))
    });

    results
}

/// Full fusion pipeline: documents from both retrievers plus lexical clients.
pub fn fuse(
    lexical_clients: Vec<Ranked<Client>>,
    lexical_documents: Vec<Ranked<Document>>,
    semantic_documents: Vec<Ranked<Document>>,
) -> Vec<SearchResult> {
    merge(
        fuse_documents(lexical_documents, semantic_documents),
        rank_clients(lexical_clients),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityKind;
    use chrono::Utc;

    fn doc(title: &str) -> Document {
        Document {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            client_id: Uuid::nil(),
            title: title.to_string(),
            content: String::new(),
            embedding: None,
        }
    }

    fn client(name: &str) -> Client {
        Client {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            first_name: name.to_string(),
            last_name: "Test".to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            description: None,
        }
    }

    fn ranked<T>(item: T, score: f64) -> Ranked<T> {
        Ranked { item, score }
    }

    #[test]
    fn test_contribution_decreases_with_rank() {
        assert!(rrf_contribution(1) > rrf_contribution(2));
        assert!((rrf_contribution(1) - 1.0 / 61.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_inputs_give_empty_output() {
        assert!(fuse(Vec::new(), Vec::new(), Vec::new()).is_empty());
    }

    #[test]
    fn test_document_in_both_lists_scores_at_least_single_list() {
        let keyword_only = doc("keyword only");
        let semantic_only = doc("semantic only");
        let both = doc("both");

        let lexical = vec![
            ranked(keyword_only.clone(), 3.0),
            ranked(both.clone(), 2.0),
        ];
        let semantic = vec![
            ranked(semantic_only.clone(), 0.9),
            ranked(both.clone(), 0.8),
        ];

        let fused = fuse_documents(lexical, semantic);
        assert_eq!(fused.len(), 3);
        let score = |id: Uuid| {
            fused
                .iter()
                .find(|(d, _)| d.id == id)
                .map(|(_, s)| *s)
                .unwrap()
        };
        assert!(score(both.id) >= score(keyword_only.id));
        assert!(score(both.id) >= score(semantic_only.id));
        assert!((score(both.id) - 2.0 * rrf_contribution(2)).abs() < 1e-12);
    }

    #[test]
    fn test_higher_raw_score_yields_higher_contribution() {
        let a = doc("a");
        let b = doc("b");
        // Input order deliberately inverted.
        let fused = fuse_documents(vec![ranked(b.clone(), 1.0), ranked(a.clone(), 5.0)], vec![]);
        let a_score = fused.iter().find(|(d, _)| d.id == a.id).unwrap().1;
        let b_score = fused.iter().find(|(d, _)| d.id == b.id).unwrap().1;
        assert!(a_score > b_score);
    }

    #[test]
    fn test_equal_raw_scores_share_rank() {
        let fused = fuse_documents(vec![ranked(doc("a"), 2.0), ranked(doc("b"), 2.0)], vec![]);
        assert!((fused[0].1 - fused[1].1).abs() < 1e-12);
    }

    #[test]
    fn test_merge_orders_by_score_then_kind() {
        let clients = vec![ranked(client("Chandler"), 1.0), ranked(client("Monica"), 0.5)];
        let documents = vec![ranked(doc("Chandler notes"), 4.0)];

        let results = fuse(clients, documents, Vec::new());
        assert_eq!(results.len(), 3);
        // Top client and top document tie at rank 1; document wins.
        assert_eq!(results[0].kind(), EntityKind::Document);
        assert_eq!(results[1].kind(), EntityKind::Client);
        assert_eq!(results[1].label(), "Chandler Test");
        for pair in results.windows(2) {
            assert!(pair[0].score() >= pair[1].score());
        }
    }
}
