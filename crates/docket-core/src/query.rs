//! Query normalization and thesaurus expansion.
//!
//! [`SearchQuery::parse`] lowercases the raw query and splits it into
//! alphanumeric terms. Term expansion through a [`Thesaurus`] belongs to the
//! store's text-ranking configuration: store backends call
//! [`Thesaurus::expansions`] when building their match expression, the
//! engine never does.

use crate::error::{EngineError, Result};

/// A validated, case-normalized search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    text: String,
    terms: Vec<String>,
}

impl SearchQuery {
    /// Normalize a raw query string.
    ///
    /// Fails with [`EngineError::InvalidQuery`] when the query is blank.
    /// A query made only of punctuation or symbols parses with no terms; it
    /// can still be embedded.
    pub fn parse(raw: &str) -> Result<Self> {
        let text = raw.trim().to_lowercase();
        if text.is_empty() {
            return Err(EngineError::InvalidQuery(
                "query must not be empty".to_string(),
            ));
        }

        let mut terms: Vec<String> = Vec::new();
        for term in tokenize(&text) {
            if !terms.iter().any(|t| t == term) {
                terms.push(term.to_string());
            }
        }

        Ok(Self { text, terms })
    }

    /// The trimmed, lowercased query text (what gets embedded).
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Distinct search terms in query order.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// False for symbol-only queries, which only the semantic side can match.
    pub fn has_terms(&self) -> bool {
        !self.terms.is_empty()
    }
}

/// Split lowercased text into alphanumeric tokens.
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
}

/// Normalize a phrase to lowercase tokens joined by single spaces.
pub fn normalize_phrase(phrase: &str) -> String {
    let lower = phrase.to_lowercase();
    tokenize(&lower).collect::<Vec<_>>().join(" ")
}

/// Returns true if `needle` occurs as a contiguous run inside `haystack`.
pub fn contains_run<S: AsRef<str>>(haystack: &[S], needle: &[&str]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack
        .windows(needle.len())
        .any(|w| w.iter().zip(needle).all(|(a, b)| a.as_ref() == *b))
}

/// Groups of equivalent phrases, e.g. `["address proof", "utility bill"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Thesaurus {
    groups: Vec<Vec<String>>,
}

impl Thesaurus {
    /// Build a thesaurus from raw phrase groups. Phrases are normalized;
    /// empty phrases and groups with fewer than two phrases are dropped.
    pub fn new<I, G, P>(groups: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let groups = groups
            .into_iter()
            .map(|g| {
                let mut phrases: Vec<String> = Vec::new();
                for p in g {
                    let normalized = normalize_phrase(p.as_ref());
                    if !normalized.is_empty() && !phrases.contains(&normalized) {
                        phrases.push(normalized);
                    }
                }
                phrases
            })
            .filter(|g| g.len() > 1)
            .collect();
        Self { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[Vec<String>] {
        &self.groups
    }

    /// Phrases equivalent to any phrase found in the query.
    ///
    /// A group fires when one of its phrases appears as a contiguous run of
    /// query terms; every other phrase of that group is returned. Phrases
    /// already present in the query are not repeated.
    pub fn expansions(&self, query: &SearchQuery) -> Vec<String> {
        let terms = query.terms();
        let mut out: Vec<String> = Vec::new();
        for group in &self.groups {
            let present: Vec<bool> = group
                .iter()
                .map(|p| contains_run(terms, &p.split(' ').collect::<Vec<_>>()))
                .collect();
            if !present.iter().any(|hit| *hit) {
                continue;
            }
            for (phrase, hit) in group.iter().zip(&present) {
                if !hit && !out.contains(phrase) {
                    out.push(phrase.clone());
                }
            }
        }
        out
    }
}
