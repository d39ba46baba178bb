//! # Docket
//!
//! Hybrid keyword + semantic search over clients and their documents.
//!
//! Docket stores clients and documents in SQLite, indexes their text with
//! FTS5, embeds document text through an external embedding service, and
//! answers free-text queries with one ranked list that mixes both entity
//! types.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌────────────┐
//! │ CLI/HTTP │──▶│ HybridEngine │──▶│  SQLite    │
//! │ (docket) │   │ fuse + ingest│   │ FTS5 + vec │
//! └──────────┘   └──────┬───────┘   └────────────┘
//!                       │
//!                       ▼
//!               ┌───────────────┐
//!               │ embedding svc │
//!               │ POST /embeddings
//!               └───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docket init                                   # create database
//! docket client create --first-name Chandler --last-name Bing \
//!     --email chandler@neviswealth.com
//! docket document create <client-id> --title "Utility Bill" --content "..."
//! docket search "address proof"
//! docket serve                                  # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations and thesaurus sync |
//! | [`sqlite_store`] | SQLite-backed `Store` |
//! | [`embedding`] | HTTP and disabled embedding providers |
//! | [`engine`] | Hybrid search and ingestion |
//! | [`server`] | HTTP API |
//! | [`logging`] | Tracing setup |

pub mod clients;
pub mod config;
pub mod db;
pub mod documents;
pub mod embedding;
pub mod engine;
pub mod logging;
pub mod migrate;
pub mod search;
pub mod server;
pub mod sqlite_store;

pub use docket_core::{
    Client, Document, EngineError, EntityKind, ErrorKind, NewClient, NewDocument, SearchQuery,
    SearchResult,
};
