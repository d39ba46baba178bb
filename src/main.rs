//! # Docket CLI (`docket`)
//!
//! ## Usage
//!
//! ```bash
//! docket --config ./config/docket.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docket init` | Create the SQLite database, run migrations, sync the thesaurus |
//! | `docket serve` | Start the HTTP API |
//! | `docket client create ...` | Create a client |
//! | `docket client get <id>` | Show a client |
//! | `docket document create <client-id> ...` | Ingest a document |
//! | `docket search "<query>"` | Hybrid search over clients and documents |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docket::config::load_config;
use docket::{clients, documents, logging, migrate, search, server, NewClient};

/// Docket: hybrid keyword + semantic search over clients and documents.
#[derive(Parser)]
#[command(name = "docket", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docket.toml")]
    config: PathBuf,

    /// Log at debug level (RUST_LOG overrides).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and sync the thesaurus.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Start the HTTP API server.
    Serve,

    /// Manage clients.
    Client {
        #[command(subcommand)]
        action: ClientAction,
    },

    /// Manage documents.
    Document {
        #[command(subcommand)]
        action: DocumentAction,
    },

    /// Hybrid search over clients and documents.
    ///
    /// Fails if the embedding provider is unavailable.
    Search {
        /// The search query string.
        query: String,
    },
}

#[derive(Subcommand)]
enum ClientAction {
    /// Create a client.
    Create {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Show a client by UUID.
    Get { id: String },
}

#[derive(Subcommand)]
enum DocumentAction {
    /// Ingest a document for a client.
    ///
    /// The document is stored even if it cannot be embedded.
    Create {
        /// Owning client UUID.
        client_id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&config).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&config).await?;
        }
        Commands::Client { action } => match action {
            ClientAction::Create {
                first_name,
                last_name,
                email,
                description,
            } => {
                let fields = NewClient {
                    first_name,
                    last_name,
                    email,
                    description,
                };
                clients::run_client_create(&config, fields).await?;
            }
            ClientAction::Get { id } => {
                clients::run_client_get(&config, &id).await?;
            }
        },
        Commands::Document { action } => match action {
            DocumentAction::Create {
                client_id,
                title,
                content,
            } => {
                documents::run_document_create(&config, &client_id, &title, &content).await?;
            }
        },
        Commands::Search { query } => {
            search::run_search(&config, &query).await?;
        }
    }

    Ok(())
}
