//! # doc-qa CLI (`docqa`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa init` | Create the SQLite database and run schema migrations |
//! | `docqa upload <path>` | Store a file as a document and index it |
//! | `docqa documents` | List documents in upload order |
//! | `docqa ask "<question>"` | Answer a question from the knowledge base |
//! | `docqa serve` | Start the HTTP API |
//!
//! ```bash
//! docqa --config ./config/docqa.toml init
//! docqa --config ./config/docqa.toml upload ./handbook.pdf --name "Handbook"
//! docqa --config ./config/docqa.toml ask "How many vacation days do I get?"
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use doc_qa::{ask, config, db, embedding, llm, migrate, server, store};

/// Document question answering over uploaded files.
#[derive(Parser)]
#[command(name = "docqa", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Store a file as a document and run ingestion for it.
    ///
    /// The document record is kept even when ingestion fails; the outcome
    /// is shown in the `status` line.
    Upload {
        /// File to upload (.pdf, .md or .txt are indexed).
        path: PathBuf,

        /// Display name. Defaults to the file name.
        #[arg(long)]
        name: Option<String>,
    },

    /// List documents in upload order.
    Documents,

    /// Answer a question from the first available index.
    Ask {
        question: String,
    },

    /// Start the HTTP API.
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("doc_qa=info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Connect and make sure the schema exists; migrations are idempotent.
async fn open_pool(cfg: &config::Config) -> anyhow::Result<sqlx::SqlitePool> {
    let pool = db::connect(cfg).await?;
    migrate::migrate_pool(&pool).await?;
    Ok(pool)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Upload { path, name } => {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .with_context(|| format!("Not a file path: {}", path.display()))?;
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let name = name.unwrap_or_else(|| file_name.clone());

            let pool = open_pool(&cfg).await?;
            let embedder = embedding::create_provider(&cfg.embedding)?;
            let file = store::store_upload(&cfg.media.root, &file_name, &bytes)?;
            let doc = store::save_document(&pool, &cfg, embedder.as_ref(), &name, &file).await?;

            println!("id:     {}", doc.id);
            println!("name:   {}", doc.name);
            println!("file:   {}", doc.file);
            println!("status: {}", doc.index_status);
            if let Some(index_name) = &doc.index_name {
                println!("index:  {}", index_name);
            }
            if let Some(error) = &doc.index_error {
                println!("error:  {}", error);
            }
        }
        Commands::Documents => {
            let pool = open_pool(&cfg).await?;
            let docs = store::list_documents(&pool).await?;
            if docs.is_empty() {
                println!("No documents.");
            }
            for doc in docs {
                println!(
                    "{}\t{}\t{}\t{}",
                    doc.id,
                    doc.uploaded_at.to_rfc3339(),
                    doc.index_status,
                    doc.name
                );
            }
        }
        Commands::Ask { question } => {
            let pool = open_pool(&cfg).await?;
            let embedder = embedding::create_provider(&cfg.embedding)?;
            let generator = llm::create_generator(&cfg.llm)?;
            let answer = ask::answer_question(
                &pool,
                &cfg,
                embedder.as_ref(),
                generator.as_ref(),
                &question,
            )
            .await?;

            println!("{}", answer.answer);
            if !answer.sources.is_empty() {
                println!();
                println!("Sources:");
                for source in &answer.sources {
                    println!("  - {}", source);
                }
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
