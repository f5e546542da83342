//! Question answering over the first discovered index.
//!
//! Preconditions are checked in a fixed order and each one short-circuits
//! with its own [`AskError`] variant, so callers can tell "nothing uploaded"
//! apart from "uploaded but never indexed".

use anyhow::Context;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::embedding::{embed_query, Embedder};
use crate::index::{discover_first, Discovery, VectorIndex};
use crate::llm::{build_prompt, Generator};
use crate::models::Chunk;
use crate::store;

#[derive(Debug, thiserror::Error)]
pub enum AskError {
    #[error("No question provided")]
    EmptyQuestion,
    #[error("No documents found in database. Please upload some documents first.")]
    NoDocuments,
    #[error(
        "Knowledge base index not found. {0} document(s) exist in database but index was not created. Please try re-uploading a document."
    )]
    IndexDirMissing(i64),
    #[error(
        "Index files not found. {0} document(s) exist but no index files were created. Please try re-uploading a document."
    )]
    NoIndexFiles(i64),
    #[error("Error processing question: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AskError {
    fn from(e: anyhow::Error) -> Self {
        AskError::Internal(format!("{:#}", e))
    }
}

/// A generated answer and the source of every chunk it was grounded in.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<String>,
}

pub async fn answer_question(
    pool: &SqlitePool,
    config: &Config,
    embedder: &dyn Embedder,
    generator: &dyn Generator,
    question: &str,
) -> Result<Answer, AskError> {
    // Only an empty string is rejected; whitespace counts as a question.
    if question.is_empty() {
        return Err(AskError::EmptyQuestion);
    }

    let document_count = store::count_documents(pool).await?;
    if document_count == 0 {
        return Err(AskError::NoDocuments);
    }

    let index_path = match discover_first(&config.index.root)? {
        Discovery::MissingRoot => return Err(AskError::IndexDirMissing(document_count)),
        Discovery::Empty => return Err(AskError::NoIndexFiles(document_count)),
        Discovery::Found(path) => path,
    };
    tracing::info!(index = %index_path.display(), "loading index");

    let index = tokio::task::spawn_blocking(move || VectorIndex::load(&index_path))
        .await
        .context("Index loader task failed")??;
    index.ensure_compatible(embedder.model_name(), embedder.dims())?;

    let query_vector = embed_query(embedder, question)
        .await
        .context("Failed to embed question")?;
    let retrieved: Vec<Chunk> = index
        .search(&query_vector, config.retrieval.top_k)
        .into_iter()
        .map(|hit| hit.chunk)
        .collect();
    tracing::debug!(retrieved = retrieved.len(), "chunks retrieved");

    let prompt = build_prompt(question, &retrieved);
    tracing::debug!(model = generator.model_name(), "generating answer");
    let completion = generator
        .complete(&prompt)
        .await
        .context("Failed to generate answer")?;

    Ok(Answer {
        answer: completion.trim().to_string(),
        sources: retrieved.into_iter().map(|c| c.metadata.source).collect(),
    })
}
