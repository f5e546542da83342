//! Ingestion pipeline: load → chunk → embed → index → save.
//!
//! Runs inline inside the document save. Errors are logged here with the
//! document name and returned; the store decides whether to surface them.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::chunk::chunk_pages;
use crate::config::Config;
use crate::embedding::{embed_batched, Embedder};
use crate::extract::load_document;
use crate::index::VectorIndex;

/// What a successful ingestion produced.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub index_name: String,
    pub index_path: PathBuf,
    pub chunks: usize,
}

/// Build and persist the vector index for one document.
pub async fn process_document(
    config: &Config,
    embedder: &dyn Embedder,
    file_path: &Path,
    document_name: &str,
) -> Result<IngestReport> {
    match build_and_save(config, embedder, file_path, document_name).await {
        Ok(report) => {
            tracing::info!(
                document = document_name,
                index = %report.index_path.display(),
                chunks = report.chunks,
                "document indexed"
            );
            Ok(report)
        }
        Err(e) => {
            tracing::error!(document = document_name, error = %format!("{:#}", e), "error processing document");
            Err(e)
        }
    }
}

async fn build_and_save(
    config: &Config,
    embedder: &dyn Embedder,
    file_path: &Path,
    document_name: &str,
) -> Result<IngestReport> {
    // PDF extraction and index writes are blocking.
    let path = file_path.to_path_buf();
    let pages = tokio::task::spawn_blocking(move || load_document(&path))
        .await
        .context("Document loader task failed")??;
    let chunks = chunk_pages(&pages, config.chunking.max_tokens);
    if chunks.is_empty() {
        bail!("No text extracted from {}", file_path.display());
    }
    tracing::debug!(
        document = document_name,
        pages = pages.len(),
        chunks = chunks.len(),
        "document split"
    );

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embed_batched(embedder, &texts, config.embedding.batch_size)
        .await
        .with_context(|| format!("Embedding failed for {}", document_name))?;

    let chunk_count = chunks.len();
    let mut index = VectorIndex::build(
        document_name,
        embedder.model_name(),
        embedder.dims(),
        chunks,
        vectors,
    )?;
    let root = config.index.root.clone();
    let index_path = tokio::task::spawn_blocking(move || index.save(&root))
        .await
        .context("Index writer task failed")??;
    let index_name = index_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(IngestReport {
        index_name,
        index_path,
        chunks: chunk_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct CountingEmbedder;

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, t.matches(' ').count() as f32])
                .collect())
        }
    }

    fn config_for(root: &Path) -> Config {
        let src = format!(
            "[db]\npath = \"{0}/db.sqlite\"\n\n[media]\nroot = \"{0}/media\"\n\n[index]\nroot = \"{0}/faiss_index\"\n\n[chunking]\nmax_tokens = 8\n",
            root.display()
        );
        toml::from_str(&src).unwrap()
    }

    #[tokio::test]
    async fn markdown_produces_one_named_index() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(tmp.path());
        let file = tmp.path().join("guide.md");
        std::fs::write(&file, "First paragraph here.\n\nSecond paragraph here.").unwrap();

        let report = process_document(&config, &CountingEmbedder, &file, "User Guide")
            .await
            .unwrap();
        assert_eq!(report.index_name, "faiss_index_User_Guide");
        assert_eq!(report.chunks, 2);

        let entries = crate::index::list_indexes(&config.index.root).unwrap();
        assert_eq!(entries, vec![config.index.root.join("faiss_index_User_Guide")]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn concurrent_ingestions_on_one_worker_both_finish() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(tmp.path());
        let first = tmp.path().join("first.txt");
        let second = tmp.path().join("second.md");
        std::fs::write(&first, "First document text.").unwrap();
        std::fs::write(&second, "Second document text.").unwrap();

        let (a, b) = tokio::join!(
            process_document(&config, &CountingEmbedder, &first, "first"),
            process_document(&config, &CountingEmbedder, &second, "second"),
        );
        assert_eq!(a.unwrap().index_name, "faiss_index_first");
        assert_eq!(b.unwrap().index_name, "faiss_index_second");
        assert_eq!(crate::index::list_indexes(&config.index.root).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unsupported_extension_fails() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(tmp.path());
        let file = tmp.path().join("data.csv");
        std::fs::write(&file, "a,b,c").unwrap();

        let err = process_document(&config, &CountingEmbedder, &file, "data")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unsupported file type"));
        assert!(!config.index.root.exists());
    }

    #[tokio::test]
    async fn embedding_failure_propagates() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(tmp.path());
        let file = tmp.path().join("notes.txt");
        std::fs::write(&file, "some notes").unwrap();

        let err = process_document(&config, &crate::embedding::DisabledProvider, &file, "notes")
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("disabled"));
    }

    #[tokio::test]
    async fn empty_file_fails() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(tmp.path());
        let file = tmp.path().join("empty.txt");
        std::fs::write(&file, "   ").unwrap();

        let err = process_document(&config, &CountingEmbedder, &file, "empty")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No text extracted"));
    }
}
