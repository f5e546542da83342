//! On-disk vector indexes.
//!
//! Each ingested document produces one directory under the index root named
//! `faiss_index_<sanitized document name>`:
//!
//! ```text
//! <index root>/
//! └── faiss_index_Quarterly_Report/
//!     ├── index.json    manifest + chunk texts and metadata
//!     └── vectors.bin   little-endian f32 rows, one per chunk
//! ```
//!
//! Naming depends on the document name only, so two documents that sanitize
//! to the same name share a directory and the later ingestion wins.
//!
//! Search is brute-force cosine similarity over every stored vector.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{Chunk, ScoredChunk};

/// Fixed tag prefixed to every index directory name.
pub const INDEX_PREFIX: &str = "faiss_index";

const MANIFEST_FILE: &str = "index.json";
const VECTORS_FILE: &str = "vectors.bin";
const FORMAT_VERSION: u32 = 1;

/// Keep alphanumerics, spaces, hyphens, and underscores; drop trailing
/// whitespace; turn spaces into underscores.
pub fn sanitize_name(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    kept.trim_end().replace(' ', "_")
}

/// Directory name of the index built for a document called `document_name`.
pub fn index_name(document_name: &str) -> String {
    format!("{}_{}", INDEX_PREFIX, sanitize_name(document_name))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub document_name: String,
    /// Embedding model the vectors were produced with.
    pub embedding_model: String,
    pub dims: usize,
    pub created_at: DateTime<Utc>,
    /// SHA-256 of `vectors.bin`, hex.
    pub vectors_sha256: String,
    pub chunks: Vec<Chunk>,
}

/// A flat similarity index over the chunks of one document.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    pub manifest: IndexManifest,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    pub fn build(
        document_name: &str,
        embedding_model: &str,
        dims: usize,
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self> {
        if chunks.len() != vectors.len() {
            bail!(
                "index needs one vector per chunk ({} chunks, {} vectors)",
                chunks.len(),
                vectors.len()
            );
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            bail!(
                "vector has {} dimensions, index expects {}",
                bad.len(),
                dims
            );
        }

        Ok(Self {
            manifest: IndexManifest {
                format_version: FORMAT_VERSION,
                document_name: document_name.to_string(),
                embedding_model: embedding_model.to_string(),
                dims,
                created_at: Utc::now(),
                vectors_sha256: String::new(),
                chunks,
            },
            vectors,
        })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Write the index to `<root>/<index_name(document_name)>`, creating
    /// directories as needed and overwriting any previous index there.
    pub fn save(&mut self, root: &Path) -> Result<PathBuf> {
        let dir = root.join(index_name(&self.manifest.document_name));
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create index directory: {}", dir.display()))?;

        let mut blob = Vec::with_capacity(self.vectors.len() * self.manifest.dims * 4);
        for v in &self.vectors {
            blob.extend_from_slice(&vec_to_blob(v));
        }
        self.manifest.vectors_sha256 = sha256_hex(&blob);

        std::fs::write(dir.join(VECTORS_FILE), &blob)
            .with_context(|| format!("Failed to write vectors to {}", dir.display()))?;
        let manifest = serde_json::to_vec_pretty(&self.manifest)?;
        std::fs::write(dir.join(MANIFEST_FILE), manifest)
            .with_context(|| format!("Failed to write manifest to {}", dir.display()))?;

        Ok(dir)
    }

    /// Read an index directory written by [`VectorIndex::save`].
    pub fn load(dir: &Path) -> Result<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let raw = std::fs::read(&manifest_path)
            .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
        let manifest: IndexManifest = serde_json::from_slice(&raw)
            .with_context(|| format!("Invalid index manifest: {}", manifest_path.display()))?;

        if manifest.format_version != FORMAT_VERSION {
            bail!(
                "Unsupported index format version {} in {}",
                manifest.format_version,
                dir.display()
            );
        }

        let vectors_path = dir.join(VECTORS_FILE);
        let blob = std::fs::read(&vectors_path)
            .with_context(|| format!("Failed to read {}", vectors_path.display()))?;
        if sha256_hex(&blob) != manifest.vectors_sha256 {
            bail!("Index vectors are corrupt or incomplete: {}", dir.display());
        }

        let row_bytes = manifest.dims * 4;
        if row_bytes == 0 || blob.len() != row_bytes * manifest.chunks.len() {
            bail!(
                "Index {} holds {} bytes of vectors for {} chunks of {} dimensions",
                dir.display(),
                blob.len(),
                manifest.chunks.len(),
                manifest.dims
            );
        }

        let vectors = blob.chunks_exact(row_bytes).map(blob_to_vec).collect();
        Ok(Self { manifest, vectors })
    }

    /// Fail unless the index was built with the given embedding model.
    pub fn ensure_compatible(&self, embedding_model: &str, dims: usize) -> Result<()> {
        if self.manifest.embedding_model != embedding_model || self.manifest.dims != dims {
            bail!(
                "Index for '{}' was built with embedding model {} ({} dims) but {} ({} dims) is configured",
                self.manifest.document_name,
                self.manifest.embedding_model,
                self.manifest.dims,
                embedding_model,
                dims
            );
        }
        Ok(())
    }

    /// The `k` chunks most similar to `query`, best first. Ties keep chunk order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<ScoredChunk> = self
            .manifest
            .chunks
            .iter()
            .zip(self.vectors.iter())
            .map(|(chunk, v)| ScoredChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(query, v),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        scored
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Result of scanning the index root at query time.
#[derive(Debug, PartialEq, Eq)]
pub enum Discovery {
    /// The index root directory does not exist.
    MissingRoot,
    /// The root exists but holds no `faiss_index_*` entries.
    Empty,
    /// The first entry in lexicographic order.
    Found(PathBuf),
}

/// All `faiss_index_*` entries directly under `root`, sorted by name.
pub fn list_indexes(root: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}_", INDEX_PREFIX);
    let mut found = Vec::new();

    for entry in std::fs::read_dir(root)
        .with_context(|| format!("Failed to list index directory: {}", root.display()))?
    {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with(&pattern) {
            found.push(entry.path());
        }
    }

    found.sort();
    Ok(found)
}

/// Pick the index a question is answered against.
pub fn discover_first(root: &Path) -> Result<Discovery> {
    if !root.is_dir() {
        return Ok(Discovery::MissingRoot);
    }
    Ok(list_indexes(root)?
        .into_iter()
        .next()
        .map(Discovery::Found)
        .unwrap_or(Discovery::Empty))
}
