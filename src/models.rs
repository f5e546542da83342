//! Core data models shared by the store, the ingestion pipeline, and the
//! query path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored upload. Created once, never updated by users.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: i64,
    pub name: String,
    /// Path of the stored bytes, relative to the media root.
    pub file: String,
    pub uploaded_at: DateTime<Utc>,
    pub index_status: IndexStatus,
    pub index_error: Option<String>,
    pub index_name: Option<String>,
}

/// Outcome of the ingestion run triggered when a document is saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStatus {
    Pending,
    Indexed,
    Skipped,
    Failed,
}

impl IndexStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexStatus::Pending => "pending",
            IndexStatus::Indexed => "indexed",
            IndexStatus::Skipped => "skipped",
            IndexStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "indexed" => IndexStatus::Indexed,
            "skipped" => IndexStatus::Skipped,
            "failed" => IndexStatus::Failed,
            _ => IndexStatus::Pending,
        }
    }
}

impl std::fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a chunk came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default)]
    pub source: String,
    /// 0-based page number; PDFs only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// A segment of extracted text sized for independent embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_index: i64,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A chunk returned by similarity search.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}
