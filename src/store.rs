//! Document store.
//!
//! Persists document records in SQLite and owns the save trigger: saving a
//! document inserts its record first, then runs ingestion inline. Whatever
//! ingestion does, the record stays saved; the outcome is written to the
//! record's `index_status` / `index_error` columns instead of being returned
//! as an error.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::embedding::Embedder;
use crate::ingest;
use crate::models::{Document, IndexStatus};

/// Subdirectory of the media root that uploads are written to.
pub const UPLOAD_DIR: &str = "documents";

/// Write uploaded bytes under `<media_root>/documents/` and return the path
/// relative to the media root. An existing file with the same name is kept;
/// the new one gets a random suffix.
pub fn store_upload(media_root: &Path, file_name: &str, bytes: &[u8]) -> Result<String> {
    let base = Path::new(file_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "upload".to_string());

    let dir = media_root.join(UPLOAD_DIR);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create upload directory: {}", dir.display()))?;

    let mut stored = base.clone();
    loop {
        let target = dir.join(&stored);
        // create_new claims the name atomically.
        match OpenOptions::new().write(true).create_new(true).open(&target) {
            Ok(mut file) => {
                file.write_all(bytes)
                    .with_context(|| format!("Failed to write upload: {}", target.display()))?;
                break;
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                stored = with_suffix(&base, &uuid::Uuid::new_v4().simple().to_string()[..8]);
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to create upload: {}", target.display()))
            }
        }
    }

    Ok(format!("{}/{}", UPLOAD_DIR, stored))
}

fn with_suffix(file_name: &str, suffix: &str) -> String {
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}_{}", stem, suffix),
    }
}

/// Absolute location of a record's stored bytes.
pub fn resolve_file(config: &Config, file: &str) -> PathBuf {
    config.media.root.join(file)
}

/// Insert a document record and run ingestion for it.
///
/// Only storage failures are returned as errors. A missing source file,
/// an unsupported extension, or a provider failure is logged and recorded
/// on the returned record.
pub async fn save_document(
    pool: &SqlitePool,
    config: &Config,
    embedder: &dyn Embedder,
    name: &str,
    file: &str,
) -> Result<Document> {
    let uploaded_at = Utc::now();
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO documents (name, file, uploaded_at, index_status) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(name)
    .bind(file)
    .bind(uploaded_at.timestamp_micros())
    .bind(IndexStatus::Pending.as_str())
    .fetch_one(pool)
    .await
    .context("Failed to insert document record")?;

    let file_path = resolve_file(config, file);
    tracing::info!(id, document = name, path = %file_path.display(), "processing document");

    let (status, error, index_name) = if !file_path.exists() {
        tracing::warn!(id, document = name, path = %file_path.display(), "file does not exist, skipping ingestion");
        (
            IndexStatus::Skipped,
            Some(format!("File does not exist at {}", file_path.display())),
            None,
        )
    } else {
        match ingest::process_document(config, embedder, &file_path, name).await {
            Ok(report) => (IndexStatus::Indexed, None, Some(report.index_name)),
            Err(e) => {
                tracing::warn!(id, document = name, "ingestion failed; document kept without an index");
                (IndexStatus::Failed, Some(format!("{:#}", e)), None)
            }
        }
    };

    sqlx::query("UPDATE documents SET index_status = ?, index_error = ?, index_name = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(&error)
        .bind(&index_name)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to record ingestion outcome")?;

    Ok(Document {
        id,
        name: name.to_string(),
        file: file.to_string(),
        uploaded_at,
        index_status: status,
        index_error: error,
        index_name,
    })
}

/// Every document in storage (id) order.
pub async fn list_documents(pool: &SqlitePool) -> Result<Vec<Document>> {
    let rows = sqlx::query(
        "SELECT id, name, file, uploaded_at, index_status, index_error, index_name FROM documents ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(row_to_document).collect())
}

pub async fn count_documents(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn row_to_document(row: &SqliteRow) -> Document {
    let micros: i64 = row.get("uploaded_at");
    let status: String = row.get("index_status");
    Document {
        id: row.get("id"),
        name: row.get("name"),
        file: row.get("file"),
        uploaded_at: DateTime::from_timestamp_micros(micros).unwrap_or_default(),
        index_status: IndexStatus::parse(&status),
        index_error: row.get("index_error"),
        index_name: row.get("index_name"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::DisabledProvider;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, Config, SqlitePool) {
        let tmp = TempDir::new().unwrap();
        let src = format!(
            "[db]\npath = \"{0}/data/db.sqlite\"\n\n[media]\nroot = \"{0}/media\"\n\n[index]\nroot = \"{0}/faiss_index\"\n",
            tmp.path().display()
        );
        let config: Config = toml::from_str(&src).unwrap();
        let pool = crate::db::connect(&config).await.unwrap();
        crate::migrate::migrate_pool(&pool).await.unwrap();
        (tmp, config, pool)
    }

    #[test]
    fn upload_name_collision_gets_suffix() {
        let tmp = TempDir::new().unwrap();
        let first = store_upload(tmp.path(), "report.txt", b"one").unwrap();
        let second = store_upload(tmp.path(), "report.txt", b"two").unwrap();

        assert_eq!(first, "documents/report.txt");
        assert_ne!(first, second);
        assert!(second.starts_with("documents/report_"));
        assert!(second.ends_with(".txt"));
        assert_eq!(std::fs::read(tmp.path().join(&first)).unwrap(), b"one");
        assert_eq!(std::fs::read(tmp.path().join(&second)).unwrap(), b"two");
    }

    #[test]
    fn concurrent_uploads_with_same_name_never_share_a_file() {
        use std::sync::{Arc, Barrier};

        let tmp = TempDir::new().unwrap();
        let root = Arc::new(tmp.path().to_path_buf());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let root = root.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    let stored = store_upload(&root, "same.txt", &[b'a' + i]).unwrap();
                    (stored, b'a' + i)
                })
            })
            .collect();

        let results: Vec<(String, u8)> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let mut names: Vec<&String> = results.iter().map(|(n, _)| n).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 8);
        for (stored, byte) in &results {
            assert_eq!(std::fs::read(root.join(stored)).unwrap(), vec![*byte]);
        }
    }

    #[test]
    fn upload_strips_directories() {
        let tmp = TempDir::new().unwrap();
        let stored = store_upload(tmp.path(), "../../etc/passwd.txt", b"x").unwrap();
        assert_eq!(stored, "documents/passwd.txt");
    }

    #[tokio::test]
    async fn missing_file_is_skipped_but_saved() {
        let (_tmp, config, pool) = setup().await;

        let doc = save_document(&pool, &config, &DisabledProvider, "Ghost", "documents/ghost.txt")
            .await
            .unwrap();
        assert_eq!(doc.index_status, IndexStatus::Skipped);
        assert!(doc.index_error.unwrap().contains("does not exist"));
        assert_eq!(count_documents(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unsupported_type_is_recorded_not_raised() {
        let (_tmp, config, pool) = setup().await;
        let file = store_upload(&config.media.root, "table.csv", b"a,b").unwrap();

        let doc = save_document(&pool, &config, &DisabledProvider, "Table", &file)
            .await
            .unwrap();
        assert_eq!(doc.index_status, IndexStatus::Failed);
        assert!(doc.index_error.unwrap().contains("Unsupported file type"));

        let stored = list_documents(&pool).await.unwrap().remove(0);
        assert_eq!(stored.id, doc.id);
        assert_eq!(stored.index_status, IndexStatus::Failed);
        assert_eq!(stored.name, "Table");
    }

    #[tokio::test]
    async fn listing_follows_creation_order() {
        let (_tmp, config, pool) = setup().await;
        assert!(list_documents(&pool).await.unwrap().is_empty());

        for name in ["first", "second", "third"] {
            save_document(&pool, &config, &DisabledProvider, name, "documents/none.txt")
                .await
                .unwrap();
        }

        let names: Vec<String> = list_documents(&pool)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }
}
