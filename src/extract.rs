//! Extension-dispatched text loaders.
//!
//! `.pdf` files are read page by page with `pdf-extract`; `.md` and `.txt`
//! files are read whole as UTF-8. Each loaded page carries the file path as
//! its `source` so answers can cite where a chunk came from.

use std::path::{Path, PathBuf};

use crate::models::ChunkMetadata;

/// Extraction error. The pipeline reports it; it never panics.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// How a file's text is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderKind {
    /// One page of output per PDF page.
    Pdf,
    /// The whole file as one page.
    PlainText,
}

impl LoaderKind {
    /// Pick a loader from the file extension (case-insensitive).
    pub fn for_path(path: &Path) -> Result<Self, ExtractError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => Ok(LoaderKind::Pdf),
            "md" | "txt" => Ok(LoaderKind::PlainText),
            "" => Err(ExtractError::UnsupportedFileType("(none)".to_string())),
            other => Err(ExtractError::UnsupportedFileType(format!(".{}", other))),
        }
    }
}

/// Text of one page together with the metadata its chunks inherit.
#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Load a file's text using the loader its extension maps to.
pub fn load_document(path: &Path) -> Result<Vec<LoadedPage>, ExtractError> {
    let kind = LoaderKind::for_path(path)?;
    let source = path.display().to_string();

    match kind {
        LoaderKind::Pdf => {
            let bytes = std::fs::read(path).map_err(|e| ExtractError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
            let pages = extract_pdf_pages(&bytes)?;
            Ok(pages
                .into_iter()
                .enumerate()
                .map(|(i, text)| LoadedPage {
                    text,
                    metadata: ChunkMetadata {
                        source: source.clone(),
                        page: Some(i as u32),
                    },
                })
                .collect())
        }
        LoaderKind::PlainText => {
            let text = std::fs::read_to_string(path).map_err(|e| ExtractError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
            Ok(vec![LoadedPage {
                text,
                metadata: ChunkMetadata { source, page: None },
            }])
        }
    }
}

fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}
