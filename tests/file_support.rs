//! Loader and ingestion behaviour on real file formats.

use std::fs;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use doc_qa::config::Config;
use doc_qa::embedding::Embedder;
use doc_qa::extract::{load_document, ExtractError};
use doc_qa::index::VectorIndex;
use doc_qa::ingest::process_document;

/// Minimal one-page PDF with "demo test phrase" in Helvetica.
fn minimal_pdf_with_phrase() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    let content = b"BT /F1 12 Tf 100 700 Td (demo test phrase) Tj ET";
    out.extend_from_slice(format!("4 0 obj << /Length {} >> stream\n", content.len()).as_bytes());
    out.extend_from_slice(content);
    out.extend_from_slice(b"\nendstream endobj\n");
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

struct LengthEmbedder;

#[async_trait]
impl Embedder for LengthEmbedder {
    fn model_name(&self) -> &str {
        "length"
    }
    fn dims(&self) -> usize {
        2
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
    }
}

fn config_for(tmp: &TempDir) -> Config {
    let src = format!(
        "[db]\npath = \"{0}/db.sqlite\"\n\n[media]\nroot = \"{0}/media\"\n\n[index]\nroot = \"{0}/faiss_index\"\n",
        tmp.path().display()
    );
    toml::from_str(&src).unwrap()
}

#[test]
fn pdf_loads_one_page_per_pdf_page() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("demo.pdf");
    fs::write(&path, minimal_pdf_with_phrase()).unwrap();

    let pages = load_document(&path).unwrap();
    assert_eq!(pages.len(), 1);
    assert!(pages[0].text.contains("demo test phrase"), "got: {:?}", pages[0].text);
    assert_eq!(pages[0].metadata.page, Some(0));
    assert_eq!(pages[0].metadata.source, path.display().to_string());
}

#[test]
fn extension_match_is_case_insensitive() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("DEMO.PDF");
    fs::write(&path, minimal_pdf_with_phrase()).unwrap();
    assert!(load_document(&path).is_ok());
}

#[test]
fn corrupt_pdf_is_a_pdf_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("broken.pdf");
    fs::write(&path, b"not a pdf").unwrap();

    let err = load_document(&path).unwrap_err();
    assert!(matches!(err, ExtractError::Pdf(_)), "got: {:?}", err);
}

#[test]
fn docx_is_unsupported() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("report.docx");
    fs::write(&path, b"PK").unwrap();

    let err = load_document(&path).unwrap_err();
    assert_eq!(err.to_string(), "Unsupported file type: .docx");
}

#[tokio::test]
async fn pdf_ingestion_keeps_page_metadata() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(&tmp);
    let path = tmp.path().join("demo.pdf");
    fs::write(&path, minimal_pdf_with_phrase()).unwrap();

    let report = process_document(&config, &LengthEmbedder, &path, "Demo Sheet")
        .await
        .unwrap();
    assert_eq!(report.index_name, "faiss_index_Demo_Sheet");

    let index = VectorIndex::load(&report.index_path).unwrap();
    index.ensure_compatible("length", 2).unwrap();
    let hits = index.search(&[16.0, 1.0], 4);
    assert_eq!(hits.len(), report.chunks);
    assert!(hits.iter().all(|h| h.chunk.metadata.page == Some(0)));
    assert!(hits
        .iter()
        .any(|h| h.chunk.text.contains("demo test phrase")));
}
