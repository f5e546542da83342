//! # doc-qa
//!
//! Upload documents, index them, and ask questions answered from their
//! content.
//!
//! Saving a document runs ingestion inline: the file is loaded by a loader
//! chosen from its extension, split into chunks, embedded, and written as a
//! vector index directory named `faiss_index_<sanitized name>`. Questions are
//! answered from the first index found under the index root by retrieving
//! the closest chunks and handing them to a text-generation model.
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────────┐   ┌──────────────┐
//! │  upload  │──▶│ load → chunk → embed     │──▶│ faiss_index_*│
//! └──────────┘   └──────────────────────────┘   └──────┬───────┘
//!                                                      │
//! ┌──────────┐   ┌──────────────────────────┐          │
//! │ question │──▶│ embed → top-k → generate │◀─────────┘
//! └──────────┘   └──────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`models`] | Core data types |
//! | [`extract`] | Extension-dispatched document loaders |
//! | [`chunk`] | Text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Text-generation provider abstraction |
//! | [`http`] | Shared HTTP client and retry policy |
//! | [`index`] | On-disk vector index |
//! | [`ingest`] | Ingestion pipeline |
//! | [`store`] | Document records and the save trigger |
//! | [`ask`] | Question answering |
//! | [`server`] | HTTP API |

pub mod ask;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod http;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod server;
pub mod store;
