//! # docsift
//!
//! Convert heterogeneous documents (PDF, DOCX, HTML, images) to Markdown,
//! then extract schema-defined fields from the Markdown via a language
//! model — recording a verbatim quote and a confidence score as evidence
//! for every extracted value.
//!
//! ## Pipeline Overview
//!
//! ```text
//! documents
//!  │
//!  ├─ 1. Convert   pandoc for markup formats, rendering service for
//!  │               PDF/images, with general→render fallback
//!  ├─ 2. Extract   constrained LLM generation against a schema
//!  │               descriptor, evidence + confidence per field
//!  └─ 3. Persist   <stem>.md and <stem>.json sidecars beside the source
//! ```
//!
//! Batch runs walk a directory, skip files whose sidecar already exists,
//! and collect per-file outcomes into a status report — one bad file never
//! aborts the batch.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docsift::{ConvertConfig, Converter, ExtractConfig, Extractor, Schema};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = Converter::from_config(&ConvertConfig::default())?;
//!     let markdown = converter.convert("application.docx").await?;
//!
//!     let schema = Schema::builder("grant")
//!         .text("project_id", "Applicant ID in format 'ORD2000111', top right")
//!         .integer("funding_requested", "Total funding amount requested")
//!         .build()?;
//!
//!     // API key from OPENAI_API_KEY
//!     let extractor = Extractor::from_config(ExtractConfig::default())?;
//!     let record = extractor.extract_text(&markdown, &schema).await?;
//!     println!("{}", serde_json::to_string_pretty(&record.to_sidecar_json())?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docsift` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docsift = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod batch;
pub mod config;
pub mod convert;
pub mod error;
pub mod evidence;
pub mod extract;
pub mod llm;
pub mod progress;
pub mod prompts;
pub mod schema;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{DocumentBackend, PandocBackend, RenderBackend, RenderServiceBackend};
pub use batch::{convert_dir, extract_dir, find_files, process_dir, BatchOptions, BatchReport, FileStatus};
pub use config::{ConvertConfig, ConvertConfigBuilder, ExtractConfig, ExtractConfigBuilder};
pub use convert::{route_for_extension, Converter, Route};
pub use error::SiftError;
pub use evidence::{EvidenceField, ExtractionRecord, FieldResult, FieldValue};
pub use extract::Extractor;
pub use llm::{ChatMessage, OpenAiStructuredClient, Role, StructuredClient};
pub use progress::BatchProgress;
pub use schema::{FieldKind, FieldSpec, Schema, SchemaBuilder};
