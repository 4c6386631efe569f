//! Structured extraction from Markdown text.
//!
//! The extractor shapes the request — prompt, schema, message list — and
//! hands generation, conformance, and retry to the [`StructuredClient`].
//! It owns two side concerns the client does not: reading source files and
//! persisting JSON sidecars.

use crate::config::ExtractConfig;
use crate::error::SiftError;
use crate::evidence::ExtractionRecord;
use crate::llm::{ChatMessage, OpenAiStructuredClient, StructuredClient};
use crate::prompts::{combine_documents, extraction_prompt, EXTRACTION_SYSTEM_PROMPT};
use crate::schema::Schema;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Evidence-tracked structured extraction against a [`Schema`].
pub struct Extractor {
    client: Arc<dyn StructuredClient>,
    config: ExtractConfig,
}

impl Extractor {
    /// Build an extractor over the default OpenAI-compatible client.
    pub fn from_config(config: ExtractConfig) -> Result<Self, SiftError> {
        let client = OpenAiStructuredClient::from_config(&config)?;
        Ok(Self {
            client: Arc::new(client),
            config,
        })
    }

    /// Use a caller-supplied client (tests substitute a mock here).
    pub fn with_client(client: Arc<dyn StructuredClient>, config: ExtractConfig) -> Self {
        Self { client, config }
    }

    /// Extract a schema instance from Markdown text.
    pub async fn extract_text(
        &self,
        text: &str,
        schema: &Schema,
    ) -> Result<ExtractionRecord, SiftError> {
        let user_prompt = match &self.config.custom_prompt {
            Some(custom) => format!("{custom}\n\n{text}"),
            None => extraction_prompt(schema, text),
        };

        let messages = [
            ChatMessage::system(EXTRACTION_SYSTEM_PROMPT),
            ChatMessage::user(user_prompt),
        ];

        self.client
            .extract(schema, &messages, self.config.max_retries)
            .await
    }

    /// Extract from a single Markdown file; when `save_json` is set, write
    /// the `<stem>.json` sidecar beside it.
    pub async fn extract_file(
        &self,
        path: impl AsRef<Path>,
        schema: &Schema,
        save_json: bool,
    ) -> Result<ExtractionRecord, SiftError> {
        let path = path.as_ref();
        let text = read_markdown(path).await?;

        let record = self.extract_text(&text, schema).await?;

        if save_json {
            let sidecar = path.with_extension("json");
            record.write_sidecar(&sidecar).await?;
            info!(
                "extracted {} ({}/{} fields) -> {}",
                path.display(),
                record.found_count(),
                schema.fields().len(),
                sidecar.display()
            );
        }

        Ok(record)
    }

    /// Extract across several files in one combined call.
    ///
    /// Documents are concatenated with explicit separators so the model
    /// can cross-reference context between them rather than extracting
    /// independently per file. Missing paths are skipped with a warning;
    /// if none remain, the call fails with [`SiftError::NotFound`]. The
    /// sidecar is written beside the first valid file.
    pub async fn extract_files(
        &self,
        paths: &[PathBuf],
        schema: &Schema,
        save_json: bool,
    ) -> Result<ExtractionRecord, SiftError> {
        if paths.is_empty() {
            return Err(SiftError::ExtractionFailed {
                detail: "no input files provided".into(),
            });
        }

        let mut documents = Vec::with_capacity(paths.len());
        let mut valid_paths = Vec::with_capacity(paths.len());
        for path in paths {
            if !path.exists() {
                warn!("skipping missing input {}", path.display());
                continue;
            }
            let text = read_markdown(path).await?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            documents.push((name, text));
            valid_paths.push(path.clone());
        }

        let first = match valid_paths.first() {
            Some(p) => p.clone(),
            None => {
                return Err(SiftError::NotFound {
                    path: paths[0].clone(),
                })
            }
        };

        let combined = combine_documents(&documents);
        let record = self.extract_text(&combined, schema).await?;

        if save_json {
            let sidecar = first.with_extension("json");
            record.write_sidecar(&sidecar).await?;
            info!(
                "extracted {} documents -> {}",
                documents.len(),
                sidecar.display()
            );
        }

        Ok(record)
    }
}

async fn read_markdown(path: &Path) -> Result<String, SiftError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SiftError::NotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => SiftError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => SiftError::ExtractionFailed {
                detail: format!("failed to read {}: {e}", path.display()),
            },
        })
}
