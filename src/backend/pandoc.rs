//! General document conversion via the pandoc executable.
//!
//! pandoc handles the markup-ish formats (DOCX, HTML, ODT, EPUB, RTF, …)
//! quickly and deterministically, which is why it is tried before the
//! rendering backend for anything that is not a PDF or image. The process
//! is spawned per file; pandoc keeps no state between runs.

use crate::backend::DocumentBackend;
use crate::error::SiftError;
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// [`DocumentBackend`] backed by a locally installed pandoc binary.
#[derive(Debug, Clone)]
pub struct PandocBackend {
    binary: String,
}

impl PandocBackend {
    /// Use a specific pandoc executable (a bare name resolves via PATH).
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for PandocBackend {
    fn default() -> Self {
        Self::new("pandoc")
    }
}

#[async_trait]
impl DocumentBackend for PandocBackend {
    fn name(&self) -> &'static str {
        "pandoc"
    }

    async fn convert(&self, path: &Path) -> Result<String, SiftError> {
        debug!("pandoc: converting {}", path.display());

        // --wrap=none keeps source lines intact so evidence quotes remain
        // exact substrings of the emitted Markdown.
        let output = Command::new(&self.binary)
            .arg(path)
            .args(["--to=markdown", "--wrap=none", "--markdown-headings=atx"])
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => SiftError::BackendUnavailable {
                    backend: "pandoc".into(),
                    hint: format!(
                        "'{}' was not found. Install pandoc (https://pandoc.org/installing.html) \
                         or point pandoc_path at the executable.",
                        self.binary
                    ),
                },
                _ => SiftError::ConversionFailed {
                    path: path.to_path_buf(),
                    detail: format!("failed to spawn pandoc: {e}"),
                },
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SiftError::ConversionFailed {
                path: path.to_path_buf(),
                detail: format!(
                    "pandoc exited with {}: {}",
                    output.status,
                    stderr.trim()
                ),
            });
        }

        let markdown = String::from_utf8_lossy(&output.stdout).into_owned();
        if markdown.trim().is_empty() {
            return Err(SiftError::ConversionFailed {
                path: path.to_path_buf(),
                detail: "pandoc produced empty output".into(),
            });
        }

        Ok(markdown)
    }
}
