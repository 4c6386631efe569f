//! PDF/image rendering via an HTTP rendering service.
//!
//! The heavy lifting — layout analysis, OCR, table reconstruction — lives
//! in an external service (a marker-style model pipeline) exposed over
//! HTTP. This backend uploads the file and returns the Markdown the
//! service produced; it knows nothing about how the rendering happens.
//!
//! Expected service contract: `POST {base_url}/convert` with a multipart
//! `file` part and an `output_format=markdown` form field, responding with
//! a JSON object carrying the result under `markdown` (or `output` for
//! older service versions).

use crate::backend::RenderBackend;
use crate::error::SiftError;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// [`RenderBackend`] that talks to a rendering service over HTTP.
#[derive(Debug, Clone)]
pub struct RenderServiceBackend {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct RenderResponse {
    markdown: Option<String>,
    output: Option<String>,
}

impl RenderServiceBackend {
    /// Create a backend for the service at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, SiftError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SiftError::Internal(format!("http client: {e}")))?;
        let base_url = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RenderBackend for RenderServiceBackend {
    fn name(&self) -> &'static str {
        "render-service"
    }

    async fn render(&self, path: &Path) -> Result<String, SiftError> {
        let url = format!("{}/convert", self.base_url);
        debug!("render-service: uploading {} to {}", path.display(), url);

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => SiftError::NotFound {
                    path: path.to_path_buf(),
                },
                std::io::ErrorKind::PermissionDenied => SiftError::PermissionDenied {
                    path: path.to_path_buf(),
                },
                _ => SiftError::ConversionFailed {
                    path: path.to_path_buf(),
                    detail: e.to_string(),
                },
            })?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(filename),
            )
            .text("output_format", "markdown");

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    SiftError::BackendUnavailable {
                        backend: "render-service".into(),
                        hint: format!(
                            "Could not reach the rendering service at {}. \
                             Start it or point render_url at a running instance.",
                            self.base_url
                        ),
                    }
                } else {
                    SiftError::ConversionFailed {
                        path: path.to_path_buf(),
                        detail: e.to_string(),
                    }
                }
            })?;

        if !response.status().is_success() {
            return Err(SiftError::ConversionFailed {
                path: path.to_path_buf(),
                detail: format!("rendering service returned HTTP {}", response.status()),
            });
        }

        let body: RenderResponse =
            response
                .json()
                .await
                .map_err(|e| SiftError::ConversionFailed {
                    path: path.to_path_buf(),
                    detail: format!("unreadable service response: {e}"),
                })?;

        body.markdown
            .or(body.output)
            .filter(|md| !md.trim().is_empty())
            .ok_or_else(|| SiftError::ConversionFailed {
                path: path.to_path_buf(),
                detail: "rendering service response carried no markdown".into(),
            })
    }
}
