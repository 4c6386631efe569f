//! Conversion backends.
//!
//! Two collaborator seams, one per class of input:
//!
//! 1. [`DocumentBackend`] — a general document-format converter for
//!    markup-ish formats (DOCX, HTML, ODT, EPUB, …). Implemented by
//!    [`PandocBackend`].
//! 2. [`RenderBackend`] — a renderer that reads PDFs and images and emits
//!    Markdown. Implemented by [`RenderServiceBackend`].
//!
//! Both are object-safe so the [`crate::convert::Converter`] can hold them
//! as trait objects and tests can substitute in-memory fakes.

pub mod pandoc;
pub mod render;

pub use pandoc::PandocBackend;
pub use render::RenderServiceBackend;

use crate::error::SiftError;
use async_trait::async_trait;
use std::path::Path;

/// General document-format converter (the first-choice backend for
/// anything that is not a PDF or image).
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Short backend name for logs and error messages.
    fn name(&self) -> &'static str;

    /// Convert the file at `path` to Markdown text.
    async fn convert(&self, path: &Path) -> Result<String, SiftError>;
}

/// PDF/image rendering backend. Also the fallback when the general
/// backend fails on a format it claims to support.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Short backend name for logs and error messages.
    fn name(&self) -> &'static str;

    /// Render the file at `path` to Markdown text.
    async fn render(&self, path: &Path) -> Result<String, SiftError>;
}
