//! Error types for the docsift library.
//!
//! One enum, [`SiftError`], covers both pipeline stages. The batch driver
//! never propagates per-file errors: anything raised while processing a
//! single file is downgraded to a [`crate::batch::FileStatus::Error`] entry
//! and the batch continues. Only pre-flight failures (missing directory,
//! invalid configuration) abort a batch before any file is touched.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the docsift library.
#[derive(Debug, Error)]
pub enum SiftError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file or directory was not found at the given path.
    #[error("Not found: '{path}'\nCheck the path exists and is readable.")]
    NotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    // ── Backend errors ────────────────────────────────────────────────────
    /// A required conversion or extraction backend is not installed or
    /// not reachable. Terminal — there is no fallback past the documented
    /// general→render chain.
    #[error("Backend '{backend}' is unavailable.\n{hint}")]
    BackendUnavailable { backend: String, hint: String },

    /// A backend ran but produced no usable Markdown.
    #[error("Conversion failed for '{path}': {detail}")]
    ConversionFailed { path: PathBuf, detail: String },

    /// The extraction stage ran but produced no usable record.
    #[error("Extraction failed: {detail}")]
    ExtractionFailed { detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The LLM API returned an error response.
    #[error("LLM API error: {message}")]
    ApiError { message: String },

    /// Every attempt within the client's retry budget failed.
    #[error("Extraction failed after {attempts} attempts.\nLast error: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    // ── Schema errors ─────────────────────────────────────────────────────
    /// Malformed schema definition (not a flat name→description mapping)
    /// or a model response that does not conform to the schema.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output sidecar file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
