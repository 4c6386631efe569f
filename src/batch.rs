//! Directory-level batch processing.
//!
//! Both pipeline stages share one contract: walk a directory, apply a
//! per-file operation, skip files whose target artifact already exists,
//! and collect a per-file outcome into a [`BatchReport`]. A failure on one
//! file is recorded and never aborts the batch.
//!
//! Processing is strictly sequential. Each file's source/target pair is
//! independent, so there is no shared state to coordinate; the trade-off
//! is that a hung backend call blocks the batch (there is no batch-level
//! timeout). The skip-check and the target write are not atomic against
//! other processes — single-writer operation is assumed.

use crate::convert::{render_only_extensions, Converter};
use crate::error::SiftError;
use crate::extract::Extractor;
use crate::progress::BatchProgress;
use crate::schema::Schema;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Outcome for one file in a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// Target artifact already existed and skip-existing was enabled.
    Skipped,
    /// Markdown sidecar produced.
    Converted,
    /// JSON sidecar produced.
    Extracted,
    /// Processing raised an error; the message is the raw error text.
    Error(String),
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Skipped => write!(f, "skipped"),
            FileStatus::Converted => write!(f, "converted"),
            FileStatus::Extracted => write!(f, "extracted"),
            FileStatus::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

/// Per-file outcomes of one batch run, keyed by source path.
///
/// Built fresh per run and never persisted; callers print the tally or
/// inspect individual entries.
#[derive(Debug, Default)]
pub struct BatchReport {
    statuses: BTreeMap<String, FileStatus>,
}

impl BatchReport {
    pub fn insert(&mut self, path: &Path, status: FileStatus) {
        self.statuses.insert(path.display().to_string(), status);
    }

    pub fn get(&self, path: &Path) -> Option<&FileStatus> {
        self.statuses.get(&path.display().to_string())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FileStatus)> {
        self.statuses.iter()
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Files that produced a new artifact (`converted` or `extracted`).
    pub fn produced(&self) -> usize {
        self.statuses
            .values()
            .filter(|s| matches!(s, FileStatus::Converted | FileStatus::Extracted))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.statuses
            .values()
            .filter(|s| matches!(s, FileStatus::Skipped))
            .count()
    }

    pub fn errored(&self) -> usize {
        self.statuses
            .values()
            .filter(|s| matches!(s, FileStatus::Error(_)))
            .count()
    }
}

impl fmt::Display for BatchReport {
    /// Tri-count summary: produced / skipped / errored.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} produced, {} skipped, {} errored ({} total)",
            self.produced(),
            self.skipped(),
            self.errored(),
            self.len()
        )
    }
}

/// Options shared by the batch entry points.
#[derive(Clone)]
pub struct BatchOptions {
    /// Treat an existing target artifact as completion. Default: true.
    pub skip_existing: bool,
    /// Recurse into subdirectories. Default: true.
    pub recursive: bool,
    /// Source extensions for the conversion stage (without dots). When
    /// None, the render-only set (pdf + images) is used, matching the
    /// formats the general backend cannot read.
    pub file_types: Option<Vec<String>>,
    /// Optional progress observer.
    pub progress: Option<Arc<dyn BatchProgress>>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchOptions {
    pub fn new() -> Self {
        Self {
            skip_existing: true,
            recursive: true,
            file_types: None,
            progress: None,
        }
    }

    pub fn skip_existing(mut self, v: bool) -> Self {
        self.skip_existing = v;
        self
    }

    pub fn recursive(mut self, v: bool) -> Self {
        self.recursive = v;
        self
    }

    pub fn file_types(mut self, types: Vec<String>) -> Self {
        self.file_types = Some(types);
        self
    }

    pub fn progress(mut self, progress: Arc<dyn BatchProgress>) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl fmt::Debug for BatchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchOptions")
            .field("skip_existing", &self.skip_existing)
            .field("recursive", &self.recursive)
            .field("file_types", &self.file_types)
            .field("progress", &self.progress.as_ref().map(|_| "<dyn BatchProgress>"))
            .finish()
    }
}

/// List files under `directory` whose extension (case-insensitive) is in
/// `extensions`. Deterministic (sorted) order. Fails with
/// [`SiftError::NotFound`] before touching any file if the directory is
/// missing.
pub fn find_files(
    directory: &Path,
    extensions: &HashSet<String>,
    recursive: bool,
) -> Result<Vec<PathBuf>, SiftError> {
    if !directory.is_dir() {
        return Err(SiftError::NotFound {
            path: directory.to_path_buf(),
        });
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files: Vec<PathBuf> = WalkDir::new(directory)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .map(|e| extensions.contains(&e.to_string_lossy().to_ascii_lowercase()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    debug!(
        "discovered {} files under {} ({:?})",
        files.len(),
        directory.display(),
        extensions
    );
    Ok(files)
}

/// Convert every matching document under `directory` to a Markdown
/// sidecar. One status entry per discovered file.
pub async fn convert_dir(
    converter: &Converter,
    directory: impl AsRef<Path>,
    options: &BatchOptions,
) -> Result<BatchReport, SiftError> {
    let extensions: HashSet<String> = match &options.file_types {
        Some(types) => types.iter().map(|t| t.to_ascii_lowercase()).collect(),
        None => render_only_extensions().map(str::to_string).collect(),
    };

    run_batch(
        directory.as_ref(),
        &extensions,
        "md",
        FileStatus::Converted,
        options,
        |path| async move { converter.convert_to_file(&path).await.map(|_| ()) },
    )
    .await
}

/// Extract structured data from every Markdown file under `directory`,
/// writing JSON sidecars. One status entry per discovered file.
pub async fn extract_dir(
    extractor: &Extractor,
    directory: impl AsRef<Path>,
    schema: &Schema,
    options: &BatchOptions,
) -> Result<BatchReport, SiftError> {
    let extensions: HashSet<String> = ["md".to_string()].into();

    run_batch(
        directory.as_ref(),
        &extensions,
        "json",
        FileStatus::Extracted,
        options,
        |path| async move { extractor.extract_file(&path, schema, true).await.map(|_| ()) },
    )
    .await
}

/// Full pipeline: convert documents to Markdown, then extract structured
/// data from the resulting Markdown. Returns both stage reports.
pub async fn process_dir(
    converter: &Converter,
    extractor: &Extractor,
    directory: impl AsRef<Path>,
    schema: &Schema,
    options: &BatchOptions,
) -> Result<(BatchReport, BatchReport), SiftError> {
    let directory = directory.as_ref();
    let conversion = convert_dir(converter, directory, options).await?;
    info!("conversion stage: {conversion}");
    let extraction = extract_dir(extractor, directory, schema, options).await?;
    info!("extraction stage: {extraction}");
    Ok((conversion, extraction))
}

/// Shared batch loop: discover, skip-or-process, record.
async fn run_batch<F, Fut>(
    directory: &Path,
    extensions: &HashSet<String>,
    target_ext: &str,
    success: FileStatus,
    options: &BatchOptions,
    per_item: F,
) -> Result<BatchReport, SiftError>
where
    F: Fn(PathBuf) -> Fut,
    Fut: Future<Output = Result<(), SiftError>>,
{
    let files = find_files(directory, extensions, options.recursive)?;
    let total = files.len();
    if let Some(ref progress) = options.progress {
        progress.on_batch_start(total);
    }

    let mut report = BatchReport::default();

    for (index, path) in files.iter().enumerate() {
        if let Some(ref progress) = options.progress {
            progress.on_file_start(path, index, total);
        }

        let target = path.with_extension(target_ext);
        let status = if options.skip_existing && target.exists() {
            debug!("skipping {} (target exists)", path.display());
            FileStatus::Skipped
        } else {
            match per_item(path.clone()).await {
                Ok(()) => success.clone(),
                Err(e) => {
                    warn!("{} failed: {e}", path.display());
                    FileStatus::Error(e.to_string())
                }
            }
        };

        if let Some(ref progress) = options.progress {
            progress.on_file_done(path, &status);
        }
        report.insert(path, status);
    }

    if let Some(ref progress) = options.progress {
        progress.on_batch_complete(report.produced(), report.skipped(), report.errored());
    }
    info!("batch over {}: {report}", directory.display());
    Ok(report)
}
