//! Document-to-Markdown conversion with backend routing.
//!
//! Routing policy, in precedence order:
//!
//! 1. `force_render` — the caller asked for the rendering backend; the
//!    extension table is not consulted.
//! 2. Render-only extensions (PDF and raster images) go straight to the
//!    rendering backend. The general backend cannot read them, so there is
//!    no fallback to arrange.
//! 3. Everything else tries the general backend first and falls back to
//!    the rendering backend exactly once on failure.
//!
//! The fallback is an explicit two-step attempt over typed `Result`s —
//! the converter inspects the first attempt's error, logs it, and issues
//! the second attempt. A rendering-backend failure is terminal.

use crate::backend::{DocumentBackend, PandocBackend, RenderBackend, RenderServiceBackend};
use crate::config::ConvertConfig;
use crate::error::SiftError;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Extensions routed directly to the rendering backend.
static RENDER_ONLY_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["pdf", "png", "jpg", "jpeg", "gif", "bmp", "tiff", "webp"]
        .into_iter()
        .collect()
});

/// Which backend an input is routed to first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Rendering backend only; no fallback exists.
    Render,
    /// General backend first, rendering backend as fallback.
    General,
}

/// Resolve the route for a file extension (without the leading dot).
pub fn route_for_extension(ext: &str) -> Route {
    if RENDER_ONLY_EXTENSIONS.contains(ext.to_ascii_lowercase().as_str()) {
        Route::Render
    } else {
        Route::General
    }
}

/// The render-only extension set, exposed for batch-discovery defaults.
pub fn render_only_extensions() -> impl Iterator<Item = &'static str> {
    RENDER_ONLY_EXTENSIONS.iter().copied()
}

/// Converts documents to Markdown by routing between two backends.
pub struct Converter {
    general: Arc<dyn DocumentBackend>,
    render: Arc<dyn RenderBackend>,
    force_render: bool,
}

impl Converter {
    /// Wire up the default backends (pandoc + HTTP rendering service).
    pub fn from_config(config: &ConvertConfig) -> Result<Self, SiftError> {
        let render =
            RenderServiceBackend::new(&config.render_url, config.render_timeout_secs)?;
        Ok(Self {
            general: Arc::new(PandocBackend::new(&config.pandoc_path)),
            render: Arc::new(render),
            force_render: config.force_render,
        })
    }

    /// Use caller-supplied backends. This is the seam tests use to
    /// substitute in-memory fakes.
    pub fn with_backends(
        general: Arc<dyn DocumentBackend>,
        render: Arc<dyn RenderBackend>,
        force_render: bool,
    ) -> Self {
        Self {
            general,
            render,
            force_render,
        }
    }

    /// Convert a document to Markdown text.
    ///
    /// Pure transform: nothing is written to disk. Fails with
    /// [`SiftError::NotFound`] if `path` does not exist.
    pub async fn convert(&self, path: impl AsRef<Path>) -> Result<String, SiftError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SiftError::NotFound {
                path: path.to_path_buf(),
            });
        }

        if self.force_render {
            debug!("{}: forced render route", path.display());
            return self.render.render(path).await;
        }

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();

        match route_for_extension(&ext) {
            Route::Render => {
                debug!("{}: render route (.{ext})", path.display());
                self.render.render(path).await
            }
            Route::General => match self.general.convert(path).await {
                Ok(markdown) => Ok(markdown),
                Err(e) => {
                    warn!(
                        "{} failed on '{}' ({e}), falling back to {}",
                        self.general.name(),
                        path.display(),
                        self.render.name()
                    );
                    self.render.render(path).await
                }
            },
        }
    }

    /// Convert and write the Markdown sidecar `<stem>.md` beside the
    /// source, atomically (temp file + rename). Returns the sidecar path.
    pub async fn convert_to_file(&self, path: impl AsRef<Path>) -> Result<PathBuf, SiftError> {
        let path = path.as_ref();
        let markdown = self.convert(path).await?;
        let target = path.with_extension("md");

        let tmp_path = target.with_extension("md.tmp");
        tokio::fs::write(&tmp_path, &markdown)
            .await
            .map_err(|e| SiftError::OutputWriteFailed {
                path: target.clone(),
                source: e,
            })?;
        tokio::fs::rename(&tmp_path, &target)
            .await
            .map_err(|e| SiftError::OutputWriteFailed {
                path: target.clone(),
                source: e,
            })?;

        info!("converted {} -> {}", path.display(), target.display());
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGeneral {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl DocumentBackend for CountingGeneral {
        fn name(&self) -> &'static str {
            "counting-general"
        }

        async fn convert(&self, path: &Path) -> Result<String, SiftError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(SiftError::ConversionFailed {
                    path: path.to_path_buf(),
                    detail: "simulated failure".into(),
                })
            } else {
                Ok("# general\n".to_string())
            }
        }
    }

    struct CountingRender {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RenderBackend for CountingRender {
        fn name(&self) -> &'static str {
            "counting-render"
        }

        async fn render(&self, _path: &Path) -> Result<String, SiftError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("# rendered\n".to_string())
        }
    }

    fn fixture(name: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, b"content").unwrap();
        (dir, path)
    }

    #[test]
    fn routing_table() {
        assert_eq!(route_for_extension("pdf"), Route::Render);
        assert_eq!(route_for_extension("PDF"), Route::Render);
        assert_eq!(route_for_extension("jpeg"), Route::Render);
        assert_eq!(route_for_extension("docx"), Route::General);
        assert_eq!(route_for_extension("html"), Route::General);
        assert_eq!(route_for_extension(""), Route::General);
    }

    #[tokio::test]
    async fn render_only_never_touches_general() {
        let general = Arc::new(CountingGeneral {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let render = Arc::new(CountingRender {
            calls: AtomicUsize::new(0),
        });
        let converter =
            Converter::with_backends(general.clone(), render.clone(), false);

        let (_dir, path) = fixture("scan.pdf");
        let md = converter.convert(&path).await.unwrap();
        assert_eq!(md, "# rendered\n");
        assert_eq!(general.calls.load(Ordering::SeqCst), 0);
        assert_eq!(render.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn general_failure_falls_back_exactly_once() {
        let general = Arc::new(CountingGeneral {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let render = Arc::new(CountingRender {
            calls: AtomicUsize::new(0),
        });
        let converter =
            Converter::with_backends(general.clone(), render.clone(), false);

        let (_dir, path) = fixture("report.docx");
        let md = converter.convert(&path).await.unwrap();
        assert_eq!(md, "# rendered\n");
        assert_eq!(general.calls.load(Ordering::SeqCst), 1);
        assert_eq!(render.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn general_success_skips_render() {
        let general = Arc::new(CountingGeneral {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let render = Arc::new(CountingRender {
            calls: AtomicUsize::new(0),
        });
        let converter =
            Converter::with_backends(general.clone(), render.clone(), false);

        let (_dir, path) = fixture("report.docx");
        let md = converter.convert(&path).await.unwrap();
        assert_eq!(md, "# general\n");
        assert_eq!(render.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn force_render_wins_over_extension_routing() {
        let general = Arc::new(CountingGeneral {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let render = Arc::new(CountingRender {
            calls: AtomicUsize::new(0),
        });
        let converter = Converter::with_backends(general.clone(), render.clone(), true);

        let (_dir, path) = fixture("report.docx");
        converter.convert(&path).await.unwrap();
        assert_eq!(general.calls.load(Ordering::SeqCst), 0);
        assert_eq!(render.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let general = Arc::new(CountingGeneral {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let render = Arc::new(CountingRender {
            calls: AtomicUsize::new(0),
        });
        let converter = Converter::with_backends(general, render, false);

        let err = converter.convert("/no/such/file.docx").await.unwrap_err();
        assert!(matches!(err, SiftError::NotFound { .. }));
    }

    #[tokio::test]
    async fn convert_to_file_writes_md_sidecar() {
        let general = Arc::new(CountingGeneral {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let render = Arc::new(CountingRender {
            calls: AtomicUsize::new(0),
        });
        let converter = Converter::with_backends(general, render, false);

        let (_dir, path) = fixture("notes.html");
        let target = converter.convert_to_file(&path).await.unwrap();
        assert_eq!(target, path.with_extension("md"));
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "# general\n");
    }
}
