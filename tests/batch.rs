//! Integration tests for the batch-processing contract.
//!
//! Backends and the structured client are replaced with in-memory fakes,
//! so these tests exercise the real discovery, skip-existing, sidecar, and
//! error-capture paths without pandoc, a rendering service, or an API key.

use async_trait::async_trait;
use docsift::{
    convert_dir, extract_dir, process_dir, BatchOptions, ChatMessage, Converter, DocumentBackend,
    EvidenceField, ExtractConfig, ExtractionRecord, Extractor, FieldResult, FieldValue,
    FileStatus, RenderBackend, Schema, SiftError, StructuredClient,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

// ── Fakes ────────────────────────────────────────────────────────────────────

/// General backend that succeeds for every file except those whose stem
/// contains "poison".
struct FakeGeneral;

#[async_trait]
impl DocumentBackend for FakeGeneral {
    fn name(&self) -> &'static str {
        "fake-general"
    }

    async fn convert(&self, path: &Path) -> Result<String, SiftError> {
        if path.to_string_lossy().contains("poison") {
            return Err(SiftError::ConversionFailed {
                path: path.to_path_buf(),
                detail: "unreadable document".into(),
            });
        }
        Ok(format!("# general: {}\n", path.display()))
    }
}

struct FakeRender {
    fail: bool,
}

#[async_trait]
impl RenderBackend for FakeRender {
    fn name(&self) -> &'static str {
        "fake-render"
    }

    async fn render(&self, path: &Path) -> Result<String, SiftError> {
        if self.fail {
            return Err(SiftError::ConversionFailed {
                path: path.to_path_buf(),
                detail: "render glitch".into(),
            });
        }
        Ok(format!("# rendered: {}\n", path.display()))
    }
}

/// Structured client returning one found field and one absent field.
struct FakeClient;

#[async_trait]
impl StructuredClient for FakeClient {
    async fn extract(
        &self,
        schema: &Schema,
        _messages: &[ChatMessage],
        _max_retries: u32,
    ) -> Result<ExtractionRecord, SiftError> {
        Ok(ExtractionRecord::new(
            schema.name(),
            vec![
                (
                    "title".to_string(),
                    FieldResult::Tracked(
                        EvidenceField::new(FieldValue::Text("Found".into()), "Found", 0.9)
                            .unwrap(),
                    ),
                ),
                ("missing".to_string(), FieldResult::Absent),
            ],
        ))
    }
}

/// Structured client that always fails, for error-capture tests.
struct FailingClient;

#[async_trait]
impl StructuredClient for FailingClient {
    async fn extract(
        &self,
        _schema: &Schema,
        _messages: &[ChatMessage],
        max_retries: u32,
    ) -> Result<ExtractionRecord, SiftError> {
        Err(SiftError::RetriesExhausted {
            attempts: max_retries + 1,
            last_error: "model unreachable".into(),
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn fake_converter() -> Converter {
    Converter::with_backends(Arc::new(FakeGeneral), Arc::new(FakeRender { fail: false }), false)
}

fn fake_extractor() -> Extractor {
    Extractor::with_client(Arc::new(FakeClient), ExtractConfig::default())
}

fn schema() -> Schema {
    Schema::builder("doc")
        .text("title", "the title")
        .text("missing", "never found")
        .build()
        .unwrap()
}

fn touch(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

// ── Conversion batches ───────────────────────────────────────────────────────

#[tokio::test]
async fn convert_dir_skips_existing_targets() {
    // a.pdf, b.docx, b.md pre-existing: a.pdf converted, b.docx skipped.
    let dir = TempDir::new().unwrap();
    let a = touch(&dir, "a.pdf", "pdf bytes");
    let b = touch(&dir, "b.docx", "docx bytes");
    let b_md = touch(&dir, "b.md", "already here\n");

    let options = BatchOptions::new().file_types(vec!["pdf".into(), "docx".into()]);
    let report = convert_dir(&fake_converter(), dir.path(), &options)
        .await
        .unwrap();

    assert_eq!(report.len(), 2);
    assert_eq!(report.get(&a), Some(&FileStatus::Converted));
    assert_eq!(report.get(&b), Some(&FileStatus::Skipped));

    // Idempotence: the pre-existing target must be untouched.
    assert_eq!(std::fs::read_to_string(&b_md).unwrap(), "already here\n");
    assert!(dir.path().join("a.md").exists());
}

#[tokio::test]
async fn convert_dir_overwrites_when_skip_disabled() {
    let dir = TempDir::new().unwrap();
    touch(&dir, "b.docx", "docx bytes");
    let b_md = touch(&dir, "b.md", "stale\n");

    let options = BatchOptions::new()
        .skip_existing(false)
        .file_types(vec!["docx".into()]);
    let report = convert_dir(&fake_converter(), dir.path(), &options)
        .await
        .unwrap();

    assert_eq!(report.produced(), 1);
    let fresh = std::fs::read_to_string(&b_md).unwrap();
    assert!(fresh.starts_with("# general:"), "got: {fresh}");
}

#[tokio::test]
async fn convert_dir_default_types_are_render_only() {
    let dir = TempDir::new().unwrap();
    touch(&dir, "scan.pdf", "pdf");
    touch(&dir, "photo.JPG", "jpg");
    touch(&dir, "report.docx", "docx"); // not in the default set

    let report = convert_dir(&fake_converter(), dir.path(), &BatchOptions::new())
        .await
        .unwrap();

    assert_eq!(report.len(), 2);
    assert!(!dir.path().join("report.md").exists());
}

#[tokio::test]
async fn convert_dir_captures_per_file_errors_and_continues() {
    let dir = TempDir::new().unwrap();
    let good = touch(&dir, "good.docx", "fine");
    let bad = touch(&dir, "poison.docx", "broken");

    // Render fallback also fails, so the poison file errors out.
    let converter = Converter::with_backends(
        Arc::new(FakeGeneral),
        Arc::new(FakeRender { fail: true }),
        false,
    );
    let options = BatchOptions::new().file_types(vec!["docx".into()]);
    let report = convert_dir(&converter, dir.path(), &options).await.unwrap();

    assert_eq!(report.len(), 2, "every discovered file gets one entry");
    assert_eq!(report.get(&good), Some(&FileStatus::Converted));
    match report.get(&bad) {
        Some(FileStatus::Error(msg)) => assert!(msg.contains("render glitch"), "got: {msg}"),
        other => panic!("expected error status, got {other:?}"),
    }
    assert_eq!(report.to_string(), "1 produced, 0 skipped, 1 errored (2 total)");
}

#[tokio::test]
async fn convert_dir_missing_directory_fails_fast() {
    let err = convert_dir(
        &fake_converter(),
        Path::new("/no/such/directory"),
        &BatchOptions::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SiftError::NotFound { .. }));
}

// ── Extraction batches ───────────────────────────────────────────────────────

#[tokio::test]
async fn extract_dir_writes_sidecars_per_markdown_file() {
    let dir = TempDir::new().unwrap();
    let a = touch(&dir, "a.md", "# Found\n");
    touch(&dir, "b.md", "# Found elsewhere\n");
    touch(&dir, "ignore.txt", "not markdown");

    let report = extract_dir(&fake_extractor(), dir.path(), &schema(), &BatchOptions::new())
        .await
        .unwrap();

    assert_eq!(report.len(), 2);
    assert_eq!(report.get(&a), Some(&FileStatus::Extracted));

    let sidecar: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("a.json")).unwrap())
            .unwrap();
    assert_eq!(sidecar["title"]["value"], "Found");
    assert_eq!(sidecar["title"]["evidence"], "Found");
    let confidence = sidecar["title"]["confidence"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&confidence));
    // Absent field omitted entirely.
    assert!(sidecar.get("missing").is_none());
}

#[tokio::test]
async fn extract_dir_skips_existing_json() {
    let dir = TempDir::new().unwrap();
    let a = touch(&dir, "a.md", "# Found\n");
    let existing = touch(&dir, "a.json", "{\"kept\": true}");

    let report = extract_dir(&fake_extractor(), dir.path(), &schema(), &BatchOptions::new())
        .await
        .unwrap();

    assert_eq!(report.get(&a), Some(&FileStatus::Skipped));
    assert_eq!(
        std::fs::read_to_string(&existing).unwrap(),
        "{\"kept\": true}"
    );
}

#[tokio::test]
async fn extract_dir_records_client_failures() {
    let dir = TempDir::new().unwrap();
    let a = touch(&dir, "a.md", "# text\n");

    let extractor = Extractor::with_client(Arc::new(FailingClient), ExtractConfig::default());
    let report = extract_dir(&extractor, dir.path(), &schema(), &BatchOptions::new())
        .await
        .unwrap();

    match report.get(&a) {
        Some(FileStatus::Error(msg)) => assert!(msg.contains("model unreachable")),
        other => panic!("expected error status, got {other:?}"),
    }
    assert!(!dir.path().join("a.json").exists(), "no sidecar on failure");
}

// ── Full pipeline ────────────────────────────────────────────────────────────

#[tokio::test]
async fn process_dir_runs_both_stages() {
    let dir = TempDir::new().unwrap();
    touch(&dir, "application.docx", "raw document");

    let options = BatchOptions::new().file_types(vec!["docx".into()]);
    let (conversion, extraction) = process_dir(
        &fake_converter(),
        &fake_extractor(),
        dir.path(),
        &schema(),
        &options,
    )
    .await
    .unwrap();

    assert_eq!(conversion.produced(), 1);
    assert_eq!(extraction.produced(), 1);
    assert!(dir.path().join("application.md").exists());
    assert!(dir.path().join("application.json").exists());
}

#[tokio::test]
async fn process_dir_discovers_nested_files() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("2024/q3");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::write(nested.join("grant.docx"), "doc").unwrap();

    let options = BatchOptions::new().file_types(vec!["docx".into()]);
    let (conversion, extraction) = process_dir(
        &fake_converter(),
        &fake_extractor(),
        dir.path(),
        &schema(),
        &options,
    )
    .await
    .unwrap();

    assert_eq!(conversion.len(), 1);
    assert_eq!(extraction.len(), 1);
    assert!(nested.join("grant.json").exists());
}
