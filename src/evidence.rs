//! Evidence-tracked extraction results.
//!
//! Every extracted datum is paired with the verbatim quote that supports it
//! and a confidence score. The invariant is structural: a present field is
//! always a complete [`EvidenceField`] (value + evidence + confidence), an
//! absent field is [`FieldResult::Absent`] — there is no partially-filled
//! state to validate at serialisation time.
//!
//! Records are created once per extraction call, are immutable afterwards,
//! and live only long enough to be written to a JSON sidecar.

use crate::error::SiftError;
use chrono::NaiveDate;
use serde_json::{json, Map, Value};
use std::path::Path;

/// A typed extracted value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Free text.
    Text(String),
    /// Integer.
    Integer(i64),
    /// Real number.
    Float(f64),
    /// Calendar date; serialised as ISO-8601 (`YYYY-MM-DD`).
    Date(NaiveDate),
    /// One label out of a declared enumeration.
    Label(String),
}

impl FieldValue {
    /// JSON representation of the raw value.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(s) => json!(s),
            FieldValue::Integer(i) => json!(i),
            FieldValue::Float(f) => json!(f),
            FieldValue::Date(d) => json!(d.format("%Y-%m-%d").to_string()),
            FieldValue::Label(l) => json!(l),
        }
    }
}

/// One extracted datum together with its supporting evidence.
///
/// `evidence` is an exact substring of the source Markdown; `confidence`
/// is in `[0.0, 1.0]`. A value the model could not find never becomes an
/// `EvidenceField` — it becomes [`FieldResult::Absent`].
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceField {
    pub value: FieldValue,
    pub evidence: String,
    pub confidence: f64,
}

impl EvidenceField {
    /// Construct, validating the confidence range.
    pub fn new(
        value: FieldValue,
        evidence: impl Into<String>,
        confidence: f64,
    ) -> Result<Self, SiftError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(SiftError::InvalidSchema(format!(
                "confidence must be in [0.0, 1.0], got {confidence}"
            )));
        }
        Ok(Self {
            value,
            evidence: evidence.into(),
            confidence,
        })
    }

    fn to_json(&self) -> Value {
        json!({
            "value": self.value.to_json(),
            "evidence": self.evidence,
            "confidence": self.confidence,
        })
    }
}

/// Outcome for a single schema field in one extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldResult {
    /// Found, with evidence and confidence.
    Tracked(EvidenceField),
    /// Found, declared as a plain (non-evidence) field.
    Plain(FieldValue),
    /// Not found in the document. Omitted from the sidecar.
    Absent,
}

/// A populated schema instance: one entry per schema field, in schema order.
#[derive(Debug, Clone)]
pub struct ExtractionRecord {
    schema_name: String,
    fields: Vec<(String, FieldResult)>,
}

impl ExtractionRecord {
    pub fn new(schema_name: impl Into<String>, fields: Vec<(String, FieldResult)>) -> Self {
        Self {
            schema_name: schema_name.into(),
            fields,
        }
    }

    /// Name of the schema this record was extracted against.
    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    /// All fields in schema order, absent ones included.
    pub fn fields(&self) -> &[(String, FieldResult)] {
        &self.fields
    }

    /// Look up a single field result by name.
    pub fn get(&self, name: &str) -> Option<&FieldResult> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    /// Number of fields with a present value.
    pub fn found_count(&self) -> usize {
        self.fields
            .iter()
            .filter(|(_, r)| !matches!(r, FieldResult::Absent))
            .count()
    }

    /// Sidecar JSON object: tracked fields as `{value, evidence, confidence}`,
    /// plain fields as the raw value, absent fields omitted.
    pub fn to_sidecar_json(&self) -> Value {
        let mut obj = Map::new();
        for (name, result) in &self.fields {
            match result {
                FieldResult::Tracked(f) => {
                    obj.insert(name.clone(), f.to_json());
                }
                FieldResult::Plain(v) => {
                    obj.insert(name.clone(), v.to_json());
                }
                FieldResult::Absent => {}
            }
        }
        Value::Object(obj)
    }

    /// Write the sidecar JSON next to `path`, atomically (temp file + rename).
    ///
    /// Pretty-printed UTF-8; `serde_json` leaves non-ASCII unescaped.
    pub async fn write_sidecar(&self, path: &Path) -> Result<(), SiftError> {
        let text = serde_json::to_string_pretty(&self.to_sidecar_json())
            .map_err(|e| SiftError::Internal(format!("sidecar serialisation: {e}")))?;

        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, text.as_bytes())
            .await
            .map_err(|e| SiftError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| SiftError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> ExtractionRecord {
        ExtractionRecord::new(
            "grant",
            vec![
                (
                    "title".to_string(),
                    FieldResult::Tracked(
                        EvidenceField::new(
                            FieldValue::Text("Ørsted Energy Study".into()),
                            "Title: Ørsted Energy Study",
                            0.95,
                        )
                        .unwrap(),
                    ),
                ),
                (
                    "budget".to_string(),
                    FieldResult::Tracked(
                        EvidenceField::new(FieldValue::Integer(50_000), "budget of €50,000", 0.8)
                            .unwrap(),
                    ),
                ),
                ("deadline".to_string(), FieldResult::Absent),
                (
                    "page_count".to_string(),
                    FieldResult::Plain(FieldValue::Integer(12)),
                ),
            ],
        )
    }

    #[test]
    fn confidence_out_of_range_rejected() {
        let err = EvidenceField::new(FieldValue::Text("x".into()), "q", 1.5);
        assert!(err.is_err());
        let err = EvidenceField::new(FieldValue::Text("x".into()), "q", -0.1);
        assert!(err.is_err());
    }

    #[test]
    fn tracked_fields_serialise_with_evidence_and_confidence() {
        let json = sample_record().to_sidecar_json();
        let title = &json["title"];
        assert_eq!(title["value"], "Ørsted Energy Study");
        assert_eq!(title["evidence"], "Title: Ørsted Energy Study");
        assert!((title["confidence"].as_f64().unwrap() - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn absent_fields_omitted_from_sidecar() {
        let json = sample_record().to_sidecar_json();
        assert!(json.get("deadline").is_none());
    }

    #[test]
    fn plain_fields_serialise_as_raw_value() {
        let json = sample_record().to_sidecar_json();
        assert_eq!(json["page_count"], 12);
    }

    #[test]
    fn date_values_serialise_iso8601() {
        let v = FieldValue::Date(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
        assert_eq!(v.to_json(), serde_json::json!("2024-03-07"));
    }

    #[test]
    fn non_ascii_preserved_in_sidecar_text() {
        let text = serde_json::to_string_pretty(&sample_record().to_sidecar_json()).unwrap();
        assert!(text.contains("Ørsted"), "non-ASCII must not be escaped");
    }

    #[test]
    fn found_count_ignores_absent() {
        assert_eq!(sample_record().found_count(), 3);
    }

    #[tokio::test]
    async fn write_sidecar_is_pretty_printed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        sample_record().write_sidecar(&path).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  "), "expected indented output");
        assert!(!path.with_extension("json.tmp").exists());
    }
}
