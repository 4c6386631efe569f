//! Runtime extraction schemas.
//!
//! A schema in docsift is a *descriptor*, not a language-level type: an
//! ordered list of named fields, each with a kind tag and a human-readable
//! description. This makes dynamically generated schemas (loaded from a
//! flat JSON `field → description` mapping) and statically declared ones
//! the same thing — extraction, prompt building, and serialisation all
//! operate over the descriptor generically.
//!
//! The descriptor does three jobs:
//!
//! 1. [`Schema::from_definition`] — build a schema from an external JSON
//!    definition (every generated field is required text-with-evidence).
//! 2. [`Schema::to_json_schema`] — emit a strict JSON Schema for the
//!    constrained-generation request.
//! 3. [`Schema::parse_record`] — validate a model response and turn it into
//!    an [`ExtractionRecord`], enforcing the evidence invariant.

use crate::error::SiftError;
use crate::evidence::{EvidenceField, ExtractionRecord, FieldResult, FieldValue};
use chrono::NaiveDate;
use serde_json::{json, Map, Value};
use std::path::Path;

/// Closed set of field-kind tags.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Free text.
    Text,
    /// Integer.
    Integer,
    /// Real number.
    Float,
    /// Calendar date (`YYYY-MM-DD`).
    Date,
    /// One label out of a fixed set.
    Enum(Vec<String>),
}

/// One field of an extraction schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub description: String,
    /// When true (the default), the model must supply a verbatim quote and
    /// a confidence score alongside the value.
    pub evidence: bool,
}

/// A named, ordered, immutable set of fields to extract.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    fields: Vec<FieldSpec>,
}

impl Schema {
    /// Start building a schema with the given name.
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Build a schema from a flat `field name → description` JSON mapping.
    ///
    /// Every generated field is the required text-with-evidence kind.
    /// Anything other than a flat object of strings is rejected with
    /// [`SiftError::InvalidSchema`].
    pub fn from_definition(definition: &Value, name: impl Into<String>) -> Result<Self, SiftError> {
        let obj = definition.as_object().ok_or_else(|| {
            SiftError::InvalidSchema(
                "definition must be a flat JSON object of field_name: description".into(),
            )
        })?;

        let mut builder = Schema::builder(name);
        for (field_name, description) in obj {
            let desc = description.as_str().ok_or_else(|| {
                SiftError::InvalidSchema(format!(
                    "description for field '{field_name}' must be a string (nested \
                     definitions are not supported)"
                ))
            })?;
            builder = builder.text(field_name, desc);
        }
        builder.build()
    }

    /// Load a schema definition from a JSON file.
    ///
    /// The schema is named after the file stem unless `name` is given.
    pub fn from_json_file(path: impl AsRef<Path>, name: Option<&str>) -> Result<Self, SiftError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SiftError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => SiftError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => SiftError::NotFound {
                path: path.to_path_buf(),
            },
        })?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| SiftError::InvalidSchema(format!("definition is not valid JSON: {e}")))?;

        let schema_name = name
            .map(str::to_string)
            .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "schema".to_string());

        Self::from_definition(&value, schema_name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Strict JSON Schema for the constrained-generation request body.
    ///
    /// Every field is required at the top level; absence is expressed by a
    /// null `value` inside the field object, matching the evidence model.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for field in &self.fields {
            let prop = if field.evidence {
                json!({
                    "type": "object",
                    "description": field.description,
                    "properties": {
                        "value": value_json_schema(&field.kind),
                        "evidence": {
                            "type": ["string", "null"],
                            "description": "Exact quote from the document supporting the value",
                        },
                        "confidence": {
                            "type": "number",
                            "description": "Confidence between 0.0 and 1.0; 0.0 when not found",
                        },
                    },
                    "required": ["value", "evidence", "confidence"],
                    "additionalProperties": false,
                })
            } else {
                let mut p = value_json_schema(&field.kind);
                p["description"] = json!(field.description);
                p
            };
            properties.insert(field.name.clone(), prop);
            required.push(json!(field.name));
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Validate a model response and build the record.
    ///
    /// Enforces the evidence invariant: a non-null value must come with a
    /// non-empty evidence quote and a confidence in `[0.0, 1.0]`. A null or
    /// missing value normalises to [`FieldResult::Absent`].
    pub fn parse_record(&self, response: &Value) -> Result<ExtractionRecord, SiftError> {
        let obj = response
            .as_object()
            .ok_or_else(|| SiftError::InvalidSchema("response is not a JSON object".into()))?;

        let mut results = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let entry = obj.get(&field.name).unwrap_or(&Value::Null);
            let result = if field.evidence {
                parse_tracked(field, entry)?
            } else {
                parse_plain(field, entry)?
            };
            results.push((field.name.clone(), result));
        }

        Ok(ExtractionRecord::new(self.name.clone(), results))
    }
}

/// Builder for [`Schema`]. Field order is declaration order.
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    fields: Vec<FieldSpec>,
}

impl SchemaBuilder {
    /// Add a required text field with evidence tracking.
    pub fn text(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.push(name, FieldKind::Text, description, true)
    }

    /// Add an integer field with evidence tracking.
    pub fn integer(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.push(name, FieldKind::Integer, description, true)
    }

    /// Add a real-number field with evidence tracking.
    pub fn float(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.push(name, FieldKind::Float, description, true)
    }

    /// Add a calendar-date field with evidence tracking.
    pub fn date(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.push(name, FieldKind::Date, description, true)
    }

    /// Add an enumerated-label field with evidence tracking.
    pub fn label(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        labels: Vec<String>,
    ) -> Self {
        self.push(name, FieldKind::Enum(labels), description, true)
    }

    /// Add a plain field (no evidence quote, serialised as the raw value).
    pub fn plain(
        self,
        name: impl Into<String>,
        kind: FieldKind,
        description: impl Into<String>,
    ) -> Self {
        self.push(name, kind, description, false)
    }

    fn push(
        mut self,
        name: impl Into<String>,
        kind: FieldKind,
        description: impl Into<String>,
        evidence: bool,
    ) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind,
            description: description.into(),
            evidence,
        });
        self
    }

    /// Build, rejecting empty schemas and duplicate field names.
    pub fn build(self) -> Result<Schema, SiftError> {
        if self.fields.is_empty() {
            return Err(SiftError::InvalidSchema(format!(
                "schema '{}' has no fields",
                self.name
            )));
        }
        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(SiftError::InvalidSchema(format!(
                    "duplicate field name '{}'",
                    field.name
                )));
            }
        }
        Ok(Schema {
            name: self.name,
            fields: self.fields,
        })
    }
}

// ── Parsing helpers ──────────────────────────────────────────────────────

fn value_json_schema(kind: &FieldKind) -> Value {
    match kind {
        FieldKind::Text => json!({ "type": ["string", "null"] }),
        FieldKind::Integer => json!({ "type": ["integer", "null"] }),
        FieldKind::Float => json!({ "type": ["number", "null"] }),
        FieldKind::Date => json!({
            "type": ["string", "null"],
            "description": "ISO-8601 date, YYYY-MM-DD",
        }),
        FieldKind::Enum(labels) => {
            let mut allowed: Vec<Value> = labels.iter().map(|l| json!(l)).collect();
            allowed.push(Value::Null);
            json!({ "enum": allowed })
        }
    }
}

fn parse_tracked(field: &FieldSpec, entry: &Value) -> Result<FieldResult, SiftError> {
    // Missing field, bare null, or null inner value all mean "not found".
    let obj = match entry {
        Value::Null => return Ok(FieldResult::Absent),
        Value::Object(obj) => obj,
        other => {
            return Err(SiftError::InvalidSchema(format!(
                "field '{}': expected an object with value/evidence/confidence, got {other}",
                field.name
            )))
        }
    };

    let raw_value = obj.get("value").unwrap_or(&Value::Null);
    if raw_value.is_null() {
        return Ok(FieldResult::Absent);
    }

    let value = parse_value(&field.kind, raw_value)
        .map_err(|detail| SiftError::InvalidSchema(format!("field '{}': {detail}", field.name)))?;

    let evidence = obj
        .get("evidence")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| {
            SiftError::InvalidSchema(format!(
                "field '{}': a non-null value requires a verbatim evidence quote",
                field.name
            ))
        })?;

    let confidence = obj
        .get("confidence")
        .and_then(Value::as_f64)
        .ok_or_else(|| {
            SiftError::InvalidSchema(format!(
                "field '{}': a non-null value requires a numeric confidence",
                field.name
            ))
        })?;

    let tracked = EvidenceField::new(value, evidence, confidence).map_err(|_| {
        SiftError::InvalidSchema(format!(
            "field '{}': confidence {confidence} outside [0.0, 1.0]",
            field.name
        ))
    })?;
    Ok(FieldResult::Tracked(tracked))
}

fn parse_plain(field: &FieldSpec, entry: &Value) -> Result<FieldResult, SiftError> {
    if entry.is_null() {
        return Ok(FieldResult::Absent);
    }
    let value = parse_value(&field.kind, entry)
        .map_err(|detail| SiftError::InvalidSchema(format!("field '{}': {detail}", field.name)))?;
    Ok(FieldResult::Plain(value))
}

fn parse_value(kind: &FieldKind, raw: &Value) -> Result<FieldValue, String> {
    match kind {
        FieldKind::Text => raw
            .as_str()
            .map(|s| FieldValue::Text(s.to_string()))
            .ok_or_else(|| format!("expected a string, got {raw}")),
        FieldKind::Integer => raw
            .as_i64()
            .map(FieldValue::Integer)
            .ok_or_else(|| format!("expected an integer, got {raw}")),
        FieldKind::Float => raw
            .as_f64()
            .map(FieldValue::Float)
            .ok_or_else(|| format!("expected a number, got {raw}")),
        FieldKind::Date => {
            let s = raw.as_str().ok_or_else(|| format!("expected an ISO-8601 date string, got {raw}"))?;
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(FieldValue::Date)
                .map_err(|_| format!("'{s}' is not a YYYY-MM-DD date"))
        }
        FieldKind::Enum(labels) => {
            let s = raw.as_str().ok_or_else(|| format!("expected a label string, got {raw}"))?;
            if labels.iter().any(|l| l == s) {
                Ok(FieldValue::Label(s.to_string()))
            } else {
                Err(format!("label '{s}' is not one of {labels:?}"))
            }
        }
    }
}
