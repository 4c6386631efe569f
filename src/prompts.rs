//! Prompts for evidence-tracked extraction.
//!
//! Every prompt lives here so behaviour changes happen in one place and
//! unit tests can inspect prompts without calling a model. Callers can
//! override the built-in prompt via
//! [`crate::config::ExtractConfig::custom_prompt`].

use crate::schema::Schema;

/// System prompt establishing the extraction contract.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are a precise document-data extractor. You receive a document in Markdown and a fixed set of fields to extract.

Follow these rules exactly:

1. Extract ONLY the fields you are asked for. Never invent fields.
2. Extract ONLY text that appears verbatim in the document. Do not infer,
   estimate, or add information that is not explicitly stated.
3. For each field you find, quote the exact supporting passage from the
   document as its evidence.
4. Assign each field a confidence score between 0.0 and 1.0.
5. If a field is not present in the document, set its value to null and
   its confidence to 0.0."#;

/// Build the user prompt for one extraction: field list, then document text.
pub fn extraction_prompt(schema: &Schema, text: &str) -> String {
    let mut fields = String::new();
    for field in schema.fields() {
        fields.push_str(&format!("- {}: {}\n", field.name, field.description));
    }

    format!(
        "Extract the following information from this document:\n\n{fields}\nDocument:\n\n{text}"
    )
}

/// Combine several documents into one prompt body, with explicit
/// separators so the model can cross-reference context across documents
/// instead of treating the batch as one undifferentiated blob.
pub fn combine_documents(documents: &[(String, String)]) -> String {
    documents
        .iter()
        .enumerate()
        .map(|(i, (name, text))| format!("=== DOCUMENT {}: {} ===\n{}", i + 1, name, text))
        .collect::<Vec<_>>()
        .join("\n\n")
}
