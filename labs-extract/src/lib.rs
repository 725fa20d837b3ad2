//! Extraction response to validated `ExamRecord` batches.

use std::path::Path;

use labs_core::{CanonTable, ExamRecord, LabsError};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

mod extractor;
mod validate;

pub use extractor::{Extractor, SidecarExtractor};
pub use labs_core::{coerce_numeric, parse_exam_date};
pub use validate::{validate_item, validate_record, RawExam, RejectReason, ValidatedExam};

/// An item of the extraction that did not become a record.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Rejection {
    pub index: usize,
    pub reason: RejectReason,
}

/// Records extracted from one source document, in extraction order.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NormalizedBatch {
    pub source_file: String,
    pub records: Vec<ExamRecord>,
    pub rejected: Vec<Rejection>,
}

impl NormalizedBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records carrying both a date and a numeric value.
    pub fn plottable_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_plottable()).count()
    }
}

/// Parse the collaborator's response text, tolerating a Markdown code fence.
pub fn parse_extraction(text: &str, document: &str) -> Result<Value, LabsError> {
    serde_json::from_str(strip_code_fence(text)).map_err(|err| LabsError::EmptyExtraction {
        source_file: source_name(document),
        reason: format!("response is not JSON: {err}"),
    })
}

/// Parse and normalize a response text in one step.
pub fn normalize_response(
    text: &str,
    document: &str,
    canon: &CanonTable,
) -> Result<NormalizedBatch, LabsError> {
    let raw = parse_extraction(text, document)?;
    normalize_batch(&raw, document, canon)
}

/// Normalize the JSON array returned for one document.
///
/// Records with unreadable dates or values are kept. Items that are not
/// objects or carry no exam name are listed in [`NormalizedBatch::rejected`].
pub fn normalize_batch(
    raw: &Value,
    document: &str,
    canon: &CanonTable,
) -> Result<NormalizedBatch, LabsError> {
    let source_file = source_name(document);

    let items = match raw.as_array() {
        Some(items) => items,
        None => {
            return Err(LabsError::EmptyExtraction {
                source_file,
                reason: format!("expected a JSON array, received {}", json_kind(raw)),
            })
        }
    };

    if items.is_empty() {
        return Err(LabsError::EmptyExtraction {
            source_file,
            reason: "empty array".to_string(),
        });
    }

    if !items.iter().any(Value::is_object) {
        return Err(LabsError::EmptyExtraction {
            source_file,
            reason: "array holds no objects".to_string(),
        });
    }

    let mut records = Vec::with_capacity(items.len());
    let mut rejected = Vec::new();

    for (index, item) in items.iter().enumerate() {
        match validate_item(item, canon) {
            Ok(exam) => records.push(exam.into_record(&source_file)),
            Err(reason) => {
                debug!(source_file = %source_file, index, ?reason, "rejected extracted item");
                rejected.push(Rejection { index, reason });
            }
        }
    }

    if records.is_empty() {
        return Err(LabsError::ValidatorFailure {
            source_file,
            rejected: rejected.len(),
        });
    }

    Ok(NormalizedBatch {
        source_file,
        records,
        rejected,
    })
}

/// Base name of the document, used as provenance.
pub fn source_name(document: &str) -> String {
    Path::new(document)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| document.to_string())
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
