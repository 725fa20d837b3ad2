//! Per-record validation and field coercion.

use chrono::NaiveDate;
use labs_core::{coerce_numeric, parse_exam_date, CanonTable, ExamRecord, FieldValue};
use serde::Serialize;
use serde_json::{Map, Value};

const DATE_KEYS: [&str; 2] = ["data", "date"];
const EXAM_KEYS: [&str; 4] = ["exame", "exam", "exam_name", "nome"];
const VALUE_KEYS: [&str; 3] = ["valor", "value", "resultado_valor"];
const UNIT_KEYS: [&str; 2] = ["unidade", "unit"];
const REFERENCE_KEYS: [&str; 3] = ["referencia", "reference", "reference_range"];
const CATEGORY_KEYS: [&str; 2] = ["categoria", "category"];

/// One extracted object, with every field optional. JSON `null` counts as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawExam {
    pub date: Option<Value>,
    pub exam: Option<Value>,
    pub value: Option<Value>,
    pub unit: Option<Value>,
    pub reference: Option<Value>,
    pub category: Option<Value>,
}

impl RawExam {
    pub fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            date: first_present(object, &DATE_KEYS),
            exam: first_present(object, &EXAM_KEYS),
            value: first_present(object, &VALUE_KEYS),
            unit: first_present(object, &UNIT_KEYS),
            reference: first_present(object, &REFERENCE_KEYS),
            category: first_present(object, &CATEGORY_KEYS),
        }
    }
}

fn first_present(object: &Map<String, Value>, keys: &[&str]) -> Option<Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
        .cloned()
}

/// Why an extracted item could not become a record.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NotAnObject,
    MissingExamName,
}

/// A validated record that has not been tagged with its source document yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedExam {
    pub date: FieldValue<NaiveDate>,
    pub exam_name: String,
    pub value: FieldValue<f64>,
    pub unit: Option<String>,
    pub reference_range: Option<String>,
    pub category: Option<String>,
}

impl ValidatedExam {
    pub fn into_record(self, source_file: &str) -> ExamRecord {
        ExamRecord {
            date: self.date,
            exam_name: self.exam_name,
            value: self.value,
            unit: self.unit,
            reference_range: self.reference_range,
            category: self.category,
            source_file: source_file.to_string(),
        }
    }
}

/// Validate one item of an extraction batch.
pub fn validate_item(item: &Value, canon: &CanonTable) -> Result<ValidatedExam, RejectReason> {
    let object = item.as_object().ok_or(RejectReason::NotAnObject)?;
    validate_record(&RawExam::from_object(object), canon)
}

/// Validate one raw record. Unreadable dates and values are kept as
/// [`FieldValue::Invalid`]; only a missing exam name rejects the record.
pub fn validate_record(raw: &RawExam, canon: &CanonTable) -> Result<ValidatedExam, RejectReason> {
    let exam_name = raw
        .exam
        .as_ref()
        .and_then(scalar_text)
        .filter(|name| !name.trim().is_empty())
        .map(|name| canon.canonical_exam(&name))
        .ok_or(RejectReason::MissingExamName)?;

    let category = raw.category.as_ref().map(|value| {
        let text = scalar_text(value).unwrap_or_default();
        if text.trim().is_empty() {
            String::new()
        } else {
            canon.canonical_category(&text)
        }
    });

    Ok(ValidatedExam {
        date: date_field(raw.date.as_ref()),
        exam_name,
        value: value_field(raw.value.as_ref()),
        unit: raw.unit.as_ref().and_then(scalar_text),
        reference_range: raw.reference.as_ref().and_then(scalar_text),
        category,
    })
}

fn date_field(value: Option<&Value>) -> FieldValue<NaiveDate> {
    let Some(value) = value else {
        return FieldValue::Absent;
    };
    let Some(text) = value.as_str() else {
        return FieldValue::Invalid(value.to_string());
    };
    if text.trim().is_empty() {
        return FieldValue::Absent;
    }
    match parse_exam_date(text) {
        Some(date) => FieldValue::Valid(date),
        None => FieldValue::Invalid(text.to_string()),
    }
}

fn value_field(value: Option<&Value>) -> FieldValue<f64> {
    match value {
        None => FieldValue::Absent,
        Some(Value::Number(number)) => match number.as_f64().filter(|v| v.is_finite()) {
            Some(v) => FieldValue::Valid(v),
            None => FieldValue::Invalid(number.to_string()),
        },
        Some(Value::String(text)) if text.trim().is_empty() => FieldValue::Absent,
        Some(Value::String(text)) => match coerce_numeric(text) {
            Some(v) => FieldValue::Valid(v),
            None => FieldValue::Invalid(text.clone()),
        },
        Some(other) => FieldValue::Invalid(other.to_string()),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
