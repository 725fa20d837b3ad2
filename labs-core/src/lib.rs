//! Kiểu dữ liệu lõi cho tập kết quả xét nghiệm.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

mod canon;
mod config;
mod parse;

pub use canon::{CanonSpec, CanonTable, SynonymEntry};
pub use config::{LabsConfig, ValuePolicy};
pub use parse::{coerce_numeric, parse_exam_date};

/// Tên cột của tập dữ liệu trên đĩa, theo đúng thứ tự ghi.
pub const DATASET_COLUMNS: [&str; 7] = [
    "date",
    "exam_name",
    "value",
    "unit",
    "reference_range",
    "category",
    "source_file",
];

/// Trạng thái của một trường sau khi kiểm tra.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum FieldValue<T> {
    /// Có mặt và hợp lệ.
    Valid(T),
    /// Có mặt nhưng không đọc được; giữ lại chuỗi gốc.
    Invalid(String),
    /// Không có trong bản ghi.
    Absent,
}

impl<T> FieldValue<T> {
    pub fn valid(&self) -> Option<&T> {
        match self {
            FieldValue::Valid(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, FieldValue::Valid(_))
    }
}

impl<T> Default for FieldValue<T> {
    fn default() -> Self {
        FieldValue::Absent
    }
}

/// Một dòng kết quả xét nghiệm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExamRecord {
    pub date: FieldValue<NaiveDate>,
    pub exam_name: String,
    pub value: FieldValue<f64>,
    pub unit: Option<String>,
    pub reference_range: Option<String>,
    /// `None` là không có trường; `Some("")` là có trường nhưng để trống.
    pub category: Option<String>,
    pub source_file: String,
}

impl ExamRecord {
    pub fn recorded_on(&self) -> Option<NaiveDate> {
        self.date.valid().copied()
    }

    pub fn numeric_value(&self) -> Option<f64> {
        self.value.valid().copied()
    }

    /// Dòng có đủ ngày và giá trị số để vẽ biểu đồ.
    pub fn is_plottable(&self) -> bool {
        self.date.is_valid() && self.value.is_valid()
    }
}

/// Tập dữ liệu đã nạp từ đĩa.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Dataset {
    /// Header trên đĩa có cột phân loại hay không.
    pub has_category: bool,
    pub records: Vec<ExamRecord>,
}

impl Dataset {
    pub fn new(has_category: bool, records: Vec<ExamRecord>) -> Self {
        Self {
            has_category,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Các file nguồn đã có trong tập dữ liệu.
    pub fn source_files(&self) -> BTreeSet<&str> {
        self.records
            .iter()
            .map(|record| record.source_file.as_str())
            .collect()
    }
}

/// Lỗi chung của pipeline.
#[derive(Debug, thiserror::Error)]
pub enum LabsError {
    #[error("Không đọc được dữ liệu: {0}")]
    Parse(String),
    #[error("Cấu hình không hợp lệ: {0}")]
    Config(String),
    #[error("Dịch vụ trích xuất thất bại: {0}")]
    Extraction(String),
    #[error("Không trích xuất được bản ghi nào từ {source_file}: {reason}")]
    EmptyExtraction { source_file: String, reason: String },
    #[error("Toàn bộ {rejected} bản ghi của {source_file} bị loại")]
    ValidatorFailure { source_file: String, rejected: usize },
    #[error("Ghi dữ liệu thất bại tại {}: {source}", .path.display())]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Không tìm thấy tập dữ liệu {}", .0.display())]
    DatasetMissing(PathBuf),
    #[error("Lỗi I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl LabsError {
    /// Lỗi chỉ khiến bỏ qua tài liệu hiện tại, không phải lỗi hệ thống.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            LabsError::EmptyExtraction { .. } | LabsError::ValidatorFailure { .. }
        )
    }
}
