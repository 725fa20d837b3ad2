use csv::StringRecord;
use labs_core::{
    coerce_numeric, parse_exam_date, ExamRecord, FieldValue, LabsError, DATASET_COLUMNS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Column {
    Date,
    ExamName,
    Value,
    Unit,
    ReferenceRange,
    Category,
    SourceFile,
    Other,
}

impl Column {
    /// Accepts both current names and the Portuguese names of older datasets.
    fn from_header(name: &str) -> Self {
        let name = name.trim_start_matches('\u{feff}').trim().to_lowercase();
        match name.as_str() {
            "date" | "data" => Column::Date,
            "exam_name" | "exam" | "exame" => Column::ExamName,
            "value" | "valor" | "resultado_valor" => Column::Value,
            "unit" | "unidade" => Column::Unit,
            "reference_range" | "reference" | "referencia" => Column::ReferenceRange,
            "category" | "categoria" => Column::Category,
            "source_file" | "arquivo_origem" => Column::SourceFile,
            _ => Column::Other,
        }
    }
}

/// Column layout of a dataset file, in on-disk order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ColumnMap {
    columns: Vec<Column>,
}

impl ColumnMap {
    pub(crate) fn standard() -> Self {
        Self::from_header(DATASET_COLUMNS)
    }

    pub(crate) fn from_header<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            columns: names.into_iter().map(Column::from_header).collect(),
        }
    }

    pub(crate) fn has(&self, column: Column) -> bool {
        self.position(column).is_some()
    }

    pub(crate) fn position(&self, column: Column) -> Option<usize> {
        self.columns.iter().position(|c| *c == column)
    }

    pub(crate) fn require_core(&self) -> Result<(), LabsError> {
        let missing: Vec<&str> = [
            (Column::Date, "date"),
            (Column::ExamName, "exam_name"),
            (Column::Value, "value"),
        ]
        .into_iter()
        .filter(|(column, _)| !self.has(*column))
        .map(|(_, name)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(LabsError::Parse(format!(
                "dataset header lacks column(s): {}",
                missing.join(", ")
            )))
        }
    }

    /// Cells of `record` laid out for this header. Null fields become empty cells.
    pub(crate) fn cells(&self, record: &ExamRecord) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| match column {
                Column::Date => record
                    .recorded_on()
                    .map(|date| date.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
                Column::ExamName => record.exam_name.clone(),
                Column::Value => record
                    .numeric_value()
                    .map(|value| value.to_string())
                    .unwrap_or_default(),
                Column::Unit => record.unit.clone().unwrap_or_default(),
                Column::ReferenceRange => record.reference_range.clone().unwrap_or_default(),
                Column::Category => record.category.clone().unwrap_or_default(),
                Column::SourceFile => record.source_file.clone(),
                Column::Other => String::new(),
            })
            .collect()
    }

    pub(crate) fn record(&self, row: &StringRecord) -> ExamRecord {
        let cell = |column: Column| {
            self.position(column)
                .and_then(|index| row.get(index))
                .unwrap_or("")
        };

        let date_text = cell(Column::Date).trim();
        let date = if date_text.is_empty() {
            FieldValue::Absent
        } else {
            parse_exam_date(date_text)
                .map(FieldValue::Valid)
                .unwrap_or_else(|| FieldValue::Invalid(date_text.to_string()))
        };

        let value_text = cell(Column::Value).trim();
        let value = if value_text.is_empty() {
            FieldValue::Absent
        } else {
            coerce_numeric(value_text)
                .map(FieldValue::Valid)
                .unwrap_or_else(|| FieldValue::Invalid(value_text.to_string()))
        };

        ExamRecord {
            date,
            exam_name: cell(Column::ExamName).to_string(),
            value,
            unit: non_empty(cell(Column::Unit)),
            reference_range: non_empty(cell(Column::ReferenceRange)),
            category: non_empty(cell(Column::Category)),
            source_file: cell(Column::SourceFile).to_string(),
        }
    }
}

fn non_empty(cell: &str) -> Option<String> {
    if cell.is_empty() {
        None
    } else {
        Some(cell.to_string())
    }
}
