//! Filtering and series building over a loaded exam dataset.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use labs_core::{CanonTable, Dataset, ExamRecord, LabsConfig};
use serde::{Deserialize, Serialize};

/// Category selector. `All` leaves the rows untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "kind", content = "label", rename_all = "snake_case")]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

/// Non-fatal conditions for the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    /// No exam was selected; nothing should be charted.
    EmptySelection,
    /// Exams were selected but no clean row matched them.
    NoMatchingRows,
    /// Compared values span more than the configured ratio.
    ScaleDisparity { min: f64, max: f64 },
    /// Too few points to draw an evolution chart.
    InsufficientHistory { exam_name: String, points: usize },
}

/// One point of an exam's series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
    pub reference_range: Option<String>,
    pub source_file: String,
}

/// The series of one exam, oldest point first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ExamTrend {
    pub exam_name: String,
    pub unit: Option<String>,
    pub points: Vec<SeriesPoint>,
}

/// The chronologically last reading of an exam.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LatestReading {
    pub exam_name: String,
    pub date: NaiveDate,
    pub value: f64,
    pub unit: Option<String>,
    pub reference_range: Option<String>,
    pub source_file: String,
}

/// Selection made in the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct SeriesQuery {
    pub category: CategoryFilter,
    pub exams: Vec<String>,
}

/// Everything the presentation layer needs for one selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SeriesView {
    /// Clean rows matching the selection, sorted by date.
    pub rows: Vec<ExamRecord>,
    pub trends: Vec<ExamTrend>,
    pub latest: Vec<LatestReading>,
    /// Categories present in the clean dataset.
    pub categories: Vec<String>,
    /// Exams available under the selected category.
    pub exams: Vec<String>,
    pub advisories: Vec<Advisory>,
}

impl SeriesView {
    #[cfg(test)]
    fn has_advisory(&self, wanted: impl Fn(&Advisory) -> bool) -> bool {
        self.advisories.iter().any(wanted)
    }
}

impl SeriesQuery {
    pub fn single(exam: impl Into<String>) -> Self {
        Self {
            category: CategoryFilter::All,
            exams: vec![exam.into()],
        }
    }

    pub fn with_category(mut self, category: CategoryFilter) -> Self {
        self.category = category;
        self
    }

    pub fn run(&self, dataset: &Dataset, config: &LabsConfig) -> SeriesView {
        let canon = config.canon_table();
        let mut records = dataset.records.clone();
        let labels = LabelIndex::unify(&mut records, &canon);
        let category = match &self.category {
            CategoryFilter::Only(label) => CategoryFilter::Only(labels.category(&canon, label)),
            CategoryFilter::All => CategoryFilter::All,
        };
        let selected: Vec<String> = self
            .exams
            .iter()
            .map(|exam| labels.exam(&canon, exam))
            .collect();

        let cleaned = clean(records);
        let categories = if dataset.has_category {
            available_categories(&cleaned)
        } else {
            Vec::new()
        };
        let in_category = filter_category(cleaned, &category, dataset.has_category);
        let exams = available_exams(&in_category);

        let mut view = SeriesView {
            categories,
            exams,
            ..SeriesView::default()
        };

        let rows = match select_exams(in_category, &selected) {
            Ok(rows) => rows,
            Err(advisory) => {
                view.advisories.push(advisory);
                return view;
            }
        };

        if rows.is_empty() {
            view.advisories.push(Advisory::NoMatchingRows);
            return view;
        }

        let trends = build_trends(&rows);
        for trend in &trends {
            if trend.points.len() < config.min_history_points {
                view.advisories.push(Advisory::InsufficientHistory {
                    exam_name: trend.exam_name.clone(),
                    points: trend.points.len(),
                });
            }
        }

        if trends.len() > 1 {
            let values: Vec<f64> = rows.iter().filter_map(ExamRecord::numeric_value).collect();
            if let Some(advisory) = scale_disparity(&values, config.scale_disparity_ratio) {
                view.advisories.push(advisory);
            }
        }

        view.latest = trends
            .iter()
            .filter_map(|trend| latest_reading(&rows, &trend.exam_name))
            .collect();
        view.trends = trends;
        view.rows = rows;
        view
    }
}

/// Display label per lookup key, taken from the first row seen with that key.
#[derive(Debug, Default)]
pub struct LabelIndex {
    exams: HashMap<String, String>,
    categories: HashMap<String, String>,
}

impl LabelIndex {
    /// Rewrite exam and category labels in place so that labels differing only
    /// in case, accents, filler words or word order become one label.
    pub fn unify(records: &mut [ExamRecord], canon: &CanonTable) -> Self {
        let mut index = Self::default();
        for record in records.iter_mut() {
            let exam = index
                .exams
                .entry(canon.exam_key(&record.exam_name))
                .or_insert_with(|| canon.canonical_exam(&record.exam_name))
                .clone();
            record.exam_name = exam;

            if let Some(label) = record.category.as_deref().filter(|l| !l.trim().is_empty()) {
                let category = index
                    .categories
                    .entry(canon.category_key(label))
                    .or_insert_with(|| canon.canonical_category(label))
                    .clone();
                record.category = Some(category);
            }
        }
        index
    }

    /// Stored label for a requested exam name.
    pub fn exam(&self, canon: &CanonTable, label: &str) -> String {
        self.exams
            .get(&canon.exam_key(label))
            .cloned()
            .unwrap_or_else(|| canon.canonical_exam(label))
    }

    pub fn category(&self, canon: &CanonTable, label: &str) -> String {
        self.categories
            .get(&canon.category_key(label))
            .cloned()
            .unwrap_or_else(|| canon.canonical_category(label))
    }
}

/// Keep rows with a valid date and value, stably sorted by date.
/// Applying it to its own output changes nothing.
pub fn clean(records: Vec<ExamRecord>) -> Vec<ExamRecord> {
    let mut rows: Vec<ExamRecord> = records
        .into_iter()
        .filter(ExamRecord::is_plottable)
        .collect();
    rows.sort_by_key(ExamRecord::recorded_on);
    rows
}

/// Restrict to one category. A dataset without a category column is left as is.
pub fn filter_category(
    rows: Vec<ExamRecord>,
    filter: &CategoryFilter,
    has_category: bool,
) -> Vec<ExamRecord> {
    match filter {
        CategoryFilter::Only(label) if has_category => rows
            .into_iter()
            .filter(|row| row.category.as_deref() == Some(label.as_str()))
            .collect(),
        _ => rows,
    }
}

/// Restrict to the selected exam names. An empty selection is refused with
/// [`Advisory::EmptySelection`].
pub fn select_exams(rows: Vec<ExamRecord>, exams: &[String]) -> Result<Vec<ExamRecord>, Advisory> {
    if exams.is_empty() {
        return Err(Advisory::EmptySelection);
    }
    let wanted: BTreeSet<&str> = exams.iter().map(String::as_str).collect();
    Ok(rows
        .into_iter()
        .filter(|row| wanted.contains(row.exam_name.as_str()))
        .collect())
}

/// Advisory when `max > ratio * min` with a strictly positive `min`.
pub fn scale_disparity(values: &[f64], ratio: f64) -> Option<Advisory> {
    let min = values.iter().copied().reduce(f64::min)?;
    let max = values.iter().copied().reduce(f64::max)?;
    (min > 0.0 && max > ratio * min).then_some(Advisory::ScaleDisparity { min, max })
}

/// Latest reading of `exam`, by date rather than by file position.
/// Among rows sharing the latest date the one stored last wins.
pub fn latest_reading(rows: &[ExamRecord], exam: &str) -> Option<LatestReading> {
    let matching: Vec<ExamRecord> = rows
        .iter()
        .filter(|row| row.exam_name == exam)
        .cloned()
        .collect();
    let row = clean(matching).pop()?;

    Some(LatestReading {
        exam_name: row.exam_name.clone(),
        date: row.recorded_on()?,
        value: row.numeric_value()?,
        unit: row.unit,
        reference_range: row.reference_range,
        source_file: row.source_file,
    })
}

/// Categories with at least one row, sorted. Blank labels are skipped.
pub fn available_categories(rows: &[ExamRecord]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| row.category.as_deref())
        .filter(|label| !label.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn available_exams(rows: &[ExamRecord]) -> Vec<String> {
    rows.iter()
        .map(|row| row.exam_name.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Group clean rows into one series per exam, sorted by exam name.
/// The first unit seen is kept for the whole series.
pub fn build_trends(rows: &[ExamRecord]) -> Vec<ExamTrend> {
    let mut trends: Vec<ExamTrend> = Vec::new();

    for row in clean(rows.to_vec()) {
        let (Some(date), Some(value)) = (row.recorded_on(), row.numeric_value()) else {
            continue;
        };

        let index = match trends.iter().position(|t| t.exam_name == row.exam_name) {
            Some(index) => index,
            None => {
                trends.push(ExamTrend {
                    exam_name: row.exam_name.clone(),
                    ..ExamTrend::default()
                });
                trends.len() - 1
            }
        };

        let trend = &mut trends[index];
        if trend.unit.is_none() {
            trend.unit = row.unit.clone();
        }
        trend.points.push(SeriesPoint {
            date,
            value,
            reference_range: row.reference_range,
            source_file: row.source_file,
        });
    }

    trends.sort_by(|a, b| a.exam_name.cmp(&b.exam_name));
    trends
}
