use std::fmt::Write;

use labs_core::LabsConfig;
use labs_query::{Advisory, SeriesQuery, SeriesView};
use labs_store::DatasetCache;

/// Run a selection against the cached dataset and render it.
pub fn show(
    cache: &mut DatasetCache,
    query: &SeriesQuery,
    config: &LabsConfig,
    json: bool,
) -> anyhow::Result<String> {
    let view = query.run(cache.get()?, config);
    if json {
        let mut text = serde_json::to_string_pretty(&view)?;
        text.push('\n');
        return Ok(text);
    }
    Ok(render_view(&view)?)
}

/// Categories, exams and source documents present in the dataset.
pub fn list(cache: &mut DatasetCache, config: &LabsConfig) -> anyhow::Result<String> {
    let dataset = cache.get()?;
    let view = SeriesQuery::default().run(dataset, config);

    let mut out = String::new();
    writeln!(out, "Rows: {}", dataset.len())?;
    if dataset.has_category {
        writeln!(out, "Categories: {}", view.categories.join(", "))?;
    }
    writeln!(out, "Exams:")?;
    for exam in &view.exams {
        writeln!(out, "  {exam}")?;
    }
    writeln!(out, "Documents:")?;
    for source in dataset.source_files() {
        writeln!(out, "  {source}")?;
    }
    Ok(out)
}

fn render_view(view: &SeriesView) -> Result<String, std::fmt::Error> {
    let mut out = String::new();

    for latest in &view.latest {
        writeln!(
            out,
            "{}: {} (latest {})",
            latest.exam_name,
            with_unit(latest.value, latest.unit.as_deref()),
            latest.date.format("%d/%m/%Y")
        )?;
        if let Some(range) = &latest.reference_range {
            writeln!(out, "  reference: {range}")?;
        }
    }

    for trend in &view.trends {
        writeln!(out, "\n{}", trend.exam_name)?;
        for point in &trend.points {
            writeln!(
                out,
                "  {}  {}  {}",
                point.date.format("%d/%m/%Y"),
                with_unit(point.value, trend.unit.as_deref()),
                point.source_file
            )?;
        }
    }

    for advisory in &view.advisories {
        writeln!(out, "! {}", advisory_message(advisory))?;
    }
    Ok(out)
}

fn with_unit(value: f64, unit: Option<&str>) -> String {
    match unit.filter(|u| !u.is_empty()) {
        Some(unit) => format!("{value:.2} {unit}"),
        None => format!("{value:.2}"),
    }
}

fn advisory_message(advisory: &Advisory) -> String {
    match advisory {
        Advisory::EmptySelection => "select at least one exam".to_string(),
        Advisory::NoMatchingRows => "no readings match the selection".to_string(),
        Advisory::ScaleDisparity { min, max } => format!(
            "values range from {min:.2} to {max:.2}; compare these exams on separate charts"
        ),
        Advisory::InsufficientHistory { exam_name, points } => {
            format!("{exam_name} has {points} reading(s), not enough for an evolution chart")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labs_query::CategoryFilter;

    const DATASET: &str = "\
date,exam_name,value,unit,reference_range,category,source_file
2025-02-10,Glicose em jejum,97,mg/dL,70 a 99,Bioquímica,fev.pdf
2025-01-10,Glicose em jejum,92,mg/dL,70 a 99,Bioquímica,jan.pdf
2025-01-10,Hemoglobina,13.8,g/dL,,Hemograma,jan.pdf
2025-01-10,Urina - Proteínas,,,,Urina,jan.pdf
";

    fn cache() -> (tempfile::TempDir, DatasetCache) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dados.csv");
        std::fs::write(&path, DATASET).unwrap();
        (dir, DatasetCache::new(path))
    }

    #[test]
    fn text_report_shows_latest_and_series() {
        let (_dir, mut cache) = cache();
        let out = show(
            &mut cache,
            &SeriesQuery::single("Glicose em jejum"),
            &LabsConfig::default(),
            false,
        )
        .unwrap();

        assert!(out.starts_with("Glicose em jejum: 97.00 mg/dL (latest 10/02/2025)\n"));
        let jan = out.find("10/01/2025  92.00 mg/dL  jan.pdf").unwrap();
        let fev = out.find("10/02/2025  97.00 mg/dL  fev.pdf").unwrap();
        assert!(jan < fev);
        assert!(!out.contains('!'));
    }

    #[test]
    fn advisories_are_rendered() {
        let (_dir, mut cache) = cache();
        let query = SeriesQuery::single("Hemoglobina")
            .with_category(CategoryFilter::Only("Hemograma".to_string()));

        let out = show(&mut cache, &query, &LabsConfig::default(), false).unwrap();
        assert!(out.contains("! Hemoglobina has 1 reading(s)"));

        let out = show(&mut cache, &SeriesQuery::default(), &LabsConfig::default(), false).unwrap();
        assert_eq!(out, "! select at least one exam\n");
    }

    #[test]
    fn json_report_is_the_view() {
        let (_dir, mut cache) = cache();
        let out = show(
            &mut cache,
            &SeriesQuery::single("Glicose em jejum"),
            &LabsConfig::default(),
            true,
        )
        .unwrap();

        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["latest"][0]["value"], 97.0);
        assert_eq!(value["trends"][0]["points"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn legacy_file_with_raw_labels_is_queryable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dados_exames_estruturados.csv");
        std::fs::write(
            &path,
            "data,exame,valor,unidade,referencia,arquivo_origem\n\
             25/11/2024,Glicose Jejum,92,mg/dL,70 a 99,nov.pdf\n\
             10/01/2025,GLICOSE JEJUM,97,mg/dL,70 a 99,jan.pdf\n",
        )
        .unwrap();
        let mut cache = DatasetCache::new(path);

        let out = show(
            &mut cache,
            &SeriesQuery::single("Glicemia de jejum"),
            &LabsConfig::default(),
            false,
        )
        .unwrap();

        assert!(out.starts_with("Glicose em jejum: 97.00 mg/dL (latest 10/01/2025)\n"));
        assert!(out.contains("25/11/2024  92.00 mg/dL  nov.pdf"));
        assert!(!out.contains('!'));
    }

    #[test]
    fn list_names_exams_and_documents() {
        let (_dir, mut cache) = cache();
        let out = list(&mut cache, &LabsConfig::default()).unwrap();

        assert!(out.starts_with("Rows: 4\n"));
        assert!(out.contains("Categories: Bioquímica, Hemograma"));
        assert!(out.contains("  Hemoglobina\n"));
        assert!(!out.contains("Urina - Proteínas"));
        assert!(out.contains("  fev.pdf\n  jan.pdf\n"));
    }
}
