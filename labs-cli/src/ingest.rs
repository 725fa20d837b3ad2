use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use labs_core::{CanonTable, LabsConfig};
use labs_extract::{normalize_response, source_name, Extractor};
use labs_store::{ingested_sources, AppendStore};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions {
    /// Skip documents whose base name is already in the dataset.
    pub skip_ingested: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    Stored {
        rows: usize,
        dropped: usize,
        rejected: usize,
    },
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Default)]
pub struct IngestSummary {
    pub outcomes: Vec<(PathBuf, DocumentOutcome)>,
}

impl IngestSummary {
    pub fn stored(&self) -> usize {
        self.count(|o| matches!(o, DocumentOutcome::Stored { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, DocumentOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, DocumentOutcome::Failed(_)))
    }

    pub fn rows_written(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, outcome)| match outcome {
                DocumentOutcome::Stored { rows, .. } => *rows,
                _ => 0,
            })
            .sum()
    }

    fn count(&self, wanted: impl Fn(&DocumentOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| wanted(o)).count()
    }
}

/// PDF files directly inside `input`, sorted by name.
pub fn list_documents(input: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(input)
        .with_context(|| format!("Không đọc được thư mục {:?}", input))?;

    let mut documents = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf && path.is_file() {
            documents.push(path);
        }
    }
    documents.sort();
    Ok(documents)
}

/// Extract, normalize and append each document in turn. A failing document
/// is recorded and the run moves on to the next one.
pub fn run<E: Extractor>(
    documents: &[PathBuf],
    store: &AppendStore,
    extractor: &E,
    config: &LabsConfig,
    options: IngestOptions,
) -> anyhow::Result<IngestSummary> {
    let canon = config.canon_table();
    let already = if options.skip_ingested {
        ingested_sources(store.path())
            .with_context(|| format!("Không đọc được {:?}", store.path()))?
    } else {
        BTreeSet::new()
    };

    info!(documents = documents.len(), "starting ingest");
    let mut summary = IngestSummary::default();

    for (position, document) in documents.iter().enumerate() {
        let outcome = process_document(document, store, extractor, &canon, &already);

        match &outcome {
            DocumentOutcome::Stored {
                rows,
                dropped,
                rejected,
            } => {
                info!(document = %document.display(), rows, dropped, rejected, "document stored");
                let more_to_go = position + 1 < documents.len();
                if more_to_go && config.cooldown_secs > 0 {
                    std::thread::sleep(Duration::from_secs(config.cooldown_secs));
                }
            }
            DocumentOutcome::Skipped(reason) => {
                warn!(document = %document.display(), %reason, "document skipped");
            }
            DocumentOutcome::Failed(reason) => {
                error!(document = %document.display(), %reason, "document failed");
            }
        }

        summary.outcomes.push((document.clone(), outcome));
    }

    info!(
        stored = summary.stored(),
        skipped = summary.skipped(),
        failed = summary.failed(),
        rows = summary.rows_written(),
        "ingest finished"
    );
    Ok(summary)
}

fn process_document<E: Extractor>(
    document: &Path,
    store: &AppendStore,
    extractor: &E,
    canon: &CanonTable,
    already: &BTreeSet<String>,
) -> DocumentOutcome {
    let document_name = document.to_string_lossy();
    if already.contains(&source_name(&document_name)) {
        return DocumentOutcome::Skipped("already in dataset".to_string());
    }

    let response = match extractor.extract(document) {
        Ok(response) => response,
        Err(err) => return DocumentOutcome::Failed(err.to_string()),
    };

    let batch = match normalize_response(&response, &document_name, canon) {
        Ok(batch) => batch,
        Err(err) if err.is_skippable() => return DocumentOutcome::Skipped(err.to_string()),
        Err(err) => return DocumentOutcome::Failed(err.to_string()),
    };

    debug!(
        document = %document.display(),
        records = batch.len(),
        plottable = batch.plottable_count(),
        "batch normalized"
    );

    match store.append(&batch.records) {
        Ok(receipt) => DocumentOutcome::Stored {
            rows: receipt.rows_written,
            dropped: receipt.rows_dropped,
            rejected: batch.rejected.len(),
        },
        Err(err) => DocumentOutcome::Failed(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use labs_core::{LabsError, ValuePolicy};
    use labs_store::read_dataset;

    /// Canned responses keyed by file name.
    struct CannedExtractor {
        responses: HashMap<&'static str, &'static str>,
    }

    impl Extractor for CannedExtractor {
        fn extract(&self, document: &Path) -> Result<String, LabsError> {
            let name = document
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            self.responses
                .get(name)
                .map(|text| text.to_string())
                .ok_or_else(|| LabsError::Extraction(format!("upload failed for {name}")))
        }
    }

    fn extractor() -> CannedExtractor {
        CannedExtractor {
            responses: HashMap::from([
                (
                    "jan.pdf",
                    r#"[{"data": "10/01/2025", "exame": "Glicose Jejum", "valor": "92 mg/dL", "unidade": "mg/dL"},
                        {"data": "10/01/2025", "exame": "Urina - Proteínas", "valor": "Negativo"}]"#,
                ),
                ("fev.pdf", "[]"),
                (
                    "mar.pdf",
                    r#"[{"data": "10/03/2025", "exame": "Glicemia de jejum", "valor": "97"}]"#,
                ),
                ("abr.pdf", "Desculpe, não consegui ler o arquivo."),
            ]),
        }
    }

    fn documents(dir: &Path) -> Vec<PathBuf> {
        ["abr.pdf", "fev.pdf", "jan.pdf", "mai.pdf", "mar.pdf"]
            .iter()
            .map(|name| dir.join(name))
            .collect()
    }

    #[test]
    fn failures_do_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = AppendStore::new(dir.path().join("dados.csv"), ValuePolicy::RetainNull);

        let summary = run(
            &documents(dir.path()),
            &store,
            &extractor(),
            &LabsConfig::default(),
            IngestOptions::default(),
        )
        .unwrap();

        assert_eq!(summary.stored(), 2);
        assert_eq!(summary.skipped(), 2);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.rows_written(), 3);

        let dataset = read_dataset(store.path()).unwrap();
        let names: Vec<&str> = dataset.records.iter().map(|r| r.exam_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Glicose em jejum", "Urina - Proteínas", "Glicose em jejum"]
        );
    }

    #[test]
    fn drop_row_policy_counts_dropped_rows() {
        let dir = tempfile::tempdir().unwrap();
        let config = LabsConfig {
            value_policy: ValuePolicy::DropRow,
            ..LabsConfig::default()
        };
        let store = AppendStore::new(dir.path().join("dados.csv"), config.value_policy);

        let summary = run(
            &[dir.path().join("jan.pdf")],
            &store,
            &extractor(),
            &config,
            IngestOptions::default(),
        )
        .unwrap();

        assert_eq!(
            summary.outcomes[0].1,
            DocumentOutcome::Stored {
                rows: 1,
                dropped: 1,
                rejected: 0
            }
        );
    }

    #[test]
    fn reprocessing_duplicates_unless_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = AppendStore::new(dir.path().join("dados.csv"), ValuePolicy::RetainNull);
        let docs = [dir.path().join("mar.pdf")];
        let config = LabsConfig::default();

        run(&docs, &store, &extractor(), &config, IngestOptions::default()).unwrap();
        run(&docs, &store, &extractor(), &config, IngestOptions::default()).unwrap();
        assert_eq!(read_dataset(store.path()).unwrap().len(), 2);

        let summary = run(
            &docs,
            &store,
            &extractor(),
            &config,
            IngestOptions {
                skip_ingested: true,
            },
        )
        .unwrap();
        assert_eq!(summary.skipped(), 1);
        assert_eq!(read_dataset(store.path()).unwrap().len(), 2);
    }

    #[test]
    fn lists_only_pdfs_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.PDF", "a.json", "notas.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.pdf")).unwrap();

        let found: Vec<String> = list_documents(dir.path())
            .unwrap()
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        assert_eq!(found, vec!["a.PDF", "b.pdf"]);
    }
}
