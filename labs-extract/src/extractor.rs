use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use labs_core::LabsError;

/// The service that turns a document into a JSON response text.
pub trait Extractor {
    fn extract(&self, document: &Path) -> Result<String, LabsError>;
}

/// Reads a response saved next to the document (`exame.pdf` -> `exame.json`).
#[derive(Debug, Clone)]
pub struct SidecarExtractor {
    extension: String,
}

impl Default for SidecarExtractor {
    fn default() -> Self {
        Self {
            extension: "json".to_string(),
        }
    }
}

impl SidecarExtractor {
    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    pub fn response_path(&self, document: &Path) -> PathBuf {
        document.with_extension(&self.extension)
    }
}

impl Extractor for SidecarExtractor {
    fn extract(&self, document: &Path) -> Result<String, LabsError> {
        let path = self.response_path(document);
        std::fs::read_to_string(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => LabsError::Extraction(format!(
                "no saved response for {} (expected {})",
                document.display(),
                path.display()
            )),
            _ => LabsError::Extraction(format!("cannot read {}: {err}", path.display())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_sidecar_response() {
        let dir = tempfile::tempdir().unwrap();
        let document = dir.path().join("exame_jan.pdf");
        std::fs::write(&document, b"%PDF-1.4").unwrap();
        std::fs::write(dir.path().join("exame_jan.json"), "[]").unwrap();

        let text = SidecarExtractor::default().extract(&document).unwrap();
        assert_eq!(text, "[]");
    }

    #[test]
    fn missing_sidecar_is_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let document = dir.path().join("exame_fev.pdf");

        let err = SidecarExtractor::default().extract(&document).unwrap_err();
        assert!(matches!(err, LabsError::Extraction(_)));
        assert!(!err.is_skippable());
    }

    #[test]
    fn custom_extension() {
        let extractor = SidecarExtractor::with_extension("gemini.json");
        assert_eq!(
            extractor.response_path(Path::new("a/exame.pdf")),
            PathBuf::from("a/exame.gemini.json")
        );
    }
}
