use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use labs_core::{Dataset, LabsError};
use tracing::debug;

use crate::read_dataset;

/// Dataset loaded once per query session.
///
/// The file is only read again after [`DatasetCache::invalidate`] or when its
/// length changed, which for an append-only file means new rows.
#[derive(Debug)]
pub struct DatasetCache {
    path: PathBuf,
    loaded: Option<Loaded>,
}

#[derive(Debug)]
struct Loaded {
    file_len: u64,
    dataset: Dataset,
}

impl DatasetCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            loaded: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn invalidate(&mut self) {
        self.loaded = None;
    }

    pub fn get(&mut self) -> Result<&Dataset, LabsError> {
        let file_len = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.loaded = None;
                return Err(LabsError::DatasetMissing(self.path.clone()));
            }
            Err(err) => return Err(err.into()),
        };

        let loaded = match self.loaded.take() {
            Some(loaded) if loaded.file_len == file_len => loaded,
            _ => {
                debug!(path = %self.path.display(), file_len, "loading dataset");
                Loaded {
                    file_len,
                    dataset: read_dataset(&self.path)?,
                }
            }
        };

        Ok(&self.loaded.insert(loaded).dataset)
    }
}
