//! Append-only CSV dataset of exam records.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use labs_core::{ExamRecord, LabsError, ValuePolicy, DATASET_COLUMNS};
use serde::Serialize;
use tracing::{info, warn};

mod cache;
mod columns;
mod reader;

pub use cache::DatasetCache;
pub use reader::{ingested_sources, read_dataset, read_dataset_from};

use columns::ColumnMap;

/// What one append did to the dataset file.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AppendReceipt {
    pub rows_written: usize,
    /// Rows left out by [`ValuePolicy::DropRow`].
    pub rows_dropped: usize,
    /// The file was created (and the header written) by this append.
    pub created: bool,
}

/// Writer for the dataset file. Rows are only ever added at the end.
#[derive(Debug, Clone)]
pub struct AppendStore {
    path: PathBuf,
    policy: ValuePolicy,
}

impl AppendStore {
    pub fn new(path: impl Into<PathBuf>, policy: ValuePolicy) -> Self {
        Self {
            path: path.into(),
            policy,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one document's records.
    ///
    /// The rows are encoded in memory and written with a single write followed
    /// by `fsync`. If either fails the file is cut back to its previous length,
    /// so the batch is stored entirely or not at all.
    pub fn append(&self, records: &[ExamRecord]) -> Result<AppendReceipt, LabsError> {
        let rows: Vec<&ExamRecord> = records.iter().filter(|r| self.keeps(r)).collect();
        let rows_dropped = records.len() - rows.len();

        if rows.is_empty() {
            return Ok(AppendReceipt {
                rows_written: 0,
                rows_dropped,
                created: false,
            });
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|err| self.write_error(err))?;

        let start = file.metadata().map_err(|err| self.write_error(err))?.len();
        let created = start == 0;

        let mut buffer = Vec::new();
        let columns = if created {
            ColumnMap::standard()
        } else {
            let header = read_header(&file).map_err(|err| self.write_error(err))?;
            if !ends_with_newline(&mut file, start).map_err(|err| self.write_error(err))? {
                buffer.push(b'\n');
            }
            let columns = ColumnMap::from_header(header.iter().map(String::as_str));
            columns.require_core()?;
            columns
        };

        encode_rows(&mut buffer, &columns, created, &rows)?;

        commit(&mut file, &buffer, start).map_err(|err| self.write_error(err))?;

        info!(
            path = %self.path.display(),
            rows = rows.len(),
            dropped = rows_dropped,
            created,
            "appended exam rows"
        );

        Ok(AppendReceipt {
            rows_written: rows.len(),
            rows_dropped,
            created,
        })
    }

    fn keeps(&self, record: &ExamRecord) -> bool {
        match self.policy {
            ValuePolicy::RetainNull => true,
            ValuePolicy::DropRow => record.value.is_valid(),
        }
    }

    fn write_error(&self, source: std::io::Error) -> LabsError {
        LabsError::StoreWrite {
            path: self.path.clone(),
            source,
        }
    }
}

/// File the encoded rows are committed to.
trait AppendTarget: Write {
    fn sync(&mut self) -> std::io::Result<()>;
    fn truncate(&mut self, len: u64) -> std::io::Result<()>;
}

impl AppendTarget for File {
    fn sync(&mut self) -> std::io::Result<()> {
        self.sync_all()
    }

    fn truncate(&mut self, len: u64) -> std::io::Result<()> {
        self.set_len(len)
    }
}

/// Write and sync `buffer`; on failure cut the target back to `start`.
fn commit<T: AppendTarget>(target: &mut T, buffer: &[u8], start: u64) -> std::io::Result<()> {
    let Err(err) = target.write_all(buffer).and_then(|()| target.sync()) else {
        return Ok(());
    };
    if let Err(rollback) = target.truncate(start) {
        warn!(error = %rollback, "could not roll back partial append");
    }
    Err(err)
}

fn encode_rows(
    buffer: &mut Vec<u8>,
    columns: &ColumnMap,
    with_header: bool,
    rows: &[&ExamRecord],
) -> Result<(), LabsError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(buffer);
    let encode_error = |err: csv::Error| LabsError::Parse(err.to_string());

    if with_header {
        writer.write_record(DATASET_COLUMNS).map_err(encode_error)?;
    }
    for row in rows {
        writer.write_record(columns.cells(row)).map_err(encode_error)?;
    }
    writer
        .flush()
        .map_err(|err| LabsError::Parse(err.to_string()))?;
    Ok(())
}

/// Header fields from the first line only.
fn read_header(file: &File) -> std::io::Result<Vec<String>> {
    let mut line = String::new();
    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(0))?;
    reader.read_line(&mut line)?;

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(line.as_bytes());
    let fields = match csv_reader.records().next() {
        Some(Ok(record)) => record.iter().map(str::to_string).collect(),
        Some(Err(err)) => return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, err)),
        None => Vec::new(),
    };
    Ok(fields)
}

fn ends_with_newline(file: &mut File, len: u64) -> std::io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
