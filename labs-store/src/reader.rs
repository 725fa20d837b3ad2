use std::collections::BTreeSet;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use labs_core::{Dataset, LabsError};

use crate::columns::{Column, ColumnMap};

/// Load the whole dataset file, in file order.
pub fn read_dataset(path: &Path) -> Result<Dataset, LabsError> {
    read_dataset_from(open_dataset(path)?)
}

/// Load a dataset from any CSV source (a file, or text fetched by a browser).
pub fn read_dataset_from<R: Read>(reader: R) -> Result<Dataset, LabsError> {
    let mut reader = csv_reader(reader);
    let headers = reader.headers().map_err(parse_error)?.clone();
    if headers.is_empty() {
        return Ok(Dataset::default());
    }

    let columns = ColumnMap::from_header(headers.iter());
    columns.require_core()?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(parse_error)?;
        records.push(columns.record(&row));
    }

    Ok(Dataset::new(columns.has(Column::Category), records))
}

/// Source documents already present in the dataset, read column by column
/// without keeping rows in memory. A missing file yields an empty set.
pub fn ingested_sources(path: &Path) -> Result<BTreeSet<String>, LabsError> {
    let file = match open_dataset(path) {
        Ok(file) => file,
        Err(LabsError::DatasetMissing(_)) => return Ok(BTreeSet::new()),
        Err(err) => return Err(err),
    };

    let mut reader = csv_reader(file);
    let headers = reader.headers().map_err(parse_error)?.clone();
    let Some(index) = ColumnMap::from_header(headers.iter()).position(Column::SourceFile) else {
        return Ok(BTreeSet::new());
    };

    let mut sources = BTreeSet::new();
    for row in reader.records() {
        let row = row.map_err(parse_error)?;
        if let Some(source) = row.get(index).filter(|s| !s.is_empty()) {
            if !sources.contains(source) {
                sources.insert(source.to_string());
            }
        }
    }
    Ok(sources)
}

fn open_dataset(path: &Path) -> Result<File, LabsError> {
    File::open(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => LabsError::DatasetMissing(path.to_path_buf()),
        _ => LabsError::Io(err),
    })
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new().flexible(true).from_reader(reader)
}

fn parse_error(err: csv::Error) -> LabsError {
    LabsError::Parse(err.to_string())
}
