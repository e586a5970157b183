use crate::domain::{ProcessingError, ProcessingResult, WorkingVectors};
use crate::script::{DatasetHeader, write_bytes_atomically};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Processed vectors of one dataset as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedOutput {
    pub source: String,
    pub header: DatasetHeader,
    pub vectors: WorkingVectors,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedOutput {
    pub datasets: Vec<ProcessedOutput>,
}

pub fn write_processed_output(path: &Path, output: &ProcessedOutput) -> ProcessingResult<()> {
    write_json(path, output)
}

pub fn read_processed_output(path: &Path) -> ProcessingResult<ProcessedOutput> {
    let source = fs::read_to_string(path).map_err(|error| {
        ProcessingError::io_system(
            "IO.OUTPUT_READ",
            format!("failed to read output '{}': {}", path.display(), error),
        )
    })?;
    serde_json::from_str(&source).map_err(|error| {
        ProcessingError::input_validation(
            "INPUT.OUTPUT",
            format!("invalid output '{}': {}", path.display(), error),
        )
    })
}

/// Combines per-file outputs, in the given order, into one file.
pub fn merge_outputs(inputs: &[PathBuf], destination: &Path) -> ProcessingResult<MergedOutput> {
    let merged = MergedOutput {
        datasets: inputs
            .iter()
            .map(|path| read_processed_output(path))
            .collect::<ProcessingResult<_>>()?,
    };
    write_json(destination, &merged)?;
    Ok(merged)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> ProcessingResult<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|error| {
        ProcessingError::internal(
            "SYS.OUTPUT_ENCODE",
            format!("failed to encode '{}': {}", path.display(), error),
        )
    })?;
    write_bytes_atomically(path, &bytes)?;
    Ok(())
}
