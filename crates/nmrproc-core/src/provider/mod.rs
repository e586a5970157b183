//! Raw data access.
//!
//! Vendor formats are read elsewhere; the core only sees this contract.

use crate::domain::{DimensionSizes, ProcessingError, ProcessingResult};
use crate::indexing::SampleSchedule;
use crate::script::{DatasetHeader, DimensionHeader};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub trait RawDataProvider {
    fn n_dim(&self) -> usize;

    /// Geometry of dimension `dim`, 0-based with the acquisition dimension first.
    fn dimension(&self, dim: usize) -> Option<DimensionSizes>;

    fn acquisition_order(&self) -> Option<&str>;

    fn sample_schedule(&self) -> ProcessingResult<Option<SampleSchedule>>;

    /// Raw vector `index` along dimension `dim`.
    fn read_vector(&self, dim: usize, index: usize) -> ProcessingResult<Vec<Complex64>>;

    fn dimensions(&self) -> Vec<DimensionSizes> {
        (0..self.n_dim())
            .filter_map(|dim| self.dimension(dim))
            .collect()
    }

    fn dataset_header(&self) -> DatasetHeader {
        DatasetHeader {
            acquisition_order: self.acquisition_order().map(str::to_string),
            dims: self
                .dimensions()
                .iter()
                .enumerate()
                .map(|(dim, sizes)| DimensionHeader::new(format!("D{}", dim + 1), sizes.size, 0.0))
                .collect(),
            ..DatasetHeader::default()
        }
    }
}

/// In-memory dataset read from JSON. Vectors are stored in raw file order,
/// each point as a `[re, im]` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonRawDataset {
    pub dims: Vec<DimensionSizes>,
    #[serde(default)]
    pub acquisition_order: Option<String>,
    #[serde(default)]
    pub schedule: Option<Vec<Vec<usize>>>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub sweep_widths: Vec<f64>,
    pub vectors: Vec<Vec<Complex64>>,
}

impl JsonRawDataset {
    pub fn from_json(source: &str) -> ProcessingResult<Self> {
        let dataset: Self = serde_json::from_str(source).map_err(|error| {
            ProcessingError::input_validation("INPUT.DATASET", format!("invalid dataset: {}", error))
        })?;
        dataset.validate()?;
        Ok(dataset)
    }

    pub fn load(path: &Path) -> ProcessingResult<Self> {
        let source = fs::read_to_string(path).map_err(|error| {
            ProcessingError::io_system(
                "IO.DATASET_READ",
                format!("failed to read dataset '{}': {}", path.display(), error),
            )
        })?;
        Self::from_json(&source)
    }

    fn validate(&self) -> ProcessingResult<()> {
        let Some(direct) = self.dims.first() else {
            return Err(ProcessingError::input_validation(
                "INPUT.DATASET",
                "dataset has no dimensions",
            ));
        };
        if let Some(position) = self
            .vectors
            .iter()
            .position(|vector| vector.len() != direct.size)
        {
            return Err(ProcessingError::input_validation(
                "INPUT.DATASET",
                format!(
                    "raw vector {} has {} points, dimension 1 has {}",
                    position,
                    self.vectors[position].len(),
                    direct.size
                ),
            ));
        }
        Ok(())
    }
}

impl RawDataProvider for JsonRawDataset {
    fn n_dim(&self) -> usize {
        self.dims.len()
    }

    fn dimension(&self, dim: usize) -> Option<DimensionSizes> {
        self.dims.get(dim).copied()
    }

    fn acquisition_order(&self) -> Option<&str> {
        self.acquisition_order.as_deref()
    }

    fn sample_schedule(&self) -> ProcessingResult<Option<SampleSchedule>> {
        self.schedule
            .clone()
            .map(SampleSchedule::from_entries)
            .transpose()
    }

    fn read_vector(&self, dim: usize, index: usize) -> ProcessingResult<Vec<Complex64>> {
        if dim != 0 {
            return Err(ProcessingError::indexing(
                "INDEX.VECTOR_DIM",
                format!("raw vectors are stored along dimension 1, not {}", dim + 1),
            ));
        }
        self.vectors.get(index).cloned().ok_or_else(|| {
            ProcessingError::indexing(
                "INDEX.VECTOR",
                format!(
                    "raw vector {} is outside the {} stored vectors",
                    index,
                    self.vectors.len()
                ),
            )
        })
    }

    fn dataset_header(&self) -> DatasetHeader {
        DatasetHeader {
            acquisition_order: self.acquisition_order.clone(),
            dims: self
                .dims
                .iter()
                .enumerate()
                .map(|(dim, sizes)| {
                    let label = self
                        .labels
                        .get(dim)
                        .cloned()
                        .unwrap_or_else(|| format!("D{}", dim + 1));
                    let sweep_width = self.sweep_widths.get(dim).copied().unwrap_or(0.0);
                    DimensionHeader::new(label, sizes.size, sweep_width)
                })
                .collect(),
            ..DatasetHeader::default()
        }
    }
}
