pub mod errors;

pub use errors::{ProcessingError, ProcessingErrorCategory, ProcessingResult};

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Raw acquisition geometry of one dataset dimension.
///
/// `size` counts points as recorded: complex points for complex dimensions,
/// increments for indirect dimensions. `array_size` of zero means the
/// dimension is not arrayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionSizes {
    pub size: usize,
    pub complex: bool,
    #[serde(default)]
    pub array_size: usize,
}

impl DimensionSizes {
    pub const fn new(size: usize, complex: bool) -> Self {
        Self {
            size,
            complex,
            array_size: 0,
        }
    }

    pub const fn arrayed(size: usize, complex: bool, array_size: usize) -> Self {
        Self {
            size,
            complex,
            array_size,
        }
    }

    pub const fn is_arrayed(&self) -> bool {
        self.array_size > 0
    }

    pub const fn phase_count(&self) -> usize {
        if self.complex { 2 } else { 1 }
    }
}

/// Parses a comma separated list of array sizes, e.g. `"0,12"`.
pub fn parse_array_sizes(text: &str) -> ProcessingResult<Vec<usize>> {
    text.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            token.parse::<usize>().map_err(|_| {
                ProcessingError::input_validation(
                    "INPUT.ARRAY_SIZE",
                    format!("array size '{}' is not a non-negative integer", token),
                )
            })
        })
        .collect()
}

/// One vector of the working set: the points along the dimension currently
/// being processed, plus the row coordinates it was read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingVector {
    pub points: Vec<Complex64>,
    #[serde(default)]
    pub row: Vec<usize>,
    #[serde(default)]
    pub frequency_domain: bool,
}

impl ProcessingVector {
    pub fn new(points: Vec<Complex64>) -> Self {
        Self {
            points,
            row: Vec::new(),
            frequency_domain: false,
        }
    }

    pub fn zeros(len: usize) -> Self {
        Self::new(vec![Complex64::new(0.0, 0.0); len])
    }

    pub fn with_row(mut self, row: Vec<usize>) -> Self {
        self.row = row;
        self
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

pub type WorkingVectors = Vec<ProcessingVector>;
