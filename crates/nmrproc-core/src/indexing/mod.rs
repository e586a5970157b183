//! Maps logical outer-dimension rows onto raw-file vector offsets.
//!
//! A row is a point in the grid of indirect coordinates: one delay increment
//! per indirect dimension followed by one array index per arrayed dimension,
//! linearized with the first indirect dimension varying fastest. The raw file
//! stores every phase of every row as a separate vector, interleaved the way
//! the acquisition order describes.

pub mod schedule;

pub use schedule::SampleSchedule;

use crate::acquisition::{AcquisitionOrder, AcquisitionRole};
use crate::domain::{DimensionSizes, ProcessingError, ProcessingResult};
use tracing::warn;

/// The raw vectors that together reconstruct one combined row.
///
/// `offsets[j]` is the raw vector holding group-local component `j`; bit `k`
/// of `j` selects the imaginary phase of the `k`-th complex indirect dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorGroup {
    pub row: usize,
    pub coordinates: Vec<usize>,
    pub offsets: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopKind {
    Phase { bit: Option<usize> },
    Delay { axis: usize },
    Array { axis: usize },
    Schedule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LoopVariable {
    kind: LoopKind,
    stride: usize,
}

#[derive(Debug, Clone)]
pub struct VectorGroupIndexer {
    dims: Vec<DimensionSizes>,
    extents: Vec<usize>,
    loops: Vec<LoopVariable>,
    schedule_loops: Vec<LoopVariable>,
    schedule: Option<SampleSchedule>,
    group_size: usize,
    total_groups: usize,
}

impl VectorGroupIndexer {
    /// Builds the row-to-offset mapping for a dataset.
    ///
    /// `dims[0]` is the acquisition (direct) dimension; the group size is the
    /// product over indirect dimensions of 2 for complex and 1 for real ones.
    pub fn configure(dims: &[DimensionSizes], order: &AcquisitionOrder) -> ProcessingResult<Self> {
        if dims.is_empty() {
            return Err(ProcessingError::input_validation(
                "INPUT.DIMENSIONS",
                "dataset must have at least one dimension",
            ));
        }

        let n_dim = dims.len();
        let indirect = &dims[1..];
        let arrayed: Vec<usize> = (1..n_dim).filter(|dim| dims[*dim].is_arrayed()).collect();

        let mut extents: Vec<usize> = indirect.iter().map(|dim| dim.size).collect();
        extents.extend(arrayed.iter().map(|dim| dims[*dim].array_size));

        let complex_dims: Vec<usize> = (1..n_dim).filter(|dim| dims[*dim].complex).collect();
        let group_size = 1_usize << complex_dims.len();
        let total_groups = if n_dim == 1 {
            1
        } else {
            extents.iter().product()
        };

        let sequence = loop_sequence(n_dim, &arrayed, order);
        let mut loops = Vec::with_capacity(sequence.len());
        let mut stride = 1;
        for (role, dim) in sequence {
            let (kind, extent) = match role {
                AcquisitionRole::Phase => (
                    LoopKind::Phase {
                        bit: complex_dims.iter().position(|value| *value == dim),
                    },
                    dims[dim].phase_count(),
                ),
                AcquisitionRole::Delay => (LoopKind::Delay { axis: dim - 1 }, dims[dim].size),
                AcquisitionRole::Array => {
                    let position = arrayed.iter().position(|value| *value == dim).unwrap_or(0);
                    (
                        LoopKind::Array {
                            axis: indirect.len() + position,
                        },
                        dims[dim].array_size,
                    )
                }
            };
            loops.push(LoopVariable { kind, stride });
            stride *= extent.max(1);
        }

        Ok(Self {
            dims: dims.to_vec(),
            extents,
            loops,
            schedule_loops: Vec::new(),
            schedule: None,
            group_size,
            total_groups,
        })
    }

    /// Attaches a non-uniform sampling schedule. Raw vectors are then stored
    /// in schedule order, with all delays collapsed into one schedule loop.
    pub fn with_schedule(mut self, schedule: SampleSchedule) -> ProcessingResult<Self> {
        let indirect = self.dims.len().saturating_sub(1);
        if schedule.width() != indirect {
            return Err(ProcessingError::input_validation(
                "INPUT.SCHEDULE",
                format!(
                    "schedule has {} coordinates per entry, dataset has {} indirect dimensions",
                    schedule.width(),
                    indirect
                ),
            ));
        }

        let mut schedule_loops = Vec::with_capacity(self.loops.len());
        let mut stride = 1;
        for variable in &self.loops {
            let (kind, extent) = match variable.kind {
                LoopKind::Delay { .. } => {
                    if schedule_loops
                        .iter()
                        .any(|existing: &LoopVariable| existing.kind == LoopKind::Schedule)
                    {
                        continue;
                    }
                    (LoopKind::Schedule, schedule.sampled_count())
                }
                LoopKind::Phase { bit } => (LoopKind::Phase { bit }, self.phase_extent(bit)),
                LoopKind::Array { axis } => (LoopKind::Array { axis }, self.extents[axis]),
                LoopKind::Schedule => continue,
            };
            schedule_loops.push(LoopVariable { kind, stride });
            stride *= extent.max(1);
        }

        self.schedule_loops = schedule_loops;
        self.schedule = Some(schedule);
        Ok(self)
    }

    pub fn n_dim(&self) -> usize {
        self.dims.len()
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    pub fn total_groups(&self) -> usize {
        self.total_groups
    }

    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    pub fn schedule(&self) -> Option<&SampleSchedule> {
        self.schedule.as_ref()
    }

    pub fn raw_vector_count(&self) -> usize {
        match &self.schedule {
            Some(schedule) => {
                let arrays: usize = self.extents[self.dims.len() - 1..].iter().product();
                schedule.sampled_count() * arrays * self.group_size
            }
            None => self.total_groups * self.group_size,
        }
    }

    /// Row coordinates for a linear row index, first indirect axis fastest.
    pub fn coordinates_of(&self, row: usize) -> ProcessingResult<Vec<usize>> {
        self.check_row(row)?;
        let mut remainder = row;
        let coordinates = self
            .extents
            .iter()
            .map(|extent| {
                let extent = (*extent).max(1);
                let coordinate = remainder % extent;
                remainder /= extent;
                coordinate
            })
            .collect();
        Ok(coordinates)
    }

    pub fn get_next_group(&self, row: usize) -> ProcessingResult<VectorGroup> {
        if self.dims.len() == 1 {
            self.check_row(row)?;
            return Ok(VectorGroup {
                row,
                coordinates: Vec::new(),
                offsets: vec![row],
            });
        }

        let coordinates = self.coordinates_of(row)?;
        let offsets = (0..self.group_size)
            .map(|component| raw_offset(&self.loops, &coordinates, component, 0))
            .collect();
        Ok(VectorGroup {
            row,
            coordinates,
            offsets,
        })
    }

    /// Inverse of [`Self::coordinates_of`]. Out-of-range coordinates are
    /// clamped to the last valid increment.
    pub fn find_out_group(&self, coordinates: &[usize]) -> ProcessingResult<usize> {
        if coordinates.len() != self.extents.len() {
            return Err(ProcessingError::indexing(
                "INDEX.COORDINATES",
                format!(
                    "expected {} row coordinates, got {}",
                    self.extents.len(),
                    coordinates.len()
                ),
            ));
        }

        let mut row = 0;
        let mut scale = 1;
        for (axis, (coordinate, extent)) in coordinates.iter().zip(&self.extents).enumerate() {
            let extent = (*extent).max(1);
            let clamped = (*coordinate).min(extent - 1);
            if clamped != *coordinate {
                warn!(axis, coordinate, clamped, "row coordinate clamped to dataset bounds");
            }
            row += clamped * scale;
            scale *= extent;
        }
        Ok(row)
    }

    /// Clamps an interactive row request into `[0, total_groups - 1]`.
    pub fn clamp_row(&self, row: usize) -> usize {
        let last = self.total_groups.saturating_sub(1);
        if row > last {
            warn!(row, last, "row index clamped to dataset bounds");
        }
        row.min(last)
    }

    /// Rewrites a group for a non-uniformly sampled raw file.
    ///
    /// Returns `None` when the row's delay coordinates were never acquired;
    /// callers substitute zero-filled vectors for such groups.
    pub fn convert_to_nus_group(&self, group: &VectorGroup, row: usize) -> Option<VectorGroup> {
        let Some(schedule) = &self.schedule else {
            return Some(group.clone());
        };

        let indirect = self.dims.len().saturating_sub(1);
        let delays = group.coordinates.get(..indirect)?;
        let position = schedule.position_of(delays)?;
        let offsets = (0..self.group_size)
            .map(|component| {
                raw_offset(&self.schedule_loops, &group.coordinates, component, position)
            })
            .collect();
        Some(VectorGroup {
            row,
            coordinates: group.coordinates.clone(),
            offsets,
        })
    }

    fn phase_extent(&self, bit: Option<usize>) -> usize {
        if bit.is_some() { 2 } else { 1 }
    }

    fn check_row(&self, row: usize) -> ProcessingResult<()> {
        if row >= self.total_groups {
            return Err(ProcessingError::indexing(
                "INDEX.ROW_RANGE",
                format!(
                    "row {} is outside the dataset's {} rows",
                    row, self.total_groups
                ),
            ));
        }
        Ok(())
    }
}

fn raw_offset(
    loops: &[LoopVariable],
    coordinates: &[usize],
    component: usize,
    schedule_position: usize,
) -> usize {
    loops
        .iter()
        .map(|variable| {
            let index = match variable.kind {
                LoopKind::Phase { bit: Some(bit) } => (component >> bit) & 1,
                LoopKind::Phase { bit: None } => 0,
                LoopKind::Delay { axis } | LoopKind::Array { axis } => coordinates[axis],
                LoopKind::Schedule => schedule_position,
            };
            index * variable.stride
        })
        .sum()
}

/// Resolves the acquisition order into a complete loop sequence, fastest
/// first. Codes for dimensions the dataset does not have are dropped; any
/// phase left unmentioned varies fastest, any delay or array slowest.
fn loop_sequence(
    n_dim: usize,
    arrayed: &[usize],
    order: &AcquisitionOrder,
) -> Vec<(AcquisitionRole, usize)> {
    let mut listed: Vec<(AcquisitionRole, usize)> = Vec::new();

    if order.is_legacy() {
        let delays = order
            .legacy_delay_order(n_dim)
            .unwrap_or_else(|| (1..n_dim).collect());
        listed.extend(delays.into_iter().map(|dim| (AcquisitionRole::Delay, dim)));
    } else {
        for code in order.codes() {
            let known = code.dim >= 1
                && code.dim < n_dim
                && (code.role != AcquisitionRole::Array || arrayed.contains(&code.dim));
            if !known {
                warn!(code = %code, n_dim, "acquisition code ignored for this dataset");
                continue;
            }
            if listed.contains(&(code.role, code.dim)) {
                warn!(code = %code, "duplicate acquisition code ignored");
                continue;
            }
            listed.push((code.role, code.dim));
        }
    }

    let mut sequence: Vec<(AcquisitionRole, usize)> = (1..n_dim)
        .map(|dim| (AcquisitionRole::Phase, dim))
        .filter(|entry| !listed.contains(entry))
        .collect();
    sequence.extend(listed.iter().copied());
    for dim in 1..n_dim {
        if !sequence.contains(&(AcquisitionRole::Delay, dim)) {
            sequence.push((AcquisitionRole::Delay, dim));
        }
    }
    for dim in arrayed {
        if !sequence.contains(&(AcquisitionRole::Array, *dim)) {
            sequence.push((AcquisitionRole::Array, *dim));
        }
    }
    sequence
}
