pub mod kernels;
pub mod phase_cycle;

pub use phase_cycle::{CombinedVector, PhaseCycleMode, combine, combine_group};
