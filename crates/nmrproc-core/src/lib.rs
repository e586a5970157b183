//! Decoding and processing core for multi-dimensional NMR acquisitions.
//!
//! Raw scans are mapped to logical rows (`indexing`), recombined according
//! to the phase-cycling scheme (`numerics`), and processed by scripts built
//! from per-dimension operation lists (`registry`, `script`, `pipeline`).

pub mod acquisition;
pub mod config;
pub mod domain;
pub mod indexing;
pub mod numerics;
pub mod pipeline;
pub mod provider;
pub mod registry;
pub mod script;
