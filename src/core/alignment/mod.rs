//! Core alignment kernels.
//!
//! These modules are agnostic to reference structure: they operate on
//! 2-bit encoded slices handed to them by the index layer.

pub mod banded_global; // ksw_global2-style banded global alignment
pub mod bisulfite; // Conversion strands and base classifiers
pub mod cigar;
pub mod edit_distance; // NM / MD computation
pub mod scoring;
