//! Bisulfite-aware alignment finishing over a two-strand converted BWT index.
//!
//! The index layer loads, dumps, flattens and maps the parent (C>T) and
//! daughter (G>A) BWTs together with contig annotations and the packed
//! reference. The alignment layer turns a query and a known reference window
//! into a CIGAR, score, NM and MD string.

pub mod core; // Scoring, banded global alignment, CIGAR, MD/NM, binary I/O
pub mod defaults;
pub mod error; // IndexError and Result
pub mod finish_opt; // Scoring options
pub mod index; // BWT, annotations, packed reference, flat regions
pub mod pipelines; // Alignment finishing

pub use crate::core::alignment::bisulfite::{
    BaseClassifier, BisulfiteClassifier, ConversionStrand, ExactClassifier,
};
pub use crate::core::alignment::cigar::{Cigar, CigarOp};
pub use crate::core::alignment::scoring::ScoringMatrix;
pub use crate::error::{IndexError, Result};
pub use crate::finish_opt::FinishOpt;
pub use crate::index::index::{BisIndex, LoadMask};
pub use crate::pipelines::linear::finalize::{AlignmentResult, AlignmentWindow, finish};
