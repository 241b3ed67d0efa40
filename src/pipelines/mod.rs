//! Alignment pipelines.
//!
//! - `linear`: finishing of alignments against the linear packed reference

pub mod linear;
