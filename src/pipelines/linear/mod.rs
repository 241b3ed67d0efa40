//! Linear reference pipeline.
//!
//! Seeding and extension happen upstream; this pipeline takes over once a
//! query is known to align to a reference window and produces the final
//! CIGAR, score, NM and MD (plus bisulfite counts).

pub mod finalize; // CIGAR, NM, MD for a known window
