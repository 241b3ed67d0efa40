// Bisulfite index: converted BWTs, annotations, packed reference
pub mod bntseq;
pub mod builder;
pub mod bwt;
pub mod flat;
pub mod index;
pub mod pac;
pub mod slab;
