// src/defaults.rs

// Scoring Constants
pub const MATCH_SCORE: i32 = 1;
pub const MISMATCH_PENALTY: i32 = 4;
pub const GAP_OPEN_PENALTY: i32 = 6;
pub const GAP_EXTEND_PENALTY: i32 = 1;
pub const AMBIGUOUS_PENALTY: i8 = -1;

// Algorithmic Constants
pub const BAND_WIDTH: i32 = 100;

// Index Constants
pub const SA_INTERVAL: u64 = 32;
pub const AMBIGUOUS_SEED: u32 = 11;
