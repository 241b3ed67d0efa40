//! CIGAR operations in the packed BWA layout.
//!
//! Each element is `(length << 4) | opcode` with opcode 0 = M, 1 = I, 2 = D.
//! Consumers that read the packed words directly depend on this exact shape.

use std::fmt;

/// CIGAR operation type with zero-cost conversion to/from packed opcodes
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum CigarOp {
    M = 0, // Match/mismatch
    I = 1, // Insertion to reference
    D = 2, // Deletion from reference
}

impl CigarOp {
    /// Convert from the low 4 bits of a packed element
    #[inline(always)]
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::M),
            1 => Some(Self::I),
            2 => Some(Self::D),
            _ => None,
        }
    }

    #[inline(always)]
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// SAM character for this operation
    #[inline(always)]
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::M => b'M',
            Self::I => b'I',
            Self::D => b'D',
        }
    }

    /// Returns true if this operation consumes query bases
    #[inline(always)]
    pub const fn consumes_query(self) -> bool {
        matches!(self, Self::M | Self::I)
    }

    /// Returns true if this operation consumes reference bases
    #[inline(always)]
    pub const fn consumes_ref(self) -> bool {
        matches!(self, Self::M | Self::D)
    }
}

#[inline(always)]
pub const fn pack(op: CigarOp, len: u32) -> u32 {
    len << 4 | op.code()
}

/// Split a packed element into operation and length.
#[inline(always)]
pub const fn unpack(word: u32) -> (Option<CigarOp>, u32) {
    (CigarOp::from_code(word & 0xf), word >> 4)
}

/// Run-length encoded alignment in packed form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cigar {
    ops: Vec<u32>,
}

impl Cigar {
    pub fn new() -> Self {
        Cigar { ops: Vec::new() }
    }

    pub fn with_capacity(n: usize) -> Self {
        Cigar {
            ops: Vec::with_capacity(n),
        }
    }

    /// Single full-length operation.
    pub fn single(op: CigarOp, len: u32) -> Self {
        Cigar {
            ops: vec![pack(op, len)],
        }
    }

    /// Append an operation, merging with the last element when it has the
    /// same opcode (the `push_cigar` behaviour of ksw).
    pub fn push(&mut self, op: CigarOp, len: u32) {
        if len == 0 {
            return;
        }
        if let Some(last) = self.ops.last_mut() {
            if *last & 0xf == op.code() {
                *last += len << 4;
                return;
            }
        }
        self.ops.push(pack(op, len));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Packed words, bit-compatible with BWA `uint32_t *cigar`.
    #[inline]
    pub fn packed(&self) -> &[u32] {
        &self.ops
    }

    pub fn into_packed(self) -> Vec<u32> {
        self.ops
    }

    /// Build from packed words; returns `None` if any opcode is unknown.
    pub fn from_packed(ops: Vec<u32>) -> Option<Self> {
        if ops.iter().all(|&w| CigarOp::from_code(w & 0xf).is_some()) {
            Some(Cigar { ops })
        } else {
            None
        }
    }

    /// Iterate as (operation, length).
    pub fn iter(&self) -> impl Iterator<Item = (CigarOp, u32)> + '_ {
        self.ops.iter().map(|&w| {
            // Only M/I/D can be stored; construction guarantees it.
            let op = CigarOp::from_code(w & 0xf).unwrap_or(CigarOp::M);
            (op, w >> 4)
        })
    }

    /// Reverse operation order (used after aligning reversed sequences).
    pub fn reverse(&mut self) {
        self.ops.reverse();
    }

    /// Number of query bases covered (M + I).
    pub fn query_length(&self) -> u32 {
        self.iter()
            .filter(|(op, _)| op.consumes_query())
            .map(|(_, len)| len)
            .sum()
    }

    /// Number of reference bases covered (M + D).
    pub fn reference_length(&self) -> u32 {
        self.iter()
            .filter(|(op, _)| op.consumes_ref())
            .map(|(_, len)| len)
            .sum()
    }

    /// Byte-op pairs in the representation the rest of the pipeline uses
    /// for SAM output, e.g. `[(b'M', 50), (b'I', 2)]`.
    pub fn to_pairs(&self) -> Vec<(u8, i32)> {
        self.iter()
            .map(|(op, len)| (op.to_byte(), len as i32))
            .collect()
    }
}

impl fmt::Display for Cigar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ops.is_empty() {
            return f.write_str("*");
        }
        for (op, len) in self.iter() {
            write!(f, "{}{}", len, op.to_byte() as char)?;
        }
        Ok(())
    }
}
