//! Base classification for MD/NM accounting.
//!
//! Bisulfite treatment turns unmethylated C into T on the parent (C>T)
//! strand and, seen from the opposite strand, G into A on the daughter
//! (G>A) strand. A query base that differs from the reference in exactly the
//! expected direction is a conversion, not a mismatch. A convertible
//! reference base read back unchanged is a retention (methylated site).

/// Which bisulfite conversion a read is expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionStrand {
    /// G>A converted, BWT strand tag 0
    Daughter,
    /// C>T converted, BWT strand tag 1
    Parent,
}

impl ConversionStrand {
    pub fn from_parent_flag(parent: bool) -> Self {
        if parent {
            ConversionStrand::Parent
        } else {
            ConversionStrand::Daughter
        }
    }

    pub fn is_parent(self) -> bool {
        self == ConversionStrand::Parent
    }

    /// Numeric tag used in index files and flattened regions.
    pub fn tag(self) -> u8 {
        match self {
            ConversionStrand::Daughter => 0,
            ConversionStrand::Parent => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ConversionStrand::Daughter),
            1 => Some(ConversionStrand::Parent),
            _ => None,
        }
    }

    /// Reference base that bisulfite treatment may convert (C or G).
    #[inline(always)]
    pub fn convertible_base(self) -> u8 {
        match self {
            ConversionStrand::Parent => 1,
            ConversionStrand::Daughter => 2,
        }
    }

    /// Query base a converted site reads as (T or A).
    #[inline(always)]
    pub fn converted_base(self) -> u8 {
        match self {
            ConversionStrand::Parent => 3,
            ConversionStrand::Daughter => 0,
        }
    }

    /// Apply the conversion to a 2-bit base (used to derive BWT texts).
    #[inline(always)]
    pub fn convert(self, base: u8) -> u8 {
        if base == self.convertible_base() {
            self.converted_base()
        } else {
            base
        }
    }
}

/// Outcome of comparing one aligned query base with its reference base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseCall {
    Match,
    /// Match at a convertible reference base
    Retention,
    /// Expected bisulfite substitution
    Conversion,
    Mismatch,
}

/// Strategy used by the CIGAR walk to classify aligned base pairs.
pub trait BaseClassifier {
    fn classify(&self, query: u8, reference: u8) -> BaseCall;

    /// Whether conversion/retention counts are meaningful for this classifier.
    fn tracks_conversion(&self) -> bool;
}

/// Plain equality; never reports a conversion.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactClassifier;

impl BaseClassifier for ExactClassifier {
    #[inline(always)]
    fn classify(&self, query: u8, reference: u8) -> BaseCall {
        if query == reference {
            BaseCall::Match
        } else {
            BaseCall::Mismatch
        }
    }

    fn tracks_conversion(&self) -> bool {
        false
    }
}

/// Strand-aware bisulfite classifier.
#[derive(Debug, Clone, Copy)]
pub struct BisulfiteClassifier {
    pub strand: ConversionStrand,
}

impl BisulfiteClassifier {
    pub fn new(strand: ConversionStrand) -> Self {
        BisulfiteClassifier { strand }
    }
}

impl BaseClassifier for BisulfiteClassifier {
    #[inline(always)]
    fn classify(&self, query: u8, reference: u8) -> BaseCall {
        if query == reference {
            if query == self.strand.convertible_base() {
                BaseCall::Retention
            } else {
                BaseCall::Match
            }
        } else if reference == self.strand.convertible_base()
            && query == self.strand.converted_base()
        {
            BaseCall::Conversion
        } else {
            BaseCall::Mismatch
        }
    }

    fn tracks_conversion(&self) -> bool {
        true
    }
}
