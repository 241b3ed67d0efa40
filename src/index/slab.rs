// Byte storage for index buffers
//
// Every large index buffer (BWT words, suffix-array samples, packed reference)
// is either owned on the heap or a range inside a flattened region. Readers
// go through `Deref<Target = [u8]>` and decode little-endian words on access,
// so the flat form needs no copies and no alignment guarantees.

use memmap2::Mmap;
use std::fmt;
use std::ops::{Deref, Range};
use std::sync::Arc;

/// Who is responsible for a flattened region's memory.
pub enum RegionOwner {
    /// Produced by `flatten` and adopted by the index; released with it
    Owned(Vec<u8>),
    /// Read-only file mapping (e.g. a region written under /dev/shm)
    Mapped(Mmap),
    /// Caller-owned bytes; the index only holds a reference
    External(Arc<[u8]>),
}

impl RegionOwner {
    pub fn kind(&self) -> &'static str {
        match self {
            RegionOwner::Owned(_) => "owned",
            RegionOwner::Mapped(_) => "mapped",
            RegionOwner::External(_) => "external",
        }
    }
}

/// A flattened index region together with its ownership tag.
pub struct FlatRegion {
    owner: RegionOwner,
}

impl FlatRegion {
    pub fn new(owner: RegionOwner) -> Self {
        FlatRegion { owner }
    }

    pub fn owner(&self) -> &RegionOwner {
        &self.owner
    }

    /// True when dropping the index releases the region's memory.
    pub fn is_owned(&self) -> bool {
        matches!(self.owner, RegionOwner::Owned(_))
    }

    pub fn bytes(&self) -> &[u8] {
        match &self.owner {
            RegionOwner::Owned(v) => v,
            RegionOwner::Mapped(m) => m,
            RegionOwner::External(a) => a,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }
}

impl fmt::Debug for FlatRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlatRegion")
            .field("owner", &self.owner.kind())
            .field("len", &self.len())
            .finish()
    }
}

/// Heap buffer or a view into a shared flattened region.
#[derive(Clone)]
pub enum Slab {
    Heap(Vec<u8>),
    Region {
        region: Arc<FlatRegion>,
        range: Range<usize>,
    },
}

impl Slab {
    pub fn empty() -> Self {
        Slab::Heap(Vec::new())
    }

    pub fn is_region(&self) -> bool {
        matches!(self, Slab::Region { .. })
    }
}

impl Default for Slab {
    fn default() -> Self {
        Slab::empty()
    }
}

impl Deref for Slab {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        match self {
            Slab::Heap(v) => v,
            Slab::Region { region, range } => &region.bytes()[range.clone()],
        }
    }
}

impl From<Vec<u8>> for Slab {
    fn from(v: Vec<u8>) -> Self {
        Slab::Heap(v)
    }
}

impl fmt::Debug for Slab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slab::Heap(v) => write!(f, "Slab::Heap({} bytes)", v.len()),
            Slab::Region { range, .. } => write!(f, "Slab::Region({:?})", range),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_slab_is_a_view() {
        let region = Arc::new(FlatRegion::new(RegionOwner::Owned(vec![1, 2, 3, 4, 5, 6])));
        let slab = Slab::Region {
            region: Arc::clone(&region),
            range: 2..5,
        };
        assert_eq!(&*slab, &[3, 4, 5]);
        assert!(slab.is_region());
        assert!(region.is_owned());
        assert_eq!(Arc::strong_count(&region), 2);
    }

    #[test]
    fn test_external_region_is_not_owned() {
        let bytes: Arc<[u8]> = Arc::from(vec![9u8; 16]);
        let region = FlatRegion::new(RegionOwner::External(Arc::clone(&bytes)));
        assert!(!region.is_owned());
        assert_eq!(region.len(), 16);
        drop(region);
        // The caller's bytes outlive the index
        assert_eq!(bytes[0], 9);
    }
}
