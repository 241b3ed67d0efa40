// Index management module
//
// BisIndex bundles the two bisulfite-converted BWTs (daughter G>A, parent
// C>T), the contig annotations and the packed reference. It is immutable
// once loaded and shared by reference across finishing threads.
//
// Two memory modes exist:
// 1. Heap: every component owns its buffers (loaded from the file set)
// 2. Flat: the large buffers are ranges inside one flattened region, which
//    may be owned by the index, a read-only file mapping, or caller memory

use super::bntseq::AnnotationTable;
use super::bwt::BwtIndex;
use super::flat::{self, FlatParts};
use super::pac::PackedReference;
use super::slab::{FlatRegion, RegionOwner};
use crate::core::alignment::bisulfite::ConversionStrand;
use crate::error::{IndexError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::ops::BitOr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Which components `BisIndex::load` reads (BWA_IDX_BWT / BNS / PAC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadMask(u8);

impl LoadMask {
    pub const BWT: LoadMask = LoadMask(0x1);
    pub const BNS: LoadMask = LoadMask(0x2);
    /// Only honoured together with `BNS`
    pub const PAC: LoadMask = LoadMask(0x4);
    pub const ALL: LoadMask = LoadMask(0x7);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: LoadMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for LoadMask {
    type Output = LoadMask;

    fn bitor(self, rhs: LoadMask) -> LoadMask {
        LoadMask(self.0 | rhs.0)
    }
}

/// Where the index's buffers live.
#[derive(Debug, Clone)]
pub enum IndexMemory {
    Heap,
    Flat(Arc<FlatRegion>),
}

#[derive(Debug)]
pub struct BisIndex {
    daughter: Option<BwtIndex>,
    parent: Option<BwtIndex>,
    annotations: Option<AnnotationTable>,
    reference: Option<PackedReference>,
    memory: IndexMemory,
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut s = prefix.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

/// Resolve an index prefix; both `<hint>.par.bwt` and `<hint>.dau.bwt` must
/// be present.
pub fn infer_prefix(hint: &Path) -> Result<PathBuf> {
    for suffix in [".par.bwt", ".dau.bwt"] {
        if !with_suffix(hint, suffix).is_file() {
            return Err(IndexError::NotFound(hint.to_path_buf()));
        }
    }
    Ok(hint.to_path_buf())
}

impl BisIndex {
    /// Assemble a heap-mode index from components.
    pub fn from_components(
        daughter: Option<BwtIndex>,
        parent: Option<BwtIndex>,
        annotations: Option<AnnotationTable>,
        reference: Option<PackedReference>,
    ) -> Self {
        BisIndex {
            daughter,
            parent,
            annotations,
            reference,
            memory: IndexMemory::Heap,
        }
    }

    /// Load the selected components from the file set at `hint`
    /// (bwa_idx_load_from_disk).
    pub fn load(hint: &Path, mask: LoadMask) -> Result<Self> {
        let start = Instant::now();
        let prefix = infer_prefix(hint)?;

        let (mut daughter, mut parent) = (None, None);
        if mask.contains(LoadMask::BWT) {
            parent = Some(Self::load_bwt(&prefix, ConversionStrand::Parent)?);
            daughter = Some(Self::load_bwt(&prefix, ConversionStrand::Daughter)?);
        }

        let (mut annotations, mut reference) = (None, None);
        if mask.contains(LoadMask::BNS) {
            let bns = AnnotationTable::restore(&prefix)?;
            log::info!("read {} ALT contigs", bns.alt_count());
            if mask.contains(LoadMask::PAC) {
                reference = Some(PackedReference::restore(
                    &with_suffix(&prefix, ".pac"),
                    bns.forward_len,
                )?);
            }
            annotations = Some(bns);
        }

        log::info!(
            "Index {} loaded in {:.3}s (bwt={}, bns={}, pac={})",
            prefix.display(),
            start.elapsed().as_secs_f64(),
            daughter.is_some(),
            annotations.is_some(),
            reference.is_some()
        );

        Ok(BisIndex {
            daughter,
            parent,
            annotations,
            reference,
            memory: IndexMemory::Heap,
        })
    }

    fn load_bwt(prefix: &Path, strand: ConversionStrand) -> Result<BwtIndex> {
        let tag = match strand {
            ConversionStrand::Parent => "par",
            ConversionStrand::Daughter => "dau",
        };
        BwtIndex::restore(
            &with_suffix(prefix, &format!(".{tag}.bwt")),
            &with_suffix(prefix, &format!(".{tag}.sa")),
            strand,
        )
    }

    /// Write every loaded component as the on-disk file set.
    pub fn dump(&self, prefix: &Path) -> Result<()> {
        if let Some(bwt) = &self.parent {
            bwt.dump(&with_suffix(prefix, ".par.bwt"), &with_suffix(prefix, ".par.sa"))?;
        }
        if let Some(bwt) = &self.daughter {
            bwt.dump(&with_suffix(prefix, ".dau.bwt"), &with_suffix(prefix, ".dau.sa"))?;
        }
        if let Some(bns) = &self.annotations {
            bns.dump(prefix)?;
        }
        if let Some(pac) = &self.reference {
            pac.dump(&with_suffix(prefix, ".pac"))?;
        }
        Ok(())
    }

    /// Serialize into one contiguous region.
    pub fn flatten(&self) -> Vec<u8> {
        flat::flatten(
            self.daughter.as_ref(),
            self.parent.as_ref(),
            self.annotations.as_ref(),
            self.reference.as_ref(),
        )
    }

    /// Rebuild an index whose buffers point into `region`.
    pub fn unflatten(region: Arc<FlatRegion>) -> Result<Self> {
        let FlatParts {
            daughter,
            parent,
            annotations,
            reference,
        } = flat::unflatten(&region)?;
        log::debug!("Unflattened {} byte {} region", region.len(), region.owner().kind());

        Ok(BisIndex {
            daughter,
            parent,
            annotations,
            reference,
            memory: IndexMemory::Flat(region),
        })
    }

    /// Flatten into an owned region and switch to flat mode (bwa_idx2mem).
    pub fn into_flat(self) -> Result<Self> {
        let region = self.flatten();
        drop(self);
        Self::unflatten(Arc::new(FlatRegion::new(RegionOwner::Owned(region))))
    }

    /// Adopt caller-owned region bytes; the index never releases them.
    pub fn from_external(bytes: Arc<[u8]>) -> Result<Self> {
        Self::unflatten(Arc::new(FlatRegion::new(RegionOwner::External(bytes))))
    }

    /// Map a region written by [`flat::write_region`] read-only.
    pub fn map_flat(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and regions are never modified
        // after they are written.
        let mmap = unsafe { Mmap::map(&file)? };
        log::info!(
            "Mapped flattened index {}: {} bytes ({:.1} MB)",
            path.display(),
            mmap.len(),
            mmap.len() as f64 / 1024.0 / 1024.0
        );
        Self::unflatten(Arc::new(FlatRegion::new(RegionOwner::Mapped(mmap))))
    }

    /// Release the index (bwa_idx_destroy). Heap buffers and an owned
    /// region are freed; mapped and external regions are only detached.
    pub fn destroy(self) {
        match &self.memory {
            IndexMemory::Heap => log::debug!("Releasing heap index"),
            IndexMemory::Flat(region) => log::debug!(
                "Releasing flat index ({} region, {} bytes{})",
                region.owner().kind(),
                region.len(),
                if region.is_owned() { "" } else { ", left in place" }
            ),
        }
        drop(self);
    }

    pub fn memory(&self) -> &IndexMemory {
        &self.memory
    }

    pub fn is_flat(&self) -> bool {
        matches!(self.memory, IndexMemory::Flat(_))
    }

    pub fn bwt(&self, strand: ConversionStrand) -> Result<&BwtIndex> {
        match strand {
            ConversionStrand::Parent => self.parent(),
            ConversionStrand::Daughter => self.daughter(),
        }
    }

    pub fn parent(&self) -> Result<&BwtIndex> {
        self.parent
            .as_ref()
            .ok_or(IndexError::MissingComponent("parent BWT"))
    }

    pub fn daughter(&self) -> Result<&BwtIndex> {
        self.daughter
            .as_ref()
            .ok_or(IndexError::MissingComponent("daughter BWT"))
    }

    pub fn annotations(&self) -> Result<&AnnotationTable> {
        self.annotations
            .as_ref()
            .ok_or(IndexError::MissingComponent("annotations"))
    }

    pub fn reference(&self) -> Result<&PackedReference> {
        self.reference
            .as_ref()
            .ok_or(IndexError::MissingComponent("packed reference"))
    }
}
