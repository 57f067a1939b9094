//! Ordered, typed address-space layout.
//!
//! A [`MemoryMap`] is an immutable, validated, address-sorted list of
//! [`Region`]s. It is the one thing every other component in this crate is
//! built from: the [`crate::pmm::PhysicalMemoryManager`] allocates one
//! [`crate::pmm::PhysicalBlock`] per region, and the
//! [`crate::vmm::VirtualMemoryManager`] requires exactly one `VirtualRAM`
//! region to size its page table.

mod document;
mod region;
mod segment_type;

pub use document::MapDocument;
pub use region::{PageMode, Region};
pub use segment_type::SegmentType;

use crate::error::{Error, Result};
use crate::page::is_page_multiple;

/// An ordered, non-overlapping list of [`Region`]s, binary-searchable by address.
#[derive(Debug, Clone)]
pub struct MemoryMap {
    regions: Vec<Region>,
}

impl MemoryMap {
    /// Validates and wraps a raw list of regions.
    ///
    /// Fails with [`Error::InvalidMap`] if the map is empty, any region's
    /// byte length is not a multiple of the page size, ranges overlap, or
    /// more than one `VirtualRAM` region is present.
    pub fn new(mut regions: Vec<Region>) -> Result<Self> {
        if regions.is_empty() {
            return Err(Error::InvalidMap("memory map has no regions".into()));
        }
        regions.sort_by_key(|r| r.start);

        let mut virtual_ram_count = 0;
        for (i, region) in regions.iter().enumerate() {
            if region.end < region.start {
                return Err(Error::InvalidMap(format!(
                    "region {} has end {} before start {}",
                    region.key, region.end, region.start
                )));
            }
            let len = region.end - region.start + 1;
            if !is_page_multiple(len) {
                return Err(Error::InvalidMap(format!(
                    "region {} length {} is not a multiple of the page size",
                    region.key, len
                )));
            }
            if let Some(prev) = regions.get(i.wrapping_sub(1)) {
                if i > 0 && region.start <= prev.end {
                    return Err(Error::InvalidMap(format!(
                        "region {} overlaps region {}",
                        region.key, prev.key
                    )));
                }
            }
            if region.segment_type == SegmentType::VirtualRAM {
                virtual_ram_count += 1;
            }
        }
        if virtual_ram_count == 0 {
            return Err(Error::InvalidMap(
                "memory map has no VirtualRAM region".into(),
            ));
        }
        if virtual_ram_count > 1 {
            return Err(Error::InvalidMap(
                "memory map has more than one VirtualRAM region".into(),
            ));
        }

        Ok(MemoryMap { regions })
    }

    /// Parses and validates a [`MapDocument`] (e.g. loaded from JSON).
    pub fn from_document(doc: MapDocument) -> Result<Self> {
        let regions = doc
            .regions
            .into_iter()
            .map(Region::try_from)
            .collect::<Result<Vec<_>>>()?;
        Self::new(regions)
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Returns the region enclosing `addr`, if any, via binary search.
    pub fn by_address(&self, addr: u64) -> Option<&Region> {
        let idx = self.regions.partition_point(|r| r.start <= addr);
        idx.checked_sub(1)
            .map(|i| &self.regions[i])
            .filter(|r| addr <= r.end)
    }

    pub fn by_key(&self, key: u32) -> Option<&Region> {
        self.regions.iter().find(|r| r.key == key)
    }

    pub fn by_tag(&self, tag: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.tag == tag)
    }

    pub fn by_type(&self, segment_type: SegmentType) -> impl Iterator<Item = &Region> {
        self.regions
            .iter()
            .filter(move |r| r.segment_type == segment_type)
    }

    /// The unique `VirtualRAM` region (guaranteed present by [`MemoryMap::new`]).
    pub fn virtual_ram(&self) -> &Region {
        self.regions
            .iter()
            .find(|r| r.segment_type == SegmentType::VirtualRAM)
            .expect("MemoryMap::new guarantees exactly one VirtualRAM region")
    }

    /// Returns the region containing absolute page index `page`.
    pub fn by_page(&self, page: u64) -> Option<&Region> {
        self.regions
            .iter()
            .find(|r| page >= r.start_page() && page < r.start_page() + r.num_pages())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(key: u32, start: u64, end: u64, ty: SegmentType) -> Region {
        Region {
            key,
            tag: format!("r{key}"),
            comment: String::new(),
            start,
            end,
            permissions: PageMode::READ | PageMode::WRITE,
            segment_type: ty,
        }
    }

    #[test]
    fn rejects_empty_map() {
        assert!(matches!(
            MemoryMap::new(vec![]),
            Err(Error::InvalidMap(_))
        ));
    }

    #[test]
    fn rejects_missing_virtual_ram() {
        let regions = vec![region(1, 0, 4095, SegmentType::PhysicalRAM)];
        assert!(matches!(
            MemoryMap::new(regions),
            Err(Error::InvalidMap(_))
        ));
    }

    #[test]
    fn rejects_duplicate_virtual_ram() {
        let regions = vec![
            region(1, 0, 4095, SegmentType::VirtualRAM),
            region(2, 4096, 8191, SegmentType::VirtualRAM),
        ];
        assert!(matches!(
            MemoryMap::new(regions),
            Err(Error::InvalidMap(_))
        ));
    }

    #[test]
    fn rejects_overlap() {
        let regions = vec![
            region(1, 0, 8191, SegmentType::VirtualRAM),
            region(2, 4096, 12287, SegmentType::PhysicalRAM),
        ];
        assert!(matches!(
            MemoryMap::new(regions),
            Err(Error::InvalidMap(_))
        ));
    }

    #[test]
    fn rejects_unaligned_length() {
        let regions = vec![region(1, 0, 100, SegmentType::VirtualRAM)];
        assert!(matches!(
            MemoryMap::new(regions),
            Err(Error::InvalidMap(_))
        ));
    }

    #[test]
    fn binary_search_finds_enclosing_region() {
        let regions = vec![
            region(1, 0, 4095, SegmentType::VirtualRAM),
            region(2, 4096, 12287, SegmentType::PhysicalRAM),
        ];
        let map = MemoryMap::new(regions).unwrap();
        assert_eq!(map.by_address(4096).unwrap().key, 2);
        assert_eq!(map.by_address(12287).unwrap().key, 2);
        assert!(map.by_address(12288).is_none());
    }

    #[test]
    fn by_page_matches_by_address() {
        let regions = vec![
            region(1, 0, 4095, SegmentType::VirtualRAM),
            region(2, 4096, 12287, SegmentType::PhysicalRAM),
        ];
        let map = MemoryMap::new(regions).unwrap();
        assert_eq!(map.by_page(1).unwrap().key, 2);
        assert_eq!(map.by_page(2).unwrap().key, 2);
        assert!(map.by_page(3).is_none());
    }
}
