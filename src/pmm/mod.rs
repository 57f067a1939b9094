//! Physical Memory Manager: a heterogeneous page-frame store.
//!
//! One [`PhysicalBlock`] is constructed per [`crate::memmap::Region`]; the
//! [`PhysicalMemoryManager`] owns the whole collection and enforces the
//! per-type access policy (§4.2) at every read/write entry point.

mod block;

pub use block::PhysicalBlock;

use crate::error::{Error, Result};
use crate::events::EventSink;
use crate::memmap::{MemoryMap, Region, SegmentType};
use crate::page::{split_addr, PAGE_SIZE};

/// Owns one [`PhysicalBlock`] per region and dispatches byte/page access
/// through the per-type policy table.
pub struct PhysicalMemoryManager {
    blocks: Vec<PhysicalBlock>,
}

impl PhysicalMemoryManager {
    /// Builds one zero-initialised block per region in `map`.
    pub fn new(map: &MemoryMap, sink: &dyn EventSink) -> Self {
        let blocks = map.regions().iter().map(PhysicalBlock::new).collect();
        sink.info("pmm", &format!("constructed {} blocks", map.regions().len()));
        PhysicalMemoryManager { blocks }
    }

    pub fn by_key(&self, key: u32) -> Option<&PhysicalBlock> {
        self.blocks.iter().find(|b| b.region_key() == key)
    }

    pub fn by_type(&self, segment_type: SegmentType) -> impl Iterator<Item = &PhysicalBlock> {
        self.blocks.iter().filter(move |b| b.segment_type() == segment_type)
    }

    pub fn by_address(&self, addr: u64) -> Option<&PhysicalBlock> {
        let (page, _) = split_addr(addr);
        self.by_page(page)
    }

    pub fn by_page(&self, page: u64) -> Option<&PhysicalBlock> {
        // Blocks are few (one per region); binary search would need them
        // kept sorted by start_page, which `new` already guarantees since
        // regions are sorted by address.
        let idx = self
            .blocks
            .partition_point(|b| b.start_page() <= page);
        idx.checked_sub(1)
            .map(|i| &self.blocks[i])
            .filter(|b| page < b.start_page() + b.num_pages())
    }

    fn block_for_page(&self, page: u64) -> Result<&PhysicalBlock> {
        self.by_page(page).ok_or(Error::Unmapped)
    }

    fn block_for_page_mut(&mut self, page: u64) -> Result<&mut PhysicalBlock> {
        let idx = self
            .blocks
            .partition_point(|b| b.start_page() <= page)
            .checked_sub(1)
            .filter(|&i| page < self.blocks[i].start_page() + self.blocks[i].num_pages())
            .ok_or(Error::Unmapped)?;
        Ok(&mut self.blocks[idx])
    }

    pub fn read_byte(&self, addr: u64) -> Result<u8> {
        let (page, offset) = split_addr(addr);
        let block = self.block_for_page(page)?;
        block.check_read()?;
        Ok(block.page_bytes(page)[offset as usize])
    }

    pub fn write_byte(&mut self, addr: u64, value: u8) -> Result<()> {
        let (page, offset) = split_addr(addr);
        let block = self.block_for_page_mut(page)?;
        block.check_write()?;
        block.page_bytes_mut(page)[offset as usize] = value;
        Ok(())
    }

    pub fn read_page(&self, page: u64) -> Result<&[u8]> {
        let block = self.block_for_page(page)?;
        block.check_read()?;
        Ok(block.page_bytes(page))
    }

    pub fn write_page(&mut self, page: u64, buf: &[u8]) -> Result<()> {
        if buf.len() as u64 != PAGE_SIZE {
            return Err(Error::WrongSize);
        }
        let block = self.block_for_page_mut(page)?;
        block.check_write()?;
        block.page_bytes_mut(page).copy_from_slice(buf);
        Ok(())
    }

    /// All regions covered by this manager, in address order.
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.blocks.iter().map(PhysicalBlock::region)
    }
}
